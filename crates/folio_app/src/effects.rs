use std::io;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use folio_core::{AssembleOutcome, Effect, HarvestOutcome, Msg, Stage};
use folio_engine::{EngineConfig, EngineEvent, EngineHandle};

/// Carries core effects to the engine and engine events back as messages.
pub(crate) struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub(crate) fn new(config: EngineConfig) -> io::Result<Self> {
        Ok(Self {
            engine: EngineHandle::new(config)?,
        })
    }

    pub(crate) fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartHarvest {
                    run_id,
                    source,
                    destination,
                } => {
                    engine_info!("StartHarvest run_id={} source={} dest={:?}", run_id, source, destination);
                    self.engine.harvest(run_id, source, destination);
                }
                Effect::CancelHarvest { run_id } => {
                    engine_info!("CancelHarvest run_id={}", run_id);
                    self.engine.cancel(run_id);
                }
                Effect::StartAssemble {
                    run_id,
                    folder,
                    output,
                } => {
                    engine_info!("StartAssemble run_id={} folder={:?} output={:?}", run_id, folder, output);
                    self.engine.assemble(run_id, folder, output);
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine event.
    pub(crate) fn next_msg(&self, timeout: Duration) -> Option<Msg> {
        self.engine.recv_timeout(timeout).map(map_event)
    }
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Progress(progress) => Msg::RunProgress {
            run_id: progress.run_id,
            stage: map_stage(progress.stage),
            total: progress.total,
        },
        EngineEvent::ImageSaved { run_id, image } => Msg::ImageSaved {
            run_id,
            order: image.order,
            path: image.path,
        },
        EngineEvent::ImageFailed { run_id, failure } => Msg::ImageFailed {
            run_id,
            order: failure.order,
            reason: format!(
                "{} ({})",
                failure.message,
                failure.resolved_url.unwrap_or(failure.raw_url)
            ),
        },
        EngineEvent::HarvestCompleted { run_id, result } => Msg::HarvestFinished {
            run_id,
            outcome: match result {
                Ok(report) => HarvestOutcome::Completed {
                    destination: report.destination,
                    saved: report.saved.len(),
                    cancelled: report.cancelled,
                },
                Err(err) => {
                    engine_warn!("Harvest {} failed: {}", run_id, err);
                    HarvestOutcome::Failed(err.to_string())
                }
            },
        },
        EngineEvent::AssembleCompleted { run_id, result } => Msg::AssembleFinished {
            run_id,
            outcome: match result {
                Ok(summary) => AssembleOutcome::Completed {
                    output: summary.output_path,
                    pages: summary.page_count,
                },
                Err(err) => {
                    engine_warn!("Assembly {} failed: {}", run_id, err);
                    AssembleOutcome::Failed(err.to_string())
                }
            },
        },
    }
}

fn map_stage(stage: folio_engine::Stage) -> Stage {
    match stage {
        folio_engine::Stage::Queued => Stage::Queued,
        folio_engine::Stage::FetchingDocument => Stage::FetchingDocument,
        folio_engine::Stage::Extracting => Stage::Extracting,
        folio_engine::Stage::DownloadingImages => Stage::DownloadingImages,
        folio_engine::Stage::Assembling => Stage::Assembling,
        folio_engine::Stage::Done => Stage::Done,
    }
}
