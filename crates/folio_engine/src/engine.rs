use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::assemble::assemble;
use crate::fetch::{FetchSettings, ReqwestFetcher};
use crate::harvest::{unix_clock, ChannelProgressSink, Clock, HarvestSettings, Harvester};
use crate::{EngineEvent, RunId, RunProgress, Stage};

/// Everything the engine needs to run harvests and assemblies.
#[derive(Clone)]
pub struct EngineConfig {
    pub document_fetch: FetchSettings,
    pub image_fetch: FetchSettings,
    pub harvest: HarvestSettings,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_fetch: FetchSettings::for_documents(),
            image_fetch: FetchSettings::for_images(),
            harvest: HarvestSettings::default(),
            clock: unix_clock(),
        }
    }
}

enum EngineCommand {
    Harvest {
        run_id: RunId,
        source: String,
        destination: PathBuf,
    },
    Cancel {
        run_id: RunId,
    },
    Assemble {
        run_id: RunId,
        folder: PathBuf,
        output: PathBuf,
    },
}

/// Owns the background thread and its runtime. Commands go in through
/// [`EngineHandle::harvest`], [`EngineHandle::cancel`] and
/// [`EngineHandle::assemble`]; results come back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

fn emit_stage(event_tx: &mpsc::Sender<EngineEvent>, run_id: RunId, stage: Stage) {
    let _ = event_tx.send(EngineEvent::Progress(RunProgress {
        run_id,
        stage,
        total: None,
    }));
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        let harvester = Harvester::new(
            Arc::new(ReqwestFetcher::new(config.document_fetch)),
            Arc::new(ReqwestFetcher::new(config.image_fetch)),
            config.harvest,
        )
        .with_clock(config.clock);
        Self::with_harvester(harvester)
    }

    pub fn with_harvester(harvester: Harvester) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;
        let harvester = Arc::new(harvester);

        thread::Builder::new()
            .name("folio-engine".into())
            .spawn(move || {
                let mut active: HashMap<RunId, CancellationToken> = HashMap::new();
                while let Ok(command) = cmd_rx.recv() {
                    // Finished runs cancel their own token, which marks them prunable.
                    active.retain(|_, token| !token.is_cancelled());
                    match command {
                        EngineCommand::Harvest {
                            run_id,
                            source,
                            destination,
                        } => {
                            let token = CancellationToken::new();
                            active.insert(run_id, token.clone());
                            emit_stage(&event_tx, run_id, Stage::Queued);
                            let harvester = harvester.clone();
                            let event_tx = event_tx.clone();
                            runtime.spawn(async move {
                                let sink = ChannelProgressSink::new(event_tx.clone());
                                let result = harvester
                                    .harvest(run_id, &source, &destination, &sink, &token)
                                    .await;
                                token.cancel();
                                let _ = event_tx.send(EngineEvent::HarvestCompleted { run_id, result });
                            });
                        }
                        EngineCommand::Cancel { run_id } => match active.remove(&run_id) {
                            Some(token) => {
                                engine_info!("Cancelling run {}", run_id);
                                token.cancel();
                            }
                            None => engine_warn!("Cancel for unknown or finished run {}", run_id),
                        },
                        EngineCommand::Assemble {
                            run_id,
                            folder,
                            output,
                        } => {
                            emit_stage(&event_tx, run_id, Stage::Assembling);
                            let event_tx = event_tx.clone();
                            runtime.spawn_blocking(move || {
                                let result = assemble(&folder, &output);
                                let _ = event_tx.send(EngineEvent::AssembleCompleted { run_id, result });
                            });
                        }
                    }
                }
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn harvest(&self, run_id: RunId, source: impl Into<String>, destination: impl Into<PathBuf>) {
        let _ = self.cmd_tx.send(EngineCommand::Harvest {
            run_id,
            source: source.into(),
            destination: destination.into(),
        });
    }

    pub fn cancel(&self, run_id: RunId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { run_id });
    }

    pub fn assemble(&self, run_id: RunId, folder: impl Into<PathBuf>, output: impl Into<PathBuf>) {
        let _ = self.cmd_tx.send(EngineCommand::Assemble {
            run_id,
            folder: folder.into(),
            output: output.into(),
        });
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
