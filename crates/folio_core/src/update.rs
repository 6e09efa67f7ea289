use std::path::PathBuf;

use url::Url;

use crate::msg::{AssembleOutcome, HarvestOutcome};
use crate::state::default_output_path;
use crate::{
    AppState, Effect, FailedImage, Msg, Notice, RunId, RunKind, RunOutcome, SessionState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::HarvestRequested {
            source,
            destination,
        } => start_harvest(&mut state, &source, destination)
            .into_iter()
            .collect(),
        Msg::PipelineRequested {
            source,
            destination,
            output,
        } => {
            let output = output.unwrap_or_else(|| default_output_path(&destination));
            match start_harvest(&mut state, &source, destination) {
                Some(effect) => {
                    state.queue_assembly(output);
                    vec![effect]
                }
                None => Vec::new(),
            }
        }
        Msg::AssembleRequested { folder, output } => {
            if state.session() != SessionState::Idle {
                state.push_notice(Notice::Busy);
                Vec::new()
            } else {
                let output = output.unwrap_or_else(|| default_output_path(&folder));
                let run_id = state.begin_run(RunKind::Assemble);
                vec![Effect::StartAssemble {
                    run_id,
                    folder,
                    output,
                }]
            }
        }
        Msg::CancelRequested => match state.begin_cancel() {
            Some(run_id) => vec![Effect::CancelHarvest { run_id }],
            None => {
                state.push_notice(Notice::NothingToCancel);
                Vec::new()
            }
        },
        Msg::RunProgress {
            run_id,
            stage,
            total,
        } => {
            if let Some(run) = state.run_mut(run_id) {
                run.stage = stage;
                if total.is_some() {
                    run.total = total;
                }
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ImageSaved { run_id, .. } => {
            if let Some(run) = state.run_mut(run_id) {
                run.saved += 1;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ImageFailed {
            run_id,
            order,
            reason,
        } => {
            if let Some(run) = state.run_mut(run_id) {
                run.failures.push(FailedImage { order, reason });
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::HarvestFinished { run_id, outcome } => finish_harvest(&mut state, run_id, outcome),
        Msg::AssembleFinished { run_id, outcome } => {
            if state.finish_run(run_id).is_some() {
                let outcome = match outcome {
                    AssembleOutcome::Completed { output, pages } => RunOutcome::Assembled {
                        run_id,
                        output,
                        pages,
                    },
                    AssembleOutcome::Failed(message) => RunOutcome::Failed {
                        run_id,
                        kind: RunKind::Assemble,
                        message,
                    },
                };
                state.record_outcome(outcome);
            }
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_harvest(state: &mut AppState, source: &str, destination: PathBuf) -> Option<Effect> {
    if state.session() != SessionState::Idle {
        state.push_notice(Notice::Busy);
        return None;
    }
    let source = source.trim();
    if source.is_empty() {
        state.push_notice(Notice::EmptySource);
        return None;
    }
    if let Err(reason) = validate_source(source) {
        state.push_notice(Notice::InvalidSource {
            source: source.to_string(),
            reason,
        });
        return None;
    }
    let run_id = state.begin_run(RunKind::Harvest);
    Some(Effect::StartHarvest {
        run_id,
        source: source.to_string(),
        destination,
    })
}

fn validate_source(source: &str) -> Result<(), String> {
    let url = Url::parse(source).map_err(|err| err.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}

fn finish_harvest(state: &mut AppState, run_id: RunId, outcome: HarvestOutcome) -> Vec<Effect> {
    let Some(run) = state.finish_run(run_id) else {
        return Vec::new();
    };
    let pending = state.take_pending_assembly();

    match outcome {
        HarvestOutcome::Completed {
            destination,
            saved,
            cancelled,
        } => {
            state.record_outcome(RunOutcome::Harvested {
                run_id,
                destination: destination.clone(),
                saved,
                failures: run.failures,
                cancelled,
            });
            match pending {
                Some(output) if !cancelled => {
                    let run_id = state.begin_run(RunKind::Assemble);
                    vec![Effect::StartAssemble {
                        run_id,
                        folder: destination,
                        output,
                    }]
                }
                Some(_) => {
                    state.push_notice(Notice::AssemblySkipped);
                    Vec::new()
                }
                None => Vec::new(),
            }
        }
        HarvestOutcome::Failed(message) => {
            state.record_outcome(RunOutcome::Failed {
                run_id,
                kind: RunKind::Harvest,
                message,
            });
            if pending.is_some() {
                state.push_notice(Notice::AssemblySkipped);
            }
            Vec::new()
        }
    }
}
