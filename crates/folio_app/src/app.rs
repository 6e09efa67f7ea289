use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use folio_core::{update, AppState, Msg, Notice, RunKind, RunOutcome};

use crate::effects::EffectRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(75);

/// What the session ended with.
#[derive(Debug, Default)]
pub(crate) struct SessionReport {
    pub outcomes: Vec<RunOutcome>,
    pub notices: Vec<Notice>,
}

impl SessionReport {
    /// True when a run failed or the request itself was refused.
    pub(crate) fn has_fatal_error(&self) -> bool {
        self.outcomes.iter().any(RunOutcome::is_failure)
            || self.notices.iter().any(|notice| {
                matches!(notice, Notice::EmptySource | Notice::InvalidSource { .. })
            })
    }
}

/// Drives the core state machine until every requested run has finished.
pub(crate) fn run_session(
    runner: &EffectRunner,
    request: Msg,
    interrupts: &mpsc::Receiver<Msg>,
) -> SessionReport {
    let mut state = AppState::new();
    let mut report = SessionReport::default();
    let mut last_status = None;
    let mut inbox = VecDeque::from([request]);

    loop {
        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(std::mem::take(&mut state), msg);
            state = next;
            for notice in state.take_notices() {
                print_notice(&notice);
                report.notices.push(notice);
            }
            if state.consume_dirty() {
                let status = state.view().status_line();
                if status != last_status {
                    if let Some(line) = &status {
                        eprintln!("{line}");
                    }
                    last_status = status;
                }
            }
            runner.enqueue(effects);
        }
        if state.is_settled() {
            break;
        }
        inbox.extend(interrupts.try_iter());
        inbox.push_back(runner.next_msg(POLL_INTERVAL).unwrap_or(Msg::Tick));
    }

    report.outcomes = state.outcomes().to_vec();
    report
}

/// Turns Ctrl-C into cancel requests.
pub(crate) fn spawn_interrupt_listener(tx: mpsc::Sender<Msg>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("folio-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                while tokio::signal::ctrl_c().await.is_ok() {
                    engine_debug!("Interrupt received");
                    if tx.send(Msg::CancelRequested).is_err() {
                        break;
                    }
                }
            });
        })?;
    Ok(())
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Busy => engine_warn!("Another run is still in progress; request ignored"),
        Notice::EmptySource => eprintln!("error: source location is empty"),
        Notice::InvalidSource { source, reason } => {
            eprintln!("error: cannot harvest {source:?}: {reason}")
        }
        Notice::NothingToCancel => eprintln!("nothing to cancel"),
        Notice::AssemblySkipped => eprintln!("harvest did not complete, skipping assembly"),
    }
}

pub(crate) fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Harvested {
            destination,
            saved,
            failures,
            cancelled,
            ..
        } => {
            let verb = if *cancelled { "cancelled after saving" } else { "saved" };
            println!(
                "harvest {verb} {saved} image(s) to {}",
                destination.display()
            );
            if !failures.is_empty() {
                println!("{} image(s) could not be saved:", failures.len());
                for failure in failures {
                    println!("  #{}: {}", failure.order, failure.reason);
                }
            }
        }
        RunOutcome::Assembled { output, pages, .. } => {
            println!("wrote {pages} page(s) to {}", output.display());
        }
        RunOutcome::Failed { kind, message, .. } => {
            let what = match kind {
                RunKind::Harvest => "harvest",
                RunKind::Assemble => "assembly",
            };
            eprintln!("error: {what} failed: {message}");
        }
    }
}
