use crate::{Notice, RunId, RunKind, RunOutcome, SessionState, Stage};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub run_id: Option<RunId>,
    pub kind: Option<RunKind>,
    pub stage: Option<Stage>,
    pub total: Option<usize>,
    pub saved: usize,
    pub failed: usize,
    pub notices: Vec<Notice>,
    pub outcomes: Vec<RunOutcome>,
    pub dirty: bool,
}

impl AppViewModel {
    /// One-line progress summary for the active run.
    pub fn status_line(&self) -> Option<String> {
        let run_id = self.run_id?;
        let stage = self.stage.unwrap_or_default();
        let line = match (self.session, stage) {
            (SessionState::Cancelling, _) => format!("run {run_id}: cancelling"),
            (_, Stage::DownloadingImages) => {
                let done = self.saved + self.failed;
                match self.total {
                    Some(total) => format!(
                        "run {run_id}: images {done}/{total} ({} saved, {} failed)",
                        self.saved, self.failed
                    ),
                    None => format!("run {run_id}: images {done}"),
                }
            }
            (_, stage) => format!("run {run_id}: {}", stage_label(stage)),
        };
        Some(line)
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Queued => "queued",
        Stage::FetchingDocument => "fetching document",
        Stage::Extracting => "extracting image references",
        Stage::DownloadingImages => "downloading images",
        Stage::Assembling => "assembling pages",
        Stage::Done => "done",
    }
}
