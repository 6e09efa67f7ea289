use std::path::{Path, PathBuf};

use crate::view_model::AppViewModel;

pub type RunId = u64;

/// What the driver is doing right now. Only one run is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Harvesting,
    /// Cancel sent, waiting for the harvest to wind down.
    Cancelling,
    Assembling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Queued,
    FetchingDocument,
    Extracting,
    DownloadingImages,
    Assembling,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Harvest,
    Assemble,
}

/// Requests the state machine turned down, for the driver to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Another run is in flight.
    Busy,
    EmptySource,
    InvalidSource { source: String, reason: String },
    NothingToCancel,
    /// The harvest did not complete, so the follow-up assembly was dropped.
    AssemblySkipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedImage {
    pub order: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Harvested {
        run_id: RunId,
        destination: PathBuf,
        saved: usize,
        failures: Vec<FailedImage>,
        cancelled: bool,
    },
    Assembled {
        run_id: RunId,
        output: PathBuf,
        pages: usize,
    },
    Failed {
        run_id: RunId,
        kind: RunKind,
        message: String,
    },
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActiveRun {
    pub(crate) run_id: RunId,
    pub(crate) kind: RunKind,
    pub(crate) stage: Stage,
    pub(crate) total: Option<usize>,
    pub(crate) saved: usize,
    pub(crate) failures: Vec<FailedImage>,
}

impl ActiveRun {
    fn new(run_id: RunId, kind: RunKind) -> Self {
        Self {
            run_id,
            kind,
            stage: Stage::Queued,
            total: None,
            saved: 0,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    session: SessionState,
    next_run_id: RunId,
    active: Option<ActiveRun>,
    /// Output path of the assembly queued behind the running harvest.
    pending_assembly: Option<PathBuf>,
    notices: Vec<Notice>,
    outcomes: Vec<RunOutcome>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// True when nothing is running and nothing is queued.
    pub fn is_settled(&self) -> bool {
        self.session == SessionState::Idle && self.pending_assembly.is_none()
    }

    pub fn active_run_id(&self) -> Option<RunId> {
        self.active.as_ref().map(|run| run.run_id)
    }

    pub fn outcomes(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    pub fn view(&self) -> AppViewModel {
        let active = self.active.as_ref();
        AppViewModel {
            session: self.session,
            run_id: active.map(|run| run.run_id),
            kind: active.map(|run| run.kind),
            stage: active.map(|run| run.stage),
            total: active.and_then(|run| run.total),
            saved: active.map_or(0, |run| run.saved),
            failed: active.map_or(0, |run| run.failures.len()),
            notices: self.notices.clone(),
            outcomes: self.outcomes.clone(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        self.mark_dirty();
    }

    pub(crate) fn begin_run(&mut self, kind: RunKind) -> RunId {
        self.next_run_id += 1;
        let run_id = self.next_run_id;
        self.active = Some(ActiveRun::new(run_id, kind));
        self.session = match kind {
            RunKind::Harvest => SessionState::Harvesting,
            RunKind::Assemble => SessionState::Assembling,
        };
        self.mark_dirty();
        run_id
    }

    pub(crate) fn begin_cancel(&mut self) -> Option<RunId> {
        if self.session != SessionState::Harvesting {
            return None;
        }
        self.session = SessionState::Cancelling;
        self.pending_assembly = None;
        self.mark_dirty();
        self.active_run_id()
    }

    /// Mutable access to the active run, only when `run_id` matches it.
    /// Events from stale runs are ignored.
    pub(crate) fn run_mut(&mut self, run_id: RunId) -> Option<&mut ActiveRun> {
        self.active.as_mut().filter(|run| run.run_id == run_id)
    }

    pub(crate) fn finish_run(&mut self, run_id: RunId) -> Option<ActiveRun> {
        if self.active_run_id() != Some(run_id) {
            return None;
        }
        self.session = SessionState::Idle;
        self.mark_dirty();
        self.active.take()
    }

    pub(crate) fn record_outcome(&mut self, outcome: RunOutcome) {
        self.outcomes.push(outcome);
        self.mark_dirty();
    }

    pub(crate) fn queue_assembly(&mut self, output: PathBuf) {
        self.pending_assembly = Some(output);
    }

    pub(crate) fn take_pending_assembly(&mut self) -> Option<PathBuf> {
        self.pending_assembly.take()
    }
}

/// `<folder>/<folder name>.pdf`, falling back to `folio.pdf` when the folder
/// has no final component (`.`, `/`).
pub fn default_output_path(folder: &Path) -> PathBuf {
    let stem = folder
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("folio");
    folder.join(format!("{stem}.pdf"))
}
