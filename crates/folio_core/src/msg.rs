use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to harvest the images of `source` into `destination`.
    HarvestRequested { source: String, destination: PathBuf },
    /// User asked to merge a folder of images into one PDF. `None` picks the
    /// default output path inside the folder.
    AssembleRequested {
        folder: PathBuf,
        output: Option<PathBuf>,
    },
    /// Harvest, then assemble the harvested folder if the harvest completed.
    PipelineRequested {
        source: String,
        destination: PathBuf,
        output: Option<PathBuf>,
    },
    /// User interrupted the running harvest.
    CancelRequested,
    /// Render tick.
    Tick,
    /// Engine progress for a run.
    RunProgress {
        run_id: crate::RunId,
        stage: crate::Stage,
        total: Option<usize>,
    },
    ImageSaved {
        run_id: crate::RunId,
        order: usize,
        path: PathBuf,
    },
    ImageFailed {
        run_id: crate::RunId,
        order: usize,
        reason: String,
    },
    HarvestFinished {
        run_id: crate::RunId,
        outcome: HarvestOutcome,
    },
    AssembleFinished {
        run_id: crate::RunId,
        outcome: AssembleOutcome,
    },
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome {
    Completed {
        destination: PathBuf,
        saved: usize,
        cancelled: bool,
    },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleOutcome {
    Completed { output: PathBuf, pages: usize },
    Failed(String),
}
