use std::path::PathBuf;

use crate::RunId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartHarvest {
        run_id: RunId,
        source: String,
        destination: PathBuf,
    },
    CancelHarvest {
        run_id: RunId,
    },
    StartAssemble {
        run_id: RunId,
        folder: PathBuf,
        output: PathBuf,
    },
}
