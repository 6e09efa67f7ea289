//! Folio core: pure driver state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::{AssembleOutcome, HarvestOutcome, Msg};
pub use state::{
    default_output_path, AppState, FailedImage, Notice, RunId, RunKind, RunOutcome,
    SessionState, Stage,
};
pub use update::update;
pub use view_model::AppViewModel;
