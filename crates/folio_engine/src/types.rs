use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::assemble::{AssembleError, AssembleSummary};
use crate::harvest::{HarvestError, HarvestReport};

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Queued,
    FetchingDocument,
    Extracting,
    DownloadingImages,
    Assembling,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProgress {
    pub run_id: RunId,
    pub stage: Stage,
    /// Number of `<img>` tags seen in the source document, once known.
    pub total: Option<usize>,
}

/// One extracted `<img>` reference, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    /// 1-based position among all `<img>` tags of the document.
    pub order: usize,
    pub raw_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedImage {
    pub order: usize,
    pub url: String,
    pub path: PathBuf,
    pub content_type: Option<String>,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFailure {
    pub order: usize,
    pub raw_url: String,
    pub resolved_url: Option<String>,
    pub kind: ImageFailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImageFailureKind {
    InvalidUrl,
    UnsupportedScheme,
    Fetch(FailureKind),
    Write,
}

impl fmt::Display for ImageFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFailureKind::InvalidUrl => write!(f, "invalid url"),
            ImageFailureKind::UnsupportedScheme => write!(f, "unsupported url scheme"),
            ImageFailureKind::Fetch(kind) => write!(f, "fetch failed: {kind}"),
            ImageFailureKind::Write => write!(f, "write failed"),
        }
    }
}

#[derive(Debug)]
pub enum EngineEvent {
    Progress(RunProgress),
    ImageSaved {
        run_id: RunId,
        image: SavedImage,
    },
    ImageFailed {
        run_id: RunId,
        failure: ImageFailure,
    },
    HarvestCompleted {
        run_id: RunId,
        result: Result<HarvestReport, HarvestError>,
    },
    AssembleCompleted {
        run_id: RunId,
        result: Result<AssembleSummary, AssembleError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
