//! Folio engine: image harvesting and PDF assembly.
mod assemble;
mod decode;
mod engine;
mod extract;
mod fetch;
mod filename;
mod format;
mod harvest;
mod pdf;
mod persist;
mod resolve;
mod types;

pub use assemble::{assemble, collect_image_set, AssembleError, AssembleSummary};
pub use decode::{decode_html, DecodedHtml};
pub use engine::{EngineConfig, EngineHandle};
pub use extract::{extract_images, ExtractedImages};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, BROWSER_USER_AGENT};
pub use filename::{compare_page_names, order_digits, stored_image_name};
pub use format::{
    extension_for_content_type, infer_extension, is_page_extension, DEFAULT_EXTENSION,
    PAGE_EXTENSIONS,
};
pub use harvest::{
    unix_clock, ChannelProgressSink, Clock, HarvestError, HarvestReport, HarvestSettings,
    Harvester, ProgressSink, MANIFEST_FILENAME,
};
pub use pdf::{PageImage, PdfBuilder, PdfError, MAX_PAGE_SIDE};
pub use persist::{ensure_output_dir, split_output_path, AtomicFileWriter, PersistError};
pub use resolve::{clean_query, resolve_image_url, ResolveError, ALLOWED_QUERY_KEYS};
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, ImageFailure,
    ImageFailureKind, ImageReference, RunId, RunProgress, SavedImage, Stage,
};
