use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::decode_html;
use crate::extract::extract_images;
use crate::fetch::Fetcher;
use crate::filename::{order_digits, stored_image_name};
use crate::format::{infer_extension, is_page_extension};
use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};
use crate::resolve::{resolve_image_url, ResolveError};
use crate::{
    EngineEvent, FailureKind, FetchError, ImageFailure, ImageFailureKind, ImageReference, RunId,
    RunProgress, SavedImage, Stage,
};

/// Written next to the images when [`HarvestSettings::write_manifest`] is set.
pub const MANIFEST_FILENAME: &str = "harvest_manifest.json";

/// Produces the timestamp recorded in reports.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

pub fn unix_clock() -> Clock {
    Arc::new(|| {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        format!("unix:{secs}")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Minimum spacing between consecutive requests to the source host.
    pub image_delay: Duration,
    pub write_manifest: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            image_delay: Duration::from_millis(500),
            write_manifest: true,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Outcome of a completed run. Per-image problems live in `failures`; the run
/// itself still counts as a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub source: String,
    pub document_url: String,
    pub document_redirects: usize,
    pub encoding: String,
    pub destination: PathBuf,
    pub harvested_utc: String,
    pub total_tags: usize,
    pub references: Vec<ImageReference>,
    pub missing_source: Vec<usize>,
    pub saved: Vec<SavedImage>,
    pub failures: Vec<ImageFailure>,
    pub cancelled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("source location is empty")]
    EmptySource,
    #[error("failed to fetch source document: {0}")]
    Fetch(#[from] FetchError),
    #[error("destination folder unusable: {0}")]
    Write(#[from] PersistError),
}

pub struct Harvester {
    document_fetcher: Arc<dyn Fetcher>,
    image_fetcher: Arc<dyn Fetcher>,
    settings: HarvestSettings,
    clock: Clock,
}

impl Harvester {
    pub fn new(
        document_fetcher: Arc<dyn Fetcher>,
        image_fetcher: Arc<dyn Fetcher>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            document_fetcher,
            image_fetcher,
            settings,
            clock: unix_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one harvest: document, references, images, optional manifest.
    ///
    /// Page files left in `destination` by an earlier run are removed once
    /// the document has been fetched.
    ///
    /// Only an empty source, an unusable destination or an unreachable
    /// document fail the run. Cancellation is observed between images and
    /// while waiting out the request spacing.
    pub async fn harvest(
        &self,
        run_id: RunId,
        source: &str,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<HarvestReport, HarvestError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(HarvestError::EmptySource);
        }
        let source_url = parse_source(source)?;
        ensure_output_dir(destination)?;
        let writer = AtomicFileWriter::new(destination.to_path_buf());

        emit_stage(sink, run_id, Stage::FetchingDocument, None);
        engine_info!("Run {} fetching document {}", run_id, source_url);
        let document = self.document_fetcher.fetch(source_url.as_str()).await?;
        let mut last_request = Instant::now();

        let decoded = decode_html(&document.bytes, document.metadata.content_type.as_deref());
        let extracted = extract_images(&decoded.html);
        engine_info!(
            "Run {} found {} <img> tags, {} usable",
            run_id,
            extracted.total_tags,
            extracted.references.len()
        );
        if !extracted.missing_source.is_empty() {
            engine_debug!(
                "Run {} skipped tags without source: {:?}",
                run_id,
                extracted.missing_source
            );
        }
        emit_stage(sink, run_id, Stage::Extracting, Some(extracted.total_tags));

        let mut report = HarvestReport {
            source: source.to_string(),
            document_url: document.metadata.final_url.clone(),
            document_redirects: document.metadata.redirect_count,
            encoding: decoded.encoding_label,
            destination: destination.to_path_buf(),
            harvested_utc: (self.clock)(),
            total_tags: extracted.total_tags,
            references: extracted.references.clone(),
            missing_source: extracted.missing_source,
            saved: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        };

        clear_stale_pages(run_id, destination)?;
        emit_stage(sink, run_id, Stage::DownloadingImages, Some(report.references.len()));
        for reference in &extracted.references {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let resolved = match resolve_image_url(&reference.raw_url, &source_url) {
                Ok(url) => url,
                Err(err) => {
                    let kind = match err {
                        ResolveError::Invalid { .. } => ImageFailureKind::InvalidUrl,
                        ResolveError::UnsupportedScheme { .. } => {
                            ImageFailureKind::UnsupportedScheme
                        }
                    };
                    self.record_failure(
                        &mut report,
                        sink,
                        run_id,
                        failure(reference, None, kind, err.to_string()),
                    );
                    continue;
                }
            };

            let wait = self
                .settings
                .image_delay
                .saturating_sub(last_request.elapsed());
            if !wait.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                }
            }

            let fetched = self.image_fetcher.fetch(resolved.as_str()).await;
            last_request = Instant::now();
            let output = match fetched {
                Ok(output) => output,
                Err(err) => {
                    self.record_failure(
                        &mut report,
                        sink,
                        run_id,
                        failure(
                            reference,
                            Some(&resolved),
                            ImageFailureKind::Fetch(err.kind.clone()),
                            err.message,
                        ),
                    );
                    continue;
                }
            };

            let content_type = output.metadata.content_type;
            let ext = infer_extension(content_type.as_deref(), &resolved);
            let name = stored_image_name(reference.order, &ext);
            match writer.write(&name, &output.bytes) {
                Ok(path) => {
                    engine_info!("Run {} saved {:?}", run_id, path);
                    let image = SavedImage {
                        order: reference.order,
                        url: resolved.to_string(),
                        path,
                        content_type,
                        bytes: output.bytes.len() as u64,
                        sha256: sha256_hex(&output.bytes),
                    };
                    sink.emit(EngineEvent::ImageSaved {
                        run_id,
                        image: image.clone(),
                    });
                    report.saved.push(image);
                }
                Err(err) => {
                    self.record_failure(
                        &mut report,
                        sink,
                        run_id,
                        failure(
                            reference,
                            Some(&resolved),
                            ImageFailureKind::Write,
                            err.to_string(),
                        ),
                    );
                }
            }
        }

        if report.cancelled {
            engine_warn!(
                "Run {} cancelled after {} saved image(s)",
                run_id,
                report.saved.len()
            );
        }
        if self.settings.write_manifest {
            self.write_manifest(&writer, &report);
        }
        engine_info!(
            "Run {} finished: {} saved, {} failed",
            run_id,
            report.saved.len(),
            report.failures.len()
        );
        emit_stage(sink, run_id, Stage::Done, Some(report.references.len()));
        Ok(report)
    }

    fn record_failure(
        &self,
        report: &mut HarvestReport,
        sink: &dyn ProgressSink,
        run_id: RunId,
        failure: ImageFailure,
    ) {
        engine_warn!(
            "Run {} image #{} skipped ({}): {}",
            run_id,
            failure.order,
            failure.kind,
            failure.message
        );
        sink.emit(EngineEvent::ImageFailed {
            run_id,
            failure: failure.clone(),
        });
        report.failures.push(failure);
    }

    fn write_manifest(&self, writer: &AtomicFileWriter, report: &HarvestReport) {
        let json = match serde_json::to_string_pretty(report) {
            Ok(json) => json,
            Err(err) => {
                engine_warn!("Failed to serialize harvest manifest: {}", err);
                return;
            }
        };
        if let Err(err) = writer.write(MANIFEST_FILENAME, json) {
            engine_warn!(
                "Failed to write harvest manifest in {:?}: {}",
                writer.dir(),
                err
            );
        }
    }
}

/// Removes regular files with a numeric stem and a page extension.
fn clear_stale_pages(run_id: RunId, dir: &Path) -> Result<(), PersistError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let page_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(is_page_extension);
        if page_ext && order_digits(name).is_some() {
            fs::remove_file(&path)?;
            engine_info!("Run {} removed stale page {:?}", run_id, path);
        }
    }
    Ok(())
}

fn parse_source(source: &str) -> Result<Url, FetchError> {
    let url = Url::parse(source)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::new(
            FailureKind::InvalidUrl,
            format!("unsupported scheme {other:?}"),
        )),
    }
}

fn failure(
    reference: &ImageReference,
    resolved: Option<&Url>,
    kind: ImageFailureKind,
    message: String,
) -> ImageFailure {
    ImageFailure {
        order: reference.order,
        raw_url: reference.raw_url.clone(),
        resolved_url: resolved.map(Url::to_string),
        kind,
        message,
    }
}

fn emit_stage(sink: &dyn ProgressSink, run_id: RunId, stage: Stage, total: Option<usize>) {
    sink.emit(EngineEvent::Progress(RunProgress {
        run_id,
        stage,
        total,
    }));
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
