mod common;

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use folio_engine::{
    assemble, EngineEvent, FailureKind, FetchSettings, HarvestError, HarvestSettings, Harvester,
    ImageFailureKind, ProgressSink, ReqwestFetcher, RunProgress, Stage, MANIFEST_FILENAME,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn harvester(delay: Duration) -> Harvester {
    Harvester::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::for_documents())),
        Arc::new(ReqwestFetcher::new(FetchSettings::for_images())),
        HarvestSettings {
            image_delay: delay,
            write_manifest: true,
        },
    )
    .with_clock(Arc::new(|| "2024-01-01T00:00:00Z".to_string()))
}

async fn mount_page(server: &MockServer, html: String) {
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, at: &str, bytes: Vec<u8>, mime: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes, mime))
        .mount(server)
        .await;
}

fn stored_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != MANIFEST_FILENAME)
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn failing_image_is_skipped_and_reported() {
    common::init_logging();
    let server = MockServer::start().await;
    let host = server.address().to_string();
    let html = format!(
        r#"<html><body>
            <img data-src="/img/one" src="/placeholder.svg">
            <img src="/img/two.png">
            <img src="//{host}/img/three">
        </body></html>"#
    );
    mount_page(&server, html).await;
    mount_image(&server, "/img/one", common::png_bytes(4, 3), "image/png").await;
    Mock::given(method("GET"))
        .and(path("/img/two.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_image(&server, "/img/three", common::gif_bytes(2, 2), "image/gif").await;

    let temp = TempDir::new().unwrap();
    let sink = TestSink::default();
    let source = format!("{}/article", server.uri());

    let report = harvester(Duration::ZERO)
        .harvest(1, &source, temp.path(), &sink, &CancellationToken::new())
        .await
        .expect("run completes despite a failed image");

    assert_eq!(stored_names(temp.path()), vec!["1.png", "3.gif"]);
    assert_eq!(report.total_tags, 3);
    assert_eq!(report.saved.iter().map(|s| s.order).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.order, 2);
    assert_eq!(failure.kind, ImageFailureKind::Fetch(FailureKind::HttpStatus(404)));
    assert_eq!(
        failure.resolved_url.as_deref(),
        Some(format!("{}/img/two.png", server.uri()).as_str())
    );
    assert!(!report.cancelled);

    let events = sink.take();
    let failed_orders: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::ImageFailed { failure, .. } => Some(failure.order),
            _ => None,
        })
        .collect();
    assert_eq!(failed_orders, vec![2]);
    let saved_orders: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::ImageSaved { image, .. } => Some(image.order),
            _ => None,
        })
        .collect();
    assert_eq!(saved_orders, vec![1, 3]);
}

#[tokio::test]
async fn tags_without_source_leave_gaps_in_order() {
    let server = MockServer::start().await;
    let html = r#"<img><img src="  "><img src="/a.jpg"><img data-src="" src="/b.webp">"#;
    mount_page(&server, html.to_string()).await;
    mount_image(&server, "/a.jpg", common::jpeg_bytes(3, 3), "image/jpeg").await;
    mount_image(&server, "/b.webp", vec![1, 2, 3], "application/octet-stream").await;

    let temp = TempDir::new().unwrap();
    let report = harvester(Duration::ZERO)
        .harvest(
            2,
            &format!("{}/article", server.uri()),
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.total_tags, 4);
    assert_eq!(report.missing_source, vec![1, 2]);
    assert_eq!(stored_names(temp.path()), vec!["3.jpg", "4.webp"]);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn image_urls_keep_only_format_parameters() {
    let server = MockServer::start().await;
    let html = r#"<img data-src="/mmbiz/640?wx_fmt=png&from=appmsg&tp=webp&wxfrom=5">"#;
    mount_page(&server, html.to_string()).await;
    mount_image(&server, "/mmbiz/640", common::png_bytes(2, 2), "image/png").await;

    let temp = TempDir::new().unwrap();
    let report = harvester(Duration::ZERO)
        .harvest(
            3,
            &format!("{}/article", server.uri()),
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.saved[0].url,
        format!("{}/mmbiz/640?wx_fmt=png&tp=webp", server.uri())
    );
    let requests = server.received_requests().await.unwrap();
    let image_request = requests
        .iter()
        .find(|r| r.url.path() == "/mmbiz/640")
        .expect("image requested");
    assert_eq!(image_request.url.query(), Some("wx_fmt=png&tp=webp"));
}

#[tokio::test]
async fn unreachable_document_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let err = harvester(Duration::ZERO)
        .harvest(
            4,
            &format!("{}/article", server.uri()),
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        HarvestError::Fetch(fetch) => assert_eq!(fetch.kind, FailureKind::HttpStatus(500)),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(stored_names(temp.path()).is_empty());
}

#[tokio::test]
async fn blank_source_aborts_before_any_request() {
    let temp = TempDir::new().unwrap();
    let err = harvester(Duration::ZERO)
        .harvest(5, "   \n", temp.path(), &TestSink::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::EmptySource));

    let err = harvester(Duration::ZERO)
        .harvest(
            5,
            "ftp://example.com/a",
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    match err {
        HarvestError::Fetch(fetch) => assert_eq!(fetch.kind, FailureKind::InvalidUrl),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn requests_are_spaced_by_the_configured_delay() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<img src="/1.png"><img src="/2.png">"#.to_string()).await;
    mount_image(&server, "/1.png", common::png_bytes(1, 1), "image/png").await;
    mount_image(&server, "/2.png", common::png_bytes(1, 1), "image/png").await;

    let temp = TempDir::new().unwrap();
    let started = Instant::now();
    let report = harvester(Duration::from_millis(150))
        .harvest(
            6,
            &format!("{}/article", server.uri()),
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.saved.len(), 2);
    // document -> image 1 -> image 2, each gap at least the delay
    assert!(started.elapsed() >= Duration::from_millis(300));
}

/// Cancels the run as soon as `trigger` matches an emitted event.
struct CancellingSink {
    cancel: CancellationToken,
    trigger: fn(&EngineEvent) -> bool,
}

impl ProgressSink for CancellingSink {
    fn emit(&self, event: EngineEvent) {
        if (self.trigger)(&event) {
            self.cancel.cancel();
        }
    }
}

#[tokio::test]
async fn cancelled_run_keeps_written_files_and_reports_cancel() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<img src="/1.png"><img src="/2.png">"#.to_string()).await;
    mount_image(&server, "/1.png", common::png_bytes(1, 1), "image/png").await;
    mount_image(&server, "/2.png", common::png_bytes(1, 1), "image/png").await;

    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let sink = CancellingSink {
        cancel: cancel.clone(),
        trigger: |event| matches!(event, EngineEvent::ImageSaved { .. }),
    };

    let report = harvester(Duration::ZERO)
        .harvest(7, &format!("{}/article", server.uri()), temp.path(), &sink, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(stored_names(temp.path()), vec!["1.png"]);
}

#[tokio::test]
async fn cancel_interrupts_the_request_spacing_wait() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<img src="/1.png">"#.to_string()).await;
    mount_image(&server, "/1.png", common::png_bytes(1, 1), "image/png").await;

    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let sink = CancellingSink {
        cancel: cancel.clone(),
        trigger: |event| {
            matches!(
                event,
                EngineEvent::Progress(RunProgress {
                    stage: Stage::DownloadingImages,
                    ..
                })
            )
        },
    };

    let started = Instant::now();
    let report = harvester(Duration::from_secs(30))
        .harvest(8, &format!("{}/article", server.uri()), temp.path(), &sink, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.saved.is_empty());
    assert!(stored_names(temp.path()).is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn manifest_records_saved_and_failed_images() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        r#"<img src="/ok.png"><img src="data:image/png;base64,AAAA">"#.to_string(),
    )
    .await;
    mount_image(&server, "/ok.png", common::png_bytes(1, 1), "image/png").await;

    let temp = TempDir::new().unwrap();
    let report = harvester(Duration::ZERO)
        .harvest(
            9,
            &format!("{}/article", server.uri()),
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.failures[0].kind, ImageFailureKind::UnsupportedScheme);

    let manifest = fs::read_to_string(temp.path().join(MANIFEST_FILENAME)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(json["total_tags"], 2);
    assert_eq!(json["document_url"], format!("{}/article", server.uri()));
    assert_eq!(json["document_redirects"], 0);
    assert_eq!(json["harvested_utc"], "2024-01-01T00:00:00Z");
    assert_eq!(json["saved"][0]["order"], 1);
    assert_eq!(json["saved"][0]["sha256"].as_str().unwrap().len(), 64);
    assert_eq!(json["failures"][0]["order"], 2);
}

#[tokio::test]
async fn second_harvest_replaces_earlier_pages() {
    let first = MockServer::start().await;
    mount_page(
        &first,
        r#"<img src="/1.png"><img src="/2.png"><img src="/3.png">"#.to_string(),
    )
    .await;
    for at in ["/1.png", "/2.png", "/3.png"] {
        mount_image(&first, at, common::png_bytes(4, 4), "image/png").await;
    }
    let second = MockServer::start().await;
    mount_page(&second, r#"<img src="/photo">"#.to_string()).await;
    mount_image(&second, "/photo", common::jpeg_bytes(6, 6), "image/jpeg").await;

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("notes.txt"), b"keep me").unwrap();
    let harvester = harvester(Duration::ZERO);
    for (run_id, server) in [(1, &first), (2, &second)] {
        harvester
            .harvest(
                run_id,
                &format!("{}/article", server.uri()),
                temp.path(),
                &TestSink::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    assert_eq!(stored_names(temp.path()), vec!["1.jpg", "notes.txt"]);
    let summary = assemble(temp.path(), &temp.path().join("out.pdf")).unwrap();
    assert_eq!(summary.page_count, 1);
}

#[tokio::test]
async fn unwritable_image_is_reported_and_run_continues() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<img src="/1"><img src="/2">"#.to_string()).await;
    mount_image(&server, "/1", common::png_bytes(2, 2), "image/png").await;
    mount_image(&server, "/2", common::png_bytes(2, 2), "image/png").await;

    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("1.png")).unwrap();

    let report = harvester(Duration::ZERO)
        .harvest(
            10,
            &format!("{}/article", server.uri()),
            temp.path(),
            &TestSink::default(),
            &CancellationToken::new(),
        )
        .await
        .expect("write failures do not fail the run");

    assert_eq!(report.saved.iter().map(|s| s.order).collect::<Vec<_>>(), vec![2]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].order, 1);
    assert_eq!(report.failures[0].kind, ImageFailureKind::Write);
    assert!(temp.path().join("1.png").is_dir());
    assert!(temp.path().join("2.png").is_file());
}
