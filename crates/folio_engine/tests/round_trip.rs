mod common;

use std::sync::Arc;
use std::time::Duration;

use folio_engine::{
    assemble, EngineEvent, FetchSettings, HarvestSettings, Harvester, ProgressSink,
    ReqwestFetcher,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Discard;

impl ProgressSink for Discard {
    fn emit(&self, _event: EngineEvent) {}
}

#[tokio::test]
async fn harvested_images_assemble_in_extraction_order() {
    common::init_logging();
    let server = MockServer::start().await;
    // Widths encode the extraction position so page order is observable.
    let images = [
        ("/p/a", common::jpeg_bytes(11, 7), "image/jpeg"),
        ("/p/b", common::png_bytes(12, 7), "image/png"),
        ("/p/c", common::gif_bytes(13, 7), "image/gif"),
        ("/p/d", common::png_bytes(14, 7), "image/png"),
        ("/p/e", common::jpeg_bytes(15, 7), "image/jpeg"),
        ("/p/f", common::png_bytes(16, 7), "image/png"),
        ("/p/g", common::png_bytes(17, 7), "image/png"),
        ("/p/h", common::jpeg_bytes(18, 7), "image/jpeg"),
        ("/p/i", common::png_bytes(19, 7), "image/png"),
        ("/p/j", common::png_bytes(20, 7), "image/png"),
        ("/p/k", common::png_bytes(21, 7), "image/png"),
    ];
    let mut html = String::from("<html><body>");
    for (at, bytes, mime) in &images {
        html.push_str(&format!(r#"<p><img data-src="{at}?wx_fmt=x&seed=1"></p>"#));
        Mock::given(method("GET"))
            .and(path(*at))
            .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.clone(), mime))
            .mount(&server)
            .await;
    }
    html.push_str("</body></html>");
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let folder = temp.path().join("harvested");
    let harvester = Harvester::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::for_documents())),
        Arc::new(ReqwestFetcher::new(FetchSettings::for_images())),
        HarvestSettings {
            image_delay: Duration::ZERO,
            write_manifest: true,
        },
    );
    let report = harvester
        .harvest(
            1,
            &format!("{}/post", server.uri()),
            &folder,
            &Discard,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.saved.len(), images.len());
    assert!(report.failures.is_empty());

    let output = temp.path().join("harvested.pdf");
    let summary = assemble(&folder, &output).unwrap();

    assert_eq!(summary.page_count, images.len());
    let widths: Vec<i64> = common::pdf_page_sizes(&output)
        .into_iter()
        .map(|(w, _)| w)
        .collect();
    assert_eq!(widths, (11..=21).collect::<Vec<i64>>());
}
