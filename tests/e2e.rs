//! End-to-end integration tests for thread2pdf.
//!
//! The offline tests serve the JSON in `tests/fixtures/` from a throwaway
//! local HTTP listener and point the client at it through `api_base_url`, so
//! the whole fetch → expand → flatten → render path runs without Reddit.
//!
//! The live tests hit Reddit (and pdfium for PDF output). They are gated
//! behind `E2E_ENABLED` and need a thread to export:
//!
//!   E2E_ENABLED=1 E2E_THREAD_URL=https://www.reddit.com/r/.../comments/.../.../ \
//!     PDFIUM_LIB_PATH=/path/to/lib cargo test --test e2e -- --nocapture

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thread2pdf::pipeline::flatten::HEADER_LINES;
use thread2pdf::{
    export, export_to_file, fetch_thread, render_thread, ExportConfig, ExportError,
    ExportProgressCallback, ExportStage, ExportStats, OutputFormat, ThreadFlattener,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const THREAD_URL: &str = "https://www.reddit.com/r/test/comments/abc/test_thread/";

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

/// Canned responses keyed by path prefix; everything else is a 404.
struct FakeReddit {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeReddit {
    async fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    let mut wanted = None;
                    while read < buf.len() {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if wanted.is_none() {
                            wanted = request_len(&buf[..read]);
                        }
                        if wanted.is_some_and(|len| read >= len) {
                            break;
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..read]).to_string();
                    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    log.lock().unwrap().push(target.clone());

                    let (status, body) = routes
                        .iter()
                        .find(|(prefix, _, _)| target.starts_with(prefix))
                        .map(|(_, status, body)| (*status, body.clone()))
                        .unwrap_or((404, r#"{"message": "Not Found", "error": 404}"#.into()));
                    let response = format!(
                        "HTTP/1.1 {status} STATUS\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    socket.write_all(response.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    async fn with_fixtures() -> Self {
        Self::start(vec![
            ("/comments/abc.json", 200, fixture("thread.json")),
            ("/comments/abc/_/c1a.json", 200, fixture("continue_c1a.json")),
            ("/api/morechildren.json", 200, fixture("morechildren.json")),
        ])
        .await
    }

    fn config(&self) -> thread2pdf::ExportConfigBuilder {
        ExportConfig::builder()
            .api_base_url(self.base_url.clone())
            .request_timeout_secs(5)
            .retry_backoff_ms(1)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Total request size once the head is complete: head plus `Content-Length`.
fn request_len(buf: &[u8]) -> Option<usize> {
    let end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
    let body = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(end + body)
}

/// Skip this test unless E2E_ENABLED and E2E_THREAD_URL are set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match std::env::var("E2E_THREAD_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("SKIP: set E2E_THREAD_URL to a thread to export");
                return;
            }
        }
    }};
}

const EXPECTED_COMMENT_LINES: [&str; 7] = [
    "* First comment  with two lines [Author: bob] [Upvotes: 5]",
    "    * reply [Author: carol] [Upvotes: 3]",
    "        * from the continued thread [Author: jack] [Upvotes: 2]",
    "        * defends dave [Author: erin] [Upvotes: 4]",
    "* late but loved [Author: gina] [Upvotes: 7]",
    "    * agreed [Author: hank] [Upvotes: 1]",
    "* zero points [Author: [deleted]] [Upvotes: 0]",
];

// ── Offline: fetch + expand ──────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_resolves_every_placeholder() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().build().unwrap();

    let fetched = fetch_thread(THREAD_URL, &config).await.unwrap();

    assert_eq!(fetched.thread.submission.title, "Test Thread");
    assert_eq!(fetched.thread.comment_count(), 9);
    assert_eq!(fetched.expansion_requests, 2);
    assert_eq!(fetched.unresolved_placeholders, 0);

    let requests = reddit.requests();
    assert_eq!(requests.len(), 3, "{requests:?}");
    assert!(requests[0].starts_with("/comments/abc.json?"));
    assert!(requests[0].contains("sort=confidence"));
    assert!(requests[1].starts_with("/comments/abc/_/c1a.json"));
    assert!(requests[2].contains("link_id=t3_abc"));
    assert!(requests[2].contains("children=c3%2Cc4"));
}

#[tokio::test]
async fn test_outline_matches_expected_lines() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().build().unwrap();
    let fetched = fetch_thread(THREAD_URL, &config).await.unwrap();

    let outline = ThreadFlattener::from_config(&config).flatten(&fetched.thread);

    assert_eq!(outline.header.len(), HEADER_LINES);
    assert_eq!(outline.header[0], "# Test Thread #");
    assert_eq!(outline.header[5], "");
    assert_eq!(outline.comments, EXPECTED_COMMENT_LINES);
    assert_eq!(outline.len(), HEADER_LINES + 7);
    assert_eq!(outline.hidden, 2);
}

#[tokio::test]
async fn test_expansion_limit_drops_remaining_placeholders() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().more_comments_limit(Some(1)).build().unwrap();

    let fetched = fetch_thread(THREAD_URL, &config).await.unwrap();

    assert_eq!(fetched.expansion_requests, 1);
    assert_eq!(fetched.unresolved_placeholders, 1);
    assert_eq!(fetched.thread.comment_count(), 6);
    assert!(!reddit.requests().iter().any(|r| r.contains("morechildren")));

    let rendered = render_thread(&fetched.thread, &config);
    assert_eq!(rendered.comments_rendered, 4);
    assert!(!rendered.markdown.contains("late but loved"));
}

#[tokio::test]
async fn test_zero_limit_makes_no_expansion_requests() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().more_comments_limit(Some(0)).build().unwrap();

    let fetched = fetch_thread(THREAD_URL, &config).await.unwrap();

    assert_eq!(fetched.expansion_requests, 0);
    assert_eq!(fetched.unresolved_placeholders, 2);
    assert_eq!(reddit.requests().len(), 1);
}

#[tokio::test]
async fn test_top_level_continue_stub_counts_as_unresolved() {
    let reddit = FakeReddit::start(vec![(
        "/comments/abc.json",
        200,
        fixture("thread_orphan_continue.json"),
    )])
    .await;
    let config = reddit.config().build().unwrap();

    let fetched = fetch_thread(THREAD_URL, &config).await.unwrap();

    assert_eq!(fetched.thread.comment_count(), 1);
    assert_eq!(fetched.expansion_requests, 0);
    assert_eq!(fetched.unresolved_placeholders, 1);
    assert_eq!(reddit.requests().len(), 1);
}

// ── Offline: full export ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_export_markdown() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().format(OutputFormat::Markdown).build().unwrap();

    let output = export(THREAD_URL, &config).await.unwrap();

    assert_eq!(output.format, OutputFormat::Markdown);
    assert_eq!(output.filename, "test_abc_test_thread.md");
    assert_eq!(output.bytes, output.markdown.as_bytes());
    assert!(output
        .markdown
        .starts_with("# Test Thread #\n#### Author: alice ####\n#### URL: /r/test/comments/abc/test_thread/ ####\n\n-----\nhttp://example.com\n\n\n-----\n"));
    assert!(output.markdown.ends_with(EXPECTED_COMMENT_LINES[6]));

    let stats = &output.stats;
    assert_eq!(stats.comments_fetched, 9);
    assert_eq!(stats.comments_rendered, 7);
    assert_eq!(stats.comments_hidden, 2);
    assert_eq!(stats.expansion_requests, 2);
    assert_eq!(stats.pdf_pages, 0);
    assert_eq!(stats.output_bytes, output.markdown.len());
}

#[tokio::test]
async fn test_export_html_to_file() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().format(OutputFormat::Html).build().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/thread.html");

    let stats = export_to_file(THREAD_URL, &path, &config).await.unwrap();

    let html = std::fs::read_to_string(&path).unwrap();
    assert_eq!(stats.output_bytes, html.len());
    assert!(html.starts_with("<html><head><meta charset=\"utf-8\"><title>Test Thread</title>"));
    assert!(html.contains("<h1>Test Thread</h1>"));
    assert!(html.contains("defends dave [Author: erin] [Upvotes: 4]"));
    assert!(html.ends_with("</body></html>"));
}

#[tokio::test]
async fn test_min_score_applies_to_export() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit
        .config()
        .format(OutputFormat::Markdown)
        .min_score(4)
        .build()
        .unwrap();

    let output = export(THREAD_URL, &config).await.unwrap();

    assert_eq!(output.stats.comments_rendered, 3);
    assert!(output.markdown.contains("[Author: bob]"));
    assert!(output.markdown.contains("[Author: erin]"));
    assert!(output.markdown.contains("[Author: gina]"));
    assert!(!output.markdown.contains("[Author: carol]"));
}

#[tokio::test]
async fn test_progress_callback_sees_each_stage() {
    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<ExportStage>>,
        expansions: Mutex<Vec<(usize, usize)>>,
        completed: Mutex<Option<ExportStats>>,
    }

    impl ExportProgressCallback for Recorder {
        fn on_stage(&self, stage: ExportStage) {
            self.stages.lock().unwrap().push(stage);
        }
        fn on_comments_expanded(&self, requests: usize, pending: usize) {
            self.expansions.lock().unwrap().push((requests, pending));
        }
        fn on_export_complete(&self, stats: &ExportStats) {
            *self.completed.lock().unwrap() = Some(stats.clone());
        }
    }

    let reddit = FakeReddit::with_fixtures().await;
    let recorder = Arc::new(Recorder::default());
    let config = reddit
        .config()
        .format(OutputFormat::Markdown)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    export(THREAD_URL, &config).await.unwrap();

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![
            ExportStage::FetchingThread,
            ExportStage::ExpandingComments,
            ExportStage::Flattening,
            ExportStage::RenderingHtml,
        ]
    );
    assert_eq!(*recorder.expansions.lock().unwrap(), vec![(1, 1), (2, 0)]);
    assert_eq!(
        recorder.completed.lock().unwrap().as_ref().map(|s| s.comments_rendered),
        Some(7)
    );
}

// ── Offline: failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_thread_is_unavailable() {
    let reddit = FakeReddit::with_fixtures().await;
    let config = reddit.config().build().unwrap();

    let err = fetch_thread("https://www.reddit.com/r/test/comments/zzz/gone/", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::ThreadUnavailable { .. }), "{err:?}");
    assert_eq!(err.user_message(), "Unable to collect the thread.");
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let reddit = FakeReddit::start(vec![("/comments/abc.json", 503, "{}".into())]).await;
    let config = reddit.config().max_retries(2).build().unwrap();

    let err = fetch_thread(THREAD_URL, &config).await.unwrap_err();

    assert!(matches!(err, ExportError::RedditUnreachable { .. }), "{err:?}");
    assert_eq!(err.user_message(), "Unable to connect to Reddit.");
    assert_eq!(reddit.requests().len(), 3);
}

#[tokio::test]
async fn test_garbage_listing_is_malformed() {
    let reddit =
        FakeReddit::start(vec![("/comments/abc.json", 200, "<html>nope</html>".into())]).await;
    let config = reddit.config().build().unwrap();

    let err = fetch_thread(THREAD_URL, &config).await.unwrap_err();

    assert!(matches!(err, ExportError::MalformedResponse { .. }), "{err:?}");
    assert_eq!(err.user_message(), "Unable to collect the thread.");
}

#[tokio::test]
async fn test_rejected_credentials_fail_auth() {
    let reddit = FakeReddit::start(vec![("/api/v1/access_token", 401, "{}".into())]).await;
    let config = reddit
        .config()
        .credentials("id", "wrong")
        .auth_url(format!("{}/api/v1/access_token", reddit.base_url))
        .build()
        .unwrap();

    let err = fetch_thread(THREAD_URL, &config).await.unwrap_err();

    assert!(matches!(err, ExportError::AuthFailed { .. }), "{err:?}");
    assert_eq!(reddit.requests().len(), 1);
}

#[tokio::test]
async fn test_oauth_token_is_used_for_listing() {
    let reddit = FakeReddit::start(vec![
        (
            "/api/v1/access_token",
            200,
            r#"{"access_token": "tok", "token_type": "bearer", "expires_in": 86400}"#.into(),
        ),
        ("/comments/abc?", 200, fixture("thread.json")),
        ("/comments/abc/_/c1a?", 200, fixture("continue_c1a.json")),
        ("/api/morechildren?", 200, fixture("morechildren.json")),
    ])
    .await;
    let config = reddit
        .config()
        .credentials("id", "secret")
        .auth_url(format!("{}/api/v1/access_token", reddit.base_url))
        .build()
        .unwrap();

    let fetched = fetch_thread(THREAD_URL, &config).await.unwrap();

    assert_eq!(fetched.thread.comment_count(), 9);
    let requests = reddit.requests();
    assert_eq!(requests[0], "/api/v1/access_token");
    assert!(requests[1..].iter().all(|r| !r.contains(".json")), "{requests:?}");
}

// ── Live ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_export_markdown() {
    let url = e2e_skip_unless_ready!();
    let config = ExportConfig::builder()
        .format(OutputFormat::Markdown)
        .more_comments_limit(Some(5))
        .build()
        .unwrap();

    let output = export(&url, &config).await.expect("export should succeed");

    assert!(output.markdown.starts_with("# "));
    assert!(output.markdown.contains("#### Author: "));
    println!(
        "{} comments fetched, {} rendered, {} expansion requests",
        output.stats.comments_fetched, output.stats.comments_rendered, output.stats.expansion_requests
    );
}

#[tokio::test]
async fn test_live_export_pdf() {
    let url = e2e_skip_unless_ready!();
    let config = ExportConfig::builder()
        .more_comments_limit(Some(5))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.pdf");

    match export_to_file(&url, &path, &config).await {
        Ok(stats) => {
            let bytes = std::fs::read(&path).unwrap();
            assert!(bytes.starts_with(b"%PDF"));
            assert!(stats.pdf_pages >= 1);
            println!("{} pages, {} bytes", stats.pdf_pages, bytes.len());
        }
        Err(ExportError::PdfiumBindingFailed(detail)) => {
            println!("SKIP: pdfium not available: {detail}");
        }
        Err(e) => panic!("export failed: {e}"),
    }
}
