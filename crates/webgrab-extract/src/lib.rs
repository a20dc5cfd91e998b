//! Multi-strategy web content extraction.
//!
//! A [`ContentFetcher`] turns a URL into text by trying several
//! independent strategies and keeping the best-scoring result:
//!
//! 1. the URL is normalized (source-hosting pages rewrite to their
//!    direct-content equivalents);
//! 2. a cheap unrendered HTTP fetch runs first, and a good-enough score
//!    short-circuits everything else;
//! 3. otherwise the expensive strategies race under one timeout budget —
//!    full browser rendering, structured document parsing (when the URL
//!    looks like a document), and screenshot OCR as a last resort;
//! 4. the heuristic scorer ranks whatever completed and the winner is
//!    returned as markdown (or as its raw payload on request).
//!
//! Every call owns its resources: one browser subprocess per rendering
//! attempt, torn down on success, failure and cancellation alike. Nothing
//! is cached or pooled across calls.

use std::time::Duration;

use tracing::{debug, warn};
use webgrab_core::{Error, ExtractionResult, FetchOptions, Result};

pub mod browser;
pub mod document;
pub mod http;
pub mod markdown;
pub mod ocr;
pub mod render;
pub mod rewrite;
pub mod shellout;

pub use webgrab_core::{ExtractMethod, RawPayload, ScoreWeights};

/// Generic desktop browser identity used unless the caller overrides it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Ceiling for the browser leg of the race.
const BROWSER_RACE_CAP_MS: u64 = 15_000;
/// Ceiling for the OCR leg of the race.
const OCR_RACE_CAP_MS: u64 = 10_000;

/// Per-request timeout for the fast unrendered fetch.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
}

impl ContentFetcher {
    pub fn new() -> Result<Self> {
        // One client serves the fast path and document downloads; the
        // document extractor stretches the per-request timeout itself.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(10))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    /// Extract the best available text for `url`.
    ///
    /// Returns markdown-normalized content, or the winning strategy's raw
    /// payload when `options.raw` is set. Fails only on invalid input,
    /// overall timeout, or when every strategy came up empty.
    pub async fn fetch_content(&self, url: &str, options: &FetchOptions) -> Result<String> {
        let best = self.fetch_best(url, options).await?;
        Ok(if options.raw {
            best.raw.into_text()
        } else {
            best.content
        })
    }

    async fn fetch_best(&self, url: &str, options: &FetchOptions) -> Result<ExtractionResult> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidUrl("url must be non-empty".to_string()));
        }
        let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let target = rewrite::normalize(url);

        // Fast path: one cheap unrendered fetch before committing to the
        // expensive race.
        let fast = match http::extract(&self.client, &target, options).await {
            Ok(res) => {
                if res.score > options.fast_path_threshold {
                    debug!(score = res.score, url = target.as_str(), "fast path accepted");
                    return Ok(res);
                }
                debug!(score = res.score, "fast path below threshold, racing");
                Some(res)
            }
            Err(e) => {
                debug!(error = %e, url = target.as_str(), "fast path failed");
                None
            }
        };

        let want_document = document::has_document_extension(&target);
        // Last resort: OCR joins the race only when the fast path
        // produced nothing at all — the only result that can exist at
        // launch time is the fast-path one.
        let want_ocr = fast.is_none();

        let mut handles: Vec<tokio::task::JoinHandle<Option<ExtractionResult>>> = Vec::new();

        {
            let t = target.clone();
            let o = options.clone();
            let cap = options.timeout_ms.min(BROWSER_RACE_CAP_MS);
            handles.push(tokio::spawn(async move {
                match browser::extract(&t, cap, &o).await {
                    Ok(r) => Some(r),
                    Err(e) => {
                        warn!(error = %e, url = t.as_str(), "browser extraction failed");
                        None
                    }
                }
            }));
        }
        if want_document {
            let client = self.client.clone();
            let t = target.clone();
            let o = options.clone();
            handles.push(tokio::spawn(async move {
                match document::extract(&client, &t, &o).await {
                    Ok(r) => Some(r),
                    Err(e) => {
                        warn!(error = %e, url = t.as_str(), "document extraction failed");
                        None
                    }
                }
            }));
        }
        if want_ocr {
            let t = target.clone();
            let o = options.clone();
            let cap = options.timeout_ms.min(OCR_RACE_CAP_MS);
            handles.push(tokio::spawn(async move {
                match ocr::extract(&t, cap, &o).await {
                    Ok(r) => Some(r),
                    Err(e) => {
                        warn!(error = %e, url = t.as_str(), "ocr extraction failed");
                        None
                    }
                }
            }));
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let race = futures_util::future::join_all(handles);
        let joined = match tokio::time::timeout(Duration::from_millis(options.timeout_ms), race)
            .await
        {
            Ok(joined) => joined,
            Err(_) => {
                // Hard deadline: abort the in-flight legs. Their render
                // subprocesses die with the dropped futures
                // (kill_on_drop), so no browser outlives the call.
                for a in aborts {
                    a.abort();
                }
                return Err(Error::Timeout(options.timeout_ms));
            }
        };

        // Collection order fixes tie-breaks: fast-path first, then the
        // race legs in launch order.
        let mut results: Vec<ExtractionResult> = Vec::new();
        results.extend(fast);
        results.extend(joined.into_iter().filter_map(|r| r.ok().flatten()));

        select_best(results).ok_or(Error::AllMethodsFailed)
    }
}

/// One-shot convenience wrapper: build a fetcher and run a single call.
pub async fn fetch_content(url: &str, options: &FetchOptions) -> Result<String> {
    ContentFetcher::new()?.fetch_content(url, options).await
}

/// Maximum-score selection; the first of equals wins.
fn select_best(results: Vec<ExtractionResult>) -> Option<ExtractionResult> {
    let mut best: Option<ExtractionResult> = None;
    for r in results {
        let wins = best.as_ref().map(|b| r.score > b.score).unwrap_or(true);
        if wins {
            best = Some(r);
        }
    }
    best
}

#[cfg(test)]
pub(crate) mod testenv {
    use std::sync::{Mutex, MutexGuard};

    // Env vars are process-global; every env-touching test serializes on
    // this.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testenv::env_lock;
    use axum::{routing::get, Router};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn result(method: ExtractMethod, score: f64, content: &str) -> ExtractionResult {
        ExtractionResult {
            content: content.to_string(),
            method,
            score,
            raw: RawPayload::Text(content.to_string()),
        }
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// A page rich enough to clear the fast-path threshold comfortably.
    fn rich_page() -> String {
        let mut paras = String::new();
        for i in 0..20 {
            paras.push_str(&format!(
                "<p>Paragraph {i} carries a reasonable amount of prose so the structure \
                 component of the quality heuristic sees substantive paragraphs.</p>\n"
            ));
        }
        format!(
            "<html><body><h1>Field Guide</h1>{paras}\
             <p>More in <a href=\"https://example.com/guide\">the full guide</a>.</p>\
             </body></html>"
        )
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_any_network_io() {
        let fetcher = ContentFetcher::new().unwrap();
        let opts = FetchOptions::default();

        let err = fetcher.fetch_content("", &opts).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = fetcher
            .fetch_content("ftp://example.com/x", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = fetcher
            .fetch_content("not a url", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn selection_picks_the_maximum_score() {
        let picked = select_best(vec![
            result(ExtractMethod::Http, 30.0, "low"),
            result(ExtractMethod::Browser, 85.0, "high"),
            result(ExtractMethod::Ocr, 60.0, "mid"),
        ])
        .unwrap();
        assert_eq!(picked.content, "high");
        assert_eq!(picked.method, ExtractMethod::Browser);
    }

    #[test]
    fn selection_breaks_ties_by_collection_order() {
        let picked = select_best(vec![
            result(ExtractMethod::Http, 42.0, "first"),
            result(ExtractMethod::Browser, 42.0, "second"),
        ])
        .unwrap();
        assert_eq!(picked.content, "first");
    }

    #[test]
    fn selection_of_nothing_is_none() {
        assert!(select_best(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn fast_path_short_circuits_without_touching_other_extractors() {
        let _lock = env_lock();
        std::env::set_var("WEBGRAB_RENDER_DISABLE", "1");
        std::env::remove_var("WEBGRAB_GITHUB_API_BASE");

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let page = rich_page();
        let app = Router::new().route(
            "/",
            get(move || {
                let page = page.clone();
                let hits = hits2.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    axum::response::Html(page)
                }
            }),
        );
        let addr = serve(app).await;

        let started = std::time::Instant::now();
        let fetcher = ContentFetcher::new().unwrap();
        let out = fetcher
            .fetch_content(&format!("http://{addr}/"), &FetchOptions::default())
            .await
            .unwrap();

        std::env::remove_var("WEBGRAB_RENDER_DISABLE");

        assert!(out.contains("# Field Guide"), "content: {out}");
        assert_eq!(hits.load(Ordering::SeqCst), 1, "expected exactly one fetch");
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "fast path should return well under the overall budget"
        );
    }

    #[tokio::test]
    async fn raw_mode_returns_the_original_body_verbatim() {
        let _lock = env_lock();
        std::env::set_var("WEBGRAB_RENDER_DISABLE", "1");
        std::env::remove_var("WEBGRAB_GITHUB_API_BASE");

        let page = rich_page();
        let expected = page.clone();
        let app = Router::new().route(
            "/",
            get(move || {
                let page = page.clone();
                async move { axum::response::Html(page) }
            }),
        );
        let addr = serve(app).await;

        let fetcher = ContentFetcher::new().unwrap();
        let opts = FetchOptions {
            raw: true,
            ..FetchOptions::default()
        };
        let out = fetcher
            .fetch_content(&format!("http://{addr}/"), &opts)
            .await
            .unwrap();

        std::env::remove_var("WEBGRAB_RENDER_DISABLE");

        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn total_failure_surfaces_the_dedicated_error() {
        let _lock = env_lock();
        std::env::set_var("WEBGRAB_RENDER_DISABLE", "1");
        std::env::set_var("WEBGRAB_OCR", "off");

        // Bind then drop a listener so the port is (briefly) known-dead.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = ContentFetcher::new().unwrap();
        let err = fetcher
            .fetch_content(&format!("http://{addr}/"), &FetchOptions::default())
            .await
            .unwrap_err();

        std::env::remove_var("WEBGRAB_RENDER_DISABLE");
        std::env::remove_var("WEBGRAB_OCR");

        assert!(matches!(err, Error::AllMethodsFailed), "got {err:?}");
    }
}
