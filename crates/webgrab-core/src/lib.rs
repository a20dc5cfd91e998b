use serde::{Deserialize, Serialize};

pub mod score;

pub use score::{score, ScoreWeights};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("ocr failed: {0}")]
    Ocr(String),
    #[error("document parse failed: {0}")]
    Document(String),
    #[error("extraction timed out after {0}ms")]
    Timeout(u64),
    #[error("all extraction methods failed")]
    AllMethodsFailed,
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Strategy that produced an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractMethod {
    Http,
    HttpApi,
    Browser,
    Ocr,
    Document,
}

impl ExtractMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractMethod::Http => "http",
            ExtractMethod::HttpApi => "http-api",
            ExtractMethod::Browser => "browser",
            ExtractMethod::Ocr => "ocr",
            ExtractMethod::Document => "document",
        }
    }
}

impl std::fmt::Display for ExtractMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unnormalized payload kept alongside the markdown content so a raw-mode
/// request can be answered without re-fetching.
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// Original or rendered page markup.
    Html(String),
    /// Decoded structured-API content (file body or listing).
    Text(String),
    /// Screenshot PNG bytes the OCR pass recognized.
    Screenshot(Vec<u8>),
    /// Byte length of a downloaded document payload.
    DocumentBytes(usize),
}

impl RawPayload {
    /// Render the payload for a raw-mode response. Markup and text come back
    /// verbatim; screenshots are base64 so the result stays a string.
    pub fn into_text(self) -> String {
        use base64::Engine as _;
        match self {
            RawPayload::Html(s) | RawPayload::Text(s) => s,
            RawPayload::Screenshot(bytes) => {
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
            RawPayload::DocumentBytes(n) => format!("{n} bytes"),
        }
    }
}

/// One completed extraction attempt. Constructed once inside its extractor
/// and never mutated afterwards; the orchestrator owns the collection for
/// the duration of a single fetch call.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub content: String,
    pub method: ExtractMethod,
    pub score: f64,
    pub raw: RawPayload,
}

/// Per-call configuration. Built fresh for every fetch; nothing persists
/// across calls.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Return the underlying raw payload instead of normalized markdown.
    pub raw: bool,
    /// Overall budget for the whole call, fast path included.
    pub timeout_ms: u64,
    /// Browser identity override for HTTP and rendered fetches.
    pub user_agent: Option<String>,
    /// Fast-path HTTP results scoring strictly above this are returned
    /// without consulting any other extractor.
    pub fast_path_threshold: f64,
    pub weights: ScoreWeights,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            raw: false,
            timeout_ms: 30_000,
            user_agent: None,
            fast_path_threshold: 50.0,
            weights: ScoreWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tags_use_the_wire_spelling() {
        assert_eq!(ExtractMethod::Http.as_str(), "http");
        assert_eq!(ExtractMethod::HttpApi.as_str(), "http-api");
        assert_eq!(
            serde_json::to_string(&ExtractMethod::HttpApi).unwrap(),
            "\"http-api\""
        );
    }

    #[test]
    fn raw_payload_round_trips_text_verbatim() {
        let html = "<html><body>x</body></html>".to_string();
        assert_eq!(RawPayload::Html(html.clone()).into_text(), html);
        let text = "decoded file body".to_string();
        assert_eq!(RawPayload::Text(text.clone()).into_text(), text);
    }

    #[test]
    fn raw_payload_encodes_screenshots_as_base64() {
        let out = RawPayload::Screenshot(vec![0x89, b'P', b'N', b'G']).into_text();
        assert_eq!(out, "iVBORw==");
    }

    #[test]
    fn fetch_options_defaults_match_the_tuned_constants() {
        let opts = FetchOptions::default();
        assert!(!opts.raw);
        assert_eq!(opts.timeout_ms, 30_000);
        assert_eq!(opts.fast_path_threshold, 50.0);
    }
}
