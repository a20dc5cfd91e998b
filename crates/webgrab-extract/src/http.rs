//! Unrendered HTTP fetching: the fast path, plus the structured
//! repository-listing API branch.

use webgrab_core::{
    score, Error, ExtractMethod, ExtractionResult, FetchOptions, RawPayload, Result,
};

use crate::{markdown, rewrite};

/// Cap on bytes read from an unrendered fetch.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Cap for document downloads (PDFs and slide decks run large).
pub(crate) const MAX_DOCUMENT_BYTES: usize = 32 * 1024 * 1024;

/// Listings from the contents API are high-signal but not actual file
/// content; files decoded from the API are as good as a raw fetch.
const LISTING_SCORE: f64 = 80.0;
const API_FILE_SCORE: f64 = 90.0;

pub(crate) async fn read_body_bounded(
    resp: reqwest::Response,
    max_bytes: usize,
) -> Result<Vec<u8>> {
    use futures_util::StreamExt;
    let mut bytes = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
        if bytes.len().saturating_add(chunk.len()) > max_bytes {
            let can_take = max_bytes.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..can_take]);
            break;
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub(crate) fn user_agent(opts: &FetchOptions) -> String {
    opts.user_agent
        .clone()
        .unwrap_or_else(|| crate::DEFAULT_USER_AGENT.to_string())
}

/// One unrendered GET. Network errors and non-success statuses are errors
/// here; the orchestrator decides whether that dooms the whole call.
pub async fn extract(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<ExtractionResult> {
    let api_call = rewrite::is_contents_api_url(url);

    let mut rb = client
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent(opts))
        .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    if api_call {
        rb = rb.header(reqwest::header::ACCEPT, "application/vnd.github+json");
        // The only place a credential is used: raise the API rate limit
        // when the caller has one configured.
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
            }
        }
    } else {
        rb = rb.header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
    }

    let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("unexpected status {status} for {url}")));
    }
    let body = read_body_bounded(resp, MAX_BODY_BYTES).await?;

    if api_call {
        return contents_api_result(&body);
    }

    let html = String::from_utf8_lossy(&body).to_string();
    let content = markdown::page_to_markdown(&html);
    let score = score(&content, ExtractMethod::Http, &opts.weights);
    Ok(ExtractionResult {
        content,
        method: ExtractMethod::Http,
        score,
        raw: RawPayload::Html(html),
    })
}

/// Branch on the contents-API payload shape: a sequence is a directory
/// listing, an object with base64 content is a single file.
fn contents_api_result(body: &[u8]) -> Result<ExtractionResult> {
    let v: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::Fetch(format!("contents api returned invalid JSON: {e}")))?;

    if let Some(entries) = v.as_array() {
        let mut out = String::new();
        for entry in entries {
            let name = entry.get("name").and_then(|x| x.as_str()).unwrap_or("?");
            let kind = entry.get("type").and_then(|x| x.as_str()).unwrap_or("file");
            match entry.get("html_url").and_then(|x| x.as_str()) {
                Some(link) if !link.is_empty() => {
                    out.push_str(&format!("- [{name}]({link}) ({kind})\n"));
                }
                _ => out.push_str(&format!("- {name} ({kind})\n")),
            }
        }
        return Ok(ExtractionResult {
            content: out.clone(),
            method: ExtractMethod::HttpApi,
            score: LISTING_SCORE,
            raw: RawPayload::Text(out),
        });
    }

    let encoding = v.get("encoding").and_then(|x| x.as_str()).unwrap_or("");
    let content_b64 = v.get("content").and_then(|x| x.as_str()).unwrap_or("");
    if encoding == "base64" && !content_b64.is_empty() {
        use base64::Engine as _;
        // The API wraps base64 lines; strip whitespace before decoding.
        let compact: String = content_b64.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| Error::Fetch(format!("contents api base64 decode failed: {e}")))?;
        let text = String::from_utf8_lossy(&bytes).to_string();
        return Ok(ExtractionResult {
            content: text.clone(),
            method: ExtractMethod::HttpApi,
            score: API_FILE_SCORE,
            raw: RawPayload::Text(text),
        });
    }

    Err(Error::Fetch(
        "contents api payload had no recognizable shape".to_string(),
    ))
}
