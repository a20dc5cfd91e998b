//! Structured document extraction (PDF, Word, presentations).

use std::time::Duration;
use webgrab_core::{
    score, Error, ExtractMethod, ExtractionResult, FetchOptions, RawPayload, Result,
};

use crate::{http, shellout};

const DOC_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".doc", ".pptx", ".ppt"];

/// Download budget: documents are fetched whole before parsing.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

fn url_path_lc(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase())
}

/// Whether the URL's path suggests a structured document format.
pub fn has_document_extension(url: &str) -> bool {
    let path = url_path_lc(url);
    DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Download and parse a structured document. Parse failures (a corrupt
/// PDF, a missing pandoc) fail this extractor with the underlying reason;
/// the orchestrator treats that as one lost candidate, not a fatal error.
pub async fn extract(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<ExtractionResult> {
    let resp = client
        .get(url)
        .header(reqwest::header::USER_AGENT, http::user_agent(opts))
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("unexpected status {status} for {url}")));
    }
    let bytes = http::read_body_bounded(resp, http::MAX_DOCUMENT_BYTES).await?;
    let byte_len = bytes.len();

    let path = url_path_lc(url);
    let text = if path.ends_with(".pdf") {
        // CPU-bound parse; keep it off the IO driver threads.
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| Error::Document(format!("pdf parse join failed: {e}")))?
            .map_err(|e| Error::Document(e.to_string()))?
    } else if path.ends_with(".docx") || path.ends_with(".pptx") || path.ends_with(".ppt") {
        let suffix = shellout::document_suffix(url);
        tokio::task::spawn_blocking(move || shellout::pandoc_to_text(&bytes, suffix))
            .await
            .map_err(|e| Error::Document(format!("pandoc join failed: {e}")))?
            .map_err(|code| Error::Document(code.to_string()))?
    } else if path.ends_with(".doc") {
        // Legacy binary Word: no structural parser here; a lossy decode
        // recovers the embedded text runs at reduced fidelity.
        String::from_utf8_lossy(&bytes).to_string()
    } else {
        return Err(Error::Document(format!(
            "unsupported document extension in {url}"
        )));
    };

    if !text.chars().any(|c| !c.is_whitespace()) {
        return Err(Error::Document("document produced no text".to_string()));
    }

    let score = score(&text, ExtractMethod::Document, &opts.weights);
    Ok(ExtractionResult {
        content: text,
        method: ExtractMethod::Document,
        score,
        raw: RawPayload::DocumentBytes(byte_len),
    })
}
