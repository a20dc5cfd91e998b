//! Browser-rendered extraction for JavaScript-heavy pages.

use webgrab_core::{score, ExtractMethod, ExtractionResult, FetchOptions, RawPayload, Result};

use crate::render::{render, Capture, RenderRequest};
use crate::{http, markdown};

const VIEWPORT: (u32, u32) = (1280, 720);

/// Post-navigation wait for deferred rendering/JS to finish.
const SETTLE_MS: u64 = 2_000;

pub async fn extract(url: &str, timeout_ms: u64, opts: &FetchOptions) -> Result<ExtractionResult> {
    let page = render(&RenderRequest {
        url: url.to_string(),
        timeout_ms,
        user_agent: http::user_agent(opts),
        viewport: VIEWPORT,
        settle_ms: SETTLE_MS,
        capture: Capture::Html,
    })
    .await?;

    let content = markdown::page_to_markdown(&page.html);
    let score = score(&content, ExtractMethod::Browser, &opts.weights);
    Ok(ExtractionResult {
        content,
        method: ExtractMethod::Browser,
        score,
        raw: RawPayload::Html(page.html),
    })
}
