//! Headless-browser rendering through a Playwright subprocess.
//!
//! Expected setup:
//! - Node.js present
//! - the `playwright` npm package available to Node (global, or via
//!   NODE_PATH / a local project)
//! - browsers installed (e.g. `npx playwright install chromium`)
//!
//! The subprocess protocol keeps stdout JSON-only; the request travels on
//! stdin to avoid argv quoting issues. Every exit path kills the child
//! (and with it the browser): `kill_on_drop` covers cancellation, and the
//! hard wall-clock timeout around `child.wait()` covers hangs.

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use webgrab_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Rendered DOM markup after the settle delay.
    Html,
    /// Full-page PNG screenshot after the settle delay.
    Screenshot,
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    /// Page-load budget for this render; the subprocess gets ~10s more as
    /// a hard wall-clock ceiling.
    pub timeout_ms: u64,
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Post-navigation wait for deferred client-side rendering.
    pub settle_ms: u64,
    pub capture: Capture,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: String,
    pub status: Option<u16>,
    /// Rendered markup; empty for screenshot captures.
    pub html: String,
    /// Screenshot bytes; present only for screenshot captures.
    pub screenshot: Option<Vec<u8>>,
    pub elapsed_ms: u64,
}

fn env_truthy(k: &str) -> bool {
    matches!(
        std::env::var(k)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn node_path_candidates() -> Vec<String> {
    // Best-effort Node global module roots across common setups; explicit
    // overrides go through WEBGRAB_NODE_PATH or NODE_PATH.
    let mut out: Vec<String> = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(std::path::PathBuf::from) {
        out.push(
            home.join(".npm-global")
                .join("lib")
                .join("node_modules")
                .to_string_lossy()
                .to_string(),
        );
    }
    out.push("/opt/homebrew/lib/node_modules".to_string());
    out.push("/usr/local/lib/node_modules".to_string());
    out.push("/usr/lib/node_modules".to_string());
    out
}

fn detect_node_path() -> Option<String> {
    fn has_playwright(np: &str) -> bool {
        np.split(':')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .any(|p| std::path::PathBuf::from(p).join("playwright").is_dir())
    }

    if let Ok(v) = std::env::var("WEBGRAB_NODE_PATH") {
        let v = v.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }

    let existing = std::env::var("NODE_PATH").unwrap_or_default();
    if has_playwright(&existing) {
        return None;
    }

    let found = node_path_candidates().into_iter().find(|root| {
        std::path::PathBuf::from(root.trim())
            .join("playwright")
            .is_dir()
    })?;

    if existing.trim().is_empty() {
        Some(found)
    } else {
        Some(format!("{existing}:{found}"))
    }
}

const JS: &str = r#"
const fs = require('fs');

function ok(obj) { process.stdout.write(JSON.stringify(obj)); }
function bad(code, message) { ok({ ok: false, error: { code, message } }); }

async function main() {
  let arg = '';
  try { arg = fs.readFileSync(0, 'utf8'); } catch (_) {}
  let req;
  try { req = JSON.parse(arg); } catch (e) { return bad('invalid_params', 'bad JSON args'); }

  let pw;
  try { pw = require('playwright'); } catch (e) {
    return bad('not_configured',
      'Playwright is not installed for Node.js (require("playwright") failed). Install it with `npm i -g playwright` and `npx playwright install chromium`.');
  }

  const url = String(req.url || '').trim();
  if (!url) return bad('invalid_params', 'url must be non-empty');

  const timeoutMs = Number(req.timeout_ms || 15000);
  const settleMs = Number(req.settle_ms || 2000);
  const width = Number(req.viewport_width || 1280);
  const height = Number(req.viewport_height || 720);
  const wantScreenshot = !!req.screenshot;

  const t0 = Date.now();
  let browser;
  try {
    browser = await pw.chromium.launch({
      headless: true,
      args: ['--disable-blink-features=AutomationControlled', '--no-sandbox'],
    });
    const contextOpts = { viewport: { width, height }, serviceWorkers: 'block' };
    const ua = String(req.user_agent || '').trim();
    if (ua) contextOpts.userAgent = ua;
    const context = await browser.newContext(contextOpts);
    const page = await context.newPage();

    const resp = await page.goto(url, { waitUntil: 'domcontentloaded', timeout: timeoutMs });
    await page.waitForSelector('body', { timeout: timeoutMs });
    await page.waitForTimeout(settleMs);

    const out = {
      ok: true,
      final_url: page.url(),
      status: resp ? resp.status() : null,
      elapsed_ms: Date.now() - t0,
      html: '',
    };
    if (wantScreenshot) {
      const buf = await page.screenshot({ fullPage: true, type: 'png' });
      out.screenshot_b64 = buf.toString('base64');
    } else {
      out.html = await page.content();
    }
    ok(out);
  } catch (e) {
    bad('render_failed', String(e && e.message ? e.message : e));
  } finally {
    try { if (browser) await browser.close(); } catch (_) {}
  }
}

main().catch((e) => bad('render_failed', String(e && e.message ? e.message : e)));
"#;

pub async fn render(req: &RenderRequest) -> Result<RenderedPage> {
    // Deterministic escape hatch (tests and "no local tooling" setups).
    if env_truthy("WEBGRAB_RENDER_DISABLE") {
        return Err(Error::NotConfigured(
            "render backend disabled (WEBGRAB_RENDER_DISABLE)".to_string(),
        ));
    }

    let args_json = serde_json::json!({
        "url": req.url,
        "timeout_ms": req.timeout_ms,
        "settle_ms": req.settle_ms,
        "viewport_width": req.viewport.0,
        "viewport_height": req.viewport.1,
        "user_agent": req.user_agent,
        "screenshot": matches!(req.capture, Capture::Screenshot),
    })
    .to_string();

    // Hard wall-clock timeout for the whole Node+Playwright operation.
    // Must wrap the child wait with `tokio::time::timeout`; checking
    // elapsed after completion does not prevent hangs.
    let hard_timeout_ms = req.timeout_ms.saturating_add(10_000);

    let node_bin = std::env::var("WEBGRAB_NODE").unwrap_or_else(|_| "node".to_string());
    let mut cmd = tokio::process::Command::new(node_bin);
    if let Some(node_path) = detect_node_path() {
        cmd.env("NODE_PATH", node_path);
    }
    let mut child = cmd
        .arg("-e")
        .arg(JS)
        .kill_on_drop(true)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::NotConfigured(format!(
                "browser rendering requires Node.js (`node`) and the Playwright npm package: {e}"
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // Best-effort: a failed write surfaces as a deterministic JSON
        // error from the child (or the outer wait fails).
        let _ = stdin.write_all(args_json.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Render("render subprocess: missing stdout pipe".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Render("render subprocess: missing stderr pipe".to_string()))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut stdout, &mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut stderr, &mut buf).await;
        buf
    });

    // Exit status is informational only: the child forces JSON onto
    // stdout even when it exits non-zero.
    match tokio::time::timeout(Duration::from_millis(hard_timeout_ms), child.wait()).await {
        Ok(r) => {
            r.map_err(|e| Error::Render(format!("render subprocess wait failed: {e}")))?;
        }
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(Error::Render(format!(
                "render hard timeout after {hard_timeout_ms}ms"
            )));
        }
    }

    let out_stdout = stdout_task.await.unwrap_or_default();
    let out_stderr = stderr_task.await.unwrap_or_default();

    // Parse stdout even on non-zero exit; the script forces JSON there.
    let stdout_s = String::from_utf8_lossy(&out_stdout).trim().to_string();
    let v: serde_json::Value = serde_json::from_str(&stdout_s).map_err(|e| {
        let stderr_s = String::from_utf8_lossy(&out_stderr).trim().to_string();
        if stderr_s.is_empty() {
            Error::Render(format!("render subprocess returned invalid JSON: {e}"))
        } else {
            Error::Render(format!(
                "render subprocess returned invalid JSON: {e}. stderr: {stderr_s}"
            ))
        }
    })?;

    if v.get("ok").and_then(|x| x.as_bool()) != Some(true) {
        let code = v
            .pointer("/error/code")
            .and_then(|x| x.as_str())
            .unwrap_or("render_failed");
        let message = v
            .pointer("/error/message")
            .and_then(|x| x.as_str())
            .unwrap_or("render failed");
        return Err(match code {
            "not_configured" => Error::NotConfigured(message.to_string()),
            "invalid_params" => Error::InvalidUrl(message.to_string()),
            _ => Error::Render(message.to_string()),
        });
    }

    let final_url = v
        .get("final_url")
        .and_then(|x| x.as_str())
        .unwrap_or(&req.url)
        .to_string();
    let status = v.get("status").and_then(|x| x.as_u64()).map(|n| n as u16);
    let html = v
        .get("html")
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string();
    let elapsed_ms = v.get("elapsed_ms").and_then(|x| x.as_u64()).unwrap_or(0);

    let screenshot = match v.get("screenshot_b64").and_then(|x| x.as_str()) {
        Some(b64) => {
            use base64::Engine as _;
            Some(
                base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(|e| Error::Render(format!("bad screenshot encoding: {e}")))?,
            )
        }
        None => None,
    };

    match req.capture {
        Capture::Html if html.trim().is_empty() => {
            // Avoid pathological empty results looking like success.
            Err(Error::Render("render returned empty HTML".to_string()))
        }
        Capture::Screenshot if screenshot.is_none() => {
            Err(Error::Render("render returned no screenshot".to_string()))
        }
        _ => Ok(RenderedPage {
            final_url,
            status,
            html,
            screenshot,
            elapsed_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testenv::env_lock;

    #[tokio::test]
    async fn render_disable_env_fails_closed() {
        let _lock = env_lock();
        std::env::set_var("WEBGRAB_RENDER_DISABLE", "1");
        let req = RenderRequest {
            url: "https://example.com/".to_string(),
            timeout_ms: 1_000,
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
            viewport: (1280, 720),
            settle_ms: 0,
            capture: Capture::Html,
        };
        let err = render(&req).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)), "got: {err:?}");
        std::env::remove_var("WEBGRAB_RENDER_DISABLE");
    }
}
