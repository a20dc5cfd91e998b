//! Opportunistic shellouts to well-known local CLIs (`pandoc`,
//! `tesseract`).
//!
//! Goals:
//! - **Opportunistic**: use tools when present.
//! - **Bounded**: timeouts + output caps to avoid hangs/huge output.
//! - **Deterministic gating**: off | auto | strict via env.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env(key)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

pub fn timeout_from_env_ms(key: &str, default_ms: u64) -> Duration {
    let ms = env(key)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default_ms)
        .clamp(50, 300_000);
    Duration::from_millis(ms)
}

pub fn max_chars_from_env(key: &str, default_chars: usize) -> usize {
    env_usize(key, default_chars).clamp(200, 2_000_000)
}

pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let cand = dir.join(bin);
        if cand.is_file() {
            return Some(cand);
        }
    }
    None
}

pub fn has(bin: &str) -> bool {
    which(bin).is_some()
}

/// Run a command and capture stdout (bounded) with a coarse timeout.
///
/// No streaming; this is sized for small utilities like `pandoc` and
/// `tesseract`, not long-running pipelines.
pub fn run_stdout_bounded(
    mut cmd: Command,
    timeout: Duration,
    max_stdout_bytes: usize,
) -> Result<Vec<u8>, &'static str> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            "shellout_tool_not_found"
        } else {
            "shellout_spawn_failed"
        }
    })?;

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|_| "shellout_wait_failed")? {
            if !status.success() {
                return Err("shellout_nonzero_exit");
            }
            break;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            return Err("shellout_timeout");
        }
        std::thread::sleep(Duration::from_millis(25));
    }

    let mut out = Vec::new();
    if let Some(s) = child.stdout.take() {
        use std::io::Read;
        s.take(max_stdout_bytes as u64)
            .read_to_end(&mut out)
            .map_err(|_| "shellout_read_failed")?;
    }
    Ok(out)
}

pub fn write_temp_file(
    bytes: &[u8],
    suffix: &str,
) -> Result<tempfile::NamedTempFile, &'static str> {
    let mut tmp = tempfile::Builder::new()
        .prefix("webgrab-")
        .suffix(suffix)
        .tempfile()
        .map_err(|_| "shellout_tempfile_failed")?;
    use std::io::Write;
    tmp.write_all(bytes)
        .map_err(|_| "shellout_tempfile_write_failed")?;
    Ok(tmp)
}

fn normalize_mode(s: Option<String>) -> String {
    match s.as_deref() {
        Some("off") => "off".to_string(),
        Some("strict") => "strict".to_string(),
        // Unknown values fall back to auto (bounded, best-effort).
        _ => "auto".to_string(),
    }
}

pub fn pandoc_mode_from_env() -> String {
    normalize_mode(env("WEBGRAB_PANDOC"))
}

pub fn ocr_mode_from_env() -> String {
    normalize_mode(env("WEBGRAB_OCR"))
}

/// Staging suffix for a document URL, so pandoc can sniff the format.
pub fn document_suffix(url: &str) -> &'static str {
    let u = url.to_ascii_lowercase();
    if u.ends_with(".docx") {
        ".docx"
    } else if u.ends_with(".doc") {
        ".doc"
    } else if u.ends_with(".pptx") {
        ".pptx"
    } else if u.ends_with(".ppt") {
        ".ppt"
    } else if u.ends_with(".pdf") {
        ".pdf"
    } else {
        ".bin"
    }
}

/// Format-aware document text extraction via pandoc.
pub fn pandoc_to_text(bytes: &[u8], suffix: &str) -> Result<String, &'static str> {
    if pandoc_mode_from_env() == "off" {
        return Err("pandoc_disabled");
    }
    if !has("pandoc") {
        return Err("pandoc_not_found");
    }
    let timeout = timeout_from_env_ms("WEBGRAB_PANDOC_TIMEOUT_MS", 20_000);
    let max_chars = max_chars_from_env("WEBGRAB_PANDOC_MAX_CHARS", 200_000);
    let max_stdout_bytes = max_chars.saturating_mul(4).clamp(1_000, 8_000_000);
    let tmp = write_temp_file(bytes, suffix)?;
    let path = tmp.path().to_string_lossy().to_string();

    let mut cmd = Command::new("pandoc");
    cmd.arg(&path).arg("-t").arg("plain").arg("--wrap=none");
    let out = run_stdout_bounded(cmd, timeout, max_stdout_bytes)?;
    let s = String::from_utf8_lossy(&out).to_string();
    let clipped: String = s.chars().take(max_chars).collect();
    if clipped.chars().any(|c| !c.is_whitespace()) {
        Ok(clipped)
    } else {
        Err("pandoc_empty_output")
    }
}

/// Recognize text in a PNG screenshot via tesseract. The engine/PSM pair
/// targets whole-page blocks of print text (LSTM engine, automatic page
/// segmentation).
pub fn tesseract_ocr(png: &[u8]) -> Result<String, &'static str> {
    if ocr_mode_from_env() == "off" {
        return Err("ocr_disabled");
    }
    if !has("tesseract") {
        return Err("tesseract_not_found");
    }
    let timeout = timeout_from_env_ms("WEBGRAB_OCR_TIMEOUT_MS", 30_000);
    let max_chars = max_chars_from_env("WEBGRAB_OCR_MAX_CHARS", 50_000);
    let max_stdout_bytes = max_chars.saturating_mul(4).clamp(1_000, 4_000_000);
    let tmp = write_temp_file(png, ".png")?;
    let in_path = tmp.path().to_string_lossy().to_string();

    let mut cmd = Command::new("tesseract");
    cmd.arg(&in_path)
        .arg("stdout")
        .arg("-l")
        .arg("eng")
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg("3");
    let out = run_stdout_bounded(cmd, timeout, max_stdout_bytes)?;
    let s = String::from_utf8_lossy(&out).to_string();
    let clipped: String = s.chars().take(max_chars).collect();
    if clipped.chars().any(|c| !c.is_whitespace()) {
        Ok(clipped)
    } else {
        Err("tesseract_empty_output")
    }
}
