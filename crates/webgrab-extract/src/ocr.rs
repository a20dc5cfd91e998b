//! Screenshot OCR: the lowest-trust, last-resort extractor.
//!
//! Renders the page in its own browser instance, captures a full-page
//! screenshot, preprocesses the image for recognition, and runs a bounded
//! tesseract shellout over it. The scorer penalizes the method tag, so an
//! OCR result only wins when nothing better completed.

use webgrab_core::{
    score, Error, ExtractMethod, ExtractionResult, FetchOptions, RawPayload, Result,
};

use crate::render::{render, Capture, RenderRequest};
use crate::{http, shellout};

/// Larger than the browser extractor's viewport: recognition quality
/// tracks pixel real estate.
const VIEWPORT: (u32, u32) = (1920, 1080);

/// Longer than the browser extractor's settle delay; screenshot fidelity
/// is more sensitive to incomplete rendering.
const SETTLE_MS: u64 = 3_000;

/// Downscale ceiling. Never upscale: interpolated pixels add no signal.
const MAX_WIDTH: u32 = 1920;

/// Downscale, greyscale and contrast-boost a screenshot before
/// recognition.
pub(crate) fn preprocess(png: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(png).map_err(|e| Error::Ocr(e.to_string()))?;
    let img = if img.width() > MAX_WIDTH {
        let height = ((u64::from(img.height()) * u64::from(MAX_WIDTH)) / u64::from(img.width()))
            .max(1) as u32;
        img.resize(MAX_WIDTH, height, image::imageops::FilterType::Triangle)
    } else {
        img
    };
    let img = img.grayscale().adjust_contrast(24.0);

    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| Error::Ocr(e.to_string()))?;
    Ok(out)
}

pub async fn extract(url: &str, timeout_ms: u64, opts: &FetchOptions) -> Result<ExtractionResult> {
    let page = render(&RenderRequest {
        url: url.to_string(),
        timeout_ms,
        user_agent: http::user_agent(opts),
        viewport: VIEWPORT,
        settle_ms: SETTLE_MS,
        capture: Capture::Screenshot,
    })
    .await?;
    let shot = page
        .screenshot
        .ok_or_else(|| Error::Render("screenshot capture returned no image".to_string()))?;

    let processed = preprocess(&shot)?;
    let for_ocr = processed.clone();
    let text = tokio::task::spawn_blocking(move || shellout::tesseract_ocr(&for_ocr))
        .await
        .map_err(|e| Error::Ocr(format!("ocr join failed: {e}")))?
        .map_err(|code| Error::Ocr(code.to_string()))?;

    let score = score(&text, ExtractMethod::Ocr, &opts.weights);
    Ok(ExtractionResult {
        content: text,
        method: ExtractMethod::Ocr,
        score,
        raw: RawPayload::Screenshot(processed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_of(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([120, 60, 200, 255]),
        ));
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn preprocess_downscales_wide_screenshots_preserving_aspect() {
        let processed = preprocess(&png_of(3840, 2160)).unwrap();
        let img = image::load_from_memory(&processed).unwrap();
        assert_eq!(img.width(), 1920);
        assert_eq!(img.height(), 1080);
    }

    #[test]
    fn preprocess_never_upscales_small_screenshots() {
        let processed = preprocess(&png_of(640, 480)).unwrap();
        let img = image::load_from_memory(&processed).unwrap();
        assert_eq!((img.width(), img.height()), (640, 480));
    }

    #[test]
    fn preprocess_rejects_non_image_bytes() {
        let err = preprocess(b"definitely not a png").unwrap_err();
        assert!(matches!(err, Error::Ocr(_)), "got {err:?}");
    }
}
