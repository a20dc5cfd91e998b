//! Heuristic content-quality scoring.
//!
//! Pure and deterministic: the same content + method always produces the
//! same score. Components are additive and order-independent; the final
//! score is floored at zero.

use crate::ExtractMethod;

/// Content below this length is treated as a near-empty/failed extraction.
const MIN_CONTENT_CHARS: usize = 100;

/// A paragraph must exceed this many characters (trimmed) to count as
/// substantive structure.
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Phrases that usually mean the fetch landed on an error or interstitial
/// page instead of real content. Substring matching is intentionally crude:
/// legitimate pages that merely mention these words get penalized too, and
/// that tradeoff is accepted over missing real failures.
const ERROR_SIGNALS: &[&str] = &[
    "error",
    "not found",
    "access denied",
    "forbidden",
    "timeout",
    "captcha",
    "robot",
];

/// Empirically tuned scoring constants, lifted into configuration so
/// callers can adjust them per deployment. `Default` reproduces the tuned
/// values exactly.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Flat penalty for content shorter than 100 characters.
    pub short_content_penalty: f64,
    /// Cap on the length component (about 1 point per 100 characters).
    pub length_cap: f64,
    /// Points per substantive paragraph.
    pub paragraph_bonus: f64,
    /// Cap on the paragraph component.
    pub paragraph_cap: f64,
    /// Flat penalty when an error signal matches.
    pub error_signal_penalty: f64,
    /// Method nudges. Small on purpose: they break near-ties in favor of
    /// the more trustworthy method, with a successful structured parse
    /// trusted most and OCR least.
    pub browser_bonus: f64,
    pub http_bonus: f64,
    pub document_bonus: f64,
    pub ocr_penalty: f64,
    /// Bonus when the content carries a heading.
    pub heading_bonus: f64,
    /// Bonus when the content carries a link.
    pub link_bonus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            short_content_penalty: 20.0,
            length_cap: 50.0,
            paragraph_bonus: 2.0,
            paragraph_cap: 20.0,
            error_signal_penalty: 30.0,
            browser_bonus: 5.0,
            http_bonus: 3.0,
            document_bonus: 10.0,
            ocr_penalty: 5.0,
            heading_bonus: 10.0,
            link_bonus: 5.0,
        }
    }
}

fn has_heading(content: &str) -> bool {
    let md_heading = content.lines().any(|line| {
        let t = line.trim_start();
        t.starts_with('#') && t.trim_start_matches('#').starts_with(' ')
    });
    if md_heading {
        return true;
    }
    let lc = content.to_ascii_lowercase();
    (1..=6).any(|n| lc.contains(&format!("<h{n}")))
}

fn has_link(content: &str) -> bool {
    if content.contains("](") {
        return true;
    }
    let lc = content.to_ascii_lowercase();
    lc.contains("<a ") || lc.contains("<a>")
}

/// Score `content` produced by `method`.
pub fn score(content: &str, method: ExtractMethod, w: &ScoreWeights) -> f64 {
    let mut total = 0.0f64;

    let len = content.chars().count();
    if len < MIN_CONTENT_CHARS {
        total -= w.short_content_penalty;
    } else {
        total += (len as f64 / 100.0).min(w.length_cap);
    }

    let paragraphs = content
        .split("\n\n")
        .filter(|p| p.trim().chars().count() > MIN_PARAGRAPH_CHARS)
        .count();
    total += (paragraphs as f64 * w.paragraph_bonus).min(w.paragraph_cap);

    let lc = content.to_lowercase();
    if ERROR_SIGNALS.iter().any(|s| lc.contains(s)) {
        total -= w.error_signal_penalty;
    }

    total += match method {
        ExtractMethod::Browser => w.browser_bonus,
        ExtractMethod::Http => w.http_bonus,
        ExtractMethod::Document => w.document_bonus,
        ExtractMethod::Ocr => -w.ocr_penalty,
        // Structured-API results carry fixed scores and normally bypass
        // the scorer entirely.
        ExtractMethod::HttpApi => 0.0,
    };

    if has_heading(content) {
        total += w.heading_bonus;
    }
    if has_link(content) {
        total += w.link_bonus;
    }

    total.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_score(content: &str, method: ExtractMethod) -> f64 {
        score(content, method, &ScoreWeights::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn short_content_floors_at_zero() {
        assert_eq!(default_score("", ExtractMethod::Ocr), 0.0);
        assert_eq!(default_score("tiny", ExtractMethod::Http), 0.0);
    }

    #[test]
    fn length_component_caps_at_fifty() {
        let huge = "a".repeat(20_000);
        let s = default_score(&huge, ExtractMethod::Http);
        // 50 (capped length) + 2 (one long paragraph) + 3 (http nudge).
        assert_eq!(s, 55.0);
    }

    #[test]
    fn structural_signals_strictly_raise_the_score_at_equal_length() {
        // Both inputs are exactly 340 characters.
        let body = "x".repeat(300);
        let rich = format!("# Heading\n\n{body}\n\n[docs](https://example.com)");
        let plain = "x".repeat(340);
        assert_eq!(rich.chars().count(), plain.chars().count());

        let s_rich = default_score(&rich, ExtractMethod::Http);
        let s_plain = default_score(&plain, ExtractMethod::Http);
        assert!(
            s_rich > s_plain,
            "expected structure to win: rich={s_rich} plain={s_plain}"
        );
        assert!(approx(s_rich - s_plain, 15.0), "diff={}", s_rich - s_plain);
    }

    #[test]
    fn document_beats_ocr_by_fifteen_on_identical_content() {
        let content = format!("{}\n\n{}", "alpha ".repeat(40), "beta ".repeat(40));
        let doc = default_score(&content, ExtractMethod::Document);
        let ocr = default_score(&content, ExtractMethod::Ocr);
        assert!(approx(doc - ocr, 15.0), "diff={}", doc - ocr);
    }

    #[test]
    fn error_signals_penalize_even_legitimate_mentions() {
        let content = format!(
            "A long discussion of retry behavior when a timeout occurs. {}",
            "filler ".repeat(30)
        );
        let with = default_score(&content, ExtractMethod::Http);
        // "latency" has the same length, so only the signal penalty differs.
        let without = default_score(&content.replace("timeout", "latency"), ExtractMethod::Http);
        assert!(approx(without - with, 30.0), "diff={}", without - with);
    }

    #[test]
    fn html_headings_and_anchors_count_as_structure() {
        let content = format!("<h2>Title</h2><a href=\"/x\">x</a>{}", "y".repeat(200));
        let bare = "y".repeat(content.chars().count());
        let diff = default_score(&content, ExtractMethod::Browser)
            - default_score(&bare, ExtractMethod::Browser);
        assert!(approx(diff, 15.0), "diff={diff}");
    }

    proptest! {
        #[test]
        fn score_is_never_negative(content in ".*", idx in 0usize..5) {
            let methods = [
                ExtractMethod::Http,
                ExtractMethod::HttpApi,
                ExtractMethod::Browser,
                ExtractMethod::Ocr,
                ExtractMethod::Document,
            ];
            let s = default_score(&content, methods[idx]);
            prop_assert!(s >= 0.0, "score went negative: {s}");
        }
    }
}
