//! HTML cleanup and markdown conversion, shared by the HTTP and browser
//! extractors.

use scraper::{ElementRef, Html, Selector};

/// Elements that never carry article content.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside",
];

const STRIP_SELECTOR: &str = "script, style, noscript, nav, header, footer, aside";

/// Containers worth inspecting for ad markers in class/id attributes.
const AD_CONTAINER_SELECTOR: &str = "div, section, span, ul, iframe";

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_ad_container(el: &ElementRef) -> bool {
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    // Token match, not substring: "ad" inside "header" must not trip this.
    s.split(|c: char| !c.is_ascii_alphanumeric()).any(|tok| {
        tok == "ad"
            || tok == "ads"
            || tok == "adsbox"
            || tok.starts_with("advert")
            || tok == "sponsored"
            || tok == "sponsor"
            || tok == "banner"
            || tok == "promo"
    })
}

/// Remove non-content elements (scripts, chrome, ad containers) from the
/// document and return the remaining markup.
pub fn clean_html(html: &str) -> String {
    let mut doc = Html::parse_document(html);

    let mut doomed: Vec<ego_tree::NodeId> = Vec::new();
    if let Ok(sel) = Selector::parse(STRIP_SELECTOR) {
        doomed.extend(doc.select(&sel).map(|el| el.id()));
    }
    if let Ok(sel) = Selector::parse(AD_CONTAINER_SELECTOR) {
        doomed.extend(
            doc.select(&sel)
                .filter(is_ad_container)
                .map(|el| el.id()),
        );
    }

    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
    doc.root_element().html()
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;
    for line in text.lines() {
        if line.trim().is_empty() {
            pending_blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        out.push_str(line);
        pending_blank = false;
    }
    out
}

/// Convert HTML to markdown: ATX headings, `-` bullets, fenced code
/// blocks. On conversion failure the input comes back unchanged.
pub fn html_to_markdown(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(STRIP_TAGS.to_vec())
        .options(htmd::options::Options {
            heading_style: htmd::options::HeadingStyle::Atx,
            code_block_style: htmd::options::CodeBlockStyle::Fenced,
            code_block_fence: htmd::options::CodeBlockFence::Backticks,
            bullet_list_marker: htmd::options::BulletListMarker::Dash,
            ..Default::default()
        })
        .build();

    let md = converter.convert(html).unwrap_or_else(|_| html.to_string());
    collapse_blank_lines(&md)
}

/// Full pipeline for a fetched or rendered page.
pub fn page_to_markdown(html: &str) -> String {
    html_to_markdown(&clean_html(html))
}
