//! URL normalization (bounded, deterministic).
//!
//! Rewrites known source-hosting URL shapes into direct-content
//! equivalents before any extractor sees them. Non-matching URLs pass
//! through unchanged, which also makes normalization idempotent.

fn env_csv(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn host_matches(host: &str, pat: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    let pat = pat.trim().to_ascii_lowercase();
    if host == pat {
        return true;
    }
    host.ends_with(&format!(".{pat}"))
}

fn github_rewrite_hosts() -> Vec<String> {
    let v = env_csv("WEBGRAB_GITHUB_REWRITE_HOSTS");
    if v.is_empty() {
        vec!["github.com".to_string(), "www.github.com".to_string()]
    } else {
        v
    }
}

fn github_raw_host() -> String {
    std::env::var("WEBGRAB_GITHUB_RAW_HOST")
        .ok()
        .unwrap_or_else(|| "raw.githubusercontent.com".to_string())
        .trim()
        .to_string()
}

/// Base URL of the repository contents API. Tests point this at a local
/// fixture server.
pub fn github_api_base() -> String {
    std::env::var("WEBGRAB_GITHUB_API_BASE")
        .ok()
        .unwrap_or_else(|| "https://api.github.com".to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

fn is_github_host(u: &url::Url) -> bool {
    let Some(host) = u.host_str() else {
        return false;
    };
    github_rewrite_hosts().iter().any(|h| host_matches(host, h))
}

/// `github.com/<owner>/<repo>/blob/<ref>/<path...>` becomes the raw file
/// URL for the same owner/repo/ref/path.
fn blob_raw_target(url: &str) -> Option<String> {
    let u = url::Url::parse(url.trim()).ok()?;
    if !is_github_host(&u) {
        return None;
    }
    let parts: Vec<&str> = u.path().trim_matches('/').split('/').collect();
    if parts.len() < 5 || parts[2] != "blob" {
        return None;
    }
    let owner = parts[0].trim();
    let repo = parts[1].trim();
    let rf = parts[3].trim();
    if owner.is_empty() || repo.is_empty() || rf.is_empty() {
        return None;
    }
    let rel_path = parts[4..].join("/");
    if rel_path.trim().is_empty() {
        return None;
    }
    let scheme = u.scheme();
    let raw_host = github_raw_host();
    Some(format!("{scheme}://{raw_host}/{owner}/{repo}/{rf}/{rel_path}"))
}

/// `github.com/<owner>/<repo>/tree/<ref>[/<path...>]` becomes the
/// contents-listing API URL for that path and ref.
fn tree_listing_target(url: &str) -> Option<String> {
    let u = url::Url::parse(url.trim()).ok()?;
    if !is_github_host(&u) {
        return None;
    }
    let parts: Vec<&str> = u.path().trim_matches('/').split('/').collect();
    if parts.len() < 4 || parts[2] != "tree" {
        return None;
    }
    let owner = parts[0].trim();
    let repo = parts[1].trim();
    let rf = parts[3].trim();
    if owner.is_empty() || repo.is_empty() || rf.is_empty() {
        return None;
    }
    let base = github_api_base();
    let rel_path = parts[4..].join("/");
    if rel_path.trim().is_empty() {
        Some(format!("{base}/repos/{owner}/{repo}/contents?ref={rf}"))
    } else {
        Some(format!(
            "{base}/repos/{owner}/{repo}/contents/{rel_path}?ref={rf}"
        ))
    }
}

/// Rewrite a hosting-page URL into its direct-content equivalent, or hand
/// back the input unchanged.
pub fn normalize(url: &str) -> String {
    if let Some(t) = blob_raw_target(url) {
        return t;
    }
    if let Some(t) = tree_listing_target(url) {
        return t;
    }
    url.to_string()
}

/// True when `url` targets the repository contents API; the HTTP extractor
/// branches on the payload shape for these.
pub fn is_contents_api_url(url: &str) -> bool {
    let Ok(u) = url::Url::parse(url) else {
        return false;
    };
    let Ok(base) = url::Url::parse(&github_api_base()) else {
        return false;
    };
    u.host_str() == base.host_str()
        && u.port_or_known_default() == base.port_or_known_default()
        && u.path().starts_with("/repos/")
        && u.path().contains("/contents")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testenv::env_lock;
    use proptest::prelude::*;

    #[test]
    fn blob_urls_map_to_raw_preserving_owner_repo_ref_path() {
        let _lock = env_lock();
        std::env::remove_var("WEBGRAB_GITHUB_REWRITE_HOSTS");
        std::env::remove_var("WEBGRAB_GITHUB_RAW_HOST");
        let out = normalize("https://github.com/o/r/blob/main/src/lib.rs");
        assert_eq!(out, "https://raw.githubusercontent.com/o/r/main/src/lib.rs");
    }

    #[test]
    fn tree_urls_map_to_the_contents_api() {
        let _lock = env_lock();
        std::env::remove_var("WEBGRAB_GITHUB_API_BASE");
        assert_eq!(
            normalize("https://github.com/o/r/tree/dev/src/parser"),
            "https://api.github.com/repos/o/r/contents/src/parser?ref=dev"
        );
        assert_eq!(
            normalize("https://github.com/o/r/tree/main"),
            "https://api.github.com/repos/o/r/contents?ref=main"
        );
    }

    #[test]
    fn non_matching_urls_pass_through_unchanged() {
        let _lock = env_lock();
        std::env::remove_var("WEBGRAB_GITHUB_REWRITE_HOSTS");
        for u in [
            "https://example.com/a/b",
            "https://github.com/o/r",
            "https://github.com/o/r/pull/5",
            "not a url at all",
            "",
        ] {
            assert_eq!(normalize(u), u);
        }
    }

    #[test]
    fn contents_api_urls_are_recognized() {
        let _lock = env_lock();
        std::env::remove_var("WEBGRAB_GITHUB_API_BASE");
        assert!(is_contents_api_url(
            "https://api.github.com/repos/o/r/contents/src?ref=main"
        ));
        assert!(!is_contents_api_url("https://api.github.com/repos/o/r"));
        assert!(!is_contents_api_url("https://example.com/repos/o/r/contents"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent_and_never_panics(s in ".*") {
            let _lock = env_lock();
            std::env::remove_var("WEBGRAB_GITHUB_REWRITE_HOSTS");
            std::env::remove_var("WEBGRAB_GITHUB_RAW_HOST");
            std::env::remove_var("WEBGRAB_GITHUB_API_BASE");
            let once = normalize(&s);
            let twice = normalize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
