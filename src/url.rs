use std::sync::LazyLock;

use regex::Regex;

static PULL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pull/(\d+)$").expect("valid pull number pattern"));

const WWW_HOST: &str = "www.github.com";
const HOST: &str = "github.com";

/// Canonical form of a pull request URL used for every equality check.
///
/// Trims surrounding whitespace, drops a trailing slash and folds the
/// `www.` host variant. The single step is applied until it stops changing
/// the input, so the result is always a fixed point.
pub fn normalize_url(url: Option<&str>) -> String {
    let Some(raw) = url else {
        return String::new();
    };

    let mut current = raw.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.replacen(WWW_HOST, HOST, 1)
}

/// Pull request number at the end of a `/pull/<n>` URL.
pub fn pull_number(url: &str) -> Option<u64> {
    PULL_NUMBER
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `owner/repo` part of a repository or pull request URL.
pub fn repository(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let mut segments = rest.split('/').skip(1).filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    Some(format!("{owner}/{repo}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_normalizes_to_empty() {
        assert_eq!(normalize_url(None), "");
        assert_eq!(normalize_url(Some("   ")), "");
    }

    #[test]
    fn www_and_trailing_slash_are_equivalent() {
        assert_eq!(
            normalize_url(Some("https://www.github.com/a/b/")),
            normalize_url(Some("https://github.com/a/b"))
        );
        assert_eq!(
            normalize_url(Some("  https://github.com/org/repo/pull/3/ \n")),
            "https://github.com/org/repo/pull/3"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "https://github.com/org/repo/pull/1",
            "https://www.github.com/org/repo/pull/1/",
            "https://github.com/org/repo/pull/1//",
            " https://github.com/a/ / ",
            "https://www.www.github.com/x",
            "not a url at all/",
            "",
        ];
        for sample in samples {
            let once = normalize_url(Some(sample));
            assert_eq!(normalize_url(Some(&once)), once, "input {sample:?}");
        }
    }

    #[test]
    fn pull_number_reads_trailing_segment() {
        assert_eq!(
            pull_number("https://github.com/org/front_chapter1-1/pull/23"),
            Some(23)
        );
        assert_eq!(pull_number("https://github.com/org/repo/pull/23/files"), None);
        assert_eq!(pull_number("https://github.com/org/repo"), None);
    }

    #[test]
    fn repository_extracts_owner_and_name() {
        assert_eq!(
            repository("https://github.com/org/front_chapter2-1/pull/4").as_deref(),
            Some("org/front_chapter2-1")
        );
        assert_eq!(repository("https://github.com/org"), None);
        assert_eq!(repository("garbage"), None);
    }
}
