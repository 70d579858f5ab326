//! Link harvesting shared by the search strategies and the page extractor.

use std::sync::LazyLock;

use domain::{PostCandidate, format::is_subtitle_file_url};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::render::{ObservedResponse, RenderedPage};

/// Absolute urls, internal file API paths and `.srt`/`.zip` paths inside
/// arbitrary text such as JSON API responses
static FILE_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(https?://[^"'\s]+|/api/files/sub/\d+|/[\w\-/]+\.(?:srt|zip))(?:\?[^"'\s]*)?"#)
        .expect("File link pattern should be valid")
});

const REDIRECT_HOST: &str = "duckduckgo.com";
const REDIRECT_TARGET_PARAM: &str = "uddg";
/// Nested redirect wrappers are not followed past this depth
const MAX_REDIRECT_DEPTH: usize = 4;

/// Resolves `raw` against `base`, upgrades protocol-relative links to https
/// and unwraps web-search redirect links to their target
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    normalize_url_at_depth(raw, base, 0)
}

fn normalize_url_at_depth(raw: &str, base: Option<&Url>, depth: usize) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let absolute = match raw.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => raw.to_string(),
    };
    let url = match base {
        Some(base) => base.join(&absolute).ok()?,
        None => Url::parse(&absolute).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let is_redirect = url
        .host_str()
        .is_some_and(|host| host == REDIRECT_HOST || host.ends_with(&format!(".{REDIRECT_HOST}")))
        && url.path().starts_with("/l/");
    if is_redirect && depth < MAX_REDIRECT_DEPTH {
        let target = url
            .query_pairs()
            .find(|(key, _)| key == REDIRECT_TARGET_PARAM)
            .map(|(_, value)| value.into_owned())?;
        return normalize_url_at_depth(&target, None, depth + 1);
    }

    Some(url)
}

/// Every `a[href]` in the document, resolved against `base`
pub fn html_anchors(html: &str, base: &Url, selector: &str) -> Vec<PostCandidate> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let href = normalize_url(href, Some(base))?;
            let anchor_text = element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            Some(PostCandidate { href, anchor_text })
        })
        .collect()
}

/// Subtitle-file urls mentioned anywhere in `text`
pub fn discover_file_links(text: &str, base: &Url) -> Vec<Url> {
    FILE_LINK_PATTERN
        .find_iter(text)
        .filter_map(|found| normalize_url(found.as_str(), Some(base)))
        .filter(is_subtitle_file_url)
        .collect()
}

/// JSON bodies are re-serialized first so escaped slashes (`\/`) match
fn observed_text(response: &ObservedResponse) -> String {
    let is_json = response
        .content_type
        .as_deref()
        .is_some_and(|content_type| content_type.contains("json"));
    if is_json
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(&response.body)
    {
        return value.to_string();
    }
    response.body.clone()
}

/// Rendered anchors (with their text) followed by links discovered in the
/// page's own API traffic. `api_filter` selects which responses are read.
pub fn rendered_links(
    page: &RenderedPage,
    page_url: &Url,
    api_filter: impl Fn(&Url) -> bool,
) -> Vec<PostCandidate> {
    let anchors = page.anchors.iter().filter_map(|anchor| {
        let href = normalize_url(&anchor.href, Some(page_url))?;
        Some(PostCandidate {
            href,
            anchor_text: anchor.text.trim().to_string(),
        })
    });

    let discovered = page
        .responses
        .iter()
        .filter(|response| {
            Url::parse(&response.url)
                .ok()
                .is_some_and(|url| api_filter(&url))
        })
        .flat_map(|response| discover_file_links(&observed_text(response), page_url))
        .map(|href| PostCandidate {
            href,
            anchor_text: "discovered".to_string(),
        });

    dedupe(anchors.chain(discovered))
}

/// Keeps the first occurrence of every href
pub fn dedupe(candidates: impl IntoIterator<Item = PostCandidate>) -> Vec<PostCandidate> {
    let mut unique: Vec<PostCandidate> = Vec::new();
    for candidate in candidates {
        if !unique.iter().any(|seen| seen.href == candidate.href) {
            unique.push(candidate);
        }
    }
    unique
}
