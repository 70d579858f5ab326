//! Shape checks on the URLs and file names produced by the subtitle site.

use percent_encoding::percent_decode_str;
use url::Url;

/// Path segment of the site's internal subtitle download API
pub const FILE_API_PATH: &str = "/api/files/sub/";

/// A path ending in `.srt` or `.zip` (any query string), or an internal file API link
pub fn is_subtitle_file_url(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.ends_with(".srt") || path.ends_with(".zip") || path.contains(FILE_API_PATH)
}

pub fn is_file_api_url(url: &Url) -> bool {
    file_api_id(url).is_some()
}

/// Numeric id of an internal file API link
pub fn file_api_id(url: &Url) -> Option<&str> {
    let path = url.path();
    let start = path.find(FILE_API_PATH)? + FILE_API_PATH.len();
    let rest = &path[start..];
    let end = rest
        .find(|char: char| !char.is_ascii_digit())
        .unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Movie or series page on the site, these list the per-release download links
pub fn is_detail_page_url(url: &Url) -> bool {
    let path = url.path();
    path.contains("/movie/") || path.contains("/series/")
}

/// File names like `48213.zip` carry no title information at all
pub fn is_bare_numeric_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let Some(stem) = lower
        .strip_suffix(".zip")
        .or_else(|| lower.strip_suffix(".srt"))
    else {
        return false;
    };
    !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit())
}

/// Lower-cases and collapses separators so `Some.Movie_Title-2020` and
/// `Some Movie Title 2020` compare equal. Apostrophes are dropped.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_space = false;
    for char in text.chars() {
        if matches!(char, '\'' | '’') {
            continue;
        }
        if char.is_alphanumeric() {
            if pending_space && !normalized.is_empty() {
                normalized.push(' ');
            }
            pending_space = false;
            normalized.extend(char.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    normalized
}

/// Last path segment of the url, percent-decoded
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    Some(percent_decode_str(segment).decode_utf8_lossy().into_owned())
}
