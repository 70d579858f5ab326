use std::sync::Arc;

use domain::{
    format::{file_name_from_url, is_bare_numeric_file_name, is_file_api_url, normalize_text},
    series::EpisodeIdentifier,
};
use log::{debug, warn};
use url::Url;

use crate::http::{FetchRequest, HttpFetcher};

/// Titles this short match almost any file name
const MIN_TITLE_LEN: usize = 3;

/// Whether a subtitle file name plausibly belongs to the title (and episode)
pub fn looks_like_match(file_name: &str, title: &str, episode: Option<&EpisodeIdentifier>) -> bool {
    let name = normalize_text(file_name);
    let title = normalize_text(title);
    let has_title = title.chars().count() >= MIN_TITLE_LEN;

    match episode {
        Some(episode) => {
            let tag = episode.tag().to_ascii_lowercase();
            name.contains(&tag) && (!has_title || name.contains(&title))
        }
        None => is_bare_numeric_file_name(file_name) || (has_title && name.contains(&title)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// Name reported by the server or taken from the url
    FileName(String),
    /// Internal file API link whose episode is chosen from the archive at fetch time
    DeferredToContent,
    /// Neither probe got an answer
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub accepted: bool,
    pub evidence: Evidence,
}

/// Checks a download link without downloading the whole payload
#[derive(Clone)]
pub struct LinkValidator {
    fetcher: Arc<dyn HttpFetcher>,
}

impl LinkValidator {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn validate(
        &self,
        url: &Url,
        title: &str,
        episode: Option<&EpisodeIdentifier>,
    ) -> ValidationResult {
        let Some(file_name) = self.probe_file_name(url).await else {
            return ValidationResult {
                accepted: false,
                evidence: Evidence::Unreachable,
            };
        };

        if looks_like_match(&file_name, title, episode) {
            debug!("[Validate] Accepted {url} as {file_name}");
            return ValidationResult {
                accepted: true,
                evidence: Evidence::FileName(file_name),
            };
        }

        // Season packs behind the file API are often named by id only
        if episode.is_some() && is_file_api_url(url) {
            debug!("[Validate] Provisionally accepted {url}");
            return ValidationResult {
                accepted: true,
                evidence: Evidence::DeferredToContent,
            };
        }

        debug!("[Validate] Rejected {url} named {file_name}");
        ValidationResult {
            accepted: false,
            evidence: Evidence::FileName(file_name),
        }
    }

    /// 1. HEAD and read Content-Disposition
    /// 2. single byte ranged GET and read Content-Disposition
    /// 3. last url path segment
    ///
    /// None when neither request could be sent
    async fn probe_file_name(&self, url: &Url) -> Option<String> {
        let head = self
            .fetcher
            .send(FetchRequest::head(url.clone()))
            .await
            .inspect_err(|err| warn!("[Validate] HEAD {url} failed: {err}"))
            .ok();
        if let Some(name) = head
            .as_ref()
            .filter(|response| response.is_success())
            .and_then(|response| response.disposition_file_name())
        {
            return Some(name);
        }

        let ranged = self
            .fetcher
            .send(FetchRequest::get(url.clone()).with_range(0, 0))
            .await
            .inspect_err(|err| warn!("[Validate] ranged GET {url} failed: {err}"))
            .ok();
        if let Some(name) = ranged
            .as_ref()
            .and_then(|response| response.disposition_file_name())
        {
            return Some(name);
        }

        if head.is_none() && ranged.is_none() {
            return None;
        }

        Some(file_name_from_url(url).unwrap_or_default())
    }
}
