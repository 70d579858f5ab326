use std::sync::Arc;

use async_trait::async_trait;
use domain::PostCandidate;
use log::{debug, info, warn};

use super::{SearchContext, SearchStrategy};
use crate::{
    http::{FetchRequest, HttpFetcher},
    source::SubtitleSource,
};

/// The site addresses detail pages by IMDb id, so a cheap HEAD often
/// finds the page without any searching
pub struct DirectIdProbe {
    source: SubtitleSource,
    fetcher: Arc<dyn HttpFetcher>,
}

impl DirectIdProbe {
    pub fn new(source: SubtitleSource, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { source, fetcher }
    }
}

#[async_trait]
impl SearchStrategy for DirectIdProbe {
    fn name(&self) -> &'static str {
        "direct id"
    }

    async fn attempt(&self, context: &SearchContext<'_>) -> Option<Vec<PostCandidate>> {
        if context.imdb_id.is_empty() {
            return None;
        }

        for url in self
            .source
            .detail_page_urls(context.imdb_id, context.media_type)
        {
            let response = self
                .fetcher
                .send(FetchRequest::head(url.clone()))
                .await
                .inspect_err(|err| warn!("[Search] Probe of {url} failed: {err}"))
                .ok();
            match response {
                Some(response) if response.is_success() => {
                    info!("[Search] Found detail page {url}");
                    return Some(vec![PostCandidate {
                        href: url,
                        anchor_text: "Direct IMDB match".to_string(),
                    }]);
                }
                Some(response) => debug!("[Search] Probe of {url} answered {}", response.status),
                None => {}
            }
        }
        None
    }
}
