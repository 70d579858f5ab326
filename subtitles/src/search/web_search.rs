use std::sync::Arc;

use async_trait::async_trait;
use domain::PostCandidate;
use log::{info, warn};

use super::{SearchContext, SearchStrategy, links::html_anchors};
use crate::{
    http::{FetchRequest, HTML_HEADERS, HttpFetcher},
    source::SubtitleSource,
};

const RESULT_SELECTOR: &str = "a.result__a";

/// Site-restricted query on an external web search, last resort
pub struct WebSearchFallback {
    source: SubtitleSource,
    fetcher: Arc<dyn HttpFetcher>,
}

impl WebSearchFallback {
    pub fn new(source: SubtitleSource, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { source, fetcher }
    }
}

#[async_trait]
impl SearchStrategy for WebSearchFallback {
    fn name(&self) -> &'static str {
        "web search"
    }

    async fn attempt(&self, context: &SearchContext<'_>) -> Option<Vec<PostCandidate>> {
        for query in context.queries {
            let url = self.source.web_search_url(query);
            let request = FetchRequest::get(url.clone()).with_headers(&HTML_HEADERS);
            let Some(response) = self
                .fetcher
                .send(request)
                .await
                .inspect_err(|err| warn!("[Search] Web search {url} failed: {err}"))
                .ok()
                .filter(|response| response.is_success())
            else {
                continue;
            };

            // Result links point at a redirect wrapper, unwrapped while normalizing
            let posts = html_anchors(&response.text(), &response.url, RESULT_SELECTOR)
                .into_iter()
                .filter(|post| self.source.hosts(&post.href))
                .collect::<Vec<_>>();
            if !posts.is_empty() {
                info!("[Search] Web search found {} results for \"{query}\"", posts.len());
                return Some(posts);
            }
        }
        None
    }
}
