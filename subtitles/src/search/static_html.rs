use std::sync::Arc;

use async_trait::async_trait;
use domain::PostCandidate;
use log::{debug, info, warn};

use super::{SearchContext, SearchStrategy, links::html_anchors};
use crate::{
    http::{FetchRequest, HTML_HEADERS, HttpFetcher},
    source::SubtitleSource,
};

/// Plain GET of the search page on every configured base, for when the
/// renderer is missing or came back empty
pub struct StaticHtmlSearch {
    source: SubtitleSource,
    fetcher: Arc<dyn HttpFetcher>,
}

impl StaticHtmlSearch {
    pub fn new(source: SubtitleSource, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { source, fetcher }
    }
}

#[async_trait]
impl SearchStrategy for StaticHtmlSearch {
    fn name(&self) -> &'static str {
        "static search"
    }

    async fn attempt(&self, context: &SearchContext<'_>) -> Option<Vec<PostCandidate>> {
        for base in self.source.search_bases() {
            for query in context.queries {
                let url = self.source.search_url(base, query);
                let request = FetchRequest::get(url.clone()).with_headers(&HTML_HEADERS);
                let Some(response) = self
                    .fetcher
                    .send(request)
                    .await
                    .inspect_err(|err| warn!("[Search] GET {url} failed: {err}"))
                    .ok()
                else {
                    continue;
                };
                if !response.is_success() {
                    debug!("[Search] GET {url} answered {}", response.status);
                    continue;
                }

                let posts = html_anchors(&response.text(), &response.url, "a[href]")
                    .into_iter()
                    .filter(|post| self.source.hosts(&post.href))
                    .collect::<Vec<_>>();
                if !posts.is_empty() {
                    info!("[Search] {} links on {url}", posts.len());
                    return Some(posts);
                }
            }
        }
        None
    }
}
