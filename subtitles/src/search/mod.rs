//! Finding posts (detail pages or direct files) for a title on the subtitle site.
//!
//! Strategies run in a fixed priority order and the first one that comes back
//! with anything wins, later strategies never run in that case.

mod direct_id;
pub mod links;
mod rendered;
mod static_html;
mod web_search;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{MediaType, PostCandidate};
use log::{debug, info};

pub use direct_id::DirectIdProbe;
pub use rendered::RenderedPageSearch;
pub use static_html::StaticHtmlSearch;
pub use web_search::WebSearchFallback;

use crate::{http::HttpFetcher, render::PageRenderer, source::SubtitleSource};

#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    /// Most specific first
    pub queries: &'a [String],
    pub imdb_id: &'a str,
    pub media_type: MediaType,
}

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` or an empty list lets the next strategy run
    async fn attempt(&self, context: &SearchContext<'_>) -> Option<Vec<PostCandidate>>;
}

pub struct CandidateSearch {
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl CandidateSearch {
    pub fn new(strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Direct id probe, rendered site search, static site search, web search
    pub fn standard(
        source: SubtitleSource,
        fetcher: Arc<dyn HttpFetcher>,
        renderer: Arc<dyn PageRenderer>,
        render_timeout: Duration,
    ) -> Self {
        Self::new(vec![
            Box::new(DirectIdProbe::new(source.clone(), fetcher.clone())),
            Box::new(RenderedPageSearch::new(
                source.clone(),
                renderer,
                render_timeout,
            )),
            Box::new(StaticHtmlSearch::new(source.clone(), fetcher.clone())),
            Box::new(WebSearchFallback::new(source, fetcher)),
        ])
    }

    pub async fn search(&self, context: &SearchContext<'_>) -> Vec<PostCandidate> {
        for strategy in &self.strategies {
            debug!("[Search] Trying {}", strategy.name());
            match strategy.attempt(context).await {
                Some(candidates) if !candidates.is_empty() => {
                    info!(
                        "[Search] {} found {} candidates for {}",
                        strategy.name(),
                        candidates.len(),
                        context.imdb_id
                    );
                    return candidates;
                }
                _ => debug!("[Search] {} found nothing", strategy.name()),
            }
        }
        info!("[Search] No candidates for {}", context.imdb_id);
        Vec::new()
    }
}
