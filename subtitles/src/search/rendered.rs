use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{
    PostCandidate,
    format::{is_detail_page_url, is_subtitle_file_url},
};
use log::{info, warn};

use super::{SearchContext, SearchStrategy, links::rendered_links};
use crate::{
    render::{PageRenderer, RenderError},
    source::SubtitleSource,
};

/// +10 for every query term in the link text, +50 when it holds the whole query
fn score(anchor_text: &str, query: &str) -> u32 {
    let text = anchor_text.to_lowercase();
    let query = query.to_lowercase();
    let term_score = query
        .split_whitespace()
        .filter(|term| text.contains(term))
        .count() as u32
        * 10;
    let phrase_score = if text.contains(&query) { 50 } else { 0 };
    term_score + phrase_score
}

/// Highest scoring detail page, the earliest wins ties
fn best_detail_page(pages: &[PostCandidate], query: &str) -> Option<PostCandidate> {
    let mut best: Option<(u32, &PostCandidate)> = None;
    for page in pages {
        let page_score = score(&page.anchor_text, query);
        if best.is_none_or(|(best_score, _)| page_score > best_score) {
            best = Some((page_score, page));
        }
    }
    best.map(|(_, page)| page.clone())
}

/// Runs the site's own search page in the renderer, where results are built client-side
pub struct RenderedPageSearch {
    source: SubtitleSource,
    renderer: Arc<dyn PageRenderer>,
    timeout: Duration,
}

impl RenderedPageSearch {
    pub fn new(source: SubtitleSource, renderer: Arc<dyn PageRenderer>, timeout: Duration) -> Self {
        Self {
            source,
            renderer,
            timeout,
        }
    }
}

#[async_trait]
impl SearchStrategy for RenderedPageSearch {
    fn name(&self) -> &'static str {
        "rendered search"
    }

    async fn attempt(&self, context: &SearchContext<'_>) -> Option<Vec<PostCandidate>> {
        for query in context.queries {
            let url = self.source.search_url(self.source.base(), query);

            let page = match tokio::time::timeout(self.timeout, self.renderer.render(&url)).await {
                Ok(Ok(page)) => page,
                Ok(Err(RenderError::Unavailable)) => {
                    info!("[Search] No renderer, skipping rendered search");
                    return None;
                }
                Ok(Err(err)) => {
                    warn!("[Search] Rendering {url} failed: {err}");
                    continue;
                }
                Err(_) => {
                    warn!("[Search] Rendering {url} timed out");
                    continue;
                }
            };

            let links = rendered_links(&page, &url, |observed| {
                self.source.hosts(observed) && observed.path().starts_with("/api/")
            })
            .into_iter()
            .filter(|link| self.source.hosts(&link.href))
            .collect::<Vec<_>>();

            let direct = links
                .iter()
                .filter(|link| is_subtitle_file_url(&link.href))
                .cloned()
                .collect::<Vec<_>>();
            if !direct.is_empty() {
                info!("[Search] {} direct links for \"{query}\"", direct.len());
                return Some(direct);
            }

            let detail_pages = links
                .into_iter()
                .filter(|link| is_detail_page_url(&link.href) && !link.anchor_text.is_empty())
                .collect::<Vec<_>>();
            if let Some(best) = best_detail_page(&detail_pages, query) {
                info!("[Search] Best page for \"{query}\": {}", best.href);
                return Some(vec![best]);
            }
        }
        None
    }
}
