use std::{sync::Arc, time::Duration};

use domain::{
    PostCandidate, SubtitleLink,
    format::{is_detail_page_url, is_subtitle_file_url},
};
use log::{debug, info, warn};
use serde::Deserialize;
use url::Url;

use crate::{
    cache::ResolutionCache,
    http::{FetchRequest, HTML_HEADERS, HttpFetcher},
    render::PageRenderer,
    search::links::{dedupe, html_anchors, rendered_links},
    source::SubtitleSource,
};

#[derive(Debug, Default, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    results: Vec<ApiSearchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSearchResult {
    #[serde(default)]
    subtitles: Vec<ApiSubtitle>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSubtitle {
    download_link: Option<String>,
    release_name: Option<String>,
}

fn into_links(candidates: Vec<PostCandidate>, default_label: &str) -> Vec<SubtitleLink> {
    candidates
        .into_iter()
        .filter(|candidate| is_subtitle_file_url(&candidate.href))
        .map(|candidate| SubtitleLink {
            label: if candidate.anchor_text.is_empty() {
                default_label.to_string()
            } else {
                candidate.anchor_text
            },
            href: candidate.href,
        })
        .collect()
}

/// IMDb id out of a `/movie/tt…` or `/series/tt…` path
fn imdb_id_of(page: &Url) -> Option<&str> {
    let mut segments = page.path_segments()?;
    segments.find(|segment| matches!(*segment, "movie" | "series"))?;
    segments.next().filter(|id| {
        id.len() > 2 && id.starts_with("tt") && id[2..].bytes().all(|b| b.is_ascii_digit())
    })
}

/// Lists the subtitle download links of a post page
pub struct PageLinkExtractor {
    source: SubtitleSource,
    fetcher: Arc<dyn HttpFetcher>,
    renderer: Arc<dyn PageRenderer>,
    render_timeout: Duration,
    cache: ResolutionCache,
}

impl PageLinkExtractor {
    pub fn new(
        source: SubtitleSource,
        fetcher: Arc<dyn HttpFetcher>,
        renderer: Arc<dyn PageRenderer>,
        render_timeout: Duration,
        cache: ResolutionCache,
    ) -> Self {
        Self {
            source,
            fetcher,
            renderer,
            render_timeout,
            cache,
        }
    }

    /// Subtitle-file links in first-seen order, memoized per page when non-empty
    pub async fn extract(&self, page: &Url) -> Arc<[SubtitleLink]> {
        self.cache
            .page_links(page, || self.extract_uncached(page))
            .await
    }

    async fn extract_uncached(&self, page: &Url) -> Vec<SubtitleLink> {
        // 1. Detail pages load their download list client-side
        if is_detail_page_url(page) {
            let rendered = self.rendered_links(page).await;
            if !rendered.is_empty() {
                info!("[Extract] {} rendered links on {page}", rendered.len());
                return rendered;
            }
        }

        // 2. Server-side anchors
        let static_links = self.static_links(page).await;
        if !static_links.is_empty() {
            info!("[Extract] {} static links on {page}", static_links.len());
            return static_links;
        }

        // 3. The site's JSON search by IMDb id
        match imdb_id_of(page) {
            Some(imdb_id) => self.api_links(imdb_id).await,
            None => {
                debug!("[Extract] No links on {page}");
                Vec::new()
            }
        }
    }

    async fn rendered_links(&self, page: &Url) -> Vec<SubtitleLink> {
        let rendered = tokio::time::timeout(self.render_timeout, self.renderer.render(page)).await;
        let rendered = match rendered {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(err)) => {
                warn!("[Extract] Rendering {page} failed: {err}");
                return Vec::new();
            }
            Err(_) => {
                warn!("[Extract] Rendering {page} timed out");
                return Vec::new();
            }
        };

        let candidates = rendered_links(&rendered, page, |observed| {
            self.source.hosts(observed) && observed.path().starts_with("/api/")
        });
        into_links(candidates, "Download")
    }

    async fn static_links(&self, page: &Url) -> Vec<SubtitleLink> {
        let request = FetchRequest::get(page.clone()).with_headers(&HTML_HEADERS);
        let Some(response) = self
            .fetcher
            .send(request)
            .await
            .inspect_err(|err| warn!("[Extract] GET {page} failed: {err}"))
            .ok()
            .filter(|response| response.is_success())
        else {
            return Vec::new();
        };

        let anchors = html_anchors(&response.text(), &response.url, "a[href]");
        into_links(dedupe(anchors), "Download")
    }

    async fn api_links(&self, imdb_id: &str) -> Vec<SubtitleLink> {
        let Some(url) = self.source.api_search_url(imdb_id) else {
            return Vec::new();
        };
        let Some(response) = self
            .fetcher
            .send(FetchRequest::get(url.clone()))
            .await
            .inspect_err(|err| warn!("[Extract] API search {url} failed: {err}"))
            .ok()
            .filter(|response| response.is_success())
        else {
            return Vec::new();
        };

        let Some(parsed) = serde_json::from_slice::<ApiSearchResponse>(&response.body)
            .inspect_err(|err| warn!("[Extract] Invalid API search response: {err}"))
            .ok()
        else {
            return Vec::new();
        };

        let links = parsed
            .results
            .into_iter()
            .flat_map(|result| result.subtitles)
            .filter_map(|subtitle| {
                let href = self.source.base().join(subtitle.download_link?.trim()).ok()?;
                let label = subtitle
                    .release_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| "Download".to_string());
                Some(SubtitleLink { href, label })
            })
            .collect::<Vec<_>>();
        info!("[Extract] {} links from API search for {imdb_id}", links.len());
        links
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use url::Url;

    use super::{PageLinkExtractor, imdb_id_of};
    use crate::{
        cache::ResolutionCache,
        http::FetchMethod,
        render::{DisabledRenderer, PageRenderer},
        source::SubtitleSource,
        testing::{ScriptedRenderer, StaticFetcher, anchors_page},
    };

    fn extractor(fetcher: Arc<StaticFetcher>, renderer: Arc<dyn PageRenderer>) -> PageLinkExtractor {
        PageLinkExtractor::new(
            SubtitleSource::default(),
            fetcher,
            renderer,
            Duration::from_secs(1),
            ResolutionCache::default(),
        )
    }

    #[test]
    fn imdb_ids_from_paths() {
        let url = |raw: &str| Url::parse(raw).unwrap();
        assert_eq!(imdb_id_of(&url("https://wizdom.xyz/movie/tt0113277")), Some("tt0113277"));
        assert_eq!(imdb_id_of(&url("https://wizdom.xyz/series/tt1/")), Some("tt1"));
        assert_eq!(imdb_id_of(&url("https://wizdom.xyz/movie/heat")), None);
        assert_eq!(imdb_id_of(&url("https://wizdom.xyz/?s=heat")), None);
    }

    #[tokio::test]
    async fn rendered_detail_page() {
        let page = "https://wizdom.xyz/movie/tt0113277";
        let renderer = ScriptedRenderer::new().page(
            page,
            anchors_page(&[
                ("/api/files/sub/10", "Heat.1995.BluRay"),
                ("/series/tt2", "Something else"),
                ("/api/files/sub/11", ""),
            ]),
        );
        let fetcher = Arc::new(StaticFetcher::new());
        let extractor = extractor(fetcher.clone(), Arc::new(renderer));

        let links = extractor.extract(&Url::parse(page).unwrap()).await;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].label, "Heat.1995.BluRay");
        assert_eq!(links[1].label, "Download");
        assert!(fetcher.requests().is_empty());

        // Cached
        extractor.extract(&Url::parse(page).unwrap()).await;
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_static_then_api() {
        let page = "https://wizdom.xyz/movie/tt0113277";
        let fetcher = Arc::new(
            StaticFetcher::new()
                .page(page, r#"<a href="/about">About</a>"#)
                .page(
                    "https://wizdom.xyz/api/search?q=tt0113277",
                    r#"{"results":[{"subtitles":[
                        {"download_link":"/api/files/sub/7","release_name":"Heat.1995.720p"},
                        {"release_name":"no link"},
                        {"download_link":"https://wizdom.xyz/api/files/sub/8"}
                    ]}]}"#,
                ),
        );
        let extractor = extractor(fetcher.clone(), Arc::new(DisabledRenderer));

        let links = extractor.extract(&Url::parse(page).unwrap()).await;
        let hrefs = links.iter().map(|link| link.href.as_str()).collect::<Vec<_>>();
        assert_eq!(
            hrefs,
            [
                "https://wizdom.xyz/api/files/sub/7",
                "https://wizdom.xyz/api/files/sub/8"
            ]
        );
        assert_eq!(links[0].label, "Heat.1995.720p");
        assert_eq!(links[1].label, "Download");
        assert_eq!(fetcher.request_count(FetchMethod::Get, page), 1);
    }

    #[tokio::test]
    async fn nothing_found_is_not_cached() {
        let page = "https://wizdom.xyz/some/post";
        let fetcher = Arc::new(StaticFetcher::new().page(page, "<p>empty</p>"));
        let extractor = extractor(fetcher.clone(), Arc::new(DisabledRenderer));

        let url = Url::parse(page).unwrap();
        assert!(extractor.extract(&url).await.is_empty());
        assert!(extractor.extract(&url).await.is_empty());
        assert_eq!(fetcher.request_count(FetchMethod::Get, page), 2);
    }
}
