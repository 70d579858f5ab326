use std::{collections::HashMap, sync::Arc, time::Duration};

use domain::{
    CaptionAsset, MediaRequest, PostCandidate, SubtitleLink, TitleInfo,
    format::{file_api_id, is_detail_page_url, is_file_api_url, is_subtitle_file_url},
    series::EpisodeIdentifier,
};
use log::{info, warn};
use url::Url;

use crate::{
    Error,
    archive::Wanted,
    cache::ResolutionCache,
    extract::PageLinkExtractor,
    fetch::ContentFetcher,
    http::HttpFetcher,
    metadata::{MetadataProvider, TitleResolver},
    queries::build_queries,
    rank::{self, Want},
    render::{PageRenderer, SelectorIntent},
    search::{CandidateSearch, SearchContext, links::rendered_links},
    source::SubtitleSource,
    subtitle_provider::{CaptionSource, SubtitleProvider},
    validate::LinkValidator,
};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub source: SubtitleSource,
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
    pub render_timeout: Duration,
    /// Posts ranked and validated per request before giving up
    pub max_candidates: usize,
    /// IMDb id to title, consulted before the metadata service
    pub title_overrides: HashMap<String, String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source: SubtitleSource::default(),
            cache_capacity: ResolutionCache::DEFAULT_CAPACITY,
            cache_ttl: ResolutionCache::DEFAULT_TTL,
            render_timeout: Duration::from_secs(15),
            max_candidates: 3,
            title_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubtitle {
    pub link: SubtitleLink,
    /// Shown to the user after the provider name
    pub display_name: String,
    /// Series detail page the link came from, lets the episode be picked again at serve time
    pub episode_page: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub title: TitleInfo,
    pub episode: Option<EpisodeIdentifier>,
    pub subtitles: Vec<ResolvedSubtitle>,
}

impl Resolution {
    /// What the caption fetch should pick out of season packs
    pub fn wanted(&self) -> Wanted {
        let tag = self.episode.map(|episode| episode.tag());
        Wanted::new(tag.as_deref(), Some(&self.title.title))
    }
}

/// Label of a search result that already is the subtitle file
const DIRECT_LABEL: &str = "Direct";

fn display_name(link: &SubtitleLink) -> String {
    if let Some(id) = file_api_id(&link.href) {
        return format!("Hebrew Subtitle {id}");
    }
    if link.label.trim().is_empty() {
        "Subtitle".to_string()
    } else {
        link.label.trim().to_string()
    }
}

/// Internal file API links first, then whatever came first
fn preferred_episode_link(links: &[PostCandidate]) -> Option<&PostCandidate> {
    links
        .iter()
        .find(|link| is_file_api_url(&link.href))
        .or_else(|| links.first())
}

/// Finds, validates and serves Hebrew subtitles for a media request
pub struct SubtitleResolver {
    titles: TitleResolver,
    search: CandidateSearch,
    validator: LinkValidator,
    extractor: PageLinkExtractor,
    content: ContentFetcher,
    renderer: Arc<dyn PageRenderer>,
    render_timeout: Duration,
    max_candidates: usize,
}

impl SubtitleResolver {
    pub fn new(
        config: ResolverConfig,
        fetcher: Arc<dyn HttpFetcher>,
        renderer: Arc<dyn PageRenderer>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        let cache = ResolutionCache::new(config.cache_capacity, config.cache_ttl);
        let search = CandidateSearch::standard(
            config.source.clone(),
            fetcher.clone(),
            renderer.clone(),
            config.render_timeout,
        );

        Self {
            titles: TitleResolver::new(metadata, config.title_overrides),
            search,
            validator: LinkValidator::new(fetcher.clone()),
            extractor: PageLinkExtractor::new(
                config.source,
                fetcher.clone(),
                renderer.clone(),
                config.render_timeout,
                cache.clone(),
            ),
            content: ContentFetcher::new(fetcher, cache),
            renderer,
            render_timeout: config.render_timeout,
            max_candidates: config.max_candidates,
        }
    }

    /// Every validated subtitle for the request. Nothing found is an empty list.
    pub async fn resolve(&self, request: &MediaRequest) -> Resolution {
        let title = self
            .titles
            .lookup(request.media_type(), request.imdb_id())
            .await;
        let episode = request.episode().copied();
        let empty = |title: TitleInfo| Resolution {
            title,
            episode,
            subtitles: Vec::new(),
        };

        let queries = build_queries(&title, episode.as_ref());
        let context = SearchContext {
            queries: &queries,
            imdb_id: request.imdb_id(),
            media_type: request.media_type(),
        };
        let mut posts = self.search.search(&context).await;
        if posts.is_empty() {
            info!("[Resolve] No posts for {}", request.imdb_id());
            return empty(title);
        }

        let want = Want {
            title: &title.title,
            episode: episode.as_ref(),
        };
        for attempt in 1..=self.max_candidates {
            let Some(chosen) = rank::pick(&posts, &want).cloned() else {
                break;
            };
            posts.retain(|post| post.href != chosen.href);
            info!("[Resolve] Attempt {attempt}: {}", chosen.href);

            let links = self.validated_links(&chosen, &title, episode.as_ref()).await;
            if links.is_empty() {
                info!("[Resolve] Nothing usable on {}", chosen.href);
                continue;
            }

            let episode_page = (episode.is_some() && is_detail_page_url(&chosen.href))
                .then(|| chosen.href.clone());
            let subtitles = links
                .into_iter()
                .map(|link| ResolvedSubtitle {
                    display_name: display_name(&link),
                    episode_page: episode_page.clone(),
                    link,
                })
                .collect::<Vec<_>>();
            info!(
                "[Resolve] {} subtitles for {} from {}",
                subtitles.len(),
                request.imdb_id(),
                chosen.href
            );
            return Resolution {
                title,
                episode,
                subtitles,
            };
        }

        empty(title)
    }

    async fn validated_links(
        &self,
        chosen: &PostCandidate,
        title: &TitleInfo,
        episode: Option<&EpisodeIdentifier>,
    ) -> Vec<SubtitleLink> {
        if is_subtitle_file_url(&chosen.href) {
            let verdict = self
                .validator
                .validate(&chosen.href, &title.title, episode)
                .await;
            if !verdict.accepted {
                return Vec::new();
            }
            return vec![SubtitleLink {
                href: chosen.href.clone(),
                label: DIRECT_LABEL.to_string(),
            }];
        }

        let mut accepted = Vec::new();
        for link in self.extractor.extract(&chosen.href).await.iter() {
            if !is_subtitle_file_url(&link.href) {
                continue;
            }
            let verdict = self
                .validator
                .validate(&link.href, &title.title, episode)
                .await;
            if verdict.accepted {
                accepted.push(link.clone());
            }
        }
        accepted
    }

    /// Downloads and normalizes one subtitle payload
    pub async fn caption(&self, source: &Url, wanted: &Wanted) -> Result<CaptionAsset, Error> {
        Ok(self.content.fetch(source, wanted).await?)
    }

    /// Picks the wanted episode on a series page, then serves its caption.
    /// `fallback` stands in whenever the page can't be used.
    pub async fn episode_caption(
        &self,
        post: Option<&Url>,
        wanted: &Wanted,
        fallback: Option<&Url>,
    ) -> Result<CaptionAsset, Error> {
        let episode = wanted.tag().and_then(EpisodeIdentifier::from_tag);
        let (Some(post), Some(episode)) = (post.filter(|post| is_detail_page_url(post)), episode)
        else {
            let source = fallback.or(post).ok_or(Error::MissingSource)?;
            return self.caption(source, wanted).await;
        };

        let result = match self.episode_link(post, &episode).await {
            Some(source) => self.caption(&source, wanted).await,
            None => Err(Error::NoSubtitleLink),
        };
        match (result, fallback) {
            (Ok(asset), _) => Ok(asset),
            (Err(err), Some(fallback)) => {
                warn!("[Episode] {post} failed ({err}), serving fallback {fallback}");
                self.caption(fallback, wanted).await
            }
            (Err(err), None) => Err(err),
        }
    }

    async fn episode_link(&self, post: &Url, episode: &EpisodeIdentifier) -> Option<Url> {
        let intent = SelectorIntent::ClickEpisode {
            episode: episode.episode_no,
        };
        let page = tokio::time::timeout(
            self.render_timeout,
            self.renderer.render_and_interact(post, intent),
        )
        .await
        .inspect_err(|_| warn!("[Episode] Rendering {post} timed out"))
        .ok()?
        .inspect_err(|err| warn!("[Episode] Rendering {post} failed: {err}"))
        .ok()?;

        let links = rendered_links(&page, post, |observed| observed.path().starts_with("/api/"))
            .into_iter()
            .filter(|link| is_subtitle_file_url(&link.href))
            .collect::<Vec<_>>();
        let chosen = preferred_episode_link(&links)?;
        info!("[Episode] {episode} on {post} is {}", chosen.href);
        Some(chosen.href.clone())
    }
}

impl SubtitleProvider for SubtitleResolver {
    type Error = Error;

    async fn search(&self, request: &MediaRequest) -> Result<Resolution, Self::Error> {
        Ok(self.resolve(request).await)
    }

    async fn download(&self, source: &CaptionSource) -> Result<CaptionAsset, Self::Error> {
        match source {
            CaptionSource::Direct { src, wanted } => self.caption(src, wanted).await,
            CaptionSource::EpisodePage {
                post,
                fallback,
                wanted,
            } => {
                self.episode_caption(post.as_ref(), wanted, fallback.as_ref())
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use domain::{MediaRequest, PostCandidate, SubtitleLink};
    use url::Url;

    use super::{ResolverConfig, SubtitleResolver, display_name, preferred_episode_link};
    use crate::{
        Error,
        archive::{Wanted, tests::zip_of},
        http::FetchMethod,
        render::{DisabledRenderer, PageRenderer, SelectorIntent},
        subtitle_provider::{CaptionSource, SubtitleProvider},
        testing::{FixedMetadata, ScriptedRenderer, StaticFetcher, anchors_page},
    };

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nשלום\n";

    fn resolver(
        fetcher: Arc<StaticFetcher>,
        renderer: Arc<dyn PageRenderer>,
        metadata: FixedMetadata,
    ) -> SubtitleResolver {
        SubtitleResolver::new(
            ResolverConfig::default(),
            fetcher,
            renderer,
            Arc::new(metadata),
        )
    }

    fn disposition(file_name: &str) -> String {
        format!(r#"attachment; filename="{file_name}""#)
    }

    #[tokio::test]
    async fn movie_from_detail_page() {
        let page = "https://wizdom.xyz/movie/tt0113277";
        let file = "https://wizdom.xyz/api/files/sub/10";
        let other = "https://wizdom.xyz/api/files/sub/11";
        let fetcher = Arc::new(
            StaticFetcher::new()
                .respond(FetchMethod::Head, page, 200, &[], "")
                .respond(
                    FetchMethod::Head,
                    file,
                    200,
                    &[("content-disposition", disposition("Heat.1995.BluRay.srt").as_str())],
                    "",
                )
                .respond(
                    FetchMethod::Head,
                    other,
                    200,
                    &[("content-disposition", disposition("Casino.1995.srt").as_str())],
                    "",
                )
                .respond(
                    FetchMethod::Get,
                    file,
                    200,
                    &[("content-type", "application/x-subrip")],
                    SRT,
                ),
        );
        let renderer = ScriptedRenderer::new().page(
            page,
            anchors_page(&[
                ("/api/files/sub/10", "Heat.1995.BluRay"),
                ("/api/files/sub/11", "Casino.1995"),
            ]),
        );
        let resolver = resolver(
            fetcher.clone(),
            Arc::new(renderer),
            FixedMetadata::new("Heat", Some(1995)),
        );

        let resolution = resolver
            .search(&MediaRequest::movie("tt0113277"))
            .await
            .unwrap();
        assert_eq!(resolution.subtitles.len(), 1);
        let subtitle = &resolution.subtitles[0];
        assert_eq!(subtitle.link.href.as_str(), file);
        assert_eq!(subtitle.display_name, "Hebrew Subtitle 10");
        assert_eq!(subtitle.episode_page, None);

        let asset = resolver
            .download(&CaptionSource::Direct {
                src: subtitle.link.href.clone(),
                wanted: resolution.wanted(),
            })
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(asset.bytes).unwrap(),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nשלום\n"
        );
    }

    #[tokio::test]
    async fn nothing_found() {
        let fetcher = Arc::new(StaticFetcher::new());
        let resolver = resolver(fetcher, Arc::new(DisabledRenderer), FixedMetadata::failing());

        let resolution = resolver
            .search(&MediaRequest::movie("tt0000001"))
            .await
            .unwrap();
        assert!(resolution.subtitles.is_empty());
        assert_eq!(resolution.title.title, "tt0000001");
    }

    #[tokio::test]
    async fn series_season_pack() {
        let page = "https://wizdom.xyz/series/tt0903747";
        let pack = "https://wizdom.xyz/api/files/sub/5";
        let episode_file = "https://wizdom.xyz/api/files/sub/6";
        let archive = zip_of(&[
            ("Show.S01E01.srt", "1\n00:00:01,000 --> 00:00:02,000\none\n"),
            ("Show.S01E02.srt", "1\n00:00:01,000 --> 00:00:02,000\ntwo\n"),
        ]);
        let fetcher = Arc::new(
            StaticFetcher::new()
                .respond(FetchMethod::Head, page, 200, &[], "")
                .respond(
                    FetchMethod::Head,
                    pack,
                    200,
                    &[("content-disposition", disposition("5.zip").as_str())],
                    "",
                )
                .respond(
                    FetchMethod::Get,
                    pack,
                    200,
                    &[("content-type", "application/zip")],
                    archive,
                )
                .respond(
                    FetchMethod::Get,
                    episode_file,
                    200,
                    &[],
                    "1\n00:00:01,000 --> 00:00:02,000\nsix\n",
                ),
        );
        let renderer = ScriptedRenderer::new()
            .page(page, anchors_page(&[("/api/files/sub/5", "Show Season 1")]))
            .interaction(
                page,
                SelectorIntent::ClickEpisode { episode: 2 },
                anchors_page(&[("/api/files/sub/6", "Show.S01E02")]),
            );
        let resolver = resolver(
            fetcher,
            Arc::new(renderer),
            FixedMetadata::new("Show", None),
        );

        let request = MediaRequest::from_route("series", "tt0903747:1:2.json").unwrap();
        let resolution = resolver.search(&request).await.unwrap();
        assert_eq!(resolution.subtitles.len(), 1);
        let subtitle = &resolution.subtitles[0];
        assert_eq!(subtitle.link.href.as_str(), pack);
        assert_eq!(subtitle.episode_page.as_ref().map(Url::as_str), Some(page));
        assert_eq!(resolution.wanted().tag(), Some("S01E02"));

        // The pack itself yields the wanted episode
        let from_pack = resolver
            .download(&CaptionSource::Direct {
                src: subtitle.link.href.clone(),
                wanted: resolution.wanted(),
            })
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&from_pack.bytes).contains("two"));

        // Clicking the episode on the page finds its own file
        let from_page = resolver
            .download(&CaptionSource::EpisodePage {
                post: subtitle.episode_page.clone(),
                fallback: Some(subtitle.link.href.clone()),
                wanted: resolution.wanted(),
            })
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&from_page.bytes).contains("six"));
    }

    #[tokio::test]
    async fn episode_page_falls_back() {
        let page = Url::parse("https://wizdom.xyz/series/tt1").unwrap();
        let fallback = Url::parse("https://wizdom.xyz/a/Show.S01E03.srt").unwrap();
        let fetcher = Arc::new(StaticFetcher::new().respond(
            FetchMethod::Get,
            fallback.as_str(),
            200,
            &[],
            SRT,
        ));
        let resolver = resolver(
            fetcher,
            Arc::new(ScriptedRenderer::new()),
            FixedMetadata::new("Show", None),
        );
        let wanted = Wanted::new(Some("S01E03"), Some("Show"));

        let asset = resolver
            .episode_caption(Some(&page), &wanted, Some(&fallback))
            .await
            .unwrap();
        assert!(asset.bytes.starts_with(b"WEBVTT\n\n"));

        assert!(matches!(
            resolver.episode_caption(Some(&page), &wanted, None).await,
            Err(Error::NoSubtitleLink)
        ));
        assert!(matches!(
            resolver.episode_caption(None, &wanted, None).await,
            Err(Error::MissingSource)
        ));
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn direct_file_result_is_labelled_direct() {
        let search_page = "https://wizdom.xyz/?s=Heat+1995";
        let file = "https://wizdom.xyz/a/Heat.1995.srt";
        let fetcher = Arc::new(StaticFetcher::new().respond(
            FetchMethod::Head,
            file,
            200,
            &[("content-disposition", disposition("Heat.1995.srt").as_str())],
            "",
        ));
        let renderer = ScriptedRenderer::new().page(
            search_page,
            anchors_page(&[("/a/Heat.1995.srt", "Heat (1995) - Wizdom")]),
        );
        let resolver = resolver(
            fetcher,
            Arc::new(renderer),
            FixedMetadata::new("Heat", Some(1995)),
        );

        let resolution = resolver
            .search(&MediaRequest::movie("tt0113277"))
            .await
            .unwrap();
        assert_eq!(resolution.subtitles.len(), 1);
        let subtitle = &resolution.subtitles[0];
        assert_eq!(subtitle.link.href.as_str(), file);
        assert_eq!(subtitle.link.label, "Direct");
        assert_eq!(subtitle.display_name, "Direct");
    }

    #[test]
    fn display_names() {
        let link = |href: &str, label: &str| SubtitleLink {
            href: url(href),
            label: label.to_string(),
        };
        assert_eq!(
            display_name(&link("https://wizdom.xyz/api/files/sub/123", "whatever")),
            "Hebrew Subtitle 123"
        );
        assert_eq!(
            display_name(&link("https://wizdom.xyz/a/Heat.srt", "Heat.1995")),
            "Heat.1995"
        );
        assert_eq!(display_name(&link("https://wizdom.xyz/a/Heat.srt", " ")), "Subtitle");
    }

    #[test]
    fn file_api_links_preferred_for_episodes() {
        let candidate = |href: &str| PostCandidate {
            href: url(href),
            anchor_text: String::new(),
        };
        let links = [
            candidate("https://wizdom.xyz/a/Show.S01E02.zip"),
            candidate("https://wizdom.xyz/api/files/sub/8"),
        ];
        assert_eq!(
            preferred_episode_link(&links).unwrap().href.as_str(),
            "https://wizdom.xyz/api/files/sub/8"
        );
        assert_eq!(
            preferred_episode_link(&links[..1]).unwrap().href.as_str(),
            "https://wizdom.xyz/a/Show.S01E02.zip"
        );
        assert!(preferred_episode_link(&[]).is_none());
    }
}
