use std::sync::LazyLock;

use domain::MediaType;
use url::Url;

static DEFAULT_BASE_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://wizdom.xyz/").expect("Default source base url should be valid")
});
static WEB_SEARCH_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://duckduckgo.com/html/").expect("Web search url should be valid")
});

/// Where the subtitle site lives and how its pages are addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleSource {
    base: Url,
    search_bases: Box<[Url]>,
    web_search: Url,
}

impl Default for SubtitleSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.clone(), Self::default_search_bases(&DEFAULT_BASE_URL))
    }
}

impl SubtitleSource {
    pub fn new(base: Url, search_bases: Vec<Url>) -> Self {
        let search_bases = if search_bases.is_empty() {
            Self::default_search_bases(&base)
        } else {
            search_bases
        };
        Self {
            base,
            search_bases: search_bases.into(),
            web_search: WEB_SEARCH_URL.clone(),
        }
    }

    pub fn with_web_search(mut self, web_search: Url) -> Self {
        self.web_search = web_search;
        self
    }

    /// The base itself, its `www.` variant, and the search endpoint of both
    pub fn default_search_bases(base: &Url) -> Vec<Url> {
        let mut variants = vec![base.clone()];
        if let Some(host) = base.host_str() {
            let other_host = match host.strip_prefix("www.") {
                Some(bare) => bare.to_string(),
                None => format!("www.{host}"),
            };
            let mut other = base.clone();
            if other.set_host(Some(&other_host)).is_ok() {
                variants.push(other);
            }
        }

        let search_pages = variants
            .iter()
            .filter_map(|variant| variant.join("search").ok())
            .collect::<Vec<_>>();
        variants.extend(search_pages);
        variants
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn search_bases(&self) -> &[Url] {
        &self.search_bases
    }

    /// Host without a leading `www.`
    pub fn domain(&self) -> &str {
        let host = self.base.host_str().unwrap_or_default();
        host.strip_prefix("www.").unwrap_or(host)
    }

    pub fn hosts(&self, url: &Url) -> bool {
        let domain = self.domain();
        match url.host_str() {
            Some(host) => host == domain || host.ends_with(&format!(".{domain}")),
            None => false,
        }
    }

    /// `{base}?s={query}` search listing
    pub fn search_url(&self, base: &Url, query: &str) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut().clear().append_pair("s", query);
        url
    }

    /// Detail pages addressed directly by IMDb id, the requested type first
    pub fn detail_page_urls(&self, imdb_id: &str, media_type: MediaType) -> Vec<Url> {
        let order = match media_type {
            MediaType::Movie => [MediaType::Movie, MediaType::Series],
            MediaType::Series => [MediaType::Series, MediaType::Movie],
        };
        order
            .iter()
            .filter_map(|media_type| self.detail_page_url(imdb_id, *media_type))
            .collect()
    }

    pub fn detail_page_url(&self, imdb_id: &str, media_type: MediaType) -> Option<Url> {
        self.base
            .join(&format!("/{}/{imdb_id}", media_type.as_str()))
            .ok()
    }

    pub fn api_search_url(&self, imdb_id: &str) -> Option<Url> {
        let mut url = self.base.join("/api/search").ok()?;
        url.query_pairs_mut().append_pair("q", imdb_id);
        Some(url)
    }

    /// Site-restricted query on the external web search
    pub fn web_search_url(&self, query: &str) -> Url {
        let mut url = self.web_search.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("q", &format!("site:{} {query}", self.domain()));
        url
    }
}

#[cfg(test)]
mod tests {
    use domain::MediaType;
    use url::Url;

    use super::SubtitleSource;

    #[test]
    fn default_search_bases() {
        let source = SubtitleSource::default();
        let bases = source
            .search_bases()
            .iter()
            .map(Url::as_str)
            .collect::<Vec<_>>();
        assert_eq!(
            bases,
            [
                "https://wizdom.xyz/",
                "https://www.wizdom.xyz/",
                "https://wizdom.xyz/search",
                "https://www.wizdom.xyz/search",
            ]
        );
    }

    #[test]
    fn hosts_subdomains() {
        let source = SubtitleSource::default();
        assert!(source.hosts(&Url::parse("https://www.wizdom.xyz/movie/tt1").unwrap()));
        assert!(source.hosts(&Url::parse("https://wizdom.xyz/").unwrap()));
        assert!(!source.hosts(&Url::parse("https://notwizdom.xyz/").unwrap()));
    }

    #[test]
    fn addresses() {
        let source = SubtitleSource::default();
        assert_eq!(
            source.search_url(source.base(), "The Office S01E02").as_str(),
            "https://wizdom.xyz/?s=The+Office+S01E02"
        );
        let detail = source.detail_page_urls("tt0386676", MediaType::Series);
        assert_eq!(detail[0].as_str(), "https://wizdom.xyz/series/tt0386676");
        assert_eq!(detail[1].as_str(), "https://wizdom.xyz/movie/tt0386676");
        assert_eq!(
            source.api_search_url("tt1").unwrap().as_str(),
            "https://wizdom.xyz/api/search?q=tt1"
        );
        assert_eq!(
            source.web_search_url("Heat 1995").as_str(),
            "https://duckduckgo.com/html/?q=site%3Awizdom.xyz+Heat+1995"
        );
    }
}
