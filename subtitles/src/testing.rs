//! In-memory stand-ins for the network facing seams

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use domain::{MediaType, TitleInfo};
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use url::Url;

use crate::{
    http::{FetchMethod, FetchRequest, FetchResponse, HttpError, HttpFetcher},
    metadata::{MetadataError, MetadataProvider},
    render::{PageRenderer, RenderError, RenderedAnchor, RenderedPage, SelectorIntent},
};

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

/// Answers from a fixed table keyed by method and url, everything else is a 404
#[derive(Debug, Default)]
pub struct StaticFetcher {
    replies: HashMap<(FetchMethod, String), Reply>,
    failing: Vec<String>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        mut self,
        method: FetchMethod,
        url: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.replies.insert(
            (method, url.to_string()),
            Reply {
                status,
                headers: headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                body: body.into(),
            },
        );
        self
    }

    /// 200 GET with a body
    pub fn page(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.respond(FetchMethod::Get, url, 200, &[], body)
    }

    /// Transport failure for every method
    pub fn fail(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self, method: FetchMethod, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.url.as_str() == url)
            .count()
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse, HttpError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let url = request.url.as_str().to_string();
        if self.failing.contains(&url) {
            return Err(HttpError::Transport(format!("connection refused: {url}").into()));
        }

        let Reply {
            status,
            headers,
            body,
        } = self
            .replies
            .get(&(request.method, url))
            .cloned()
            .unwrap_or(Reply {
                status: 404,
                headers: Vec::new(),
                body: Vec::new(),
            });

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                header_map.insert(name, value);
            }
        }
        Ok(FetchResponse {
            url: request.url,
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
            headers: header_map,
            body: match request.method {
                FetchMethod::Head => Vec::new(),
                FetchMethod::Get => body,
            },
        })
    }
}

/// Serves pre-built rendered pages, unknown urls fail
#[derive(Debug, Default)]
pub struct ScriptedRenderer {
    pages: HashMap<String, RenderedPage>,
    interactions: HashMap<(String, SelectorIntent), RenderedPage>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: RenderedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn interaction(mut self, url: &str, intent: SelectorIntent, page: RenderedPage) -> Self {
        self.interactions.insert((url.to_string(), intent), page);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Page holding only the given `(href, text)` anchors
pub fn anchors_page(anchors: &[(&str, &str)]) -> RenderedPage {
    RenderedPage {
        anchors: anchors
            .iter()
            .map(|(href, text)| RenderedAnchor {
                href: href.to_string(),
                text: text.to_string(),
            })
            .collect(),
        responses: Vec::new(),
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| RenderError::Request(format!("no scripted page for {url}").into()))
    }

    async fn render_and_interact(
        &self,
        url: &Url,
        intent: SelectorIntent,
    ) -> Result<RenderedPage, RenderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        self.interactions
            .get(&(url.to_string(), intent))
            .cloned()
            .ok_or_else(|| RenderError::Request(format!("no scripted interaction for {url}").into()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedMetadata {
    info: Option<TitleInfo>,
}

impl FixedMetadata {
    pub fn new(title: &str, year: Option<u32>) -> Self {
        Self {
            info: Some(TitleInfo {
                title: title.to_string(),
                year,
            }),
        }
    }

    pub fn failing() -> Self {
        Self { info: None }
    }
}

#[async_trait]
impl MetadataProvider for FixedMetadata {
    async fn title_info(
        &self,
        _media_type: MediaType,
        _imdb_id: &str,
    ) -> Result<TitleInfo, MetadataError> {
        self.info.clone().ok_or(MetadataError::NotFound)
    }
}
