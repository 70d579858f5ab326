//! Headless page rendering. The site builds its search results and download
//! buttons client-side, so plain HTTP fetches only see a shell for most pages.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedAnchor {
    pub href: String,
    #[serde(default)]
    pub text: String,
}

/// A response the page's own scripts received while it was loading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedResponse {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// Anchors and elements carrying `data-url`/`data-href`, in document order
    #[serde(default)]
    pub anchors: Vec<RenderedAnchor>,
    #[serde(default)]
    pub responses: Vec<ObservedResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SelectorIntent {
    /// Clicks the episode list entry (or its `data-episode` attribute) with the given number
    ClickEpisode { episode: u32 },
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError>;

    async fn render_and_interact(
        &self,
        url: &Url,
        intent: SelectorIntent,
    ) -> Result<RenderedPage, RenderError>;
}

#[derive(Debug)]
pub enum RenderError {
    /// No renderer is configured, callers skip rendered strategies
    Unavailable,
    Request(Box<str>),
    InvalidResponse(Box<str>),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Unavailable => write!(f, "Page renderer is not available"),
            RenderError::Request(message) => write!(f, "Render request failed: {message}"),
            RenderError::InvalidResponse(message) => {
                write!(f, "Renderer returned an invalid page: {message}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

impl From<reqwest::Error> for RenderError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            RenderError::InvalidResponse(value.to_string().into())
        } else {
            RenderError::Request(value.to_string().into())
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl PageRenderer for DisabledRenderer {
    async fn render(&self, _url: &Url) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Unavailable)
    }

    async fn render_and_interact(
        &self,
        _url: &Url,
        _intent: SelectorIntent,
    ) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Unavailable)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderJob<'a> {
    url: &'a str,
    wait_until: &'static str,
    timeout_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    interact: Option<SelectorIntent>,
}

/// Hands pages to an external headless-browser service that answers with
/// the rendered anchors and the responses observed while loading
#[derive(Debug, Clone)]
pub struct RemoteRenderer {
    http_client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl RemoteRenderer {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }

    async fn run(
        &self,
        url: &Url,
        interact: Option<SelectorIntent>,
    ) -> Result<RenderedPage, RenderError> {
        let job = RenderJob {
            url: url.as_str(),
            wait_until: "networkidle2",
            timeout_ms: self.timeout.as_millis(),
            interact,
        };
        debug!("Rendering {url} with {:?}", job.interact);

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&job)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RenderError::Request(
                format!("renderer answered {}", response.status()).into(),
            ));
        }

        Ok(response.json::<RenderedPage>().await?)
    }
}

#[async_trait]
impl PageRenderer for RemoteRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        self.run(url, None).await
    }

    async fn render_and_interact(
        &self,
        url: &Url,
        intent: SelectorIntent,
    ) -> Result<RenderedPage, RenderError> {
        self.run(url, Some(intent)).await
    }
}
