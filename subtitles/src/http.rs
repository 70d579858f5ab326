use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use domain::format::file_name_from_url;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::{
    StatusCode,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static CONTENT_DISPOSITION_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*=UTF-8''([^;]+)|filename="?([^";]+)"?"#)
        .expect("Content disposition pattern should be valid")
});

/// Headers sent when fetching site pages, mirrors a Hebrew speaking browser
pub static HTML_HEADERS: LazyLock<HeaderMap> = LazyLock::new(|| {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("he-IL,he;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    Get,
    Head,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: FetchMethod,
    pub url: Url,
    pub headers: HeaderMap,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: FetchMethod::Get,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn head(url: Url) -> Self {
        Self {
            method: FetchMethod::Head,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers.extend(headers.clone());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Inclusive byte range
    pub fn with_range(self, first: u64, last: u64) -> Self {
        match HeaderValue::from_str(&format!("bytes={first}-{last}")) {
            Ok(value) => self.with_header(header::RANGE, value),
            Err(_) => self,
        }
    }
}

/// A response of any status, non-2xx is not an error at this layer
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final url after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Lower-cased, empty when absent
    pub fn content_type(&self) -> String {
        self.header(header::CONTENT_TYPE)
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn disposition_file_name(&self) -> Option<String> {
        self.header(header::CONTENT_DISPOSITION)
            .and_then(file_name_from_disposition)
    }

    /// Content-Disposition file name, falling back to the last url segment
    pub fn file_name(&self) -> Option<String> {
        self.disposition_file_name()
            .or_else(|| file_name_from_url(&self.url))
    }
}

pub fn file_name_from_disposition(disposition: &str) -> Option<String> {
    let captures = CONTENT_DISPOSITION_FILE_NAME.captures(disposition)?;
    let raw = captures.get(1).or_else(|| captures.get(2))?.as_str().trim();
    if raw.is_empty() {
        return None;
    }
    Some(percent_decode_str(raw).decode_utf8_lossy().into_owned())
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse, HttpError>;
}

#[derive(Debug)]
pub enum HttpError {
    Timeout(Box<str>),
    Transport(Box<str>),
    Client(Box<str>),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Timeout(message) => write!(f, "Request timed out: {message}"),
            HttpError::Transport(message) => write!(f, "Request failed: {message}"),
            HttpError::Client(message) => write!(f, "Failed to build http client: {message}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<reqwest::Error> for HttpError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            HttpError::Timeout(value.to_string().into())
        } else {
            HttpError::Transport(value.to_string().into())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    http_client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| HttpError::Client(err.to_string().into()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse, HttpError> {
        let method = match request.method {
            FetchMethod::Get => reqwest::Method::GET,
            FetchMethod::Head => reqwest::Method::HEAD,
        };

        let response = self
            .http_client
            .request(method, request.url)
            .headers(request.headers)
            .send()
            .await?;

        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
