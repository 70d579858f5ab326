use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use domain::{MediaType, TitleInfo};
use log::{info, warn};
use serde::Deserialize;
use url::Url;

use crate::http::{FetchRequest, HttpFetcher, HttpError};

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn title_info(
        &self,
        media_type: MediaType,
        imdb_id: &str,
    ) -> Result<TitleInfo, MetadataError>;
}

#[derive(Debug)]
pub enum MetadataError {
    Request(HttpError),
    Status(u16),
    Parse(Box<str>),
    NotFound,
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Request(err) => write!(f, "Metadata request failed: {err}"),
            MetadataError::Status(status) => write!(f, "Metadata service answered {status}"),
            MetadataError::Parse(message) => write!(f, "Invalid metadata: {message}"),
            MetadataError::NotFound => write!(f, "No metadata for title"),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<HttpError> for MetadataError {
    fn from(value: HttpError) -> Self {
        MetadataError::Request(value)
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(value: serde_json::Error) -> Self {
        MetadataError::Parse(value.to_string().into())
    }
}

#[derive(Debug, Deserialize)]
struct CinemetaResponse {
    meta: Option<CinemetaMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CinemetaMeta {
    name: Option<String>,
    year: Option<serde_json::Value>,
    release_info: Option<String>,
}

/// First four digit run, `"2008–2013"` reads as 2008
fn parse_year(raw: &str) -> Option<u32> {
    let start = raw.find(|char: char| char.is_ascii_digit())?;
    let digits = raw[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    if digits.len() < 4 {
        return None;
    }
    digits[..4].parse().ok()
}

impl CinemetaMeta {
    fn year(&self) -> Option<u32> {
        let from_year = match &self.year {
            Some(serde_json::Value::Number(number)) => {
                number.as_u64().and_then(|year| u32::try_from(year).ok())
            }
            Some(serde_json::Value::String(year)) => parse_year(year),
            _ => None,
        };
        from_year.or_else(|| self.release_info.as_deref().and_then(parse_year))
    }
}

/// Title lookup against a Cinemeta compatible catalogue
#[derive(Clone)]
pub struct CinemetaClient {
    fetcher: Arc<dyn HttpFetcher>,
    base: Url,
}

impl CinemetaClient {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, base: Url) -> Self {
        Self { fetcher, base }
    }

    fn meta_url(&self, media_type: MediaType, imdb_id: &str) -> Result<Url, MetadataError> {
        self.base
            .join(&format!("meta/{}/{imdb_id}.json", media_type.as_str()))
            .map_err(|err| MetadataError::Parse(err.to_string().into()))
    }
}

#[async_trait]
impl MetadataProvider for CinemetaClient {
    async fn title_info(
        &self,
        media_type: MediaType,
        imdb_id: &str,
    ) -> Result<TitleInfo, MetadataError> {
        let url = self.meta_url(media_type, imdb_id)?;
        let response = self.fetcher.send(FetchRequest::get(url)).await?;
        if !response.is_success() {
            return Err(MetadataError::Status(response.status.as_u16()));
        }

        let meta = serde_json::from_slice::<CinemetaResponse>(&response.body)?
            .meta
            .ok_or(MetadataError::NotFound)?;
        let title = meta
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(MetadataError::NotFound)?
            .to_string();

        Ok(TitleInfo {
            year: meta.year(),
            title,
        })
    }
}

/// Operator supplied titles win over the metadata service, which in turn
/// degrades to the bare IMDb id
#[derive(Clone)]
pub struct TitleResolver {
    provider: Arc<dyn MetadataProvider>,
    overrides: HashMap<String, String>,
}

impl TitleResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>, overrides: HashMap<String, String>) -> Self {
        Self {
            provider,
            overrides,
        }
    }

    pub async fn lookup(&self, media_type: MediaType, imdb_id: &str) -> TitleInfo {
        if let Some(title) = self.overrides.get(imdb_id) {
            info!("[Meta] Using title override for {imdb_id}: {title}");
            return TitleInfo {
                title: title.clone(),
                year: None,
            };
        }

        match self.provider.title_info(media_type, imdb_id).await {
            Ok(info) => {
                info!("[Meta] {imdb_id} is {} ({:?})", info.title, info.year);
                info
            }
            Err(err) => {
                warn!("[Meta] Lookup for {imdb_id} failed: {err}");
                TitleInfo::unknown(imdb_id)
            }
        }
    }
}
