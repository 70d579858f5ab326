pub mod manifest;
pub mod proxy_handlers;
pub mod subtitle_handlers;

use std::{any::Any as PanicPayload, collections::HashMap, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use log::error;
use serde_json::json;
use subtitles::{ResolverConfig, SubtitleResolver, source::SubtitleSource};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
};
use url::Url;

/// Parses a `tt0903747=Breaking Bad` title override
fn parse_title_override(raw: &str) -> Result<(String, String), String> {
    let (imdb_id, title) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected IMDB_ID=TITLE, got `{raw}`"))?;
    let (imdb_id, title) = (imdb_id.trim(), title.trim());
    if imdb_id.is_empty() || title.is_empty() {
        return Err(format!("expected IMDB_ID=TITLE, got `{raw}`"));
    }
    Ok((imdb_id.to_string(), title.to_string()))
}

#[derive(Parser, Clone, Debug)]
#[command(about = "Hebrew subtitles from Wizdom for Stremio-compatible clients")]
pub struct Args {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = 7010)]
    pub port: u16,

    /// Origin written into proxy urls, defaults to http://127.0.0.1:{port}
    #[arg(long, env = "PUBLIC_ORIGIN")]
    pub public_origin: Option<String>,

    #[arg(long, env = "SOURCE_BASE", default_value = "https://wizdom.xyz/")]
    pub source_base: Url,

    /// Site search endpoints, derived from the source base when empty
    #[arg(long = "search-base", env = "SEARCH_BASES", value_delimiter = ',')]
    pub search_bases: Vec<Url>,

    /// Headless rendering service. Without it dynamic pages are read as static html.
    #[arg(long, env = "RENDER_ENDPOINT")]
    pub render_endpoint: Option<Url>,

    #[arg(long, env = "METADATA_BASE", default_value = "https://v3-cinemeta.strem.io/")]
    pub metadata_base: Url,

    /// List source urls instead of proxy urls
    #[arg(long, env = "DIRECT_LINKS")]
    pub direct_links: bool,

    /// IMDB_ID=TITLE, searched instead of the metadata title
    #[arg(long = "title-override", value_parser = parse_title_override)]
    pub title_overrides: Vec<(String, String)>,

    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 200)]
    pub cache_capacity: u64,

    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 1800)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 20)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "RENDER_TIMEOUT_SECS", default_value_t = 15)]
    pub render_timeout_secs: u64,

    /// Ranked posts tried per request
    #[arg(long, env = "MAX_CANDIDATES", default_value_t = 3)]
    pub max_candidates: usize,
}

impl Args {
    pub fn public_origin(&self) -> String {
        match &self.public_origin {
            Some(origin) => origin.trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            source: SubtitleSource::new(self.source_base.clone(), self.search_bases.clone()),
            cache_capacity: self.cache_capacity,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            render_timeout: self.render_timeout(),
            max_candidates: self.max_candidates,
            title_overrides: self.title_overrides.iter().cloned().collect::<HashMap<_, _>>(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<SubtitleResolver>,
    /// No trailing slash
    pub public_origin: Arc<str>,
    pub direct_links: bool,
}

pub type State = axum::extract::State<AppState>;

fn subtitle_panic(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let reason = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    error!("Resolving subtitles panicked: {reason}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Failed to fetch subtitles" })),
    )
        .into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    let subtitle_routes = Router::new()
        .route(
            "/subtitles/{media_type}/{id}",
            get(subtitle_handlers::list_subtitles),
        )
        .route(
            "/subtitles/{media_type}/{id}/{*extra}",
            get(subtitle_handlers::list_subtitles_with_extra),
        )
        .layer(CatchPanicLayer::custom(subtitle_panic));

    Router::new()
        .route("/health", get(manifest::health))
        .route("/manifest.json", get(manifest::manifest))
        .merge(subtitle_routes)
        .route("/proxy/vtt", get(proxy_handlers::serve_caption))
        .route("/proxy/vtt.vtt", get(proxy_handlers::serve_caption))
        .route(
            "/proxy/vtt-episode",
            get(proxy_handlers::serve_episode_caption),
        )
        .layer(cors)
        .with_state(state)
}
