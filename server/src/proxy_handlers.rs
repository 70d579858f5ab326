use axum::{
    extract,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use domain::{CaptionAsset, format::file_api_id};
use log::{error, info, warn};
use serde::Deserialize;
use subtitles::{CaptionSource, Error, SubtitleProvider, Wanted, caption};
use url::Url;

use crate::State;

const CAPTION_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";

#[derive(Debug, Default, Deserialize)]
pub struct CaptionQuery {
    pub src: Option<String>,
    /// `SxxEyy`, picks the episode out of season packs
    pub se: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EpisodeCaptionQuery {
    /// Series detail page
    pub post: Option<String>,
    pub se: Option<String>,
    pub title: Option<String>,
    /// Served when the detail page yields nothing
    pub fallback: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_url(value: &Option<String>) -> Option<Url> {
    let raw = non_empty(value)?;
    Url::parse(raw)
        .inspect_err(|err| warn!("[Proxy] Ignoring invalid url {raw}: {err}"))
        .ok()
}

/// Inclusive byte range of a `bytes=start-[end]` header, None when it can't be served
fn byte_range(range: &str, total: usize) -> Option<(usize, usize)> {
    let spec = range.trim().strip_prefix("bytes=")?.split(',').next()?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse::<usize>().ok()?;
    let last = total.checked_sub(1)?;
    let end = match end.trim() {
        "" => last,
        end => end.parse::<usize>().ok()?.min(last),
    };
    (start < total && start <= end).then_some((start, end))
}

fn caption_response(asset: CaptionAsset, file_id: &str, range: Option<&str>) -> Response {
    let bytes = caption::ensure_header(&asset.bytes);
    let total = bytes.len();
    let headers = [
        (header::CONTENT_TYPE, CAPTION_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(r#"inline; filename="wizdom-{file_id}.vtt""#),
        ),
        (header::CACHE_CONTROL, "public, max-age=300".to_string()),
        (header::ACCEPT_RANGES, "bytes".to_string()),
    ];

    let Some(range) = range else {
        info!("[Proxy] Serving {total} bytes");
        return (headers, [(header::CONTENT_LENGTH, total.to_string())], bytes).into_response();
    };

    match byte_range(range, total) {
        Some((start, end)) => {
            let chunk = bytes[start..=end].to_vec();
            info!("[Proxy] Serving range {start}-{end} of {total} bytes");
            (
                StatusCode::PARTIAL_CONTENT,
                headers,
                [
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}")),
                    (header::CONTENT_LENGTH, chunk.len().to_string()),
                ],
                chunk,
            )
                .into_response()
        }
        None => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{total}"))],
        )
            .into_response(),
    }
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default())
}

fn fetch_failed(err: &Error) -> Response {
    error!("[Proxy] {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "failed to fetch/convert subtitles",
    )
        .into_response()
}

/// `GET|HEAD /proxy/vtt?src=..&se=..&title=..`
pub async fn serve_caption(
    extract::State(state): State,
    extract::Query(query): extract::Query<CaptionQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(src) = non_empty(&query.src) else {
        return (StatusCode::BAD_REQUEST, "missing src").into_response();
    };
    let Some(src) = Url::parse(src)
        .inspect_err(|err| warn!("[Proxy] Invalid src {src}: {err}"))
        .ok()
    else {
        return (StatusCode::BAD_REQUEST, "invalid src").into_response();
    };
    info!("[Proxy] Request for {src}");

    let wanted = Wanted::new(non_empty(&query.se), non_empty(&query.title));
    let file_id = file_api_id(&src).unwrap_or("subtitle").to_string();
    let source = CaptionSource::Direct { src, wanted };

    match state.provider.download(&source).await {
        Ok(asset) => caption_response(asset, &file_id, range_header(&headers)),
        Err(err) => fetch_failed(&err),
    }
}

/// `GET|HEAD /proxy/vtt-episode?post=..&se=..&title=..&fallback=..`
pub async fn serve_episode_caption(
    extract::State(state): State,
    extract::Query(query): extract::Query<EpisodeCaptionQuery>,
    headers: HeaderMap,
) -> Response {
    let post = parse_url(&query.post);
    let fallback = parse_url(&query.fallback);
    if post.is_none() && fallback.is_none() {
        return (StatusCode::BAD_REQUEST, "missing post/fallback").into_response();
    }
    info!(
        "[Proxy] Episode {} on {:?}",
        non_empty(&query.se).unwrap_or("-"),
        post.as_ref().map(Url::as_str)
    );

    let file_id = fallback
        .as_ref()
        .and_then(file_api_id)
        .unwrap_or("subtitle")
        .to_string();
    let source = CaptionSource::EpisodePage {
        post,
        fallback,
        wanted: Wanted::new(non_empty(&query.se), non_empty(&query.title)),
    };

    match state.provider.download(&source).await {
        Ok(asset) => caption_response(asset, &file_id, range_header(&headers)),
        Err(Error::MissingSource) => {
            (StatusCode::BAD_REQUEST, "missing post/fallback").into_response()
        }
        Err(Error::NoSubtitleLink) => {
            warn!("[Proxy] No subtitle link for the episode");
            (StatusCode::NOT_FOUND, "no subtitle found for episode").into_response()
        }
        Err(err) => fetch_failed(&err),
    }
}
