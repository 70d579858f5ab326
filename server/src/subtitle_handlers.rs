use axum::{
    Json, extract,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{
    CaptionAsset, MediaRequest, SUBTITLE_LANGUAGE,
    subtitles::{Subtitle, SubtitlesResponse},
};
use log::{error, info, warn};
use serde_json::json;
use subtitles::{Resolution, ResolvedSubtitle, SubtitleProvider};
use url::form_urlencoded;

use crate::State;

/// Where a client should fetch one resolved subtitle from
fn subtitle_url(
    public_origin: &str,
    direct_links: bool,
    resolution: &Resolution,
    subtitle: &ResolvedSubtitle,
) -> String {
    if direct_links {
        return subtitle.link.href.to_string();
    }

    let tag = resolution.episode.map(|episode| episode.tag());
    let mut query = form_urlencoded::Serializer::new(String::new());
    match &subtitle.episode_page {
        Some(post) => {
            query.append_pair("post", post.as_str());
            if let Some(tag) = &tag {
                query.append_pair("se", tag);
            }
            query
                .append_pair("title", &resolution.title.title)
                .append_pair("fallback", subtitle.link.href.as_str());
            format!("{public_origin}/proxy/vtt-episode?{}", query.finish())
        }
        None => {
            query.append_pair("src", subtitle.link.href.as_str());
            if let Some(tag) = &tag {
                query.append_pair("se", tag);
            }
            query.append_pair("title", &resolution.title.title);
            format!("{public_origin}/proxy/vtt?{}", query.finish())
        }
    }
}

fn subtitle_entries(
    public_origin: &str,
    direct_links: bool,
    resolution: &Resolution,
) -> Box<[Subtitle]> {
    resolution
        .subtitles
        .iter()
        .enumerate()
        .map(|(index, subtitle)| Subtitle {
            id: format!("wizdom-{index}"),
            lang: SUBTITLE_LANGUAGE.to_string(),
            name: format!("Wizdom • {}", subtitle.display_name),
            url: subtitle_url(public_origin, direct_links, resolution, subtitle),
            mime_type: CaptionAsset::MIME_TYPE.to_string(),
        })
        .collect()
}

pub async fn list_subtitles(
    state: State,
    extract::Path((media_type, id)): extract::Path<(String, String)>,
) -> Response {
    respond(state, &media_type, &id).await
}

/// Clients append an extra segment such as `filename=...json`, it carries nothing we use
pub async fn list_subtitles_with_extra(
    state: State,
    extract::Path((media_type, id, _extra)): extract::Path<(String, String, String)>,
) -> Response {
    respond(state, &media_type, &id).await
}

async fn respond(extract::State(state): State, media_type: &str, id: &str) -> Response {
    // 1. Unknown routes are an empty list, not an error
    let Some(request) = MediaRequest::from_route(media_type, id)
        .inspect_err(|err| warn!("Ignoring subtitle request {media_type}/{id}: {err}"))
        .ok()
    else {
        return Json(SubtitlesResponse::default()).into_response();
    };

    // 2. Resolve
    let resolution = match state.provider.search(&request).await {
        Ok(resolution) => resolution,
        Err(err) => {
            error!("Resolving subtitles for {} failed: {err}", request.imdb_id());
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch subtitles" })),
            )
                .into_response();
        }
    };

    // 3. Point every entry at the proxy (or the source)
    let subtitles = subtitle_entries(&state.public_origin, state.direct_links, &resolution);
    info!(
        "Returning {} subtitles for {}",
        subtitles.len(),
        request.imdb_id()
    );
    Json(SubtitlesResponse { subtitles }).into_response()
}

#[cfg(test)]
mod tests {
    use domain::{SubtitleLink, TitleInfo, series::EpisodeIdentifier};
    use subtitles::{Resolution, ResolvedSubtitle};
    use url::Url;

    use super::subtitle_entries;

    fn resolution(episode_page: Option<&str>) -> Resolution {
        Resolution {
            title: TitleInfo {
                title: "Breaking Bad".to_string(),
                year: Some(2008),
            },
            episode: Some(EpisodeIdentifier {
                season_no: 1,
                episode_no: 2,
            }),
            subtitles: vec![ResolvedSubtitle {
                link: SubtitleLink {
                    href: Url::parse("https://wizdom.xyz/api/files/sub/5").unwrap(),
                    label: "Breaking Bad Season 1".to_string(),
                },
                display_name: "Hebrew Subtitle 5".to_string(),
                episode_page: episode_page.map(|page| Url::parse(page).unwrap()),
            }],
        }
    }

    #[test]
    fn proxy_urls() {
        let entries = subtitle_entries("http://127.0.0.1:7010", false, &resolution(None));
        assert_eq!(entries[0].id, "wizdom-0");
        assert_eq!(entries[0].lang, "he");
        assert_eq!(entries[0].name, "Wizdom • Hebrew Subtitle 5");
        assert_eq!(entries[0].mime_type, "text/vtt");
        assert_eq!(
            entries[0].url,
            "http://127.0.0.1:7010/proxy/vtt?src=https%3A%2F%2Fwizdom.xyz%2Fapi%2Ffiles%2Fsub%2F5&se=S01E02&title=Breaking+Bad"
        );
    }

    #[test]
    fn episode_page_urls() {
        let entries = subtitle_entries(
            "http://127.0.0.1:7010",
            false,
            &resolution(Some("https://wizdom.xyz/series/tt0903747")),
        );
        assert_eq!(
            entries[0].url,
            "http://127.0.0.1:7010/proxy/vtt-episode?post=https%3A%2F%2Fwizdom.xyz%2Fseries%2Ftt0903747&se=S01E02&title=Breaking+Bad&fallback=https%3A%2F%2Fwizdom.xyz%2Fapi%2Ffiles%2Fsub%2F5"
        );
    }

    #[test]
    fn direct_urls() {
        let entries = subtitle_entries(
            "http://127.0.0.1:7010",
            true,
            &resolution(Some("https://wizdom.xyz/series/tt0903747")),
        );
        assert_eq!(entries[0].url, "https://wizdom.xyz/api/files/sub/5");
    }
}
