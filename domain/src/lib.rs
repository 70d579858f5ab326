pub mod format;
pub mod series;
pub mod subtitles;

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::series::EpisodeIdentifier;

/// ISO 639-1 code of every subtitle the source serves
pub const SUBTITLE_LANGUAGE: &str = "he";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ParseMediaRequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "movie" => Ok(MediaType::Movie),
            "series" => Ok(MediaType::Series),
            other => Err(ParseMediaRequestError::UnknownMediaType(other.into())),
        }
    }
}

/// What a client asked subtitles for. An episode is only ever present on
/// series requests.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaRequest {
    media_type: MediaType,
    imdb_id: Box<str>,
    episode: Option<EpisodeIdentifier>,
}

impl MediaRequest {
    pub fn movie(imdb_id: impl Into<Box<str>>) -> Self {
        Self {
            media_type: MediaType::Movie,
            imdb_id: imdb_id.into(),
            episode: None,
        }
    }

    pub fn series(imdb_id: impl Into<Box<str>>, episode: Option<EpisodeIdentifier>) -> Self {
        Self {
            media_type: MediaType::Series,
            imdb_id: imdb_id.into(),
            episode,
        }
    }

    /// Parses the `{type}/{id}` pair of a subtitle route. Series ids look like
    /// `tt0903747:1:2`, a trailing `.json` is ignored.
    pub fn from_route(media_type: &str, id: &str) -> Result<Self, ParseMediaRequestError> {
        let media_type = media_type.parse::<MediaType>()?;
        let id = id.trim();
        let id = id.strip_suffix(".json").unwrap_or(id);

        match media_type {
            MediaType::Movie => {
                let imdb_id = id.split(':').next().unwrap_or_default();
                if imdb_id.is_empty() {
                    return Err(ParseMediaRequestError::MissingId);
                }
                Ok(Self::movie(imdb_id))
            }
            MediaType::Series => {
                let mut parts = id.split(':');
                let imdb_id = parts.next().unwrap_or_default();
                if imdb_id.is_empty() {
                    return Err(ParseMediaRequestError::MissingId);
                }
                let episode = match (parts.next(), parts.next()) {
                    (Some(season), Some(episode)) => {
                        match (season.parse::<u32>(), episode.parse::<u32>()) {
                            (Ok(season_no), Ok(episode_no)) => Some(EpisodeIdentifier {
                                season_no,
                                episode_no,
                            }),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                Ok(Self::series(imdb_id, episode))
            }
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn imdb_id(&self) -> &str {
        &self.imdb_id
    }

    pub fn episode(&self) -> Option<&EpisodeIdentifier> {
        self.episode.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMediaRequestError {
    UnknownMediaType(Box<str>),
    MissingId,
}

impl Display for ParseMediaRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMediaRequestError::UnknownMediaType(media_type) => {
                write!(f, "Unknown media type: {media_type}")
            }
            ParseMediaRequestError::MissingId => write!(f, "Missing media id"),
        }
    }
}

impl std::error::Error for ParseMediaRequestError {}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleInfo {
    pub title: String,
    pub year: Option<u32>,
}

impl TitleInfo {
    /// Used when no metadata could be found, searches then run on the raw id
    pub fn unknown(imdb_id: &str) -> Self {
        Self {
            title: imdb_id.to_string(),
            year: None,
        }
    }
}

/// A page or file link returned by a search
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostCandidate {
    pub href: Url,
    pub anchor_text: String,
}

/// A download link found on a post
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtitleLink {
    pub href: Url,
    pub label: String,
}

/// A normalized caption track, always UTF-8 and starting with `WEBVTT\n\n`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptionAsset {
    pub bytes: Vec<u8>,
}

impl CaptionAsset {
    pub const MIME_TYPE: &'static str = "text/vtt";

    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn mime_type(&self) -> &'static str {
        Self::MIME_TYPE
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
