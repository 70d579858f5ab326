use std::sync::Arc;

use domain::{CaptionAsset, format::FILE_API_PATH};
use log::info;
use url::Url;

use crate::{
    archive::{self, ArchiveError, Wanted},
    cache::ResolutionCache,
    caption,
    encoding,
    http::{FetchRequest, HttpError, HttpFetcher},
};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug)]
pub enum FetchError {
    Upstream(Box<str>),
    UnsupportedFormat,
    NoSubtitleEntry,
    Archive(Box<str>),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Upstream(message) => write!(f, "Subtitle download failed: {message}"),
            FetchError::UnsupportedFormat => write!(f, "Unsupported subtitle format"),
            FetchError::NoSubtitleEntry => write!(f, "No subtitle file in archive"),
            FetchError::Archive(message) => write!(f, "Unreadable archive: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<HttpError> for FetchError {
    fn from(value: HttpError) -> Self {
        FetchError::Upstream(value.to_string().into())
    }
}

impl From<ArchiveError> for FetchError {
    fn from(value: ArchiveError) -> Self {
        match value {
            ArchiveError::NoSubtitleEntry => FetchError::NoSubtitleEntry,
            ArchiveError::Corrupt(message) => FetchError::Archive(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Archive,
    LineTimed,
    CueTrack,
    Unknown,
}

fn detect_container(url: &Url, content_type: &str, file_name: &str, raw: &[u8]) -> Container {
    let file_name = file_name.to_lowercase();
    let path = url.path().to_lowercase();

    if content_type.contains("zip")
        || file_name.ends_with(".zip")
        || path.ends_with(".zip")
        || raw.starts_with(ZIP_MAGIC)
    {
        return Container::Archive;
    }

    let is_text_subtitle = ["text/plain", "text/srt", "text/vtt"]
        .iter()
        .any(|text_type| content_type.contains(text_type));
    if file_name.ends_with(".srt")
        || path.ends_with(".srt")
        || is_text_subtitle
        || path.contains(FILE_API_PATH)
    {
        return Container::LineTimed;
    }

    if content_type.contains("vtt") || file_name.ends_with(".vtt") {
        return Container::CueTrack;
    }

    Container::Unknown
}

/// Turns whatever the upstream served (zip, SRT, VTT, any encoding) into a
/// UTF-8 caption track starting with `WEBVTT\n\n`
pub fn normalize_payload(
    url: &Url,
    content_type: &str,
    file_name: &str,
    raw: &[u8],
    wanted: &Wanted,
) -> Result<CaptionAsset, FetchError> {
    let track = match detect_container(url, content_type, file_name, raw) {
        Container::Archive => {
            let entry = archive::pick_entry(raw, wanted)?;
            info!("[Fetch] Using {} from archive", entry.name);
            caption::to_caption_track(&encoding::to_utf8(&entry.bytes))
        }
        Container::LineTimed => caption::to_caption_track(&encoding::to_utf8(raw)),
        Container::CueTrack => encoding::to_utf8(raw).into_owned(),
        Container::Unknown => {
            let text = encoding::to_utf8(raw);
            if !String::from_utf8_lossy(&text).contains("-->") {
                return Err(FetchError::UnsupportedFormat);
            }
            caption::to_caption_track(&text)
        }
    };

    Ok(CaptionAsset::new(caption::ensure_header(&track)))
}

/// Downloads and normalizes subtitle payloads, memoized per url and wanted track
pub struct ContentFetcher {
    fetcher: Arc<dyn HttpFetcher>,
    cache: ResolutionCache,
}

impl ContentFetcher {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, cache: ResolutionCache) -> Self {
        Self { fetcher, cache }
    }

    pub async fn fetch(&self, url: &Url, wanted: &Wanted) -> Result<CaptionAsset, FetchError> {
        self.cache
            .caption(url, wanted, || self.fetch_uncached(url, wanted))
            .await
    }

    async fn fetch_uncached(&self, url: &Url, wanted: &Wanted) -> Result<CaptionAsset, FetchError> {
        info!("[Fetch] GET {url}");
        let response = self.fetcher.send(FetchRequest::get(url.clone())).await?;
        if !response.is_success() {
            return Err(FetchError::Upstream(
                format!("{url} answered {}", response.status).into(),
            ));
        }

        let file_name = response.file_name().unwrap_or_default();
        normalize_payload(
            &response.url,
            &response.content_type(),
            &file_name,
            &response.body,
            wanted,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use encoding_rs::WINDOWS_1255;
    use url::Url;

    use super::{ContentFetcher, FetchError, normalize_payload};
    use crate::{
        archive::{Wanted, tests::zip_of},
        cache::ResolutionCache,
        http::FetchMethod,
        testing::StaticFetcher,
    };

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nשלום, מה שלומך היום? אני בסדר גמור, תודה רבה לך.\n\n\
        2\n00:00:03,000 --> 00:00:05,000\nבוא נלך הביתה לפני שיתחיל לרדת גשם.\n";
    const VTT: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nשלום, מה שלומך היום? אני בסדר גמור, תודה רבה לך.\n\n\
        00:00:03.000 --> 00:00:05.000\nבוא נלך הביתה לפני שיתחיל לרדת גשם.\n";

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn srt_in_windows_1255() {
        let (raw, _, _) = WINDOWS_1255.encode(SRT);
        let asset = normalize_payload(
            &url("https://wizdom.xyz/files/Heat.srt"),
            "application/octet-stream",
            "Heat.srt",
            &raw,
            &Wanted::default(),
        )
        .unwrap();
        assert_eq!(String::from_utf8(asset.bytes).unwrap(), VTT);
    }

    #[test]
    fn vtt_passes_through() {
        let asset = normalize_payload(
            &url("https://cdn.example.com/track"),
            "text/webvtt",
            "",
            VTT.as_bytes(),
            &Wanted::default(),
        )
        .unwrap();
        assert_eq!(asset.bytes, VTT.as_bytes());
    }

    #[test]
    fn sniffs_unknown_payloads() {
        let asset = normalize_payload(
            &url("https://cdn.example.com/download"),
            "application/octet-stream",
            "",
            SRT.as_bytes(),
            &Wanted::default(),
        )
        .unwrap();
        assert!(asset.bytes.starts_with(b"WEBVTT\n\n"));

        let unsupported = normalize_payload(
            &url("https://cdn.example.com/download"),
            "text/html",
            "",
            b"<html>not a subtitle</html>",
            &Wanted::default(),
        );
        assert!(matches!(unsupported, Err(FetchError::UnsupportedFormat)));
    }

    #[test]
    fn archive_by_magic_bytes() {
        let archive = zip_of(&[
            ("Show.S01E01.srt", "1\n00:00:01,000 --> 00:00:02,000\none\n"),
            ("Show.S01E02.srt", "1\n00:00:01,000 --> 00:00:02,000\ntwo\n"),
        ]);
        let asset = normalize_payload(
            &url("https://wizdom.xyz/api/files/sub/5"),
            "application/octet-stream",
            "5",
            &archive,
            &Wanted::new(Some("S01E02"), Some("Show")),
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(asset.bytes).unwrap(),
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\ntwo\n"
        );
    }

    #[tokio::test]
    async fn fetches_once_per_wanted_track() {
        let source = "https://wizdom.xyz/api/files/sub/5";
        let archive = zip_of(&[
            ("Show.S01E01.srt", "1\n00:00:01,000 --> 00:00:02,000\none\n"),
            ("Show.S01E02.srt", "1\n00:00:01,000 --> 00:00:02,000\ntwo\n"),
        ]);
        let fetcher = Arc::new(StaticFetcher::new().respond(
            FetchMethod::Get,
            source,
            200,
            &[
                ("content-type", "application/zip"),
                ("content-disposition", r#"attachment; filename="5.zip""#),
            ],
            archive,
        ));
        let content = ContentFetcher::new(fetcher.clone(), ResolutionCache::default());

        let wanted = Wanted::new(Some("S01E01"), Some("Show"));
        let first = content.fetch(&url(source), &wanted).await.unwrap();
        let again = content.fetch(&url(source), &wanted).await.unwrap();
        assert_eq!(first, again);
        assert!(String::from_utf8_lossy(&first.bytes).contains("one"));
        assert_eq!(fetcher.request_count(FetchMethod::Get, source), 1);
    }

    #[tokio::test]
    async fn upstream_errors() {
        let fetcher = Arc::new(StaticFetcher::new());
        let content = ContentFetcher::new(fetcher, ResolutionCache::default());
        let result = content
            .fetch(&url("https://wizdom.xyz/api/files/sub/404"), &Wanted::default())
            .await;
        assert!(matches!(result, Err(FetchError::Upstream(_))));
    }
}
