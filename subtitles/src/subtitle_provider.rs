use domain::{CaptionAsset, MediaRequest};
use url::Url;

use crate::{archive::Wanted, resolver::Resolution};

/// Where a caption should be served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionSource {
    /// A subtitle file url
    Direct { src: Url, wanted: Wanted },
    /// A series detail page on which the wanted episode is picked before download.
    /// `fallback` is served when the page yields nothing.
    EpisodePage {
        post: Option<Url>,
        fallback: Option<Url>,
        wanted: Wanted,
    },
}

pub trait SubtitleProvider {
    type Error: std::error::Error;

    fn search(
        &self,
        request: &MediaRequest,
    ) -> impl Future<Output = Result<Resolution, Self::Error>> + Send;

    fn download(
        &self,
        source: &CaptionSource,
    ) -> impl Future<Output = Result<CaptionAsset, Self::Error>> + Send;
}
