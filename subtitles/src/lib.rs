pub mod archive;
pub mod cache;
pub mod caption;
pub mod encoding;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod metadata;
pub mod queries;
pub mod rank;
pub mod render;
mod resolver;
pub mod search;
pub mod source;
mod subtitle_provider;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod validate;

pub use archive::Wanted;
pub use fetch::FetchError;
pub use resolver::{Resolution, ResolvedSubtitle, ResolverConfig, SubtitleResolver};
pub use subtitle_provider::{CaptionSource, SubtitleProvider};

#[derive(Debug)]
pub enum Error {
    /// Neither an episode page nor a fallback file was given
    MissingSource,
    /// The episode page listed no subtitle file
    NoSubtitleLink,
    Fetch(FetchError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingSource => write!(f, "No subtitle source given"),
            Error::NoSubtitleLink => write!(f, "No subtitle link found for episode"),
            Error::Fetch(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<FetchError> for Error {
    fn from(value: FetchError) -> Self {
        Error::Fetch(value)
    }
}
