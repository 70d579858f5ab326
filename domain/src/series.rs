use std::fmt::Display;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
pub struct EpisodeIdentifier {
    pub season_no: u32,
    pub episode_no: u32,
}

impl EpisodeIdentifier {
    /// Zero padded `SxxEyy` tag used to match release and archive entry names
    pub fn tag(&self) -> String {
        format!("S{:02}E{:02}", self.season_no, self.episode_no)
    }

    /// Reads a tag back, accepting any casing and unpadded numbers (`s1e2`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        let (season, episode) = tag
            .trim()
            .strip_prefix(['S', 's'])?
            .split_once(['E', 'e'])?;

        let is_number = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !is_number(season) || !is_number(episode) {
            return None;
        }

        Some(EpisodeIdentifier {
            season_no: season.parse().ok()?,
            episode_no: episode.parse().ok()?,
        })
    }
}

impl Display for EpisodeIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}
