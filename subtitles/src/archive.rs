use std::io::{Cursor, Read};

use domain::format::normalize_text;
use log::{debug, info, warn};
use zip::{ZipArchive, result::ZipError};

use crate::encoding;

/// Subtitle files are a few hundred kilobytes at most
const MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

/// What the caller is looking for inside a payload, used to pick one file
/// out of season packs
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Wanted {
    /// Upper-cased `SxxEyy`
    tag: Option<String>,
    /// Normalized title
    title: Option<String>,
}

impl Wanted {
    pub fn new(tag: Option<&str>, title: Option<&str>) -> Self {
        let tag = tag
            .map(|tag| tag.trim().to_ascii_uppercase())
            .filter(|tag| !tag.is_empty());
        let title = title.map(normalize_text).filter(|title| !title.is_empty());
        Self { tag, title }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Disambiguates cached tracks of the same url
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}",
            self.tag.as_deref().unwrap_or_default(),
            self.title.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum ArchiveError {
    Corrupt(Box<str>),
    NoSubtitleEntry,
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Corrupt(message) => write!(f, "Unreadable archive: {message}"),
            ArchiveError::NoSubtitleEntry => write!(f, "No subtitle file in archive"),
        }
    }
}

impl std::error::Error for ArchiveError {}

impl From<ZipError> for ArchiveError {
    fn from(value: ZipError) -> Self {
        ArchiveError::Corrupt(value.to_string().into())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        ArchiveError::Corrupt(value.to_string().into())
    }
}

struct Candidate {
    index: usize,
    name: String,
    size: u64,
}

fn is_subtitle_entry(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let is_resource_fork = lower.starts_with("__macosx/") || lower.contains("/._");
    !is_resource_fork && (lower.ends_with(".srt") || lower.ends_with(".vtt"))
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    candidate: &Candidate,
) -> Result<ArchiveEntry, ArchiveError> {
    if candidate.size > MAX_ENTRY_SIZE {
        return Err(ArchiveError::Corrupt(
            format!("{} declares {} bytes", candidate.name, candidate.size).into(),
        ));
    }

    let file = archive.by_index(candidate.index)?;
    let mut bytes = Vec::new();
    file.take(MAX_ENTRY_SIZE + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > MAX_ENTRY_SIZE {
        return Err(ArchiveError::Corrupt(
            format!("{} is larger than {MAX_ENTRY_SIZE} bytes", candidate.name).into(),
        ));
    }

    Ok(ArchiveEntry {
        name: candidate.name.clone(),
        bytes,
    })
}

/// First candidate that reads cleanly. Unreadable ones are skipped, the last
/// failure is kept for when nothing reads.
fn read_first<'a>(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    candidates: impl IntoIterator<Item = &'a Candidate>,
    last_error: &mut Option<ArchiveError>,
) -> Option<ArchiveEntry> {
    for candidate in candidates {
        match read_entry(archive, candidate) {
            Ok(entry) => return Some(entry),
            Err(err) => {
                warn!("Skipping archive entry {}: {err}", candidate.name);
                *last_error = Some(err);
            }
        }
    }
    None
}

/// Picks the subtitle file the caller most likely wants:
/// 1. a file whose name carries the episode tag, preferring one that also names the title
/// 2. a file whose decoded contents mention the tag
/// 3. the largest subtitle file
pub fn pick_entry(archive: &[u8], wanted: &Wanted) -> Result<ArchiveEntry, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(archive))?;

    let candidates = {
        let mut candidates = Vec::new();
        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            if file.is_file() && is_subtitle_entry(file.name()) {
                candidates.push(Candidate {
                    index,
                    name: file.name().to_string(),
                    size: file.size(),
                });
            }
        }
        candidates
    };
    debug!("Archive has {} subtitle entries", candidates.len());

    if candidates.is_empty() {
        return Err(ArchiveError::NoSubtitleEntry);
    }

    let mut last_error = None;

    if let Some(tag) = wanted.tag() {
        let tag = tag.to_ascii_lowercase();

        // 1. Tag in the file name, title matches first
        let by_name = candidates
            .iter()
            .filter(|candidate| candidate.name.to_lowercase().contains(&tag))
            .collect::<Vec<_>>();
        let (by_title, by_tag_only): (Vec<_>, Vec<_>) =
            by_name.into_iter().partition(|candidate| {
                wanted
                    .title()
                    .is_some_and(|title| normalize_text(&candidate.name).contains(title))
            });
        if let Some(entry) = read_first(
            &mut archive,
            by_title.into_iter().chain(by_tag_only),
            &mut last_error,
        ) {
            info!("Picked archive entry {} by name", entry.name);
            return Ok(entry);
        }

        // 2. Tag in the contents
        for candidate in &candidates {
            let entry = match read_entry(&mut archive, candidate) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping archive entry {}: {err}", candidate.name);
                    last_error = Some(err);
                    continue;
                }
            };
            let text = encoding::to_utf8(&entry.bytes);
            if String::from_utf8_lossy(&text).to_lowercase().contains(&tag) {
                info!("Picked archive entry {} by contents", candidate.name);
                return Ok(entry);
            }
        }
    }

    // 3. Largest
    let mut by_size = candidates.iter().collect::<Vec<_>>();
    by_size.sort_by(|a, b| b.size.cmp(&a.size));
    if let Some(entry) = read_first(&mut archive, by_size, &mut last_error) {
        info!("Picked largest archive entry {}", entry.name);
        return Ok(entry);
    }

    Err(last_error.unwrap_or(ArchiveError::NoSubtitleEntry))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, Write};

    use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

    use super::{ArchiveError, Wanted, pick_entry};

    fn zip_with(entries: &[(&str, &str)], options: SimpleFileOptions) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub(crate) fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        zip_with(entries, SimpleFileOptions::default())
    }

    #[test]
    fn picks_by_tag_in_name() {
        let archive = zip_of(&[
            ("Show.S01E01.srt", "one"),
            ("Show.S01E02.srt", "two"),
            ("Show.S01E03.srt", "three"),
        ]);
        let entry = pick_entry(&archive, &Wanted::new(Some("s01e02"), Some("Show"))).unwrap();
        assert_eq!(entry.name, "Show.S01E02.srt");
        assert_eq!(entry.bytes, b"two");
    }

    #[test]
    fn prefers_title_among_tag_matches() {
        let archive = zip_of(&[
            ("Other.S01E02.srt", "other"),
            ("The.Show.S01E02.srt", "show"),
        ]);
        let entry = pick_entry(&archive, &Wanted::new(Some("S01E02"), Some("The Show"))).unwrap();
        assert_eq!(entry.name, "The.Show.S01E02.srt");
    }

    #[test]
    fn picks_by_tag_in_contents() {
        let archive = zip_of(&[
            ("a.srt", "1\n00:00:01,000 --> 00:00:02,000\nS01E01 recap\n"),
            ("b.srt", "1\n00:00:01,000 --> 00:00:02,000\nepisode s01e02\n"),
        ]);
        let entry = pick_entry(&archive, &Wanted::new(Some("S01E02"), None)).unwrap();
        assert_eq!(entry.name, "b.srt");
    }

    #[test]
    fn falls_back_to_largest() {
        let archive = zip_of(&[
            ("small.srt", "x"),
            ("large.srt", "xxxxxxxxxx"),
            ("readme.txt", "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"),
        ]);
        let entry = pick_entry(&archive, &Wanted::default()).unwrap();
        assert_eq!(entry.name, "large.srt");

        let entry = pick_entry(&archive, &Wanted::new(Some("S09E09"), None)).unwrap();
        assert_eq!(entry.name, "large.srt");
    }

    #[test]
    fn archive_without_subtitles() {
        let archive = zip_of(&[("readme.txt", "nothing here")]);
        assert!(matches!(
            pick_entry(&archive, &Wanted::default()),
            Err(ArchiveError::NoSubtitleEntry)
        ));
        assert!(matches!(
            pick_entry(b"not a zip", &Wanted::default()),
            Err(ArchiveError::Corrupt(_))
        ));
    }

    #[test]
    fn huge_declared_size_is_corrupt() {
        let contents = "1\n00:00:01,000 --> 00:00:02,000\nhello\n";
        let mut archive = zip_with(
            &[("big.srt", contents)],
            SimpleFileOptions::default().large_file(true),
        );

        // Rewrite the uncompressed size of every zip64 extra field
        let size = (contents.len() as u64).to_le_bytes();
        let declared = (1u64 << 62).to_le_bytes();
        let mut patched = 0;
        let mut at = 0;
        while at + 12 <= archive.len() {
            if archive[at..at + 2] == [0x01, 0x00] && archive[at + 4..at + 12] == size {
                archive[at + 4..at + 12].copy_from_slice(&declared);
                patched += 1;
                at += 12;
            } else {
                at += 1;
            }
        }
        assert!(patched > 0);

        assert!(matches!(
            pick_entry(&archive, &Wanted::default()),
            Err(ArchiveError::Corrupt(_))
        ));
    }

    #[test]
    fn skips_unreadable_entries() {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut archive = zip_with(
            &[
                ("a.srt", "damaged cue text, by far the longest entry of this archive"),
                ("b.srt", "1\n00:00:01,000 --> 00:00:02,000\nS01E02\n"),
            ],
            stored,
        );
        let at = archive
            .windows(7)
            .position(|window| window == b"damaged")
            .unwrap();
        archive[at] ^= 0xFF;

        let entry = pick_entry(&archive, &Wanted::new(Some("S01E02"), None)).unwrap();
        assert_eq!(entry.name, "b.srt");

        let entry = pick_entry(&archive, &Wanted::default()).unwrap();
        assert_eq!(entry.name, "b.srt");
    }

    #[test]
    fn wanted_is_normalized() {
        let wanted = Wanted::new(Some(" s01e02 "), Some("The.Office"));
        assert_eq!(wanted.tag(), Some("S01E02"));
        assert_eq!(wanted.title(), Some("the office"));
        assert_eq!(wanted.cache_key(), "S01E02|the office");
        assert_eq!(Wanted::new(Some(""), Some("...")), Wanted::default());
    }
}
