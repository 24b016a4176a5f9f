use std::path::Path;

use common::TrackKey;
use lofty::error::LoftyError;
use lofty::prelude::{ItemKey, TaggedFileExt};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TRACK: &str = "Unknown Track";

#[derive(Debug, Default, Clone)]
pub struct TagInfo {
    pub artist: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// How artist/title are derived when a file does not carry them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractPolicy {
    pub read_tags: bool,
    pub unknown_artist: String,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            read_tags: true,
            unknown_artist: UNKNOWN_ARTIST.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackMeta {
    pub artist: String,
    pub title: String,
}

impl TrackMeta {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.artist.clone(), self.title.clone())
    }
}

pub fn read_tags(path: &Path) -> Result<TagInfo, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let mut info = TagInfo::default();

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        info.title = tag.get_string(&ItemKey::TrackTitle).and_then(non_empty);
        let album_artist = tag.get_string(&ItemKey::AlbumArtist).and_then(non_empty);
        let track_artist = tag.get_string(&ItemKey::TrackArtist).and_then(non_empty);
        info.artist = track_artist.or(album_artist);
    }

    Ok(info)
}

/// Never fails: tag problems fall back to the file name.
pub fn extract(path: &Path, policy: &ExtractPolicy) -> TrackMeta {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut meta = parse_file_name(&stem, &policy.unknown_artist);

    if policy.read_tags {
        if let Ok(tags) = read_tags(path) {
            if let Some(artist) = tags.artist {
                meta.artist = artist;
            }
            if let Some(title) = tags.title {
                meta.title = title;
            }
        }
    }

    meta
}

/// Splits `Artist - Title`, then `Artist-Title`.
pub fn parse_file_name(stem: &str, unknown_artist: &str) -> TrackMeta {
    let stem = stem.trim();
    let split = stem
        .split_once(" - ")
        .or_else(|| stem.split_once('-'))
        .map(|(artist, title)| (artist.trim(), title.trim()))
        .filter(|(artist, title)| !artist.is_empty() && !title.is_empty());

    match split {
        Some((artist, title)) => TrackMeta {
            artist: artist.to_string(),
            title: title.to_string(),
        },
        None => TrackMeta {
            artist: unknown_artist.to_string(),
            title: if stem.is_empty() {
                UNKNOWN_TRACK.to_string()
            } else {
                stem.to_string()
            },
        },
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
