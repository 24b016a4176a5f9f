use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Decode hint handed to the host decoder, derived from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeHint {
    Aiff,
    It,
    Mpeg,
    Ogg,
    S3m,
    Wav,
    Xm,
    Unknown,
}

impl DecodeHint {
    /// Expects an already lowercased extension without the leading dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "aif" | "aiff" => DecodeHint::Aiff,
            "it" => DecodeHint::It,
            "mp2" | "mp3" => DecodeHint::Mpeg,
            "ogg" => DecodeHint::Ogg,
            "s3m" => DecodeHint::S3m,
            "wav" => DecodeHint::Wav,
            "xm" => DecodeHint::Xm,
            // flac has no native hint but still goes through the decoder
            "flac" => DecodeHint::Unknown,
            _ => DecodeHint::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(&extension_of(path))
    }

    /// Tracker modules cannot be streamed by the host.
    pub fn is_tracker(self) -> bool {
        matches!(self, DecodeHint::It | DecodeHint::S3m | DecodeHint::Xm)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DecodeHint::Aiff => "aiff",
            DecodeHint::It => "it",
            DecodeHint::Mpeg => "mpeg",
            DecodeHint::Ogg => "ogg",
            DecodeHint::S3m => "s3m",
            DecodeHint::Wav => "wav",
            DecodeHint::Xm => "xm",
            DecodeHint::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DecodeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of `path`, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataStyle {
    /// `Artist - Title`
    Dash,
    /// `Title by Artist`
    By,
}

pub fn format_metadata(artist: &str, title: &str, style: MetadataStyle) -> String {
    match style {
        MetadataStyle::Dash => format!("{} - {}", artist, title),
        MetadataStyle::By => format!("{} by {}", title, artist),
    }
}

/// Identity of a track: the `artist|title` pair as extracted, case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    artist: String,
    title: String,
}

impl TrackKey {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Display key recorded in the loaded-marker set.
    pub fn display(&self) -> String {
        format_metadata(&self.artist, &self.title, MetadataStyle::Dash)
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.artist, self.title)
    }
}

/// Decoded-audio handle owned by the host.
pub trait Clip: Send + Sync {
    /// Frees the decoded data. Must be idempotent.
    fn release(&self);

    fn is_loaded(&self) -> bool;
}

pub type ClipHandle = Arc<dyn Clip>;

pub struct Track {
    pub artist: String,
    pub title: String,
    pub clip: ClipHandle,
    pub repeatable: bool,
    pub source: PathBuf,
    pub format: DecodeHint,
    pub modified: Option<SystemTime>,
}

impl Track {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, clip: ClipHandle) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            clip,
            repeatable: false,
            source: PathBuf::new(),
            format: DecodeHint::Unknown,
            modified: None,
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.artist.clone(), self.title.clone())
    }

    pub fn display_key(&self) -> String {
        format_metadata(&self.artist, &self.title, MetadataStyle::Dash)
    }

    /// True when `path` with modification time `modified` is the file this
    /// track was decoded from.
    pub fn is_backed_by(&self, path: &Path, modified: Option<SystemTime>) -> bool {
        self.source == path && self.modified.is_some() && self.modified == modified
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("artist", &self.artist)
            .field("title", &self.title)
            .field("source", &self.source)
            .field("format", &self.format)
            .field("loaded", &self.clip.is_loaded())
            .finish()
    }
}

/// Ordinal comparison ignoring case.
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Artist first, then title, both case-insensitive.
pub fn compare_tracks(a: &Track, b: &Track) -> Ordering {
    cmp_ignore_case(&a.artist, &b.artist).then_with(|| cmp_ignore_case(&a.title, &b.title))
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

/// Root-relative slash path for log lines, the full path when outside `root`.
pub fn display_path(root: &Path, path: &Path) -> String {
    relpath_from(root, path)
        .filter(|rel| !rel.is_empty())
        .unwrap_or_else(|| path.display().to_string())
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
