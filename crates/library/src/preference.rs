use serde::{Deserialize, Serialize};

/// Where a format stands when two files carry the same artist/title.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Lower is preferred.
    pub rank: u8,
    /// Losing files of this format are deleted from disk.
    pub disposable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    pub extension: String,
    pub rank: u8,
    #[serde(default)]
    pub disposable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceTable {
    entries: Vec<PreferenceEntry>,
}

const FALLBACK: Preference = Preference {
    rank: 1,
    disposable: false,
};

impl Default for PreferenceTable {
    fn default() -> Self {
        let entry = |extension: &str, rank, disposable| PreferenceEntry {
            extension: extension.to_string(),
            rank,
            disposable,
        };
        Self {
            entries: vec![
                entry("mp3", 0, false),
                entry("mp2", 0, false),
                entry("ogg", 2, true),
                entry("flac", 2, true),
                entry("wav", 2, true),
            ],
        }
    }
}

impl PreferenceTable {
    pub fn new(entries: Vec<PreferenceEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.extension = entry
                    .extension
                    .trim()
                    .trim_start_matches('.')
                    .to_ascii_lowercase();
                entry
            })
            .filter(|entry| !entry.extension.is_empty())
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[PreferenceEntry] {
        &self.entries
    }

    /// First matching entry wins; unlisted extensions rank between the
    /// preferred and the disposable formats.
    pub fn lookup(&self, extension: &str) -> Preference {
        self.entries
            .iter()
            .find(|entry| entry.extension.eq_ignore_ascii_case(extension))
            .map(|entry| Preference {
                rank: entry.rank,
                disposable: entry.disposable,
            })
            .unwrap_or(FALLBACK)
    }
}
