use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use library::{LoaderSettings, PreferenceTable};
use metadata::{ExtractPolicy, UNKNOWN_ARTIST};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_SONGS_PATH: &str = "Songs";
const DEFAULT_RELOAD_COMMAND: &str = "reload";
const DEFAULT_SKIP_COMMAND: &str = "skip";
const DEFAULT_MAX_CONCURRENT_LOADS: usize = 5;
const DEFAULT_SETTLE_DELAY_MS: u64 = 300;
const DEFAULT_WATCH_DEBOUNCE_SECS: u64 = 2;

/// A track the host owns before any songs are loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSongConfig {
    pub artist: String,
    pub title: String,
}

impl Default for BaseSongConfig {
    fn default() -> Self {
        Self {
            artist: "Station".to_string(),
            title: String::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub version: u32,
    pub songs_path: String,
    pub reload_command: String,
    pub skip_command: String,
    pub remove_base_songs: bool,
    pub base_songs: Vec<BaseSongConfig>,
    pub stream_audio: bool,
    pub max_concurrent_loads: usize,
    pub read_tags: bool,
    pub unknown_artist: String,
    pub format_preferences: PreferenceTable,
    pub settle_delay_ms: u64,
    pub watch_songs: bool,
    pub watch_debounce_secs: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        let base = |title: &str| BaseSongConfig {
            artist: "Station".to_string(),
            title: title.to_string(),
        };
        Self {
            version: CONFIG_VERSION,
            songs_path: DEFAULT_SONGS_PATH.to_string(),
            reload_command: DEFAULT_RELOAD_COMMAND.to_string(),
            skip_command: DEFAULT_SKIP_COMMAND.to_string(),
            remove_base_songs: false,
            base_songs: vec![base("Sign On"), base("Interlude")],
            stream_audio: true,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            read_tags: true,
            unknown_artist: UNKNOWN_ARTIST.to_string(),
            format_preferences: PreferenceTable::default(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            watch_songs: false,
            watch_debounce_secs: DEFAULT_WATCH_DEBOUNCE_SECS,
        }
    }
}

impl RadioConfig {
    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            max_concurrent_loads: self.max_concurrent_loads,
            stream_audio: self.stream_audio,
            extract: ExtractPolicy {
                read_tags: self.read_tags,
                unknown_artist: self.unknown_artist.clone(),
            },
            preferences: PreferenceTable::new(self.format_preferences.entries().to_vec()),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_secs(self.watch_debounce_secs)
    }

    fn normalize(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.songs_path.trim().is_empty() {
            self.songs_path = DEFAULT_SONGS_PATH.to_string();
        }
        if self.reload_command.trim().is_empty() {
            self.reload_command = DEFAULT_RELOAD_COMMAND.to_string();
        }
        if self.skip_command.trim().is_empty() {
            self.skip_command = DEFAULT_SKIP_COMMAND.to_string();
        }
        if self.max_concurrent_loads == 0 {
            self.max_concurrent_loads = DEFAULT_MAX_CONCURRENT_LOADS;
        }
        if self.unknown_artist.trim().is_empty() {
            self.unknown_artist = UNKNOWN_ARTIST.to_string();
        }
        if self.format_preferences.entries().is_empty() {
            self.format_preferences = PreferenceTable::default();
        }
        if self.settle_delay_ms == 0 {
            self.settle_delay_ms = DEFAULT_SETTLE_DELAY_MS;
        }
        if self.watch_debounce_secs == 0 {
            self.watch_debounce_secs = DEFAULT_WATCH_DEBOUNCE_SECS;
        }
        self.base_songs.retain(|song| !song.title.trim().is_empty());
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("RADIO_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Reads the config at `path`, writing the defaults there first when the file
/// does not exist. The flag is true when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(RadioConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: RadioConfig = serde_yaml::from_str(&contents)?;
        config.normalize();
        return Ok((config, false));
    }

    let config = RadioConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &RadioConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}
