//! Library build pipeline: walks a songs folder, decodes files through the
//! host decoder with bounded concurrency, deduplicates by artist/title and
//! splices the result into the host's live playback queue.

mod host;
mod loader;
mod orchestrator;
mod preference;
mod reconcile;
mod registry;
mod settings;
mod skip;
mod transport;
mod walker;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

pub use host::{DecodeError, DecodeRequest, Decoder, Transport};
pub use orchestrator::{LoadingFlag, Orchestrator, ReloadPhase, ReloadSummary};
pub use preference::{Preference, PreferenceEntry, PreferenceTable};
pub use reconcile::{sanitize, SanitizeReport, QUEUE_OFFSET};
pub use registry::{Registry, RegistryView};
pub use settings::LoaderSettings;
pub use skip::{SkipCoordinator, SkipOutcome, SETTLE_DELAY};
pub use transport::MemoryTransport;

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Walk(walkdir::Error),
    NotADirectory(PathBuf),
    Join(tokio::task::JoinError),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Walk(err) => write!(f, "walk error: {}", err),
            LibraryError::NotADirectory(path) => {
                write!(f, "not a directory: {}", path.display())
            }
            LibraryError::Join(err) => write!(f, "join error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<walkdir::Error> for LibraryError {
    fn from(err: walkdir::Error) -> Self {
        LibraryError::Walk(err)
    }
}

impl From<tokio::task::JoinError> for LibraryError {
    fn from(err: tokio::task::JoinError) -> Self {
        LibraryError::Join(err)
    }
}
