use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ClipHandle, DecodeHint, Track};

#[derive(Clone, Debug)]
pub struct DecodeRequest {
    pub path: PathBuf,
    pub hint: DecodeHint,
    /// Stream from disk instead of preloading.
    pub stream: bool,
    /// Name given to the resulting clip (`Artist - Title`).
    pub name: String,
}

#[derive(Debug)]
pub enum DecodeError {
    Io(std::io::Error),
    Unsupported(String),
    Format(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Io(err) => write!(f, "io error: {}", err),
            DecodeError::Unsupported(value) => write!(f, "unsupported format: {}", value),
            DecodeError::Format(value) => write!(f, "decode error: {}", value),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err)
    }
}

/// Host decode primitive.
#[async_trait]
pub trait Decoder: Send + Sync {
    async fn decode(&self, request: DecodeRequest) -> Result<ClipHandle, DecodeError>;
}

/// Host playback transport. Index 0 of the queue belongs to the host.
pub trait Transport: Send + Sync {
    fn is_playing(&self) -> bool;

    fn current_index(&self) -> Option<usize>;

    fn pause(&self);

    fn play_next(&self);

    /// Runs `edit` against the live queue while the host holds it still.
    fn edit_queue(&self, edit: &mut dyn FnMut(&mut Vec<Arc<Track>>));
}
