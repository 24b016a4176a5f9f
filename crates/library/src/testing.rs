use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Clip, ClipHandle, Track};
use metadata::ExtractPolicy;
use parking_lot::Mutex;

use crate::host::{DecodeError, DecodeRequest, Decoder};
use crate::settings::LoaderSettings;

pub struct FakeClip {
    loaded: AtomicBool,
}

impl FakeClip {
    pub fn new() -> Arc<FakeClip> {
        Arc::new(FakeClip {
            loaded: AtomicBool::new(true),
        })
    }
}

impl Clip for FakeClip {
    fn release(&self) {
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

pub fn fake_track(artist: &str, title: &str, source: &str) -> Arc<Track> {
    Arc::new(Track {
        source: PathBuf::from(source),
        ..Track::new(artist, title, FakeClip::new())
    })
}

/// Decoder that sleeps for a while, counts concurrent decodes and fails on
/// files whose contents are `broken`.
pub struct FakeDecoder {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<DecodeRequest>>,
}

impl FakeDecoder {
    pub fn new(delay: Duration) -> Arc<FakeDecoder> {
        Arc::new(FakeDecoder {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DecodeRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn decode(&self, request: DecodeRequest) -> Result<ClipHandle, DecodeError> {
        self.requests.lock().push(request.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = tokio::fs::read(&request.path).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let bytes = result?;
        if bytes == b"broken" {
            return Err(DecodeError::Format(format!("{} is broken", request.name)));
        }
        let clip: ClipHandle = FakeClip::new();
        Ok(clip)
    }
}

pub fn settings(max_concurrent_loads: usize) -> LoaderSettings {
    LoaderSettings {
        max_concurrent_loads,
        extract: ExtractPolicy {
            read_tags: false,
            ..ExtractPolicy::default()
        },
        ..LoaderSettings::default()
    }
}

pub fn write_song(root: &Path, relpath: &str) -> PathBuf {
    write_file(root, relpath, b"audio")
}

pub fn write_file(root: &Path, relpath: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relpath);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}
