use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use codecs::ProbeDecoder;
use common::{Clip, Track};
use library::{Decoder, MemoryTransport, Orchestrator, SkipCoordinator, Transport};
use notify::RecommendedWatcher;
use parking_lot::RwLock;

use crate::config::RadioConfig;

#[derive(Clone)]
pub struct RadioState {
    pub config: Arc<RadioConfig>,
    pub songs_root: PathBuf,
    pub transport: Arc<MemoryTransport>,
    pub orchestrator: Arc<Orchestrator>,
    pub skipper: Arc<SkipCoordinator>,
    pub watcher: Arc<RwLock<Option<RecommendedWatcher>>>,
}

impl RadioState {
    pub fn new(config: RadioConfig, songs_root: PathBuf) -> Self {
        let decoder: Arc<dyn Decoder> = Arc::new(ProbeDecoder::new());
        Self::with_decoder(config, songs_root, decoder)
    }

    pub fn with_decoder(config: RadioConfig, songs_root: PathBuf, decoder: Arc<dyn Decoder>) -> Self {
        let transport = Arc::new(MemoryTransport::new(base_tracks(&config)));
        let host: Arc<dyn Transport> = transport.clone();
        let orchestrator = Arc::new(Orchestrator::new(
            songs_root.clone(),
            config.loader_settings(),
            decoder,
            Arc::clone(&host),
        ));

        let view = orchestrator.view();
        transport.set_release_guard(move |track| view.is_managed(&track.key()));

        let skipper = Arc::new(
            SkipCoordinator::new(host, orchestrator.loading_flag())
                .with_settle_delay(config.settle_delay()),
        );

        Self {
            config: Arc::new(config),
            songs_root,
            transport,
            orchestrator,
            skipper,
            watcher: Arc::new(RwLock::new(None)),
        }
    }
}

/// Clip for host-owned entries; there is no audio behind it here.
struct HostClip {
    loaded: AtomicBool,
}

impl Clip for HostClip {
    fn release(&self) {
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

pub fn base_tracks(config: &RadioConfig) -> Vec<Arc<Track>> {
    if config.remove_base_songs {
        return Vec::new();
    }
    config
        .base_songs
        .iter()
        .map(|song| {
            let clip = Arc::new(HostClip {
                loaded: AtomicBool::new(true),
            });
            Arc::new(Track {
                repeatable: true,
                ..Track::new(song.artist.clone(), song.title.clone(), clip)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_songs_can_be_removed() {
        let config = RadioConfig::default();
        let tracks = base_tracks(&config);
        assert_eq!(tracks.len(), config.base_songs.len());
        assert!(tracks.iter().all(|track| track.repeatable));

        let config = RadioConfig {
            remove_base_songs: true,
            ..RadioConfig::default()
        };
        assert!(base_tracks(&config).is_empty());
    }

    #[tokio::test]
    async fn state_starts_with_the_base_queue() {
        let dir = tempfile::tempdir().unwrap();
        let state = RadioState::new(RadioConfig::default(), dir.path().to_path_buf());

        let queue = state.transport.snapshot();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].display_key(), "Station - Sign On");
        assert!(!state.orchestrator.is_loading());
        assert!(!state.skipper.is_skipping());
    }
}
