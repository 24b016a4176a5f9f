use std::sync::Arc;

use common::Track;
use parking_lot::Mutex;
use tracing::debug;

use crate::host::Transport;

type ReleaseGuard = Box<dyn Fn(&Track) -> bool + Send + Sync>;

#[derive(Default)]
struct QueueState {
    queue: Vec<Arc<Track>>,
    current: Option<Arc<Track>>,
    playing: bool,
}

/// Queue-backed transport for hosts without a player of their own.
///
/// The current track is tracked by identity, so queue edits never change
/// what is playing. Moving past a track releases its clip unless the release
/// guard claims it.
pub struct MemoryTransport {
    state: Mutex<QueueState>,
    guard: Mutex<Option<ReleaseGuard>>,
}

impl MemoryTransport {
    pub fn new(initial: Vec<Arc<Track>>) -> Self {
        let current = initial.first().cloned();
        Self {
            state: Mutex::new(QueueState {
                queue: initial,
                current,
                playing: false,
            }),
            guard: Mutex::new(None),
        }
    }

    /// Installs the check that keeps clips owned elsewhere alive.
    pub fn set_release_guard<F>(&self, guard: F)
    where
        F: Fn(&Track) -> bool + Send + Sync + 'static,
    {
        *self.guard.lock() = Some(Box::new(guard));
    }

    pub fn play(&self) {
        let mut state = self.state.lock();
        if state.current.is_none() {
            state.current = state.queue.first().cloned();
        }
        state.playing = state.current.is_some();
    }

    pub fn snapshot(&self) -> Vec<Arc<Track>> {
        self.state.lock().queue.clone()
    }

    pub fn current_track(&self) -> Option<Arc<Track>> {
        self.state.lock().current.clone()
    }

    fn is_guarded(&self, track: &Track) -> bool {
        self.guard
            .lock()
            .as_ref()
            .map(|guard| guard(track))
            .unwrap_or(false)
    }
}

fn position_of(queue: &[Arc<Track>], track: &Arc<Track>) -> Option<usize> {
    queue.iter().position(|entry| Arc::ptr_eq(entry, track))
}

impl Transport for MemoryTransport {
    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn current_index(&self) -> Option<usize> {
        let state = self.state.lock();
        let current = state.current.as_ref()?;
        position_of(&state.queue, current)
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn play_next(&self) {
        let previous = {
            let mut state = self.state.lock();
            if state.queue.is_empty() {
                state.playing = false;
                return;
            }
            let next = state
                .current
                .as_ref()
                .and_then(|current| position_of(&state.queue, current))
                .map(|idx| (idx + 1) % state.queue.len())
                .unwrap_or(0);
            let next_track = Arc::clone(&state.queue[next]);
            debug!("Now playing {}", next_track.display_key());
            state.playing = true;
            state.current.replace(next_track)
        };

        if let Some(track) = previous {
            let still_current = self
                .current_track()
                .map(|current| Arc::ptr_eq(&current, &track))
                .unwrap_or(false);
            if !still_current && !self.is_guarded(&track) {
                track.clip.release();
            }
        }
    }

    fn edit_queue(&self, edit: &mut dyn FnMut(&mut Vec<Arc<Track>>)) {
        let mut state = self.state.lock();
        edit(&mut state.queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_track;

    #[test]
    fn play_next_wraps_around() {
        let a = fake_track("A", "One", "");
        let b = fake_track("B", "Two", "");
        let transport = MemoryTransport::new(vec![Arc::clone(&a), Arc::clone(&b)]);
        transport.set_release_guard(|_| true);
        transport.play();

        assert_eq!(transport.current_index(), Some(0));
        transport.play_next();
        assert_eq!(transport.current_index(), Some(1));
        transport.play_next();
        assert_eq!(transport.current_index(), Some(0));
        assert!(transport.is_playing());
    }

    #[test]
    fn unguarded_clip_is_released_when_left() {
        let managed = fake_track("A", "One", "");
        let host = fake_track("B", "Two", "");
        let transport = MemoryTransport::new(vec![Arc::clone(&host), Arc::clone(&managed)]);
        let managed_key = managed.key();
        transport.set_release_guard(move |track| track.key() == managed_key);
        transport.play();

        transport.play_next();
        assert!(!host.clip.is_loaded());
        transport.play_next();
        assert!(managed.clip.is_loaded());
    }

    #[test]
    fn edits_keep_the_current_track() {
        let a = fake_track("A", "One", "");
        let b = fake_track("B", "Two", "");
        let transport = MemoryTransport::new(vec![Arc::clone(&a)]);
        transport.play();

        transport.edit_queue(&mut |queue: &mut Vec<Arc<Track>>| queue.insert(0, Arc::clone(&b)));
        assert_eq!(transport.current_index(), Some(1));
        assert!(Arc::ptr_eq(&transport.current_track().unwrap(), &a));
    }

    #[test]
    fn pause_stops_playback() {
        let transport = MemoryTransport::new(vec![fake_track("A", "One", "")]);
        transport.play();
        transport.pause();
        assert!(!transport.is_playing());

        let empty = MemoryTransport::new(Vec::new());
        empty.play();
        assert!(!empty.is_playing());
        empty.play_next();
        assert_eq!(empty.current_index(), None);
    }
}
