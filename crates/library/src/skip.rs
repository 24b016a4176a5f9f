use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::host::Transport;
use crate::orchestrator::LoadingFlag;

/// Pause after advancing before another skip is accepted.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipOutcome {
    Skipped,
    AlreadySkipping,
    NotPlaying,
    Loading,
}

/// Serializes skip requests against each other and against reloads.
pub struct SkipCoordinator {
    transport: Arc<dyn Transport>,
    loading: LoadingFlag,
    skipping: AtomicBool,
    settle: Duration,
}

struct SkipGuard<'a>(&'a AtomicBool);

impl Drop for SkipGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SkipCoordinator {
    pub fn new(transport: Arc<dyn Transport>, loading: LoadingFlag) -> Self {
        Self {
            transport,
            loading,
            skipping: AtomicBool::new(false),
            settle: SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn is_skipping(&self) -> bool {
        self.skipping.load(Ordering::SeqCst)
    }

    /// Advances to the next track. Requests that arrive while a skip is
    /// settling, while a reload runs or while nothing plays are dropped.
    pub async fn skip(&self) -> SkipOutcome {
        if self.is_skipping() {
            debug!("Skip ignored, already skipping");
            return SkipOutcome::AlreadySkipping;
        }
        if self.loading.is_set() {
            debug!("Skip ignored, songs are loading");
            return SkipOutcome::Loading;
        }
        if !self.transport.is_playing() {
            debug!("Skip ignored, nothing is playing");
            return SkipOutcome::NotPlaying;
        }
        if self
            .skipping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SkipOutcome::AlreadySkipping;
        }
        let _guard = SkipGuard(&self.skipping);

        debug!("Skipping track");
        self.transport.pause();
        self.transport.play_next();
        tokio::time::sleep(self.settle).await;
        debug!(
            "Skip complete, now at index {:?}",
            self.transport.current_index()
        );
        SkipOutcome::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_track;
    use crate::transport::MemoryTransport;

    fn playing_transport() -> Arc<MemoryTransport> {
        let transport = Arc::new(MemoryTransport::new(vec![
            fake_track("A", "One", ""),
            fake_track("B", "Two", ""),
            fake_track("C", "Three", ""),
        ]));
        transport.set_release_guard(|_| true);
        transport.play();
        transport
    }

    fn coordinator(transport: &Arc<MemoryTransport>, loading: LoadingFlag) -> SkipCoordinator {
        SkipCoordinator::new(Arc::clone(transport) as Arc<dyn Transport>, loading)
            .with_settle_delay(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn skip_advances_and_clears_flag() {
        let transport = playing_transport();
        let skipper = coordinator(&transport, LoadingFlag::new());

        assert_eq!(skipper.skip().await, SkipOutcome::Skipped);
        assert_eq!(transport.current_index(), Some(1));
        assert!(!skipper.is_skipping());
        assert!(transport.is_playing());
    }

    #[tokio::test]
    async fn second_skip_within_settle_is_ignored() {
        let transport = playing_transport();
        let skipper = coordinator(&transport, LoadingFlag::new());

        let (first, second) = tokio::join!(skipper.skip(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let during = skipper.is_skipping();
            (during, skipper.skip().await)
        });

        assert_eq!(first, SkipOutcome::Skipped);
        assert_eq!(second, (true, SkipOutcome::AlreadySkipping));
        assert_eq!(transport.current_index(), Some(1));

        assert_eq!(skipper.skip().await, SkipOutcome::Skipped);
        assert_eq!(transport.current_index(), Some(2));
    }

    #[tokio::test]
    async fn nothing_playing_is_a_no_op() {
        let transport = playing_transport();
        transport.pause();
        let skipper = coordinator(&transport, LoadingFlag::new());

        assert_eq!(skipper.skip().await, SkipOutcome::NotPlaying);
        assert_eq!(transport.current_index(), Some(0));
        assert!(!skipper.is_skipping());
    }

    #[tokio::test]
    async fn skip_waits_out_reloads() {
        let transport = playing_transport();
        let loading = LoadingFlag::new();
        let skipper = coordinator(&transport, loading.clone());

        loading.set(true);
        assert_eq!(skipper.skip().await, SkipOutcome::Loading);
        assert_eq!(transport.current_index(), Some(0));

        loading.set(false);
        assert_eq!(skipper.skip().await, SkipOutcome::Skipped);
    }

    #[tokio::test]
    async fn cancelled_skip_releases_the_flag() {
        let transport = playing_transport();
        let skipper = coordinator(&transport, LoadingFlag::new());

        let _ = tokio::time::timeout(Duration::from_millis(10), skipper.skip()).await;
        assert!(!skipper.is_skipping());
        assert_eq!(transport.current_index(), Some(1));
    }
}
