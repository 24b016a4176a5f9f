use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use common::Track;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::info;

use crate::host::{Decoder, Transport};
use crate::loader::{prune_duplicates, Drained, ReloadRun};
use crate::reconcile::{sanitize, SanitizeReport};
use crate::registry::{Registry, RegistryView, Settled};
use crate::settings::LoaderSettings;
use crate::walker::walk;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPhase {
    Idle,
    Scanning,
    Draining,
    Sorting,
    Sanitizing,
}

impl fmt::Display for ReloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReloadPhase::Idle => "idle",
            ReloadPhase::Scanning => "scanning",
            ReloadPhase::Draining => "draining",
            ReloadPhase::Sorting => "sorting",
            ReloadPhase::Sanitizing => "sanitizing",
        };
        f.write_str(name)
    }
}

/// Shared "a reload is running" flag. Other components check it before
/// touching the queue.
#[derive(Clone, Debug, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReloadSummary {
    pub run: u64,
    pub files: usize,
    pub scheduled: usize,
    pub decoded: usize,
    pub reused: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub fallbacks: usize,
    pub deleted: usize,
    pub walk_errors: usize,
    pub peak_in_flight: usize,
    pub in_flight: usize,
    pub tracks: usize,
    pub added: usize,
    pub removed: usize,
    pub elapsed_ms: u64,
}

/// Sequences scan, drain, sort and sanitize for one songs folder.
///
/// Each reload works on private state and swaps the committed registry in
/// only once every walk and load has finished. Reloads are serialized: one
/// requested while another runs waits its turn.
pub struct Orchestrator {
    root: PathBuf,
    settings: Arc<LoaderSettings>,
    decoder: Arc<dyn Decoder>,
    transport: Arc<dyn Transport>,
    registry: Arc<RwLock<Registry>>,
    loading: LoadingFlag,
    phase: RwLock<ReloadPhase>,
    runs: AtomicU64,
    single_flight: tokio::sync::Mutex<()>,
    last_summary: Mutex<Option<ReloadSummary>>,
}

impl Orchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: LoaderSettings,
        decoder: Arc<dyn Decoder>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            root: root.into(),
            settings: Arc::new(settings),
            decoder,
            transport,
            registry: Arc::new(RwLock::new(Registry::new())),
            loading: LoadingFlag::new(),
            phase: RwLock::new(ReloadPhase::Idle),
            runs: AtomicU64::new(0),
            single_flight: tokio::sync::Mutex::new(()),
            last_summary: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn phase(&self) -> ReloadPhase {
        *self.phase.read()
    }

    /// Committed tracks in queue order.
    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.registry.read().tracks().to_vec()
    }

    pub fn view(&self) -> RegistryView {
        RegistryView::new(Arc::clone(&self.registry))
    }

    pub fn last_summary(&self) -> Option<ReloadSummary> {
        self.last_summary.lock().clone()
    }

    pub async fn reload(&self) -> ReloadSummary {
        let _flight = self.single_flight.lock().await;
        let started = Instant::now();
        let id = self.runs.fetch_add(1, Ordering::SeqCst) + 1;

        info!("Reloading songs from {}", self.root.display());
        let _active = ActiveReload::start(&self.loading, &self.phase);
        self.set_phase(ReloadPhase::Scanning);

        let (previous, retired) = {
            let registry = self.registry.read();
            (registry.snapshot(), registry.tracks().to_vec())
        };
        if !retired.is_empty() && self.transport.is_playing() {
            info!("Pausing playback while songs reload");
            self.transport.pause();
        }

        let run = Arc::new(ReloadRun::new(
            id,
            self.root.clone(),
            Arc::clone(&self.settings),
            Arc::clone(&self.decoder),
            previous,
        ));
        walk(Arc::clone(&run), self.root.clone()).await;

        self.set_phase(ReloadPhase::Draining);
        run.drain().await;
        let Drained {
            settled,
            loaded,
            counters,
            in_flight,
            peak_in_flight,
        } = run.finish();
        let Settled {
            mut registry,
            losers,
        } = settled;
        let deleted = prune_duplicates(&self.root, &registry, &losers).await;

        self.set_phase(ReloadPhase::Sorting);
        registry.sort();

        self.set_phase(ReloadPhase::Sanitizing);
        let (report, tracks) = {
            let mut committed = self.registry.write();
            *committed = registry;
            let mut report = SanitizeReport::default();
            self.transport
                .edit_queue(&mut |queue: &mut Vec<Arc<Track>>| {
                    report = sanitize(queue, &mut committed, &retired, &loaded);
                });
            (report, committed.len())
        };

        info!("TOTAL SONGS LOADED: {}", tracks);

        let summary = ReloadSummary {
            run: id,
            files: counters.files,
            scheduled: counters.scheduled,
            decoded: counters.decoded,
            reused: counters.reused,
            failed: counters.failed,
            duplicates: counters.duplicates,
            fallbacks: counters.fallbacks,
            deleted,
            walk_errors: counters.walk_errors,
            peak_in_flight,
            in_flight,
            tracks,
            added: report.added,
            removed: report.removed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Reload {} complete: {} tracks, {} added, {} removed, {} failed in {}ms",
            summary.run,
            summary.tracks,
            summary.added,
            summary.removed,
            summary.failed,
            summary.elapsed_ms
        );
        *self.last_summary.lock() = Some(summary.clone());
        summary
    }

    fn set_phase(&self, phase: ReloadPhase) {
        *self.phase.write() = phase;
    }
}

/// Holds the loading flag for the lifetime of one reload, including reloads
/// that are dropped half way.
struct ActiveReload<'a> {
    loading: &'a LoadingFlag,
    phase: &'a RwLock<ReloadPhase>,
}

impl<'a> ActiveReload<'a> {
    fn start(loading: &'a LoadingFlag, phase: &'a RwLock<ReloadPhase>) -> Self {
        loading.set(true);
        Self { loading, phase }
    }
}

impl Drop for ActiveReload<'_> {
    fn drop(&mut self) {
        *self.phase.write() = ReloadPhase::Idle;
        self.loading.set(false);
    }
}
