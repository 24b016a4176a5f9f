use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{
    display_path, extension_of, format_metadata, DecodeHint, MetadataStyle, Track, TrackKey,
};
use metadata::{extract, TrackMeta};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::host::{DecodeRequest, Decoder};
use crate::registry::{Abandoned, Candidate, Claim, Loser, Registry, Settled, WorkingSet};
use crate::settings::LoaderSettings;

#[derive(Clone, Debug, Default)]
pub(crate) struct RunCounters {
    pub files: usize,
    pub scheduled: usize,
    pub decoded: usize,
    pub reused: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub fallbacks: usize,
    pub walk_errors: usize,
}

/// Everything a reload mutates from its concurrent walk and load units,
/// behind one lock.
#[derive(Default)]
pub(crate) struct RunState {
    pub working: WorkingSet,
    pub loaded: HashSet<String>,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub counters: RunCounters,
}

pub(crate) struct Drained {
    pub settled: Settled,
    pub loaded: HashSet<String>,
    pub counters: RunCounters,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

/// State private to one reload.
pub(crate) struct ReloadRun {
    pub id: u64,
    pub root: PathBuf,
    settings: Arc<LoaderSettings>,
    decoder: Arc<dyn Decoder>,
    previous: HashMap<TrackKey, Arc<Track>>,
    permits: Arc<Semaphore>,
    pub(crate) tracker: TaskTracker,
    state: Mutex<RunState>,
}

impl ReloadRun {
    pub fn new(
        id: u64,
        root: PathBuf,
        settings: Arc<LoaderSettings>,
        decoder: Arc<dyn Decoder>,
        previous: HashMap<TrackKey, Arc<Track>>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_loads()));
        Self {
            id,
            root,
            settings,
            decoder,
            previous,
            permits,
            tracker: TaskTracker::new(),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn max_concurrent_loads(&self) -> usize {
        self.settings.max_concurrent_loads()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn record_walk_error(&self) {
        self.state.lock().counters.walk_errors += 1;
    }

    /// Waits for every walk and load spawned so far, and for everything they
    /// spawn in turn.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub fn finish(&self) -> Drained {
        let state = std::mem::take(&mut *self.state.lock());
        let pending = state.working.pending();
        if pending > 0 {
            warn!("{} loads still pending after drain", pending);
        }
        Drained {
            settled: state.working.settle(),
            loaded: state.loaded,
            counters: state.counters,
            in_flight: state.in_flight,
            peak_in_flight: state.peak_in_flight,
        }
    }

    fn begin_decode(&self) -> usize {
        let mut state = self.state.lock();
        state.in_flight += 1;
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        state.in_flight
    }

    /// Gives up `path`'s claim on `key` and reports the standby file that
    /// must be decoded instead, if any.
    fn fall_back(
        &self,
        state: &mut RunState,
        key: &TrackKey,
        path: &Path,
    ) -> Option<Candidate> {
        match state.working.abandon(key, path, self.previous.get(key)) {
            Abandoned::Fallback(next) => {
                info!(
                    "{} failed, falling back to {}",
                    self.label(path),
                    self.label(&next.path)
                );
                state.counters.scheduled += 1;
                state.counters.fallbacks += 1;
                Some(next)
            }
            Abandoned::Reused(next) => {
                info!(
                    "{} failed, keeping loaded clip from {}",
                    self.label(path),
                    self.label(&next)
                );
                state.counters.reused += 1;
                state.counters.fallbacks += 1;
                None
            }
            Abandoned::Freed | Abandoned::NotOwner => None,
        }
    }

    fn label(&self, path: &Path) -> String {
        display_path(&self.root, path)
    }
}

/// Hands one file to the loader as an independent unit.
pub(crate) fn submit(run: &Arc<ReloadRun>, path: PathBuf) {
    let task_run = Arc::clone(run);
    run.tracker.spawn(async move {
        load_file(task_run, path).await;
    });
}

async fn load_file(run: Arc<ReloadRun>, path: PathBuf) {
    let extension = extension_of(&path);
    let meta = match read_meta(&run, &path).await {
        Some(meta) => meta,
        None => return,
    };
    let key = meta.key();
    let song_name = key.display();
    let modified = tokio::fs::metadata(&path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok());
    let candidate = Candidate {
        path: path.clone(),
        preference: run.settings.preferences.lookup(&extension),
        modified,
    };

    let claim = {
        let mut state = run.state.lock();
        state.counters.files += 1;
        let claim = state
            .working
            .claim(&key, candidate.clone(), run.previous.get(&key));
        match &claim {
            Claim::Decode => state.counters.scheduled += 1,
            Claim::Reused => {
                state.counters.reused += 1;
                state.loaded.insert(song_name.clone());
            }
            Claim::Duplicate { .. } => {
                state.counters.duplicates += 1;
                state.loaded.insert(song_name.clone());
            }
        }
        claim
    };

    match claim {
        Claim::Decode => {}
        Claim::Reused => {
            debug!("{} is unchanged, keeping loaded clip", song_name);
            return;
        }
        Claim::Duplicate { kept } => {
            info!(
                "{} is already claimed by {}, holding back {}",
                song_name,
                run.label(&kept),
                run.label(&path)
            );
            return;
        }
    }

    // a failed decode hands the key to the next file on standby
    let mut next = Some(candidate);
    while let Some(candidate) = next.take() {
        next = decode_claimed(&run, &key, candidate).await;
    }
}

/// Decodes the file that currently owns `key`. Returns the standby file that
/// takes over when this decode fails.
async fn decode_claimed(
    run: &Arc<ReloadRun>,
    key: &TrackKey,
    candidate: Candidate,
) -> Option<Candidate> {
    let path = candidate.path;
    let hint = DecodeHint::from_path(&path);

    let permit = match Arc::clone(&run.permits).acquire_owned().await {
        Ok(permit) => permit,
        Err(err) => {
            warn!("Load of {} abandoned: {}", run.label(&path), err);
            let mut state = run.state.lock();
            state.counters.failed += 1;
            return run.fall_back(&mut state, key, &path);
        }
    };

    let active = run.begin_decode();
    debug!(
        "Starting load (active: {}/{}): {}",
        active,
        run.max_concurrent_loads(),
        run.label(&path)
    );

    let request = DecodeRequest {
        path: path.clone(),
        hint,
        stream: run.settings.stream_audio && !hint.is_tracker(),
        name: key.display(),
    };
    let result = run.decoder.decode(request).await;

    let (released, fallback) = {
        let mut state = run.state.lock();
        state.in_flight -= 1;
        match result {
            Ok(clip) => {
                let track = Arc::new(Track {
                    artist: key.artist().to_string(),
                    title: key.title().to_string(),
                    clip,
                    repeatable: false,
                    source: path.clone(),
                    format: hint,
                    modified: candidate.modified,
                });
                if state.working.complete(key, &path, Arc::clone(&track)) {
                    state.counters.decoded += 1;
                    state.loaded.insert(key.display());
                    info!(
                        "Loaded {} ({}/{})",
                        format_metadata(key.artist(), key.title(), MetadataStyle::By),
                        state.counters.decoded,
                        state.counters.scheduled
                    );
                    (None, None)
                } else {
                    (Some(track), None)
                }
            }
            Err(err) => {
                state.counters.failed += 1;
                warn!("Failed to load {}: {}", run.label(&path), err);
                (None, run.fall_back(&mut state, key, &path))
            }
        }
    };
    drop(permit);

    if let Some(track) = released {
        debug!(
            "{} was superseded while loading, releasing",
            run.label(&track.source)
        );
        track.clip.release();
    }
    debug!(
        "Finished load (active: {}/{})",
        run.in_flight(),
        run.max_concurrent_loads()
    );
    fallback
}

async fn read_meta(run: &Arc<ReloadRun>, path: &Path) -> Option<TrackMeta> {
    let policy = run.settings.extract.clone();
    let file = path.to_path_buf();
    match tokio::task::spawn_blocking(move || extract(&file, &policy)).await {
        Ok(meta) => Some(meta),
        Err(err) => {
            warn!("Metadata task for {} failed: {}", run.label(path), err);
            run.state.lock().counters.failed += 1;
            None
        }
    }
}

/// Deletes disposable duplicates whose key ended up registered. Returns how
/// many files were removed.
pub(crate) async fn prune_duplicates(
    root: &Path,
    registry: &Registry,
    losers: &[Loser],
) -> usize {
    let mut deleted = 0;
    for loser in losers {
        let label = display_path(root, &loser.path);
        if !loser.disposable {
            continue;
        }
        if !registry.contains(&loser.key) {
            warn!(
                "Keeping duplicate {}: the preferred copy of {} did not load",
                label,
                loser.key.display()
            );
            continue;
        }
        match tokio::fs::remove_file(&loser.path).await {
            Ok(()) => {
                info!(
                    "{} is already loaded, deleted duplicate {} file {}",
                    loser.key.display(),
                    extension_of(&loser.path).to_ascii_uppercase(),
                    label
                );
                deleted += 1;
            }
            Err(err) => warn!("Failed to delete duplicate {}: {}", label, err),
        }
    }
    deleted
}
