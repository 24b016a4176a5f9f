use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use common::{compare_tracks, Track, TrackKey};
use parking_lot::RwLock;

use crate::preference::Preference;

/// Authoritative set of loaded tracks: one entry per identity key, plus the
/// ordered list the queue is built from. Both views always hold the same
/// tracks.
#[derive(Default)]
pub struct Registry {
    index: HashMap<TrackKey, Arc<Track>>,
    tracks: Vec<Arc<Track>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, key: &TrackKey) -> Option<&Arc<Track>> {
        self.index.get(key)
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    /// Inserts unless the key is taken. Returns whether the track went in.
    pub fn insert(&mut self, track: Arc<Track>) -> bool {
        let key = track.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, Arc::clone(&track));
        self.tracks.push(track);
        true
    }

    pub fn remove(&mut self, key: &TrackKey) -> Option<Arc<Track>> {
        let track = self.index.remove(key)?;
        self.tracks.retain(|entry| !Arc::ptr_eq(entry, &track));
        Some(track)
    }

    /// True when this exact track object is registered.
    pub fn holds(&self, track: &Arc<Track>) -> bool {
        self.index
            .get(&track.key())
            .map(|entry| Arc::ptr_eq(entry, track))
            .unwrap_or(false)
    }

    /// Stable sort by artist then title, case-insensitive.
    pub fn sort(&mut self) {
        self.tracks.sort_by(|a, b| compare_tracks(a, b));
    }

    pub(crate) fn snapshot(&self) -> HashMap<TrackKey, Arc<Track>> {
        self.index.clone()
    }
}

/// Read-only handle on the committed registry, for host-side checks.
#[derive(Clone)]
pub struct RegistryView {
    inner: Arc<RwLock<Registry>>,
}

impl RegistryView {
    pub(crate) fn new(inner: Arc<RwLock<Registry>>) -> Self {
        Self { inner }
    }

    /// Whether the host should leave this track's clip alone.
    pub fn is_managed(&self, key: &TrackKey) -> bool {
        self.inner.read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.inner.read().tracks().to_vec()
    }
}

/// A file competing for an identity key during one reload.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub path: PathBuf,
    pub preference: Preference,
    pub modified: Option<SystemTime>,
}

impl Candidate {
    fn rank(&self) -> (u8, &Path) {
        (self.preference.rank, &self.path)
    }

    /// Lower rank wins, ties go to the lexically smaller path so the outcome
    /// does not depend on arrival order.
    fn outranks(&self, other: &Candidate) -> bool {
        self.rank() < other.rank()
    }
}

enum Slot {
    Pending(Candidate),
    Ready {
        candidate: Candidate,
        track: Arc<Track>,
        reused: bool,
    },
}

impl Slot {
    fn candidate(&self) -> &Candidate {
        match self {
            Slot::Pending(candidate) => candidate,
            Slot::Ready { candidate, .. } => candidate,
        }
    }

    /// Pending unless `previous` was loaded from this very file.
    fn open(candidate: Candidate, previous: Option<&Arc<Track>>) -> Self {
        match previous.filter(|track| track.is_backed_by(&candidate.path, candidate.modified)) {
            Some(track) => Slot::Ready {
                candidate,
                track: Arc::clone(track),
                reused: true,
            },
            None => Slot::Pending(candidate),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Claim {
    /// The file owns the key and must be decoded.
    Decode,
    /// The file re-confirmed a track from the previous reload.
    Reused,
    /// Another file owns the key.
    Duplicate { kept: PathBuf },
}

/// What became of a key after its owner failed to decode.
#[derive(Debug)]
pub(crate) enum Abandoned {
    /// The caller did not own the key.
    NotOwner,
    /// No other file carries the key.
    Freed,
    /// The next best file now owns the key and must be decoded.
    Fallback(Candidate),
    /// The next best file re-confirmed a track from the previous reload.
    Reused(PathBuf),
}

/// A file that lost its key to a better candidate.
#[derive(Clone, Debug)]
pub(crate) struct Loser {
    pub key: TrackKey,
    pub path: PathBuf,
    pub disposable: bool,
}

/// Per-reload claims on identity keys; becomes the next committed registry
/// once the reload drains. Files that lose a key wait on standby until the
/// owner either loads or fails.
#[derive(Default)]
pub(crate) struct WorkingSet {
    slots: HashMap<TrackKey, Slot>,
    order: Vec<TrackKey>,
    standby: HashMap<TrackKey, Vec<Candidate>>,
}

pub(crate) struct Settled {
    pub registry: Registry,
    pub losers: Vec<Loser>,
}

impl WorkingSet {
    pub fn claim(
        &mut self,
        key: &TrackKey,
        candidate: Candidate,
        previous: Option<&Arc<Track>>,
    ) -> Claim {
        if let Some(slot) = self.slots.get(key) {
            if !candidate.outranks(slot.candidate()) {
                let kept = slot.candidate().path.clone();
                self.standby.entry(key.clone()).or_default().push(candidate);
                return Claim::Duplicate { kept };
            }
        }

        let slot = Slot::open(candidate, previous);
        let claim = match slot {
            Slot::Pending(_) => Claim::Decode,
            Slot::Ready { .. } => Claim::Reused,
        };
        match self.slots.insert(key.clone(), slot) {
            Some(displaced) => self.displace(key, displaced),
            None => self.order.push(key.clone()),
        }
        claim
    }

    /// Records a finished decode. Returns `false` when the file lost its key
    /// in the meantime; the caller then owns the track and must release it.
    pub fn complete(&mut self, key: &TrackKey, path: &Path, track: Arc<Track>) -> bool {
        if !self.owns_pending(key, path) {
            return false;
        }
        if let Some(Slot::Pending(candidate)) = self.slots.remove(key) {
            self.slots.insert(
                key.clone(),
                Slot::Ready {
                    candidate,
                    track,
                    reused: false,
                },
            );
        }
        true
    }

    /// Drops a pending claim whose decode failed and hands the key to the
    /// best file on standby, if any.
    pub fn abandon(
        &mut self,
        key: &TrackKey,
        path: &Path,
        previous: Option<&Arc<Track>>,
    ) -> Abandoned {
        if !self.owns_pending(key, path) {
            return Abandoned::NotOwner;
        }
        self.slots.remove(key);

        let next = match self.standby.get_mut(key).and_then(take_best) {
            Some(next) => next,
            None => {
                self.order.retain(|entry| entry != key);
                return Abandoned::Freed;
            }
        };
        let slot = Slot::open(next.clone(), previous);
        let abandoned = match slot {
            Slot::Pending(_) => Abandoned::Fallback(next),
            Slot::Ready { .. } => Abandoned::Reused(next.path),
        };
        self.slots.insert(key.clone(), slot);
        abandoned
    }

    fn owns_pending(&self, key: &TrackKey, path: &Path) -> bool {
        matches!(
            self.slots.get(key),
            Some(Slot::Pending(candidate)) if candidate.path == path
        )
    }

    pub fn pending(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Pending(_)))
            .count()
    }

    /// Files still on standby, i.e. duplicates of a key some other file owns.
    pub fn losers(&self) -> Vec<Loser> {
        let mut losers: Vec<Loser> = self
            .standby
            .iter()
            .flat_map(|(key, candidates)| {
                candidates.iter().map(move |candidate| Loser {
                    key: key.clone(),
                    path: candidate.path.clone(),
                    disposable: candidate.preference.disposable,
                })
            })
            .collect();
        losers.sort_by(|a, b| a.path.cmp(&b.path));
        losers
    }

    pub fn settle(self) -> Settled {
        let losers = self.losers();
        let WorkingSet {
            mut slots, order, ..
        } = self;
        let mut registry = Registry::new();
        for key in order {
            if let Some(Slot::Ready { track, .. }) = slots.remove(&key) {
                registry.insert(track);
            }
        }
        Settled { registry, losers }
    }

    fn displace(&mut self, key: &TrackKey, displaced: Slot) {
        let candidate = displaced.candidate().clone();
        if let Slot::Ready {
            track,
            reused: false,
            ..
        } = &displaced
        {
            // never reached the queue, nothing else refers to it
            track.clip.release();
        }
        self.standby.entry(key.clone()).or_default().push(candidate);
    }
}

fn take_best(candidates: &mut Vec<Candidate>) -> Option<Candidate> {
    let best = candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.rank().cmp(&b.rank()))
        .map(|(idx, _)| idx)?;
    Some(candidates.swap_remove(best))
}
