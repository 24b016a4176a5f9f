use std::collections::HashSet;
use std::sync::Arc;

use common::{compare_tracks, Track};
use serde::Serialize;
use tracing::{info, warn};

use crate::registry::Registry;

/// First queue index this library writes to; index 0 belongs to the host.
pub const QUEUE_OFFSET: usize = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub added: usize,
    pub kept: usize,
    pub removed: usize,
    /// One of our tracks sits at index 0 and was left in place.
    pub pinned: bool,
}

/// Merges the registry into the live queue.
///
/// Registry tracks and `retired` tracks (left over from the previous reload)
/// are walked in sorted order. A track stays only if it is the registered
/// object for its key and its display key was confirmed on disk this run;
/// everything else is removed from the queue, dropped from the registry and
/// its clip released. Survivors are re-inserted as one sorted block starting
/// at [`QUEUE_OFFSET`]. The entry at index 0 is never moved or removed.
pub fn sanitize(
    queue: &mut Vec<Arc<Track>>,
    registry: &mut Registry,
    retired: &[Arc<Track>],
    loaded: &HashSet<String>,
) -> SanitizeReport {
    let head = queue.first().cloned();
    let is_head = |track: &Arc<Track>| {
        head.as_ref()
            .map(|entry| Arc::ptr_eq(entry, track))
            .unwrap_or(false)
    };

    let mut candidates: Vec<Arc<Track>> = registry.tracks().to_vec();
    candidates.extend(
        retired
            .iter()
            .filter(|track| !registry.holds(track))
            .cloned(),
    );
    candidates.sort_by(|a, b| compare_tracks(a, b));

    let mut report = SanitizeReport::default();
    let mut survivors = Vec::with_capacity(candidates.len());
    let mut evicted = Vec::new();

    for track in candidates {
        let pinned = is_head(&track);
        let present = pinned || take_from_queue(queue, &track);
        let current = registry.holds(&track) && loaded.contains(&track.display_key());

        if !current {
            if present {
                info!("Removing {}", track.title);
            }
            evicted.push((track, pinned));
            continue;
        }

        if present {
            report.kept += 1;
        } else {
            info!("Adding {}", track.title);
            report.added += 1;
        }
        if pinned {
            report.pinned = true;
        } else {
            survivors.push(track);
        }
    }

    for (track, pinned) in evicted {
        if registry.holds(&track) {
            registry.remove(&track.key());
        }
        if pinned {
            warn!("{} is no longer on disk but holds the head of the queue", track.title);
            report.pinned = true;
        } else {
            track.clip.release();
        }
        report.removed += 1;
    }

    let offset = QUEUE_OFFSET.min(queue.len());
    for (idx, track) in survivors.into_iter().enumerate() {
        queue.insert(offset + idx, track);
    }

    report
}

fn take_from_queue(queue: &mut Vec<Arc<Track>>, track: &Arc<Track>) -> bool {
    // index 0 is handled by the caller
    match queue
        .iter()
        .skip(1)
        .position(|entry| Arc::ptr_eq(entry, track))
    {
        Some(pos) => {
            queue.remove(pos + 1);
            true
        }
        None => false,
    }
}
