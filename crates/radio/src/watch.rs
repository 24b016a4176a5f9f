use std::path::PathBuf;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::state::RadioState;

pub fn configure_watcher(state: &RadioState) {
    if !state.config.watch_songs {
        info!("Watcher disabled (watch_songs=false)");
        *state.watcher.write() = None;
        return;
    }

    let debounce = state.config.watch_debounce();
    let root = state.songs_root.clone();
    match setup_watcher(state.clone(), root.clone(), debounce) {
        Ok(watcher) => {
            info!(
                "Watching {} for changes (debounce {}s)",
                root.display(),
                debounce.as_secs()
            );
            *state.watcher.write() = Some(watcher);
        }
        Err(err) => {
            warn!("Failed to start watcher: {}", err);
            *state.watcher.write() = None;
        }
    }
}

fn setup_watcher(
    state: RadioState,
    root: PathBuf,
    debounce: Duration,
) -> Result<RecommendedWatcher, notify::Error> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    tokio::spawn(async move {
        watch_loop(state, rx, debounce).await;
    });

    Ok(watcher)
}

async fn watch_loop(state: RadioState, mut rx: UnboundedReceiver<Event>, debounce: Duration) {
    while let Some(event) = rx.recv().await {
        if !is_relevant_event(&event) {
            continue;
        }

        // wait for the folder to go quiet
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {
                    info!("Songs folder changed, reloading");
                    let summary = state.orchestrator.reload().await;
                    info!(
                        "Auto-reload complete: {} tracks, {} added, {} removed",
                        summary.tracks, summary.added, summary.removed
                    );
                    // our own duplicate deletions show up as events
                    while rx.try_recv().is_ok() {}
                    break;
                }
                maybe_event = rx.recv() => {
                    if maybe_event.is_none() {
                        return;
                    }
                }
            }
        }
    }
}

fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use notify::event::{AccessKind, CreateKind, RemoveKind};

    use super::*;

    #[test]
    fn only_content_changes_trigger_reloads() {
        assert!(is_relevant_event(&Event::new(EventKind::Create(CreateKind::File))));
        assert!(is_relevant_event(&Event::new(EventKind::Remove(RemoveKind::File))));
        assert!(!is_relevant_event(&Event::new(EventKind::Access(AccessKind::Read))));
    }
}
