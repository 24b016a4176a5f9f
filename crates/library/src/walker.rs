use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use common::display_path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::loader::{submit, ReloadRun};
use crate::LibraryError;

type WalkFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Default)]
pub(crate) struct DirListing {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WalkUnit {
    Walk(PathBuf),
    Load(PathBuf),
}

impl DirListing {
    /// Scheduling order for one directory: every subdirectory walk goes out
    /// before any of its files.
    pub fn into_units(self) -> Vec<WalkUnit> {
        self.dirs
            .into_iter()
            .map(WalkUnit::Walk)
            .chain(self.files.into_iter().map(WalkUnit::Load))
            .collect()
    }
}

/// Walks `dir`: every subdirectory becomes its own concurrent walk, then
/// every file is handed to the loader. Errors stay with the failing subtree.
pub(crate) fn walk(run: Arc<ReloadRun>, dir: PathBuf) -> WalkFuture {
    Box::pin(async move {
        if let Err(err) = walk_dir(&run, &dir).await {
            warn!("Failed to search {}: {}", display_path(&run.root, &dir), err);
            run.record_walk_error();
        }
    })
}

fn spawn_walk(run: &Arc<ReloadRun>, dir: PathBuf) {
    let task_run = Arc::clone(run);
    run.tracker.spawn(walk(task_run, dir));
}

async fn walk_dir(run: &Arc<ReloadRun>, dir: &Path) -> Result<(), LibraryError> {
    let owned = dir.to_path_buf();
    let listing = tokio::task::spawn_blocking(move || list_dir(&owned)).await??;

    for unit in listing.into_units() {
        match unit {
            WalkUnit::Walk(subdir) => {
                info!("Searching directory {}", display_path(&run.root, &subdir));
                spawn_walk(run, subdir);
            }
            WalkUnit::Load(file) => submit(run, file),
        }
    }
    Ok(())
}

/// Immediate children of `dir`, sorted by name. Symlinked directories are not
/// followed.
pub(crate) fn list_dir(dir: &Path) -> Result<DirListing, LibraryError> {
    if !std::fs::metadata(dir)?.is_dir() {
        return Err(LibraryError::NotADirectory(dir.to_path_buf()));
    }

    let mut listing = DirListing::default();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            listing.dirs.push(entry.into_path());
        } else if file_type.is_file() || entry.path().is_file() {
            listing.files.push(entry.into_path());
        }
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use common::TrackKey;

    use super::*;
    use crate::testing::{settings, write_song, FakeDecoder};

    #[test]
    fn lists_directories_and_files_separately() {
        let dir = tempfile::tempdir().unwrap();
        write_song(dir.path(), "b.mp3");
        write_song(dir.path(), "a.ogg");
        write_song(dir.path(), "Zed/c.mp3");
        write_song(dir.path(), "Alpha/d.mp3");

        let listing = list_dir(dir.path()).unwrap();
        let names = |paths: &[PathBuf]| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
                .collect()
        };
        assert_eq!(names(&listing.dirs), vec!["Alpha", "Zed"]);
        assert_eq!(names(&listing.files), vec!["a.ogg", "b.mp3"]);
    }

    #[test]
    fn subdirectories_are_scheduled_before_files() {
        let dir = tempfile::tempdir().unwrap();
        write_song(dir.path(), "a.mp3");
        write_song(dir.path(), "m/x.mp3");
        write_song(dir.path(), "z.ogg");
        write_song(dir.path(), "zz/y.mp3");

        let units = list_dir(dir.path()).unwrap().into_units();
        assert_eq!(
            units,
            vec![
                WalkUnit::Walk(dir.path().join("m")),
                WalkUnit::Walk(dir.path().join("zz")),
                WalkUnit::Load(dir.path().join("a.mp3")),
                WalkUnit::Load(dir.path().join("z.ogg")),
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_dir(&dir.path().join("nope")).is_err());

        let file = write_song(dir.path(), "song.mp3");
        assert!(matches!(list_dir(&file), Err(LibraryError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn walks_nested_folders_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        write_song(dir.path(), "Top - Level.mp3");
        write_song(dir.path(), "one/One - Song.mp3");
        write_song(dir.path(), "one/two/Two - Song.mp3");
        write_song(dir.path(), "one/two/three/Three - Song.ogg");

        let decoder = FakeDecoder::new(Duration::from_millis(2));
        let run = Arc::new(ReloadRun::new(
            1,
            dir.path().to_path_buf(),
            Arc::new(settings(2)),
            decoder,
            HashMap::new(),
        ));
        walk(Arc::clone(&run), dir.path().to_path_buf()).await;
        run.drain().await;
        let drained = run.finish();

        assert_eq!(drained.counters.files, 4);
        assert_eq!(drained.counters.walk_errors, 0);
        let registry = &drained.settled.registry;
        assert_eq!(registry.len(), 4);
        assert!(registry.contains(&TrackKey::new("Three", "Song")));
    }

    #[tokio::test]
    async fn missing_root_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FakeDecoder::new(Duration::from_millis(1));
        let root = dir.path().join("missing");
        let run = Arc::new(ReloadRun::new(
            1,
            root.clone(),
            Arc::new(settings(2)),
            decoder,
            HashMap::new(),
        ));
        walk(Arc::clone(&run), root).await;
        run.drain().await;

        assert_eq!(run.finish().counters.walk_errors, 1);
    }
}
