// tests/watch_loop.rs

mod common;
use crate::common::{init_tracing, Fixture};

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::Event;
use regex::Regex;
use tokio::sync::{mpsc, oneshot};

use settled::engine::DebounceTracker;
use settled::errors::{Result as SettledResult, SettledError};
use settled::fs::{RealFileSystem, StagedFile, StagingArea};
use settled::watch::{EventLoop, Operation, WatchSource, WatcherHandle};

type TestResult = Result<(), Box<dyn Error>>;

/// Records registrations; can be told to fail for specific directories.
#[derive(Debug, Default)]
struct FakeSource {
    registered: Vec<PathBuf>,
    unregistered: Vec<PathBuf>,
    fail_for: Vec<PathBuf>,
    /// Delete the directory, then fail, as if it vanished mid-registration.
    vanish: Vec<PathBuf>,
}

impl FakeSource {
    fn failing(dir: PathBuf) -> Self {
        Self {
            fail_for: vec![dir],
            ..Self::default()
        }
    }
}

fn watch_error(action: &'static str, dir: &Path) -> SettledError {
    SettledError::WatchError {
        action,
        path: dir.to_path_buf(),
        source: notify::Error::generic("injected failure"),
    }
}

impl WatchSource for FakeSource {
    fn register(&mut self, dir: &Path) -> SettledResult<()> {
        if self.vanish.iter().any(|d| d == dir) {
            let _ = fs::remove_dir_all(dir);
            return Err(watch_error("add", dir));
        }
        if self.fail_for.iter().any(|d| d == dir) {
            return Err(watch_error("add", dir));
        }
        self.registered.push(dir.to_path_buf());
        Ok(())
    }

    fn unregister(&mut self, dir: &Path) -> SettledResult<()> {
        self.unregistered.push(dir.to_path_buf());
        Ok(())
    }
}

/// A tracker whose timers never fire during a test.
fn tracker(fx: &Fixture) -> (DebounceTracker, mpsc::Receiver<StagedFile>) {
    let staging = StagingArea::new(
        Arc::new(RealFileSystem),
        &fx.watch_dir,
        &fx.staging_dir,
        &fx.quarantine_dir,
    );
    let (tx, rx) = mpsc::channel(8);
    (DebounceTracker::new(Duration::from_secs(3600), staging, tx), rx)
}

fn event_loop(
    fx: &Fixture,
    source: FakeSource,
    exclude: Option<&str>,
) -> (EventLoop<FakeSource>, DebounceTracker, mpsc::Receiver<StagedFile>) {
    let (tracker, rx) = tracker(fx);
    let exclude = exclude.map(|p| Regex::new(p).unwrap());
    let event_loop = EventLoop::new(fx.watch_dir.clone(), source, tracker.clone(), exclude);
    (event_loop, tracker, rx)
}

fn mkdir(fx: &Fixture, rel: &str) -> PathBuf {
    let dir = fx.watch_path(rel);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn populate_registers_tree_and_seeds_existing_files() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    mkdir(&fx, "a/b/c");
    let x = fx.write("x", b"x");
    let y = fx.write("a/y", b"y");
    let z = fx.write("a/b/z", b"z");

    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    el.populate()?;

    let expected: Vec<PathBuf> = ["", "a", "a/b", "a/b/c"]
        .iter()
        .map(|rel| fx.watch_path(rel))
        .collect();
    let registered: Vec<PathBuf> = el.registered_dirs().map(Path::to_path_buf).collect();
    assert_eq!(registered, expected);

    let mut seen = el.source().registered.clone();
    seen.sort();
    assert_eq!(seen, expected);

    assert_eq!(tracker.len(), 3);
    for file in [&x, &y, &z] {
        assert!(tracker.is_tracked(file), "{file:?} not seeded");
    }
    tracker.close();
    Ok(())
}

#[tokio::test]
async fn excluded_directories_are_not_descended() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    fx.write("skip/inner/deep.txt", b"d");
    fx.write("skip.log", b"l");
    let kept = fx.write("keep/file.txt", b"k");

    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::default(), Some(r"/skip(/|\.|$)"));
    el.populate()?;

    assert!(el.is_registered(&fx.watch_path("keep")));
    assert!(!el.is_registered(&fx.watch_path("skip")));
    assert!(!el.is_registered(&fx.watch_path("skip/inner")));
    assert_eq!(tracker.len(), 1);
    assert!(tracker.is_tracked(&kept));

    // Later events under the excluded tree are ignored too.
    let late = fx.write("skip/inner/late.txt", b"x");
    el.handle(&late, Operation::Create)?;
    el.handle(&fx.watch_path("skip"), Operation::Create)?;
    assert_eq!(tracker.len(), 1);
    assert!(!el.is_registered(&fx.watch_path("skip")));

    tracker.close();
    Ok(())
}

#[tokio::test]
async fn directory_removal_unregisters_subtree_and_forgets_files() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    let gone = fx.write("a/b/gone.txt", b"g");
    let stays = fx.write("other/stays.txt", b"s");
    let sibling = fx.write("ab/sibling.txt", b"s");

    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    el.populate()?;
    assert_eq!(tracker.len(), 3);

    let a = fx.watch_path("a");
    fs::remove_dir_all(&a)?;
    el.handle(&a, Operation::Remove)?;

    assert_eq!(
        el.source().unregistered,
        vec![fx.watch_path("a/b"), fx.watch_path("a")]
    );
    assert!(!el.is_registered(&a));
    assert!(!el.is_registered(&fx.watch_path("a/b")));
    assert!(el.is_registered(&fx.watch_path("ab")));
    assert!(el.is_registered(&fx.watch_path("other")));

    assert!(!tracker.is_tracked(&gone));
    assert!(tracker.is_tracked(&stays));
    assert!(tracker.is_tracked(&sibling));

    tracker.close();
    Ok(())
}

#[tokio::test]
async fn file_events_drive_the_tracker() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    el.populate()?;
    assert!(tracker.is_empty());

    let file = fx.write("new.bin", b"1");
    el.handle_event(Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone()))?;
    assert!(tracker.is_tracked(&file));

    el.handle_event(
        Event::new(EventKind::Modify(ModifyKind::Metadata(
            notify::event::MetadataKind::Permissions,
        )))
        .add_path(file.clone()),
    )?;
    assert!(tracker.is_tracked(&file));

    fs::remove_file(&file)?;
    el.handle_event(Event::new(EventKind::Remove(RemoveKind::File)).add_path(file.clone()))?;
    assert!(!tracker.is_tracked(&file));

    // Renamed in: the destination is new activity, the source is gone.
    let from = fx.write("draft.txt", b"d");
    el.handle(&from, Operation::Create)?;
    let to = fx.watch_path("final.txt");
    fs::rename(&from, &to)?;
    el.handle_event(
        Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(to.clone()),
    )?;
    assert!(!tracker.is_tracked(&from));
    assert!(tracker.is_tracked(&to));

    tracker.close();
    Ok(())
}

#[tokio::test]
async fn new_directory_is_walked() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    el.populate()?;

    // Files written before the directory's own watch was in place.
    let inner = fx.write("drop/sub/early.txt", b"e");
    let dir = fx.watch_path("drop");
    el.handle_event(Event::new(EventKind::Create(CreateKind::Folder)).add_path(dir.clone()))?;

    assert!(el.is_registered(&dir));
    assert!(el.is_registered(&fx.watch_path("drop/sub")));
    assert!(tracker.is_tracked(&inner));

    tracker.close();
    Ok(())
}

#[tokio::test]
async fn registration_failure_is_fatal() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    let bad = mkdir(&fx, "bad");

    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::failing(bad.clone()), None);
    let err = el.populate().unwrap_err();
    assert!(matches!(err, SettledError::WatchError { ref path, .. } if *path == bad));

    // The same failure at runtime surfaces from `handle`.
    let fx = Fixture::new();
    let later = fx.watch_path("later");
    let (mut el, _tracker, _rx) = event_loop(&fx, FakeSource::failing(later.clone()), None);
    el.populate()?;
    fs::create_dir(&later)?;
    assert!(el.handle(&later, Operation::Create).is_err());

    tracker.close();
    Ok(())
}

#[tokio::test]
async fn vanished_directory_is_skipped() -> TestResult {
    init_tracing();
    let fx = Fixture::new();
    fx.write("ephemeral/f.txt", b"f");
    let kept = fx.write("kept/f.txt", b"k");

    let source = FakeSource {
        vanish: vec![fx.watch_path("ephemeral")],
        ..FakeSource::default()
    };
    let (mut el, tracker, _rx) = event_loop(&fx, source, None);
    el.populate()?;

    assert!(!el.is_registered(&fx.watch_path("ephemeral")));
    assert!(el.is_registered(&fx.watch_path("kept")));
    assert!(tracker.is_tracked(&kept));

    tracker.close();
    Ok(())
}

#[tokio::test]
async fn run_stops_on_request_and_fails_when_events_end() -> TestResult {
    init_tracing();
    let fx = Fixture::new();

    let (el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let handle = WatcherHandle::spawn(el, events_rx);

    let file = fx.write("via-channel.txt", b"c");
    events_tx.send(Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone())))?;
    assert!(common::eventually(Duration::from_secs(2), || tracker.is_tracked(&file)).await);

    handle.stop().await?;
    tracker.close();

    let (el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    let (events_tx, events_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let (_stop_tx, stop_rx) = oneshot::channel();
    drop(events_tx);
    assert!(el.run(events_rx, stop_rx).await.is_err());

    let (el, _, _rx) = event_loop(&fx, FakeSource::default(), None);
    let (events_tx, events_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut handle = WatcherHandle::spawn(el, events_rx);
    events_tx.send(Err(notify::Error::generic("transient")))?;
    drop(events_tx);
    let closed = common::with_timeout(Duration::from_secs(2), handle.closed()).await;
    assert!(closed.is_err());

    tracker.close();
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_are_files_at_startup_and_at_runtime() -> TestResult {
    use std::os::unix::fs::symlink;

    init_tracing();
    let fx = Fixture::new();
    let outside = fx.staging_parent.with_file_name("outside");
    fs::create_dir_all(outside.join("tree"))?;
    fs::write(outside.join("target.txt"), b"t")?;
    fs::write(outside.join("tree/inner.txt"), b"i")?;

    let file_link = fx.watch_path("file-link");
    let dir_link = fx.watch_path("dir-link");
    symlink(outside.join("target.txt"), &file_link)?;
    symlink(outside.join("tree"), &dir_link)?;

    let (mut el, tracker, _rx) = event_loop(&fx, FakeSource::default(), None);
    el.populate()?;

    assert!(tracker.is_tracked(&file_link));
    assert!(tracker.is_tracked(&dir_link));
    assert!(!el.is_registered(&dir_link));
    assert!(!tracker.is_tracked(&dir_link.join("inner.txt")));
    assert_eq!(el.source().registered, vec![fx.watch_dir.clone()]);

    // Links created while running get the same treatment.
    let late_file = fx.watch_path("late-file-link");
    let late_dir = fx.watch_path("late-dir-link");
    symlink(outside.join("target.txt"), &late_file)?;
    symlink(outside.join("tree"), &late_dir)?;
    el.handle_event(Event::new(EventKind::Create(CreateKind::Any)).add_path(late_file.clone()))?;
    el.handle_event(Event::new(EventKind::Create(CreateKind::Any)).add_path(late_dir.clone()))?;

    assert!(tracker.is_tracked(&late_file));
    assert!(tracker.is_tracked(&late_dir));
    assert!(!el.is_registered(&late_dir));
    assert_eq!(el.source().registered, vec![fx.watch_dir.clone()]);
    assert_eq!(tracker.len(), 4);

    tracker.close();
    Ok(())
}
