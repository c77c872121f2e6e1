//! Watch mode: file-system events, debounced per path, each triggering one
//! validate-and-record cycle.
//!
//! Cycles run one at a time on the calling thread. A path's debounce timer
//! restarts on every new event, so a path is never processed while an
//! earlier cycle for it is pending.

use crate::engine::{Engine, WatchOutcome};
use crate::error::{PdocsError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocEvent {
    /// Created or modified.
    Changed(PathBuf),
    Removed(PathBuf),
}

impl DocEvent {
    pub fn path(&self) -> &Path {
        match self {
            DocEvent::Changed(p) | DocEvent::Removed(p) => p,
        }
    }
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

pub struct DocWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<DocEvent>,
}

impl DocWatcher {
    pub fn start(paths: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "watch error");
                    return;
                }
            };
            for path in &event.paths {
                let doc_event = match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => DocEvent::Changed(path.clone()),
                    EventKind::Remove(_) => DocEvent::Removed(path.clone()),
                    _ => continue,
                };
                let _ = tx.send(doc_event);
            }
        })
        .map_err(|e| PdocsError::Watch(e.to_string()))?;

        for path in paths {
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| PdocsError::Watch(format!("{}: {e}", path.display())))?;
        }

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<DocEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Collapses bursts of events per path into one, released once the path has
/// been quiet for `delay`. The latest event for a path wins.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<PathBuf, (Instant, DocEvent)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn push(&mut self, event: DocEvent, now: Instant) {
        self.pending
            .insert(event.path().to_path_buf(), (now + self.delay, event));
    }

    /// Events whose quiet period has elapsed, in path order.
    pub fn due(&mut self, now: Instant) -> Vec<DocEvent> {
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(p, _)| p.clone())
            .collect();
        let mut out: Vec<DocEvent> = ready
            .into_iter()
            .filter_map(|p| self.pending.remove(&p).map(|(_, e)| e))
            .collect();
        out.sort_by(|a, b| a.path().cmp(b.path()));
        out
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(d, _)| *d).min()
    }

}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Run one cycle for `event`. The file's presence at processing time decides
/// between revalidation and removal, so editor save-by-rename works.
pub fn process(engine: &Engine, event: &DocEvent) -> Result<WatchOutcome> {
    let path = event.path();
    if path.is_file() {
        engine.on_changed(path)
    } else {
        engine.on_removed(path)
    }
}

/// Watch `paths` until `keep_going` returns false, handing each cycle's
/// outcome to `on_outcome`. Failed cycles are logged and skipped.
pub fn run(
    engine: &Engine,
    paths: &[PathBuf],
    mut on_outcome: impl FnMut(&WatchOutcome),
    keep_going: impl Fn() -> bool,
) -> Result<()> {
    let watcher = DocWatcher::start(paths)?;
    let mut debouncer = Debouncer::new(engine.config().watch.debounce());
    tracing::info!(paths = ?paths, "watching for document changes");

    while keep_going() {
        let timeout = debouncer
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL)
            .min(IDLE_POLL);
        if let Some(event) = watcher.recv_timeout(timeout) {
            if engine.watches(event.path()) {
                debouncer.push(event, Instant::now());
            }
        }
        for event in debouncer.due(Instant::now()) {
            match process(engine, &event) {
                Ok(WatchOutcome::Ignored { .. }) => {}
                Ok(outcome) => {
                    tracing::info!(path = %event.path().display(), "registry updated");
                    on_outcome(&outcome);
                }
                Err(e) => tracing::warn!(path = %event.path().display(), error = %e, "watch cycle failed"),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
