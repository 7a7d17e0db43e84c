//! Filesystem watching and reload fan-out.
//!
//! Two pieces cooperate here. [`ReloadHub`] owns one broadcast channel per
//! topic (a root-relative file path); WebSocket sessions subscribe to
//! topics and notify callbacks publish into them. [`WatchRegistry`] owns
//! one non-recursive filesystem watcher per watched file and keeps it
//! alive across requests; [`WatchRegistry::ensure`] is idempotent, so the
//! serving layer calls it for every dependency of every response without
//! bookkeeping.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use path_clean::PathClean;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Per-topic channel capacity. Reload signals are tiny and a lagging
/// browser only needs the latest one.
const CHANNEL_CAPACITY: usize = 16;

/// One change notification delivered to subscribed browsers.
#[derive(Clone, Debug, Serialize)]
pub struct ReloadSignal {
    /// Event kind: "update" or "remove".
    pub kind: &'static str,
    /// Topic the change applies to.
    pub path: String,
}

/// Topic string for a file under the server root: root-relative and `/`
/// separated, no leading slash (`src/app.ts`). Files outside the root keep
/// their absolute path as the topic.
pub fn topic_for(root: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    relative.trim_start_matches('/').to_string()
}

/// Pub/sub fan-out from filesystem events to WebSocket sessions.
///
/// Channels are created lazily on first use from either side, so a browser
/// can subscribe before the first change event and a watcher can publish
/// before the first subscriber (the signal is simply dropped).
#[derive(Default)]
pub struct ReloadHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ReloadSignal>>>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<ReloadSignal> {
        self.sender(topic).subscribe()
    }

    /// Publish a signal, returning how many sessions received it.
    pub fn publish(&self, topic: &str, signal: ReloadSignal) -> usize {
        let sender = {
            let channels = self.channels.lock();
            channels.get(topic).cloned()
        };
        match sender {
            Some(sender) => sender.send(signal).unwrap_or(0),
            None => 0,
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<ReloadSignal> {
        let mut channels = self.channels.lock();
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

struct WatchEntry {
    // Held to keep the watcher thread alive; dropping stops the watch.
    _watcher: RecommendedWatcher,
    last_touch: Instant,
}

/// Registry of per-file filesystem watchers.
///
/// All mutation happens under one mutex; watcher callbacks never touch the
/// map, they only publish into the hub.
pub struct WatchRegistry {
    hub: Arc<ReloadHub>,
    root: PathBuf,
    entries: Mutex<HashMap<PathBuf, WatchEntry>>,
}

impl WatchRegistry {
    pub fn new(hub: Arc<ReloadHub>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root).clean();
        Self {
            hub,
            root,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure `path` is being watched, creating the watcher on first call.
    /// Refreshes the idle timestamp either way.
    ///
    /// The path is normalized against the root first, so every spelling of
    /// a file (relative, absolute, with `..` segments) shares one entry and
    /// one topic.
    pub fn ensure(&self, path: &Path) {
        let path = self.normalize(path);
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&path) {
            entry.last_touch = Instant::now();
            return;
        }

        match self.spawn_watcher(&path) {
            Ok(watcher) => {
                debug!(path = %path.display(), "watching file");
                entries.insert(
                    path,
                    WatchEntry {
                        _watcher: watcher,
                        last_touch: Instant::now(),
                    },
                );
            }
            Err(e) => {
                // A file that cannot be watched still gets served; the
                // browser just won't auto-reload for it.
                warn!(path = %path.display(), error = %e, "failed to watch file");
            }
        }
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.root.join(path).clean()
        }
    }

    /// Drop watchers idle for longer than `max_idle`. Returns how many
    /// were removed.
    pub fn reap(&self, max_idle: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|path, entry| {
            let keep = entry.last_touch.elapsed() <= max_idle;
            if !keep {
                debug!(path = %path.display(), "evicting idle watcher");
            }
            keep
        });
        before - entries.len()
    }

    pub fn watched_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn spawn_watcher(&self, path: &Path) -> notify::Result<RecommendedWatcher> {
        let hub = Arc::clone(&self.hub);
        let topic = topic_for(&self.root, path);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "watch event error");
                    return;
                }
            };
            let kind = match event.kind {
                notify::EventKind::Remove(_) => "remove",
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) => "update",
                _ => return,
            };
            let delivered = hub.publish(
                &topic,
                ReloadSignal {
                    kind,
                    path: topic.clone(),
                },
            );
            debug!(topic = %topic, kind, delivered, "published reload signal");
        })?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}
