//! Fragment-shader hot reload.
//!
//! We watch the shader's **directory** (not the file) because editors often save with
//! write temp → rename → delete old. Events are filtered down to the one file we care about
//! and forwarded as signals; the render thread re-reads and recompiles.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use shaderfx_engine::logw;

pub struct HotReload {
    _watcher: RecommendedWatcher,
    rx: Receiver<()>,
}

impl HotReload {
    pub fn new(frag_path: &Path) -> anyhow::Result<Self> {
        let (tx, rx) = unbounded::<()>();
        let file_name = frag_path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(ev) => {
                    if !is_content_change(&ev.kind) {
                        return;
                    }
                    let hit = ev
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if hit {
                        let _ = tx.send(());
                    }
                }
                Err(e) => logw!("WATCH", "notify error: {e}"),
            },
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )?;

        let parent = frag_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        Ok(Self { _watcher: watcher, rx })
    }

    /// Drain pending signals; true if the shader changed at least once since the last call.
    pub fn changed(&self) -> bool {
        self.rx.try_iter().count() > 0
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_))
}
