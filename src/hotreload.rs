//! Source watcher
//!
//! Stands in for the editor: it watches the **directories** holding the vertex shader, the
//! fragment shader, the model and `sandbox.json`, because saving is usually
//! write temp → rename over the original, which only shows up on the parent.
//!
//! Events are classified by file name and sent to the render thread, which re-reads the file
//! and pushes the new text through `update_source` / `load_model`. No file I/O or GL work
//! happens on the notify thread.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HotEvent {
    VertexChanged,
    FragmentChanged,
    ModelChanged,
    ConfigChanged,
}

/// What one drained batch asks the render thread to do.
///
/// Config is applied first since it may move the shader or model paths; a vertex and a
/// fragment save in the same batch become a single recompile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    pub reload_config: bool,
    pub recompile: bool,
    pub reload_model: bool,
}

impl ReloadPlan {
    pub fn from_events(events: impl IntoIterator<Item = HotEvent>) -> Self {
        let mut plan = Self::default();
        for ev in events {
            match ev {
                HotEvent::VertexChanged | HotEvent::FragmentChanged => plan.recompile = true,
                HotEvent::ModelChanged => plan.reload_model = true,
                HotEvent::ConfigChanged => plan.reload_config = true,
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The files a running sandbox cares about.
#[derive(Debug, Clone, Default)]
pub struct WatchTargets {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl WatchTargets {
    /// Which target `path` refers to, if any.
    pub fn classify(&self, path: &Path) -> Option<HotEvent> {
        let pairs = [
            (&self.vertex, HotEvent::VertexChanged),
            (&self.fragment, HotEvent::FragmentChanged),
            (&self.model, HotEvent::ModelChanged),
            (&self.config, HotEvent::ConfigChanged),
        ];
        pairs
            .into_iter()
            .find(|(target, _)| target.as_deref().is_some_and(|t| same_file(t, path)))
            .map(|(_, ev)| ev)
    }

    fn directories(&self) -> BTreeSet<PathBuf> {
        [&self.vertex, &self.fragment, &self.model, &self.config]
            .into_iter()
            .flatten()
            .map(|f| parent_dir(f))
            .collect()
    }
}

// notify reports absolute paths; targets may be relative or go through symlinks.
fn same_file(target: &Path, seen: &Path) -> bool {
    if target.file_name() != seen.file_name() {
        return false;
    }
    match (parent_dir(target).canonicalize(), parent_dir(seen).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => true,
    }
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub struct HotReload {
    _watcher: RecommendedWatcher,
    rx: Receiver<HotEvent>,
}

impl HotReload {
    pub fn new(targets: WatchTargets) -> anyhow::Result<Self> {
        let (tx, rx) = unbounded::<HotEvent>();
        let dirs = targets.directories();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(ev) = res else {
                    return;
                };
                if !matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                for p in &ev.paths {
                    if let Some(hit) = targets.classify(p) {
                        let _ = tx.send(hit);
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )?;

        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        Ok(Self { _watcher: watcher, rx })
    }

    /// Everything pending, each kind once, in a stable order.
    pub fn drain(&self) -> BTreeSet<HotEvent> {
        self.rx.try_iter().collect()
    }
}
