use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::sync::Arc;
use crate::snapshot::{ReloadOutcome, SharedDataset};
use crate::{Error, Result};

/// Reloads a shared dataset whenever its source file changes
pub struct Watcher {
    dataset: Arc<SharedDataset>,
}

impl Watcher {
    pub fn new(dataset: Arc<SharedDataset>) -> Self {
        Self { dataset }
    }

    /// Block, reloading on every change, until the watch channel closes.
    ///
    /// `on_reload` runs after each published snapshot.
    pub fn run<F>(&self, mut on_reload: F) -> Result<()>
    where
        F: FnMut(&SharedDataset),
    {
        let path: PathBuf = self
            .dataset
            .source()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| Error::Dataset("dataset has no source file to watch".to_string()))?;

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        // Editors often replace the file, so watch its directory
        let target = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        watcher.watch(&target, RecursiveMode::NonRecursive)?;

        tracing::info!("Watching {} for changes", path.display());

        for res in rx {
            match res {
                Ok(event) => {
                    if self.is_relevant(&event, &path) && self.reload() {
                        on_reload(self.dataset.as_ref());
                    }
                }
                Err(e) => tracing::warn!("watch error: {:?}", e),
            }
        }

        Ok(())
    }

    fn is_relevant(&self, event: &notify::Event, path: &std::path::Path) -> bool {
        use notify::EventKind;
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            && event.paths.iter().any(|p| p.file_name() == path.file_name())
    }

    /// Returns true when a new snapshot was published
    fn reload(&self) -> bool {
        match self.dataset.reload() {
            Ok(ReloadOutcome::Replaced) => true,
            Ok(ReloadOutcome::Unchanged) => false,
            Err(e) => {
                tracing::error!("Reload failed, keeping previous snapshot: {}", e);
                false
            }
        }
    }
}
