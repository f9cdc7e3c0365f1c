//! Shared dataset snapshot
//!
//! Readers take an `Arc<RecordIndex>` and query it without further locking.
//! A reload builds a complete new index first and only then swaps the
//! pointer, so a published index is never mutated.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use crate::dataset::{self, DocumentFormat};
use crate::index::RecordIndex;
use crate::Result;

/// Outcome of a reload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new index was published
    Replaced,
    /// The source content hash matched the current snapshot
    Unchanged,
}

/// Swappable handle to the current record index
#[derive(Debug)]
pub struct SharedDataset {
    source: Option<PathBuf>,
    current: RwLock<Snapshot>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    index: Arc<RecordIndex>,
    digest: Option<String>,
}

impl SharedDataset {
    /// Wrap an already built index with no backing file
    pub fn new(index: RecordIndex) -> Self {
        Self {
            source: None,
            current: RwLock::new(Snapshot {
                index: Arc::new(index),
                digest: None,
            }),
        }
    }

    /// Load a dataset file and remember it as the reload source
    pub fn open(path: &Path) -> Result<Self> {
        let (index, digest) = read_index(path)?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            current: RwLock::new(Snapshot {
                index: Arc::new(index),
                digest: Some(digest),
            }),
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The index currently published
    pub fn snapshot(&self) -> Arc<RecordIndex> {
        self.read().index
    }

    /// Publish a new index unconditionally
    pub fn replace(&self, index: RecordIndex) {
        self.publish(Snapshot {
            index: Arc::new(index),
            digest: None,
        });
    }

    /// Re-read the source file and publish it if its content changed.
    ///
    /// On error the current snapshot stays published.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        let Some(path) = self.source.as_deref() else {
            return Ok(ReloadOutcome::Unchanged);
        };

        let contents = std::fs::read_to_string(path)?;
        let digest = blake3::hash(contents.as_bytes()).to_string();
        if self.read().digest.as_deref() == Some(digest.as_str()) {
            tracing::debug!("Dataset {} unchanged; keeping snapshot", path.display());
            return Ok(ReloadOutcome::Unchanged);
        }

        let index = dataset::index_from_str(&contents, DocumentFormat::from_path(path))?;
        tracing::info!("Reloaded {} ({} records)", path.display(), index.len());
        self.publish(Snapshot {
            index: Arc::new(index),
            digest: Some(digest),
        });
        Ok(ReloadOutcome::Replaced)
    }

    fn read(&self) -> Snapshot {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, snapshot: Snapshot) {
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

fn read_index(path: &Path) -> Result<(RecordIndex, String)> {
    let contents = std::fs::read_to_string(path)?;
    let digest = blake3::hash(contents.as_bytes()).to_string();
    let index = dataset::index_from_str(&contents, DocumentFormat::from_path(path))?;
    Ok((index, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{kinds, Record};

    const V1: &str = r#"{"tactics": [{"id": "TA1", "object-type": "tactic", "name": "Recon"}]}"#;
    const V2: &str = r#"{"tactics": [{"id": "TA1", "object-type": "tactic", "name": "Recon"},
                                      {"id": "TA2", "object-type": "tactic", "name": "Dev"}]}"#;

    #[test]
    fn test_reload_swaps_only_on_change() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        std::fs::write(file.path(), V1).unwrap();

        let shared = SharedDataset::open(file.path()).unwrap();
        let before = shared.snapshot();
        assert_eq!(before.len(), 1);

        assert_eq!(shared.reload().unwrap(), ReloadOutcome::Unchanged);
        assert!(Arc::ptr_eq(&before, &shared.snapshot()));

        std::fs::write(file.path(), V2).unwrap();
        assert_eq!(shared.reload().unwrap(), ReloadOutcome::Replaced);

        // Readers holding the old snapshot keep seeing it unchanged
        assert_eq!(before.len(), 1);
        assert_eq!(shared.snapshot().len(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        std::fs::write(file.path(), V1).unwrap();
        let shared = SharedDataset::open(file.path()).unwrap();

        std::fs::write(file.path(), "{ not json").unwrap();
        assert!(shared.reload().is_err());
        assert_eq!(shared.snapshot().len(), 1);
    }

    #[test]
    fn test_replace_without_source() {
        let shared = SharedDataset::new(RecordIndex::new());
        assert!(shared.snapshot().is_empty());
        assert_eq!(shared.reload().unwrap(), ReloadOutcome::Unchanged);

        shared.replace(RecordIndex::from_groups(vec![(
            "tactics".to_string(),
            vec![Record::new("TA1", kinds::TACTIC, "Recon")],
        )]));
        assert_eq!(shared.snapshot().len(), 1);
    }
}
