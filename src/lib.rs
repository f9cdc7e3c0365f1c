//! # atlas-kb - Relationship resolver for threat knowledge bases
//!
//! Loads a typed, cross-referencing record set (tactics, techniques,
//! sub-techniques, mitigations, case studies) and answers relationship
//! queries over it.
//!
//! atlas-kb provides:
//! - An immutable `RecordIndex` with id, type and predicate lookups
//! - A `Resolver` computing outbound, inbound and derived relationships
//! - A dataset loader for YAML/JSON documents with route annotation
//! - A swappable `SharedDataset` snapshot and a file watcher for reloads

pub mod record;
pub mod relation;
pub mod index;
pub mod resolver;
pub mod dataset;
pub mod snapshot;
pub mod watcher;
pub mod output;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use record::{ProcedureStep, Record};
pub use relation::{RelationGroup, RelationMap};
pub use index::{Match, RecordIndex};
pub use resolver::{Resolver, ResolverOptions};
pub use dataset::RawDataset;
pub use snapshot::SharedDataset;

/// Result type alias for atlas-kb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for atlas-kb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("Label '{label}' produced by both outbound and inbound relationships of {id}")]
    LabelCollision { id: String, label: String },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
