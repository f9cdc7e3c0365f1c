//! Dataset loading
//!
//! Turns a knowledge base document into the raw grouped shape
//! `{ id, name, version, objects: { <group>: [record, ...] } }` and from
//! there into a `RecordIndex`.
//!
//! Two document layouts are accepted:
//! - groups at the top level next to `id`/`name`/`version` (the published
//!   ATLAS layout)
//! - groups nested under an `objects` mapping

use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::index::RecordIndex;
use crate::record::{Record, ROUTE};
use crate::{Error, Result};

const METADATA_KEYS: [&str; 3] = ["id", "name", "version"];
const OBJECTS_KEY: &str = "objects";

/// Top-level dataset metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl std::fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.name.as_deref().or(self.id.as_deref()).unwrap_or("unnamed dataset"),
            self.version.as_deref().unwrap_or("(unversioned)")
        )
    }
}

/// Serialization of a dataset document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON; anything else is read as YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Raw grouped records as found in the document
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub info: DatasetInfo,
    /// Type groups in document order
    pub objects: Vec<(String, Vec<Value>)>,
}

impl RawDataset {
    /// Parse document text in the given format
    pub fn parse(contents: &str, format: DocumentFormat) -> Result<Self> {
        let value: Value = match format {
            DocumentFormat::Yaml => serde_yaml::from_str(contents)?,
            DocumentFormat::Json => serde_json::from_str(contents)?,
        };
        Self::from_value(value)
    }

    /// Split a parsed document into metadata and type groups
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut top) = value else {
            return Err(Error::Dataset("document root is not a mapping".to_string()));
        };

        let info = DatasetInfo {
            id: top.get("id").and_then(scalar_string),
            name: top.get("name").and_then(scalar_string),
            version: top.get("version").and_then(scalar_string),
        };

        let groups: Map<String, Value> = match top.remove(OBJECTS_KEY) {
            Some(Value::Object(nested)) => nested,
            Some(_) => {
                return Err(Error::Dataset("'objects' is not a mapping".to_string()));
            }
            None => top,
        };

        let mut objects = Vec::new();
        for (group, value) in groups {
            if METADATA_KEYS.contains(&group.as_str()) {
                continue;
            }
            match value {
                Value::Array(records) => objects.push((group, records)),
                Value::Null => objects.push((group, Vec::new())),
                _ => tracing::debug!("Ignoring top-level key '{}': not a record list", group),
            }
        }

        Ok(Self { info, objects })
    }

    /// Stamp every record with a display route `/<group>/<id>`.
    ///
    /// Records that already carry a route keep it.
    pub fn annotate_routes(&mut self) {
        for (group, records) in &mut self.objects {
            for record in records.iter_mut() {
                let Value::Object(attributes) = record else {
                    continue;
                };
                if attributes.contains_key(ROUTE) {
                    continue;
                }
                if let Some(id) = attributes.get("id").and_then(Value::as_str) {
                    let route = route_for(group, id);
                    attributes.insert(ROUTE.to_string(), Value::String(route));
                }
            }
        }
    }

    /// Number of raw records across all groups
    pub fn len(&self) -> usize {
        self.objects.iter().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the immutable index.
    ///
    /// Entries that cannot be records (not a mapping, no `id` or
    /// `object-type`) are skipped with a warning.
    pub fn into_index(self) -> RecordIndex {
        let groups = self.objects.into_iter().map(|(group, values)| {
            let records: Vec<Record> = values
                .into_iter()
                .enumerate()
                .filter_map(|(i, value)| match Record::from_value(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!("Skipping entry {} of '{}': {}", i, group, e);
                        None
                    }
                })
                .collect();
            (group, records)
        });

        RecordIndex::from_groups(groups.collect::<Vec<_>>()).with_info(self.info)
    }
}

/// Display route for a record in a type group
pub fn route_for(group: &str, id: &str) -> String {
    format!("/{}/{}", group, id)
}

/// Load, annotate and index a dataset file
pub fn load_index(path: &Path) -> Result<RecordIndex> {
    let contents = std::fs::read_to_string(path)?;
    index_from_str(&contents, DocumentFormat::from_path(path))
}

/// Parse, annotate and index document text
pub fn index_from_str(contents: &str, format: DocumentFormat) -> Result<RecordIndex> {
    let mut raw = RawDataset::parse(contents, format)?;
    raw.annotate_routes();
    let count = raw.len();
    let index = raw.into_index();
    tracing::info!("Loaded {} ({} of {} records indexed)", index.info(), index.len(), count);
    Ok(index)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Match;
    use std::io::Write;

    const SAMPLE_YAML: &str = r#"
id: ATLAS
name: Adversarial Threat Landscape for AI Systems
version: 4.4.1
tactics:
  - id: AML.TA0002
    object-type: tactic
    name: Reconnaissance
    description: The adversary is trying to gather information.
techniques:
  - id: AML.T0000
    object-type: technique
    name: Search for Victim's Publicly Available Research Materials
    tactics:
      - AML.TA0002
  - id: AML.T0000.000
    object-type: technique
    name: Journals and Conference Proceedings
    subtechnique-of: AML.T0000
  - name: missing identity
case-studies:
  - id: AML.CS0000
    object-type: case-study
    name: Evasion of Deep Learning Detector for Malware C&C Traffic
    procedure:
      - tactic: AML.TA0002
        technique: AML.T0000.000
        description: The team identified research papers.
mitigations: []
"#;

    #[test]
    fn test_parse_yaml_document() {
        let raw = RawDataset::parse(SAMPLE_YAML, DocumentFormat::Yaml).unwrap();
        assert_eq!(raw.info.id.as_deref(), Some("ATLAS"));
        assert_eq!(raw.info.version.as_deref(), Some("4.4.1"));

        let groups: Vec<_> = raw.objects.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(groups, vec!["tactics", "techniques", "case-studies", "mitigations"]);
        assert_eq!(raw.len(), 5);
    }

    #[test]
    fn test_index_skips_malformed_entries_and_stamps_routes() {
        let index = index_from_str(SAMPLE_YAML, DocumentFormat::Yaml).unwrap();
        assert_eq!(index.len(), 4);
        assert!(index.records_by_type("mitigations").unwrap().is_empty());

        let technique = index.record_by_id("AML.T0000").unwrap();
        assert_eq!(technique.route(), Some("/techniques/AML.T0000"));

        let subs = index
            .records_matching("techniques", "subtechnique-of", Match::Equals("AML.T0000"))
            .unwrap();
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn test_existing_route_is_kept() {
        let doc = r#"{"tactics": [{"id": "TA1", "object-type": "tactic", "route": "/custom"}]}"#;
        let index = index_from_str(doc, DocumentFormat::Json).unwrap();
        assert_eq!(index.record_by_id("TA1").unwrap().route(), Some("/custom"));
    }

    #[test]
    fn test_nested_objects_layout() {
        let doc = r#"{"id": "KB", "version": 2, "objects": {"tactics": [{"id": "TA1", "object-type": "tactic"}]}}"#;
        let raw = RawDataset::parse(doc, DocumentFormat::Json).unwrap();
        assert_eq!(raw.info.version.as_deref(), Some("2"));
        assert_eq!(raw.objects.len(), 1);
    }

    #[test]
    fn test_empty_document() {
        let index = index_from_str("{}", DocumentFormat::Json).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_rejects_non_mapping_root() {
        assert!(matches!(
            RawDataset::parse("- a\n- b\n", DocumentFormat::Yaml),
            Err(Error::Dataset(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let index = load_index(file.path()).unwrap();
        assert_eq!(index.info().name.as_deref(), Some("Adversarial Threat Landscape for AI Systems"));
        assert_eq!(DocumentFormat::from_path(Path::new("atlas.JSON")), DocumentFormat::Json);
    }
}
