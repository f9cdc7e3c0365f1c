//! Record Index - immutable lookup structure over a loaded record set
//!
//! Built in a single pass when a dataset is loaded. Besides id and type
//! lookups it precomputes the reverse mappings the resolver needs, so inbound
//! queries never rescan the whole set.

use std::collections::{HashMap, HashSet};
use serde_json::Value;
use crate::dataset::DatasetInfo;
use crate::record::{kinds, Record};
use crate::{Error, Result};

/// Attribute predicate for `records_matching`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match<'v> {
    /// Attribute is a string equal to the value
    Equals(&'v str),
    /// Attribute is a string containing the value, or a sequence holding it
    Contains(&'v str),
}

impl Match<'_> {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Match::Equals(expected), Value::String(s)) => s.as_str() == *expected,
            (Match::Contains(needle), Value::String(s)) => s.contains(*needle),
            (Match::Contains(needle), Value::Array(items)) => {
                items.iter().any(|item| item.as_str() == Some(*needle))
            }
            _ => false,
        }
    }
}

/// Immutable, indexed record set.
///
/// Safe to share across threads; nothing here is mutated after
/// construction. Reloading means building a new index.
#[derive(Debug, Default)]
pub struct RecordIndex {
    info: DatasetInfo,
    /// All records, type-group order then insertion order
    records: Vec<Record>,
    /// Type group name → record positions
    groups: Vec<(String, Vec<usize>)>,
    /// id → record position (first occurrence wins)
    by_id: HashMap<String, usize>,
    /// object-type → record positions
    by_kind: HashMap<String, Vec<usize>>,
    /// id → positions of records mentioning it among their attribute values
    referrers: HashMap<String, Vec<usize>>,
    /// parent technique id → positions of its sub-techniques
    subtechniques: HashMap<String, Vec<usize>>,
    /// step kind → target id → positions of case studies with such a step
    procedure_steps: HashMap<String, HashMap<String, Vec<usize>>>,
}

impl RecordIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from type groups in document order
    pub fn from_groups<I, R>(groups: I) -> Self
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = Record>,
    {
        let mut index = Self::new();
        for (group, records) in groups {
            index.add_group(group, records);
        }
        tracing::debug!(
            "Indexed {} records in {} type groups",
            index.records.len(),
            index.groups.len()
        );
        index
    }

    /// Attach dataset metadata
    pub fn with_info(mut self, info: DatasetInfo) -> Self {
        self.info = info;
        self
    }

    fn add_group<R: IntoIterator<Item = Record>>(&mut self, group: String, records: R) {
        let slot = match self.groups.iter().position(|(name, _)| *name == group) {
            Some(slot) => {
                tracing::warn!("Type group '{}' declared twice; merging", group);
                slot
            }
            None => {
                self.groups.push((group, Vec::new()));
                self.groups.len() - 1
            }
        };

        for record in records {
            let pos = self.records.len();
            self.index_record(pos, &record);
            self.groups[slot].1.push(pos);
            self.records.push(record);
        }
    }

    fn index_record(&mut self, pos: usize, record: &Record) {
        if self.by_id.contains_key(record.id()) {
            tracing::warn!("Duplicate record id {}; keeping first occurrence", record.id());
        } else {
            self.by_id.insert(record.id().to_string(), pos);
        }

        self.by_kind
            .entry(record.object_type().to_string())
            .or_default()
            .push(pos);

        for id in record.mentioned_ids() {
            self.referrers.entry(id.to_string()).or_default().push(pos);
        }

        if record.is_kind(kinds::TECHNIQUE) {
            if let Some(parent) = record.parent_technique() {
                self.subtechniques
                    .entry(parent.to_string())
                    .or_default()
                    .push(pos);
            }
        }

        if record.is_kind(kinds::CASE_STUDY) {
            for step in record.procedure() {
                if step.is_malformed() {
                    tracing::debug!("Case study {} has a step naming no tactic or technique", record.id());
                    continue;
                }
                for kind in [kinds::TACTIC, kinds::TECHNIQUE] {
                    if let Some(target) = step.target(kind) {
                        let studies = self
                            .procedure_steps
                            .entry(kind.to_string())
                            .or_default()
                            .entry(target.to_string())
                            .or_default();
                        if studies.last() != Some(&pos) {
                            studies.push(pos);
                        }
                    }
                }
            }
        }
    }

    /// Dataset metadata (id, name, version)
    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Every record across every type group, in stable order
    pub fn all_records(&self) -> &[Record] {
        &self.records
    }

    /// Records of a type group.
    ///
    /// An empty group yields an empty list; a group absent from the
    /// dataset is an error.
    pub fn records_by_type(&self, group: &str) -> Result<Vec<&Record>> {
        self.groups
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, positions)| self.resolve(positions))
            .ok_or_else(|| Error::UnknownType(group.to_string()))
    }

    /// Records of a type group whose attribute satisfies the predicate
    pub fn records_matching(&self, group: &str, attribute: &str, predicate: Match<'_>) -> Result<Vec<&Record>> {
        Ok(self
            .records_by_type(group)?
            .into_iter()
            .filter(|record| record.get(attribute).is_some_and(|v| predicate.matches(v)))
            .collect())
    }

    /// Get a record by its id
    pub fn record_by_id(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id).map(|&pos| &self.records[pos])
    }

    /// Records whose `object-type` equals the tag, in record order
    pub fn records_of_kind(&self, object_type: &str) -> Vec<&Record> {
        self.by_kind
            .get(object_type)
            .map(|positions| self.resolve(positions))
            .unwrap_or_default()
    }

    /// Records (other than `id` itself) whose top-level attribute values include `id`
    pub fn referrers_of(&self, id: &str) -> Vec<&Record> {
        self.referrers
            .get(id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&pos| &self.records[pos])
                    .filter(|record| record.id() != id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Technique records naming `id` as their parent
    pub fn subtechniques_of(&self, id: &str) -> Vec<&Record> {
        self.subtechniques
            .get(id)
            .map(|positions| self.resolve(positions))
            .unwrap_or_default()
    }

    /// Case studies with a procedure step whose `kind` attribute equals `id`
    pub fn studies_with_step(&self, kind: &str, id: &str) -> Vec<&Record> {
        self.procedure_steps
            .get(kind)
            .and_then(|targets| targets.get(id))
            .map(|positions| self.resolve(positions))
            .unwrap_or_default()
    }

    /// Type group names in document order
    pub fn type_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get statistics about the index
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_records: self.records.len(),
            groups: self
                .groups
                .iter()
                .map(|(name, positions)| (name.clone(), positions.len()))
                .collect(),
            subtechniques: self.subtechniques.values().map(Vec::len).sum(),
            dangling_references: self.dangling_references(),
        }
    }

    /// Identifiers named by `subtechnique-of` or procedure steps that match no record
    fn dangling_references(&self) -> usize {
        let parents = self.subtechniques.keys();
        let steps = self.procedure_steps.values().flat_map(|targets| targets.keys());
        parents
            .chain(steps)
            .map(String::as_str)
            .filter(|id| !self.by_id.contains_key(*id))
            .collect::<HashSet<_>>()
            .len()
    }

    fn resolve(&self, positions: &[usize]) -> Vec<&Record> {
        positions.iter().map(|&pos| &self.records[pos]).collect()
    }
}

/// Statistics about a record index
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub total_records: usize,
    pub groups: Vec<(String, usize)>,
    pub subtechniques: usize,
    pub dangling_references: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Record Index Statistics:")?;
        writeln!(f, "  Records: {}", self.total_records)?;
        for (name, count) in &self.groups {
            writeln!(f, "    {}: {}", name, count)?;
        }
        writeln!(f, "  Sub-techniques: {}", self.subtechniques)?;
        writeln!(f, "  Dangling derived references: {}", self.dangling_references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PROCEDURE, SUBTECHNIQUE_OF};
    use serde_json::json;

    fn sample_index() -> RecordIndex {
        let tactics = vec![
            Record::new("TA1", kinds::TACTIC, "Reconnaissance"),
            Record::new("TA2", kinds::TACTIC, "Resource Development"),
        ];
        let techniques = vec![
            Record::new("T1", kinds::TECHNIQUE, "Search Research").with_attribute("tactics", json!(["TA1"])),
            Record::new("T1.000", kinds::TECHNIQUE, "Journals")
                .with_attribute(SUBTECHNIQUE_OF, "T1")
                .with_attribute("tactics", json!(["TA1"])),
            Record::new("T2", kinds::TECHNIQUE, "Acquire Infrastructure").with_attribute("tactics", json!(["TA2"])),
        ];
        let studies = vec![Record::new("CS1", kinds::CASE_STUDY, "Evasion").with_attribute(
            PROCEDURE,
            json!([{"tactic": "TA1", "technique": "T1"}, {"description": "noise"}]),
        )];

        RecordIndex::from_groups(vec![
            ("tactics".to_string(), tactics),
            ("techniques".to_string(), techniques),
            ("case-studies".to_string(), studies),
            ("mitigations".to_string(), Vec::new()),
        ])
    }

    #[test]
    fn test_empty_index() {
        let index = RecordIndex::new();
        assert!(index.is_empty());
        assert!(index.all_records().is_empty());
        assert!(index.record_by_id("T1").is_none());
        assert!(matches!(index.records_by_type("tactics"), Err(Error::UnknownType(_))));
    }

    #[test]
    fn test_all_records_order() {
        let index = sample_index();
        let ids: Vec<_> = index.all_records().iter().map(Record::id).collect();
        assert_eq!(ids, vec!["TA1", "TA2", "T1", "T1.000", "T2", "CS1"]);
    }

    #[test]
    fn test_records_by_type() {
        let index = sample_index();
        assert_eq!(index.records_by_type("techniques").unwrap().len(), 3);
        assert!(index.records_by_type("mitigations").unwrap().is_empty());
        assert!(matches!(index.records_by_type("nope"), Err(Error::UnknownType(t)) if t == "nope"));
    }

    #[test]
    fn test_records_matching() {
        let index = sample_index();

        let exact = index
            .records_matching("techniques", SUBTECHNIQUE_OF, Match::Equals("T1"))
            .unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id(), "T1.000");

        let by_tactic = index
            .records_matching("techniques", "tactics", Match::Contains("TA1"))
            .unwrap();
        assert_eq!(by_tactic.len(), 2);

        let by_name = index
            .records_matching("techniques", "name", Match::Contains("Infra"))
            .unwrap();
        assert_eq!(by_name[0].id(), "T2");

        assert!(index
            .records_matching("tactics", "missing", Match::Equals("x"))
            .unwrap()
            .is_empty());

        assert!(matches!(
            index.records_matching("procedures", "name", Match::Equals("x")),
            Err(Error::UnknownType(t)) if t == "procedures"
        ));
    }

    #[test]
    fn test_records_of_kind_and_type_groups() {
        let index = sample_index();

        let techniques: Vec<_> = index.records_of_kind(kinds::TECHNIQUE).iter().map(|r| r.id()).collect();
        assert_eq!(techniques, vec!["T1", "T1.000", "T2"]);
        assert_eq!(index.records_of_kind(kinds::CASE_STUDY).len(), 1);
        assert!(index.records_of_kind(kinds::MITIGATION).is_empty());

        let groups: Vec<_> = index.type_groups().collect();
        assert_eq!(groups, vec!["tactics", "techniques", "case-studies", "mitigations"]);
    }

    #[test]
    fn test_reverse_indices() {
        let index = sample_index();

        let referrers: Vec<_> = index.referrers_of("TA1").iter().map(|r| r.id()).collect();
        assert_eq!(referrers, vec!["T1", "T1.000"]);
        assert!(index.referrers_of("T1").iter().any(|r| r.id() == "T1.000"));
        assert!(!index.referrers_of("T1").iter().any(|r| r.id() == "T1"));

        let subs: Vec<_> = index.subtechniques_of("T1").iter().map(|r| r.id()).collect();
        assert_eq!(subs, vec!["T1.000"]);

        assert_eq!(index.studies_with_step(kinds::TACTIC, "TA1").len(), 1);
        assert_eq!(index.studies_with_step(kinds::TECHNIQUE, "T1").len(), 1);
        assert!(index.studies_with_step(kinds::TACTIC, "T1").is_empty());
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let index = RecordIndex::from_groups(vec![
            ("tactics".to_string(), vec![Record::new("X", kinds::TACTIC, "first")]),
            ("techniques".to_string(), vec![Record::new("X", kinds::TECHNIQUE, "second")]),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.record_by_id("X").unwrap().name(), Some("first"));
    }

    #[test]
    fn test_stats() {
        let index = sample_index();
        let stats = index.stats();
        assert_eq!(stats.total_records, 6);
        assert_eq!(stats.subtechniques, 1);
        assert_eq!(stats.dangling_references, 0);
        assert!(stats.to_string().contains("techniques: 3"));
    }

    #[test]
    fn test_dangling_ids_counted_once() {
        let index = RecordIndex::from_groups(vec![
            (
                "techniques".to_string(),
                vec![Record::new("T1.000", kinds::TECHNIQUE, "orphan").with_attribute(SUBTECHNIQUE_OF, "T9")],
            ),
            (
                "case-studies".to_string(),
                vec![Record::new("CS1", kinds::CASE_STUDY, "study").with_attribute(
                    PROCEDURE,
                    json!([{"technique": "T9"}, {"tactic": "X", "technique": "X"}]),
                )],
            ),
        ]);
        assert_eq!(index.stats().dangling_references, 2);
    }
}
