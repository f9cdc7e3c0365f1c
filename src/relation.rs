//! Relation maps - label-grouped related records
//!
//! Labels come from two places:
//! - Outbound: the referencing attribute name (`tactics`, `parent-technique`)
//! - Inbound: the referring record's `object-type` (`technique`, `case-study`)
//!   or a relabeled form (`subtechniques`, `other-subtechniques`)

use crate::record::Record;
use crate::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Outbound label replacing `subtechnique-of`
pub const PARENT_TECHNIQUE: &str = "parent-technique";
/// Inbound label for children of a technique
pub const SUBTECHNIQUES: &str = "subtechniques";
/// Inbound label for siblings of a sub-technique
pub const OTHER_SUBTECHNIQUES: &str = "other-subtechniques";

/// Records related under one label, in discovery order
#[derive(Debug, Clone)]
pub struct RelationGroup<'a> {
    pub label: String,
    pub records: Vec<&'a Record>,
}

impl<'a> RelationGroup<'a> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            records: Vec::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.records.iter().map(|r| r.id()).collect()
    }
}

/// Ordered mapping of label to related records.
///
/// Groups keep first-insertion order and a record appears at most once per
/// group (identity by id).
#[derive(Debug, Clone, Default)]
pub struct RelationMap<'a> {
    groups: Vec<RelationGroup<'a>>,
}

impl<'a> RelationMap<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a label exists, possibly empty
    pub fn ensure(&mut self, label: &str) -> &mut RelationGroup<'a> {
        let pos = match self.position(label) {
            Some(pos) => pos,
            None => {
                self.groups.push(RelationGroup::new(label));
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos]
    }

    /// Add a record under a label unless it is already there.
    ///
    /// Returns true when the record was added.
    pub fn push(&mut self, label: &str, record: &'a Record) -> bool {
        let group = self.ensure(label);
        if group.contains(record.id()) {
            return false;
        }
        group.records.push(record);
        true
    }

    /// Rename a label in place, keeping its position
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(pos) = self.position(from) {
            self.groups[pos].label = to.to_string();
        }
    }

    /// Append every group of `other`.
    ///
    /// A label present on both sides is a collision: neither side may
    /// silently replace the other.
    pub fn merge(mut self, other: RelationMap<'a>, id: &str) -> Result<Self> {
        for group in other.groups {
            if self.contains_label(&group.label) {
                return Err(Error::LabelCollision {
                    id: id.to_string(),
                    label: group.label,
                });
            }
            self.groups.push(group);
        }
        Ok(self)
    }

    /// Move the records of `from` accepted by `pred` into a new `to` group
    /// placed just before it.
    ///
    /// No empty group is left behind on either side.
    pub fn split_off<P>(&mut self, from: &str, to: &str, mut pred: P)
    where
        P: FnMut(&Record) -> bool,
    {
        let Some(pos) = self.position(from) else {
            return;
        };
        let (moved, kept): (Vec<&'a Record>, Vec<&'a Record>) = std::mem::take(&mut self.groups[pos].records)
            .into_iter()
            .partition(|r| pred(r));
        self.groups[pos].records = kept;

        if self.groups[pos].records.is_empty() {
            self.groups.remove(pos);
        }
        if !moved.is_empty() {
            self.groups.insert(pos, RelationGroup { label: to.to_string(), records: moved });
        }
    }

    pub fn get(&self, label: &str) -> Option<&[&'a Record]> {
        self.position(label).map(|pos| self.groups[pos].records.as_slice())
    }

    /// Ids under a label; empty when the label is absent
    pub fn ids(&self, label: &str) -> Vec<&'a str> {
        self.position(label)
            .map(|pos| self.groups[pos].ids())
            .unwrap_or_default()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Whether any group holds a record with this id
    pub fn contains_record(&self, id: &str) -> bool {
        self.groups.iter().any(|g| g.contains(id))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.label.as_str())
    }

    pub fn groups(&self) -> &[RelationGroup<'a>] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total records across all groups
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.label == label)
    }
}

impl Serialize for RelationMap<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.label, &group.records)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::kinds;

    #[test]
    fn test_push_dedupes_within_label() {
        let a = Record::new("A", kinds::TECHNIQUE, "a");
        let mut map = RelationMap::new();

        assert!(map.push("technique", &a));
        assert!(!map.push("technique", &a));
        assert!(map.push("other", &a));

        assert_eq!(map.ids("technique"), vec!["A"]);
        assert_eq!(map.record_count(), 2);
    }

    #[test]
    fn test_rename_keeps_position() {
        let a = Record::new("A", kinds::TECHNIQUE, "a");
        let b = Record::new("B", kinds::CASE_STUDY, "b");
        let mut map = RelationMap::new();
        map.push(kinds::TECHNIQUE, &a);
        map.push(kinds::CASE_STUDY, &b);

        map.rename(kinds::TECHNIQUE, SUBTECHNIQUES);

        let labels: Vec<_> = map.labels().collect();
        assert_eq!(labels, vec![SUBTECHNIQUES, kinds::CASE_STUDY]);
        assert!(!map.contains_label(kinds::TECHNIQUE));
    }

    #[test]
    fn test_split_off_keeps_position() {
        let a = Record::new("A", kinds::TECHNIQUE, "a");
        let b = Record::new("B", kinds::TECHNIQUE, "b");
        let c = Record::new("C", kinds::CASE_STUDY, "c");
        let mut map = RelationMap::new();
        map.push(OTHER_SUBTECHNIQUES, &a);
        map.push(OTHER_SUBTECHNIQUES, &b);
        map.push(kinds::CASE_STUDY, &c);

        map.split_off(OTHER_SUBTECHNIQUES, SUBTECHNIQUES, |r| r.id() == "B");

        let labels: Vec<_> = map.labels().collect();
        assert_eq!(labels, vec![SUBTECHNIQUES, OTHER_SUBTECHNIQUES, kinds::CASE_STUDY]);
        assert_eq!(map.ids(SUBTECHNIQUES), vec!["B"]);
        assert_eq!(map.ids(OTHER_SUBTECHNIQUES), vec!["A"]);

        // Moving everything drops the emptied source group
        map.split_off(OTHER_SUBTECHNIQUES, "moved", |_| true);
        assert!(!map.contains_label(OTHER_SUBTECHNIQUES));
        assert_eq!(map.ids("moved"), vec!["A"]);

        // Nothing accepted, nothing created
        map.split_off(kinds::CASE_STUDY, "none", |_| false);
        assert!(!map.contains_label("none"));
        assert_eq!(map.ids(kinds::CASE_STUDY), vec!["C"]);
    }

    #[test]
    fn test_merge_collision() {
        let a = Record::new("A", kinds::TACTIC, "a");
        let mut left = RelationMap::new();
        left.push("tactic", &a);
        let mut right = RelationMap::new();
        right.push("tactic", &a);

        let err = left.merge(right, "X").unwrap_err();
        assert!(matches!(err, Error::LabelCollision { ref label, .. } if label == "tactic"));
    }

    #[test]
    fn test_serialize_as_ordered_map() {
        let a = Record::new("A", kinds::TACTIC, "a");
        let mut map = RelationMap::new();
        map.ensure("empty");
        map.push("tactics", &a);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"empty":[],"tactics":[{"id":"A","object-type":"tactic","name":"a"}]}"#
        );
    }
}
