//! Relationship Resolver
//!
//! Computes, for one record, every related record grouped by label.
//!
//! Outbound: records named by the record's reference attributes.
//!
//! Inbound, in order:
//! 1. Direct mentions (any top-level attribute value equals the id)
//! 2. Sibling sub-techniques (sub-technique records only)
//! 3. Sub-technique rollup of techniques (tactic records only)
//! 4. Case studies whose procedure steps name the record
//! 5. Relabeling of the `technique` group for technique records: children
//!    become `subtechniques`, a sub-technique's siblings `other-subtechniques`

use serde_json::Value;
use crate::index::RecordIndex;
use crate::record::{identifiers, is_default_attribute, kinds, Record, ROUTE, SUBTECHNIQUE_OF};
use crate::relation::{RelationMap, OTHER_SUBTECHNIQUES, PARENT_TECHNIQUE, SUBTECHNIQUES};
use crate::{Error, Result};

/// Tunables for relationship resolution
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Non-default attributes that are display-only and never references
    pub display_attributes: Vec<String>,
    /// Separator between a parent technique id and a sub-technique suffix
    pub subtechnique_separator: char,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            display_attributes: vec![ROUTE.to_string()],
            subtechnique_separator: '.',
        }
    }
}

/// Resolves relationships over an explicit, borrowed record index.
///
/// Every operation is a pure function of the index and its argument.
pub struct Resolver<'a> {
    index: &'a RecordIndex,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with default options
    pub fn new(index: &'a RecordIndex) -> Self {
        Self::with_options(index, ResolverOptions::default())
    }

    pub fn with_options(index: &'a RecordIndex, options: ResolverOptions) -> Self {
        Self { index, options }
    }

    pub fn index(&self) -> &'a RecordIndex {
        self.index
    }

    /// Records named by this record's reference attributes.
    ///
    /// Each reference attribute becomes a label, even when none of its ids
    /// resolve. `subtechnique-of` is reported as `parent-technique`.
    pub fn referenced_by(&self, record: &Record) -> RelationMap<'a> {
        let mut related = RelationMap::new();

        for (key, value) in record.attributes() {
            if !self.is_reference_attribute(key) {
                continue;
            }
            if !matches!(value, Value::String(_) | Value::Array(_)) {
                tracing::trace!("Attribute {} of {} carries no identifiers", key, record.id());
                continue;
            }

            let label = if key == SUBTECHNIQUE_OF {
                PARENT_TECHNIQUE
            } else {
                key.as_str()
            };
            related.ensure(label);

            for id in identifiers(value) {
                if id == record.id() {
                    continue;
                }
                match self.index.record_by_id(id) {
                    Some(target) => {
                        related.push(label, target);
                    }
                    None => {
                        tracing::trace!("Dropping unresolved reference {} -> {} ({})", record.id(), id, key);
                    }
                }
            }
        }

        related
    }

    /// Records referring to this record, directly or through a derived rule
    pub fn referencing(&self, record: &Record) -> RelationMap<'a> {
        let id = record.id();
        let kind = record.object_type();

        let mut found = self.index.referrers_of(id);

        if record.is_subtechnique() {
            if let Some(parent) = self.parent_id(id) {
                found.extend(
                    self.index
                        .subtechniques_of(parent)
                        .into_iter()
                        .filter(|sibling| sibling.id() != id),
                );
            }
        }

        if kind == kinds::TACTIC {
            let rollup: Vec<&'a Record> = found
                .iter()
                .filter(|r| r.is_kind(kinds::TECHNIQUE))
                .flat_map(|technique| self.index.subtechniques_of(technique.id()))
                .collect();
            found.extend(rollup);
        }

        if kind == kinds::TACTIC || kind == kinds::TECHNIQUE {
            found.extend(self.index.studies_with_step(kind, id));
        }

        let mut related = RelationMap::new();
        for referrer in found {
            if referrer.id() != id {
                related.push(referrer.object_type(), referrer);
            }
        }

        if kind == kinds::TECHNIQUE && related.get(kinds::TECHNIQUE).is_some_and(|g| !g.is_empty()) {
            if record.has(SUBTECHNIQUE_OF) {
                // A sub-technique's own children stay `subtechniques`
                related.rename(kinds::TECHNIQUE, OTHER_SUBTECHNIQUES);
                related.split_off(OTHER_SUBTECHNIQUES, SUBTECHNIQUES, |r| r.parent_technique() == Some(id));
            } else {
                related.rename(kinds::TECHNIQUE, SUBTECHNIQUES);
            }
        }

        related
    }

    /// Outbound and inbound relationships in one map.
    ///
    /// Fails with `LabelCollision` if both sides produce the same label.
    pub fn related_to(&self, record: &Record) -> Result<RelationMap<'a>> {
        self.referenced_by(record)
            .merge(self.referencing(record), record.id())
    }

    /// `referenced_by` for a record looked up by id
    pub fn referenced_by_id(&self, id: &str) -> Result<RelationMap<'a>> {
        Ok(self.referenced_by(self.lookup(id)?))
    }

    /// `referencing` for a record looked up by id
    pub fn referencing_id(&self, id: &str) -> Result<RelationMap<'a>> {
        Ok(self.referencing(self.lookup(id)?))
    }

    /// `related_to` for a record looked up by id
    pub fn related_to_id(&self, id: &str) -> Result<RelationMap<'a>> {
        self.related_to(self.lookup(id)?)
    }

    fn lookup(&self, id: &str) -> Result<&'a Record> {
        self.index
            .record_by_id(id)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }

    fn is_reference_attribute(&self, key: &str) -> bool {
        !is_default_attribute(key) && !self.options.display_attributes.iter().any(|d| d == key)
    }

    /// Parent id derived from a sub-technique id (`T1.000` → `T1`)
    fn parent_id<'i>(&self, id: &'i str) -> Option<&'i str> {
        id.rsplit_once(self.options.subtechnique_separator)
            .map(|(parent, _)| parent)
    }
}
