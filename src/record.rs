//! Record types - typed, attributed knowledge base entries
//!
//! Every record carries a fixed default attribute set:
//! - `id`: globally unique identifier
//! - `object-type`: type tag (`tactic`, `technique`, `case-study`, ...)
//! - `name`, `description`: display text
//!
//! Any other attribute is a reference attribute naming one or more ids,
//! except display attributes stamped after load (`route`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub const ID: &str = "id";
pub const OBJECT_TYPE: &str = "object-type";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const SUBTECHNIQUE_OF: &str = "subtechnique-of";
pub const PROCEDURE: &str = "procedure";
pub const ROUTE: &str = "route";

/// Attributes that never name other records.
pub const DEFAULT_ATTRIBUTES: [&str; 4] = [ID, OBJECT_TYPE, NAME, DESCRIPTION];

/// Well-known `object-type` tags that drive derived relationship rules.
pub mod kinds {
    pub const TACTIC: &str = "tactic";
    pub const TECHNIQUE: &str = "technique";
    pub const CASE_STUDY: &str = "case-study";
    pub const MITIGATION: &str = "mitigation";
}

/// Check whether an attribute belongs to the default set
pub fn is_default_attribute(name: &str) -> bool {
    DEFAULT_ATTRIBUTES.contains(&name)
}

/// Identifiers carried directly by an attribute value.
///
/// A string yields itself; a sequence yields its string elements. Nested
/// sequences, maps and scalars of other types yield nothing.
pub fn identifiers(value: &Value) -> impl Iterator<Item = &str> {
    let (single, many) = match value {
        Value::String(s) => (Some(s.as_str()), None),
        Value::Array(items) => (None, Some(items.iter().filter_map(Value::as_str))),
        _ => (None, None),
    };
    single.into_iter().chain(many.into_iter().flatten())
}

/// A record in the knowledge base.
///
/// Attributes are kept exactly as loaded (including `id` and `object-type`)
/// so consumers always see the original document shape. Records compare
/// equal by id.
#[derive(Debug, Clone)]
pub struct Record {
    id: String,
    object_type: String,
    attributes: Map<String, Value>,
}

impl Record {
    /// Create a new record with the default attributes
    pub fn new(
        id: impl Into<String>,
        object_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let object_type = object_type.into();

        let mut attributes = Map::new();
        attributes.insert(ID.to_string(), Value::String(id.clone()));
        attributes.insert(OBJECT_TYPE.to_string(), Value::String(object_type.clone()));
        attributes.insert(NAME.to_string(), Value::String(name.into()));

        Self {
            id,
            object_type,
            attributes,
        }
    }

    /// Build a record from a raw document mapping.
    ///
    /// Fails when the value is not a mapping or lacks a string `id` or
    /// `object-type`; nothing else is validated.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(attributes) = value else {
            return Err(Error::Dataset("record is not a mapping".to_string()));
        };
        Self::from_attributes(attributes)
    }

    /// Build a record from an attribute map
    pub fn from_attributes(attributes: Map<String, Value>) -> Result<Self> {
        let id = attributes
            .get(ID)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Dataset("record has no string 'id'".to_string()))?
            .to_string();
        let object_type = attributes
            .get(OBJECT_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Dataset(format!("record {} has no string 'object-type'", id)))?
            .to_string();

        Ok(Self {
            id,
            object_type,
            attributes,
        })
    }

    /// Set an attribute, returning the updated record.
    ///
    /// `id` and `object-type` are fixed at construction and cannot be
    /// overwritten here.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != ID && key != OBJECT_TYPE {
            self.attributes.insert(key, value.into());
        }
        self
    }

    /// Set the description
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.with_attribute(DESCRIPTION, description.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.object_type == kind
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME)
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str(DESCRIPTION)
    }

    /// Display route stamped at load time, if any
    pub fn route(&self) -> Option<&str> {
        self.get_str(ROUTE)
    }

    /// Get a raw attribute value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Get an attribute as a string, if it is one
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// All attributes in document order
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Parent technique id for sub-techniques
    pub fn parent_technique(&self) -> Option<&str> {
        self.get(SUBTECHNIQUE_OF).and_then(|v| identifiers(v).next())
    }

    pub fn is_subtechnique(&self) -> bool {
        self.is_kind(kinds::TECHNIQUE) && self.has(SUBTECHNIQUE_OF)
    }

    /// Every identifier-shaped value found at the top level of this record.
    ///
    /// This is the flattened view used for inbound matching: string values
    /// and string members of sequence values, in attribute order, without
    /// duplicates.
    pub fn mentioned_ids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for value in self.attributes.values() {
            for id in identifiers(value) {
                if !seen.contains(&id) {
                    seen.push(id);
                }
            }
        }
        seen
    }

    /// Procedure steps of a case study.
    ///
    /// Entries that are not mappings or whose `tactic`/`technique` are not
    /// strings are skipped.
    pub fn procedure(&self) -> Vec<ProcedureStep> {
        let Some(Value::Array(steps)) = self.get(PROCEDURE) else {
            return Vec::new();
        };

        steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| match serde_json::from_value::<ProcedureStep>(step.clone()) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::debug!("Skipping procedure step {} of {}: {}", i, self.id, e);
                    None
                }
            })
            .collect()
    }

    /// Short description for display
    pub fn short_description(&self) -> String {
        match self.name() {
            Some(name) => format!("{} {} ({})", self.object_type, name, self.id),
            None => format!("{} {}", self.object_type, self.id),
        }
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.attributes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let attributes = Map::deserialize(deserializer)?;
        Record::from_attributes(attributes).map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl std::hash::Hash for Record {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// One step of a case study procedure.
///
/// A well-formed step names a tactic or a technique; steps naming neither
/// are kept but never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStep {
    #[serde(default)]
    pub tactic: Option<String>,
    #[serde(default)]
    pub technique: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProcedureStep {
    /// The identifier this step names for a given kind (`tactic` or `technique`)
    pub fn target(&self, kind: &str) -> Option<&str> {
        match kind {
            kinds::TACTIC => self.tactic.as_deref(),
            kinds::TECHNIQUE => self.technique.as_deref(),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.tactic.is_none() && self.technique.is_none()
    }
}
