//! Configuration items and relationships.
//!
//! Records travel to and from the remote as JSON maps. These types give the
//! modelled attributes names and keep everything else in an attribute bag.

use crate::error::{CmdbError, CmdbResult};
use crate::validation::{missing_fields, non_string_fields, CI_REQUIRED_FIELDS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sn_connectors::Record;

/// Table holding configuration items.
pub const CI_TABLE: &str = "cmdb_ci";

/// Table holding CI relationships.
pub const RELATIONSHIP_TABLE: &str = "cmdb_rel_ci";

/// Relationship type used when none is given.
pub const DEFAULT_RELATIONSHIP_TYPE: &str = "Depends on";

/// A configuration item whose `name` and `ci_type` are non-blank strings.
///
/// Every other field, `sys_id` included, stays in the attribute bag and is
/// sent back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationItem {
    pub name: String,
    pub ci_type: String,
    #[serde(flatten)]
    pub attributes: Record,
}

impl ConfigurationItem {
    /// Converts a raw payload, rejecting missing, blank or non-string
    /// `name`/`ci_type`.
    pub fn from_record(record: Record) -> CmdbResult<Self> {
        let missing = missing_fields(&record, CI_REQUIRED_FIELDS);
        if !missing.is_empty() {
            return Err(CmdbError::Validation(format!(
                "required fields missing: {}",
                missing.join(", ")
            )));
        }
        let mistyped = non_string_fields(&record, CI_REQUIRED_FIELDS);
        if !mistyped.is_empty() {
            return Err(CmdbError::Validation(format!(
                "fields must be strings: {}",
                mistyped.join(", ")
            )));
        }
        serde_json::from_value(Value::Object(record))
            .map_err(|e| CmdbError::InvalidRecord(e.to_string()))
    }

    /// Assigned by the remote on creation.
    pub fn sys_id(&self) -> Option<&str> {
        self.attributes.get("sys_id").and_then(Value::as_str)
    }

    /// The payload sent to the remote.
    pub fn to_record(&self) -> Record {
        let mut record = self.attributes.clone();
        record.insert("name".to_string(), Value::String(self.name.clone()));
        record.insert("ci_type".to_string(), Value::String(self.ci_type.clone()));
        record
    }
}

/// A directed dependency edge from `parent` to `child`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RelationshipRecord")]
pub struct Relationship {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_id: Option<String>,
    pub parent: String,
    pub child: String,
    pub relationship_type: String,
}

/// Row shape of `cmdb_rel_ci`. Rows carry the `type` reference column and
/// may also echo the `relationship_type` that was posted.
#[derive(Deserialize)]
struct RelationshipRecord {
    #[serde(default)]
    sys_id: Option<String>,
    parent: Reference,
    child: Reference,
    #[serde(default)]
    relationship_type: Option<Reference>,
    #[serde(default, rename = "type")]
    type_ref: Option<Reference>,
}

impl From<RelationshipRecord> for Relationship {
    fn from(row: RelationshipRecord) -> Self {
        let relationship_type = row
            .relationship_type
            .or(row.type_ref)
            .map(Reference::into_id)
            .unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string());
        Self {
            sys_id: row.sys_id,
            parent: row.parent.into_id(),
            child: row.child.into_id(),
            relationship_type,
        }
    }
}

impl Relationship {
    pub fn new(
        parent: impl Into<String>,
        child: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            sys_id: None,
            parent: parent.into(),
            child: child.into(),
            relationship_type: relationship_type.into(),
        }
    }

    /// The payload sent to the relationship table.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("parent".to_string(), Value::String(self.parent.clone()));
        record.insert("child".to_string(), Value::String(self.child.clone()));
        record.insert(
            "relationship_type".to_string(),
            Value::String(self.relationship_type.clone()),
        );
        record
    }
}

/// Reference fields arrive either as a plain sys_id or as
/// `{"link": "...", "value": "<sys_id>"}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Reference {
    Plain(String),
    Linked { value: String },
}

impl Reference {
    fn into_id(self) -> String {
        match self {
            Reference::Plain(s) => s,
            Reference::Linked { value } => value,
        }
    }
}

/// Extracts the records of a `{"result": [...]}` list response.
///
/// A missing or null `result` yields no records; a single object is treated as
/// a one-element list.
pub fn result_records(body: &Value) -> CmdbResult<Vec<Record>> {
    match body.get("result") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object().cloned().ok_or_else(|| {
                    CmdbError::InvalidRecord(format!("expected an object, got {}", item))
                })
            })
            .collect(),
        Some(Value::Object(record)) => Ok(vec![record.clone()]),
        Some(other) => Err(CmdbError::InvalidRecord(format!(
            "unexpected result shape: {}",
            other
        ))),
    }
}

/// The first record of a response, or an empty record when there is none.
pub fn first_record(body: &Value) -> CmdbResult<Record> {
    Ok(result_records(body)?.into_iter().next().unwrap_or_default())
}
