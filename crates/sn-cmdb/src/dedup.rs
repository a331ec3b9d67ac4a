//! Duplicate detection over configuration items.

use serde_json::Value;
use sn_connectors::Record;
use std::collections::HashSet;

/// Identity of a CI for duplicate detection.
///
/// Missing attributes are part of the key, so two records that both lack a
/// `ci_type` but share a `name` are duplicates of each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub name: Option<String>,
    pub ci_type: Option<String>,
}

impl DuplicateKey {
    pub fn of(record: &Record) -> Self {
        Self {
            name: key_part(record.get("name")),
            ci_type: key_part(record.get("ci_type")),
        }
    }
}

fn key_part(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Returns every record whose `(name, ci_type)` was already seen earlier in
/// `records`.
///
/// The first record for each key is canonical and is not returned. Input
/// order decides which record is canonical, and the output keeps input order.
pub fn find_duplicates(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| !seen.insert(DuplicateKey::of(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ci(id: &str, name: &str, ci_type: &str) -> Record {
        serde_json::json!({"sys_id": id, "name": name, "ci_type": ci_type})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r["sys_id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_unique_keys_yield_nothing() {
        let records = vec![
            ci("1", "web01", "server"),
            ci("2", "web02", "server"),
            ci("3", "web01", "database"),
        ];
        assert!(find_duplicates(records).is_empty());
    }

    #[test]
    fn test_count_minus_one_per_key() {
        let records = vec![
            ci("1", "web01", "server"),
            ci("2", "db01", "database"),
            ci("3", "web01", "server"),
            ci("4", "web01", "server"),
            ci("5", "db01", "database"),
        ];
        let duplicates = find_duplicates(records);
        assert_eq!(ids(&duplicates), vec!["3", "4", "5"]);
    }

    #[test]
    fn test_first_seen_is_canonical() {
        let forward = vec![ci("a", "x", "t"), ci("b", "x", "t")];
        let reverse = vec![ci("b", "x", "t"), ci("a", "x", "t")];
        assert_eq!(ids(&find_duplicates(forward)), vec!["b"]);
        assert_eq!(ids(&find_duplicates(reverse)), vec!["a"]);
    }

    #[test]
    fn test_missing_attributes_form_a_key() {
        let records: Vec<Record> = vec![
            serde_json::json!({"sys_id": "1", "name": "orphan"}),
            serde_json::json!({"sys_id": "2", "name": "orphan", "ci_type": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        assert_eq!(ids(&find_duplicates(records)), vec!["2"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(find_duplicates(Vec::new()).is_empty());
    }
}
