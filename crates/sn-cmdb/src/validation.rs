//! Required-field checks shared by record-shaping code.

use serde_json::Value;
use sn_connectors::Record;

/// Attributes every configuration item must carry.
pub const CI_REQUIRED_FIELDS: &[&str] = &["name", "ci_type"];

/// Returns the required fields that are absent, null, or empty strings.
pub fn missing_fields<'a>(data: &Record, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|field| match data.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect()
}

/// Returns the fields of `required` that are present but not strings.
pub fn non_string_fields<'a>(data: &Record, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|field| matches!(data.get(*field), Some(v) if !v.is_null() && !v.is_string()))
        .collect()
}

/// True iff every field in `required` is present with a usable value.
fn validate_data(data: &Record, required: &[&str]) -> bool {
    missing_fields(data, required).is_empty()
}

/// True iff `data` has a non-empty string `name` and `ci_type`.
pub fn validate_ci(data: &Record) -> bool {
    validate_data(data, CI_REQUIRED_FIELDS)
        && non_string_fields(data, CI_REQUIRED_FIELDS).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_ci() {
        assert!(validate_ci(&record(serde_json::json!({
            "name": "web01",
            "ci_type": "server",
            "ip_address": "10.0.0.5"
        }))));
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let data = record(serde_json::json!({"ip_address": "10.0.0.5"}));
        assert_eq!(missing_fields(&data, CI_REQUIRED_FIELDS), vec!["name", "ci_type"]);
        assert!(!validate_ci(&data));
    }

    #[test]
    fn test_null_and_blank_values_rejected() {
        assert!(!validate_ci(&record(serde_json::json!({"name": null, "ci_type": "server"}))));
        assert!(!validate_ci(&record(serde_json::json!({"name": "web01", "ci_type": "  "}))));
    }

    #[test]
    fn test_non_string_values_accepted() {
        assert!(validate_data(
            &record(serde_json::json!({"install_status": 1})),
            &["install_status"]
        ));
    }

    #[test]
    fn test_non_string_ci_fields_rejected() {
        let data = record(serde_json::json!({"name": "web01", "ci_type": 7}));
        assert_eq!(non_string_fields(&data, CI_REQUIRED_FIELDS), vec!["ci_type"]);
        assert!(!validate_ci(&data));
    }

    #[test]
    fn test_empty_requirement_list() {
        assert!(validate_data(&Record::new(), &[]));
    }
}
