//! Merge semantics for CI enrichment.

use sn_connectors::Record;

/// Shallow merge: every key of `enrichment` overwrites the same key of
/// `current`; keys only in `current` are kept.
///
/// Applying the same enrichment twice gives the same result as applying it
/// once.
pub fn merge_enrichment(current: Record, enrichment: &Record) -> Record {
    let mut merged = current;
    for (key, value) in enrichment {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_overwrites_and_preserves() {
        let current = record(serde_json::json!({
            "name": "web01",
            "ci_type": "server",
            "vendor": "Dell"
        }));
        let merged = merge_enrichment(
            current,
            &record(serde_json::json!({"vendor": "HPE", "warranty_expiration": "2027-01-31"})),
        );
        assert_eq!(merged["name"], "web01");
        assert_eq!(merged["vendor"], "HPE");
        assert_eq!(merged["warranty_expiration"], "2027-01-31");
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_nested_values_replaced_not_merged() {
        let current = record(serde_json::json!({"location": {"site": "A", "rack": "1"}}));
        let merged = merge_enrichment(current, &record(serde_json::json!({"location": {"site": "B"}})));
        assert_eq!(merged["location"], serde_json::json!({"site": "B"}));
    }

    #[test]
    fn test_idempotent() {
        let current = record(serde_json::json!({"name": "web01", "ci_type": "server"}));
        let enrichment = record(serde_json::json!({"owner": "infra"}));
        let once = merge_enrichment(current, &enrichment);
        let twice = merge_enrichment(once.clone(), &enrichment);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_current() {
        let merged = merge_enrichment(Record::new(), &record(serde_json::json!({"k": 1})));
        assert_eq!(merged, record(serde_json::json!({"k": 1})));
    }
}
