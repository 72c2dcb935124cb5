//! Name-value codec
//!
//! The control plane models tags, metadata, config, and services as plain
//! key-value maps; GraphQL exposes them as lists. This module is the
//! bidirectional transform. List items get a deterministic id derived from
//! the pair content so otherwise-unordered map entries have a stable
//! GraphQL identity.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Reserved tag whose value travels JSON-encoded on the wire and must be
/// decoded when folding back into a map.
pub const DNS_DISABLE_TAG: &str = "triton.cns.disable";

/// A map entry materialized for GraphQL list representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValuePair {
    /// Content-derived id, stable across calls for equal (name, value).
    pub id: String,
    pub name: String,
    pub value: Value,
}

/// Deterministic id of a (name, value) pair: hex SHA-256 over the canonical
/// two-key JSON document.
pub fn pair_id(name: &str, value: &Value) -> String {
    let canonical = serde_json::json!({ "name": name, "value": value });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string());
    format!("{:x}", hasher.finalize())
}

/// Deterministic id for a bare string, used where a resource has no id of
/// its own (snapshot names).
pub fn hash_id(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    format!("{:x}", hasher.finalize())
}

/// Materialize a single map entry.
pub fn to_name_value(name: &str, value: Value) -> NameValuePair {
    NameValuePair {
        id: pair_id(name, &value),
        name: name.to_string(),
        value,
    }
}

/// Expand a map into name-value pairs. An absent map yields an empty list.
pub fn to_name_values(map: Option<&Map<String, Value>>) -> Vec<NameValuePair> {
    let Some(map) = map else {
        return Vec::new();
    };

    map.iter()
        .map(|(name, value)| to_name_value(name, value.clone()))
        .collect()
}

/// Fold name-value pairs back into a map, prefixing every key. Later
/// duplicate names overwrite earlier ones. The reserved DNS-visibility tag
/// is JSON-decoded; a value that fails to decode is kept as the raw string.
pub fn from_name_values(
    pairs: impl IntoIterator<Item = (String, Value)>,
    prefix: &str,
) -> Map<String, Value> {
    let mut map = Map::new();

    for (name, value) in pairs {
        let value = if name == DNS_DISABLE_TAG {
            decode_reserved(value)
        } else {
            value
        };

        map.insert(format!("{prefix}{name}"), value);
    }

    map
}

fn decode_reserved(value: Value) -> Value {
    match &value {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or(value),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn absent_map_yields_empty_list() {
        assert!(to_name_values(None).is_empty());
    }

    #[test]
    fn round_trips_a_plain_map() {
        let original = map(&[
            ("env", json!("prod")),
            ("owner", json!("ops")),
            ("count", json!(3)),
        ]);

        let pairs = to_name_values(Some(&original));
        let folded = from_name_values(pairs.into_iter().map(|p| (p.name, p.value)), "");

        assert_eq!(folded, original);
    }

    #[test]
    fn ids_are_content_derived() {
        let a = to_name_value("env", json!("prod"));
        let b = to_name_value("env", json!("prod"));
        assert_eq!(a.id, b.id);

        assert_ne!(a.id, to_name_value("env", json!("dev")).id);
        assert_ne!(a.id, to_name_value("region", json!("prod")).id);
    }

    #[test]
    fn prefix_is_applied_to_every_key() {
        let folded = from_name_values(
            vec![
                ("env".to_string(), json!("prod")),
                ("owner".to_string(), json!("ops")),
            ],
            "tag.",
        );

        assert_eq!(folded.get("tag.env"), Some(&json!("prod")));
        assert_eq!(folded.get("tag.owner"), Some(&json!("ops")));
        assert_eq!(folded.len(), 2);
    }

    #[test]
    fn later_duplicates_overwrite() {
        let folded = from_name_values(
            vec![
                ("env".to_string(), json!("dev")),
                ("env".to_string(), json!("prod")),
            ],
            "",
        );

        assert_eq!(folded.get("env"), Some(&json!("prod")));
    }

    #[test]
    fn reserved_tag_is_json_decoded() {
        let folded = from_name_values(
            vec![(DNS_DISABLE_TAG.to_string(), json!("true"))],
            "",
        );

        assert_eq!(folded.get(DNS_DISABLE_TAG), Some(&json!(true)));
    }

    #[test]
    fn reserved_tag_with_invalid_json_stays_raw() {
        let folded = from_name_values(
            vec![(DNS_DISABLE_TAG.to_string(), json!("not-json{"))],
            "",
        );

        assert_eq!(folded.get(DNS_DISABLE_TAG), Some(&json!("not-json{")));
    }
}
