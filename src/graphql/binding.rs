//! Startup resolver-registry validation
//!
//! The registry lists every `(type, field)` pair that carries custom
//! resolution. At startup the pairs are checked against the SDL of the
//! built schema: an unknown type or field aborts the process immediately
//! instead of surfacing as a request-time hole.

use async_graphql::parser::types::{TypeKind, TypeSystemDefinition};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Fields with custom resolution, by schema type.
pub const RESOLVER_FIELDS: &[(&str, &[&str])] = &[
    (
        "Query",
        &[
            "account",
            "keys",
            "key",
            "users",
            "user",
            "roles",
            "role",
            "policies",
            "policy",
            "config",
            "datacenters",
            "datacenter",
            "services",
            "images",
            "image",
            "packages",
            "package",
            "machines",
            "machine",
            "snapshots",
            "snapshot",
            "metadata",
            "metadata_value",
            "tags",
            "tag",
            "actions",
            "firewall_rules",
            "firewall_rule",
            "firewall_rules_create_machine",
            "vlans",
            "vlan",
            "networks",
            "network",
            "nics",
            "nic",
        ],
    ),
    (
        "Mutation",
        &[
            "updateAccount",
            "createKey",
            "deleteKey",
            "stopMachine",
            "startMachine",
            "rebootMachine",
            "resizeMachine",
            "enableMachineFirewall",
            "disableMachineFirewall",
            "createMachine",
            "deleteMachine",
            "createMachineSnapshot",
            "startMachineFromSnapshot",
            "deleteMachineSnapshot",
            "updateMachineMetadata",
            "deleteMachineMetadata",
            "addMachineTags",
            "replaceMachineTags",
            "deleteMachineTag",
            "deleteMachineTags",
            "createImageFromMachine",
            "updateImage",
            "deleteImage",
            "exportImage",
            "createFirewallRule",
            "updateFirewallRule",
            "enableFirewallRule",
            "disableFirewallRule",
            "deleteFirewallRule",
            "createVlan",
            "updateVlan",
            "deleteVlan",
            "createNetwork",
            "deleteNetwork",
            "addNic",
            "removeNic",
        ],
    ),
    (
        "Machine",
        &[
            "brand",
            "state",
            "image",
            "package",
            "networks",
            "tags",
            "metadata",
            "snapshots",
            "firewall_rules",
            "actions",
        ],
    ),
    ("Image", &["os", "state", "type", "tags"]),
    ("ImageFile", &["compression"]),
    ("ImageError", &["code"]),
    ("Snapshot", &["id", "state"]),
    ("Action", &["name", "parameters"]),
    ("Caller", &["type"]),
    ("User", &["keys"]),
    ("Network", &["machines"]),
    ("Nic", &["network"]),
    ("FirewallRule", &["rule_str", "rule_obj", "machines"]),
];

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("failed to parse schema SDL: {0}")]
    Parse(String),
    #[error("missing schema definition for resolver type: {0}")]
    UnknownType(&'static str),
    #[error("missing schema definition for resolver field: {type_name}.{field}")]
    UnknownField {
        type_name: &'static str,
        field: &'static str,
    },
}

/// Check every registry entry against the given SDL.
pub fn validate(sdl: &str) -> Result<(), BindingError> {
    let document =
        async_graphql::parser::parse_schema(sdl).map_err(|err| BindingError::Parse(err.to_string()))?;

    let mut object_fields: HashMap<String, HashSet<String>> = HashMap::new();
    for definition in document.definitions {
        let TypeSystemDefinition::Type(ty) = definition else {
            continue;
        };

        let name = ty.node.name.node.to_string();
        if let TypeKind::Object(object) = &ty.node.kind {
            let fields = object
                .fields
                .iter()
                .map(|field| field.node.name.node.to_string())
                .collect();
            object_fields.insert(name, fields);
        }
    }

    for &(type_name, fields) in RESOLVER_FIELDS {
        let Some(defined) = object_fields.get(type_name) else {
            return Err(BindingError::UnknownType(type_name));
        };

        for &field in fields {
            if !defined.contains(field) {
                return Err(BindingError::UnknownField { type_name, field });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_schema_satisfies_the_registry() {
        // build_schema runs validate internally; a mismatch fails here
        assert!(crate::graphql::build_schema().is_ok());
    }

    #[test]
    fn missing_field_is_reported() {
        let err = validate("type Query { ping: String }").unwrap_err();
        assert!(matches!(err, BindingError::UnknownField { .. }));
    }

    #[test]
    fn missing_type_is_reported() {
        let err = validate("type Ping { pong: String }").unwrap_err();
        assert!(matches!(err, BindingError::UnknownType("Query")));
    }

    #[test]
    fn malformed_sdl_is_reported() {
        let err = validate("type {").unwrap_err();
        assert!(matches!(err, BindingError::Parse(_)));
    }
}
