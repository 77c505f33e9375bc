//! Node validation
//!
//! Checks a node's inputs and config against its type's schema. Validation is
//! pure: the caller resolves which referenced ids exist (one batched query)
//! and persists the returned [`ValidationResult`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::domain::node::Node;
use crate::schema::{FieldRule, NodeSchema};

pub const INVALID_TYPE: &str = "invalid_type";
pub const UNEXPECTED_INPUTS: &str = "unexpected_inputs";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    fn from_errors(errors: BTreeMap<String, String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate `node` against `schema`
///
/// `schema` is `None` when the node's type string is not recognized.
/// `existing` must contain every id from [`Node::referenced_ids`] that
/// resolves to a node in the same pipeline.
pub fn validate(
    node: &Node,
    schema: Option<&NodeSchema>,
    existing: &HashSet<Uuid>,
) -> ValidationResult {
    let Some(schema) = schema else {
        let mut errors = BTreeMap::new();
        errors.insert(
            INVALID_TYPE.to_string(),
            format!("Unknown node type: {}", node.node_type),
        );
        return ValidationResult::from_errors(errors);
    };

    let mut errors = BTreeMap::new();

    let unexpected: Vec<&str> = node
        .inputs
        .keys()
        .map(String::as_str)
        .filter(|slot| !schema.declares_slot(slot))
        .collect();
    if !unexpected.is_empty() {
        errors.insert(
            UNEXPECTED_INPUTS.to_string(),
            format!("Unexpected inputs: {}", unexpected.join(", ")),
        );
    }

    check_rules(&schema.inputs, |name| node.inputs.get(name), &mut errors);

    for slot in &schema.inputs {
        if errors.contains_key(slot.name) {
            continue;
        }
        let Some(input) = node.inputs.get(slot.name) else {
            continue;
        };

        let mut missing: Vec<&Uuid> = Vec::new();
        for id in input.ids() {
            if !existing.contains(id) && !missing.contains(&id) {
                missing.push(id);
            }
        }
        if !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|id| id.to_string()).collect();
            errors.insert(
                slot.name.to_string(),
                format!(
                    "{} references missing node(s): {}",
                    slot.name,
                    listed.join(", ")
                ),
            );
        }
    }

    check_rules(&schema.config, |name| node.config.get(name), &mut errors);

    ValidationResult::from_errors(errors)
}

/// Presence and value checks shared by input slots and config fields
fn check_rules<'a, R, F>(rules: &[R], lookup: F, errors: &mut BTreeMap<String, String>)
where
    R: FieldRule,
    R::Value: 'a,
    F: Fn(&str) -> Option<&'a R::Value>,
{
    for rule in rules {
        match lookup(rule.name()) {
            None if rule.is_required() => {
                errors.insert(
                    rule.name().to_string(),
                    format!("{} is required", rule.name()),
                );
            }
            None => {}
            Some(value) => {
                if let Err(message) = rule.check(value) {
                    errors.insert(rule.name().to_string(), message);
                }
            }
        }
    }
}
