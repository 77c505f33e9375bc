//! Node schemas
//!
//! Declarative descriptors of the input slots and config fields each node type
//! accepts. The validator checks nodes against these; nothing else interprets
//! them.

mod registry;

pub use registry::{lookup, schema_for};

use serde::Serialize;
use serde_json::Value;

use crate::domain::node::{InputRef, NodeType};

/// Schema for one node type
#[derive(Debug, Clone, Serialize)]
pub struct NodeSchema {
    pub node_type: NodeType,
    pub inputs: Vec<InputSlotSpec>,
    pub config: Vec<ConfigFieldSpec>,
}

impl NodeSchema {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            inputs: Vec::new(),
            config: Vec::new(),
        }
    }

    pub fn input(mut self, slot: InputSlotSpec) -> Self {
        self.inputs.push(slot);
        self
    }

    pub fn field(mut self, field: ConfigFieldSpec) -> Self {
        self.config.push(field);
        self
    }

    pub fn slot(&self, name: &str) -> Option<&InputSlotSpec> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub fn declares_slot(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }
}

/// Whether a slot takes one node or a bounded list of nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotKind {
    Single,
    Multiple { min: usize, max: Option<usize> },
}

#[derive(Debug, Clone, Serialize)]
pub struct InputSlotSpec {
    pub name: &'static str,
    pub required: bool,
    #[serde(flatten)]
    pub kind: SlotKind,
}

impl InputSlotSpec {
    pub fn single(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            kind: SlotKind::Single,
        }
    }

    pub fn multiple(name: &'static str, min: usize, max: Option<usize>) -> Self {
        Self {
            name,
            // A lower bound above zero implies the slot must be present
            required: min > 0,
            kind: SlotKind::Multiple { min, max },
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// JSON type a config field must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigFieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl ConfigFieldSpec {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            required: false,
            field_type,
            allowed_values: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// A declared slot or field that a supplied value can be checked against
///
/// Presence is handled by the validator; `check` only sees values that exist.
pub trait FieldRule {
    type Value;

    fn name(&self) -> &'static str;

    fn is_required(&self) -> bool;

    fn check(&self, value: &Self::Value) -> Result<(), String>;
}

impl FieldRule for InputSlotSpec {
    type Value = InputRef;

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn check(&self, value: &InputRef) -> Result<(), String> {
        match (self.kind, value) {
            (SlotKind::Single, InputRef::Single(_)) => Ok(()),
            (SlotKind::Single, InputRef::Multiple(_)) => {
                Err(format!("{} expects a single node id, got a list", self.name))
            }
            (SlotKind::Multiple { .. }, InputRef::Single(_)) => {
                Err(format!("{} expects a list of node ids", self.name))
            }
            (SlotKind::Multiple { min, max }, InputRef::Multiple(ids)) => {
                if ids.len() < min {
                    return Err(format!(
                        "{} requires at least {} node(s), got {}",
                        self.name,
                        min,
                        ids.len()
                    ));
                }
                if let Some(max) = max.filter(|max| ids.len() > *max) {
                    return Err(format!(
                        "{} accepts at most {} node(s), got {}",
                        self.name,
                        max,
                        ids.len()
                    ));
                }
                Ok(())
            }
        }
    }
}

impl FieldRule for ConfigFieldSpec {
    type Value = Value;

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        if !self.field_type.matches(value) {
            return Err(format!(
                "{} must be of type {}",
                self.name,
                self.field_type.as_str()
            ));
        }

        if let Some(allowed) = &self.allowed_values {
            if !allowed.contains(value) {
                let listed: Vec<String> = allowed
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                return Err(format!("{} must be one of: {}", self.name, listed.join(", ")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_single_slot_rejects_list() {
        let slot = InputSlotSpec::single("audio");
        assert!(slot.check(&InputRef::Single(Uuid::new_v4())).is_ok());
        assert!(slot.check(&InputRef::Multiple(vec![Uuid::new_v4()])).is_err());
    }

    #[test]
    fn test_multiple_slot_bounds() {
        let slot = InputSlotSpec::multiple("segments", 2, Some(3));
        let ids = |n: usize| InputRef::Multiple((0..n).map(|_| Uuid::new_v4()).collect());

        assert!(slot.check(&ids(1)).is_err());
        assert!(slot.check(&ids(2)).is_ok());
        assert!(slot.check(&ids(3)).is_ok());
        assert!(slot.check(&ids(4)).is_err());
        assert!(slot.check(&InputRef::Single(Uuid::new_v4())).is_err());
        assert!(slot.required);
    }

    #[test]
    fn test_config_field_type_and_allowed_values() {
        let field = ConfigFieldSpec::string("resolution").one_of(["720p", "1080p"]);
        assert!(field.check(&json!("720p")).is_ok());
        assert_eq!(
            field.check(&json!("8k")),
            Err("resolution must be one of: 720p, 1080p".to_string())
        );
        assert_eq!(
            field.check(&json!(720)),
            Err("resolution must be of type string".to_string())
        );
    }

    #[test]
    fn test_integer_rejects_floats() {
        let field = ConfigFieldSpec::integer("fps");
        assert!(field.check(&json!(30)).is_ok());
        assert!(field.check(&json!(29.97)).is_err());
    }
}
