//! Level and object descriptions, and typed access to component fields.
//!
//! A level file is a list of object descriptions; each object lists its
//! component entries in the order they must be constructed and dispatched:
//!
//! ```json
//! { "objects": [
//!     { "name": "player", "states": ["IDLE", "WALK"], "initial_state": "IDLE",
//!       "components": [
//!         { "type": "TRANSFORM", "fields": { "position": [10.0, 20.0] } },
//!         { "type": "GLQUAD", "fields": { "size": [24.0, 48.0] } }
//!       ] }
//! ] }
//! ```
//!
//! Creators read their fields through [`Fields`], which turns a missing or
//! mistyped field into an [`ObjectError::MalformedComponentData`] naming both
//! the component type and the field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ObjectError;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// One `{type, fields}` component entry of an object description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Registered component tag, e.g. `"TRANSFORM"`.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Component-specific payload. Absent fields mean "all defaults".
    #[serde(default = "empty_fields")]
    pub fields: serde_json::Value,
}

impl ComponentEntry {
    /// Build an entry from a tag and a JSON payload.
    pub fn new(type_tag: &str, fields: serde_json::Value) -> Self {
        Self {
            type_tag: type_tag.to_owned(),
            fields,
        }
    }
}

fn empty_fields() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Description of a single game object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Optional human-readable name, used in diagnostics and by the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Behavioral states this object may be in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,
    /// State entered once the object is linked. Defaults to the first
    /// declared state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    /// Component entries in construction (and dispatch) order.
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

impl ObjectDescriptor {
    /// An unnamed descriptor with the given components and no states.
    pub fn with_components(components: Vec<ComponentEntry>) -> Self {
        Self {
            components,
            ..Self::default()
        }
    }

    /// Label used in log lines: the name if present, otherwise `#index`.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

/// Description of a whole level.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// Objects in creation order.
    #[serde(default)]
    pub objects: Vec<ObjectDescriptor>,
}

impl LevelDescriptor {
    /// Parse a level from JSON text.
    pub fn from_json_str(level: u32, text: &str) -> Result<Self, ObjectError> {
        serde_json::from_str(text).map_err(|e| ObjectError::LevelLoad {
            level,
            details: e.to_string(),
        })
    }

    /// Serialize the level back to pretty JSON.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Typed, error-reporting view over one component payload.
///
/// Unknown keys are ignored. A key that is present with a `null` value is
/// treated as absent.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    component: &'a str,
    map: Option<&'a serde_json::Map<String, serde_json::Value>>,
}

impl<'a> Fields<'a> {
    /// Wrap `payload` for the component type `component`.
    ///
    /// The payload must be a JSON object or `null` (no fields).
    pub fn new(component: &'a str, payload: &'a serde_json::Value) -> Result<Self, ObjectError> {
        let map = match payload {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(ObjectError::MalformedComponentData {
                    component: component.to_owned(),
                    field: "fields".to_owned(),
                    reason: format!("must be an object, got {}", json_kind(other)),
                })
            }
        };
        Ok(Self { component, map })
    }

    /// The component type these fields belong to.
    pub fn component(&self) -> &str {
        self.component
    }

    /// Whether `field` is present and not `null`.
    pub fn contains(&self, field: &str) -> bool {
        self.raw(field).is_some()
    }

    /// Read a field that must be present.
    pub fn required<T: DeserializeOwned>(&self, field: &str) -> Result<T, ObjectError> {
        match self.raw(field) {
            Some(value) => self.decode(field, value),
            None => Err(self.malformed(field, "is required but missing".to_owned())),
        }
    }

    /// Read a field, falling back to `default` when it is absent.
    ///
    /// A present field of the wrong shape is still an error.
    pub fn optional<T: DeserializeOwned>(&self, field: &str, default: T) -> Result<T, ObjectError> {
        match self.raw(field) {
            Some(value) => self.decode(field, value),
            None => Ok(default),
        }
    }

    /// Build a [`ObjectError::MalformedComponentData`] for `field`.
    pub fn malformed(&self, field: &str, reason: String) -> ObjectError {
        ObjectError::MalformedComponentData {
            component: self.component.to_owned(),
            field: field.to_owned(),
            reason,
        }
    }

    fn raw(&self, field: &str) -> Option<&'a serde_json::Value> {
        self.map
            .and_then(|m| m.get(field))
            .filter(|v| !v.is_null())
    }

    fn decode<T: DeserializeOwned>(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<T, ObjectError> {
        T::deserialize(value).map_err(|e| self.malformed(field, format!("is invalid: {e}")))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
