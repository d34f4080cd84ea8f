//! BEHAVIOR: attaches a scripted behavior module to an object.
//!
//! The component itself does no per-frame work. Linking only checks that the
//! named script exists; after a level is built the engine collects every
//! BEHAVIOR and hands `(object, script, params)` to its script hook, which
//! runs the module once per frame.

use tessera_object::component::{Component, LinkContext};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::ObjectError;

use crate::tags::BEHAVIOR;

#[derive(Debug, Clone)]
pub struct Behavior {
    owner: ObjectId,
    script: String,
    /// Free-form parameters passed through to the script host.
    params: serde_json::Value,
    pub enabled: bool,
}

impl Behavior {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(BEHAVIOR, payload)?;
        let script: String = fields.required("script")?;
        if script.is_empty() {
            return Err(fields.malformed("script", "must not be empty".to_owned()));
        }
        let params: serde_json::Value = fields.optional("params", serde_json::json!({}))?;
        if !params.is_object() {
            return Err(fields.malformed("params", "must be an object".to_owned()));
        }
        Ok(Self {
            owner: ObjectId::DETACHED,
            script,
            params,
            enabled: fields.optional("enabled", true)?,
        })
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn params(&self) -> &serde_json::Value {
        &self.params
    }
}

impl Component for Behavior {
    component_basics!(BEHAVIOR);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        if ctx.resources.script(&self.script).is_none() {
            return Err(ctx.missing(BEHAVIOR, &format!("script '{}'", self.script)));
        }
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "script": self.script,
            "params": self.params,
            "enabled": self.enabled,
        })
    }
}

creator!(
    /// Creator for [`Behavior`].
    BehaviorCreator => Behavior
);
