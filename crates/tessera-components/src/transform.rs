//! TRANSFORM: position, rotation and scale of an object.
//!
//! Fields:
//!
//! | Field | Type | Default |
//! |---|---|---|
//! | `position` | `[f32; 2]` | required |
//! | `rotation` | `f32`, degrees | `0.0` |
//! | `scale` | `[f32; 2]` | `[1.0, 1.0]` |

use tessera_object::component::Component;
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::ObjectError;

use crate::tags::TRANSFORM;

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    owner: ObjectId,
    pub position: [f32; 2],
    pub rotation: f32,
    pub scale: [f32; 2],
}

impl Transform {
    /// An unrotated, unscaled transform at `position`.
    pub fn at(position: [f32; 2]) -> Self {
        Self {
            owner: ObjectId::DETACHED,
            position,
            rotation: 0.0,
            scale: [1.0, 1.0],
        }
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(TRANSFORM, payload)?;
        Ok(Self {
            owner: ObjectId::DETACHED,
            position: fields.required("position")?,
            rotation: fields.optional("rotation", 0.0)?,
            scale: fields.optional("scale", [1.0, 1.0])?,
        })
    }

    pub fn translate(&mut self, delta: [f32; 2]) {
        self.position[0] += delta[0];
        self.position[1] += delta[1];
    }
}

impl Component for Transform {
    component_basics!(TRANSFORM);

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "position": self.position,
            "rotation": self.rotation,
            "scale": self.scale,
        })
    }
}

creator!(
    /// Creator for [`Transform`].
    TransformCreator => Transform
);
