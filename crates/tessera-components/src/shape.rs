//! Axis-aligned boxes shared by colliders, hitboxes and hurtboxes.

use serde::{Deserialize, Serialize};
use tessera_object::payload::Fields;
use tessera_object::ObjectError;

use crate::transform::Transform;

/// A world-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Aabb {
    /// Box with its lower-left corner at `origin`.
    pub fn new(origin: [f32; 2], size: [f32; 2]) -> Self {
        Self {
            min: origin,
            max: [origin[0] + size[0], origin[1] + size[1]],
        }
    }

    /// Whether the interiors intersect. Touching edges do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min[0] < other.max[0]
            && other.min[0] < self.max[0]
            && self.min[1] < other.max[1]
            && other.min[1] < self.max[1]
    }

    pub fn contains(&self, point: [f32; 2]) -> bool {
        point[0] >= self.min[0]
            && point[0] < self.max[0]
            && point[1] >= self.min[1]
            && point[1] < self.max[1]
    }

    pub fn center(&self) -> [f32; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }
}

/// Size and offset of a box relative to its owner's transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    pub size: [f32; 2],
    pub offset: [f32; 2],
}

impl BoxShape {
    /// Parse `size` (required, both extents positive) and `offset`
    /// (default `[0, 0]`).
    pub fn from_fields(fields: &Fields<'_>) -> Result<Self, ObjectError> {
        let size: [f32; 2] = fields.required("size")?;
        if size[0] <= 0.0 || size[1] <= 0.0 {
            return Err(fields.malformed("size", format!("must be positive, got {size:?}")));
        }
        Ok(Self {
            size,
            offset: fields.optional("offset", [0.0, 0.0])?,
        })
    }

    /// The box in world space. Scale applies to both offset and size.
    pub fn world(&self, transform: &Transform) -> Aabb {
        let [sx, sy] = [transform.scale[0].abs(), transform.scale[1].abs()];
        Aabb::new(
            [
                transform.position[0] + self.offset[0] * sx,
                transform.position[1] + self.offset[1] * sy,
            ],
            [self.size[0] * sx, self.size[1] * sy],
        )
    }
}
