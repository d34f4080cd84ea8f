//! The draw-side contract between components and the renderer.
//!
//! The renderer itself lives outside this crate. Components only see a
//! [`ShaderProgram`]: an opaque sink that accepts one [`QuadDraw`] per
//! textured quad.

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;
use crate::resource::TextureHandle;

/// Everything needed to draw one textured, tinted quad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadDraw {
    /// Object that submitted the quad.
    pub object: ObjectId,
    /// World-space translation of the quad's origin.
    pub position: [f32; 2],
    /// Rotation in degrees around the origin.
    pub rotation: f32,
    /// Non-uniform scale.
    pub scale: [f32; 2],
    /// Unscaled width and height in world units.
    pub size: [f32; 2],
    /// RGBA tint, each channel in `0.0..=1.0`.
    pub color: [f32; 4],
    /// Bound texture, if any.
    pub texture: Option<TextureHandle>,
    /// Normalized texture-space offset of the sampled region.
    pub tex_offset: [f32; 2],
    /// Normalized texture-space size of the sampled region.
    pub tex_size: [f32; 2],
    /// Draw order; lower layers are drawn first.
    pub layer: i32,
}

impl QuadDraw {
    /// A unit, untextured white quad at `position`.
    pub fn at(object: ObjectId, position: [f32; 2]) -> Self {
        Self {
            object,
            position,
            rotation: 0.0,
            scale: [1.0, 1.0],
            size: [1.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
            tex_offset: [0.0, 0.0],
            tex_size: [1.0, 1.0],
            layer: 0,
        }
    }
}

/// The active shader program for a draw pass.
pub trait ShaderProgram {
    /// Bind the program before the draw pass.
    fn use_program(&mut self);

    /// Unbind the program after the draw pass.
    fn unuse_program(&mut self);

    /// Queue one quad for drawing.
    fn submit(&mut self, quad: QuadDraw);
}
