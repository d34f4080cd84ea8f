//! GLQUAD: a textured, tinted quad drawn at its owner's transform.
//!
//! Fields:
//!
//! | Field | Type | Default |
//! |---|---|---|
//! | `size` | `[f32; 2]` | `[24.0, 48.0]` |
//! | `color` | `[f32; 4]`, each channel `0..=255` | `[255, 255, 255, 255]` |
//! | `texture` | texture name | none |
//! | `tex_coords` | `[x, y, w, h]` in texture pixels | whole texture |
//! | `layer` | `i32` | `0` |
//!
//! Colours are authored in `0..=255` and submitted in `0.0..=1.0`. Texture
//! coordinates are authored in pixels and converted by the size of the named
//! texture when the quad is linked.

use tessera_object::component::{Component, DrawContext, LinkContext, Sibling};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::render::{QuadDraw, ShaderProgram};
use tessera_object::resource::TextureInfo;
use tessera_object::ObjectError;

use crate::tags::{GLQUAD, TRANSFORM};
use crate::transform::Transform;

#[derive(Debug, Clone)]
pub struct GlQuad {
    owner: ObjectId,
    pub size: [f32; 2],
    /// Tint as authored, each channel in `0..=255`.
    pub color: [f32; 4],
    pub texture_name: Option<String>,
    /// Sampled region in texture pixels.
    pub tex_coords: Option<[f32; 4]>,
    pub layer: i32,
    /// Extra normalized offset, driven by ANIMATION.
    tex_offset: [f32; 2],
    transform: Option<Sibling<Transform>>,
    texture: Option<TextureInfo>,
}

impl GlQuad {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(GLQUAD, payload)?;

        let color: [f32; 4] = fields.optional("color", [255.0; 4])?;
        if color.iter().any(|c| !(0.0..=255.0).contains(c)) {
            return Err(fields.malformed(
                "color",
                format!("channels must be in 0..=255, got {color:?}"),
            ));
        }

        let texture_name: Option<String> = fields.optional("texture", None)?;
        let tex_coords: Option<[f32; 4]> = fields.optional("tex_coords", None)?;
        if tex_coords.is_some() && texture_name.is_none() {
            return Err(fields.malformed("tex_coords", "requires 'texture'".to_owned()));
        }

        Ok(Self {
            owner: ObjectId::DETACHED,
            size: fields.optional("size", [24.0, 48.0])?,
            color,
            texture_name,
            tex_coords,
            layer: fields.optional("layer", 0)?,
            tex_offset: [0.0, 0.0],
            transform: None,
            texture: None,
        })
    }

    /// Shift the sampled region by a normalized texture-space offset.
    pub fn set_tex_offset(&mut self, x: f32, y: f32) {
        self.tex_offset = [x, y];
    }

    pub fn tex_offset(&self) -> [f32; 2] {
        self.tex_offset
    }

    /// Tint converted to `0.0..=1.0`.
    pub fn normalized_color(&self) -> [f32; 4] {
        self.color.map(|c| c / 255.0)
    }

    /// The texture resolved during link, if any.
    pub fn texture(&self) -> Option<TextureInfo> {
        self.texture
    }

    /// Sampled region as normalized `(offset, size)`.
    pub fn normalized_region(&self) -> ([f32; 2], [f32; 2]) {
        match (self.tex_coords, self.texture) {
            (Some([x, y, w, h]), Some(info)) if info.width > 0 && info.height > 0 => {
                let (tw, th) = (info.width as f32, info.height as f32);
                ([x / tw, y / th], [w / tw, h / th])
            }
            _ => ([0.0, 0.0], [1.0, 1.0]),
        }
    }
}

impl Component for GlQuad {
    component_basics!(GLQUAD);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.transform = Some(ctx.require::<Transform>(GLQUAD, TRANSFORM)?);
        if let Some(name) = &self.texture_name {
            let info = ctx
                .resources
                .texture(name)
                .ok_or_else(|| ctx.missing(GLQUAD, &format!("texture '{name}'")))?;
            self.texture = Some(info);
        }
        Ok(())
    }

    fn is_drawable(&self) -> bool {
        true
    }

    fn draw(
        &self,
        ctx: &DrawContext<'_>,
        program: &mut dyn ShaderProgram,
    ) -> Result<(), ObjectError> {
        let transform = self
            .transform
            .and_then(|h| ctx.siblings.get(h))
            .ok_or_else(|| ctx.runtime_error(GLQUAD, "transform not linked"))?;
        let (region_offset, region_size) = self.normalized_region();

        program.submit(QuadDraw {
            object: ctx.object,
            position: transform.position,
            rotation: transform.rotation,
            scale: transform.scale,
            size: self.size,
            color: self.normalized_color(),
            texture: self.texture.map(|t| t.handle),
            tex_offset: [
                region_offset[0] + self.tex_offset[0],
                region_offset[1] + self.tex_offset[1],
            ],
            tex_size: region_size,
            layer: self.layer,
        });
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        let mut fields = serde_json::json!({
            "size": self.size,
            "color": self.color,
            "layer": self.layer,
        });
        if let Some(name) = &self.texture_name {
            fields["texture"] = serde_json::json!(name);
        }
        if let Some(coords) = self.tex_coords {
            fields["tex_coords"] = serde_json::json!(coords);
        }
        fields
    }
}

creator!(
    /// Creator for [`GlQuad`].
    GlQuadCreator => GlQuad
);
