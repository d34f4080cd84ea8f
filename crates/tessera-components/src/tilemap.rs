//! TILEMAP: a grid of atlas tiles anchored at the owner's transform.
//!
//! `tiles` is row-major, `columns` wide; `-1` marks an empty cell. Row 0 sits
//! at the transform position and rows grow along +y. A tile id `n` samples
//! cell `n` of the texture atlas, counted row-major over `atlas_columns` by
//! `atlas_rows` cells.
//!
//! `solid` lists the tile ids that block movement; when absent every
//! non-empty tile is solid.

use std::collections::BTreeSet;

use tessera_object::component::{Component, DrawContext, LinkContext, Sibling};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::render::{QuadDraw, ShaderProgram};
use tessera_object::resource::TextureHandle;
use tessera_object::ObjectError;

use crate::tags::{TILEMAP, TRANSFORM};
use crate::transform::Transform;

pub const EMPTY_TILE: i32 = -1;

#[derive(Debug, Clone)]
pub struct Tilemap {
    owner: ObjectId,
    pub tile_size: [f32; 2],
    columns: usize,
    tiles: Vec<i32>,
    pub texture_name: Option<String>,
    pub atlas_columns: u32,
    pub atlas_rows: u32,
    solid: Option<BTreeSet<i32>>,
    pub layer: i32,
    transform: Option<Sibling<Transform>>,
    texture: Option<TextureHandle>,
}

impl Tilemap {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(TILEMAP, payload)?;

        let columns: usize = fields.required("columns")?;
        if columns == 0 {
            return Err(fields.malformed("columns", "must be at least 1".to_owned()));
        }
        let tiles: Vec<i32> = fields.required("tiles")?;
        if tiles.len() % columns != 0 {
            return Err(fields.malformed(
                "tiles",
                format!("{} tiles do not fill rows of {columns}", tiles.len()),
            ));
        }

        let atlas_columns: u32 = fields.optional("atlas_columns", 1)?;
        let atlas_rows: u32 = fields.optional("atlas_rows", 1)?;
        if atlas_columns == 0 || atlas_rows == 0 {
            return Err(fields.malformed(
                "atlas_columns",
                "atlas must have at least one cell".to_owned(),
            ));
        }
        let cells = atlas_columns
            .checked_mul(atlas_rows)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| {
                fields.malformed(
                    "atlas_columns",
                    format!("atlas of {atlas_columns}x{atlas_rows} cells is too large"),
                )
            })?;
        if let Some(bad) = tiles.iter().find(|&&t| t < EMPTY_TILE || t >= cells) {
            return Err(fields.malformed(
                "tiles",
                format!("tile id {bad} outside atlas of {cells} cells"),
            ));
        }

        let tile_size: [f32; 2] = fields.optional("tile_size", [16.0, 16.0])?;
        if tile_size.iter().any(|s| *s <= 0.0) {
            return Err(fields.malformed(
                "tile_size",
                format!("must be positive, got {tile_size:?}"),
            ));
        }

        Ok(Self {
            owner: ObjectId::DETACHED,
            tile_size,
            columns,
            tiles,
            texture_name: fields.optional("texture", None)?,
            atlas_columns,
            atlas_rows,
            solid: fields.optional("solid", None)?,
            layer: fields.optional("layer", 0)?,
            transform: None,
            texture: None,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.tiles.len() / self.columns
    }

    /// Tile id at a cell, or `None` for empty and out-of-range cells.
    pub fn tile(&self, column: usize, row: usize) -> Option<i32> {
        if column >= self.columns {
            return None;
        }
        self.tiles
            .get(row * self.columns + column)
            .copied()
            .filter(|&t| t != EMPTY_TILE)
    }

    pub fn set_tile(&mut self, column: usize, row: usize, tile: i32) -> bool {
        if column >= self.columns || tile < EMPTY_TILE {
            return false;
        }
        match self.tiles.get_mut(row * self.columns + column) {
            Some(cell) => {
                *cell = tile;
                true
            }
            None => false,
        }
    }

    /// The cell containing a world-space point, for a map placed at `transform`.
    pub fn tile_at_world(&self, transform: &Transform, point: [f32; 2]) -> Option<(usize, usize)> {
        let local = [
            (point[0] - transform.position[0]) / self.tile_size[0],
            (point[1] - transform.position[1]) / self.tile_size[1],
        ];
        if local[0] < 0.0 || local[1] < 0.0 {
            return None;
        }
        let (column, row) = (local[0] as usize, local[1] as usize);
        (column < self.columns && row < self.rows()).then_some((column, row))
    }

    pub fn is_solid_at(&self, transform: &Transform, point: [f32; 2]) -> bool {
        self.tile_at_world(transform, point)
            .and_then(|(c, r)| self.tile(c, r))
            .is_some_and(|id| self.solid.as_ref().map_or(true, |s| s.contains(&id)))
    }

    fn atlas_region(&self, tile: i32) -> ([f32; 2], [f32; 2]) {
        let (ac, ar) = (self.atlas_columns as f32, self.atlas_rows as f32);
        let id = tile as u32;
        (
            [(id % self.atlas_columns) as f32 / ac, (id / self.atlas_columns) as f32 / ar],
            [1.0 / ac, 1.0 / ar],
        )
    }
}

impl Component for Tilemap {
    component_basics!(TILEMAP);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.transform = Some(ctx.require::<Transform>(TILEMAP, TRANSFORM)?);
        if let Some(name) = &self.texture_name {
            let info = ctx
                .resources
                .texture(name)
                .ok_or_else(|| ctx.missing(TILEMAP, &format!("texture '{name}'")))?;
            self.texture = Some(info.handle);
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
        let origin = self
            .transform
            .and_then(|h| ctx.siblings.get(h))
            .map(|t| t.position)
            .ok_or_else(|| ctx.runtime_error(TILEMAP, "transform not linked"))?;

        for (i, &tile) in self.tiles.iter().enumerate() {
            if tile == EMPTY_TILE {
                continue;
            }
            let (column, row) = (i % self.columns, i / self.columns);
            let (tex_offset, tex_size) = self.atlas_region(tile);
            let position = [
                origin[0] + column as f32 * self.tile_size[0],
                origin[1] + row as f32 * self.tile_size[1],
            ];
            program.submit(QuadDraw {
                size: self.tile_size,
                texture: self.texture,
                tex_offset,
                tex_size,
                layer: self.layer,
                ..QuadDraw::at(ctx.object, position)
            });
        }
        Ok(())
    }

    fn fields(&self) -> serde_json::Value {
        let mut fields = serde_json::json!({
            "tile_size": self.tile_size,
            "columns": self.columns,
            "tiles": self.tiles,
            "atlas_columns": self.atlas_columns,
            "atlas_rows": self.atlas_rows,
            "layer": self.layer,
        });
        if let Some(name) = &self.texture_name {
            fields["texture"] = serde_json::json!(name);
        }
        if let Some(solid) = &self.solid {
            fields["solid"] = serde_json::json!(solid);
        }
        fields
    }
}

creator!(
    /// Creator for [`Tilemap`].
    TilemapCreator => Tilemap
);
