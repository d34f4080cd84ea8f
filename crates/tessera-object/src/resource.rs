//! Read-only access to externally loaded assets.
//!
//! Asset loading itself is an external concern. The object runtime only needs
//! to fetch a parsed level by id, turn texture names into handles while
//! linking, and hand script sources to the scripting hook.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payload::LevelDescriptor;
use crate::ObjectError;

/// Opaque id of a texture owned by the renderer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureHandle({})", self.0)
    }
}

/// Texture metadata components need to convert pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Get-by-id access to levels, textures and scripts.
pub trait ResourceProvider {
    /// The parsed description of level `id`.
    fn level(&self, id: u32) -> Result<LevelDescriptor, ObjectError>;

    /// Look up a texture by name.
    fn texture(&self, name: &str) -> Option<TextureInfo>;

    /// Source bytes (WAT text or WASM binary) of a behavior script.
    fn script(&self, name: &str) -> Option<Vec<u8>>;
}

/// A provider with no assets at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResources;

impl ResourceProvider for EmptyResources {
    fn level(&self, id: u32) -> Result<LevelDescriptor, ObjectError> {
        Err(ObjectError::LevelLoad {
            level: id,
            details: "no level source configured".to_owned(),
        })
    }

    fn texture(&self, _name: &str) -> Option<TextureInfo> {
        None
    }

    fn script(&self, _name: &str) -> Option<Vec<u8>> {
        None
    }
}
