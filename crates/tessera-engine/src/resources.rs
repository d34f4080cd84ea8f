//! Level, texture and script lookup.
//!
//! [`ResourceManager`] serves assets from a game directory laid out as
//!
//! ```text
//! <root>/levels/level_<id>.json
//! <root>/scripts/<name>.wat | <name>.wasm
//! <root>/textures.json          { "<name>": [width, height], ... }
//! ```
//!
//! and from anything inserted in memory, which always wins over the
//! directory. Texture pixels belong to the renderer; the manager only hands
//! out a stable [`TextureHandle`] and the texture size per name.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tessera_object::payload::LevelDescriptor;
use tessera_object::resource::{ResourceProvider, TextureHandle, TextureInfo};
use tessera_object::ObjectError;
use tracing::{debug, info};

use crate::EngineError;

const SCRIPT_EXTENSIONS: [&str; 2] = ["wat", "wasm"];

#[derive(Debug, Default)]
pub struct ResourceManager {
    root: Option<PathBuf>,
    levels: HashMap<u32, LevelDescriptor>,
    scripts: HashMap<String, Vec<u8>>,
    textures: BTreeMap<String, TextureInfo>,
    next_texture: u32,
}

impl ResourceManager {
    /// A manager with no backing directory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Serve assets from `root`, registering the textures listed in
    /// `root/textures.json` if that file exists.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Io`] if `root` is not a readable directory or the
    ///   texture manifest cannot be read.
    /// - [`EngineError::Config`] if the texture manifest is malformed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(EngineError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
                path: root,
            });
        }

        let mut manager = Self {
            root: Some(root.clone()),
            ..Self::default()
        };

        let manifest = root.join("textures.json");
        if manifest.is_file() {
            let text = std::fs::read_to_string(&manifest).map_err(|source| EngineError::Io {
                path: manifest.clone(),
                source,
            })?;
            let sizes: BTreeMap<String, [u32; 2]> = serde_json::from_str(&text).map_err(|e| {
                EngineError::Config(format!("{}: {e}", manifest.display()))
            })?;
            for (name, [width, height]) in sizes {
                manager.register_texture(&name, width, height);
            }
        }

        info!(
            root = %root.display(),
            textures = manager.textures.len(),
            "resource directory opened"
        );
        Ok(manager)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    // -- registration -------------------------------------------------------

    pub fn insert_level(&mut self, id: u32, level: LevelDescriptor) {
        self.levels.insert(id, level);
    }

    /// Parse `text` as level `id` and keep it in memory.
    pub fn insert_level_json(&mut self, id: u32, text: &str) -> Result<(), ObjectError> {
        let level = LevelDescriptor::from_json_str(id, text)?;
        self.insert_level(id, level);
        Ok(())
    }

    pub fn insert_script(&mut self, name: &str, source: impl Into<Vec<u8>>) {
        self.scripts.insert(name.to_owned(), source.into());
    }

    /// Register a texture by name. Re-registering a name keeps its handle
    /// and updates the size.
    pub fn register_texture(&mut self, name: &str, width: u32, height: u32) -> TextureHandle {
        if let Some(info) = self.textures.get_mut(name) {
            info.width = width;
            info.height = height;
            return info.handle;
        }
        self.next_texture += 1;
        let handle = TextureHandle(self.next_texture);
        self.textures.insert(
            name.to_owned(),
            TextureInfo {
                handle,
                width,
                height,
            },
        );
        debug!(texture = name, handle = handle.0, width, height, "texture registered");
        handle
    }

    /// Registered texture names, sorted.
    pub fn texture_names(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    // -- directory lookup ---------------------------------------------------

    fn level_path(&self, id: u32) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join("levels").join(format!("level_{id}.json")))
    }

    fn read_script(&self, name: &str) -> Option<Vec<u8>> {
        // Names come from level data; never let them leave the scripts dir.
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        let dir = self.root.as_ref()?.join("scripts");
        SCRIPT_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{name}.{ext}")))
            .find_map(|path| std::fs::read(path).ok())
    }
}

impl ResourceProvider for ResourceManager {
    fn level(&self, id: u32) -> Result<LevelDescriptor, ObjectError> {
        if let Some(level) = self.levels.get(&id) {
            return Ok(level.clone());
        }
        let path = self.level_path(id).ok_or_else(|| ObjectError::LevelLoad {
            level: id,
            details: "no such level in memory and no resource directory".to_owned(),
        })?;
        let text = std::fs::read_to_string(&path).map_err(|e| ObjectError::LevelLoad {
            level: id,
            details: format!("{}: {e}", path.display()),
        })?;
        debug!(level = id, path = %path.display(), "level read from disk");
        LevelDescriptor::from_json_str(id, &text)
    }

    fn texture(&self, name: &str) -> Option<TextureInfo> {
        self.textures.get(name).copied()
    }

    fn script(&self, name: &str) -> Option<Vec<u8>> {
        self.scripts
            .get(name)
            .cloned()
            .or_else(|| self.read_script(name))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh directory under the system temp dir, removed on drop.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new(label: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "tessera-resources-{label}-{}",
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(path.join("levels")).unwrap();
            std::fs::create_dir_all(path.join("scripts")).unwrap();
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    const LEVEL: &str = r#"{ "objects": [ { "name": "hero", "components": [
        { "type": "TRANSFORM", "fields": { "position": [1.0, 2.0] } } ] } ] }"#;

    #[test]
    fn textures_get_stable_handles() {
        let mut resources = ResourceManager::in_memory();
        let hero = resources.register_texture("hero", 64, 32);
        let tiles = resources.register_texture("tiles", 128, 128);
        assert_ne!(hero, tiles);
        assert_eq!(resources.register_texture("hero", 96, 48), hero);
        assert_eq!(
            resources.texture("hero"),
            Some(TextureInfo {
                handle: hero,
                width: 96,
                height: 48
            })
        );
        assert_eq!(resources.texture("missing"), None);
        assert_eq!(resources.texture_names().collect::<Vec<_>>(), vec!["hero", "tiles"]);
    }

    #[test]
    fn in_memory_level_and_script() {
        let mut resources = ResourceManager::in_memory();
        resources.insert_level_json(2, LEVEL).unwrap();
        resources.insert_script("patrol", "(module)");
        assert_eq!(resources.level(2).unwrap().objects.len(), 1);
        assert_eq!(resources.script("patrol").unwrap(), b"(module)".to_vec());
        assert!(matches!(
            resources.level(3),
            Err(ObjectError::LevelLoad { level: 3, .. })
        ));
    }

    #[test]
    fn bad_level_json_is_a_level_load_error() {
        let mut resources = ResourceManager::in_memory();
        let err = resources.insert_level_json(1, "{ \"objects\": 4 }").unwrap_err();
        assert!(matches!(err, ObjectError::LevelLoad { level: 1, .. }));
    }

    #[test]
    fn directory_levels_scripts_and_textures() {
        let dir = TempDir::new("dir");
        std::fs::write(dir.0.join("levels/level_0.json"), LEVEL).unwrap();
        std::fs::write(dir.0.join("scripts/patrol.wat"), "(module)").unwrap();
        std::fs::write(dir.0.join("textures.json"), r#"{ "hero": [96, 48] }"#).unwrap();

        let mut resources = ResourceManager::open(&dir.0).unwrap();
        assert_eq!(resources.root(), Some(dir.0.as_path()));
        assert_eq!(resources.level(0).unwrap().objects[0].name.as_deref(), Some("hero"));
        assert_eq!(resources.script("patrol").unwrap(), b"(module)".to_vec());
        assert_eq!(resources.texture("hero").unwrap().width, 96);
        assert!(resources.script("../levels/level_0").is_none());
        assert!(matches!(resources.level(9), Err(ObjectError::LevelLoad { level: 9, .. })));

        resources.insert_script("patrol", "(module (func (export \"tick\")))");
        assert_ne!(resources.script("patrol").unwrap(), b"(module)".to_vec());
    }

    #[test]
    fn opening_a_missing_directory_fails() {
        let err = ResourceManager::open("/definitely/not/a/game").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
