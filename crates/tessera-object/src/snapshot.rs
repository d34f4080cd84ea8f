//! Level snapshots with BLAKE3 hashing.
//!
//! A [`LevelSnapshot`] re-serializes every live object in level format,
//! together with its current state, and stamps the result with a BLAKE3 hex
//! digest. Two runs that start from the same level and see the same inputs
//! produce the same hash, which is how determinism is checked.
//!
//! ```
//! use tessera_object::prelude::*;
//!
//! let manager = GameObjectManager::new();
//! let snapshot = manager.capture_snapshot();
//! assert!(snapshot.objects.is_empty());
//! assert_eq!(snapshot.hash.len(), 64);
//! assert_eq!(snapshot.hash, manager.state_hash());
//! ```
//!
//! Only what components report through
//! [`Component::fields`](crate::component::Component::fields) is captured.
//! Resolved sibling handles and texture handles are rebuilt by the link pass
//! when the snapshot is loaded again through [`LevelSnapshot::to_level`].

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::id::ObjectId;
use crate::manager::GameObjectManager;
use crate::payload::{LevelDescriptor, ObjectDescriptor};

/// One object as captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub descriptor: ObjectDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
}

/// Every live object of a manager at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Frame counter of the manager at capture time.
    pub frame: u64,
    pub objects: Vec<ObjectSnapshot>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `frame` and `objects`.
    pub hash: String,
}

impl LevelSnapshot {
    /// Capture every live object of `manager`, in dispatch order.
    pub fn capture(manager: &GameObjectManager) -> Self {
        let objects: Vec<ObjectSnapshot> = manager
            .objects()
            .iter()
            .map(|object| ObjectSnapshot {
                id: object.id(),
                descriptor: object.to_descriptor(),
                current_state: object.current_state().map(str::to_owned),
            })
            .collect();
        let frame = manager.frame();
        let hash = compute_hash(frame, &objects);
        Self {
            frame,
            objects,
            hash,
        }
    }

    /// Whether `hash` still matches the captured content.
    pub fn verify(&self) -> bool {
        compute_hash(self.frame, &self.objects) == self.hash
    }

    /// Turn the snapshot back into a loadable level.
    ///
    /// Each object's captured current state becomes its initial state.
    pub fn to_level(&self) -> LevelDescriptor {
        let objects = self
            .objects
            .iter()
            .map(|snap| {
                let mut desc = snap.descriptor.clone();
                if snap.current_state.is_some() {
                    desc.initial_state = snap.current_state.clone();
                }
                desc
            })
            .collect();
        LevelDescriptor { objects }
    }
}

fn compute_hash(frame: u64, objects: &[ObjectSnapshot]) -> String {
    #[derive(Serialize)]
    struct HashableState<'a> {
        frame: u64,
        objects: &'a [ObjectSnapshot],
    }

    let bytes = match serde_json::to_vec(&HashableState { frame, objects }) {
        Ok(bytes) => bytes,
        Err(e) => {
            // Only reachable if a component reports non-string map keys.
            warn!(error = %e, "snapshot serialization failed, hashing frame only");
            frame.to_le_bytes().to_vec()
        }
    };
    blake3::hash(&bytes).to_hex().to_string()
}

impl GameObjectManager {
    /// Capture a [`LevelSnapshot`] of the live objects.
    pub fn capture_snapshot(&self) -> LevelSnapshot {
        LevelSnapshot::capture(self)
    }

    /// BLAKE3 hex digest of the current live state.
    pub fn state_hash(&self) -> String {
        self.capture_snapshot().hash
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
