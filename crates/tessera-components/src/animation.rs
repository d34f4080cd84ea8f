//! ANIMATION: flip-book animation over a GLQUAD's texture region.
//!
//! An animation owns named clips. Each clip is a list of normalized texture
//! offsets shown for `frame_time` seconds each. When the owner enters a
//! behavioral state that has a clip of the same name, that clip restarts;
//! other states keep the running clip.
//!
//! ```json
//! { "type": "ANIMATION", "fields": {
//!     "default_clip": "IDLE",
//!     "clips": {
//!       "IDLE": { "frames": [[0.0, 0.0]] },
//!       "WALK": { "frames": [[0.0, 0.0], [0.25, 0.0]], "frame_time": 0.15 }
//!     } } }
//! ```
//!
//! `frame_time` must be finite and at least [`MIN_FRAME_TIME`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_object::component::{Component, LinkContext, Sibling, UpdateContext};
use tessera_object::id::ObjectId;
use tessera_object::payload::Fields;
use tessera_object::ObjectError;
use tracing::trace;

use crate::quad::GlQuad;
use crate::tags::{ANIMATION, GLQUAD};

/// Shortest accepted `frame_time`, in seconds.
pub const MIN_FRAME_TIME: f32 = 0.001;

fn default_frame_time() -> f32 {
    0.1
}

fn default_looping() -> bool {
    true
}

/// One named sequence of texture offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub frames: Vec<[f32; 2]>,
    /// Seconds each frame is shown.
    #[serde(default = "default_frame_time")]
    pub frame_time: f32,
    #[serde(default = "default_looping")]
    pub looping: bool,
}

#[derive(Debug, Clone)]
pub struct Animation {
    owner: ObjectId,
    clips: BTreeMap<String, Clip>,
    default_clip: String,
    active: String,
    frame: usize,
    timer: f32,
    finished: bool,
    /// Set when the quad has not seen the current frame yet.
    dirty: bool,
    quad: Option<Sibling<GlQuad>>,
}

impl Animation {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, ObjectError> {
        let fields = Fields::new(ANIMATION, payload)?;
        let clips: BTreeMap<String, Clip> = fields.required("clips")?;
        if clips.is_empty() {
            return Err(fields.malformed("clips", "must name at least one clip".to_owned()));
        }
        for (name, clip) in &clips {
            if clip.frames.is_empty() {
                return Err(fields.malformed("clips", format!("clip '{name}' has no frames")));
            }
            if !clip.frame_time.is_finite() || clip.frame_time < MIN_FRAME_TIME {
                return Err(fields.malformed(
                    "clips",
                    format!(
                        "clip '{name}' frame_time must be at least {MIN_FRAME_TIME}, got {}",
                        clip.frame_time
                    ),
                ));
            }
        }

        let default_clip: String = match fields.optional::<Option<String>>("default_clip", None)? {
            Some(name) if clips.contains_key(&name) => name,
            Some(name) => {
                return Err(fields.malformed("default_clip", format!("no clip named '{name}'")))
            }
            // BTreeMap keys are sorted, so the fallback is stable.
            None => clips.keys().next().cloned().unwrap_or_default(),
        };

        Ok(Self {
            owner: ObjectId::DETACHED,
            active: default_clip.clone(),
            default_clip,
            clips,
            frame: 0,
            timer: 0.0,
            finished: false,
            dirty: true,
            quad: None,
        })
    }

    pub fn active_clip(&self) -> &str {
        &self.active
    }

    /// Index of the shown frame within the active clip.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// A non-looping clip that reached its last frame.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    /// Restart playback with `clip`. Returns `false` if there is no such clip.
    pub fn play(&mut self, clip: &str) -> bool {
        if !self.clips.contains_key(clip) {
            return false;
        }
        self.active = clip.to_owned();
        self.frame = 0;
        self.timer = 0.0;
        self.finished = false;
        self.dirty = true;
        true
    }

    fn current_offset(&self) -> Option<[f32; 2]> {
        self.clips.get(&self.active)?.frames.get(self.frame).copied()
    }

    fn advance(&mut self, dt: f32) {
        let Some(clip) = self.clips.get(&self.active) else {
            return;
        };
        if self.finished {
            return;
        }
        self.timer += dt;
        if self.timer < clip.frame_time {
            return;
        }
        let steps = (self.timer / clip.frame_time).floor();
        self.timer %= clip.frame_time;

        let len = clip.frames.len();
        let previous = self.frame;
        if clip.looping {
            self.frame = (self.frame + (steps % len as f32) as usize) % len;
        } else if steps >= (len - self.frame) as f32 {
            self.frame = len - 1;
            self.finished = true;
            self.timer = 0.0;
        } else {
            self.frame += steps as usize;
        }
        if self.frame != previous {
            self.dirty = true;
        }
    }
}

impl Component for Animation {
    component_basics!(ANIMATION);

    fn link(&mut self, ctx: &mut LinkContext<'_>) -> Result<(), ObjectError> {
        self.quad = Some(ctx.require::<GlQuad>(ANIMATION, GLQUAD)?);
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> Result<(), ObjectError> {
        let handle = self
            .quad
            .ok_or_else(|| ctx.runtime_error(ANIMATION, "quad not linked"))?;
        self.advance(ctx.dt);
        if !self.dirty {
            return Ok(());
        }
        if let (Some([x, y]), Some(quad)) = (self.current_offset(), ctx.siblings.get_mut(handle)) {
            quad.set_tex_offset(x, y);
            self.dirty = false;
        }
        Ok(())
    }

    fn on_state_enter(&mut self, state: &str) {
        if !self.play(state) {
            trace!(
                object = %self.owner,
                state,
                clip = %self.active,
                "no clip for state, keeping current"
            );
        }
    }

    fn fields(&self) -> serde_json::Value {
        serde_json::json!({
            "clips": self.clips,
            "default_clip": self.default_clip,
        })
    }
}

creator!(
    /// Creator for [`Animation`].
    AnimationCreator => Animation
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TRANSFORM;
    use crate::testing::*;
    use tessera_object::component::NoInput;
    use tessera_object::resource::EmptyResources;

    fn clips() -> serde_json::Value {
        serde_json::json!({
            "default_clip": "IDLE",
            "clips": {
                "IDLE": { "frames": [[0.0, 0.0]] },
                "WALK": { "frames": [[0.0, 0.5], [0.25, 0.5], [0.5, 0.5]], "frame_time": 0.25 },
                "DIE": {
                    "frames": [[0.0, 0.75], [0.25, 0.75]],
                    "frame_time": 0.25,
                    "looping": false
                }
            }
        })
    }

    fn animated() -> tessera_object::object::GameObject {
        object_with_states(
            &EmptyResources,
            &["IDLE", "WALK", "DIE", "JUMP"],
            &[
                (TRANSFORM, serde_json::json!({ "position": [0.0, 0.0] })),
                (GLQUAD, serde_json::json!({})),
                (ANIMATION, clips()),
            ],
        )
        .unwrap()
    }

    fn quad_offset(obj: &tessera_object::object::GameObject) -> [f32; 2] {
        obj.component::<GlQuad>(GLQUAD).unwrap().tex_offset()
    }

    fn anim(obj: &tessera_object::object::GameObject) -> &Animation {
        obj.component::<Animation>(ANIMATION).unwrap()
    }

    #[test]
    fn state_enter_switches_clip() {
        let mut obj = animated();
        assert_eq!(anim(&obj).active_clip(), "IDLE");

        obj.change_state("WALK").unwrap();
        assert_eq!(anim(&obj).active_clip(), "WALK");
        step(&mut obj, &NoInput, 0.1, 1);
        assert_eq!(quad_offset(&obj), [0.0, 0.5]);
    }

    #[test]
    fn state_without_clip_keeps_running_clip() {
        let mut obj = animated();
        obj.change_state("WALK").unwrap();
        step(&mut obj, &NoInput, 0.25, 1);
        obj.change_state("JUMP").unwrap();
        assert_eq!(anim(&obj).active_clip(), "WALK");
        assert_eq!(anim(&obj).frame(), 1);
    }

    #[test]
    fn looping_clip_wraps() {
        let mut obj = animated();
        obj.change_state("WALK").unwrap();
        step(&mut obj, &NoInput, 0.25, 3);
        assert_eq!(anim(&obj).frame(), 0);
        step(&mut obj, &NoInput, 0.25, 2);
        assert_eq!(anim(&obj).frame(), 2);
        assert_eq!(quad_offset(&obj), [0.5, 0.5]);
    }

    #[test]
    fn one_shot_clip_holds_last_frame() {
        let mut obj = animated();
        obj.change_state("DIE").unwrap();
        step(&mut obj, &NoInput, 0.25, 5);
        assert_eq!(anim(&obj).frame(), 1);
        assert!(anim(&obj).is_finished());
        assert_eq!(quad_offset(&obj), [0.25, 0.75]);
    }

    #[test]
    fn unknown_default_clip_is_malformed() {
        let err = Animation::from_payload(&serde_json::json!({
            "default_clip": "RUN",
            "clips": { "IDLE": { "frames": [[0.0, 0.0]] } }
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            ObjectError::MalformedComponentData { ref field, .. } if field == "default_clip"
        ));
    }

    #[test]
    fn empty_clip_is_malformed() {
        let payload = serde_json::json!({ "clips": { "IDLE": { "frames": [] } } });
        let err = Animation::from_payload(&payload)
            .unwrap_err();
        assert!(matches!(
            err,
            ObjectError::MalformedComponentData { ref field, .. } if field == "clips"
        ));
    }

    #[test]
    fn frame_time_below_minimum_is_malformed() {
        for frame_time in [1e-12, 0.0, -0.5] {
            let err = Animation::from_payload(&serde_json::json!({
                "clips": { "IDLE": {
                    "frames": [[0.0, 0.0], [0.5, 0.0]],
                    "frame_time": frame_time
                } }
            }))
            .unwrap_err();
            assert!(
                matches!(
                    err,
                    ObjectError::MalformedComponentData { ref field, .. } if field == "clips"
                ),
                "frame_time {frame_time} accepted"
            );
        }
    }

    #[test]
    fn long_steps_skip_frames_without_looping_per_frame() {
        let mut fast = Animation::from_payload(&serde_json::json!({
            "clips": { "SPIN": {
                "frames": [[0.0, 0.0], [0.25, 0.0], [0.5, 0.0]],
                "frame_time": MIN_FRAME_TIME
            } }
        }))
        .unwrap();
        fast.advance(0.0105);
        assert_eq!(fast.frame(), 1);

        let mut obj = animated();
        obj.change_state("WALK").unwrap();
        // 4000 frame times in one step.
        step(&mut obj, &NoInput, 1000.0, 1);
        assert_eq!(anim(&obj).frame(), 1);
        assert_eq!(quad_offset(&obj), [0.25, 0.5]);

        obj.change_state("DIE").unwrap();
        step(&mut obj, &NoInput, 1000.0, 1);
        assert!(anim(&obj).is_finished());
        assert_eq!(anim(&obj).frame(), 1);
    }

    #[test]
    fn animation_needs_quad() {
        let err = object(&EmptyResources, &[(ANIMATION, clips())]).unwrap_err();
        assert!(matches!(
            err,
            ObjectError::LinkResolutionFailure { ref dependency, .. } if dependency == GLQUAD
        ));
    }
}
