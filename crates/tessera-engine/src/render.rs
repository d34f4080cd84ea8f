//! The renderer seam.
//!
//! GPU work is out of the engine's hands. A [`Renderer`] clears and presents
//! frames and exposes the active [`ShaderProgram`] that objects draw into.
//! [`HeadlessRenderer`] implements it without a GPU and keeps the last
//! presented frame around for inspection.

use std::any::Any;

use tessera_object::render::{QuadDraw, ShaderProgram};
use tracing::{debug, trace};

/// Frame-level rendering operations.
pub trait Renderer {
    /// Start a frame by clearing the framebuffer to `color`.
    fn clear(&mut self, color: [f32; 4]);

    /// The program objects draw with this frame.
    fn program(&mut self) -> &mut dyn ShaderProgram;

    /// Finish the frame and show it.
    fn present(&mut self);

    /// Release GPU resources. Called once at teardown.
    fn shutdown(&mut self) {}

    /// Lets [`Engine::renderer`](crate::engine::Engine::renderer) hand back
    /// the concrete renderer.
    fn as_any(&self) -> &dyn Any;
}

/// A presented frame as recorded by [`HeadlessRenderer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    pub clear_color: [f32; 4],
    /// Quads in submission order.
    pub draws: Vec<QuadDraw>,
}

impl RecordedFrame {
    /// Quads sorted by layer, stable within a layer. This is the order a
    /// real renderer composites them in.
    pub fn layered(&self) -> Vec<&QuadDraw> {
        let mut draws: Vec<&QuadDraw> = self.draws.iter().collect();
        draws.sort_by_key(|quad| quad.layer);
        draws
    }
}

/// Renderer that draws nothing and records what it was asked to draw.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    current: RecordedFrame,
    last: Option<RecordedFrame>,
    in_use: bool,
    frames_presented: u64,
    shut_down: bool,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.last.as_ref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Whether the program is bound right now.
    pub fn program_in_use(&self) -> bool {
        self.in_use
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl ShaderProgram for HeadlessRenderer {
    fn use_program(&mut self) {
        self.in_use = true;
    }

    fn unuse_program(&mut self) {
        self.in_use = false;
    }

    fn submit(&mut self, quad: QuadDraw) {
        if !self.in_use {
            trace!(object = %quad.object, "quad submitted outside use/unuse");
        }
        self.current.draws.push(quad);
    }
}

impl Renderer for HeadlessRenderer {
    fn clear(&mut self, color: [f32; 4]) {
        self.current = RecordedFrame {
            clear_color: color,
            draws: Vec::new(),
        };
    }

    fn program(&mut self) -> &mut dyn ShaderProgram {
        self
    }

    fn present(&mut self) {
        self.frames_presented += 1;
        self.last = Some(std::mem::take(&mut self.current));
    }

    fn shutdown(&mut self) {
        debug!(frames = self.frames_presented, "headless renderer shut down");
        self.shut_down = true;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_object::id::ObjectId;

    fn quad(index: u32, layer: i32) -> QuadDraw {
        QuadDraw {
            layer,
            ..QuadDraw::at(ObjectId::new(index, 0), [0.0, 0.0])
        }
    }

    #[test]
    fn present_keeps_the_frame_and_starts_fresh() {
        let mut renderer = HeadlessRenderer::new();
        renderer.clear([0.3; 4]);
        let program = renderer.program();
        program.use_program();
        program.submit(quad(1, 0));
        program.unuse_program();
        renderer.present();

        let frame = renderer.last_frame().unwrap();
        assert_eq!(frame.clear_color, [0.3; 4]);
        assert_eq!(frame.draws.len(), 1);
        assert_eq!(renderer.frames_presented(), 1);

        renderer.clear([0.0; 4]);
        renderer.present();
        assert!(renderer.last_frame().unwrap().draws.is_empty());
    }

    #[test]
    fn layered_sorts_stably() {
        let frame = RecordedFrame {
            clear_color: [0.0; 4],
            draws: vec![quad(1, 2), quad(2, 0), quad(3, 2), quad(4, -1)],
        };
        let order: Vec<u32> = frame.layered().iter().map(|q| q.object.index()).collect();
        assert_eq!(order, vec![4, 2, 1, 3]);
    }
}
