//! Rendering context.
//!
//! A [`Context`] owns the scene being played. Each call to [`Context::draw`]
//! brings the scene graph to time `t` and records a [`Frame`] which a
//! [`crate::gpu::Renderer`] can then execute.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::nodes::Node;
use crate::render::{DrawState, Frame};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

pub const LOG_TARGET: &str = "node.gl";

#[derive(Debug)]
pub struct Context {
    id: u64,
    scene: Option<Node>,
    viewport: [i32; 4],
    clear_color: [f64; 4],
}

impl Context {
    pub fn new() -> Self {
        log::info!(target: LOG_TARGET, "context created, version {}", env!("CARGO_PKG_VERSION"));
        Self {
            id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
            scene: None,
            viewport: [0, 0, 0, 0],
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Viewport as `[x, y, width, height]`.
    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        log::debug!(target: LOG_TARGET, "viewport set to {x},{y} {width}x{height}");
        self.viewport = [x, y, width, height];
    }

    pub fn viewport(&self) -> [i32; 4] {
        self.viewport
    }

    pub fn set_clear_color(&mut self, color: [f64; 4]) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> [f64; 4] {
        self.clear_color
    }

    pub fn set_log_min_level(level: log::LevelFilter) {
        log::set_max_level(level);
    }

    /// Replaces the scene. The previous scene is detached and its runtime
    /// state released; `None` only detaches.
    pub fn set_scene(&mut self, scene: Option<Node>) -> Result<()> {
        if let Some(scene) = &scene {
            scene.check_attachable(self.id)?;
        }
        if let Some(old) = self.scene.take() {
            old.detach_scene(self.id);
        }
        if let Some(scene) = &scene {
            scene.attach_scene(self.id);
            log::debug!(target: LOG_TARGET, "scene set to {}", scene.label());
        }
        self.scene = scene;
        Ok(())
    }

    pub fn scene(&self) -> Option<&Node> {
        self.scene.as_ref()
    }

    /// Updates the scene to time `t` and records it.
    pub fn draw(&mut self, t: f64) -> Result<Frame> {
        let scene = match &self.scene {
            Some(scene) => scene,
            None => {
                log::error!(target: LOG_TARGET, "scene is not set, can not draw");
                return Err(Error::NoScene);
            }
        };
        log::debug!(target: LOG_TARGET, "draw at t={t}");
        scene.update(t)?;
        let mut state = DrawState::new(self.clear_color);
        scene.draw(&mut state)?;
        Ok(Frame {
            time: t,
            viewport: self.viewport,
            clear_color: self.clear_color,
            commands: state.commands,
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(scene) = self.scene.take() {
            scene.detach_scene(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeType;

    #[test]
    fn draw_without_scene_fails() {
        let mut ctx = Context::new();
        assert!(matches!(ctx.draw(0.0), Err(Error::NoScene)));
    }

    #[test]
    fn scene_belongs_to_one_context() {
        let group = Node::new(NodeType::Group);
        let mut first = Context::new();
        let mut second = Context::new();
        first.set_scene(Some(group.clone())).unwrap();
        assert!(matches!(second.set_scene(Some(group.clone())), Err(Error::AlreadyAttached(_))));

        first.set_scene(None).unwrap();
        second.set_scene(Some(group)).unwrap();
    }

    #[test]
    fn dropping_the_context_releases_the_scene() {
        let group = Node::new(NodeType::Group);
        {
            let mut ctx = Context::new();
            ctx.set_scene(Some(group.clone())).unwrap();
            ctx.draw(0.0).unwrap();
            assert!(group.is_ready());
        }
        assert!(!group.is_ready());
        Context::new().set_scene(Some(group)).unwrap();
    }

    #[test]
    fn removed_children_leave_the_context() {
        let group = Node::new(NodeType::Group);
        let child = Node::new(NodeType::Group);
        let kept = Node::new(NodeType::Group);
        child.add("children", [kept.clone()]).unwrap();
        group.add("children", [child.clone(), kept.clone()]).unwrap();

        let mut ctx = Context::new();
        ctx.set_scene(Some(group.clone())).unwrap();
        ctx.draw(0.0).unwrap();
        group.set("children", vec![kept.clone()]).unwrap();
        assert!(!child.is_ready());
        assert!(kept.is_ready());

        let mut other = Context::new();
        other.set_scene(Some(child.clone())).unwrap_err();
        drop(ctx);
        other.set_scene(Some(child)).unwrap();
    }

    #[test]
    fn removed_children_of_a_dropped_context_can_be_reused() {
        let group = Node::new(NodeType::Group);
        let child = Node::new(NodeType::Group);
        group.add("children", [child.clone()]).unwrap();
        {
            let mut ctx = Context::new();
            ctx.set_scene(Some(group.clone())).unwrap();
            ctx.draw(0.0).unwrap();
            group.set("children", Vec::<Node>::new()).unwrap();
        }
        Context::new().set_scene(Some(child)).unwrap();
    }

    #[test]
    fn edits_are_picked_up_at_the_same_time() {
        let quad = Node::new(NodeType::Quad);
        quad.set("width", [1.0f32, 0.0, 0.0]).unwrap();
        quad.set("height", [0.0f32, 1.0, 0.0]).unwrap();
        let shape = Node::new(NodeType::TexturedShape);
        shape.set("shape", quad.clone()).unwrap();
        shape.set("shader", Node::new(NodeType::Shader)).unwrap();

        let mut ctx = Context::new();
        ctx.set_scene(Some(shape)).unwrap();
        ctx.draw(0.0).unwrap();
        quad.set("corner", [-1.0f32, -1.0, 0.0]).unwrap();
        let frame = ctx.draw(0.0).unwrap();
        let geometry = &frame.shapes()[0].geometry;
        assert_eq!(geometry.vertices[0].position, [-1.0, -1.0, 0.0]);
    }
}
