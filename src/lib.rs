//! nodegl
//!
//! A node-based scene graph engine. Scenes are graphs of typed nodes
//! (shapes, shaders, textures, transforms, animations, compute dispatches,
//! render-to-texture passes) built declaratively and played by a
//! [`Context`], which records each frame into a [`Frame`] that the wgpu
//! [`gpu::Renderer`] executes.
//!
//! High-level modules
//! - `nodes`: the node handle, class table and per-class behaviour
//! - `params`: typed node parameters and their values
//! - `animation`: easings and keyframe evaluation
//! - `context`: scene ownership and frame recording
//! - `render`: recorded draw commands and render states
//! - `gpu`: the wgpu backend
//! - `serialize` / `dot`: text serialization and Graphviz export
//! - `schema` / `codegen` / `specs` / `bindings`: the node specification
//!   file and the typed bindings generated from it
//! - `player`: windowed playback (feature `player`)
//!

pub mod animation;
pub mod bindings;
pub mod codegen;
pub mod context;
pub mod dot;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod nodes;
pub mod params;
#[cfg(feature = "player")]
pub mod player;
pub mod render;
pub mod schema;
pub mod serialize;
pub mod specs;

pub use context::Context;
pub use error::{Error, Result};
pub use nodes::{Node, NodeType};
pub use params::ParamValue;
pub use render::Frame;

/// Installs `env_logger` as the log backend. Calling it more than once only
/// warns.
pub fn init_logging() {
    if let Err(e) = env_logger::try_init() {
        log::warn!("could not initialize logger: {e}");
    }
}
