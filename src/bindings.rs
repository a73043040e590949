//! Typed wrappers generated from `specs/nodes.specs` at build time.
//!
//! ```no_run
//! use nodegl::bindings::{Quad, Shader, TexturedShape};
//!
//! # fn main() -> nodegl::Result<()> {
//! let quad = Quad::new([-1.0, -1.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0])?;
//! let shape = TexturedShape::new(&quad, Shader::new()?)?;
//! shape.set_name("background")?;
//! println!("{}", shape.serialize());
//! # Ok(())
//! # }
//! ```

include!(concat!(env!("OUT_DIR"), "/nodes_def.rs"));
