//! Buffer and geometry nodes.

use std::rc::Rc;

use super::{Node, NodeType, Runtime, animate};
use crate::error::{Error, Result};
use crate::geometry::{BufferData, DrawMode, Geometry, IndexType, Vertex};

const PRIMITIVE_ANIMKF: [&str; 3] = ["animkf_x", "animkf_y", "animkf_z"];

pub(super) fn init_buffer(node: &Node) -> Result<Runtime> {
    let inner = node.inner();
    let n = inner.int("n");
    if n < 0 {
        return Err(Error::init(inner.ty.name(), format!("invalid element count {n}")));
    }
    let data = BufferData::new(inner.ty.components(), n as usize, inner.data("data"))
        .map_err(|reason| Error::init(inner.ty.name(), reason))?;
    Ok(Runtime::Buffer(Rc::new(data)))
}

pub(crate) fn buffer_data(node: &Node) -> Option<Rc<BufferData>> {
    match &node.inner().runtime {
        Runtime::Buffer(data) => Some(data.clone()),
        _ => None,
    }
}

pub(crate) fn geometry(node: &Node) -> Option<Rc<Geometry>> {
    match &node.inner().runtime {
        Runtime::Geometry { geometry, .. } => Some(geometry.clone()),
        _ => None,
    }
}

/// Nodes the geometry of `node` is built from.
fn dependencies(node: &Node) -> Vec<Node> {
    let inner = node.inner();
    match inner.ty {
        NodeType::Shape => inner.list("primitives"),
        NodeType::Shape2 => ["vertices", "texcoords", "normals"]
            .into_iter()
            .filter_map(|key| inner.node(key))
            .collect(),
        _ => Vec::new(),
    }
}

fn modes(node: &Node) -> (DrawMode, IndexType) {
    let inner = node.inner();
    let draw_mode = inner
        .string("draw_mode")
        .and_then(DrawMode::from_name)
        .unwrap_or(DrawMode::Triangles);
    let index_type = inner
        .string("draw_type")
        .and_then(IndexType::from_name)
        .unwrap_or(IndexType::U16);
    (draw_mode, index_type)
}

fn offset(primitive: &Node) -> [f32; 3] {
    match primitive.inner().runtime {
        Runtime::Value(v) => [v[0] as f32, v[1] as f32, v[2] as f32],
        _ => [0.0; 3],
    }
}

fn primitives_geometry(node: &Node, primitives: &[Node]) -> Geometry {
    let vertices = primitives
        .iter()
        .map(|primitive| {
            let off = offset(primitive);
            let inner = primitive.inner();
            let coords = inner.vec3("coordinates");
            Vertex {
                position: [coords[0] + off[0], coords[1] + off[1], coords[2] + off[2]],
                uv: inner.vec2("texture_coordinates"),
                normal: inner.vec3("normals"),
            }
        })
        .collect::<Vec<_>>();
    let indices = (0..vertices.len() as u32).collect();
    let (draw_mode, index_type) = modes(node);
    Geometry::new(vertices, indices, draw_mode, index_type)
}

fn buffers_geometry(node: &Node) -> Result<Geometry> {
    let (vertices, texcoords, normals) = {
        let inner = node.inner();
        (inner.node("vertices"), inner.node("texcoords"), inner.node("normals"))
    };
    let fetch = |buffer: Option<Node>| buffer.as_ref().and_then(buffer_data);
    let vertices = fetch(vertices).ok_or_else(|| Error::init("Shape2", "vertices are not set"))?;
    let texcoords = fetch(texcoords);
    let normals = fetch(normals);
    for (name, buffer) in [("texcoords", &texcoords), ("normals", &normals)] {
        if let Some(buffer) = buffer {
            if buffer.count != vertices.count {
                return Err(Error::init(
                    "Shape2",
                    format!(
                        "{name} has {} elements but there are {} vertices",
                        buffer.count, vertices.count
                    ),
                ));
            }
        }
    }

    let positions = vertices.floats();
    let uvs = texcoords.as_ref().map(|b| b.floats());
    let norms = normals.as_ref().map(|b| b.floats());
    let vertices = (0..vertices.count)
        .map(|i| Vertex {
            position: vertices.vec3(&positions, i),
            uv: uvs.as_ref().map_or([0.0; 2], |uv| [uv[2 * i], uv[2 * i + 1]]),
            normal: match (&normals, &norms) {
                (Some(buffer), Some(floats)) => buffer.vec3(floats, i),
                _ => [0.0; 3],
            },
        })
        .collect::<Vec<_>>();
    let indices = (0..vertices.len() as u32).collect();
    let (draw_mode, index_type) = modes(node);
    Ok(Geometry::new(vertices, indices, draw_mode, index_type))
}

fn build(node: &Node) -> Result<Runtime> {
    let ty = node.node_type();
    let deps = dependencies(node);
    for dep in &deps {
        dep.init()?;
    }
    let (geometry, dynamic) = {
        let inner = node.inner();
        match ty {
            NodeType::Quad => (
                Geometry::quad(
                    inner.vec3("corner"),
                    inner.vec3("width"),
                    inner.vec3("height"),
                    inner.vec2("uv_corner"),
                    inner.vec2("uv_width"),
                    inner.vec2("uv_height"),
                ),
                false,
            ),
            NodeType::Triangle => (
                Geometry::triangle(
                    [inner.vec3("edge0"), inner.vec3("edge1"), inner.vec3("edge2")],
                    [
                        inner.vec2("uv_edge0"),
                        inner.vec2("uv_edge1"),
                        inner.vec2("uv_edge2"),
                    ],
                ),
                false,
            ),
            NodeType::Box => (
                Geometry::cuboid(
                    inner.vec3("corner"),
                    inner.vec3("width"),
                    inner.vec3("height"),
                    inner.vec3("depth"),
                    inner.vec2("uv_corner"),
                    inner.vec2("uv_width"),
                    inner.vec2("uv_height"),
                ),
                false,
            ),
            NodeType::Shape => {
                let dynamic = deps.iter().any(|p| {
                    let inner = p.inner();
                    PRIMITIVE_ANIMKF.iter().any(|key| !inner.list(key).is_empty())
                });
                (primitives_geometry(node, &deps), dynamic)
            }
            _ => (buffers_geometry(node)?, false),
        }
    };
    geometry
        .check_index_type()
        .map_err(|reason| Error::init(ty.name(), reason))?;

    Ok(Runtime::Geometry {
        geometry: Rc::new(geometry),
        deps: deps.iter().map(|d| (d.id(), d.generation())).collect(),
        dynamic,
    })
}

pub(super) fn init(node: &Node) -> Result<Runtime> {
    if node.node_type() == NodeType::ShapePrimitive {
        for key in PRIMITIVE_ANIMKF {
            animate::keyframes(node, key)?;
        }
        return Ok(Runtime::Value([0.0; 4]));
    }
    build(node)
}

pub(super) fn update(node: &Node, t: f64) -> Result<()> {
    if node.node_type() == NodeType::ShapePrimitive {
        let mut value = [0.0; 4];
        for (slot, key) in PRIMITIVE_ANIMKF.into_iter().enumerate() {
            if let Some(v) = animate::animated_value(node, key, slot, t)? {
                value[slot] = v[0];
            }
        }
        node.0.borrow_mut().runtime = Runtime::Value(value);
        return Ok(());
    }

    let deps = dependencies(node);
    for dep in &deps {
        dep.update(t)?;
    }
    let stale = match &node.inner().runtime {
        Runtime::Geometry {
            deps: built, dynamic, ..
        } => {
            *dynamic
                || built.len() != deps.len()
                || built
                    .iter()
                    .zip(&deps)
                    .any(|(&(id, generation), dep)| id != dep.id() || generation != dep.generation())
        }
        _ => true,
    };
    if stale {
        log::trace!("rebuilding geometry of {}", node.label());
        let runtime = build(node)?;
        node.0.borrow_mut().runtime = runtime;
    }
    Ok(())
}
