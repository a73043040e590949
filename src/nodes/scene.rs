//! Drawable nodes: groups, textured shapes, compute dispatches and
//! render-to-texture passes.

use super::{Node, NodeType, Runtime, animate, media, shape, states};
use crate::error::{Error, Result};
use crate::render::{
    BufferBinding, ComputeDispatch, DrawCommand, DrawState, RttPass, ShapeDraw, TextureBinding,
    UniformValue, normal_matrix,
};

pub(super) fn init(node: &Node) -> Result<Runtime> {
    match node.node_type() {
        NodeType::Compute => {
            let inner = node.inner();
            for key in ["nb_group_x", "nb_group_y", "nb_group_z"] {
                let count = inner.int(key);
                if count <= 0 || count > u32::MAX as i64 {
                    return Err(Error::init("Compute", format!("{key} must be positive, got {count}")));
                }
            }
        }
        NodeType::Rtt => check_rtt_targets(node)?,
        _ => (),
    }
    Ok(Runtime::None)
}

fn check_rtt_targets(node: &Node) -> Result<()> {
    let (color, depth) = {
        let inner = node.inner();
        (inner.node("color_texture"), inner.node("depth_texture"))
    };
    let color = match color {
        Some(color) => color,
        None => return Ok(()),
    };
    color.init()?;
    let color = media::texture_binding(&color);
    if color.desc.format.is_depth() {
        return Err(Error::init("RTT", "color_texture has a depth format"));
    }
    if let Some(depth) = depth {
        depth.init()?;
        let depth = media::texture_binding(&depth);
        if !depth.desc.format.is_depth() {
            return Err(Error::init("RTT", "depth_texture must use a depth format"));
        }
        if (depth.desc.width, depth.desc.height) != (color.desc.width, color.desc.height) {
            return Err(Error::init(
                "RTT",
                format!(
                    "depth_texture is {}x{} but color_texture is {}x{}",
                    depth.desc.width, depth.desc.height, color.desc.width, color.desc.height
                ),
            ));
        }
    }
    Ok(())
}

pub(super) fn update(node: &Node, t: f64) -> Result<()> {
    for child in node.children() {
        child.update(t)?;
    }
    Ok(())
}

fn uniforms(node: &Node) -> Vec<(String, UniformValue)> {
    node.inner()
        .dict("uniforms")
        .into_iter()
        .filter_map(|(name, uniform)| animate::uniform_value(&uniform).map(|value| (name, value)))
        .collect()
}

fn textures(node: &Node) -> Vec<(String, TextureBinding)> {
    node.inner()
        .dict("textures")
        .into_iter()
        .map(|(name, texture)| (name, media::texture_binding(&texture)))
        .collect()
}

fn buffers(node: &Node, key: &str) -> Result<Vec<(String, BufferBinding)>> {
    let label = node.node_type().name();
    node.inner()
        .dict(key)
        .into_iter()
        .map(|(name, buffer)| {
            let data = shape::buffer_data(&buffer)
                .ok_or_else(|| Error::init(label, format!("{key}.{name} is not initialized")))?;
            Ok((
                name,
                BufferBinding {
                    node_id: buffer.id(),
                    data,
                },
            ))
        })
        .collect()
}

fn draw_shape(node: &Node, state: &mut DrawState) -> Result<()> {
    let (shape_node, shader, glstates) = {
        let inner = node.inner();
        (inner.node("shape"), inner.node("shader"), inner.list("glstates"))
    };
    let (shape_node, shader) = match (shape_node, shader) {
        (Some(shape_node), Some(shader)) => (shape_node, shader),
        _ => return Ok(()),
    };
    let geometry = shape::geometry(&shape_node)
        .ok_or_else(|| Error::init("TexturedShape", "shape is not initialized"))?;
    let program = media::program_binding(&shader)
        .ok_or_else(|| Error::init("TexturedShape", "shader is not initialized"))?;

    let attributes = buffers(node, "attributes")?;
    if let Some((name, attribute)) = attributes
        .iter()
        .find(|(_, attribute)| attribute.data.count != geometry.vertices.len())
    {
        return Err(Error::init(
            "TexturedShape",
            format!(
                "attribute {name} has {} elements but the shape has {} vertices",
                attribute.data.count,
                geometry.vertices.len()
            ),
        ));
    }

    state.commands.push(DrawCommand::Shape(ShapeDraw {
        node_id: node.id(),
        modelview: state.modelview,
        projection: state.projection,
        normal_matrix: normal_matrix(&state.modelview),
        shape_id: shape_node.id(),
        geometry,
        program,
        uniforms: uniforms(node),
        textures: textures(node),
        attributes,
        states: states::fold(&glstates)?,
    }));
    Ok(())
}

fn dispatch(node: &Node, state: &mut DrawState) -> Result<()> {
    let (groups, shader) = {
        let inner = node.inner();
        (
            [
                inner.int("nb_group_x") as u32,
                inner.int("nb_group_y") as u32,
                inner.int("nb_group_z") as u32,
            ],
            inner.node("shader"),
        )
    };
    let program = shader
        .as_ref()
        .and_then(media::program_binding)
        .ok_or_else(|| Error::init("Compute", "shader is not initialized"))?;
    state.commands.push(DrawCommand::Compute(ComputeDispatch {
        node_id: node.id(),
        program,
        groups,
        uniforms: uniforms(node),
        textures: textures(node),
        buffers: buffers(node, "buffers")?,
    }));
    Ok(())
}

fn render_to_texture(node: &Node, state: &mut DrawState) -> Result<()> {
    let (child, color, depth) = {
        let inner = node.inner();
        (inner.node("child"), inner.node("color_texture"), inner.node("depth_texture"))
    };
    let (child, color) = match (child, color) {
        (Some(child), Some(color)) => (child, color),
        _ => return Ok(()),
    };

    let mut pass = DrawState {
        modelview: state.modelview,
        projection: state.projection,
        clear_color: state.clear_color,
        commands: Vec::new(),
    };
    child.draw(&mut pass)?;
    state.commands.push(DrawCommand::Rtt(RttPass {
        node_id: node.id(),
        color: media::texture_binding(&color),
        depth: depth.as_ref().map(media::texture_binding),
        clear_color: state.clear_color,
        commands: pass.commands,
    }));
    Ok(())
}

pub(super) fn draw(node: &Node, state: &mut DrawState) -> Result<()> {
    match node.node_type() {
        NodeType::TexturedShape => draw_shape(node, state),
        NodeType::Compute => dispatch(node, state),
        NodeType::Rtt => render_to_texture(node, state),
        _ => {
            let children = node.inner().list("children");
            for child in children {
                child.draw(state)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Node {
        let quad = Node::new(NodeType::Quad);
        quad.set("corner", [-1.0f32, -1.0, 0.0]).unwrap();
        quad.set("width", [2.0f32, 0.0, 0.0]).unwrap();
        quad.set("height", [0.0f32, 2.0, 0.0]).unwrap();
        quad
    }

    fn textured_shape() -> Node {
        let shape = Node::new(NodeType::TexturedShape);
        shape.set("shape", quad()).unwrap();
        shape.set("shader", Node::new(NodeType::Shader)).unwrap();
        shape
    }

    fn record(node: &Node, t: f64) -> Result<Vec<DrawCommand>> {
        node.update(t)?;
        let mut state = DrawState::new([0.0, 0.0, 0.0, 1.0]);
        node.draw(&mut state)?;
        Ok(state.commands)
    }

    #[test]
    fn uniforms_are_sorted_by_name() {
        let shape = textured_shape();
        let color = Node::new(NodeType::UniformVec4);
        color.set("value", [1.0f32, 0.0, 0.0, 1.0]).unwrap();
        let alpha = Node::new(NodeType::UniformScalar);
        alpha.set("value", 0.5).unwrap();
        shape.set_dict("uniforms", "color", Some(color)).unwrap();
        shape.set_dict("uniforms", "alpha", Some(alpha)).unwrap();

        let commands = record(&shape, 0.0).unwrap();
        let DrawCommand::Shape(draw) = &commands[0] else {
            panic!("expected a shape draw");
        };
        let names: Vec<_> = draw.uniforms.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["alpha", "color"]);
        assert_eq!(draw.geometry.vertices.len(), 4);
    }

    #[test]
    fn group_draws_children_in_order() {
        let group = Node::new(NodeType::Group);
        let first = textured_shape();
        let second = textured_shape();
        group.add("children", [first.clone(), second.clone()]).unwrap();
        let commands = record(&group, 0.0).unwrap();
        let ids: Vec<_> = commands
            .iter()
            .map(|c| match c {
                DrawCommand::Shape(draw) => draw.node_id,
                _ => 0,
            })
            .collect();
        assert_eq!(ids, [first.id(), second.id()]);
    }

    #[test]
    fn attribute_count_must_match_vertices() {
        let shape = textured_shape();
        let colors = Node::new(NodeType::BufferVec4);
        colors.set("n", 3).unwrap();
        shape.set_dict("attributes", "color", Some(colors)).unwrap();
        assert!(record(&shape, 0.0).is_err());
    }

    #[test]
    fn compute_needs_positive_groups() {
        let shader = Node::new(NodeType::ComputeShader);
        shader
            .set("compute_data", "@compute @workgroup_size(1) fn main() {}")
            .unwrap();
        let compute = Node::new(NodeType::Compute);
        compute.set("nb_group_x", 4).unwrap();
        compute.set("nb_group_y", 1).unwrap();
        compute.set("nb_group_z", 0).unwrap();
        compute.set("shader", shader).unwrap();
        assert!(matches!(record(&compute, 0.0), Err(Error::Init { .. })));

        compute.set("nb_group_z", 1).unwrap();
        let commands = record(&compute, 0.0).unwrap();
        assert!(matches!(&commands[0], DrawCommand::Compute(c) if c.groups == [4, 1, 1]));
    }

    #[test]
    fn rtt_records_nested_commands() {
        let color = Node::new(NodeType::Texture);
        color.set("width", 64).unwrap();
        color.set("height", 32).unwrap();
        let rtt = Node::new(NodeType::Rtt);
        rtt.set("child", textured_shape()).unwrap();
        rtt.set("color_texture", color).unwrap();

        let commands = record(&rtt, 0.0).unwrap();
        let DrawCommand::Rtt(pass) = &commands[0] else {
            panic!("expected an RTT pass");
        };
        assert_eq!((pass.color.desc.width, pass.color.desc.height), (64, 32));
        assert_eq!(pass.commands.len(), 1);
    }

    #[test]
    fn rtt_depth_must_match_color_size() {
        let color = Node::new(NodeType::Texture);
        color.set("width", 64).unwrap();
        color.set("height", 32).unwrap();
        let depth = Node::new(NodeType::Texture);
        depth.set("width", 32).unwrap();
        depth.set("height", 32).unwrap();
        depth.set("format", "depth24_stencil8").unwrap();
        let rtt = Node::new(NodeType::Rtt);
        rtt.set("child", textured_shape()).unwrap();
        rtt.set("color_texture", color).unwrap();
        rtt.set("depth_texture", depth).unwrap();
        assert!(record(&rtt, 0.0).is_err());
    }
}
