#![allow(dead_code)]

use nodegl::{Node, NodeType};

/// Fragment program painting every pixel with `color`.
pub fn solid_color_shader(color: [f32; 4]) -> Node {
    let [r, g, b, a] = color;
    let shader = Node::new(NodeType::Shader);
    shader
        .set(
            "fragment_data",
            format!(
                "@fragment\nfn fs_main() -> @location(0) vec4<f32> {{\n    return vec4<f32>({r:?}, {g:?}, {b:?}, {a:?});\n}}\n"
            ),
        )
        .unwrap();
    shader
}

/// Quad spanning `[x0, x1] x [y0, y1]` at z = 0.
pub fn quad(x0: f32, y0: f32, x1: f32, y1: f32) -> Node {
    let quad = Node::new(NodeType::Quad);
    quad.set("corner", [x0, y0, 0.0]).unwrap();
    quad.set("width", [x1 - x0, 0.0, 0.0]).unwrap();
    quad.set("height", [0.0, y1 - y0, 0.0]).unwrap();
    quad
}

/// Full screen quad drawn with `shader`.
pub fn fullscreen(shader: Node) -> Node {
    let shape = Node::new(NodeType::TexturedShape);
    shape.set("shape", quad(-1.0, -1.0, 1.0, 1.0)).unwrap();
    shape.set("shader", shader).unwrap();
    shape
}

/// Shape made of one primitive per point of `points`, at z = 0.
pub fn primitives_shape(points: &[[f32; 2]], draw_mode: &str, draw_type: &str) -> Node {
    let shape = Node::new(NodeType::Shape);
    let primitives: Vec<Node> = points
        .iter()
        .map(|&[x, y]| {
            let primitive = Node::new(NodeType::ShapePrimitive);
            primitive.set("coordinates", [x, y, 0.0]).unwrap();
            primitive.set("texture_coordinates", [0.0f32, 0.0]).unwrap();
            primitive
        })
        .collect();
    shape.add("primitives", primitives).unwrap();
    shape.set("draw_mode", draw_mode).unwrap();
    shape.set("draw_type", draw_type).unwrap();
    shape
}

pub fn keyframe(ty: NodeType, time: f64, value: impl Into<nodegl::ParamValue>) -> Node {
    let kf = Node::new(ty);
    kf.set("time", time).unwrap();
    kf.set("value", value).unwrap();
    kf
}

/// Scene touching most node classes.
pub fn rich_scene() -> Node {
    let texture = Node::new(NodeType::Texture);
    texture.set("width", 4).unwrap();
    texture.set("height", 4).unwrap();
    texture.set("min_filter", "nearest").unwrap();

    let color = Node::new(NodeType::UniformVec4);
    color
        .add(
            "animkf",
            [
                keyframe(NodeType::AnimKeyFrameVec4, 0.0, [1.0f32, 0.0, 0.0, 1.0]),
                keyframe(NodeType::AnimKeyFrameVec4, 2.0, [0.0f32, 0.0, 1.0, 1.0]),
            ],
        )
        .unwrap();

    let shape = fullscreen(Node::new(NodeType::Shader));
    shape.set_dict("textures", "tex0", Some(texture)).unwrap();
    shape.set_dict("uniforms", "color", Some(color)).unwrap();
    let blend = Node::new(NodeType::GlBlendState);
    blend.set("enabled", true).unwrap();
    blend.set("src_rgb", "src_alpha").unwrap();
    blend.set("dst_rgb", "one_minus_src_alpha").unwrap();
    shape.add("glstates", [blend]).unwrap();

    let rotate = Node::new(NodeType::Rotate);
    rotate.set("child", shape).unwrap();
    rotate.set("name", "spin it").unwrap();
    rotate
        .add(
            "animkf",
            [
                keyframe(NodeType::AnimKeyFrameScalar, 0.0, 0.0),
                keyframe(NodeType::AnimKeyFrameScalar, 4.0, 360.0),
            ],
        )
        .unwrap();

    let camera = Node::new(NodeType::Camera);
    camera.set("child", rotate).unwrap();
    camera.set("eye", [0.0f32, 0.0, 2.0]).unwrap();
    camera.set("center", [0.0f32, 0.0, 0.0]).unwrap();
    camera.set("perspective", [45.0f32, 1.0, 0.1, 10.0]).unwrap();

    let group = Node::new(NodeType::Group);
    group.add("children", [camera]).unwrap();
    group
}

#[cfg(feature = "integration-tests")]
pub fn render(scene: Node, t: f64, size: u32) -> image::RgbaImage {
    let mut ctx = nodegl::Context::new();
    ctx.set_scene(Some(scene)).unwrap();
    let frame = ctx.draw(t).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let mut renderer = nodegl::gpu::Renderer::new_headless().await.unwrap();
        renderer.render_to_image(&frame, size, size).await.unwrap()
    })
}
