#![cfg(feature = "integration-tests")]

use nodegl::gpu::Renderer;
use nodegl::{Context, Node, NodeType};

mod common;

fn assert_close(pixel: &image::Rgba<u8>, expected: [u8; 4]) {
    for (got, want) in pixel.0.iter().zip(expected) {
        assert!(got.abs_diff(want) <= 2, "{:?} != {expected:?}", pixel.0);
    }
}

#[test]
fn empty_scene_shows_the_clear_color() {
    let mut ctx = Context::new();
    ctx.set_clear_color([0.0, 0.0, 1.0, 1.0]);
    ctx.set_scene(Some(Node::new(NodeType::Group))).unwrap();
    let frame = ctx.draw(0.0).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let image = runtime.block_on(async {
        let mut renderer = Renderer::new_headless().await.unwrap();
        renderer.render_to_image(&frame, 16, 16).await.unwrap()
    });
    for pixel in image.pixels() {
        assert_close(pixel, [0, 0, 255, 255]);
    }
}

#[test]
fn fullscreen_quad_covers_the_target() {
    let scene = common::fullscreen(common::solid_color_shader([1.0, 0.0, 0.0, 1.0]));
    let image = common::render(scene, 0.0, 32);
    for pixel in image.pixels() {
        assert_close(pixel, [255, 0, 0, 255]);
    }
}

#[test]
fn half_quad_leaves_the_rest_cleared() {
    let shape = Node::new(NodeType::TexturedShape);
    shape.set("shape", common::quad(-1.0, -1.0, 0.0, 1.0)).unwrap();
    shape
        .set("shader", common::solid_color_shader([0.0, 1.0, 0.0, 1.0]))
        .unwrap();
    let image = common::render(shape, 0.0, 32);
    assert_close(image.get_pixel(4, 16), [0, 255, 0, 255]);
    assert_close(image.get_pixel(28, 16), [0, 0, 0, 255]);
}

#[test]
fn compute_writes_its_buffer() {
    let shader = Node::new(NodeType::ComputeShader);
    shader
        .set(
            "compute_data",
            "@group(0) @binding(1)
var<storage, read_write> values: array<f32>;

@compute @workgroup_size(4)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    values[id.x] = f32(id.x) * 2.0;
}
",
        )
        .unwrap();
    let values = Node::new(NodeType::BufferFloat);
    values.set("n", 8).unwrap();
    let compute = Node::new(NodeType::Compute);
    compute.set("nb_group_x", 2).unwrap();
    compute.set("nb_group_y", 1).unwrap();
    compute.set("nb_group_z", 1).unwrap();
    compute.set("shader", shader).unwrap();
    compute.set_dict("buffers", "values", Some(values.clone())).unwrap();

    let mut ctx = Context::new();
    ctx.set_scene(Some(compute)).unwrap();
    let frame = ctx.draw(0.0).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let result = runtime.block_on(async {
        let mut renderer = Renderer::new_headless().await.unwrap();
        renderer.render_to_image(&frame, 4, 4).await.unwrap();
        renderer.read_buffer(values.id()).await.unwrap()
    });
    assert_eq!(result, [0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0]);
}

#[test]
fn shapes_without_textures_sample_white() {
    let image = common::render(common::fullscreen(Node::new(NodeType::Shader)), 0.0, 16);
    for pixel in image.pixels() {
        assert_close(pixel, [255, 255, 255, 255]);
    }
}

#[test]
fn media_images_are_sampled() {
    let path = std::env::temp_dir().join(format!("nodegl-green-{}.png", std::process::id()));
    image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 255, 0, 255]))
        .save(&path)
        .unwrap();
    let media = Node::new(NodeType::Media);
    media.set("filename", path.to_str().unwrap()).unwrap();
    let texture = Node::new(NodeType::Texture);
    texture.set("data_src", media).unwrap();
    let shape = common::fullscreen(Node::new(NodeType::Shader));
    shape.set_dict("textures", "tex0", Some(texture)).unwrap();

    let image = common::render(shape, 0.0, 16);
    std::fs::remove_file(&path).ok();
    for pixel in image.pixels() {
        assert_close(pixel, [0, 255, 0, 255]);
    }
}

#[test]
fn render_to_texture_output_is_sampled() {
    let target = Node::new(NodeType::Texture);
    target.set("width", 16).unwrap();
    target.set("height", 16).unwrap();
    let rtt = Node::new(NodeType::Rtt);
    rtt.set("child", common::fullscreen(common::solid_color_shader([1.0, 0.0, 0.0, 1.0])))
        .unwrap();
    rtt.set("color_texture", target.clone()).unwrap();

    let shape = common::fullscreen(Node::new(NodeType::Shader));
    shape.set_dict("textures", "tex0", Some(target)).unwrap();
    let group = Node::new(NodeType::Group);
    group.add("children", [rtt, shape]).unwrap();

    let image = common::render(group, 0.0, 16);
    for pixel in image.pixels() {
        assert_close(pixel, [255, 0, 0, 255]);
    }
}

#[test]
fn triangle_fans_cover_their_polygon() {
    let fan = common::primitives_shape(
        &[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]],
        "triangle_fan",
        "unsigned_short",
    );
    let shape = Node::new(NodeType::TexturedShape);
    shape.set("shape", fan).unwrap();
    shape
        .set("shader", common::solid_color_shader([0.0, 0.0, 1.0, 1.0]))
        .unwrap();
    let image = common::render(shape, 0.0, 16);
    for pixel in image.pixels() {
        assert_close(pixel, [0, 0, 255, 255]);
    }
}

#[test]
fn byte_indices_are_drawn() {
    let triangles = common::primitives_shape(
        &[
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ],
        "triangles",
        "unsigned_byte",
    );
    let shape = Node::new(NodeType::TexturedShape);
    shape.set("shape", triangles).unwrap();
    shape
        .set("shader", common::solid_color_shader([1.0, 1.0, 0.0, 1.0]))
        .unwrap();
    let image = common::render(shape, 0.0, 16);
    for pixel in image.pixels() {
        assert_close(pixel, [255, 255, 0, 255]);
    }
}

#[test]
fn blending_mixes_with_the_clear_color() {
    let shape = common::fullscreen(common::solid_color_shader([1.0, 0.0, 0.0, 0.5]));
    let blend = Node::new(NodeType::GlBlendState);
    blend.set("enabled", true).unwrap();
    blend.set("src_rgb", "src_alpha").unwrap();
    blend.set("dst_rgb", "one_minus_src_alpha").unwrap();
    shape.add("glstates", [blend]).unwrap();

    let mut ctx = Context::new();
    ctx.set_clear_color([0.0, 0.0, 1.0, 1.0]);
    ctx.set_scene(Some(shape)).unwrap();
    let frame = ctx.draw(0.0).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let image = runtime.block_on(async {
        let mut renderer = Renderer::new_headless().await.unwrap();
        renderer.render_to_image(&frame, 8, 8).await.unwrap()
    });
    for pixel in image.pixels() {
        assert_close(pixel, [128, 0, 128, 128]);
    }
}

#[test]
fn stencil_masks_later_draws() {
    let mask = Node::new(NodeType::TexturedShape);
    mask.set("shape", common::quad(-1.0, -1.0, 0.0, 1.0)).unwrap();
    mask.set("shader", Node::new(NodeType::Shader)).unwrap();
    let write = Node::new(NodeType::GlStencilState);
    write.set("enabled", true).unwrap();
    write.set("func_ref", 1).unwrap();
    write.set("op_dppass", "replace").unwrap();
    let hidden = Node::new(NodeType::GlColorState);
    hidden.set("enabled", true).unwrap();
    for channel in ["red", "green", "blue", "alpha"] {
        hidden.set(channel, false).unwrap();
    }
    mask.add("glstates", [write, hidden]).unwrap();

    let masked = common::fullscreen(common::solid_color_shader([0.0, 1.0, 0.0, 1.0]));
    let test = Node::new(NodeType::GlStencilState);
    test.set("enabled", true).unwrap();
    test.set("func", "equal").unwrap();
    test.set("func_ref", 1).unwrap();
    masked.add("glstates", [test]).unwrap();

    let group = Node::new(NodeType::Group);
    group.add("children", [mask, masked]).unwrap();
    let image = common::render(group, 0.0, 32);
    assert_close(image.get_pixel(4, 16), [0, 255, 0, 255]);
    assert_close(image.get_pixel(28, 16), [0, 0, 0, 255]);
}

#[test]
fn caches_only_keep_what_the_frame_uses() {
    let shader = common::solid_color_shader([1.0, 0.0, 0.0, 1.0]);
    let first = common::fullscreen(shader.clone());
    let second = common::fullscreen(Node::new(NodeType::Shader));
    let texture = Node::new(NodeType::Texture);
    second.set_dict("textures", "tex0", Some(texture)).unwrap();

    let mut ctx = Context::new();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let mut renderer = Renderer::new_headless().await.unwrap();
        ctx.set_scene(Some(first.clone())).unwrap();
        renderer.render_to_image(&ctx.draw(0.0).unwrap(), 8, 8).await.unwrap();
        shader
            .set(
                "fragment_data",
                "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(0.0, 1.0, 0.0, 1.0);\n}\n",
            )
            .unwrap();
        renderer.render_to_image(&ctx.draw(0.0).unwrap(), 8, 8).await.unwrap();
        let stats = renderer.cache_stats();
        assert_eq!((stats.programs, stats.pipelines, stats.meshes), (1, 1, 1));

        ctx.set_scene(Some(second)).unwrap();
        renderer.render_to_image(&ctx.draw(0.0).unwrap(), 8, 8).await.unwrap();
        let stats = renderer.cache_stats();
        assert_eq!((stats.programs, stats.meshes, stats.textures), (1, 1, 1));
    });
}
