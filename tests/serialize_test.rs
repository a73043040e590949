use nodegl::{Context, Error, Node, NodeType};

mod common;

#[test]
fn round_trip_is_exact() {
    let scene = common::rich_scene();
    let text = scene.serialize();
    assert!(text.starts_with("# node.gl v"));
    let back = Node::deserialize(&text).unwrap();
    assert_eq!(back.serialize(), text);
    assert_eq!(back.node_type(), NodeType::Group);
}

#[test]
fn shared_nodes_are_written_once() {
    let texture = Node::new(NodeType::Texture);
    let group = Node::new(NodeType::Group);
    for _ in 0..3 {
        let shape = common::fullscreen(Node::new(NodeType::Shader));
        shape.set_dict("textures", "tex0", Some(texture.clone())).unwrap();
        group.add("children", [shape]).unwrap();
    }
    let text = group.serialize();
    assert_eq!(text.lines().filter(|l| l.split_whitespace().next() == Some("Texture")).count(), 1);

    let back = Node::deserialize(&text).unwrap();
    let nodegl::ParamValue::NodeList(shapes) = back.get("children").unwrap() else {
        panic!("children is not a list");
    };
    let textures: Vec<_> = shapes
        .iter()
        .map(|s| match s.get("textures").unwrap() {
            nodegl::ParamValue::NodeDict(d) => d["tex0"].clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert!(textures[0].ptr_eq(&textures[1]) && textures[1].ptr_eq(&textures[2]));
}

#[test]
fn strings_and_data_survive() {
    let shader = Node::new(NodeType::ComputeShader);
    let source = "@compute @workgroup_size(1)\nfn main() {\n    // 100% = done\n}\n";
    shader.set("compute_data", source).unwrap();
    let buffer = Node::new(NodeType::BufferVec2);
    buffer.set("n", 2).unwrap();
    let data: Vec<u8> = [0.5f32, -1.0, 2.25, 1e-3]
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    buffer.set("data", data.clone()).unwrap();
    let compute = Node::new(NodeType::Compute);
    for axis in ["nb_group_x", "nb_group_y", "nb_group_z"] {
        compute.set(axis, 1).unwrap();
    }
    compute.set("shader", shader).unwrap();
    compute.set_dict("buffers", "my data", Some(buffer)).unwrap();

    let back = Node::deserialize(&compute.serialize()).unwrap();
    let nodegl::ParamValue::Node(shader) = back.get("shader").unwrap() else {
        panic!("shader is not set");
    };
    assert_eq!(shader.get("compute_data").unwrap(), nodegl::ParamValue::Str(source.to_string()));
    let nodegl::ParamValue::NodeDict(buffers) = back.get("buffers").unwrap() else {
        panic!("buffers is not a dict");
    };
    assert_eq!(buffers["my data"].get("data").unwrap(), nodegl::ParamValue::Data(data));

    let mut ctx = Context::new();
    ctx.set_scene(Some(back)).unwrap();
    ctx.draw(0.0).unwrap();
}

#[test]
fn errors_carry_the_line() {
    let header = format!("# node.gl v{}\n", env!("CARGO_PKG_VERSION"));
    for (body, line) in [
        ("Group\nQuad corner=1,2\n", 3),
        ("Sphere\n", 2),
        ("Group\nGroup children=0,1\n", 3),
        ("Texture wrap_s=clamp\n", 2),
    ] {
        match Node::deserialize(&format!("{header}{body}")) {
            Err(Error::Deserialize { line: got, .. }) => assert_eq!(got, line, "{body}"),
            other => panic!("{body}: unexpected {other:?}"),
        }
    }
}
