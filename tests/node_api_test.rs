use nodegl::{Context, Error, Node, NodeType, ParamValue};

mod common;

#[test]
fn unknown_classes_and_params_are_rejected() {
    assert!(matches!(Node::from_name("Sphere"), Err(Error::UnknownNodeType(_))));
    let quad = Node::new(NodeType::Quad);
    assert!(matches!(quad.set("radius", 1.0), Err(Error::UnknownParam { .. })));
    assert!(matches!(quad.set("corner", 1.0), Err(Error::ParamType { .. })));
    assert!(matches!(quad.get("radius"), Err(Error::UnknownParam { .. })));
}

#[test]
fn select_params_only_take_listed_choices() {
    let texture = Node::new(NodeType::Texture);
    texture.set("wrap_s", "repeat").unwrap();
    match texture.set("wrap_s", "clamp") {
        Err(Error::InvalidChoice { choices, .. }) => assert!(choices.contains("mirrored_repeat")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(texture.get("wrap_s").unwrap(), ParamValue::Str("repeat".to_string()));
}

#[test]
fn children_must_be_of_an_accepted_class() {
    let shape = Node::new(NodeType::TexturedShape);
    assert!(matches!(
        shape.set("shape", Node::new(NodeType::Group)),
        Err(Error::InvalidNodeType { .. })
    ));
    assert!(matches!(
        shape.set_dict("uniforms", "tex0", Some(Node::new(NodeType::Texture))),
        Err(Error::InvalidNodeType { .. })
    ));
    assert!(matches!(
        shape.add("textures", [Node::new(NodeType::Texture)]),
        Err(Error::ParamOperation { .. })
    ));
}

#[test]
fn graphs_stay_acyclic() {
    let outer = Node::new(NodeType::Group);
    let inner = Node::new(NodeType::Group);
    outer.add("children", [inner.clone()]).unwrap();
    assert!(matches!(inner.add("children", [outer.clone()]), Err(Error::Cycle { .. })));
    assert!(matches!(outer.add("children", [outer.clone()]), Err(Error::Cycle { .. })));
    // sharing is fine
    outer.add("children", [inner.clone()]).unwrap();
    assert_eq!(outer.get("children").unwrap(), ParamValue::NodeList(vec![inner.clone(), inner]));
}

#[test]
fn missing_constructor_fails_the_first_draw() {
    let shape = Node::new(NodeType::TexturedShape);
    shape.set("shape", common::quad(0.0, 0.0, 1.0, 1.0)).unwrap();
    let mut ctx = Context::new();
    ctx.set_scene(Some(shape.clone())).unwrap();
    match ctx.draw(0.0) {
        Err(Error::MissingConstructor { node, key }) => {
            assert_eq!(node, "TexturedShape");
            assert_eq!(key, "shader");
        }
        other => panic!("unexpected {other:?}"),
    }
    shape.set("shader", Node::new(NodeType::Shader)).unwrap();
    assert_eq!(ctx.draw(0.0).unwrap().shapes().len(), 1);
}

#[test]
fn constructors_can_not_be_unset() {
    let rotate = Node::new(NodeType::Rotate);
    rotate.set("child", Node::new(NodeType::Identity)).unwrap();
    assert!(rotate.set("child", ParamValue::Unset).is_err());
    rotate.set("anim", ParamValue::Unset).unwrap();
}

#[test]
fn nodes_added_after_attach_join_the_context() {
    let group = Node::new(NodeType::Group);
    let shared = common::fullscreen(Node::new(NodeType::Shader));
    let mut first = Context::new();
    first.set_scene(Some(group.clone())).unwrap();
    group.add("children", [shared.clone()]).unwrap();

    let other = Node::new(NodeType::Group);
    let mut second = Context::new();
    second.set_scene(Some(other.clone())).unwrap();
    assert!(matches!(other.add("children", [shared]), Err(Error::AlreadyAttached(_))));
}

#[test]
fn animated_rotation_changes_over_time() {
    let mut ctx = Context::new();
    ctx.set_scene(Some(common::rich_scene())).unwrap();
    let start = ctx.draw(0.0).unwrap().shapes()[0].modelview;
    let middle = ctx.draw(2.0).unwrap().shapes()[0].modelview;
    assert_ne!(start, middle);
    let again = ctx.draw(0.0).unwrap().shapes()[0].modelview;
    assert_eq!(start, again);
}

#[test]
fn labels_prefer_the_name() {
    let group = Node::new(NodeType::Group);
    assert_eq!(group.label(), format!("Group#{}", group.id()));
    group.set("name", "root").unwrap();
    assert_eq!(group.label(), "root");
}
