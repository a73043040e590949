use nodegl::bindings::{
    AnimKeyFrameScalar, Camera, Group, Quad, RTT, Rotate, Shader, Texture, TexturedShape,
    UniformVec4,
};
use nodegl::{Context, Node, NodeType, ParamValue};

#[test]
fn wrappers_build_the_same_graph_as_nodes() -> nodegl::Result<()> {
    let quad = Quad::new([-1.0, -1.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0])?;
    let shape = TexturedShape::new(&quad, Shader::new()?)?;
    let color = UniformVec4::new()?;
    color.set_value([1.0, 0.5, 0.0, 1.0])?;
    shape.update_uniforms([("color", &color)])?;

    let rotate = Rotate::new(&shape)?;
    rotate.add_animkf([
        AnimKeyFrameScalar::new(0.0, 0.0)?,
        AnimKeyFrameScalar::new(1.0, 90.0)?,
    ])?;
    let group = Group::new()?;
    group.set_name("root")?;
    group.add_children([rotate])?;

    assert_eq!(group.node_type(), NodeType::Group);
    assert_eq!(quad.get("width")?, ParamValue::Vec3([2.0, 0.0, 0.0]));
    let text = group.serialize();
    assert!(text.contains("UniformVec4 value=1,0.5,0,1"));
    assert!(text.lines().last().unwrap_or_default().starts_with("Group name=root"));

    let mut ctx = Context::new();
    ctx.set_scene(Some(group.into_node()))?;
    assert_eq!(ctx.draw(0.5)?.shapes().len(), 1);
    Ok(())
}

#[test]
fn dict_entries_can_be_removed() -> nodegl::Result<()> {
    let shape = TexturedShape::new(
        Quad::new([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])?,
        Shader::new()?,
    )?;
    let texture = Texture::new()?;
    shape.update_textures([("tex0", &texture), ("tex1", &texture)])?;
    shape.unset_textures("tex0")?;
    let ParamValue::NodeDict(textures) = shape.get("textures")? else {
        panic!("textures is not a dict");
    };
    assert_eq!(textures.keys().collect::<Vec<_>>(), ["tex1"]);
    Ok(())
}

#[test]
fn wrong_children_are_still_rejected() -> nodegl::Result<()> {
    let camera = Camera::new(Group::new()?)?;
    assert!(camera.add_fov_animkf([Node::new(NodeType::Group)]).is_err());
    let texture = Texture::new()?;
    assert!(RTT::new(Group::new()?, &texture).is_ok());
    assert!(RTT::new(Group::new()?, Group::new()?).is_err());
    Ok(())
}
