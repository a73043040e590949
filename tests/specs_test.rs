use nodegl::NodeType;
use nodegl::codegen::generate;
use nodegl::schema::{FieldKind, NodeSpecs};
use nodegl::specs::export;

#[test]
fn every_class_is_exported() {
    let specs = export();
    assert_eq!(specs.nodes.len(), NodeType::ALL.len());
    for ty in NodeType::ALL {
        let node = specs.get(ty.name()).unwrap();
        assert_eq!(node.fields().count(), ty.params().len(), "{ty}");
    }
    assert_eq!(specs.common[0].name, "name");
}

#[test]
fn constructor_fields_match_the_class_table() {
    let specs = export();
    let textured = specs.get("TexturedShape").unwrap();
    let names: Vec<_> = textured.constructors.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["shape", "shader"]);
    let compute = specs.get("Compute").unwrap();
    assert_eq!(compute.constructors.len(), 4);
    assert_eq!(compute.constructors[0].kind, FieldKind::Int);
    assert!(specs.get("Identity").unwrap().fields().next().is_none());
}

#[test]
fn generated_bindings_cover_every_class() {
    let code = generate(&export());
    for ty in NodeType::ALL {
        assert!(code.contains(&format!("pub struct {}(Node);", ty.name())), "{ty}");
    }
    let again = NodeSpecs::parse(&export().to_yaml()).unwrap();
    assert_eq!(generate(&again), code);
}
