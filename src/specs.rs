//! Export of the built-in node classes as a specification file.

use crate::nodes::NodeType;
use crate::nodes::class::COMMON_PARAMS;
use crate::params::{ParamSpec, ParamType};
use crate::schema::{FieldKind, FieldSpec, NodeSpec, NodeSpecs};

fn kind(ty: ParamType) -> FieldKind {
    match ty {
        ParamType::Int => FieldKind::Int,
        ParamType::Bool => FieldKind::Bool,
        ParamType::Dbl => FieldKind::Double,
        ParamType::Str => FieldKind::String,
        ParamType::Select(_) => FieldKind::Select,
        ParamType::Data => FieldKind::Data,
        ParamType::Vec2 => FieldKind::Vec(2),
        ParamType::Vec3 => FieldKind::Vec(3),
        ParamType::Vec4 => FieldKind::Vec(4),
        ParamType::Node => FieldKind::Node,
        ParamType::NodeList => FieldKind::NodeList,
        ParamType::NodeDict => FieldKind::NodeDict,
    }
}

fn field(spec: &ParamSpec) -> FieldSpec {
    FieldSpec {
        name: spec.key.to_string(),
        kind: kind(spec.ty),
    }
}

/// The node classes known to this engine.
pub fn export() -> NodeSpecs {
    NodeSpecs {
        common: COMMON_PARAMS.iter().map(field).collect(),
        nodes: NodeType::ALL
            .iter()
            .map(|ty| NodeSpec {
                name: ty.name().to_string(),
                constructors: ty.params().iter().filter(|p| p.is_constructor()).map(field).collect(),
                optional: ty.params().iter().filter(|p| !p.is_constructor()).map(field).collect(),
            })
            .collect(),
    }
}

pub fn export_yaml() -> String {
    export().to_yaml()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_file_matches_the_class_table() {
        let file = NodeSpecs::parse(include_str!("../specs/nodes.specs")).unwrap();
        assert_eq!(file, export());
    }

    #[test]
    fn export_parses_back() {
        assert_eq!(NodeSpecs::parse(&export_yaml()).unwrap(), export());
    }
}
