//! Typed node parameters.
//!
//! Every node class declares a static table of [`ParamSpec`]s. Values set
//! through the public node API are checked and coerced against that table
//! before they are stored as [`ParamValue`]s.

use std::collections::BTreeMap;

use crate::nodes::{Node, NodeType};

/// The parameter must be set before the node can be initialized.
pub const PARAM_FLAG_CONSTRUCTOR: u32 = 1 << 0;
/// Node lists rendered inside the owner's box in Graphviz output.
pub const PARAM_FLAG_DOT_PACKED: u32 = 1 << 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Bool,
    Dbl,
    Str,
    Select(&'static [&'static str]),
    Data,
    Vec2,
    Vec3,
    Vec4,
    Node,
    NodeList,
    NodeDict,
}

impl ParamType {
    /// Name of the type as written in the node specification file.
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::Dbl => "double",
            ParamType::Str => "string",
            ParamType::Select(_) => "select",
            ParamType::Data => "data",
            ParamType::Vec2 => "vec2",
            ParamType::Vec3 => "vec3",
            ParamType::Vec4 => "vec4",
            ParamType::Node => "Node",
            ParamType::NodeList => "NodeList",
            ParamType::NodeDict => "NodeDict",
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(
            self,
            ParamType::Node | ParamType::NodeList | ParamType::NodeDict
        )
    }
}

/// Compile-time default of a parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamDefault {
    None,
    Int(i64),
    Bool(bool),
    Dbl(f64),
    Str(&'static str),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub ty: ParamType,
    pub default: ParamDefault,
    pub flags: u32,
    /// Accepted classes for node-typed parameters. Empty means any class.
    pub node_types: &'static [NodeType],
    pub desc: &'static str,
}

impl ParamSpec {
    pub const fn new(key: &'static str, ty: ParamType) -> Self {
        Self {
            key,
            ty,
            default: ParamDefault::None,
            flags: 0,
            node_types: &[],
            desc: "",
        }
    }

    pub const fn default(mut self, default: ParamDefault) -> Self {
        self.default = default;
        self
    }

    pub const fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub const fn node_types(mut self, node_types: &'static [NodeType]) -> Self {
        self.node_types = node_types;
        self
    }

    pub const fn desc(mut self, desc: &'static str) -> Self {
        self.desc = desc;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.flags & PARAM_FLAG_CONSTRUCTOR != 0
    }

    pub fn is_dot_packed(&self) -> bool {
        self.flags & PARAM_FLAG_DOT_PACKED != 0
    }

    pub fn accepts(&self, ty: NodeType) -> bool {
        self.node_types.is_empty() || self.node_types.contains(&ty)
    }

    /// The value a freshly created node holds for this parameter.
    pub fn default_value(&self) -> ParamValue {
        match (self.ty, self.default) {
            (ParamType::NodeList, _) => ParamValue::NodeList(Vec::new()),
            (ParamType::NodeDict, _) => ParamValue::NodeDict(BTreeMap::new()),
            (_, ParamDefault::None) => match self.ty {
                ParamType::Int => ParamValue::Int(0),
                ParamType::Bool => ParamValue::Bool(false),
                ParamType::Dbl => ParamValue::Dbl(0.0),
                ParamType::Vec2 => ParamValue::Vec2([0.0; 2]),
                ParamType::Vec3 => ParamValue::Vec3([0.0; 3]),
                ParamType::Vec4 => ParamValue::Vec4([0.0; 4]),
                _ => ParamValue::Unset,
            },
            (_, ParamDefault::Int(v)) => ParamValue::Int(v),
            (_, ParamDefault::Bool(v)) => ParamValue::Bool(v),
            (_, ParamDefault::Dbl(v)) => ParamValue::Dbl(v),
            (_, ParamDefault::Str(v)) => ParamValue::Str(v.to_string()),
            (_, ParamDefault::Vec2(v)) => ParamValue::Vec2(v),
            (_, ParamDefault::Vec3(v)) => ParamValue::Vec3(v),
            (_, ParamDefault::Vec4(v)) => ParamValue::Vec4(v),
        }
    }

    /// Checks `value` against the declared type, applying the allowed
    /// coercions (int to double, int to bool, string to select).
    ///
    /// On mismatch the name of the offending value kind is returned.
    pub(crate) fn coerce(&self, value: ParamValue) -> Result<ParamValue, Coercion> {
        use ParamValue as V;
        let value = match (self.ty, value) {
            (_, V::Unset) if self.is_constructor() => return Err(Coercion::Type("nothing")),
            (ParamType::NodeList | ParamType::NodeDict, V::Unset) => self.default_value(),
            (_, V::Unset) => V::Unset,
            (ParamType::Int, V::Int(v)) => V::Int(v),
            (ParamType::Bool, V::Bool(v)) => V::Bool(v),
            (ParamType::Bool, V::Int(v)) => V::Bool(v != 0),
            (ParamType::Dbl, V::Dbl(v)) => V::Dbl(v),
            (ParamType::Dbl, V::Int(v)) => V::Dbl(v as f64),
            (ParamType::Str, V::Str(v)) => V::Str(v),
            (ParamType::Select(choices), V::Str(v)) => {
                if !choices.contains(&v.as_str()) {
                    return Err(Coercion::Choice(v));
                }
                V::Str(v)
            }
            (ParamType::Data, V::Data(v)) => V::Data(v),
            (ParamType::Vec2, V::Vec2(v)) => V::Vec2(v),
            (ParamType::Vec3, V::Vec3(v)) => V::Vec3(v),
            (ParamType::Vec4, V::Vec4(v)) => V::Vec4(v),
            (ParamType::Node, V::Node(v)) => V::Node(v),
            (ParamType::NodeList, V::NodeList(v)) => V::NodeList(v),
            (ParamType::NodeDict, V::NodeDict(v)) => V::NodeDict(v),
            (_, other) => return Err(Coercion::Type(other.kind())),
        };
        Ok(value)
    }
}

pub(crate) enum Coercion {
    Type(&'static str),
    Choice(String),
}

/// A parameter value as stored on a node.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Unset,
    Int(i64),
    Bool(bool),
    Dbl(f64),
    Str(String),
    Data(Vec<u8>),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Node(Node),
    NodeList(Vec<Node>),
    NodeDict(BTreeMap<String, Node>),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Unset => "nothing",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::Dbl(_) => "double",
            ParamValue::Str(_) => "string",
            ParamValue::Data(_) => "data",
            ParamValue::Vec2(_) => "vec2",
            ParamValue::Vec3(_) => "vec3",
            ParamValue::Vec4(_) => "vec4",
            ParamValue::Node(_) => "Node",
            ParamValue::NodeList(_) => "NodeList",
            ParamValue::NodeDict(_) => "NodeDict",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ParamValue::Unset)
    }

    /// Child nodes referenced by this value, in storage order.
    pub(crate) fn nodes(&self) -> Vec<Node> {
        match self {
            ParamValue::Node(node) => vec![node.clone()],
            ParamValue::NodeList(nodes) => nodes.clone(),
            ParamValue::NodeDict(nodes) => nodes.values().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Dbl(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Dbl(v as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<&[u8]> for ParamValue {
    fn from(v: &[u8]) -> Self {
        ParamValue::Data(v.to_vec())
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(v: Vec<u8>) -> Self {
        ParamValue::Data(v)
    }
}

impl From<[f32; 2]> for ParamValue {
    fn from(v: [f32; 2]) -> Self {
        ParamValue::Vec2(v)
    }
}

impl From<[f32; 3]> for ParamValue {
    fn from(v: [f32; 3]) -> Self {
        ParamValue::Vec3(v)
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(v: [f32; 4]) -> Self {
        ParamValue::Vec4(v)
    }
}

impl From<Node> for ParamValue {
    fn from(v: Node) -> Self {
        ParamValue::Node(v)
    }
}

impl From<&Node> for ParamValue {
    fn from(v: &Node) -> Self {
        ParamValue::Node(v.clone())
    }
}

impl From<Option<Node>> for ParamValue {
    fn from(v: Option<Node>) -> Self {
        v.map_or(ParamValue::Unset, ParamValue::Node)
    }
}

impl From<Vec<Node>> for ParamValue {
    fn from(v: Vec<Node>) -> Self {
        ParamValue::NodeList(v)
    }
}

impl From<BTreeMap<String, Node>> for ParamValue {
    fn from(v: BTreeMap<String, Node>) -> Self {
        ParamValue::NodeDict(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: &[&str] = &["points", "triangles"];

    #[test]
    fn int_coerces_to_double_and_bool() {
        let dbl = ParamSpec::new("angle", ParamType::Dbl);
        assert_eq!(dbl.coerce(3.into()).ok(), Some(ParamValue::Dbl(3.0)));

        let flag = ParamSpec::new("enabled", ParamType::Bool);
        assert_eq!(flag.coerce(0.into()).ok(), Some(ParamValue::Bool(false)));
        assert_eq!(flag.coerce(2.into()).ok(), Some(ParamValue::Bool(true)));
    }

    #[test]
    fn select_rejects_unknown_choice() {
        let spec = ParamSpec::new("draw_mode", ParamType::Select(MODES));
        assert!(spec.coerce("points".into()).is_ok());
        match spec.coerce("quads".into()) {
            Err(Coercion::Choice(v)) => assert_eq!(v, "quads"),
            _ => panic!("quads must be rejected"),
        }
    }

    #[test]
    fn mismatched_kind_reports_value_kind() {
        let spec = ParamSpec::new("corner", ParamType::Vec3);
        match spec.coerce([1.0f32, 2.0].into()) {
            Err(Coercion::Type(kind)) => assert_eq!(kind, "vec2"),
            _ => panic!("vec2 is not a vec3"),
        }
    }

    #[test]
    fn defaults_follow_declared_type() {
        let axis = ParamSpec::new("axis", ParamType::Vec3).default(ParamDefault::Vec3([0.0, 0.0, 1.0]));
        assert_eq!(axis.default_value(), ParamValue::Vec3([0.0, 0.0, 1.0]));
        let children = ParamSpec::new("children", ParamType::NodeList);
        assert_eq!(children.default_value(), ParamValue::NodeList(Vec::new()));
        let child = ParamSpec::new("child", ParamType::Node);
        assert!(child.default_value().is_unset());
    }

    #[test]
    fn constructor_params_can_not_be_unset() {
        let spec = ParamSpec::new("child", ParamType::Node).flags(PARAM_FLAG_CONSTRUCTOR);
        assert!(spec.coerce(ParamValue::Unset).is_err());
    }
}
