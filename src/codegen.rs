//! Binding generator.
//!
//! Turns a [`NodeSpecs`] into Rust source with one wrapper type per node
//! class. A wrapper is a typed front for a [`crate::Node`]: its constructor
//! takes the constructor fields, and every optional field gets a setter
//! (`set_*`, `add_*` for lists, `update_*`/`unset_*` for dicts). Everything
//! else, including `serialize` and `dot`, is reached through `Deref`.
//!
//! The output expects `Node`, `ParamValue` and `Result` to be in scope,
//! which the header it emits takes care of when included in this crate.

use std::fmt::Write;

use crate::schema::{FieldKind, FieldSpec, NodeSpec, NodeSpecs};

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type",
    "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final", "macro",
    "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// `name` usable as an identifier.
fn ident(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Argument type of a scalar field.
fn arg_type(kind: FieldKind) -> String {
    match kind {
        FieldKind::Int => "i64".to_string(),
        FieldKind::Bool => "bool".to_string(),
        FieldKind::Double => "f64".to_string(),
        FieldKind::String | FieldKind::Select => "&str".to_string(),
        FieldKind::Data => "&[u8]".to_string(),
        FieldKind::Vec(n) => format!("[f32; {n}]"),
        FieldKind::Node | FieldKind::NodeList | FieldKind::NodeDict => "impl Into<Node>".to_string(),
    }
}

/// Expression converting argument `arg` for `Node::set`.
fn arg_value(kind: FieldKind, arg: &str) -> String {
    match kind {
        FieldKind::Node => format!("Into::<Node>::into({arg})"),
        _ => arg.to_string(),
    }
}

fn write_setters(out: &mut String, field: &FieldSpec) {
    let key = &field.name;
    let arg = ident(key);
    match field.kind {
        FieldKind::NodeList => {
            let _ = writeln!(
                out,
                "    pub fn add_{key}<I, N>(&self, {arg}: I) -> Result<()>
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {{
        self.0.add(\"{key}\", {arg}.into_iter().map(Into::into))
    }}
"
            );
        }
        FieldKind::NodeDict => {
            let _ = writeln!(
                out,
                "    pub fn update_{key}<'a, I, N>(&self, {arg}: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, N)>,
        N: Into<Node>,
    {{
        for (name, node) in {arg} {{
            self.0.set_dict(\"{key}\", name, Some(node.into()))?;
        }}
        Ok(())
    }}

    pub fn unset_{key}(&self, name: &str) -> Result<()> {{
        self.0.set_dict(\"{key}\", name, None)
    }}
"
            );
        }
        kind => {
            let _ = writeln!(
                out,
                "    pub fn set_{key}(&self, {arg}: {}) -> Result<()> {{
        self.0.set(\"{key}\", {})
    }}
",
                arg_type(kind),
                arg_value(kind, &arg)
            );
        }
    }
}

fn write_node(out: &mut String, node: &NodeSpec, common: &[FieldSpec]) {
    let name = &node.name;
    let args = node
        .constructors
        .iter()
        .map(|f| format!("{}: {}", ident(&f.name), arg_type(f.kind)))
        .collect::<Vec<_>>()
        .join(", ");

    let _ = writeln!(out, "/// Typed handle on a `{name}` node.");
    let _ = writeln!(out, "#[derive(Clone, Debug, PartialEq)]");
    let _ = writeln!(out, "pub struct {name}(Node);\n");
    let _ = writeln!(out, "impl {name} {{");
    let _ = writeln!(out, "    pub fn new({args}) -> Result<Self> {{");
    let _ = writeln!(out, "        let node = Node::from_name(\"{name}\")?;");
    for field in &node.constructors {
        let _ = writeln!(
            out,
            "        node.set(\"{}\", {})?;",
            field.name,
            arg_value(field.kind, &ident(&field.name))
        );
    }
    let _ = writeln!(out, "        Ok(Self(node))");
    let _ = writeln!(out, "    }}\n");
    for field in common.iter().chain(&node.optional) {
        write_setters(out, field);
    }
    let _ = writeln!(out, "    pub fn into_node(self) -> Node {{");
    let _ = writeln!(out, "        self.0");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(
        out,
        "impl std::ops::Deref for {name} {{
    type Target = Node;

    fn deref(&self) -> &Node {{
        &self.0
    }}
}}

impl AsRef<Node> for {name} {{
    fn as_ref(&self) -> &Node {{
        &self.0
    }}
}}

impl From<{name}> for Node {{
    fn from(wrapper: {name}) -> Node {{
        wrapper.0
    }}
}}

impl From<&{name}> for Node {{
    fn from(wrapper: &{name}) -> Node {{
        wrapper.0.clone()
    }}
}}

impl From<{name}> for ParamValue {{
    fn from(wrapper: {name}) -> ParamValue {{
        ParamValue::Node(wrapper.0)
    }}
}}
"
    );
}

/// Generates the bindings source for `specs`.
pub fn generate(specs: &NodeSpecs) -> String {
    let mut out = String::from(
        "// Generated from the node specification file. Do not edit.\n\n\
         #[allow(unused_imports)]\n\
         use crate::error::Result;\n\
         #[allow(unused_imports)]\n\
         use crate::nodes::Node;\n\
         #[allow(unused_imports)]\n\
         use crate::params::ParamValue;\n\n",
    );
    for node in &specs.nodes {
        write_node(&mut out, node, &specs.common);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> NodeSpecs {
        NodeSpecs::parse(
            "
- _Node:
    optional:
    - [name, string]
- Texture:
    optional:
    - [type, int]
- TexturedShape:
    constructors:
    - [shape, Node]
    - [shader, Node]
    optional:
    - [textures, NodeDict]
- Group:
    optional:
    - [children, NodeList]
",
        )
        .unwrap()
    }

    #[test]
    fn constructor_takes_constructor_fields() {
        let code = generate(&specs());
        assert!(code.contains(
            "pub fn new(shape: impl Into<Node>, shader: impl Into<Node>) -> Result<Self>"
        ));
        assert!(code.contains("node.set(\"shape\", Into::<Node>::into(shape))?;"));
    }

    #[test]
    fn setters_follow_field_kinds() {
        let code = generate(&specs());
        assert!(code.contains("pub fn set_name(&self, name: &str) -> Result<()>"));
        assert!(code.contains("pub fn add_children<I, N>(&self, children: I) -> Result<()>"));
        assert!(code.contains("pub fn update_textures<'a, I, N>(&self, textures: I)"));
        assert!(code.contains("pub fn unset_textures(&self, name: &str)"));
    }

    #[test]
    fn keywords_are_escaped() {
        let code = generate(&specs());
        assert!(code.contains("pub fn set_type(&self, r#type: i64) -> Result<()>"));
        assert!(code.contains("self.0.set(\"type\", r#type)"));
    }

    #[test]
    fn every_class_derefs_to_node() {
        let code = generate(&specs());
        for name in ["Texture", "TexturedShape", "Group"] {
            assert!(code.contains(&format!("impl std::ops::Deref for {name} {{")));
        }
    }
}
