//! Graphviz export of node graphs.

use std::fmt::Write;

use crate::nodes::Node;
use crate::params::{ParamType, ParamValue};

const MAX_STRING: usize = 24;

fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Short display of a scalar value, `None` for node references.
fn scalar(value: &ParamValue) -> Option<String> {
    let text = match value {
        ParamValue::Unset => "unset".to_string(),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::Bool(v) => v.to_string(),
        ParamValue::Dbl(v) => format!("{v:.3}"),
        ParamValue::Str(v) => {
            let first = v.lines().next().unwrap_or_default();
            if first.len() > MAX_STRING || v.lines().nth(1).is_some() {
                let cut: String = first.chars().take(MAX_STRING).collect();
                format!("{cut}...")
            } else {
                first.to_string()
            }
        }
        ParamValue::Data(v) => format!("<{} bytes>", v.len()),
        ParamValue::Vec2(v) => format!("({:.3},{:.3})", v[0], v[1]),
        ParamValue::Vec3(v) => format!("({:.3},{:.3},{:.3})", v[0], v[1], v[2]),
        ParamValue::Vec4(v) => format!("({:.3},{:.3},{:.3},{:.3})", v[0], v[1], v[2], v[3]),
        ParamValue::Node(_) | ParamValue::NodeList(_) | ParamValue::NodeDict(_) => return None,
    };
    Some(text)
}

/// Non-default scalar parameters of `node` as `key: value` lines, `name`
/// excluded.
fn scalar_lines(node: &Node) -> Vec<String> {
    let ty = node.node_type();
    let inner = node.inner();
    ty.all_params()
        .zip(&inner.params)
        .filter(|(spec, value)| spec.key != "name" && **value != spec.default_value())
        .filter_map(|(spec, value)| scalar(value).map(|v| format!("{}: {v}", spec.key)))
        .collect()
}

fn label(node: &Node) -> String {
    let ty = node.node_type();
    let mut lines = vec![ty.name().to_string()];
    if let Some(name) = node.inner().string("name") {
        lines.push(format!("\"{name}\""));
    }
    lines.extend(scalar_lines(node));

    let inner = node.inner();
    for (spec, value) in ty.all_params().zip(&inner.params) {
        if !spec.is_dot_packed() {
            continue;
        }
        if let ParamValue::NodeList(children) = value {
            for (i, child) in children.iter().enumerate() {
                let fields = scalar_lines(child).join(" ");
                lines.push(format!("{}#{i}: {} {fields}", spec.key, child.node_type()));
            }
        }
    }
    escape_label(&lines.join("\n")).replace('\n', "\\n")
}

pub(crate) fn dot(root: &Node) -> String {
    let mut out = String::from("digraph \"ngl\" {\n    node [shape=box, fontsize=10];\n");
    let nodes = root.walk();
    let packed = |node: &Node| -> Vec<u64> {
        let ty = node.node_type();
        let inner = node.inner();
        ty.all_params()
            .zip(&inner.params)
            .filter(|(spec, _)| spec.is_dot_packed())
            .flat_map(|(_, value)| value.nodes())
            .map(|n| n.id())
            .collect()
    };
    // packed children only show up in their owner's label
    let hidden: Vec<u64> = nodes.iter().flat_map(|n| packed(n)).collect();
    let referenced: Vec<u64> = nodes
        .iter()
        .flat_map(|n| {
            let ty = n.node_type();
            let inner = n.inner();
            ty.all_params()
                .zip(&inner.params)
                .filter(|(spec, _)| !spec.is_dot_packed())
                .flat_map(|(_, value)| value.nodes())
                .map(|c| c.id())
                .collect::<Vec<_>>()
        })
        .collect();

    for node in &nodes {
        let id = node.id();
        if !node.ptr_eq(root) && hidden.contains(&id) && !referenced.contains(&id) {
            continue;
        }
        let _ = writeln!(out, "    n{id} [label=\"{}\"];", label(node));
    }

    for node in &nodes {
        let id = node.id();
        if !node.ptr_eq(root) && hidden.contains(&id) && !referenced.contains(&id) {
            continue;
        }
        let ty = node.node_type();
        let inner = node.inner();
        for (spec, value) in ty.all_params().zip(&inner.params) {
            if !spec.ty.is_node() || spec.is_dot_packed() {
                continue;
            }
            match (spec.ty, value) {
                (ParamType::Node, ParamValue::Node(child)) => {
                    let _ = writeln!(out, "    n{id} -> n{} [label=\"{}\"];", child.id(), spec.key);
                }
                (_, ParamValue::NodeList(children)) => {
                    for (i, child) in children.iter().enumerate() {
                        let _ = writeln!(out, "    n{id} -> n{} [label=\"{}#{i}\"];", child.id(), spec.key);
                    }
                }
                (_, ParamValue::NodeDict(children)) => {
                    for (name, child) in children {
                        let _ = writeln!(
                            out,
                            "    n{id} -> n{} [label=\"{}:{}\"];",
                            child.id(),
                            spec.key,
                            escape_label(name)
                        );
                    }
                }
                _ => (),
            }
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeType;

    #[test]
    fn keyframes_are_packed_in_the_owner() {
        let kf = Node::new(NodeType::AnimKeyFrameScalar);
        kf.set("time", 1.0).unwrap();
        kf.set("value", 90.0).unwrap();
        let rotate = Node::new(NodeType::Rotate);
        rotate.set("child", Node::new(NodeType::Identity)).unwrap();
        rotate.add("animkf", [kf.clone()]).unwrap();

        let dot = rotate.dot();
        assert!(!dot.contains(&format!("    n{} [label", kf.id())));
        assert!(dot.contains("animkf#0: AnimKeyFrameScalar time: 1.000 value: 90.000"));
        assert!(dot.contains("[label=\"child\"]"));
    }

    #[test]
    fn shared_nodes_appear_once() {
        let texture = Node::new(NodeType::Texture);
        let group = Node::new(NodeType::Group);
        for _ in 0..2 {
            let shape = Node::new(NodeType::TexturedShape);
            shape.set_dict("textures", "tex0", Some(texture.clone())).unwrap();
            group.add("children", [shape]).unwrap();
        }
        let dot = group.dot();
        assert_eq!(dot.matches(&format!("    n{} [label", texture.id())).count(), 1);
        assert_eq!(dot.matches("[label=\"textures:tex0\"]").count(), 2);
    }
}
