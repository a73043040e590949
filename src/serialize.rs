//! Text serialization of node graphs.
//!
//! ```text
//! # node.gl v0.1.0
//! Quad corner=-1,-1,0 width=2,0,0 height=0,2,0
//! Shader
//! TexturedShape shape=0 shader=1
//! ```
//!
//! One line per node, children before their parents, the root last. Only
//! parameters that differ from their default are written. Node references
//! are indices of previous node lines; lists are comma separated and dicts
//! are written as `name:index` pairs. Strings and dict names are
//! percent-escaped, data is hex and `~` stands for an unset value.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use crate::error::{Error, Result};
use crate::nodes::Node;
use crate::params::{ParamSpec, ParamType, ParamValue};

const HEADER: &str = "# node.gl v";
const UNSET: &str = "~";

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'-' | b'/') {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02x}");
        }
    }
    out
}

fn unescape(s: &str) -> std::result::Result<String, String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s
                .get(i + 1..i + 3)
                .ok_or_else(|| format!("truncated escape in \"{s}\""))?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| format!("invalid escape %{hex}"))?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| e.to_string())
}

fn join<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn format_value(value: &ParamValue, index: &HashMap<u64, usize>) -> String {
    let idx = |node: &Node| index[&node.id()].to_string();
    match value {
        ParamValue::Unset => UNSET.to_string(),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::Bool(v) => (*v as u8).to_string(),
        ParamValue::Dbl(v) => v.to_string(),
        ParamValue::Str(v) => escape(v),
        ParamValue::Data(v) => v.iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        }),
        ParamValue::Vec2(v) => join(v),
        ParamValue::Vec3(v) => join(v),
        ParamValue::Vec4(v) => join(v),
        ParamValue::Node(node) => idx(node),
        ParamValue::NodeList(nodes) => nodes.iter().map(idx).collect::<Vec<_>>().join(","),
        ParamValue::NodeDict(nodes) => nodes
            .iter()
            .map(|(name, node)| format!("{}:{}", escape(name), idx(node)))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Nodes reachable from `root`, each once, children first.
fn post_order(root: &Node) -> Vec<Node> {
    fn visit(node: &Node, done: &mut HashSet<u64>, out: &mut Vec<Node>) {
        if !done.insert(node.id()) {
            return;
        }
        for child in node.children() {
            visit(&child, done, out);
        }
        out.push(node.clone());
    }
    let mut out = Vec::new();
    visit(root, &mut HashSet::new(), &mut out);
    out
}

pub(crate) fn serialize(root: &Node) -> String {
    let nodes = post_order(root);
    let index: HashMap<u64, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id(), i)).collect();

    let mut out = format!("{HEADER}{}\n", env!("CARGO_PKG_VERSION"));
    for node in &nodes {
        let ty = node.node_type();
        out.push_str(ty.name());
        let inner = node.inner();
        for (spec, value) in ty.all_params().zip(&inner.params) {
            if *value == spec.default_value() {
                continue;
            }
            let _ = write!(out, " {}={}", spec.key, format_value(value, &index));
        }
        out.push('\n');
    }
    out
}

fn parse_floats<const N: usize>(s: &str) -> std::result::Result<[f32; N], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != N {
        return Err(format!("expected {N} components, got \"{s}\""));
    }
    let mut v = [0.0; N];
    for (dst, part) in v.iter_mut().zip(parts) {
        *dst = part.parse().map_err(|_| format!("invalid float \"{part}\""))?;
    }
    Ok(v)
}

fn parse_value(spec: &ParamSpec, s: &str, nodes: &[Node]) -> std::result::Result<ParamValue, String> {
    if s == UNSET {
        return Ok(ParamValue::Unset);
    }
    let node_ref = |s: &str| -> std::result::Result<Node, String> {
        let i: usize = s.parse().map_err(|_| format!("invalid node index \"{s}\""))?;
        nodes
            .get(i)
            .cloned()
            .ok_or_else(|| format!("node index {i} is not defined yet"))
    };
    let value = match spec.ty {
        ParamType::Int => ParamValue::Int(s.parse().map_err(|_| format!("invalid int \"{s}\""))?),
        ParamType::Bool => match s {
            "0" => ParamValue::Bool(false),
            "1" => ParamValue::Bool(true),
            _ => return Err(format!("invalid bool \"{s}\"")),
        },
        ParamType::Dbl => ParamValue::Dbl(s.parse().map_err(|_| format!("invalid double \"{s}\""))?),
        ParamType::Str | ParamType::Select(_) => ParamValue::Str(unescape(s)?),
        ParamType::Data => {
            if s.len() % 2 != 0 {
                return Err("odd number of hex digits".to_string());
            }
            let data = (0..s.len())
                .step_by(2)
                .map(|i| s.get(i..i + 2).and_then(|hex| u8::from_str_radix(hex, 16).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| format!("invalid hex data \"{s}\""))?;
            ParamValue::Data(data)
        }
        ParamType::Vec2 => ParamValue::Vec2(parse_floats(s)?),
        ParamType::Vec3 => ParamValue::Vec3(parse_floats(s)?),
        ParamType::Vec4 => ParamValue::Vec4(parse_floats(s)?),
        ParamType::Node => ParamValue::Node(node_ref(s)?),
        ParamType::NodeList => ParamValue::NodeList(
            s.split(',')
                .filter(|part| !part.is_empty())
                .map(node_ref)
                .collect::<std::result::Result<_, _>>()?,
        ),
        ParamType::NodeDict => {
            let mut dict = BTreeMap::new();
            for entry in s.split(',').filter(|entry| !entry.is_empty()) {
                let (name, i) = entry
                    .split_once(':')
                    .ok_or_else(|| format!("invalid dict entry \"{entry}\""))?;
                dict.insert(unescape(name)?, node_ref(i)?);
            }
            ParamValue::NodeDict(dict)
        }
    };
    Ok(value)
}

pub(crate) fn deserialize(text: &str) -> Result<Node> {
    let err = |line: usize, reason: String| Error::Deserialize { line, reason };
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    let version = match lines.next() {
        Some((_, header)) if header.starts_with(HEADER) => &header[HEADER.len()..],
        _ => return Err(err(1, "missing node.gl header".to_string())),
    };
    if version != env!("CARGO_PKG_VERSION") {
        log::warn!("deserializing a scene written by node.gl v{version}");
    }

    let mut nodes: Vec<Node> = Vec::new();
    for (line, text) in lines {
        let mut tokens = text.split_whitespace();
        let Some(class) = tokens.next() else {
            continue;
        };
        let node = Node::from_name(class).map_err(|e| err(line, e.to_string()))?;
        for token in tokens {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| err(line, format!("expected key=value, got \"{token}\"")))?;
            let (_, spec) = node
                .node_type()
                .lookup(key)
                .ok_or_else(|| err(line, format!("{class} has no parameter \"{key}\"")))?;
            let value = parse_value(spec, value, &nodes).map_err(|reason| err(line, reason))?;
            node.set(key, value).map_err(|e| err(line, e.to_string()))?;
        }
        nodes.push(node);
    }
    nodes
        .pop()
        .ok_or_else(|| err(text.lines().count().max(1), "no node to deserialize".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_round_trips() {
        let s = "a b=c,d:%é\n";
        assert_eq!(unescape(&escape(s)).unwrap(), s);
        assert!(!escape(s).contains(' '));
    }

    #[test]
    fn bad_index_reports_line() {
        let text = format!("{HEADER}{}\nGroup children=3\n", env!("CARGO_PKG_VERSION"));
        match deserialize(&text) {
            Err(Error::Deserialize { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn header_is_required() {
        assert!(matches!(deserialize("Group\n"), Err(Error::Deserialize { line: 1, .. })));
    }
}
