//! Node specification file.
//!
//! The specification is a YAML list of single-key maps, one per node class:
//!
//! ```yaml
//! - _Node:
//!     optional:
//!     - [name, string]
//! - Quad:
//!     constructors:
//!     - [corner, vec3]
//!     optional:
//!     - [uv_corner, vec2]
//! ```
//!
//! `_Node` lists the fields shared by every class. This module is also
//! compiled into the build script, so it only depends on serde, serde_yaml
//! and thiserror.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use serde::Deserialize;
use thiserror::Error;

/// Name of the entry holding the fields common to all classes.
pub const COMMON_ENTRY: &str = "_Node";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("entry #{index}: {reason}")]
    Malformed { index: usize, reason: String },
    #[error("{node}.{field}: unknown field kind \"{kind}\"")]
    UnknownKind {
        node: String,
        field: String,
        kind: String,
    },
    #[error("{node}.{field}: {kind} fields can not be constructor arguments")]
    CollectionConstructor {
        node: String,
        field: String,
        kind: &'static str,
    },
    #[error("node {0} is declared twice")]
    DuplicateNode(String),
    #[error("{node}.{field} is declared twice")]
    DuplicateField { node: String, field: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Bool,
    Double,
    String,
    Select,
    Data,
    Vec(usize),
    Node,
    NodeList,
    NodeDict,
}

impl FieldKind {
    /// Parses a kind name. `float` is accepted as an alias of `double`.
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "int" => FieldKind::Int,
            "bool" => FieldKind::Bool,
            "double" | "float" => FieldKind::Double,
            "string" => FieldKind::String,
            "select" => FieldKind::Select,
            "data" => FieldKind::Data,
            "vec2" => FieldKind::Vec(2),
            "vec3" => FieldKind::Vec(3),
            "vec4" => FieldKind::Vec(4),
            "Node" => FieldKind::Node,
            "NodeList" => FieldKind::NodeList,
            "NodeDict" => FieldKind::NodeDict,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Bool => "bool",
            FieldKind::Double => "double",
            FieldKind::String => "string",
            FieldKind::Select => "select",
            FieldKind::Data => "data",
            FieldKind::Vec(2) => "vec2",
            FieldKind::Vec(3) => "vec3",
            FieldKind::Vec(_) => "vec4",
            FieldKind::Node => "Node",
            FieldKind::NodeList => "NodeList",
            FieldKind::NodeDict => "NodeDict",
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::NodeList | FieldKind::NodeDict)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub constructors: Vec<FieldSpec>,
    pub optional: Vec<FieldSpec>,
}

impl NodeSpec {
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.constructors.iter().chain(&self.optional)
    }
}

/// A parsed specification file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSpecs {
    /// Fields of the `_Node` entry.
    pub common: Vec<FieldSpec>,
    pub nodes: Vec<NodeSpec>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawFields {
    #[serde(default)]
    constructors: Vec<(String, String)>,
    #[serde(default)]
    optional: Vec<(String, String)>,
}

type RawEntry = BTreeMap<String, Option<RawFields>>;

fn fields(
    node: &str,
    raw: Vec<(String, String)>,
    constructor: bool,
    seen: &mut HashSet<String>,
) -> Result<Vec<FieldSpec>, SchemaError> {
    raw.into_iter()
        .map(|(name, kind_name)| {
            let kind = FieldKind::parse(&kind_name).ok_or_else(|| SchemaError::UnknownKind {
                node: node.to_string(),
                field: name.clone(),
                kind: kind_name.clone(),
            })?;
            if constructor && kind.is_collection() {
                return Err(SchemaError::CollectionConstructor {
                    node: node.to_string(),
                    field: name,
                    kind: kind.name(),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateField {
                    node: node.to_string(),
                    field: name,
                });
            }
            Ok(FieldSpec { name, kind })
        })
        .collect()
}

impl NodeSpecs {
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let entries: Vec<RawEntry> = serde_yaml::from_str(text)?;
        let mut specs = NodeSpecs::default();
        let mut names = HashSet::new();
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.len() != 1 {
                return Err(SchemaError::Malformed {
                    index,
                    reason: format!("expected a single node name, got {}", entry.len()),
                });
            }
            let Some((name, raw)) = entry.into_iter().next() else {
                continue;
            };
            if !names.insert(name.clone()) {
                return Err(SchemaError::DuplicateNode(name));
            }
            let raw = raw.unwrap_or_default();
            let mut seen = HashSet::new();
            let constructors = fields(&name, raw.constructors, true, &mut seen)?;
            let optional = fields(&name, raw.optional, false, &mut seen)?;

            if name == COMMON_ENTRY {
                if !constructors.is_empty() {
                    return Err(SchemaError::Malformed {
                        index,
                        reason: format!("{COMMON_ENTRY} can not have constructor fields"),
                    });
                }
                specs.common = optional;
            } else {
                specs.nodes.push(NodeSpec {
                    name,
                    constructors,
                    optional,
                });
            }
        }
        Ok(specs)
    }

    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Renders the specification in the file format read by [`NodeSpecs::parse`].
    pub fn to_yaml(&self) -> String {
        fn section(out: &mut String, title: &str, fields: &[FieldSpec]) {
            if fields.is_empty() {
                return;
            }
            let _ = writeln!(out, "    {title}:");
            for field in fields {
                let _ = writeln!(out, "    - [{}, {}]", field.name, field.kind.name());
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "- {COMMON_ENTRY}:");
        section(&mut out, "optional", &self.common);
        for node in &self.nodes {
            let _ = writeln!(out, "- {}:", node.name);
            section(&mut out, "constructors", &node.constructors);
            section(&mut out, "optional", &node.optional);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &str = "
- _Node:
    optional:
    - [name, string]
- Identity:
- Translate:
    constructors:
    - [child, Node]
    optional:
    - [vector, vec3]
    - [animkf, NodeList]
- Uniform:
    optional:
    - [value, float]
";

    #[test]
    fn parses_entries_in_order() {
        let specs = NodeSpecs::parse(SPECS).unwrap();
        assert_eq!(specs.common[0].kind, FieldKind::String);
        let names: Vec<_> = specs.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Identity", "Translate", "Uniform"]);
        let translate = specs.get("Translate").unwrap();
        assert_eq!(translate.constructors[0].kind, FieldKind::Node);
        assert_eq!(translate.optional[0].kind, FieldKind::Vec(3));
        assert_eq!(specs.get("Uniform").unwrap().optional[0].kind, FieldKind::Double);
    }

    #[test]
    fn yaml_output_parses_back() {
        let specs = NodeSpecs::parse(SPECS).unwrap();
        let again = NodeSpecs::parse(&specs.to_yaml()).unwrap();
        assert_eq!(specs, again);
    }

    #[test]
    fn rejects_unknown_kinds() {
        let err = NodeSpecs::parse("- Quad:\n    optional:\n    - [corner, vec5]\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownKind { .. }));
    }

    #[test]
    fn rejects_list_constructors() {
        let err = NodeSpecs::parse("- Group:\n    constructors:\n    - [children, NodeList]\n").unwrap_err();
        assert!(matches!(err, SchemaError::CollectionConstructor { .. }));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            NodeSpecs::parse("- Quad:\n  Triangle:\n"),
            Err(SchemaError::Malformed { index: 0, .. })
        ));
        assert!(matches!(
            NodeSpecs::parse("- Quad:\n    mandatory: []\n"),
            Err(SchemaError::Yaml(_))
        ));
        assert!(matches!(
            NodeSpecs::parse("- Quad:\n- Quad:\n"),
            Err(SchemaError::DuplicateNode(_))
        ));
    }
}
