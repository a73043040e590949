use thiserror::Error;

use crate::schema::SchemaError;

/// Errors reported by the node API, the scene serializer and the renderer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown node type \"{0}\"")]
    UnknownNodeType(String),
    #[error("{node}: no parameter named \"{key}\"")]
    UnknownParam { node: &'static str, key: String },
    #[error("{node}.{key}: expected {expected}, got {got}")]
    ParamType {
        node: &'static str,
        key: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("{node}.{key}: {child} is not an accepted node type")]
    InvalidNodeType {
        node: &'static str,
        key: String,
        child: &'static str,
    },
    #[error("{node}.{key}: \"{value}\" is not one of [{choices}]")]
    InvalidChoice {
        node: &'static str,
        key: String,
        value: String,
        choices: String,
    },
    #[error("{node}.{key}: {operation} is not supported on a {kind} parameter")]
    ParamOperation {
        node: &'static str,
        key: String,
        operation: &'static str,
        kind: &'static str,
    },
    #[error("{node}: constructor parameter \"{key}\" is not set")]
    MissingConstructor { node: &'static str, key: &'static str },
    #[error("{node}.{key}: this would make the graph cyclic")]
    Cycle { node: &'static str, key: String },
    #[error("{0} is already attached to another context")]
    AlreadyAttached(&'static str),
    #[error("scene is not set, can not draw")]
    NoScene,
    #[error("{node}: {reason}")]
    Init { node: &'static str, reason: String },
    #[error("invalid serialized scene at line {line}: {reason}")]
    Deserialize { line: usize, reason: String },
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Rendering error: {0}")]
    Render(String),
}

impl Error {
    pub(crate) fn init(node: &'static str, reason: impl Into<String>) -> Self {
        Error::Init {
            node,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
