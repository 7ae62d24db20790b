use thiserror::Error;

/// Rejections raised by scene mutations and configuration checks.
///
/// None of these are fatal: a rejected mutation leaves the scene untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditorError {
    #[error("a link from '{0}' to itself is not allowed")]
    SelfLoop(String),

    #[error("a link from '{from}' to '{to}' already exists")]
    DuplicateLink { from: String, to: String },

    #[error("node '{0}' does not exist")]
    UnknownNode(String),

    #[error("link '{from}' -> '{to}' does not exist")]
    UnknownLink { from: String, to: String },

    #[error("subgraph '{0}' does not exist")]
    UnknownSubgraph(String),

    #[error("identifier '{0}' is already in use")]
    DuplicateId(String),

    #[error("{entity} size {width}x{height} is below the {min_width}x{min_height} minimum")]
    BelowMinimumSize {
        entity: &'static str,
        width: f64,
        height: f64,
        min_width: f64,
        min_height: f64,
    },

    #[error("unrecognized key '{0}'")]
    UnknownKey(String),

    #[error("invalid editor configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write svg output")]
    Format(#[from] std::fmt::Error),

    #[error("png export failed: {0}")]
    Raster(String),
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
