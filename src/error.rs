//! The error type shared by every fallible operation in the crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The configuration violates one of its invariants. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data, map or prefix-expression input could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A non-finite value escaped protected evaluation.
    #[error("Non-finite value {value} produced by {expr}")]
    NonFinite { value: f64, expr: String },

    /// An internal logic error, e.g. a node index outside `[0, count)`.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serde error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
