//! Error type for loading and melting environments

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeltError {
    /// The input could not be read as an environment tree
    #[error("invalid environment document: {0}")]
    Document(#[source] serde_json::Error),

    /// A list or reference attribute could not be encoded for storage
    #[error("failed to encode {attribute}: {source}")]
    Serialize {
        attribute: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persistence sink rejected an append or commit
    #[error("sink error: {0:#}")]
    Sink(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MeltError>;
