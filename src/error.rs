use thiserror::Error;

/// Errors that can occur in graphbatch.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unsupported declarative input: wildcarded file paths,
    /// unsupported feature transforms, zero negative-sample counts,
    /// fanout specs with the wrong number of layers, and similar.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Node type not present in the graph.
    #[error("node type not found in graph: {0}")]
    UnknownNodeType(String),
    /// Canonical edge type not present in the graph.
    #[error("edge type not found in graph: {0}")]
    UnknownEdgeType(String),
    /// Edge ID outside the range of its edge type.
    #[error("edge id {eid} out of range for edge type {etype} ({num_edges} edges)")]
    EdgeIdOutOfRange {
        etype: String,
        eid: u64,
        num_edges: usize,
    },
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for graphbatch.
pub type Result<T> = std::result::Result<T, Error>;
