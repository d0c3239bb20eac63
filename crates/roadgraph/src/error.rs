use std::fmt;

/// Errors raised while building or searching a `DiGraph`.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// An arc or a search referenced a node outside `0..size`.
    NodeOutOfRange { node: usize, size: usize },
    /// Arc weights must be finite and non-negative.
    InvalidWeight { arc: usize, weight: f64 },
    /// Search cutoffs must be non-negative (infinity is allowed).
    InvalidCutoff(f64),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::NodeOutOfRange { node, size } => {
                write!(f, "node {node} out of range for graph of {size} nodes")
            }
            GraphError::InvalidWeight { arc, weight } => {
                write!(f, "arc {arc} has invalid weight {weight}")
            }
            GraphError::InvalidCutoff(cutoff) => write!(f, "invalid search cutoff {cutoff}"),
        }
    }
}

impl std::error::Error for GraphError {}
