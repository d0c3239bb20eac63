pub mod digraph;
pub mod error;
pub mod search;

pub use digraph::DiGraph;
pub use error::GraphError;
