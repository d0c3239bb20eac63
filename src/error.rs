use std::fmt;

/// Result alias used across the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure classes that drive how a caller reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Uninitialized raster or layer, unknown decay function, bad identifiers.
    /// Raised before any work starts and fatal to the caller.
    Configuration,
    /// Empty fid query, missing spatial reference, missing attribute.
    /// Reported per item; the item is left out of the checkpoint log.
    Data,
    /// Memory pressure or lock contention that outlived polling.
    ResourceTransient,
    /// Reprojection, crop or rasterization failure for one feature.
    Computation,
    /// Filesystem or storage failure.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Data => "data",
            ErrorKind::ResourceTransient => "resource",
            ErrorKind::Computation => "computation",
            ErrorKind::Storage => "storage",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("computation error: {0}")]
    Computation(String),

    #[error("graph error: {0}")]
    Graph(#[from] roadgraph::GraphError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{context}: {source}")]
    Context { context: String, source: Box<Error> },
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self { Error::Configuration(msg.into()) }
    pub fn data(msg: impl Into<String>) -> Self { Error::Data(msg.into()) }
    pub fn computation(msg: impl Into<String>) -> Self { Error::Computation(msg.into()) }

    /// Classify the error for batch bookkeeping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Data(_) => ErrorKind::Data,
            Error::Resource(_) => ErrorKind::ResourceTransient,
            Error::Computation(_) | Error::Graph(_) => ErrorKind::Computation,
            Error::Io(_) | Error::Sqlite(_) | Error::Json(_) => ErrorKind::Storage,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// Whether a batch may carry on with sibling items after this error.
    #[inline]
    pub fn is_recoverable(&self) -> bool { self.kind() != ErrorKind::Configuration }

    /// Wrap the error with a description of what was being attempted.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context { context: context.into(), source: Box::new(self) }
    }
}

/// `anyhow`-style context for engine results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|e| e.into().context(f()))
    }
}
