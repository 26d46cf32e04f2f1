pub type FfpipeResult<T> = Result<T, FfpipeError>;

/// Top-level error taxonomy used by the composer, the graph tools and the stream workers.
#[derive(thiserror::Error, Debug)]
pub enum FfpipeError {
    /// Conflicting pad labels or a malformed chain definition.
    #[error("composition error: {0}")]
    Composition(String),

    /// Structurally invalid filtergraph (missing link info, disallowed split, bad syntax).
    #[error("filtergraph error: {0}")]
    Graph(String),

    /// A background worker needed by the call is not (or no longer) running.
    #[error("not running: {0}")]
    NotRunning(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Invalid caller-provided configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// ffmpeg reported a failure; carries its diagnostic output.
    #[error("ffmpeg error: {0}")]
    Ffmpeg(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FfpipeError {
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    pub fn not_running(msg: impl Into<String>) -> Self {
        Self::NotRunning(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn ffmpeg(msg: impl Into<String>) -> Self {
        Self::Ffmpeg(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::NotRunning(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
