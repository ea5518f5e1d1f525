//! Application-wide error types.
//!
//! Playback code absorbs most recoverable conditions locally (a broken
//! playlist source or an unwritable state file must never take the whole
//! rotation down), so these types mostly flow into `tracing` calls rather
//! than up the stack. The CLI layer uses `anyhow` for anything that should
//! actually abort a command.

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (bad path, malformed value)
    #[error("Configuration error: {0}")]
    Config(String),

    /// External player process error (spawn, kill, wait)
    #[error("Playback error: {0}")]
    Playback(String),

    /// Position store read/write error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Track source could not be expanded
    #[error("Source unavailable: {}", .0.display())]
    Source(PathBuf),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a playback error.
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Create a source error.
    pub fn source(path: impl Into<PathBuf>) -> Self {
        Self::Source(path.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::source("/music/playlist1");
        assert!(err.to_string().contains("/music/playlist1"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::playback("spawn failed").context("while starting track");
        let msg = err.to_string();
        assert!(msg.contains("while starting track"));
        assert!(msg.contains("spawn failed"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::persistence("disk full"));
        let with_ctx = result.with_context("saving track index");
        assert!(
            with_ctx
                .unwrap_err()
                .to_string()
                .contains("saving track index")
        );
    }
}
