use thiserror::Error;

/// Cache failures are never fatal to a build: callers log via
/// [`tracing`] and fall back to a cold compile rather than propagate
/// these out of `cm-drv`'s top level (spec §4.13).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("malformed manifest line: {0}")]
    MalformedManifest(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
