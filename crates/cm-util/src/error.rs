use thiserror::Error;

/// Errors shared at the util layer. Most crates define their own richer
/// error enums; this one covers the handful of operations `cm-util`
/// itself can fail.
#[derive(Debug, Error)]
pub enum UtilError {
    #[error("index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    #[error("invalid span: start {start} > end {end}")]
    InvalidSpan { start: usize, end: usize },
}
