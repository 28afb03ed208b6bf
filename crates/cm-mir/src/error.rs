use thiserror::Error;

use crate::ids::BlockId;

/// Errors the MIR layer can raise: malformed IR (a bug upstream of this
/// crate) or the pipeline failing to settle (spec §7).
#[derive(Debug, Error)]
pub enum MirError {
    #[error("invariant violation in pass `{pass}` at block {block:?}: {message}")]
    InvariantViolation { pass: &'static str, block: BlockId, message: String },

    #[error("optimization pipeline did not converge after {iterations} iterations ({reason})")]
    TimeoutOrCycle { iterations: usize, reason: &'static str },
}

pub type MirResult<T> = Result<T, MirError>;
