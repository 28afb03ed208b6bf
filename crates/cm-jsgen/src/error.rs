use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsGenError {
    /// A manual-memory builtin (`malloc`/`free`/...) or a raw `void*`
    /// local reached the JS back end, which has no addressable heap.
    #[error("function `{function}` uses `{symbol}`, which has no JS equivalent")]
    TargetRejection { function: String, symbol: String },
}

pub type JsGenResult<T> = Result<T, JsGenError>;
