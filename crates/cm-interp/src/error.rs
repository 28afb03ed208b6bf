use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpError {
    #[error("entry function `{0}` not found")]
    EntryNotFound(String),

    #[error("entry function `{0}` must take zero parameters")]
    EntryHasParameters(String),

    #[error("reached an Unreachable terminator in function `{0}`")]
    Unreachable(String),

    #[error("recursion depth exceeded calling `{0}`")]
    StackOverflow(String),
}

pub type InterpResult<T> = Result<T, InterpError>;
