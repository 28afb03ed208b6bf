use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrvError {
    #[error("unknown fixture `{0}`; available: {1}")]
    UnknownFixture(String, String),

    #[error("entry function `{0}` not found in fixture `{1}`")]
    EntryNotFound(String, String),

    #[error(transparent)]
    Interp(#[from] cm_interp::InterpError),

    #[error(transparent)]
    JsGen(#[from] cm_jsgen::JsGenError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
