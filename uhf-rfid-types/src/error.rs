//! Value errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value is outside what the reader accepts
    #[error("Invalid value: {0}")]
    Validation(String),

    /// A byte or code has no meaning for the target type
    #[error("Unrecognised value: {0}")]
    Parse(String),
}
