use std::fmt;

/// Error taxonomy for the comms link.
///
/// The four kinds are distinguished by *cause*, not by call site: a
/// malformed `DATA` field and a truncated TCP frame both end up here as
/// different variants so callers can tell "the bytes were garbage" apart
/// from "the link itself failed".
#[derive(Debug, thiserror::Error)]
pub enum ComsError {
    /// Message bytes/string/mapping could not be decoded into a `Message`.
    #[error("failed to parse message: {0}")]
    Parse(String),
    /// A field had a value of a disallowed kind (e.g. a string where 0/1
    /// was expected).
    #[error("invalid message field: {0}")]
    Type(String),
    /// Driver-level read failed or timed out.
    #[error("read failed: {0}")]
    Read(String),
    /// Driver-level write failed (serialization or transport).
    #[error("write failed: {0}")]
    Write(String),
}

impl ComsError {
    pub fn parse(msg: impl fmt::Display) -> Self {
        ComsError::Parse(msg.to_string())
    }

    pub fn type_err(msg: impl fmt::Display) -> Self {
        ComsError::Type(msg.to_string())
    }

    pub fn read(msg: impl fmt::Display) -> Self {
        ComsError::Read(msg.to_string())
    }

    pub fn write(msg: impl fmt::Display) -> Self {
        ComsError::Write(msg.to_string())
    }
}
