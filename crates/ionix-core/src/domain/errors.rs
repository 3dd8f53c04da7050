//! Errors - handler 実行時のエラー

/// Failure raised by a handler.
///
/// Dispatch catches every `HandlerError` and turns it into
/// [`DispatchOutcome::HandlerError`](super::DispatchOutcome::HandlerError);
/// it never reaches the caller of `consume`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    /// A typed handler could not decode the payload into its event struct.
    #[error("payload decode: {0}")]
    Payload(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
