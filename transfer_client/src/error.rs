use anyhow::anyhow;
use reqwest::StatusCode;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransferError {
    /// Connect or health-probe failure.
    #[error("Connection Error: {0}")]
    Connection(String),

    /// Non-auth HTTP failure, surfaced after retries are exhausted.
    #[error("Request failed with status {status}")]
    Request { status: StatusCode },

    /// An operation that needs a registered client id was issued before
    /// connect succeeded.
    #[error("Not connected to the transfer server")]
    NotConnected,

    /// Push-channel failure. Only surfaced when the initial channel open
    /// fails; later failures are absorbed by the resubscribe loop.
    #[error("Stream Error: {0}")]
    Stream(String),

    /// Download-session failure. Terminal for the session it names.
    #[error("Download Session Error: {0}")]
    Session(String),

    #[error("Parse Error: {0}")]
    ParseError(#[from] url::ParseError),

    #[error("Reqwest Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Invalid Payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Other Internal Error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;

impl PartialEq for TransferError {
    fn eq(&self, other: &TransferError) -> bool {
        match (self, other) {
            (TransferError::Request { status: a }, TransferError::Request { status: b }) => a == b,
            (e1, e2) => std::mem::discriminant(e1) == std::mem::discriminant(e2),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for TransferError {
    fn from(value: std::sync::PoisonError<T>) -> Self {
        TransferError::InternalError(anyhow!("{value:?}"))
    }
}
