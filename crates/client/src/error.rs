use celebra_core::payment::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Configuration(String),
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(String),
    #[error("backend error (status {status}): {body}")]
    Status { status: u16, body: String },
    #[error("response parsing failed: {0}")]
    Decode(String),
}

impl ClientError {
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

impl From<ClientError> for BackendError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Timeout => Self::Timeout,
            ClientError::Status { status, body } => Self::Status { status, body },
            ClientError::Decode(message) => Self::MalformedPayload(message),
            ClientError::Configuration(message) | ClientError::Request(message) => {
                Self::Transport(message)
            }
        }
    }
}
