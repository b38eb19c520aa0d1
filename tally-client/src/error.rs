//! Client error types.

use tally_core::TallyError;

use crate::token_store::TokenStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unauthorized: {body}")]
    Unauthorized { body: String },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Token store error: {0}")]
    TokenStore(#[from] TokenStoreError),
    #[error(transparent)]
    Tally(#[from] TallyError),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ClientError::Unauthorized { .. } => true,
            ClientError::Tally(err) => err.is_unauthorized(),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized { .. } => Some(401),
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|s| s.as_u16()),
            ClientError::Tally(TallyError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl From<ClientError> for TallyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) => TallyError::Transport {
                reason: e.to_string(),
            },
            ClientError::Unauthorized { body } => TallyError::Unauthorized { reason: body },
            ClientError::Status { status, body } => TallyError::Status { status, body },
            ClientError::Serde(e) => TallyError::InvalidResponse {
                reason: e.to_string(),
            },
            ClientError::InvalidResponse(reason) => TallyError::InvalidResponse { reason },
            ClientError::Config(reason) => TallyError::Transport { reason },
            ClientError::TokenStore(e) => TallyError::Transport {
                reason: e.to_string(),
            },
            ClientError::Tally(e) => e,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
