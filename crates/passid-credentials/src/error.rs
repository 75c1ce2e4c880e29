/// Credential issuer client errors.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("issuer request failed: {0}")]
    Transport(String),

    #[error("issuer request timed out")]
    Timeout,

    #[error("issuer returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid issuer response: {0}")]
    InvalidResponse(String),

    #[error("invalid issuer configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for IssuerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IssuerError::Timeout
        } else if e.is_decode() {
            IssuerError::InvalidResponse(e.to_string())
        } else {
            IssuerError::Transport(e.to_string())
        }
    }
}

/// Secret store errors. Messages never include secret values.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    #[error("secret store returned status {status} for {path}")]
    Api { status: u16, path: String },

    #[error("secret {key} missing at {path}")]
    Missing { key: String, path: String },

    #[error("malformed secret store response: {0}")]
    Malformed(String),
}
