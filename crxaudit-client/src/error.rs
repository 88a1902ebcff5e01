use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Report service unreachable for {extension_id} after {attempts} attempt(s)")]
    Unreachable { extension_id: String, attempts: u32 },

    #[error("Request for {0} was cancelled")]
    Cancelled(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ClientError {
    /// True when the service could not be reached at all (as opposed to a
    /// response the client could not use).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Unreachable { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
