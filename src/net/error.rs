use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Connection failed: {0}")]
    Offline(String),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
