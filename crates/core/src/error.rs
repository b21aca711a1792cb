use thiserror::Error;

pub type ShowcaseResult<T> = Result<T, ShowcaseError>;

#[derive(Error, Debug)]
pub enum ShowcaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing delivery credentials (api key and delivery token are required)")]
    MissingCredentials,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Personalization error: {0}")]
    Personalization(String),

    #[error("Event sink error: {0}")]
    Sink(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
