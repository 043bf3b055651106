use thiserror::Error;

/// Unified error type for the bridge form library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("http error: {0}")]
    Http(#[from] HttpError),

    #[error("balance lookup error: {0}")]
    Balance(String),

    #[error("max amount estimation error: {0}")]
    Estimate(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Errors raised while validating an entered amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown token kind: {0}")]
    UnknownTokenKind(String),
}

/// Errors while resolving NFT metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("token {name} is not an NFT")]
    NotNft { name: String },

    #[error("token {name} has no metadata uri")]
    MissingUri { name: String },

    #[error("invalid metadata uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("metadata not found at {url}")]
    NotFound { url: String },
}

/// Errors while parsing user-entered amounts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("too many decimal places: at most {max} allowed")]
    TooManyDecimals { max: u8 },

    #[error("fractional amounts are not allowed for ERC1155 tokens")]
    FractionalNotAllowed,
}

/// Errors reported by an [`HttpClient`](crate::metadata::HttpClient).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl HttpError {
    /// True when the request never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, HttpError::Transport { .. } | HttpError::Timeout { .. })
    }
}
