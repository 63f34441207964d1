use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Vault errors. Decryption fails closed: any tampering with the
/// ciphertext or tag surfaces as `DecryptionFailure`, never as garbage
/// plaintext.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("vault decryption failed (wrong key or tampered record)")]
    DecryptionFailure,

    #[error("vault encryption failed")]
    EncryptionFailure,

    #[error("no session stored for wallet '{wallet}'")]
    MissingSession { wallet: String },

    #[error("no pending request with id {request_id}")]
    MissingRequest { request_id: String },

    #[error("malformed vault record at {path}: {reason}")]
    MalformedRecord { path: String, reason: String },

    #[error("vault IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised during the approval handshake.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("approval request {request_id} expired at {expired_at}")]
    ExpiredRequest {
        request_id: String,
        expired_at: String,
    },

    #[error("invalid session payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("chain mismatch: requested {requested} but payload targets chain id {received}")]
    ChainMismatch { requested: String, received: u64 },

    #[error("no approval callback received within {timeout_secs}s; retry with a larger --timeout")]
    CallbackTimeout { timeout_secs: u64 },

    #[error("tunnel unavailable: {reason}")]
    TunnelUnavailable { reason: String },
}

/// Errors from the trading venue HTTP API.
#[derive(Error, Debug)]
pub enum VenueError {
    #[error("venue authentication failed: {detail}")]
    AuthFailed { detail: String },

    #[error("order rejected by venue: {detail}")]
    OrderRejected { detail: String },

    #[error("venue returned malformed response for {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("market {market_id} has no {outcome} outcome token")]
    UnknownOutcome { market_id: String, outcome: String },

    #[error("failed to sign venue request: {0}")]
    SigningFailed(String),
}

/// Errors from on-chain submission and the custodial funding service.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("insufficient gas: {detail}")]
    InsufficientGas { detail: String },

    #[error("transaction failed: {detail}")]
    TransactionFailed { detail: String },

    #[error("custodial transfer rejected: {detail}")]
    CustodialRejected { detail: String },

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        // dialoguer::Error wraps an IO error
        Error::Io(std::io::Error::other(err.to_string()))
    }
}

/// Classify a raw chain-transaction failure, surfacing gas exhaustion
/// verbatim as its own variant.
pub fn classify_chain_failure(detail: String) -> ChainError {
    let lowered = detail.to_lowercase();
    if lowered.contains("gas") || lowered.contains("insufficient funds") {
        ChainError::InsufficientGas { detail }
    } else {
        ChainError::TransactionFailed { detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_failures_are_classified_as_insufficient_gas() {
        let err = classify_chain_failure("intrinsic gas too low".into());
        assert!(matches!(err, ChainError::InsufficientGas { .. }));

        let err = classify_chain_failure("insufficient funds for transfer".into());
        assert!(matches!(err, ChainError::InsufficientGas { .. }));
    }

    #[test]
    fn other_failures_stay_transaction_failed() {
        let err = classify_chain_failure("execution reverted".into());
        assert!(matches!(err, ChainError::TransactionFailed { .. }));
    }

    #[test]
    fn session_errors_render_operator_guidance() {
        let err = SessionError::CallbackTimeout { timeout_secs: 300 };
        assert!(err.to_string().contains("--timeout"));
    }
}
