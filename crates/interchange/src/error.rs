use thiserror::Error;

/// Unified error type for the Interchange library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("wallet connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("swap unavailable: {0}")]
    SwapUnavailable(String),
}

/// Errors raised while connecting a wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("no compatible signer extension detected")]
    SignerUnavailable,

    #[error("unsupported chain id: {0}")]
    UnsupportedChain(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),
}

/// Errors from the local key/value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}
