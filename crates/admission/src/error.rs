use evl_types::{AccAddress, U256};
use std::fmt;

/// Stable classification of admission failures, reported to submitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedTxShape,
    UnprotectedTransaction,
    InvalidSigner,
    InvalidSignature,
    SequenceMismatch,
    InsufficientFee,
    DisallowedNestedMessage,
    UnsupportedExtensionOption,
    OutOfGas,
    Overflow,
    InsufficientFunds,
    FeeGrantRejected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a transaction was refused. Aborts admission of that transaction only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("unsupported transaction shape: {0}")]
    UnsupportedTxShape(String),
    #[error("transaction is not replay protected: no EIP-155 chain id")]
    UnprotectedTransaction,
    #[error("invalid signer: {0}")]
    InvalidSigner(String),
    #[error("declared sender {declared} does not match recovered signer {recovered}")]
    SignerMismatch { declared: String, recovered: String },
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("account sequence mismatch for {address}: expected {expected}, got {got}")]
    SequenceMismatch {
        address: AccAddress,
        expected: u64,
        got: u64,
    },
    #[error("insufficient fee: required {required}, given {given}")]
    InsufficientFee { required: U256, given: U256 },
    #[error("nested message {type_url} is not allowed: {reason}")]
    DisallowedNestedMessage { type_url: String, reason: String },
    #[error("extension option {0} is not allowed")]
    UnsupportedExtensionOption(String),
    #[error("out of gas in {descriptor}: limit {limit}, consumed {consumed}, wanted {wanted}")]
    OutOfGas {
        descriptor: &'static str,
        limit: u64,
        consumed: u64,
        wanted: u64,
    },
    #[error("arithmetic overflow: {0}")]
    Overflow(String),
    #[error("insufficient funds in {address}: balance {balance}, required {required}")]
    InsufficientFunds {
        address: AccAddress,
        balance: U256,
        required: U256,
    },
    #[error("fee grant rejected: {0}")]
    FeeGrantRejected(String),
}

impl AdmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedTxShape(_) => ErrorKind::UnsupportedTxShape,
            Self::UnprotectedTransaction => ErrorKind::UnprotectedTransaction,
            Self::InvalidSigner(_) | Self::SignerMismatch { .. } => ErrorKind::InvalidSigner,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::SequenceMismatch { .. } => ErrorKind::SequenceMismatch,
            Self::InsufficientFee { .. } => ErrorKind::InsufficientFee,
            Self::DisallowedNestedMessage { .. } => ErrorKind::DisallowedNestedMessage,
            Self::UnsupportedExtensionOption(_) => ErrorKind::UnsupportedExtensionOption,
            Self::OutOfGas { .. } => ErrorKind::OutOfGas,
            Self::Overflow(_) => ErrorKind::Overflow,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::FeeGrantRejected(_) => ErrorKind::FeeGrantRejected,
        }
    }

    pub fn unsupported_shape(reason: impl fmt::Display) -> Self {
        Self::UnsupportedTxShape(reason.to_string())
    }

    pub fn invalid_signer(reason: impl fmt::Display) -> Self {
        Self::InvalidSigner(reason.to_string())
    }

    pub fn invalid_signature(reason: impl fmt::Display) -> Self {
        Self::InvalidSignature(reason.to_string())
    }
}

/// A failure of the backing store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record {key} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("required record {0} is missing")]
    Missing(String),
}

/// Persisted state could not be trusted. Processing must halt: continuing
/// with a guessed value risks diverging from other nodes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("state corruption: {0}")]
pub struct StateCorruption(pub String);

impl From<StoreError> for StateCorruption {
    fn from(value: StoreError) -> Self {
        Self(value.to_string())
    }
}

/// Outcome of a failing stage: either a rejection of the transaction or a
/// fatal condition that must stop the node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Rejected(#[from] AdmissionError),
    #[error(transparent)]
    Fatal(#[from] StateCorruption),
}

impl From<StoreError> for StageError {
    fn from(value: StoreError) -> Self {
        Self::Fatal(value.into())
    }
}
