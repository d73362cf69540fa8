//! Error handling for the pairing protocol
//!
//! Every error in this taxonomy is terminal for the session it occurs in:
//! the state machine transitions to `Failed` and nothing is retried
//! internally. Callers observe the outcome through
//! [`PairingSession::has_succeeded`](crate::PairingSession::has_succeeded)
//! rather than through errors escaping the driver.

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, PairingError>;

/// Errors that can occur during a pairing session
///
/// Most variants convert automatically from underlying library errors
/// using the `From` trait:
/// - `std::io::Error` → `PairingError::Transport`
/// - `openssl::error::ErrorStack` → `PairingError::Certificate`
#[derive(Error, Debug)]
pub enum PairingError {
    /// A certificate carries a public key the challenge-response engine
    /// cannot use. Only RSA keys expose the (modulus, exponent) material
    /// that alpha is computed over.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Malformed input: a gamma/nonce of invalid length, or an encoding
    /// with an odd or too-short symbol length.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The local and remote options share no mutually supported
    /// encoding, or the peer proposed a configuration the local options
    /// do not support for the assigned role.
    #[error("no configuration available: {0}")]
    NoConfiguration(String),

    /// Unexpected message type or order, or an explicit error message
    /// received from the peer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The human-relayed secret failed validation: either the local
    /// gamma check on the Input side, or the in-band alpha comparison on
    /// the Display side.
    #[error("secret mismatch")]
    BadSecret,

    /// I/O failure on the wire. A single transport error is fatal to the
    /// session; there is no retry at this layer.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A programming error: mutation of session options after the
    /// session has started.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Certificate parsing or key extraction failure.
    #[error("certificate error: {0}")]
    Certificate(#[from] openssl::error::ErrorStack),

    /// Failure in a cryptographic primitive, e.g. the secure random
    /// source refusing to produce nonce bytes.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The session was torn down while an operation was in progress.
    #[error("session cancelled: {0}")]
    Cancelled(String),
}

impl PairingError {
    /// Short cause string handed to the peer in a best-effort error
    /// notification. Deliberately coarse: the peer only needs to know the
    /// failure class, not local detail.
    pub fn peer_report(&self) -> &'static str {
        match self {
            PairingError::UnsupportedKeyType(_) => "unsupported key type",
            PairingError::InvalidArgument(_) => "invalid argument",
            PairingError::NoConfiguration(_) => "no configuration available",
            PairingError::Protocol(_) => "protocol error",
            PairingError::BadSecret => "secret mismatch",
            PairingError::Transport(_) => "transport error",
            PairingError::IllegalState(_) => "illegal state",
            PairingError::Certificate(_) => "certificate error",
            PairingError::Crypto(_) => "crypto error",
            PairingError::Cancelled(_) => "session cancelled",
        }
    }
}
