//! Device Pairing Protocol Engine
//!
//! This library implements the pairing protocol between an input-capable
//! device and a display-capable device: the two endpoints mutually
//! authenticate using their TLS certificates and a short human-relayed
//! secret, establishing trust without a pre-shared key.
//!
//! The crate owns the session state machine, the challenge-response
//! secret derivation and the concurrent message rendezvous; the wire
//! encoding, the transport and the user interface are collaborators
//! behind the [`MessageSink`]/[`MessageSource`] and [`PairingListener`]
//! traits.
//!
//! ## Overview
//!
//! ```no_run
//! use std::sync::Arc;
//! use devicepair_protocol::{Encoding, PairingContext, PairingSession};
//! # use devicepair_protocol::{MessageSink, MessageSource, PairingListener};
//!
//! # async fn pair(
//! #     sink: Box<dyn MessageSink>,
//! #     source: Box<dyn MessageSource>,
//! #     context: PairingContext,
//! #     ui: Arc<dyn PairingListener>,
//! # ) {
//! let mut session = PairingSession::client(sink, source, context, "tv-remote", None);
//! session.add_input_encoding(Encoding::hexadecimal(4).unwrap()).unwrap();
//! session.add_output_encoding(Encoding::hexadecimal(4).unwrap()).unwrap();
//!
//! session.run_pairing(ui).await;
//! assert!(session.has_completed());
//! # }
//! ```

pub mod challenge;
pub mod context;
pub mod encoding;
pub mod listener;
pub mod message;
pub mod options;
pub mod session;

mod error;

pub use challenge::{extract_nonce, ChallengeResponse};
pub use context::{PairingContext, RsaKeyMaterial};
pub use encoding::{Encoding, EncodingType, SecretEncoder};
pub use error::{PairingError, Result};
pub use listener::{LogLevel, PairingListener};
pub use message::{MessageKind, MessageSink, MessageSource, PairingMessage};
pub use options::{Configuration, DeviceRole, Options};
pub use session::{PairingSession, SessionHandle, SessionState, QUEUE_POLL_INTERVAL};

/// Protocol version we implement
pub const PROTOCOL_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }
}
