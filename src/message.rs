//! Typed protocol messages and the wire collaborator seam
//!
//! The core never touches bytes on the wire. A serializer/deserializer
//! behind the [`MessageSink`]/[`MessageSource`] traits owns the encoding;
//! the core only requires ordered, reliable delivery of typed messages.
//! An in-band error message from the peer surfaces from
//! [`MessageSource::next_message`] as an `Err`, not as a message variant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::options::{Configuration, Options};
use crate::{PairingError, Result};

/// Discriminant of a [`PairingMessage`], used for type-checked awaiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    PairingRequest,
    PairingRequestAck,
    Options,
    Configuration,
    ConfigurationAck,
    Secret,
    SecretAck,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::PairingRequest => "PairingRequest",
            MessageKind::PairingRequestAck => "PairingRequestAck",
            MessageKind::Options => "Options",
            MessageKind::Configuration => "Configuration",
            MessageKind::ConfigurationAck => "ConfigurationAck",
            MessageKind::Secret => "Secret",
            MessageKind::SecretAck => "SecretAck",
        };
        f.write_str(name)
    }
}

/// One protocol message.
///
/// Payloads are opaque to the transport; the serde derives exist so an
/// external wire codec can encode them without reaching into the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMessage {
    /// Client opens the session, naming the service it wants to pair
    /// with and optionally itself.
    PairingRequest {
        service_name: String,
        client_name: Option<String>,
    },
    /// Server acknowledges, optionally naming itself.
    PairingRequestAck { server_name: Option<String> },
    /// Either side's supported encodings and role preference.
    Options(Options),
    /// The client's computed configuration.
    Configuration(Configuration),
    /// Server accepts the configuration.
    ConfigurationAck,
    /// The alpha value proving possession of the relayed secret.
    Secret { payload: Vec<u8> },
    /// Acknowledges a valid secret, echoing the received payload.
    SecretAck { payload: Vec<u8> },
}

impl PairingMessage {
    /// The message's kind discriminant.
    pub fn kind(&self) -> MessageKind {
        match self {
            PairingMessage::PairingRequest { .. } => MessageKind::PairingRequest,
            PairingMessage::PairingRequestAck { .. } => MessageKind::PairingRequestAck,
            PairingMessage::Options(_) => MessageKind::Options,
            PairingMessage::Configuration(_) => MessageKind::Configuration,
            PairingMessage::ConfigurationAck => MessageKind::ConfigurationAck,
            PairingMessage::Secret { .. } => MessageKind::Secret,
            PairingMessage::SecretAck { .. } => MessageKind::SecretAck,
        }
    }
}

/// Outbound half of the wire collaborator.
#[async_trait]
pub trait MessageSink: Send {
    /// Send one protocol message. Delivery must be ordered and reliable.
    async fn send_message(&mut self, message: PairingMessage) -> Result<()>;

    /// Best-effort error notification to the peer. Implementations
    /// should translate this into the wire's error message.
    async fn send_error(&mut self, error: &PairingError) -> Result<()>;

    /// Close the outbound direction. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of the wire collaborator.
///
/// Consumed exclusively by the session's background reader; the call may
/// block until a message arrives. A peer error message, a decode failure
/// or a transport failure all surface as `Err`.
#[async_trait]
pub trait MessageSource: Send {
    async fn next_message(&mut self) -> Result<PairingMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Encoding;

    #[test]
    fn test_message_kinds() {
        let message = PairingMessage::PairingRequest {
            service_name: "tv-service".to_string(),
            client_name: Some("remote".to_string()),
        };
        assert_eq!(message.kind(), MessageKind::PairingRequest);
        assert_eq!(message.kind().to_string(), "PairingRequest");

        assert_eq!(
            PairingMessage::ConfigurationAck.kind(),
            MessageKind::ConfigurationAck
        );
    }

    #[test]
    fn test_messages_are_wire_serializable() {
        let mut options = Options::new();
        options
            .add_input_encoding(Encoding::hexadecimal(4).unwrap())
            .unwrap();
        let message = PairingMessage::Options(options);

        let json = serde_json::to_string(&message).unwrap();
        let decoded: PairingMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, message);
    }
}
