//! Client/server specializations of the first two phases
//!
//! Client and server sessions differ only in how they perform
//! initialization and configuration; the pairing phase itself lives in
//! the shared engine. The split is a closed two-case variant the engine
//! dispatches on, not an inheritance hierarchy.

use tracing::debug;

use crate::message::{MessageKind, PairingMessage};
use crate::{PairingError, Result};

use super::PairingSession;

/// Which end of the protocol this session plays. Fixed at construction;
/// unrelated to the negotiated Input/Display role.
#[derive(Debug, Clone)]
pub(super) enum SessionKind {
    /// Opens the exchange and computes the configuration.
    Client {
        service_name: String,
        client_name: Option<String>,
    },
    /// Awaits the pairing request and validates the configuration.
    Server { server_name: Option<String> },
}

impl PairingSession {
    /// Phase 1: introduce the endpoints and exchange options.
    pub(super) async fn initialization_phase(&mut self) -> Result<()> {
        match self.kind.clone() {
            SessionKind::Client {
                service_name,
                client_name,
            } => {
                debug!(service = %service_name, "client sending pairing request");
                self.sink
                    .send_message(PairingMessage::PairingRequest {
                        service_name,
                        client_name,
                    })
                    .await?;

                let PairingMessage::PairingRequestAck { server_name } =
                    self.expect_message(MessageKind::PairingRequestAck).await?
                else {
                    return Err(PairingError::Protocol(
                        "pairing request ack expected".to_string(),
                    ));
                };
                self.set_peer_name(server_name);

                self.sink
                    .send_message(PairingMessage::Options(self.options.clone()))
                    .await?;
                let PairingMessage::Options(peer_options) =
                    self.expect_message(MessageKind::Options).await?
                else {
                    return Err(PairingError::Protocol("options expected".to_string()));
                };

                let configuration =
                    self.options
                        .best_configuration(&peer_options)
                        .ok_or_else(|| {
                            PairingError::NoConfiguration(
                                "no mutually supported encoding".to_string(),
                            )
                        })?;
                self.install_configuration(configuration);
                Ok(())
            }
            SessionKind::Server { server_name } => {
                let PairingMessage::PairingRequest {
                    service_name,
                    client_name,
                } = self.expect_message(MessageKind::PairingRequest).await?
                else {
                    return Err(PairingError::Protocol(
                        "pairing request expected".to_string(),
                    ));
                };
                debug!(service = %service_name, client = ?client_name, "server received pairing request");
                self.set_service_name(service_name);
                self.set_peer_name(client_name);

                self.sink
                    .send_message(PairingMessage::PairingRequestAck { server_name })
                    .await?;

                // The server does not negotiate; it records nothing from
                // the client's options and validates the configuration
                // the client proposes in the next phase.
                self.expect_message(MessageKind::Options).await?;
                self.sink
                    .send_message(PairingMessage::Options(self.options.clone()))
                    .await?;
                Ok(())
            }
        }
    }

    /// Phase 2: agree on a single configuration.
    pub(super) async fn configuration_phase(&mut self) -> Result<()> {
        match self.kind {
            SessionKind::Client { .. } => {
                let configuration = self.configuration.ok_or_else(|| {
                    PairingError::Protocol(
                        "configuration phase entered without a configuration".to_string(),
                    )
                })?;
                self.sink
                    .send_message(PairingMessage::Configuration(configuration))
                    .await?;
                self.expect_message(MessageKind::ConfigurationAck).await?;
                Ok(())
            }
            SessionKind::Server { .. } => {
                let PairingMessage::Configuration(configuration) =
                    self.expect_message(MessageKind::Configuration).await?
                else {
                    return Err(PairingError::Protocol("configuration expected".to_string()));
                };

                configuration.encoding.validate()?;
                let local_role = configuration.local_role(true);
                if !self.options.supports(local_role, &configuration.encoding) {
                    return Err(PairingError::NoConfiguration(format!(
                        "peer proposed an encoding this endpoint does not support for the {local_role:?} role"
                    )));
                }

                self.install_configuration(configuration);
                self.sink
                    .send_message(PairingMessage::ConfigurationAck)
                    .await?;
                Ok(())
            }
        }
    }
}
