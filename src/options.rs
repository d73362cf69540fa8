//! Options and configuration negotiation
//!
//! During initialization both endpoints exchange their supported secret
//! encodings and role preference. The client intersects the two option
//! sets into a single [`Configuration`] — one agreed encoding plus the
//! role assignment — which the server then validates against its own
//! support. Options are effectively immutable once the session starts;
//! the sealing is enforced here rather than in the state machine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoding::Encoding;
use crate::{PairingError, Result};

/// Role an endpoint plays during the pairing phase.
///
/// Exactly one endpoint plays `Input` (receives and types the secret),
/// the other `Display` (shows the secret). The role is negotiated, not
/// fixed by client/server identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Receives the human-relayed secret and submits it back.
    Input,
    /// Computes and shows the secret to the human.
    Display,
}

impl DeviceRole {
    /// The complementary role.
    pub fn opposite(&self) -> Self {
        match self {
            DeviceRole::Input => DeviceRole::Display,
            DeviceRole::Display => DeviceRole::Input,
        }
    }
}

/// One endpoint's supported encodings and role preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    input_encodings: Vec<Encoding>,
    output_encodings: Vec<Encoding>,
    preferred_role: Option<DeviceRole>,
    #[serde(skip)]
    sealed: bool,
}

impl Options {
    /// Create empty options with no role preference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supported encodings for acting as the Input device, in preference
    /// order.
    pub fn input_encodings(&self) -> &[Encoding] {
        &self.input_encodings
    }

    /// Supported encodings for acting as the Display device, in
    /// preference order.
    pub fn output_encodings(&self) -> &[Encoding] {
        &self.output_encodings
    }

    /// The preferred pairing-phase role, if any.
    pub fn preferred_role(&self) -> Option<DeviceRole> {
        self.preferred_role
    }

    /// Set the preferred pairing-phase role.
    pub fn set_preferred_role(&mut self, role: DeviceRole) -> Result<()> {
        self.ensure_unsealed()?;
        self.preferred_role = Some(role);
        Ok(())
    }

    /// Add a supported input encoding.
    ///
    /// # Errors
    ///
    /// [`PairingError::InvalidArgument`] for an odd or too-short symbol
    /// length; [`PairingError::IllegalState`] once the session has
    /// started.
    pub fn add_input_encoding(&mut self, encoding: Encoding) -> Result<()> {
        self.ensure_unsealed()?;
        encoding.validate()?;
        if !self.input_encodings.contains(&encoding) {
            self.input_encodings.push(encoding);
        }
        Ok(())
    }

    /// Add a supported output encoding.
    ///
    /// Same failure modes as [`Options::add_input_encoding`].
    pub fn add_output_encoding(&mut self, encoding: Encoding) -> Result<()> {
        self.ensure_unsealed()?;
        encoding.validate()?;
        if !self.output_encodings.contains(&encoding) {
            self.output_encodings.push(encoding);
        }
        Ok(())
    }

    /// Freeze the options. Called by the session when it starts; every
    /// later mutation attempt is an [`PairingError::IllegalState`].
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    fn ensure_unsealed(&self) -> Result<()> {
        if self.sealed {
            return Err(PairingError::IllegalState(
                "options cannot change after the session has started".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether this endpoint supports `encoding` when playing `role`.
    pub fn supports(&self, role: DeviceRole, encoding: &Encoding) -> bool {
        match role {
            DeviceRole::Input => self.input_encodings.contains(encoding),
            DeviceRole::Display => self.output_encodings.contains(encoding),
        }
    }

    /// Intersect these (client-side) options with the peer's into a
    /// single agreed configuration.
    ///
    /// Role resolution: complementary preferences stand; if both sides
    /// prefer the same role the caller yields; an absent local preference
    /// defers to the complement of the peer's. The encoding is the first
    /// mutually supported one in local preference order for the resolved
    /// role, falling back to the opposite role before giving up.
    ///
    /// Returns `None` when no mutually supported encoding exists under
    /// either role assignment.
    pub fn best_configuration(&self, peer: &Options) -> Option<Configuration> {
        let preferred = self.resolve_client_role(peer);

        for client_role in [preferred, preferred.opposite()] {
            if let Some(encoding) = self.common_encoding(peer, client_role) {
                debug!(?client_role, ?encoding, "negotiated configuration");
                return Some(Configuration {
                    encoding,
                    client_role,
                });
            }
        }

        debug!("no mutually supported encoding");
        None
    }

    fn resolve_client_role(&self, peer: &Options) -> DeviceRole {
        match (self.preferred_role, peer.preferred_role) {
            (Some(local), Some(remote)) if local != remote => local,
            // Both want the same role: the caller yields.
            (Some(local), Some(_)) => local.opposite(),
            (Some(local), None) => local,
            (None, Some(remote)) => remote.opposite(),
            (None, None) => {
                if self.output_encodings.is_empty() {
                    DeviceRole::Input
                } else {
                    DeviceRole::Display
                }
            }
        }
    }

    /// First encoding, in local preference order, usable when the local
    /// (client) side plays `client_role`.
    fn common_encoding(&self, peer: &Options, client_role: DeviceRole) -> Option<Encoding> {
        let (local, remote) = match client_role {
            DeviceRole::Display => (&self.output_encodings, &peer.input_encodings),
            DeviceRole::Input => (&self.input_encodings, &peer.output_encodings),
        };
        local.iter().find(|e| remote.contains(e)).copied()
    }
}

/// The single agreed (encoding, role) pair produced by negotiation.
///
/// `client_role` is the pairing-phase role of the protocol client; the
/// server plays the complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// The agreed secret encoding
    pub encoding: Encoding,
    /// The protocol client's pairing-phase role
    pub client_role: DeviceRole,
}

impl Configuration {
    /// The negotiated role of one endpoint, given whether it is the
    /// protocol server.
    pub fn local_role(&self, server: bool) -> DeviceRole {
        if server {
            self.client_role.opposite()
        } else {
            self.client_role
        }
    }
}
