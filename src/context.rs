//! Certificate and endpoint context for a pairing session
//!
//! A pairing session is bound to the TLS certificates of both endpoints.
//! Which certificate belongs to the protocol client and which to the
//! server is derived from the endpoint's own role, so the
//! challenge-response engine can always hash key material in the fixed
//! client-then-server order regardless of which side is computing.

use openssl::pkey::Id;
use openssl::x509::{X509Ref, X509};
use tracing::debug;

use crate::{PairingError, Result};

/// RSA public key material extracted from a certificate.
///
/// Big-endian byte representations of the modulus and public exponent,
/// as produced by OpenSSL. Extraction is the single point where a
/// non-RSA certificate is rejected, before any cryptography proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyMaterial {
    /// Big-endian modulus bytes
    pub modulus: Vec<u8>,
    /// Big-endian public exponent bytes
    pub exponent: Vec<u8>,
}

impl RsaKeyMaterial {
    /// Extract RSA key material from a certificate's public key.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnsupportedKeyType`] if the certificate
    /// does not carry an RSA public key.
    pub fn from_certificate(certificate: &X509Ref) -> Result<Self> {
        let public_key = certificate.public_key()?;

        if public_key.id() != Id::RSA {
            return Err(PairingError::UnsupportedKeyType(format!(
                "{:?}",
                public_key.id()
            )));
        }

        let rsa = public_key.rsa()?;
        let material = Self {
            modulus: rsa.n().to_vec(),
            exponent: rsa.e().to_vec(),
        };

        debug!(
            modulus_bytes = material.modulus.len(),
            exponent_bytes = material.exponent.len(),
            "extracted RSA key material"
        );

        Ok(material)
    }
}

/// Certificate context of one endpoint of a pairing session.
///
/// Holds the local and peer certificates, typically taken from an
/// established TLS connection, together with the endpoint's protocol
/// identity (client or server).
#[derive(Debug, Clone)]
pub struct PairingContext {
    local_certificate: X509,
    peer_certificate: X509,
    server: bool,
}

impl PairingContext {
    /// Create a context from the two endpoint certificates.
    ///
    /// `server` is true when this endpoint accepted the connection, i.e.
    /// plays the protocol server.
    pub fn from_certificates(local_certificate: X509, peer_certificate: X509, server: bool) -> Self {
        Self {
            local_certificate,
            peer_certificate,
            server,
        }
    }

    /// Whether this endpoint is the protocol server.
    pub fn is_server(&self) -> bool {
        self.server
    }

    /// This endpoint's own certificate.
    pub fn local_certificate(&self) -> &X509Ref {
        &self.local_certificate
    }

    /// The peer endpoint's certificate.
    pub fn peer_certificate(&self) -> &X509Ref {
        &self.peer_certificate
    }

    /// The certificate of whichever endpoint plays the protocol client.
    pub fn client_certificate(&self) -> &X509Ref {
        if self.server {
            &self.peer_certificate
        } else {
            &self.local_certificate
        }
    }

    /// The certificate of whichever endpoint plays the protocol server.
    pub fn server_certificate(&self) -> &X509Ref {
        if self.server {
            &self.local_certificate
        } else {
            &self.peer_certificate
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_certificates::{self_signed, self_signed_ec};
    use super::*;

    #[test]
    fn test_rsa_material_extraction() {
        let cert = self_signed("device-a");
        let material = RsaKeyMaterial::from_certificate(&cert).unwrap();

        // 2048-bit modulus, standard exponent 65537
        assert_eq!(material.modulus.len(), 256);
        assert_eq!(material.exponent, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_non_rsa_key_rejected() {
        let cert = self_signed_ec("device-ec");
        let result = RsaKeyMaterial::from_certificate(&cert);

        assert!(matches!(result, Err(PairingError::UnsupportedKeyType(_))));
    }

    #[test]
    fn test_role_derived_certificates() {
        let local = self_signed("local");
        let peer = self_signed("peer");

        let client_side = PairingContext::from_certificates(local.clone(), peer.clone(), false);
        let server_side = PairingContext::from_certificates(peer.clone(), local.clone(), true);

        // The client endpoint's own certificate is the client certificate.
        assert_eq!(
            client_side.client_certificate().to_der().unwrap(),
            local.to_der().unwrap()
        );
        assert_eq!(
            client_side.server_certificate().to_der().unwrap(),
            peer.to_der().unwrap()
        );

        // On the server endpoint the mapping inverts.
        assert_eq!(
            server_side.client_certificate().to_der().unwrap(),
            local.to_der().unwrap()
        );
        assert_eq!(
            server_side.server_certificate().to_der().unwrap(),
            peer.to_der().unwrap()
        );
    }
}
