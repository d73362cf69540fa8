//! Challenge-response secret derivation
//!
//! The human-relayed pairing secret is built from the TLS certificates of
//! both endpoints and a fresh random nonce:
//!
//! - **alpha** — SHA-256 over, in fixed order, the client modulus, client
//!   exponent, server modulus, server exponent, and the nonce. Each of
//!   the four key components is independently stripped of leading zero
//!   bytes before hashing.
//! - **gamma** — the first `nonce.len()` bytes of alpha concatenated with
//!   the nonce itself; this is the value a human relays between devices.
//!
//! The Display-role endpoint generates the nonce and shows gamma; the
//! Input-role endpoint validates the typed-in gamma with [`check_gamma`],
//! recovers the nonce with [`extract_nonce`] and proves possession of the
//! same certificate view by sending back its alpha.

use openssl::x509::X509Ref;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::context::RsaKeyMaterial;
use crate::{PairingError, Result};

/// Challenge-response engine bound to one (client, server) certificate
/// pair.
///
/// Construction is the single failure point: both certificates must carry
/// RSA public keys. All derivations afterwards are pure functions of the
/// nonce.
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    client: RsaKeyMaterial,
    server: RsaKeyMaterial,
}

impl ChallengeResponse {
    /// Build the engine from the client and server certificates.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::UnsupportedKeyType`] if either certificate
    /// does not carry an RSA public key.
    pub fn new(client_certificate: &X509Ref, server_certificate: &X509Ref) -> Result<Self> {
        Ok(Self {
            client: RsaKeyMaterial::from_certificate(client_certificate)?,
            server: RsaKeyMaterial::from_certificate(server_certificate)?,
        })
    }

    /// Build the engine directly from already-extracted key material.
    pub fn from_material(client: RsaKeyMaterial, server: RsaKeyMaterial) -> Self {
        Self { client, server }
    }

    /// Compute alpha for the given nonce: the 32-byte SHA-256 digest of
    /// the ordered key material concatenation.
    pub fn alpha(&self, nonce: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(strip_leading_zeros(&self.client.modulus));
        hasher.update(strip_leading_zeros(&self.client.exponent));
        hasher.update(strip_leading_zeros(&self.server.modulus));
        hasher.update(strip_leading_zeros(&self.server.exponent));
        hasher.update(nonce);
        let digest = hasher.finalize().to_vec();

        debug!(nonce_len = nonce.len(), "computed alpha");
        digest
    }

    /// Compute gamma for the given nonce: `alpha[..nonce.len()]`
    /// concatenated with the nonce. Total length is twice the nonce
    /// length.
    ///
    /// # Panics
    ///
    /// Panics if the nonce is longer than the 32-byte alpha digest. Nonce
    /// sizes are derived from negotiated encodings and never approach
    /// that bound; a violation is a programming error, not a protocol
    /// condition.
    pub fn gamma(&self, nonce: &[u8]) -> Vec<u8> {
        let alpha = self.alpha(nonce);
        assert!(
            alpha.len() >= nonce.len(),
            "nonce ({} bytes) exceeds alpha digest ({} bytes)",
            nonce.len(),
            alpha.len()
        );

        let mut gamma = Vec::with_capacity(nonce.len() * 2);
        gamma.extend_from_slice(&alpha[..nonce.len()]);
        gamma.extend_from_slice(nonce);
        gamma
    }

    /// Validate a human-entered gamma value.
    ///
    /// Extracts the nonce (returning `false`, not an error, on a
    /// malformed gamma) and recomputes gamma from it; true iff the
    /// recomputation is byte-equal to the input. Used only by the
    /// Input-role endpoint.
    pub fn check_gamma(&self, gamma: &[u8]) -> bool {
        let nonce = match extract_nonce(gamma) {
            Ok(nonce) => nonce,
            Err(_) => {
                debug!(len = gamma.len(), "gamma check failed: malformed input");
                return false;
            }
        };

        self.gamma(&nonce) == gamma
    }
}

/// Extract the nonce from a gamma value: its second half.
///
/// # Errors
///
/// Returns [`PairingError::InvalidArgument`] unless the gamma length is
/// even and at least 2.
pub fn extract_nonce(gamma: &[u8]) -> Result<Vec<u8>> {
    if gamma.len() < 2 || gamma.len() % 2 != 0 {
        return Err(PairingError::InvalidArgument(format!(
            "gamma length must be even and >= 2, got {}",
            gamma.len()
        )));
    }
    Ok(gamma[gamma.len() / 2..].to_vec())
}

/// Strip leading zero bytes from a big-endian value.
///
/// An all-zero value reduces to a single zero byte, never an empty slice.
fn strip_leading_zeros(value: &[u8]) -> &[u8] {
    match value.iter().position(|&b| b != 0) {
        Some(first) => &value[first..],
        None if value.is_empty() => value,
        None => &value[value.len() - 1..],
    }
}
