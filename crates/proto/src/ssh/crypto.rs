//! SSH transport protection (aes256-gcm@openssh.com).
//!
//! This module builds the per-direction AEAD state installed after key
//! exchange:
//!
//! - [`EncryptionKey`] / [`DecryptionKey`] - one direction each of
//!   AES-256-GCM in the OpenSSH variant
//! - [`TransportProtector`] - the factory pairing both directions for one
//!   role, built straight from derived [`KeyMaterial`]
//!
//! # Nonce handling
//!
//! The OpenSSH AES-GCM variant (per RFC 5647 as deployed) treats the 12-byte
//! derived IV as a 4-byte fixed field plus an 8-byte invocation counter. The
//! counter starts at the derived value and increments once per packet; both
//! peers advance it in lockstep, so no nonce ever travels on the wire.
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::crypto::TransportProtector;
//! use halyard_proto::ssh::ecdh::KeyMaterial;
//!
//! let keys = KeyMaterial::derive(&[0x42; 32], &[0x01; 32], &[0x01; 32]);
//! let client = TransportProtector::for_role(true, &keys).unwrap();
//! let server = TransportProtector::for_role(false, &keys).unwrap();
//!
//! let (mut client_out, _client_in) = client.into_halves();
//! let (_server_out, mut server_in) = server.into_halves();
//!
//! let mut payload = b"ssh-userauth".to_vec();
//! client_out.encrypt(&mut payload).unwrap();
//! server_in.decrypt(&mut payload).unwrap();
//! assert_eq!(payload, b"ssh-userauth");
//! ```

use halyard_platform::{HalyardError, HalyardResult};
use ring::aead::{
    Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM,
};

use crate::ssh::ecdh::KeyMaterial;

/// Cipher algorithm for SSH transport protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// AES-256-GCM, OpenSSH variant
    Aes256Gcm,
}

impl CipherAlgorithm {
    /// Returns the algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes256Gcm => "aes256-gcm@openssh.com",
        }
    }

    /// Returns the key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            CipherAlgorithm::Aes256Gcm => 32,
        }
    }

    /// Returns the IV size in bytes.
    pub fn iv_size(&self) -> usize {
        match self {
            CipherAlgorithm::Aes256Gcm => 12,
        }
    }

    /// Returns the authentication tag size in bytes.
    pub fn tag_size(&self) -> usize {
        match self {
            CipherAlgorithm::Aes256Gcm => 16,
        }
    }

    /// Parses cipher algorithm from name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aes256-gcm@openssh.com" => Some(CipherAlgorithm::Aes256Gcm),
            _ => None,
        }
    }
}

/// Nonce sequence for the OpenSSH AES-GCM variant.
///
/// 4-byte fixed field plus an 8-byte invocation counter, both seeded from
/// the derived IV; the counter increments once per packet.
struct GcmNonceSequence {
    fixed: [u8; 4],
    invocation: u64,
}

impl GcmNonceSequence {
    fn from_iv(iv: &[u8]) -> HalyardResult<Self> {
        if iv.len() < 12 {
            return Err(HalyardError::Security(format!(
                "Insufficient IV material: expected 12, got {}",
                iv.len()
            )));
        }

        let mut fixed = [0u8; 4];
        fixed.copy_from_slice(&iv[..4]);

        let mut invocation = [0u8; 8];
        invocation.copy_from_slice(&iv[4..12]);

        Ok(Self {
            fixed,
            invocation: u64::from_be_bytes(invocation),
        })
    }
}

impl NonceSequence for GcmNonceSequence {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        let mut nonce_bytes = [0u8; 12];
        nonce_bytes[..4].copy_from_slice(&self.fixed);
        nonce_bytes[4..].copy_from_slice(&self.invocation.to_be_bytes());
        self.invocation = self.invocation.wrapping_add(1);
        Nonce::try_assume_unique_for_key(&nonce_bytes)
    }
}

/// Outbound (sealing) half of transport protection.
pub struct EncryptionKey {
    algorithm: CipherAlgorithm,
    key: SealingKey<GcmNonceSequence>,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl EncryptionKey {
    /// Creates a new encryption key.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if the key or IV material is too
    /// short.
    pub fn new(key_material: &[u8], iv: &[u8]) -> HalyardResult<Self> {
        let algorithm = CipherAlgorithm::Aes256Gcm;
        if key_material.len() < algorithm.key_size() {
            return Err(HalyardError::Security(format!(
                "Insufficient key material: expected {}, got {}",
                algorithm.key_size(),
                key_material.len()
            )));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, &key_material[..32])
            .map_err(|_| HalyardError::Security("Failed to create AES-256-GCM key".to_string()))?;
        let nonces = GcmNonceSequence::from_iv(iv)?;

        Ok(Self {
            algorithm,
            key: SealingKey::new(unbound_key, nonces),
        })
    }

    /// Encrypts data in place, appending the authentication tag.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if sealing fails.
    pub fn encrypt(&mut self, data: &mut Vec<u8>) -> HalyardResult<()> {
        self.key
            .seal_in_place_append_tag(Aad::empty(), data)
            .map_err(|_| HalyardError::Security("Encryption failed".to_string()))
    }

    /// Returns the algorithm.
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }
}

/// Inbound (opening) half of transport protection.
pub struct DecryptionKey {
    algorithm: CipherAlgorithm,
    key: OpeningKey<GcmNonceSequence>,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl DecryptionKey {
    /// Creates a new decryption key.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if the key or IV material is too
    /// short.
    pub fn new(key_material: &[u8], iv: &[u8]) -> HalyardResult<Self> {
        let algorithm = CipherAlgorithm::Aes256Gcm;
        if key_material.len() < algorithm.key_size() {
            return Err(HalyardError::Security(format!(
                "Insufficient key material: expected {}, got {}",
                algorithm.key_size(),
                key_material.len()
            )));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, &key_material[..32])
            .map_err(|_| HalyardError::Security("Failed to create AES-256-GCM key".to_string()))?;
        let nonces = GcmNonceSequence::from_iv(iv)?;

        Ok(Self {
            algorithm,
            key: OpeningKey::new(unbound_key, nonces),
        })
    }

    /// Decrypts data in place, verifying and stripping the tag.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if decryption fails or the
    /// authentication tag does not match.
    pub fn decrypt(&mut self, data: &mut Vec<u8>) -> HalyardResult<()> {
        let plaintext_len = {
            let plaintext = self.key.open_in_place(Aad::empty(), data).map_err(|_| {
                HalyardError::Security(
                    "Decryption failed or authentication tag mismatch".to_string(),
                )
            })?;
            plaintext.len()
        };
        data.truncate(plaintext_len);
        Ok(())
    }

    /// Returns the algorithm.
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }
}

/// Paired transport protection for one peer.
///
/// Built from derived [`KeyMaterial`] once key exchange completes; the
/// direction mapping depends on the role (the client writes with the
/// client-to-server streams, the server with the server-to-client streams).
///
/// The two halves leave the pair separately: the I/O layer takes the inbound
/// half when NEWKEYS is received and the outbound half when NEWKEYS is sent.
#[derive(Debug)]
pub struct TransportProtector {
    outbound: EncryptionKey,
    inbound: DecryptionKey,
}

impl TransportProtector {
    /// Builds the protector for one role from derived key material.
    ///
    /// # Arguments
    ///
    /// * `is_client` - Whether this peer is the client
    /// * `keys` - The six derived directional streams
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if any stream is too short.
    pub fn for_role(is_client: bool, keys: &KeyMaterial) -> HalyardResult<Self> {
        let (outbound, inbound) = if is_client {
            (
                EncryptionKey::new(
                    &keys.encryption_key_client_to_server,
                    &keys.iv_client_to_server,
                )?,
                DecryptionKey::new(
                    &keys.encryption_key_server_to_client,
                    &keys.iv_server_to_client,
                )?,
            )
        } else {
            (
                EncryptionKey::new(
                    &keys.encryption_key_server_to_client,
                    &keys.iv_server_to_client,
                )?,
                DecryptionKey::new(
                    &keys.encryption_key_client_to_server,
                    &keys.iv_client_to_server,
                )?,
            )
        };

        Ok(Self { outbound, inbound })
    }

    /// Splits the protector into its outbound and inbound halves.
    pub fn into_halves(self) -> (EncryptionKey, DecryptionKey) {
        (self.outbound, self.inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> KeyMaterial {
        KeyMaterial::derive(&[0x42; 32], &[0x01; 32], &[0x01; 32])
    }

    #[test]
    fn test_cipher_algorithm_properties() {
        let aes = CipherAlgorithm::Aes256Gcm;
        assert_eq!(aes.name(), "aes256-gcm@openssh.com");
        assert_eq!(aes.key_size(), 32);
        assert_eq!(aes.iv_size(), 12);
        assert_eq!(aes.tag_size(), 16);
    }

    #[test]
    fn test_cipher_from_name() {
        assert!(matches!(
            CipherAlgorithm::from_name("aes256-gcm@openssh.com"),
            Some(CipherAlgorithm::Aes256Gcm)
        ));
        assert!(CipherAlgorithm::from_name("chacha20-poly1305@openssh.com").is_none());
    }

    #[test]
    fn test_encryption_key_insufficient_material() {
        let result = EncryptionKey::new(&[0u8; 16], &[0u8; 12]);
        assert!(matches!(result, Err(HalyardError::Security(_))));
    }

    #[test]
    fn test_encryption_key_insufficient_iv() {
        let result = EncryptionKey::new(&[0u8; 32], &[0u8; 4]);
        assert!(matches!(result, Err(HalyardError::Security(_))));
    }

    #[test]
    fn test_client_to_server_round_trip() {
        let keys = test_keys();
        let (mut client_out, _) = TransportProtector::for_role(true, &keys)
            .unwrap()
            .into_halves();
        let (_, mut server_in) = TransportProtector::for_role(false, &keys)
            .unwrap()
            .into_halves();

        let mut data = b"Hello, SSH!".to_vec();
        let original = data.clone();

        client_out.encrypt(&mut data).unwrap();
        assert_ne!(data, original);
        assert_eq!(data.len(), original.len() + 16);

        server_in.decrypt(&mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn test_server_to_client_round_trip() {
        let keys = test_keys();
        let (mut server_out, _) = TransportProtector::for_role(false, &keys)
            .unwrap()
            .into_halves();
        let (_, mut client_in) = TransportProtector::for_role(true, &keys)
            .unwrap()
            .into_halves();

        let mut data = b"auth granted".to_vec();
        let original = data.clone();

        server_out.encrypt(&mut data).unwrap();
        client_in.decrypt(&mut data).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn test_nonce_advances_per_packet() {
        let keys = test_keys();
        let (mut out, _) = TransportProtector::for_role(true, &keys)
            .unwrap()
            .into_halves();

        let mut first = b"same plaintext".to_vec();
        let mut second = b"same plaintext".to_vec();
        out.encrypt(&mut first).unwrap();
        out.encrypt(&mut second).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_out_of_sequence_decryption_fails() {
        let keys = test_keys();
        let (mut out, _) = TransportProtector::for_role(true, &keys)
            .unwrap()
            .into_halves();
        let (_, mut inbound) = TransportProtector::for_role(false, &keys)
            .unwrap()
            .into_halves();

        let mut skipped = b"packet one".to_vec();
        out.encrypt(&mut skipped).unwrap();

        let mut data = b"packet two".to_vec();
        out.encrypt(&mut data).unwrap();

        // The receiver's counter still expects packet one.
        assert!(inbound.decrypt(&mut data).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let keys = test_keys();
        let (mut out, _) = TransportProtector::for_role(true, &keys)
            .unwrap()
            .into_halves();
        let (_, mut inbound) = TransportProtector::for_role(false, &keys)
            .unwrap()
            .into_halves();

        let mut data = b"untampered".to_vec();
        out.encrypt(&mut data).unwrap();
        data[0] ^= 0x01;

        assert!(matches!(
            inbound.decrypt(&mut data),
            Err(HalyardError::Security(_))
        ));
    }
}
