//! Curve25519 key exchange primitives (RFC 8731, RFC 4253 Section 7.2).
//!
//! This module implements the cryptographic leaves of the key exchange:
//!
//! - ephemeral Curve25519 agreement ([`Curve25519Exchanger`])
//! - the canonical exchange-hash accumulator ([`ExchangeBuffer`])
//! - RFC 4253 Section 7.2 key derivation ([`derive_key`], [`KeyMaterial`])
//!
//! # Security
//!
//! - Curve25519: modern elliptic curve, constant-time operations
//! - The ephemeral private key is consumed by the agreement and never exposed
//! - Derived key material is zeroized on drop
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::ecdh::Curve25519Exchanger;
//!
//! let client = Curve25519Exchanger::new().unwrap();
//! let server = Curve25519Exchanger::new().unwrap();
//!
//! let client_public = *client.public_key();
//! let server_public = *server.public_key();
//!
//! let client_secret = client.agree(&server_public).unwrap();
//! let server_secret = server.agree(&client_public).unwrap();
//! assert_eq!(client_secret, server_secret);
//! ```

use halyard_platform::{HalyardError, HalyardResult};
use ring::agreement::{agree_ephemeral, EphemeralPrivateKey, UnparsedPublicKey, X25519};
use ring::rand::SystemRandom;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Ephemeral Curve25519 key agreement.
///
/// Implements the ECDH half of curve25519-sha256 and
/// curve25519-sha256@libssh.org (RFC 8731). The private key lives only as
/// long as this value and is consumed by [`Curve25519Exchanger::agree`].
pub struct Curve25519Exchanger {
    /// Private key
    private_key: EphemeralPrivateKey,
    /// Public key (32 bytes)
    public_key: [u8; 32],
}

impl Curve25519Exchanger {
    /// Generates a fresh ephemeral key pair.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if the system RNG fails.
    pub fn new() -> HalyardResult<Self> {
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&X25519, &rng)
            .map_err(|_| HalyardError::Security("Failed to generate Curve25519 key".to_string()))?;

        let public_key = private_key.compute_public_key().map_err(|_| {
            HalyardError::Security("Failed to compute Curve25519 public key".to_string())
        })?;

        let mut public_key_bytes = [0u8; 32];
        public_key_bytes.copy_from_slice(public_key.as_ref());

        Ok(Self {
            private_key,
            public_key: public_key_bytes,
        })
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Computes the shared secret `K`, consuming the private key.
    ///
    /// # Arguments
    ///
    /// * `peer_public` - Peer's ephemeral public key (32 bytes)
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if key agreement fails.
    pub fn agree(self, peer_public: &[u8; 32]) -> HalyardResult<Vec<u8>> {
        let peer_public_key = UnparsedPublicKey::new(&X25519, peer_public);

        agree_ephemeral(self.private_key, &peer_public_key, |key_material| {
            key_material.to_vec()
        })
        .map_err(|_| HalyardError::Security("Curve25519 key agreement failed".to_string()))
    }
}

impl std::fmt::Debug for Curve25519Exchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Curve25519Exchanger")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

/// Accumulator for the exchange hash input (RFC 4253 Section 8).
///
/// The exchange hash is computed as:
///
/// ```text
/// H = SHA-256(V_C || V_S || I_C || I_S || K_S || Q_C || Q_S || K)
/// ```
///
/// where every field is appended as a length-prefixed SSH string and `K` as
/// an SSH mpint. Fields MUST be appended in exactly that order, client
/// version first regardless of which side owns the buffer, or the resulting
/// hash (and therefore the session id and every derived key) silently
/// disagrees with the peer's.
#[derive(Clone)]
pub struct ExchangeBuffer {
    bytes: Vec<u8>,
}

impl ExchangeBuffer {
    /// Creates a buffer seeded with the two protocol version strings.
    ///
    /// # Arguments
    ///
    /// * `client_version` - the client's identification string, no CR LF
    /// * `server_version` - the server's identification string, no CR LF
    pub fn new(client_version: &str, server_version: &str) -> Self {
        let mut buffer = Self { bytes: Vec::new() };
        buffer.push_string(client_version.trim_end_matches("\r\n").as_bytes());
        buffer.push_string(server_version.trim_end_matches("\r\n").as_bytes());
        buffer
    }

    /// Appends a length-prefixed SSH string.
    pub fn push_string(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.bytes.extend_from_slice(data);
    }

    /// Appends an SSH mpint (leading zeros stripped, 0x00 padding when the
    /// high bit is set).
    pub fn push_mpint(&mut self, data: &[u8]) {
        let encoded = encode_mpint(data);
        self.bytes.extend_from_slice(&encoded);
    }

    /// Computes SHA-256 over the accumulated bytes.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for ExchangeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeBuffer")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ExchangeBuffer {
    fn drop(&mut self) {
        // The buffer tail contains the shared secret once ECDH completes.
        self.bytes.zeroize();
    }
}

/// AES-256-GCM key size in bytes.
pub const ENCRYPTION_KEY_SIZE: usize = 32;
/// AES-256-GCM IV size in bytes.
pub const IV_SIZE: usize = 12;
/// hmac-sha2-256 integrity key size in bytes.
pub const INTEGRITY_KEY_SIZE: usize = 32;

/// The six directional key streams of RFC 4253 Section 7.2.
///
/// Derived as `SHA-256(K || H || letter || session_id)` for letters 'A'
/// through 'F'. With an AEAD cipher the integrity keys are never installed,
/// but they are part of the derivation contract and both peers must agree on
/// all six.
pub struct KeyMaterial {
    /// Initial IV client to server ('A')
    pub iv_client_to_server: Vec<u8>,
    /// Initial IV server to client ('B')
    pub iv_server_to_client: Vec<u8>,
    /// Encryption key client to server ('C')
    pub encryption_key_client_to_server: Vec<u8>,
    /// Encryption key server to client ('D')
    pub encryption_key_server_to_client: Vec<u8>,
    /// Integrity key client to server ('E')
    pub integrity_key_client_to_server: Vec<u8>,
    /// Integrity key server to client ('F')
    pub integrity_key_server_to_client: Vec<u8>,
}

impl KeyMaterial {
    /// Derives all six directional streams.
    ///
    /// # Arguments
    ///
    /// * `shared_secret` - Shared secret K from key exchange
    /// * `exchange_hash` - Exchange hash H
    /// * `session_id` - Session identifier (H from the first key exchange)
    pub fn derive(shared_secret: &[u8], exchange_hash: &[u8], session_id: &[u8]) -> Self {
        let derive = |letter: u8, len: usize| {
            derive_key(shared_secret, exchange_hash, session_id, letter, len)
        };

        Self {
            iv_client_to_server: derive(b'A', IV_SIZE),
            iv_server_to_client: derive(b'B', IV_SIZE),
            encryption_key_client_to_server: derive(b'C', ENCRYPTION_KEY_SIZE),
            encryption_key_server_to_client: derive(b'D', ENCRYPTION_KEY_SIZE),
            integrity_key_client_to_server: derive(b'E', INTEGRITY_KEY_SIZE),
            integrity_key_server_to_client: derive(b'F', INTEGRITY_KEY_SIZE),
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("keys", &"<redacted>")
            .finish()
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.iv_client_to_server.zeroize();
        self.iv_server_to_client.zeroize();
        self.encryption_key_client_to_server.zeroize();
        self.encryption_key_server_to_client.zeroize();
        self.integrity_key_client_to_server.zeroize();
        self.integrity_key_server_to_client.zeroize();
    }
}

/// Derives one SSH session key from the shared secret (RFC 4253 Section 7.2).
///
/// ```text
/// K1 = HASH(K || H || letter || session_id)
/// Kn = HASH(K || H || K1 || ... || K(n-1))
/// key = K1 || K2 || ... truncated to key_length
/// ```
///
/// Where K is encoded as an SSH mpint.
///
/// # Arguments
///
/// * `shared_secret` - Shared secret K from key exchange
/// * `exchange_hash` - Exchange hash H
/// * `session_id` - Session identifier (H from first KEX)
/// * `letter` - Key type identifier ('A' through 'F')
/// * `key_length` - Desired key length in bytes
///
/// # Example
///
/// ```rust
/// use halyard_proto::ssh::ecdh::derive_key;
///
/// let key = derive_key(&[0x42; 32], &[0x01; 32], &[0x02; 32], b'C', 32);
/// assert_eq!(key.len(), 32);
/// ```
pub fn derive_key(
    shared_secret: &[u8],
    exchange_hash: &[u8],
    session_id: &[u8],
    letter: u8,
    key_length: usize,
) -> Vec<u8> {
    let mut key = Vec::new();
    let mut hasher = Sha256::new();

    let k_mpint = encode_mpint(shared_secret);

    // First block: HASH(K || H || letter || session_id)
    hasher.update(&k_mpint);
    hasher.update(exchange_hash);
    hasher.update([letter]);
    hasher.update(session_id);
    let block = hasher.finalize_reset();
    key.extend_from_slice(&block);

    // Extend with HASH(K || H || previous blocks) until long enough.
    while key.len() < key_length {
        hasher.update(&k_mpint);
        hasher.update(exchange_hash);
        hasher.update(&key);
        let block = hasher.finalize_reset();
        key.extend_from_slice(&block);
    }

    key.truncate(key_length);
    key
}

/// Encodes a big integer as SSH mpint format (RFC 4251 Section 5).
///
/// Format: uint32 length + bytes, 0x00-prefixed when the high bit is set.
pub(crate) fn encode_mpint(data: &[u8]) -> Vec<u8> {
    let trimmed = data
        .iter()
        .skip_while(|&&b| b == 0)
        .copied()
        .collect::<Vec<_>>();

    if trimmed.is_empty() {
        return vec![0, 0, 0, 0];
    }

    let needs_padding = trimmed[0] & 0x80 != 0;
    let length = if needs_padding {
        trimmed.len() + 1
    } else {
        trimmed.len()
    };

    let mut result = Vec::with_capacity(4 + length);
    result.extend_from_slice(&(length as u32).to_be_bytes());

    if needs_padding {
        result.push(0);
    }
    result.extend_from_slice(&trimmed);

    result
}
