//! SSH key exchange messages and algorithm negotiation (RFC 4253 Section 7).
//!
//! This module implements the wire messages of the key exchange phase:
//!
//! - SSH_MSG_KEXINIT (20)
//! - SSH_MSG_KEX_ECDH_INIT (30)
//! - SSH_MSG_KEX_ECDH_REPLY (31)
//! - SSH_MSG_NEWKEYS (21)
//!
//! plus the algorithm negotiation rules, including validation of the
//! "first KEX packet follows" guess optimization.
//!
//! # Key Exchange Flow
//!
//! 1. Both sides send SSH_MSG_KEXINIT
//! 2. Algorithm negotiation (client preference order wins)
//! 3. Curve25519 ECDH exchange (INIT/REPLY)
//! 4. Both sides send SSH_MSG_NEWKEYS
//! 5. Switch to encrypted communication
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::kex::{KexInit, NewKeys};
//!
//! let kexinit = KexInit::new_default();
//! assert!(kexinit.kex_algorithms().contains(&"curve25519-sha256".to_string()));
//!
//! let newkeys = NewKeys::new();
//! assert_eq!(newkeys.to_bytes(), vec![21]);
//! ```

use bytes::{BufMut, BytesMut};
use halyard_platform::{HalyardError, HalyardResult};
use rand::RngCore;

use crate::ssh::message::MessageType;

/// SSH_MSG_KEXINIT message (RFC 4253 Section 7.1).
///
/// This message is used to negotiate algorithms for the SSH connection.
/// Each algorithm list is ordered by preference (most preferred first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexInit {
    /// Random cookie (16 bytes)
    cookie: [u8; 16],
    /// Key exchange algorithms
    kex_algorithms: Vec<String>,
    /// Server host key algorithms
    server_host_key_algorithms: Vec<String>,
    /// Encryption algorithms client to server
    encryption_algorithms_client_to_server: Vec<String>,
    /// Encryption algorithms server to client
    encryption_algorithms_server_to_client: Vec<String>,
    /// MAC algorithms client to server
    mac_algorithms_client_to_server: Vec<String>,
    /// MAC algorithms server to client
    mac_algorithms_server_to_client: Vec<String>,
    /// Compression algorithms client to server
    compression_algorithms_client_to_server: Vec<String>,
    /// Compression algorithms server to client
    compression_algorithms_server_to_client: Vec<String>,
    /// Languages client to server (usually empty)
    languages_client_to_server: Vec<String>,
    /// Languages server to client (usually empty)
    languages_server_to_client: Vec<String>,
    /// First KEX packet follows
    first_kex_packet_follows: bool,
}

impl KexInit {
    /// Creates a new KEXINIT message advertising the Halyard algorithm set.
    ///
    /// - KEX: curve25519-sha256, curve25519-sha256@libssh.org
    /// - Host key: ssh-ed25519
    /// - Encryption: aes256-gcm@openssh.com
    /// - MAC: hmac-sha2-256
    /// - Compression: none
    ///
    /// # Example
    ///
    /// ```rust
    /// use halyard_proto::ssh::kex::KexInit;
    ///
    /// let kexinit = KexInit::new_default();
    /// assert_eq!(kexinit.cookie().len(), 16);
    /// assert!(!kexinit.first_kex_packet_follows());
    /// ```
    pub fn new_default() -> Self {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        Self {
            cookie,
            kex_algorithms: vec![
                "curve25519-sha256".to_string(),
                "curve25519-sha256@libssh.org".to_string(),
            ],
            server_host_key_algorithms: vec!["ssh-ed25519".to_string()],
            encryption_algorithms_client_to_server: vec!["aes256-gcm@openssh.com".to_string()],
            encryption_algorithms_server_to_client: vec!["aes256-gcm@openssh.com".to_string()],
            mac_algorithms_client_to_server: vec!["hmac-sha2-256".to_string()],
            mac_algorithms_server_to_client: vec!["hmac-sha2-256".to_string()],
            compression_algorithms_client_to_server: vec!["none".to_string()],
            compression_algorithms_server_to_client: vec!["none".to_string()],
            languages_client_to_server: vec![],
            languages_server_to_client: vec![],
            first_kex_packet_follows: false,
        }
    }

    /// Returns the cookie.
    pub fn cookie(&self) -> &[u8; 16] {
        &self.cookie
    }

    /// Returns the key exchange algorithms.
    pub fn kex_algorithms(&self) -> &[String] {
        &self.kex_algorithms
    }

    /// Returns the server host key algorithms.
    pub fn server_host_key_algorithms(&self) -> &[String] {
        &self.server_host_key_algorithms
    }

    /// Returns the encryption algorithms (client to server).
    pub fn encryption_algorithms_client_to_server(&self) -> &[String] {
        &self.encryption_algorithms_client_to_server
    }

    /// Returns the encryption algorithms (server to client).
    pub fn encryption_algorithms_server_to_client(&self) -> &[String] {
        &self.encryption_algorithms_server_to_client
    }

    /// Returns whether first KEX packet follows.
    pub fn first_kex_packet_follows(&self) -> bool {
        self.first_kex_packet_follows
    }

    /// Overrides the key exchange algorithm preference list.
    pub fn set_kex_algorithms(&mut self, algorithms: Vec<String>) {
        self.kex_algorithms = algorithms;
    }

    /// Sets the "first KEX packet follows" guess flag.
    pub fn set_first_kex_packet_follows(&mut self, follows: bool) {
        self.first_kex_packet_follows = follows;
    }

    /// Serializes the KEXINIT message to bytes (without packet framing).
    ///
    /// Format (RFC 4253 Section 7.1):
    /// ```text
    /// byte         SSH_MSG_KEXINIT (20)
    /// byte[16]     cookie (random bytes)
    /// name-list    kex_algorithms
    /// name-list    server_host_key_algorithms
    /// name-list    encryption_algorithms (both directions)
    /// name-list    mac_algorithms (both directions)
    /// name-list    compression_algorithms (both directions)
    /// name-list    languages (both directions)
    /// boolean      first_kex_packet_follows
    /// uint32       0 (reserved for future extension)
    /// ```
    ///
    /// The returned bytes are also the `I_C`/`I_S` input to the exchange hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(MessageType::KexInit as u8);
        buf.put_slice(&self.cookie);

        write_name_list(&mut buf, &self.kex_algorithms);
        write_name_list(&mut buf, &self.server_host_key_algorithms);
        write_name_list(&mut buf, &self.encryption_algorithms_client_to_server);
        write_name_list(&mut buf, &self.encryption_algorithms_server_to_client);
        write_name_list(&mut buf, &self.mac_algorithms_client_to_server);
        write_name_list(&mut buf, &self.mac_algorithms_server_to_client);
        write_name_list(&mut buf, &self.compression_algorithms_client_to_server);
        write_name_list(&mut buf, &self.compression_algorithms_server_to_client);
        write_name_list(&mut buf, &self.languages_client_to_server);
        write_name_list(&mut buf, &self.languages_server_to_client);

        buf.put_u8(u8::from(self.first_kex_packet_follows));
        buf.put_u32(0);

        buf.to_vec()
    }

    /// Parses a KEXINIT message from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if the message is empty, carries the
    /// wrong type byte, or is truncated.
    pub fn from_bytes(data: &[u8]) -> HalyardResult<Self> {
        if data.is_empty() {
            return Err(HalyardError::Protocol("KEXINIT message is empty".to_string()));
        }

        if data[0] != MessageType::KexInit as u8 {
            return Err(HalyardError::Protocol(format!(
                "Invalid message type: expected 20 (SSH_MSG_KEXINIT), got {}",
                data[0]
            )));
        }

        if data.len() < 17 {
            return Err(HalyardError::Protocol(format!(
                "KEXINIT message too short: {} bytes (minimum 17)",
                data.len()
            )));
        }

        let mut cookie = [0u8; 16];
        cookie.copy_from_slice(&data[1..17]);

        let mut offset = 17;

        let kex_algorithms = read_name_list(data, &mut offset)?;
        let server_host_key_algorithms = read_name_list(data, &mut offset)?;
        let encryption_algorithms_client_to_server = read_name_list(data, &mut offset)?;
        let encryption_algorithms_server_to_client = read_name_list(data, &mut offset)?;
        let mac_algorithms_client_to_server = read_name_list(data, &mut offset)?;
        let mac_algorithms_server_to_client = read_name_list(data, &mut offset)?;
        let compression_algorithms_client_to_server = read_name_list(data, &mut offset)?;
        let compression_algorithms_server_to_client = read_name_list(data, &mut offset)?;
        let languages_client_to_server = read_name_list(data, &mut offset)?;
        let languages_server_to_client = read_name_list(data, &mut offset)?;

        if offset >= data.len() {
            return Err(HalyardError::Protocol(
                "KEXINIT message truncated (missing first_kex_packet_follows)".to_string(),
            ));
        }
        let first_kex_packet_follows = data[offset] != 0;
        offset += 1;

        // uint32 reserved, ignored but must be present
        if offset + 4 > data.len() {
            return Err(HalyardError::Protocol(
                "KEXINIT message truncated (missing reserved field)".to_string(),
            ));
        }

        Ok(Self {
            cookie,
            kex_algorithms,
            server_host_key_algorithms,
            encryption_algorithms_client_to_server,
            encryption_algorithms_server_to_client,
            mac_algorithms_client_to_server,
            mac_algorithms_server_to_client,
            compression_algorithms_client_to_server,
            compression_algorithms_server_to_client,
            languages_client_to_server,
            languages_server_to_client,
            first_kex_packet_follows,
        })
    }
}

/// SSH_MSG_KEX_ECDH_INIT message (RFC 5656 Section 4).
///
/// Sent by the client to open the ECDH exchange; carries the client's
/// ephemeral Curve25519 public key (`Q_C`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdhInit {
    /// Client ephemeral public key
    ephemeral_public: Vec<u8>,
}

impl EcdhInit {
    /// Creates a new ECDH init message.
    pub fn new(ephemeral_public: Vec<u8>) -> Self {
        Self { ephemeral_public }
    }

    /// Returns the client's ephemeral public key.
    pub fn ephemeral_public(&self) -> &[u8] {
        &self.ephemeral_public
    }

    /// Serializes to bytes.
    ///
    /// Format:
    /// ```text
    /// byte      SSH_MSG_KEX_ECDH_INIT (30)
    /// string    Q_C (client ephemeral public key)
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(MessageType::KexEcdhInit as u8);
        write_bytes(&mut buf, &self.ephemeral_public);
        buf.to_vec()
    }

    /// Parses from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if the data is malformed.
    pub fn from_bytes(data: &[u8]) -> HalyardResult<Self> {
        if data.is_empty() {
            return Err(HalyardError::Protocol(
                "KEX_ECDH_INIT message is empty".to_string(),
            ));
        }

        if data[0] != MessageType::KexEcdhInit as u8 {
            return Err(HalyardError::Protocol(format!(
                "Invalid message type: expected 30 (SSH_MSG_KEX_ECDH_INIT), got {}",
                data[0]
            )));
        }

        let mut offset = 1;
        let ephemeral_public = read_bytes(data, &mut offset)?;

        Ok(Self { ephemeral_public })
    }
}

/// SSH_MSG_KEX_ECDH_REPLY message (RFC 5656 Section 4).
///
/// Sent by the server in response to the ECDH init; carries the server host
/// key blob (`K_S`), the server's ephemeral public key (`Q_S`), and the
/// signature over the exchange hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdhReply {
    /// Server host key blob (SSH wire format)
    host_key_blob: Vec<u8>,
    /// Server ephemeral public key
    ephemeral_public: Vec<u8>,
    /// Signature blob over the exchange hash (SSH wire format)
    signature_blob: Vec<u8>,
}

impl EcdhReply {
    /// Creates a new ECDH reply message.
    pub fn new(host_key_blob: Vec<u8>, ephemeral_public: Vec<u8>, signature_blob: Vec<u8>) -> Self {
        Self {
            host_key_blob,
            ephemeral_public,
            signature_blob,
        }
    }

    /// Returns the server host key blob.
    pub fn host_key_blob(&self) -> &[u8] {
        &self.host_key_blob
    }

    /// Returns the server's ephemeral public key.
    pub fn ephemeral_public(&self) -> &[u8] {
        &self.ephemeral_public
    }

    /// Returns the signature blob.
    pub fn signature_blob(&self) -> &[u8] {
        &self.signature_blob
    }

    /// Serializes to bytes.
    ///
    /// Format:
    /// ```text
    /// byte      SSH_MSG_KEX_ECDH_REPLY (31)
    /// string    K_S (server host key blob)
    /// string    Q_S (server ephemeral public key)
    /// string    signature over the exchange hash
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(MessageType::KexEcdhReply as u8);
        write_bytes(&mut buf, &self.host_key_blob);
        write_bytes(&mut buf, &self.ephemeral_public);
        write_bytes(&mut buf, &self.signature_blob);
        buf.to_vec()
    }

    /// Parses from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if the data is malformed.
    pub fn from_bytes(data: &[u8]) -> HalyardResult<Self> {
        if data.is_empty() {
            return Err(HalyardError::Protocol(
                "KEX_ECDH_REPLY message is empty".to_string(),
            ));
        }

        if data[0] != MessageType::KexEcdhReply as u8 {
            return Err(HalyardError::Protocol(format!(
                "Invalid message type: expected 31 (SSH_MSG_KEX_ECDH_REPLY), got {}",
                data[0]
            )));
        }

        let mut offset = 1;
        let host_key_blob = read_bytes(data, &mut offset)?;
        let ephemeral_public = read_bytes(data, &mut offset)?;
        let signature_blob = read_bytes(data, &mut offset)?;

        Ok(Self {
            host_key_blob,
            ephemeral_public,
            signature_blob,
        })
    }
}

/// SSH_MSG_NEWKEYS message (RFC 4253 Section 7.3).
///
/// Sent by both sides after key exchange completes. Signals that all
/// subsequent packets in that direction use the newly negotiated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NewKeys;

impl NewKeys {
    /// Creates a new SSH_MSG_NEWKEYS message.
    pub const fn new() -> Self {
        Self
    }

    /// Serializes the NEWKEYS message to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        vec![MessageType::NewKeys as u8]
    }

    /// Parses a NEWKEYS message from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if the message is empty or carries
    /// the wrong type byte.
    pub fn from_bytes(data: &[u8]) -> HalyardResult<Self> {
        if data.is_empty() {
            return Err(HalyardError::Protocol("NEWKEYS message is empty".to_string()));
        }

        if data[0] != MessageType::NewKeys as u8 {
            return Err(HalyardError::Protocol(format!(
                "Invalid message type: expected 21 (SSH_MSG_NEWKEYS), got {}",
                data[0]
            )));
        }

        Ok(Self)
    }
}

impl Default for NewKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of algorithm negotiation between two KEXINIT messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Chosen key exchange algorithm
    pub kex_algorithm: String,
    /// Chosen server host key algorithm
    pub host_key_algorithm: String,
}

/// Negotiates the key exchange and host key algorithms (RFC 4253 Section 7.1).
///
/// Rules:
/// 1. If both sides name the same first KEX algorithm, it is chosen directly
///    (this is also what validates a "first KEX packet follows" guess).
/// 2. Otherwise the client's KEX list is walked in order; the first algorithm
///    the server also supports wins, provided a common host key algorithm
///    exists at the same time.
///
/// # Errors
///
/// Returns [`HalyardError::Negotiation`] if no common KEX algorithm or no
/// common host key algorithm exists.
pub fn negotiate(client: &KexInit, server: &KexInit) -> HalyardResult<Negotiated> {
    let host_key_algorithm = negotiate_algorithm(
        client.server_host_key_algorithms(),
        server.server_host_key_algorithms(),
    )
    .map_err(|_| {
        HalyardError::Negotiation(format!(
            "No common host key algorithm: client={:?}, server={:?}",
            client.server_host_key_algorithms(),
            server.server_host_key_algorithms()
        ))
    })?;

    // Fast path: identical first preference on both sides.
    if let (Some(ours), Some(theirs)) = (
        client.kex_algorithms().first(),
        server.kex_algorithms().first(),
    ) {
        if ours == theirs {
            return Ok(Negotiated {
                kex_algorithm: ours.clone(),
                host_key_algorithm,
            });
        }
    }

    for algorithm in client.kex_algorithms() {
        if server.kex_algorithms().contains(algorithm) {
            return Ok(Negotiated {
                kex_algorithm: algorithm.clone(),
                host_key_algorithm,
            });
        }
    }

    Err(HalyardError::Negotiation(format!(
        "No common kex algorithm: client={:?}, server={:?}",
        client.kex_algorithms(),
        server.kex_algorithms()
    )))
}

/// Returns whether the peer announced a "first KEX packet follows" guess that
/// disagrees with negotiation.
///
/// A guess is wrong when either the peer's first KEX algorithm or its first
/// host key algorithm differs from ours; the guessed packet must then be
/// discarded (RFC 4253 Section 7).
pub fn expecting_incorrect_guess(ours: &KexInit, peer: &KexInit) -> bool {
    peer.first_kex_packet_follows()
        && (peer.kex_algorithms().first() != ours.kex_algorithms().first()
            || peer.server_host_key_algorithms().first()
                != ours.server_host_key_algorithms().first())
}

/// Negotiates a single algorithm list between client and server.
///
/// Uses the first algorithm from the client's list that also appears in the
/// server's list (RFC 4253 Section 7.1).
///
/// # Errors
///
/// Returns [`HalyardError::Negotiation`] if no common algorithm is found.
///
/// # Example
///
/// ```rust
/// use halyard_proto::ssh::kex::negotiate_algorithm;
///
/// let client = vec!["curve25519-sha256".to_string()];
/// let server = vec!["curve25519-sha256".to_string(), "ext-info-s".to_string()];
///
/// let result = negotiate_algorithm(&client, &server).unwrap();
/// assert_eq!(result, "curve25519-sha256");
/// ```
pub fn negotiate_algorithm(client_list: &[String], server_list: &[String]) -> HalyardResult<String> {
    for client_alg in client_list {
        if server_list.contains(client_alg) {
            return Ok(client_alg.clone());
        }
    }

    Err(HalyardError::Negotiation(format!(
        "No common algorithm: client={:?}, server={:?}",
        client_list, server_list
    )))
}

/// Writes a name-list to the buffer (RFC 4251 Section 5).
///
/// Format: uint32 length + comma-separated names
fn write_name_list(buf: &mut BytesMut, names: &[String]) {
    let list = names.join(",");
    let bytes = list.as_bytes();
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Reads a name-list from the buffer (RFC 4251 Section 5).
fn read_name_list(data: &[u8], offset: &mut usize) -> HalyardResult<Vec<String>> {
    let bytes = read_bytes(data, offset)?;
    let list_str = std::str::from_utf8(&bytes)
        .map_err(|_| HalyardError::Protocol("Name-list contains invalid UTF-8".to_string()))?;

    if list_str.is_empty() {
        Ok(vec![])
    } else {
        Ok(list_str.split(',').map(String::from).collect())
    }
}

fn write_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn read_bytes(data: &[u8], offset: &mut usize) -> HalyardResult<Vec<u8>> {
    if *offset + 4 > data.len() {
        return Err(HalyardError::Protocol(format!(
            "Cannot read length at offset {}",
            offset
        )));
    }

    let length = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]) as usize;
    *offset += 4;

    if *offset + length > data.len() {
        return Err(HalyardError::Protocol(format!(
            "Data truncated: expected {} bytes at offset {}",
            length, offset
        )));
    }

    let bytes = data[*offset..*offset + length].to_vec();
    *offset += length;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kexinit_new_default() {
        let kexinit = KexInit::new_default();
        assert_eq!(kexinit.cookie().len(), 16);
        assert_eq!(
            kexinit.kex_algorithms(),
            &[
                "curve25519-sha256".to_string(),
                "curve25519-sha256@libssh.org".to_string()
            ]
        );
        assert_eq!(
            kexinit.server_host_key_algorithms(),
            &["ssh-ed25519".to_string()]
        );
        assert_eq!(
            kexinit.encryption_algorithms_client_to_server(),
            &["aes256-gcm@openssh.com".to_string()]
        );
        assert!(!kexinit.first_kex_packet_follows());
    }

    #[test]
    fn test_kexinit_round_trip() {
        let mut original = KexInit::new_default();
        original.set_first_kex_packet_follows(true);
        let bytes = original.to_bytes();

        assert_eq!(bytes[0], 20);
        let parsed = KexInit::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_kexinit_parse_invalid_type() {
        let mut data = vec![99];
        data.extend_from_slice(&[0u8; 20]);

        match KexInit::from_bytes(&data) {
            Err(HalyardError::Protocol(msg)) => {
                assert!(msg.contains("Invalid message type"));
            }
            _ => panic!("Expected Protocol error"),
        }
    }

    #[test]
    fn test_kexinit_parse_too_short() {
        let data = vec![20, 1, 2, 3];
        assert!(KexInit::from_bytes(&data).is_err());
    }

    #[test]
    fn test_ecdh_init_round_trip() {
        let original = EcdhInit::new(vec![0x11; 32]);
        let bytes = original.to_bytes();
        assert_eq!(bytes[0], 30);

        let parsed = EcdhInit::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.ephemeral_public(), original.ephemeral_public());
    }

    #[test]
    fn test_ecdh_init_truncated() {
        let data = vec![30, 0, 0, 0, 32, 1, 2, 3];
        assert!(EcdhInit::from_bytes(&data).is_err());
    }

    #[test]
    fn test_ecdh_reply_round_trip() {
        let original = EcdhReply::new(vec![1, 2, 3], vec![0x22; 32], vec![4, 5, 6, 7]);
        let bytes = original.to_bytes();
        assert_eq!(bytes[0], 31);

        let parsed = EcdhReply::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_newkeys_round_trip() {
        let newkeys = NewKeys::new();
        let bytes = newkeys.to_bytes();
        assert_eq!(bytes, vec![21]);
        assert_eq!(NewKeys::from_bytes(&bytes).unwrap(), newkeys);
    }

    #[test]
    fn test_newkeys_invalid_type() {
        match NewKeys::from_bytes(&[20]) {
            Err(HalyardError::Protocol(msg)) => {
                assert!(msg.contains("Invalid message type"));
            }
            _ => panic!("Expected Protocol error"),
        }
    }

    #[test]
    fn test_negotiate_fast_path() {
        let client = KexInit::new_default();
        let server = KexInit::new_default();

        let negotiated = negotiate(&client, &server).unwrap();
        assert_eq!(negotiated.kex_algorithm, "curve25519-sha256");
        assert_eq!(negotiated.host_key_algorithm, "ssh-ed25519");
    }

    #[test]
    fn test_negotiate_client_preference() {
        let mut client = KexInit::new_default();
        client.set_kex_algorithms(vec![
            "sntrup761x25519-sha512@openssh.com".to_string(),
            "curve25519-sha256".to_string(),
        ]);
        let server = KexInit::new_default();

        let negotiated = negotiate(&client, &server).unwrap();
        assert_eq!(negotiated.kex_algorithm, "curve25519-sha256");
    }

    #[test]
    fn test_negotiate_no_common_kex() {
        let mut client = KexInit::new_default();
        client.set_kex_algorithms(vec!["diffie-hellman-group14-sha256".to_string()]);
        let server = KexInit::new_default();

        match negotiate(&client, &server) {
            Err(HalyardError::Negotiation(msg)) => {
                assert!(msg.contains("No common kex algorithm"));
            }
            _ => panic!("Expected Negotiation error"),
        }
    }

    #[test]
    fn test_expecting_incorrect_guess() {
        let ours = KexInit::new_default();

        // Guess flag set with a different first algorithm: wrong guess.
        let mut peer = KexInit::new_default();
        peer.set_kex_algorithms(vec![
            "curve25519-sha256@libssh.org".to_string(),
            "curve25519-sha256".to_string(),
        ]);
        peer.set_first_kex_packet_follows(true);
        assert!(expecting_incorrect_guess(&ours, &peer));

        // Matching first algorithms: guess stands.
        let mut matching = KexInit::new_default();
        matching.set_first_kex_packet_follows(true);
        assert!(!expecting_incorrect_guess(&ours, &matching));

        // No flag at all: nothing to discard.
        let mut no_flag = KexInit::new_default();
        no_flag.set_kex_algorithms(vec!["curve25519-sha256@libssh.org".to_string()]);
        assert!(!expecting_incorrect_guess(&ours, &no_flag));
    }

    #[test]
    fn test_negotiate_algorithm_success() {
        let client = vec!["aes256-gcm@openssh.com".to_string(), "aes256-ctr".to_string()];
        let server = vec!["aes256-ctr".to_string(), "aes256-gcm@openssh.com".to_string()];

        let result = negotiate_algorithm(&client, &server).unwrap();
        assert_eq!(result, "aes256-gcm@openssh.com");
    }

    #[test]
    fn test_negotiate_algorithm_no_match() {
        let client = vec!["aes256-ctr".to_string()];
        let server = vec!["aes128-ctr".to_string()];

        assert!(matches!(
            negotiate_algorithm(&client, &server),
            Err(HalyardError::Negotiation(_))
        ));
    }

    #[test]
    fn test_name_list_round_trip() {
        let names = vec!["first".to_string(), "second".to_string()];
        let mut buf = BytesMut::new();
        write_name_list(&mut buf, &names);

        let mut offset = 0;
        let parsed = read_name_list(&buf, &mut offset).unwrap();
        assert_eq!(parsed, names);
    }

    #[test]
    fn test_name_list_empty() {
        let names: Vec<String> = vec![];
        let mut buf = BytesMut::new();
        write_name_list(&mut buf, &names);

        let mut offset = 0;
        let parsed = read_name_list(&buf, &mut offset).unwrap();
        assert_eq!(parsed, names);
    }
}
