//! SSH user authentication messages (RFC 4252).
//!
//! This module implements the wire messages of the authentication protocol
//! and the small value types the authentication state machines exchange with
//! their delegates:
//!
//! - SSH_MSG_USERAUTH_REQUEST (50) / FAILURE (51) / SUCCESS (52)
//! - [`AuthMethod`] - the credential carried by a request ("none" or
//!   "password"; this library does not implement public-key or host-based
//!   credentials)
//! - [`AvailableMethods`] - the set of methods a server is willing to accept,
//!   with conversions to and from the wire's comma-separated name-list
//!
//! # Security
//!
//! - Passwords are zeroized on drop
//! - [`constant_time_compare`] is provided for server delegates so password
//!   checks do not leak timing
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::auth::{AuthMethod, AuthRequest};
//!
//! let auth = AuthRequest::new(
//!     "alice",
//!     "ssh-connection",
//!     AuthMethod::Password("secret".to_string()),
//! );
//! assert_eq!(auth.method().name(), "password");
//! ```

use bytes::{BufMut, BytesMut};
use halyard_platform::{HalyardError, HalyardResult};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::ssh::message::MessageType;

/// Method-name token for password authentication.
pub const METHOD_PASSWORD: &str = "password";
/// Method-name token for public key authentication.
pub const METHOD_PUBLIC_KEY: &str = "publickey";
/// Method-name token for host-based authentication.
pub const METHOD_HOST_BASED: &str = "hostbased";

/// Set of authentication methods a server will accept.
///
/// Backed by a small bitset; the wire form is the ordered name-list
/// `[password, publickey, hostbased]` filtered to present members. Unknown
/// tokens in an inbound list are ignored rather than rejected, since peers
/// may advertise methods this library does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AvailableMethods {
    bits: u8,
}

impl AvailableMethods {
    /// The password method.
    pub const PASSWORD: Self = Self { bits: 0b001 };
    /// The public key method.
    pub const PUBLIC_KEY: Self = Self { bits: 0b010 };
    /// The host-based method.
    pub const HOST_BASED: Self = Self { bits: 0b100 };
    /// All three methods.
    pub const ALL: Self = Self { bits: 0b111 };

    /// Returns the empty set.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Returns whether every method in `other` is present in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Adds the methods in `other` to the set.
    pub fn insert(&mut self, other: Self) {
        self.bits |= other.bits;
    }

    /// Returns the union of both sets.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Returns whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Converts to the wire name-list, in the canonical order
    /// `password, publickey, hostbased`.
    pub fn to_name_list(self) -> Vec<String> {
        let mut names = Vec::new();
        if self.contains(Self::PASSWORD) {
            names.push(METHOD_PASSWORD.to_string());
        }
        if self.contains(Self::PUBLIC_KEY) {
            names.push(METHOD_PUBLIC_KEY.to_string());
        }
        if self.contains(Self::HOST_BASED) {
            names.push(METHOD_HOST_BASED.to_string());
        }
        names
    }

    /// Builds a set from a wire name-list. Unknown tokens are ignored.
    pub fn from_name_list<S: AsRef<str>>(names: &[S]) -> Self {
        let mut methods = Self::empty();
        for name in names {
            match name.as_ref() {
                METHOD_PASSWORD => methods.insert(Self::PASSWORD),
                METHOD_PUBLIC_KEY => methods.insert(Self::PUBLIC_KEY),
                METHOD_HOST_BASED => methods.insert(Self::HOST_BASED),
                _ => {}
            }
        }
        methods
    }
}

impl std::fmt::Display for AvailableMethods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_name_list().join(","))
    }
}

/// SSH authentication method.
///
/// Only "none" and "password" are implemented; the `publickey` and
/// `hostbased` tokens exist solely inside [`AvailableMethods`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// No credential; probes which methods the server accepts.
    None,
    /// Password authentication.
    Password(String),
}

impl AuthMethod {
    /// Returns the method name.
    pub fn name(&self) -> &str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Password(_) => METHOD_PASSWORD,
        }
    }
}

impl Drop for AuthMethod {
    fn drop(&mut self) {
        if let AuthMethod::Password(ref mut password) = self {
            password.zeroize();
        }
    }
}

/// SSH_MSG_USERAUTH_REQUEST message (RFC 4252 Section 5).
///
/// Sent by the client to request authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// User name
    username: String,
    /// Service name (usually "ssh-connection")
    service_name: String,
    /// Authentication method
    method: AuthMethod,
}

impl AuthRequest {
    /// Creates a new authentication request.
    ///
    /// # Arguments
    ///
    /// * `username` - User name to authenticate as
    /// * `service_name` - Service to start after authentication
    /// * `method` - Authentication method
    pub fn new(username: &str, service_name: &str, method: AuthMethod) -> Self {
        Self {
            username: username.to_string(),
            service_name: service_name.to_string(),
            method,
        }
    }

    /// Returns the user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the authentication method.
    pub fn method(&self) -> &AuthMethod {
        &self.method
    }

    /// Serializes the authentication request to bytes.
    ///
    /// Format (RFC 4252 Section 5):
    /// ```text
    /// byte      SSH_MSG_USERAUTH_REQUEST (50)
    /// string    user name
    /// string    service name
    /// string    method name
    /// ....      method specific fields
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(MessageType::UserauthRequest as u8);
        write_string(&mut buf, &self.username);
        write_string(&mut buf, &self.service_name);
        write_string(&mut buf, self.method.name());

        match &self.method {
            AuthMethod::None => {}
            AuthMethod::Password(password) => {
                // boolean FALSE (not changing password)
                buf.put_u8(0);
                write_string(&mut buf, password);
            }
        }

        buf.to_vec()
    }

    /// Parses an authentication request from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if the data is malformed or names
    /// a method this library does not implement.
    pub fn from_bytes(data: &[u8]) -> HalyardResult<Self> {
        if data.is_empty() {
            return Err(HalyardError::Protocol(
                "USERAUTH_REQUEST message is empty".to_string(),
            ));
        }

        if data[0] != MessageType::UserauthRequest as u8 {
            return Err(HalyardError::Protocol(format!(
                "Invalid message type: expected 50 (SSH_MSG_USERAUTH_REQUEST), got {}",
                data[0]
            )));
        }

        let mut offset = 1;
        let username = read_string(data, &mut offset)?;
        let service_name = read_string(data, &mut offset)?;
        let method_name = read_string(data, &mut offset)?;

        let method = match method_name.as_str() {
            "none" => AuthMethod::None,
            METHOD_PASSWORD => {
                if offset >= data.len() {
                    return Err(HalyardError::Protocol(
                        "USERAUTH_REQUEST truncated (missing password change flag)".to_string(),
                    ));
                }
                let _changing = data[offset] != 0;
                offset += 1;

                let password = read_string(data, &mut offset)?;
                AuthMethod::Password(password)
            }
            _ => {
                return Err(HalyardError::Protocol(format!(
                    "Unsupported authentication method: '{}'",
                    method_name
                )))
            }
        };

        Ok(Self {
            username,
            service_name,
            method,
        })
    }
}

/// SSH_MSG_USERAUTH_FAILURE message (RFC 4252 Section 5.1).
///
/// Sent by the server when authentication fails or only partially succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    /// Authentications that can continue
    methods_can_continue: Vec<String>,
    /// Partial success flag
    partial_success: bool,
}

impl AuthFailure {
    /// Creates a new authentication failure message.
    ///
    /// # Arguments
    ///
    /// * `methods` - Methods that can continue
    /// * `partial_success` - Whether the rejected request was itself valid
    pub fn new(methods: Vec<String>, partial_success: bool) -> Self {
        Self {
            methods_can_continue: methods,
            partial_success,
        }
    }

    /// Creates a failure message from a method set.
    pub fn from_methods(methods: AvailableMethods, partial_success: bool) -> Self {
        Self::new(methods.to_name_list(), partial_success)
    }

    /// Returns the methods that can continue.
    pub fn methods_can_continue(&self) -> &[String] {
        &self.methods_can_continue
    }

    /// Returns the advertised methods as a set, ignoring unknown tokens.
    pub fn available_methods(&self) -> AvailableMethods {
        AvailableMethods::from_name_list(&self.methods_can_continue)
    }

    /// Returns whether partial success was achieved.
    pub fn partial_success(&self) -> bool {
        self.partial_success
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        buf.put_u8(MessageType::UserauthFailure as u8);
        write_string(&mut buf, &self.methods_can_continue.join(","));
        buf.put_u8(u8::from(self.partial_success));

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
                "USERAUTH_FAILURE message is empty".to_string(),
            ));
        }

        if data[0] != MessageType::UserauthFailure as u8 {
            return Err(HalyardError::Protocol(format!(
                "Invalid message type: expected 51 (SSH_MSG_USERAUTH_FAILURE), got {}",
                data[0]
            )));
        }

        let mut offset = 1;
        let methods_str = read_string(data, &mut offset)?;
        let methods_can_continue: Vec<String> = if methods_str.is_empty() {
            vec![]
        } else {
            methods_str.split(',').map(String::from).collect()
        };

        if offset >= data.len() {
            return Err(HalyardError::Protocol(
                "USERAUTH_FAILURE truncated (missing partial success flag)".to_string(),
            ));
        }
        let partial_success = data[offset] != 0;

        Ok(Self {
            methods_can_continue,
            partial_success,
        })
    }
}

/// SSH_MSG_USERAUTH_SUCCESS message (RFC 4252 Section 5.1).
///
/// Sent by the server when authentication succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSuccess;

impl AuthSuccess {
    /// Creates a new authentication success message.
    pub fn new() -> Self {
        Self
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        vec![MessageType::UserauthSuccess as u8]
    }

    /// Parses from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if the data is malformed.
    pub fn from_bytes(data: &[u8]) -> HalyardResult<Self> {
        if data.is_empty() || data[0] != MessageType::UserauthSuccess as u8 {
            return Err(HalyardError::Protocol(
                "Invalid USERAUTH_SUCCESS message".to_string(),
            ));
        }
        Ok(Self)
    }
}

impl Default for AuthSuccess {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares two passwords in constant time to prevent timing attacks.
///
/// Both inputs are hashed first so the comparison is constant-time even when
/// the lengths differ.
///
/// # Example
///
/// ```rust
/// use halyard_proto::ssh::auth::constant_time_compare;
///
/// assert!(constant_time_compare("secret", "secret"));
/// assert!(!constant_time_compare("secret", "wrong"));
/// ```
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let hash_a = Sha256::digest(a.as_bytes());
    let hash_b = Sha256::digest(b.as_bytes());

    hash_a.ct_eq(&hash_b).into()
}

// Helper functions for string encoding/decoding

fn write_string(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn read_string(data: &[u8], offset: &mut usize) -> HalyardResult<String> {
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

    String::from_utf8(bytes)
        .map_err(|_| HalyardError::Protocol("String contains invalid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_methods_bitset() {
        let mut methods = AvailableMethods::empty();
        assert!(methods.is_empty());

        methods.insert(AvailableMethods::PASSWORD);
        assert!(methods.contains(AvailableMethods::PASSWORD));
        assert!(!methods.contains(AvailableMethods::PUBLIC_KEY));

        let all = methods
            .union(AvailableMethods::PUBLIC_KEY)
            .union(AvailableMethods::HOST_BASED);
        assert_eq!(all, AvailableMethods::ALL);
    }

    #[test]
    fn test_available_methods_name_list_order() {
        let mut methods = AvailableMethods::empty();
        methods.insert(AvailableMethods::HOST_BASED);
        methods.insert(AvailableMethods::PASSWORD);

        // Canonical wire order regardless of insertion order.
        assert_eq!(methods.to_name_list(), vec!["password", "hostbased"]);
        assert_eq!(
            AvailableMethods::ALL.to_name_list(),
            vec!["password", "publickey", "hostbased"]
        );
    }

    #[test]
    fn test_available_methods_from_name_list_ignores_unknown() {
        let names = vec![
            "password".to_string(),
            "keyboard-interactive".to_string(),
            "hostbased".to_string(),
        ];
        let methods = AvailableMethods::from_name_list(&names);
        assert!(methods.contains(AvailableMethods::PASSWORD));
        assert!(methods.contains(AvailableMethods::HOST_BASED));
        assert!(!methods.contains(AvailableMethods::PUBLIC_KEY));
    }

    #[test]
    fn test_available_methods_display() {
        assert_eq!(AvailableMethods::ALL.to_string(), "password,publickey,hostbased");
        assert_eq!(AvailableMethods::empty().to_string(), "");
    }

    #[test]
    fn test_auth_request_password_round_trip() {
        let auth = AuthRequest::new(
            "alice",
            "ssh-connection",
            AuthMethod::Password("secret".to_string()),
        );

        assert_eq!(auth.username(), "alice");
        assert_eq!(auth.service_name(), "ssh-connection");
        assert_eq!(auth.method().name(), "password");

        let bytes = auth.to_bytes();
        let parsed = AuthRequest::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, auth);
    }

    #[test]
    fn test_auth_request_none_round_trip() {
        let auth = AuthRequest::new("test", "ssh-connection", AuthMethod::None);
        let parsed = AuthRequest::from_bytes(&auth.to_bytes()).unwrap();
        assert_eq!(parsed.method(), &AuthMethod::None);
    }

    #[test]
    fn test_auth_request_unsupported_method() {
        let mut buf = BytesMut::new();
        buf.put_u8(50);
        write_string(&mut buf, "alice");
        write_string(&mut buf, "ssh-connection");
        write_string(&mut buf, "publickey");

        match AuthRequest::from_bytes(&buf) {
            Err(HalyardError::Protocol(msg)) => {
                assert!(msg.contains("Unsupported authentication method"));
            }
            _ => panic!("Expected Protocol error"),
        }
    }

    #[test]
    fn test_auth_failure_round_trip() {
        let failure = AuthFailure::from_methods(AvailableMethods::PASSWORD, false);
        assert_eq!(failure.methods_can_continue(), &["password".to_string()]);
        assert!(!failure.partial_success());

        let parsed = AuthFailure::from_bytes(&failure.to_bytes()).unwrap();
        assert_eq!(parsed, failure);
    }

    #[test]
    fn test_auth_failure_unknown_tokens_survive_round_trip() {
        let failure = AuthFailure::new(
            vec!["password".to_string(), "gssapi-with-mic".to_string()],
            true,
        );
        let parsed = AuthFailure::from_bytes(&failure.to_bytes()).unwrap();

        // Unknown tokens stay in the message but not in the set.
        assert_eq!(parsed.methods_can_continue().len(), 2);
        assert_eq!(parsed.available_methods(), AvailableMethods::PASSWORD);
        assert!(parsed.partial_success());
    }

    #[test]
    fn test_auth_success_round_trip() {
        let success = AuthSuccess::new();
        let parsed = AuthSuccess::from_bytes(&success.to_bytes()).unwrap();
        assert_eq!(parsed, success);
    }

    #[test]
    fn test_auth_success_invalid() {
        assert!(AuthSuccess::from_bytes(&[51]).is_err());
        assert!(AuthSuccess::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("password123", "password123"));
        assert!(!constant_time_compare("password123", "password124"));
        assert!(!constant_time_compare("short", "verylongpassword"));
    }

    #[test]
    fn test_auth_method_zeroize() {
        let method = AuthMethod::Password("secret".to_string());
        drop(method);
        // Password is zeroized on drop (can't observe directly, but must not panic).
    }
}
