//! SSH transport core (RFC 4251-4253 subset).
//!
//! This module implements the early lifecycle of an SSH connection: the key
//! exchange that derives session keys and installs transport protection, and
//! the user authentication exchange that authorizes a user.
//!
//! # Architecture
//!
//! 1. **Wire messages** ([`kex`], [`auth`], [`message`], [`version`]) - typed
//!    codecs for every message the core exchanges
//! 2. **Cryptographic leaves** ([`ecdh`], [`crypto`], [`hostkey`]) -
//!    Curve25519 agreement, exchange-hash and key derivation, AES-256-GCM
//!    protection, Ed25519 host keys
//! 3. **State machines** ([`kex_machine`], [`auth_machine`]) - the role-aware
//!    drivers consuming and producing those messages
//!
//! Packet framing, the connection I/O loop, and channel multiplexing live in
//! the embedding layer; this core is fed already-parsed messages and returns
//! the messages to write back.
//!
//! # Security Considerations
//!
//! - **Exhaustive state matching**: every inbound message is classified as
//!   expected, ignorable, or a protocol violation; violations are fatal
//! - **Constant-time operations**: password comparison never leaks timing
//! - **Memory safety**: secrets are zeroized on drop using [`zeroize`]
//! - **Modern algorithms only**: Curve25519, Ed25519, AES-256-GCM
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::kex_machine::{KeyExchange, Role};
//!
//! let mut client = KeyExchange::new(Role::Client, "SSH-2.0-Halyard_0.1.0", "SSH-2.0-Peer");
//! let kexinit = client.start_key_exchange();
//! assert_eq!(kexinit.cookie().len(), 16);
//! assert!(!client.is_complete());
//! ```
//!
//! # References
//!
//! - [RFC 4251](https://datatracker.ietf.org/doc/html/rfc4251) - SSH Protocol Architecture
//! - [RFC 4252](https://datatracker.ietf.org/doc/html/rfc4252) - SSH Authentication Protocol
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol
//! - [RFC 8731](https://datatracker.ietf.org/doc/html/rfc8731) - Curve25519 Key Exchange

pub mod auth;
pub mod auth_machine;
pub mod crypto;
pub mod ecdh;
pub mod hostkey;
pub mod kex;
pub mod kex_machine;
pub mod message;
pub mod version;

// Re-export main types
pub use auth::{
    constant_time_compare, AuthFailure, AuthMethod, AuthRequest, AuthSuccess, AvailableMethods,
};
pub use auth_machine::{
    AuthOutcome, AuthResponse, ClientAuth, ClientAuthDelegate, NextRequestFuture, ResponseFuture,
    ServerAuth, ServerAuthDelegate,
};
pub use crypto::{CipherAlgorithm, DecryptionKey, EncryptionKey, TransportProtector};
pub use ecdh::{derive_key, Curve25519Exchanger, ExchangeBuffer, KeyMaterial};
pub use hostkey::Ed25519HostKey;
pub use kex::{
    expecting_incorrect_guess, negotiate, negotiate_algorithm, EcdhInit, EcdhReply, KexInit,
    Negotiated, NewKeys,
};
pub use kex_machine::{KexInitResponse, KeyExchange, Role};
pub use message::MessageType;
pub use version::Version;
