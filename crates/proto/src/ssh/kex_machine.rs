//! Key exchange state machine (RFC 4253 Section 7).
//!
//! This module drives the key exchange phase for one connection, on either
//! side. The machine consumes typed messages from the codec, emits the
//! messages to answer with, and ultimately yields the installed transport
//! protection:
//!
//! ```text
//! Idle ── KEXINIT swap ── algorithm negotiation ── ECDH ── NEWKEYS swap ── Complete
//! ```
//!
//! The two NEWKEYS messages cross independently: either side may send before
//! it receives, and both orders converge on `Complete`.
//!
//! # Exchange hash discipline
//!
//! The machine owns the [`ExchangeBuffer`] and appends each hashed field the
//! moment it becomes known, in canonical order (client version, server
//! version, client KEXINIT, server KEXINIT, host key, client ephemeral,
//! server ephemeral, shared secret). Both peers must hash identical bytes;
//! the resulting digest doubles as the session identifier.
//!
//! # Error discipline
//!
//! Peer faults (a message illegal in the current state, malformed content, a
//! bad signature) are returned as errors and the caller is expected to drop
//! the connection. Calling a `send_*`/`start_*` method in a state that
//! forbids it is a caller bug and panics.
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::kex_machine::{KeyExchange, Role};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = KeyExchange::new(Role::Client, "SSH-2.0-Halyard_0.1.0", "SSH-2.0-Peer");
//! let kexinit = client.start_key_exchange();
//! let _ = client.send_kex_init(kexinit)?;
//! # Ok(())
//! # }
//! ```

use halyard_platform::{HalyardError, HalyardResult};
use tracing::debug;

use crate::ssh::crypto::{DecryptionKey, EncryptionKey, TransportProtector};
use crate::ssh::ecdh::{Curve25519Exchanger, ExchangeBuffer, KeyMaterial};
use crate::ssh::hostkey::{parse_public_key_blob, Ed25519HostKey};
use crate::ssh::kex::{
    expecting_incorrect_guess, negotiate, EcdhInit, EcdhReply, KexInit, Negotiated, NewKeys,
};

/// The role this machine plays in the connection.
///
/// The server variant carries the host key used to sign the exchange hash.
#[derive(Debug, Clone)]
pub enum Role {
    /// Client side: initiates ECDH and verifies the host key signature.
    Client,
    /// Server side: signs the exchange hash with the given host key.
    Server(Ed25519HostKey),
}

impl Role {
    /// Returns whether this is the client role.
    pub fn is_client(&self) -> bool {
        matches!(self, Role::Client)
    }
}

/// Message produced by [`KeyExchange::handle_kex_init`].
#[derive(Debug)]
pub enum KexInitResponse {
    /// Our own KEXINIT, owed because the peer opened the exchange first.
    KexInit(KexInit),
    /// The ECDH init opening the Curve25519 exchange (client role).
    EcdhInit(EcdhInit),
}

/// Key exchange progress. Exactly one variant is inhabited at a time, and
/// each variant owns only the payload that stage needs.
enum KexState {
    /// Nothing has happened yet.
    Idle,
    /// Peer's KEXINIT arrived before ours was written; our reply KEXINIT has
    /// been handed to the caller and awaits its send confirmation.
    RespondingKexInit,
    /// Our KEXINIT is on the wire; the peer's is still outstanding.
    KexInitSent,
    /// Client: algorithms negotiated, our ECDH init handed to the caller.
    EcdhInitQueued {
        negotiated: Negotiated,
        ephemeral: Curve25519Exchanger,
    },
    /// Server: algorithms negotiated, waiting for the client's ECDH init.
    AwaitingEcdhInit { negotiated: Negotiated },
    /// Server: the peer guessed wrong; the next ECDH init is discarded.
    AwaitingEcdhInitWrongGuess { negotiated: Negotiated },
    /// Client: ECDH init written, waiting for the server's reply.
    AwaitingEcdhReply {
        negotiated: Negotiated,
        ephemeral: Curve25519Exchanger,
    },
    /// Server: ECDH reply computed and handed to the caller.
    EcdhReplyQueued { protector: TransportProtector },
    /// Shared secret derived and protector built; no NEWKEYS exchanged yet.
    KeysExchanged { protector: TransportProtector },
    /// We sent NEWKEYS first; the outbound half has left the machine.
    NewKeysSent { inbound: DecryptionKey },
    /// We received NEWKEYS first; the inbound half has left the machine.
    NewKeysReceived { outbound: EncryptionKey },
    /// Both NEWKEYS exchanged; protection is live.
    Complete,
}

impl KexState {
    fn name(&self) -> &'static str {
        match self {
            KexState::Idle => "Idle",
            KexState::RespondingKexInit => "RespondingKexInit",
            KexState::KexInitSent => "KexInitSent",
            KexState::EcdhInitQueued { .. } => "EcdhInitQueued",
            KexState::AwaitingEcdhInit { .. } => "AwaitingEcdhInit",
            KexState::AwaitingEcdhInitWrongGuess { .. } => "AwaitingEcdhInitWrongGuess",
            KexState::AwaitingEcdhReply { .. } => "AwaitingEcdhReply",
            KexState::EcdhReplyQueued { .. } => "EcdhReplyQueued",
            KexState::KeysExchanged { .. } => "KeysExchanged",
            KexState::NewKeysSent { .. } => "NewKeysSent",
            KexState::NewKeysReceived { .. } => "NewKeysReceived",
            KexState::Complete => "Complete",
        }
    }
}

/// Key exchange state machine for one connection.
///
/// Owned by the connection's event loop; all methods take `&mut self` and
/// return synchronously. `handle_*` methods consume inbound messages,
/// `start_*`/`send_*` methods produce outbound messages or confirm that the
/// I/O layer wrote them.
pub struct KeyExchange {
    role: Role,
    state: KexState,
    /// Exchange-hash accumulator, seeded with both version strings.
    exchange: ExchangeBuffer,
    our_kex_init: Option<KexInit>,
    peer_kex_init: Option<KexInit>,
    session_id: Option<Vec<u8>>,
}

impl KeyExchange {
    /// Creates a machine for `role`.
    ///
    /// # Arguments
    ///
    /// * `role` - Client, or Server with its host key
    /// * `our_version` - our identification string, without CR LF
    /// * `peer_version` - the peer's advertised identification string
    pub fn new(role: Role, our_version: &str, peer_version: &str) -> Self {
        // V_C and V_S are hashed client-first on both sides.
        let exchange = if role.is_client() {
            ExchangeBuffer::new(our_version, peer_version)
        } else {
            ExchangeBuffer::new(peer_version, our_version)
        };

        Self {
            role,
            state: KexState::Idle,
            exchange,
            our_kex_init: None,
            peer_kex_init: None,
            session_id: None,
        }
    }

    /// Returns the session identifier, once the exchange hash exists.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    /// Returns whether both NEWKEYS messages have been exchanged.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, KexState::Complete)
    }

    /// Opens the key exchange, producing our KEXINIT.
    ///
    /// The caller writes the message and then confirms with
    /// [`KeyExchange::send_kex_init`].
    ///
    /// # Panics
    ///
    /// Panics if the exchange was already opened (caller bug).
    pub fn start_key_exchange(&mut self) -> KexInit {
        if !matches!(self.state, KexState::Idle) || self.our_kex_init.is_some() {
            panic!(
                "start_key_exchange called in state {} (key exchange already started)",
                self.state.name()
            );
        }

        let kex_init = KexInit::new_default();
        self.our_kex_init = Some(kex_init.clone());
        kex_init
    }

    /// Confirms that our KEXINIT was written to the wire.
    ///
    /// `msg` is recorded as the authoritative message we sent; its exact
    /// bytes become the `I_C`/`I_S` hash input.
    ///
    /// When the peer opened the exchange first, both KEXINITs are now known
    /// and negotiation completes here; a client then returns the ECDH init to
    /// send next.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Negotiation`] if no common algorithm exists.
    ///
    /// # Panics
    ///
    /// Panics if called in a state that forbids it (caller bug).
    pub fn send_kex_init(&mut self, msg: KexInit) -> HalyardResult<Option<EcdhInit>> {
        match self.state {
            KexState::Idle => {
                self.our_kex_init = Some(msg);
                self.state = KexState::KexInitSent;
                debug!("KEXINIT sent, awaiting peer KEXINIT");
                Ok(None)
            }
            KexState::RespondingKexInit => {
                self.our_kex_init = Some(msg);
                match self.complete_negotiation()? {
                    Some(KexInitResponse::EcdhInit(init)) => Ok(Some(init)),
                    _ => Ok(None),
                }
            }
            _ => panic!(
                "send_kex_init called in state {}",
                self.state.name()
            ),
        }
    }

    /// Consumes the peer's KEXINIT.
    ///
    /// Returns the message we owe in response, if any:
    /// - our own KEXINIT, when the peer opened the exchange before we did;
    /// - the ECDH init, when we are the client and negotiation just finished;
    /// - nothing, when we are the server and now await the ECDH init.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if a KEXINIT is illegal in the
    /// current state and [`HalyardError::Negotiation`] if no common
    /// algorithm exists.
    pub fn handle_kex_init(&mut self, msg: KexInit) -> HalyardResult<Option<KexInitResponse>> {
        match self.state {
            KexState::Idle => {
                // Peer opened the exchange. If the caller has not yet built
                // our KEXINIT we owe one now; either way negotiation waits
                // for the send confirmation.
                self.peer_kex_init = Some(msg);
                let response = if self.our_kex_init.is_none() {
                    let ours = KexInit::new_default();
                    self.our_kex_init = Some(ours.clone());
                    Some(KexInitResponse::KexInit(ours))
                } else {
                    None
                };
                self.state = KexState::RespondingKexInit;
                debug!("peer KEXINIT received before ours was written");
                Ok(response)
            }
            KexState::KexInitSent => {
                self.peer_kex_init = Some(msg);
                self.complete_negotiation()
            }
            _ => Err(self.unexpected("SSH_MSG_KEXINIT")),
        }
    }

    /// Runs algorithm negotiation once both KEXINITs are known, appends both
    /// payloads to the exchange buffer in client-then-server order, and
    /// advances to the role's post-negotiation state.
    fn complete_negotiation(&mut self) -> HalyardResult<Option<KexInitResponse>> {
        let ours = self
            .our_kex_init
            .clone()
            .expect("negotiation requires our KEXINIT");
        let theirs = self
            .peer_kex_init
            .clone()
            .expect("negotiation requires peer KEXINIT");

        let (client_msg, server_msg) = if self.role.is_client() {
            (&ours, &theirs)
        } else {
            (&theirs, &ours)
        };

        let negotiated = negotiate(client_msg, server_msg)?;
        debug!(
            "negotiated kex={} hostkey={}",
            negotiated.kex_algorithm, negotiated.host_key_algorithm
        );

        // I_C then I_S, exact payload bytes.
        self.exchange.push_string(&client_msg.to_bytes());
        self.exchange.push_string(&server_msg.to_bytes());

        match self.role {
            Role::Client => {
                let ephemeral = Curve25519Exchanger::new()?;
                let init = EcdhInit::new(ephemeral.public_key().to_vec());
                self.state = KexState::EcdhInitQueued {
                    negotiated,
                    ephemeral,
                };
                Ok(Some(KexInitResponse::EcdhInit(init)))
            }
            Role::Server(_) => {
                if expecting_incorrect_guess(&ours, &theirs) {
                    debug!("peer sent a wrong first-kex-packet guess; next ECDH init is discarded");
                    self.state = KexState::AwaitingEcdhInitWrongGuess { negotiated };
                } else {
                    self.state = KexState::AwaitingEcdhInit { negotiated };
                }
                Ok(None)
            }
        }
    }

    /// Confirms that our ECDH init was written to the wire (client role).
    ///
    /// # Panics
    ///
    /// Panics if no ECDH init is queued (caller bug).
    pub fn send_ecdh_init(&mut self, _msg: &EcdhInit) {
        match std::mem::replace(&mut self.state, KexState::Idle) {
            KexState::EcdhInitQueued {
                negotiated,
                ephemeral,
            } => {
                self.state = KexState::AwaitingEcdhReply {
                    negotiated,
                    ephemeral,
                };
            }
            other => {
                self.state = other;
                panic!("send_ecdh_init called in state {}", self.state.name());
            }
        }
    }

    /// Consumes the client's ECDH init (server role).
    ///
    /// Completes the ECDH exchange: generates the server ephemeral, derives
    /// the shared secret and exchange hash, signs the hash with the host
    /// key, builds the transport protector, and returns the ECDH reply to
    /// send. Returns `None` when the message was a discarded wrong guess.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] for an illegal or malformed
    /// message and [`HalyardError::Security`] if the ECDH computation fails.
    pub fn handle_ecdh_init(&mut self, msg: &EcdhInit) -> HalyardResult<Option<EcdhReply>> {
        match &self.state {
            KexState::AwaitingEcdhInitWrongGuess { .. } => {
                debug!("discarding guessed SSH_MSG_KEX_ECDH_INIT");
                let negotiated = match std::mem::replace(&mut self.state, KexState::Idle) {
                    KexState::AwaitingEcdhInitWrongGuess { negotiated } => negotiated,
                    _ => unreachable!(),
                };
                self.state = KexState::AwaitingEcdhInit { negotiated };
                Ok(None)
            }
            KexState::AwaitingEcdhInit { .. } => {
                let host_key = match &self.role {
                    Role::Server(key) => key.clone(),
                    Role::Client => return Err(self.unexpected("SSH_MSG_KEX_ECDH_INIT")),
                };

                let client_public: [u8; 32] =
                    msg.ephemeral_public().try_into().map_err(|_| {
                        HalyardError::Protocol(format!(
                            "Invalid Curve25519 public key length: expected 32, got {}",
                            msg.ephemeral_public().len()
                        ))
                    })?;

                let ephemeral = Curve25519Exchanger::new()?;
                let server_public = ephemeral.public_key().to_vec();
                let shared_secret = ephemeral.agree(&client_public)?;

                let host_key_blob = host_key.public_key_blob();
                self.exchange.push_string(&host_key_blob);
                self.exchange.push_string(msg.ephemeral_public());
                self.exchange.push_string(&server_public);
                self.exchange.push_mpint(&shared_secret);

                let exchange_hash = self.exchange.hash();
                let signature_blob = host_key.sign(&exchange_hash)?;

                let protector = self.install_keys(&shared_secret, &exchange_hash)?;
                self.state = KexState::EcdhReplyQueued { protector };
                debug!("ECDH complete (server), reply queued");

                Ok(Some(EcdhReply::new(
                    host_key_blob,
                    server_public,
                    signature_blob,
                )))
            }
            _ => Err(self.unexpected("SSH_MSG_KEX_ECDH_INIT")),
        }
    }

    /// Confirms that our ECDH reply was written to the wire (server role).
    ///
    /// # Panics
    ///
    /// Panics if no ECDH reply is queued (caller bug).
    pub fn send_ecdh_reply(&mut self, _msg: &EcdhReply) {
        match std::mem::replace(&mut self.state, KexState::Idle) {
            KexState::EcdhReplyQueued { protector } => {
                self.state = KexState::KeysExchanged { protector };
            }
            other => {
                self.state = other;
                panic!("send_ecdh_reply called in state {}", self.state.name());
            }
        }
    }

    /// Consumes the server's ECDH reply (client role).
    ///
    /// Verifies the host key signature over the reconstructed exchange hash,
    /// derives the session keys, builds the transport protector, and returns
    /// the NEWKEYS message to send.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] for an illegal or malformed
    /// message and [`HalyardError::Security`] if signature verification or
    /// the ECDH computation fails.
    pub fn handle_ecdh_reply(&mut self, msg: &EcdhReply) -> HalyardResult<NewKeys> {
        if !matches!(self.state, KexState::AwaitingEcdhReply { .. }) {
            return Err(self.unexpected("SSH_MSG_KEX_ECDH_REPLY"));
        }

        // Validate message content before touching any state.
        let server_public: [u8; 32] = msg.ephemeral_public().try_into().map_err(|_| {
            HalyardError::Protocol(format!(
                "Invalid Curve25519 public key length: expected 32, got {}",
                msg.ephemeral_public().len()
            ))
        })?;
        parse_public_key_blob(msg.host_key_blob())?;

        let (negotiated, ephemeral) = match std::mem::replace(&mut self.state, KexState::Idle) {
            KexState::AwaitingEcdhReply {
                negotiated,
                ephemeral,
            } => (negotiated, ephemeral),
            _ => unreachable!(),
        };

        let client_public = ephemeral.public_key().to_vec();
        let shared_secret = ephemeral.agree(&server_public)?;

        self.exchange.push_string(msg.host_key_blob());
        self.exchange.push_string(&client_public);
        self.exchange.push_string(msg.ephemeral_public());
        self.exchange.push_mpint(&shared_secret);

        let exchange_hash = self.exchange.hash();
        Ed25519HostKey::verify_blob(msg.host_key_blob(), &exchange_hash, msg.signature_blob())?;

        let protector = self.install_keys(&shared_secret, &exchange_hash)?;
        self.state = KexState::KeysExchanged { protector };
        debug!(
            "ECDH complete (client), host key verified, kex={}",
            negotiated.kex_algorithm
        );

        Ok(NewKeys::new())
    }

    /// Derives the session keys and builds this role's protector. Pins the
    /// session id to the first exchange hash.
    fn install_keys(
        &mut self,
        shared_secret: &[u8],
        exchange_hash: &[u8],
    ) -> HalyardResult<TransportProtector> {
        let session_id = self
            .session_id
            .get_or_insert_with(|| exchange_hash.to_vec())
            .clone();

        let keys = KeyMaterial::derive(shared_secret, exchange_hash, &session_id);
        TransportProtector::for_role(self.role.is_client(), &keys)
    }

    /// Consumes the peer's NEWKEYS, releasing the inbound protection half.
    ///
    /// The I/O layer must start decrypting with the returned key from the
    /// next inbound packet on.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if NEWKEYS is illegal in the
    /// current state.
    pub fn handle_new_keys(&mut self) -> HalyardResult<DecryptionKey> {
        match std::mem::replace(&mut self.state, KexState::Idle) {
            KexState::KeysExchanged { protector } => {
                let (outbound, inbound) = protector.into_halves();
                self.state = KexState::NewKeysReceived { outbound };
                debug!("NEWKEYS received first, inbound protection released");
                Ok(inbound)
            }
            KexState::NewKeysSent { inbound } => {
                self.state = KexState::Complete;
                debug!("key exchange complete");
                Ok(inbound)
            }
            other => {
                self.state = other;
                Err(self.unexpected("SSH_MSG_NEWKEYS"))
            }
        }
    }

    /// Confirms that our NEWKEYS was written, releasing the outbound
    /// protection half.
    ///
    /// The I/O layer must encrypt every later outbound packet with the
    /// returned key.
    ///
    /// # Panics
    ///
    /// Panics if keys have not been exchanged yet (caller bug).
    pub fn send_new_keys(&mut self) -> EncryptionKey {
        match std::mem::replace(&mut self.state, KexState::Idle) {
            KexState::KeysExchanged { protector } => {
                let (outbound, inbound) = protector.into_halves();
                self.state = KexState::NewKeysSent { inbound };
                debug!("NEWKEYS sent first, outbound protection released");
                outbound
            }
            KexState::NewKeysReceived { outbound } => {
                self.state = KexState::Complete;
                debug!("key exchange complete");
                outbound
            }
            other => {
                self.state = other;
                panic!("send_new_keys called in state {}", self.state.name());
            }
        }
    }

    fn unexpected(&self, what: &str) -> HalyardError {
        HalyardError::Protocol(format!(
            "Unexpected {} in state {}",
            what,
            self.state.name()
        ))
    }
}

impl std::fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = if self.role.is_client() { "client" } else { "server" };
        f.debug_struct("KeyExchange")
            .field("role", &role)
            .field("state", &self.state.name())
            .finish_non_exhaustive()
    }
}
