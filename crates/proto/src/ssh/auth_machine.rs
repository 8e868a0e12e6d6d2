//! User authentication state machines (RFC 4252).
//!
//! This module drives the authentication phase for one connection, on either
//! side. Credentials are never produced or judged here; both machines lean on
//! an application-supplied delegate and only enforce the protocol rules:
//! which inbound messages are legal in which state, and how delegate verdicts
//! translate to wire messages.
//!
//! # Delegates
//!
//! Delegate consultation is the single asynchronous boundary. Each
//! consultation is returned to the caller as a boxed future owning its own
//! `Arc` of the delegate, so the machine itself stays borrowable for inbound
//! dispatch while the delegate thinks. The machines define no timeouts; if a
//! delegate never resolves, the embedding layer's connection deadline is
//! expected to tear the connection down.
//!
//! # Client flow
//!
//! ```text
//! Idle ── begin_authentication ── AwaitingNextRequest ── send_user_auth_request
//!      ── AwaitingResponse ──┬── success ── Authenticated
//!                            └── failure ── AwaitingNextRequest (delegate again)
//!                                           └─ delegate declines ── Failed
//! ```
//!
//! # Server flow
//!
//! Requests fan out to the delegate as they arrive; any number may be in
//! flight, and the caller writes responses in whatever order the delegate
//! resolves them. Emitting a success message finishes the conversation:
//! every later inbound request is ignored rather than adjudicated.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use halyard_platform::{HalyardError, HalyardResult};
use tracing::{debug, warn};

use crate::ssh::auth::{AuthFailure, AuthRequest, AuthSuccess, AvailableMethods};

/// Future resolving the client delegate's next credential to try, or `None`
/// when the delegate has nothing left to offer.
pub type NextRequestFuture = Pin<Box<dyn Future<Output = Option<AuthRequest>> + Send>>;

/// Future resolving a server adjudication into the wire response to send.
pub type ResponseFuture = Pin<Box<dyn Future<Output = AuthResponse> + Send>>;

/// Supplies credentials on the client side.
#[async_trait]
pub trait ClientAuthDelegate: Send + Sync {
    /// Produces the next authentication request to try, given the methods
    /// the server is still willing to accept, or `None` to give up.
    ///
    /// The state machine does not filter: a delegate that returns a method
    /// outside `available` will simply be refused by the server again.
    async fn next_authentication(&self, available: AvailableMethods) -> Option<AuthRequest>;
}

/// Adjudicates authentication requests on the server side.
#[async_trait]
pub trait ServerAuthDelegate: Send + Sync {
    /// Judges one request. Requests are delivered in wire arrival order;
    /// verdicts may resolve in any order.
    async fn request_received(&self, request: AuthRequest) -> AuthOutcome;
}

/// A server delegate's verdict on one authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The request fully authenticates the user.
    Success,
    /// The credential was valid but more methods are required. The wire
    /// response advertises `remaining` with the partial-success flag set;
    /// driving the additional rounds is the delegate's business.
    PartialSuccess(AvailableMethods),
    /// The credential was rejected.
    Failure,
}

/// Wire response produced by a server adjudication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResponse {
    /// SSH_MSG_USERAUTH_SUCCESS
    Success(AuthSuccess),
    /// SSH_MSG_USERAUTH_FAILURE
    Failure(AuthFailure),
}

/// Client-side authentication progress.
enum ClientAuthState {
    /// Authentication has not begun.
    Idle,
    /// The delegate is being consulted; no request is on the wire.
    AwaitingNextRequest,
    /// A request is on the wire awaiting the server's verdict.
    AwaitingResponse { request: AuthRequest },
    /// Terminal: the server accepted.
    Authenticated,
    /// Terminal: the delegate gave up.
    Failed,
}

impl ClientAuthState {
    fn name(&self) -> &'static str {
        match self {
            ClientAuthState::Idle => "Idle",
            ClientAuthState::AwaitingNextRequest => "AwaitingNextRequest",
            ClientAuthState::AwaitingResponse { .. } => "AwaitingResponse",
            ClientAuthState::Authenticated => "Authenticated",
            ClientAuthState::Failed => "Failed",
        }
    }
}

/// Client-side user authentication state machine.
pub struct ClientAuth {
    delegate: Arc<dyn ClientAuthDelegate>,
    state: ClientAuthState,
}

impl ClientAuth {
    /// Creates a client machine backed by `delegate`.
    pub fn new(delegate: Arc<dyn ClientAuthDelegate>) -> Self {
        Self {
            delegate,
            state: ClientAuthState::Idle,
        }
    }

    /// Returns whether the server accepted authentication.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, ClientAuthState::Authenticated)
    }

    /// Returns whether authentication failed terminally.
    pub fn has_failed(&self) -> bool {
        matches!(self.state, ClientAuthState::Failed)
    }

    /// Begins authentication by consulting the delegate for the first
    /// request to send.
    ///
    /// The returned future resolves with the request, or `None` when the
    /// delegate declines; the caller then invokes
    /// [`ClientAuth::send_user_auth_request`] or
    /// [`ClientAuth::no_further_methods`] respectively. Before the first
    /// failure the server's preferences are unknown, so the delegate is
    /// offered every method.
    ///
    /// # Panics
    ///
    /// Panics unless the machine is idle (caller bug).
    pub fn begin_authentication(&mut self) -> NextRequestFuture {
        if !matches!(self.state, ClientAuthState::Idle) {
            panic!(
                "begin_authentication called in state {}",
                self.state.name()
            );
        }

        self.state = ClientAuthState::AwaitingNextRequest;
        debug!("consulting delegate for first authentication request");
        let delegate = Arc::clone(&self.delegate);
        Box::pin(async move { delegate.next_authentication(AvailableMethods::ALL).await })
    }

    /// Confirms that `request` was written to the wire.
    ///
    /// # Panics
    ///
    /// Panics unless a delegate consultation was outstanding (caller bug).
    pub fn send_user_auth_request(&mut self, request: AuthRequest) {
        if !matches!(self.state, ClientAuthState::AwaitingNextRequest) {
            panic!(
                "send_user_auth_request called in state {}",
                self.state.name()
            );
        }

        debug!("USERAUTH_REQUEST sent for user '{}'", request.username());
        self.state = ClientAuthState::AwaitingResponse { request };
    }

    /// Records that the delegate resolved with no further method to try.
    /// Terminal: every later inbound authentication message is a protocol
    /// violation.
    ///
    /// # Panics
    ///
    /// Panics unless a delegate consultation was outstanding (caller bug).
    pub fn no_further_methods(&mut self) {
        if !matches!(self.state, ClientAuthState::AwaitingNextRequest) {
            panic!("no_further_methods called in state {}", self.state.name());
        }

        debug!("delegate has no further authentication methods; giving up");
        self.state = ClientAuthState::Failed;
    }

    /// Consumes an inbound SSH_MSG_USERAUTH_SUCCESS.
    ///
    /// Legal only while a request awaits its verdict; in the terminal
    /// `Authenticated` state the message is silently ignored (servers may
    /// emit slop after success).
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] in any other state.
    pub fn receive_user_auth_success(&mut self) -> HalyardResult<()> {
        match &self.state {
            ClientAuthState::AwaitingResponse { request } => {
                debug!("authentication succeeded for '{}'", request.username());
                self.state = ClientAuthState::Authenticated;
                Ok(())
            }
            ClientAuthState::Authenticated => {
                debug!("ignoring USERAUTH_SUCCESS after authentication");
                Ok(())
            }
            _ => Err(self.unexpected("SSH_MSG_USERAUTH_SUCCESS")),
        }
    }

    /// Consumes an inbound SSH_MSG_USERAUTH_FAILURE.
    ///
    /// Legal only while a request awaits its verdict: the advertised
    /// name-list is narrowed to the methods this library knows (unknown
    /// tokens are dropped, not rejected) and the delegate is consulted
    /// again; the resulting future is returned. In the terminal
    /// `Authenticated` state the message is silently ignored and `None` is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] in any other state.
    pub fn receive_user_auth_failure(
        &mut self,
        msg: &AuthFailure,
    ) -> HalyardResult<Option<NextRequestFuture>> {
        match self.state {
            ClientAuthState::AwaitingResponse { .. } => {
                let available = msg.available_methods();
                debug!(
                    "authentication failed (partial={}), server accepts [{}]",
                    msg.partial_success(),
                    available
                );
                self.state = ClientAuthState::AwaitingNextRequest;
                let delegate = Arc::clone(&self.delegate);
                Ok(Some(Box::pin(async move {
                    delegate.next_authentication(available).await
                })))
            }
            ClientAuthState::Authenticated => {
                debug!("ignoring USERAUTH_FAILURE after authentication");
                Ok(None)
            }
            _ => Err(self.unexpected("SSH_MSG_USERAUTH_FAILURE")),
        }
    }

    /// Consumes an inbound SSH_MSG_USERAUTH_REQUEST, which a client must
    /// never see.
    ///
    /// # Errors
    ///
    /// Always returns [`HalyardError::Protocol`].
    pub fn receive_user_auth_request(&mut self, _msg: &AuthRequest) -> HalyardResult<()> {
        Err(HalyardError::Protocol(
            "Client received SSH_MSG_USERAUTH_REQUEST".to_string(),
        ))
    }

    fn unexpected(&self, what: &str) -> HalyardError {
        HalyardError::Protocol(format!(
            "Unexpected {} in state {}",
            what,
            self.state.name()
        ))
    }
}

impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAuth")
            .field("state", &self.state.name())
            .finish_non_exhaustive()
    }
}

/// Server-side authentication progress.
enum ServerAuthState {
    /// No request has arrived yet.
    Idle,
    /// One or more adjudications may be in flight.
    Authenticating { pending: usize },
    /// Terminal: a success message was emitted.
    Authenticated,
}

impl ServerAuthState {
    fn name(&self) -> &'static str {
        match self {
            ServerAuthState::Idle => "Idle",
            ServerAuthState::Authenticating { .. } => "Authenticating",
            ServerAuthState::Authenticated => "Authenticated",
        }
    }
}

/// Server-side user authentication state machine.
pub struct ServerAuth {
    delegate: Arc<dyn ServerAuthDelegate>,
    /// Methods advertised in full-failure responses.
    supported: AvailableMethods,
    state: ServerAuthState,
}

impl ServerAuth {
    /// Creates a server machine backed by `delegate`.
    ///
    /// # Arguments
    ///
    /// * `delegate` - adjudicates requests
    /// * `supported` - the method set advertised when a request fails
    pub fn new(delegate: Arc<dyn ServerAuthDelegate>, supported: AvailableMethods) -> Self {
        Self {
            delegate,
            supported,
            state: ServerAuthState::Idle,
        }
    }

    /// Returns whether a success message has been emitted.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, ServerAuthState::Authenticated)
    }

    /// Returns the number of adjudications awaiting a response write.
    pub fn pending(&self) -> usize {
        match self.state {
            ServerAuthState::Authenticating { pending } => pending,
            _ => 0,
        }
    }

    /// Consumes an inbound SSH_MSG_USERAUTH_REQUEST.
    ///
    /// Forwards the request to the delegate and returns a future resolving
    /// to the wire response, translated from the delegate's verdict:
    ///
    /// | Verdict | Response |
    /// |---|---|
    /// | `Success` | `USERAUTH_SUCCESS` |
    /// | `PartialSuccess(remaining)` | `USERAUTH_FAILURE{remaining, partial=true}` |
    /// | `Failure` | `USERAUTH_FAILURE{supported, partial=false}` |
    ///
    /// Any number of requests may be outstanding; the caller writes the
    /// responses in whatever order the futures resolve. Returns `None` once
    /// authenticated: later requests are ignored, not adjudicated.
    pub fn receive_user_auth_request(&mut self, request: AuthRequest) -> Option<ResponseFuture> {
        match &mut self.state {
            ServerAuthState::Authenticated => {
                debug!(
                    "ignoring USERAUTH_REQUEST from '{}' after authentication",
                    request.username()
                );
                return None;
            }
            ServerAuthState::Idle => {
                self.state = ServerAuthState::Authenticating { pending: 1 };
            }
            ServerAuthState::Authenticating { pending } => {
                *pending += 1;
            }
        }

        debug!(
            "adjudicating USERAUTH_REQUEST from '{}' via method '{}'",
            request.username(),
            request.method().name()
        );
        let delegate = Arc::clone(&self.delegate);
        let supported = self.supported;
        Some(Box::pin(async move {
            match delegate.request_received(request).await {
                AuthOutcome::Success => AuthResponse::Success(AuthSuccess::new()),
                AuthOutcome::PartialSuccess(remaining) => {
                    AuthResponse::Failure(AuthFailure::from_methods(remaining, true))
                }
                AuthOutcome::Failure => {
                    AuthResponse::Failure(AuthFailure::from_methods(supported, false))
                }
            }
        }))
    }

    /// Confirms that a success response was written. Terminal: the machine
    /// ignores every later inbound request.
    ///
    /// # Panics
    ///
    /// Panics if no adjudication was outstanding (caller bug).
    pub fn send_user_auth_success(&mut self) {
        match self.state {
            ServerAuthState::Authenticating { .. } => {
                debug!("USERAUTH_SUCCESS sent; authentication finished");
                self.state = ServerAuthState::Authenticated;
            }
            _ => panic!(
                "send_user_auth_success called in state {}",
                self.state.name()
            ),
        }
    }

    /// Confirms that a failure response was written.
    ///
    /// # Panics
    ///
    /// Panics if no adjudication was outstanding (caller bug).
    pub fn send_user_auth_failure(&mut self, _msg: &AuthFailure) {
        match &mut self.state {
            ServerAuthState::Authenticating { pending } if *pending > 0 => {
                *pending -= 1;
            }
            ServerAuthState::Authenticated => {
                // A late verdict for a request adjudicated before success
                // resolved; nothing goes on the wire after success.
                warn!("dropping USERAUTH_FAILURE response after authentication");
            }
            _ => panic!(
                "send_user_auth_failure called in state {}",
                self.state.name()
            ),
        }
    }

    /// Consumes an inbound SSH_MSG_USERAUTH_SUCCESS, which a server must
    /// never see.
    ///
    /// # Errors
    ///
    /// Always returns [`HalyardError::Protocol`].
    pub fn receive_user_auth_success(&mut self) -> HalyardResult<()> {
        Err(HalyardError::Protocol(
            "Server received SSH_MSG_USERAUTH_SUCCESS".to_string(),
        ))
    }

    /// Consumes an inbound SSH_MSG_USERAUTH_FAILURE, which a server must
    /// never see.
    ///
    /// # Errors
    ///
    /// Always returns [`HalyardError::Protocol`].
    pub fn receive_user_auth_failure(&mut self, _msg: &AuthFailure) -> HalyardResult<()> {
        Err(HalyardError::Protocol(
            "Server received SSH_MSG_USERAUTH_FAILURE".to_string(),
        ))
    }
}

impl std::fmt::Debug for ServerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAuth")
            .field("state", &self.state.name())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::auth::{constant_time_compare, AuthMethod};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client delegate that offers the same password forever.
    struct StaticPassword {
        username: &'static str,
        password: &'static str,
    }

    #[async_trait]
    impl ClientAuthDelegate for StaticPassword {
        async fn next_authentication(&self, _available: AvailableMethods) -> Option<AuthRequest> {
            Some(AuthRequest::new(
                self.username,
                "ssh-connection",
                AuthMethod::Password(self.password.to_string()),
            ))
        }
    }

    /// Client delegate that gives up immediately.
    struct NoCredentials;

    #[async_trait]
    impl ClientAuthDelegate for NoCredentials {
        async fn next_authentication(&self, _available: AvailableMethods) -> Option<AuthRequest> {
            None
        }
    }

    /// Server delegate that denies the first `deny` requests and accepts the
    /// next one.
    struct DenyThenAccept {
        deny: usize,
        seen: AtomicUsize,
    }

    impl DenyThenAccept {
        fn new(deny: usize) -> Self {
            Self {
                deny,
                seen: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ServerAuthDelegate for DenyThenAccept {
        async fn request_received(&self, _request: AuthRequest) -> AuthOutcome {
            if self.seen.fetch_add(1, Ordering::SeqCst) < self.deny {
                AuthOutcome::Failure
            } else {
                AuthOutcome::Success
            }
        }
    }

    /// Server delegate checking a fixed password in constant time.
    struct PasswordChecker {
        password: &'static str,
    }

    #[async_trait]
    impl ServerAuthDelegate for PasswordChecker {
        async fn request_received(&self, request: AuthRequest) -> AuthOutcome {
            match request.method() {
                AuthMethod::Password(supplied) if constant_time_compare(supplied, self.password) => {
                    AuthOutcome::Success
                }
                _ => AuthOutcome::Failure,
            }
        }
    }

    fn password_request() -> AuthRequest {
        AuthRequest::new(
            "foo",
            "ssh-connection",
            AuthMethod::Password("bar".to_string()),
        )
    }

    #[tokio::test]
    async fn test_client_happy_path() {
        let mut client = ClientAuth::new(Arc::new(StaticPassword {
            username: "foo",
            password: "bar",
        }));

        let request = client.begin_authentication().await.unwrap();
        assert_eq!(request.username(), "foo");

        client.send_user_auth_request(request);
        client.receive_user_auth_success().unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_client_failure_then_success() {
        let mut client = ClientAuth::new(Arc::new(StaticPassword {
            username: "foo",
            password: "bar",
        }));

        let request = client.begin_authentication().await.unwrap();
        client.send_user_auth_request(request.clone());

        let failure = AuthFailure::new(vec!["password".to_string()], false);
        let retry = client
            .receive_user_auth_failure(&failure)
            .unwrap()
            .expect("delegate must be re-consulted")
            .await
            .unwrap();
        assert_eq!(retry, request);

        client.send_user_auth_request(retry);
        client.receive_user_auth_success().unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_client_terminal_failure() {
        let mut client = ClientAuth::new(Arc::new(NoCredentials));

        assert!(client.begin_authentication().await.is_none());
        client.no_further_methods();
        assert!(client.has_failed());

        // All inbound auth traffic is now a violation.
        assert!(matches!(
            client.receive_user_auth_success(),
            Err(HalyardError::Protocol(_))
        ));
        let failure = AuthFailure::new(vec![], false);
        assert!(matches!(
            client.receive_user_auth_failure(&failure),
            Err(HalyardError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_client_ignores_slop_after_success() {
        let mut client = ClientAuth::new(Arc::new(StaticPassword {
            username: "foo",
            password: "bar",
        }));

        let request = client.begin_authentication().await.unwrap();
        client.send_user_auth_request(request);
        client.receive_user_auth_success().unwrap();

        client.receive_user_auth_success().unwrap();
        let failure = AuthFailure::new(vec!["password".to_string()], false);
        assert!(client.receive_user_auth_failure(&failure).unwrap().is_none());
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_client_response_before_request_is_violation() {
        let mut client = ClientAuth::new(Arc::new(StaticPassword {
            username: "foo",
            password: "bar",
        }));

        // Consultation outstanding, nothing on the wire yet.
        let _future = client.begin_authentication();
        assert!(matches!(
            client.receive_user_auth_success(),
            Err(HalyardError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_client_never_receives_requests() {
        let mut client = ClientAuth::new(Arc::new(NoCredentials));
        assert!(matches!(
            client.receive_user_auth_request(&password_request()),
            Err(HalyardError::Protocol(_))
        ));
    }

    #[test]
    #[should_panic(expected = "begin_authentication called in state")]
    fn test_double_begin_panics() {
        let mut client = ClientAuth::new(Arc::new(NoCredentials));
        let _first = client.begin_authentication();
        let _second = client.begin_authentication();
    }

    #[tokio::test]
    async fn test_server_parallel_denial() {
        let mut server = ServerAuth::new(
            Arc::new(DenyThenAccept::new(usize::MAX)),
            AvailableMethods::PASSWORD,
        );

        let futures: Vec<_> = (0..10)
            .map(|_| server.receive_user_auth_request(password_request()).unwrap())
            .collect();
        assert_eq!(server.pending(), 10);

        for future in futures {
            match future.await {
                AuthResponse::Failure(failure) => {
                    assert_eq!(failure.methods_can_continue(), &["password".to_string()]);
                    assert!(!failure.partial_success());
                    server.send_user_auth_failure(&failure);
                }
                AuthResponse::Success(_) => panic!("expected denial"),
            }
        }
        assert_eq!(server.pending(), 0);
        assert!(!server.is_authenticated());
    }

    #[tokio::test]
    async fn test_server_accept_then_ignore() {
        let mut server = ServerAuth::new(
            Arc::new(DenyThenAccept::new(0)),
            AvailableMethods::PASSWORD,
        );

        let future = server.receive_user_auth_request(password_request()).unwrap();
        match future.await {
            AuthResponse::Success(_) => server.send_user_auth_success(),
            AuthResponse::Failure(_) => panic!("expected acceptance"),
        }
        assert!(server.is_authenticated());

        // Later requests are ignored, not adjudicated.
        assert!(server.receive_user_auth_request(password_request()).is_none());
    }

    #[tokio::test]
    async fn test_server_password_check() {
        let mut server = ServerAuth::new(
            Arc::new(PasswordChecker { password: "bar" }),
            AvailableMethods::PASSWORD,
        );

        let wrong = AuthRequest::new(
            "foo",
            "ssh-connection",
            AuthMethod::Password("nope".to_string()),
        );
        let response = server.receive_user_auth_request(wrong).unwrap().await;
        assert!(matches!(response, AuthResponse::Failure(_)));
        if let AuthResponse::Failure(failure) = &response {
            server.send_user_auth_failure(failure);
        }

        let response = server
            .receive_user_auth_request(password_request())
            .unwrap()
            .await;
        assert!(matches!(response, AuthResponse::Success(_)));
    }

    #[tokio::test]
    async fn test_server_partial_success_translation() {
        struct PartialDelegate;

        #[async_trait]
        impl ServerAuthDelegate for PartialDelegate {
            async fn request_received(&self, _request: AuthRequest) -> AuthOutcome {
                AuthOutcome::PartialSuccess(AvailableMethods::PUBLIC_KEY)
            }
        }

        let mut server = ServerAuth::new(Arc::new(PartialDelegate), AvailableMethods::ALL);
        let response = server
            .receive_user_auth_request(password_request())
            .unwrap()
            .await;

        match response {
            AuthResponse::Failure(failure) => {
                assert_eq!(failure.methods_can_continue(), &["publickey".to_string()]);
                assert!(failure.partial_success());
            }
            AuthResponse::Success(_) => panic!("expected partial-success failure"),
        }
    }

    #[tokio::test]
    async fn test_server_responses_follow_resolution_order() {
        let mut server = ServerAuth::new(
            Arc::new(DenyThenAccept::new(usize::MAX)),
            AvailableMethods::PASSWORD,
        );

        let first = server.receive_user_auth_request(password_request()).unwrap();
        let second = server.receive_user_auth_request(password_request()).unwrap();
        let third = server.receive_user_auth_request(password_request()).unwrap();

        // The caller awaits verdicts in whatever order the delegate resolves
        // them; here the machine must tolerate last-in-first-out.
        for future in [third, second, first] {
            if let AuthResponse::Failure(failure) = future.await {
                server.send_user_auth_failure(&failure);
            }
        }
        assert_eq!(server.pending(), 0);
    }

    #[test]
    fn test_server_never_receives_responses() {
        let mut server = ServerAuth::new(
            Arc::new(DenyThenAccept::new(0)),
            AvailableMethods::PASSWORD,
        );

        assert!(matches!(
            server.receive_user_auth_success(),
            Err(HalyardError::Protocol(_))
        ));
        let failure = AuthFailure::new(vec![], false);
        assert!(matches!(
            server.receive_user_auth_failure(&failure),
            Err(HalyardError::Protocol(_))
        ));
    }

    #[test]
    #[should_panic(expected = "send_user_auth_success called in state")]
    fn test_send_success_without_request_panics() {
        let mut server = ServerAuth::new(
            Arc::new(DenyThenAccept::new(0)),
            AvailableMethods::PASSWORD,
        );
        server.send_user_auth_success();
    }
}
