//! Chat service: per-connection session lifecycle.
//!
//! A connection moves through `Connecting → Authenticated → Active → Closed`:
//!
//! - [`ChatService::authenticate`] turns a handshake token into an
//!   [`AuthenticatedSession`], or fails and the connection is closed with a
//!   policy-violation code without ever being registered.
//! - [`ChatService::activate`] registers the session (replacing and closing
//!   any older connection for the same identity), confirms it to the client,
//!   and announces it to everyone else. The result is an [`ActiveSession`].
//! - [`ActiveSession::handle_text`] routes inbound frames while active.
//! - [`ActiveSession::close`] (or dropping the session) releases it. Cleanup
//!   only happens if the registry still maps the identity to *this*
//!   connection; a superseded connection leaves its successor untouched.

use std::sync::Arc;

use crate::auth::{ClaimSet, TokenValidator};
use crate::domain::{
    CLOSE_POLICY_VIOLATION, ConnectionHandle, ConnectionReceiver, ConnectionRegistry,
    GroupDirectory, Identity,
};
use crate::error::ChatError;
use crate::service::message_router::{DispatchOutcome, MessageRouter};
use crate::ws::messages::{OutboundEnvelope, OutboundKind};

/// Close reason sent to a connection replaced by a newer login.
pub const SESSION_REPLACED_REASON: &str = "session replaced by a newer connection";

/// Orchestrates sessions over the shared connection and group stores.
///
/// Cheap to clone; all state lives behind `Arc`s. This is the server context
/// every connection task receives.
#[derive(Debug, Clone)]
pub struct ChatService {
    connections: Arc<ConnectionRegistry>,
    groups: Arc<GroupDirectory>,
    router: MessageRouter,
    validator: Arc<dyn TokenValidator>,
    outbound_capacity: usize,
}

/// A connection whose token has been validated but which is not yet routable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    /// Identity named by the token.
    pub identity: Identity,
    /// Claims carried by the token.
    pub claims: ClaimSet,
}

/// A registered, routable session.
///
/// Dropping an `ActiveSession` releases it, so cleanup also runs when the
/// owning task unwinds.
#[derive(Debug)]
pub struct ActiveSession {
    identity: Identity,
    claims: ClaimSet,
    handle: ConnectionHandle,
    service: ChatService,
    released: bool,
}

impl ChatService {
    /// Creates a service over the given stores.
    #[must_use]
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        groups: Arc<GroupDirectory>,
        validator: Arc<dyn TokenValidator>,
        outbound_capacity: usize,
    ) -> Self {
        let router = MessageRouter::new(Arc::clone(&connections), Arc::clone(&groups));
        Self {
            connections,
            groups,
            router,
            validator,
            outbound_capacity,
        }
    }

    /// Returns the connection registry.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Returns the group directory.
    #[must_use]
    pub fn groups(&self) -> &Arc<GroupDirectory> {
        &self.groups
    }

    /// Returns the message router.
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Validates the handshake token.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::AuthenticationFailure`] if the token is absent,
    /// empty, or rejected by the validator.
    pub fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedSession, ChatError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::AuthenticationFailure("missing token".to_string()))?;
        let (identity, claims) = self.validator.validate(token)?;
        tracing::info!(identity = %identity, "session authenticated");
        Ok(AuthenticatedSession { identity, claims })
    }

    /// Registers `session` and makes it routable.
    ///
    /// Returns the active session and the receiver its socket task must drain.
    #[must_use]
    pub fn activate(&self, session: AuthenticatedSession) -> (ActiveSession, ConnectionReceiver) {
        let AuthenticatedSession { identity, claims } = session;
        let (handle, receiver) = ConnectionHandle::channel(self.outbound_capacity);

        // Queued before registration so it is the first frame the client sees.
        let confirmation = OutboundEnvelope::new(
            OutboundKind::System,
            identity.as_str(),
            format!("{identity} Connected Successfully."),
        )
        .with_data(serde_json::json!({
            "useruniqueid": claims.session_id(),
            "contact": claims.contact(),
        }));
        if let Ok(frame) = confirmation.encode() {
            handle.send_text(frame);
        }

        if let Some(previous) = self.connections.register(identity.clone(), handle.clone()) {
            tracing::info!(
                identity = %identity,
                superseded = %previous.id(),
                "closing superseded connection"
            );
            previous.close(CLOSE_POLICY_VIOLATION, SESSION_REPLACED_REASON);
        }

        let notice = OutboundEnvelope::system(format!("{identity} has joined the chat!"));
        let notified = self.router.broadcast(&notice, Some(&identity));
        tracing::info!(
            identity = %identity,
            connection_id = %handle.id(),
            notified,
            "session active"
        );

        let active = ActiveSession {
            identity,
            claims,
            handle,
            service: self.clone(),
            released: false,
        };
        (active, receiver)
    }

    /// Releases the session bound to `handle`, if it is still the current one.
    fn release(&self, identity: &Identity, handle: &ConnectionHandle) -> bool {
        if !self.connections.remove_if_current(identity, handle.id()) {
            tracing::debug!(
                identity = %identity,
                connection_id = %handle.id(),
                "stale connection closed, skipping cleanup"
            );
            return false;
        }

        let report = self.groups.purge_identity(identity);
        let notice = OutboundEnvelope::system(format!("{identity} has left the chat."));
        let notified = self.router.broadcast(&notice, None);
        tracing::info!(
            identity = %identity,
            connection_id = %handle.id(),
            groups_left = report.left.len(),
            groups_dissolved = report.dissolved.len(),
            notified,
            "session closed"
        );
        true
    }
}

impl ActiveSession {
    /// Returns the session's identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the session's claims.
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Returns this session's connection handle.
    #[must_use]
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Routes one inbound text frame.
    pub fn handle_text(&self, text: &str) -> DispatchOutcome {
        self.service
            .router
            .dispatch(&self.identity, &self.handle, text)
    }

    /// Reports `error` to this session's own client.
    pub fn reject(&self, error: &ChatError) -> bool {
        self.service.router.reject(&self.handle, error)
    }

    /// Ends the session.
    ///
    /// Returns `true` if cleanup ran, `false` if this connection had already
    /// been superseded.
    pub fn close(mut self) -> bool {
        self.released = true;
        self.service.release(&self.identity, &self.handle)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.service.release(&self.identity, &self.handle);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::auth::JwtTokenService;
    use crate::ws::messages::ClientCommand;

    const SECRET: &str = "chat_service_test_secret_long_enough_for_hs256";

    fn setup() -> (ChatService, JwtTokenService) {
        let Ok(tokens) = JwtTokenService::new(SECRET, 3600) else {
            panic!("token service should initialize");
        };
        let service = ChatService::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(GroupDirectory::new()),
            Arc::new(tokens.clone()),
            64,
        );
        (service, tokens)
    }

    fn connect(
        service: &ChatService,
        tokens: &JwtTokenService,
        name: &str,
    ) -> (ActiveSession, ConnectionReceiver) {
        let Ok(issued) = tokens.issue(name, &format!("{name}@example.com")) else {
            panic!("token should be issued");
        };
        let Ok(session) = service.authenticate(Some(&issued.token)) else {
            panic!("token should authenticate");
        };
        service.activate(session)
    }

    fn drain(rx: &mut ConnectionReceiver) -> Vec<OutboundEnvelope> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.frames.try_recv() {
            if let Ok(envelope) = OutboundEnvelope::decode(&frame) {
                out.push(envelope);
            }
        }
        out
    }

    fn send(session: &ActiveSession, command: ClientCommand) -> DispatchOutcome {
        let Ok(text) = command.into_envelope(session.identity()).encode() else {
            panic!("encode failed");
        };
        session.handle_text(&text)
    }

    #[test]
    fn missing_or_invalid_token_never_registers() {
        let (service, _) = setup();
        assert!(matches!(
            service.authenticate(None),
            Err(ChatError::AuthenticationFailure(_))
        ));
        assert!(matches!(
            service.authenticate(Some("")),
            Err(ChatError::AuthenticationFailure(_))
        ));
        assert!(service.authenticate(Some("garbage")).is_err());
        assert!(service.connections().is_empty());
    }

    #[test]
    fn activation_confirms_with_claims_and_announces() {
        let (service, tokens) = setup();
        let (_alice, mut alice_rx) = connect(&service, &tokens, "alice");

        let frames = drain(&mut alice_rx);
        let Some(confirmation) = frames.first() else {
            panic!("confirmation expected");
        };
        assert_eq!(confirmation.sender, "alice");
        let Some(data) = &confirmation.data else {
            panic!("confirmation should carry claims");
        };
        assert_eq!(data["contact"], "alice@example.com");
        assert!(data["useruniqueid"].is_string());

        let (_bob, _bob_rx) = connect(&service, &tokens, "bob");
        let alice_frames = drain(&mut alice_rx);
        assert!(alice_frames.iter().any(|f| f.message == "bob has joined the chat!"));
    }

    #[test]
    fn close_removes_identity_and_purges_groups() {
        let (service, tokens) = setup();
        let (alice, _alice_rx) = connect(&service, &tokens, "alice");
        let (bob, mut bob_rx) = connect(&service, &tokens, "bob");

        let solo = service.groups().create("solo", &Identity::from("alice"));
        let shared = service.groups().create("shared", &Identity::from("bob"));
        let _ = service.groups().join(shared, &Identity::from("alice"));
        drain(&mut bob_rx);

        assert!(alice.close());
        assert_eq!(service.connections().snapshot(), vec![Identity::from("bob")]);
        assert!(service.groups().get(solo).is_none());
        assert_eq!(
            service.groups().members_of(shared),
            Ok(HashSet::from([Identity::from("bob")]))
        );
        assert!(
            drain(&mut bob_rx)
                .iter()
                .any(|f| f.message == "alice has left the chat.")
        );
        drop(bob);
    }

    #[test]
    fn dropping_session_runs_cleanup() {
        let (service, tokens) = setup();
        let (alice, _rx) = connect(&service, &tokens, "alice");
        drop(alice);
        assert!(service.connections().is_empty());
    }

    #[test]
    fn reconnect_replaces_and_closes_previous_connection() {
        let (service, tokens) = setup();
        let (first, first_rx) = connect(&service, &tokens, "alice");
        let (second, _second_rx) = connect(&service, &tokens, "alice");

        let Some(request) = first_rx.close.borrow().clone() else {
            panic!("first connection should be asked to close");
        };
        assert_eq!(request.code, CLOSE_POLICY_VIOLATION);
        assert!(!first.handle().is_open());

        // The stale connection's cleanup must not evict its successor.
        assert!(!first.close());
        let Some(current) = service.connections().lookup(&Identity::from("alice")) else {
            panic!("successor should stay registered");
        };
        assert!(current.same_connection(second.handle()));
    }

    #[test]
    fn end_to_end_group_lifecycle() {
        let (service, tokens) = setup();
        let (alice, mut alice_rx) = connect(&service, &tokens, "alice");
        send(&alice, ClientCommand::Users);
        let users = drain(&mut alice_rx);
        assert!(users.iter().any(|f| f.data == Some(serde_json::json!(["alice"]))));

        let (bob, mut bob_rx) = connect(&service, &tokens, "bob");
        send(&bob, ClientCommand::Users);
        let users = drain(&mut bob_rx);
        assert!(users.iter().any(|f| f.data == Some(serde_json::json!(["alice", "bob"]))));

        drain(&mut alice_rx);
        send(
            &alice,
            ClientCommand::CreateGroup {
                name: "team".to_string(),
            },
        );
        let frames = drain(&mut alice_rx);
        let Some(raw_id) = frames
            .iter()
            .find_map(|f| f.message.split("-GroupId : ").nth(1))
        else {
            panic!("confirmation should carry the group id");
        };
        let Ok(group) = raw_id.parse::<crate::domain::GroupId>() else {
            panic!("group id should parse");
        };

        send(&bob, ClientCommand::JoinGroup { group });
        assert_eq!(
            service.groups().members_of(group),
            Ok(HashSet::from([Identity::from("alice"), Identity::from("bob")]))
        );

        send(&alice, ClientCommand::LeaveGroup { group });
        assert_eq!(
            service.groups().members_of(group),
            Ok(HashSet::from([Identity::from("bob")]))
        );

        send(&bob, ClientCommand::LeaveGroup { group });
        assert!(matches!(
            service.groups().members_of(group),
            Err(ChatError::GroupNotFound(_))
        ));
    }

    #[test]
    fn superseded_session_cannot_route_after_successor_leaves() {
        let (service, tokens) = setup();
        let (first, mut first_rx) = connect(&service, &tokens, "alice");
        let (second, _second_rx) = connect(&service, &tokens, "alice");
        drain(&mut first_rx);
        assert!(second.close());

        let outcome = send(
            &first,
            ClientCommand::CreateGroup {
                name: "ghost".to_string(),
            },
        );
        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(ChatError::SessionClosed("alice".to_string()))
        );
        assert!(drain(&mut first_rx).is_empty());

        assert!(!first.close());
        assert!(service.connections().is_empty());
        assert!(service.groups().is_empty());
    }

    #[test]
    fn confirmation_is_the_first_frame() {
        let (service, tokens) = setup();
        let (_alice, mut alice_rx) = connect(&service, &tokens, "alice");
        let frames = drain(&mut alice_rx);
        let Some(first) = frames.first() else {
            panic!("confirmation expected");
        };
        assert_eq!(first.message, "alice Connected Successfully.");
        assert_eq!(first.msg_type, OutboundKind::System);
    }
}
