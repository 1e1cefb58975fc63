//! Message router: the per-envelope dispatch table.
//!
//! [`MessageRouter`] is stateless between calls. Each inbound envelope from an
//! authenticated identity is decoded, matched against the seven
//! [`ClientCommand`] variants, and turned into zero or more outbound
//! envelopes delivered through [`ConnectionRegistry`] / [`GroupDirectory`]
//! lookups.
//!
//! Delivery is at-most-once and best-effort: closed connections and full
//! queues are skipped, never retried. Every failure is reported to the
//! originating connection as an `error` envelope; none of them ends the
//! session.

use std::sync::Arc;

use crate::domain::{
    ConnectionHandle, ConnectionRegistry, GroupDirectory, GroupId, Identity, JoinOutcome,
};
use crate::error::ChatError;
use crate::ws::messages::{
    ClientCommand, InboundEnvelope, MessageKind, OutboundEnvelope, OutboundKind, SYSTEM_SENDER,
};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command was handled; `delivered` frames were enqueued in total,
    /// replies to the sender included.
    Handled {
        /// Kind of the handled command.
        kind: MessageKind,
        /// Number of frames enqueued.
        delivered: usize,
    },
    /// The frame was rejected and an error envelope was sent back.
    Rejected(ChatError),
}

/// Routes decoded envelopes to their targets.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    connections: Arc<ConnectionRegistry>,
    groups: Arc<GroupDirectory>,
}

impl MessageRouter {
    /// Creates a router over the shared stores.
    #[must_use]
    pub fn new(connections: Arc<ConnectionRegistry>, groups: Arc<GroupDirectory>) -> Self {
        Self {
            connections,
            groups,
        }
    }

    /// Decodes and routes one text frame from `sender`.
    ///
    /// `origin` is the connection the frame arrived on. Replies and error
    /// envelopes go there, not to whatever the registry currently maps
    /// `sender` to.
    ///
    /// Frames from a connection that is closing, or that the registry no
    /// longer maps `sender` to, are dropped unrouted with
    /// [`ChatError::SessionClosed`]; no error envelope is sent.
    pub fn dispatch(&self, sender: &Identity, origin: &ConnectionHandle, text: &str) -> DispatchOutcome {
        if !self.is_current(sender, origin) {
            tracing::debug!(
                identity = %sender,
                connection_id = %origin.id(),
                "dropping frame from superseded connection"
            );
            return DispatchOutcome::Rejected(ChatError::SessionClosed(sender.to_string()));
        }

        let command = InboundEnvelope::decode(text).and_then(|envelope| {
            if envelope.sender != sender.as_str() {
                tracing::debug!(
                    identity = %sender,
                    declared = %envelope.sender,
                    "ignoring declared sender"
                );
            }
            envelope.command()
        });

        let result = command.and_then(|command| {
            let kind = command.kind();
            self.route(sender, origin, command)
                .map(|delivered| (kind, delivered))
        });

        match result {
            Ok((kind, delivered)) => {
                tracing::debug!(identity = %sender, %kind, delivered, "envelope routed");
                DispatchOutcome::Handled { kind, delivered }
            }
            Err(error) => {
                tracing::debug!(identity = %sender, %error, "envelope rejected");
                self.reject(origin, &error);
                DispatchOutcome::Rejected(error)
            }
        }
    }

    /// Executes one command, returning the number of frames enqueued.
    ///
    /// # Errors
    ///
    /// Returns the [`ChatError`] the sender should be told about. Nothing is
    /// sent to `origin` on error; [`Self::dispatch`] does that.
    pub fn route(
        &self,
        sender: &Identity,
        origin: &ConnectionHandle,
        command: ClientCommand,
    ) -> Result<usize, ChatError> {
        match command {
            ClientCommand::Private { receiver, content } => {
                self.send_private(sender, &receiver, content)
            }
            ClientCommand::CreateGroup { name } => self.create_group(sender, origin, &name),
            ClientCommand::JoinGroup { group } => self.join_group(sender, origin, group),
            ClientCommand::LeaveGroup { group } => self.leave_group(sender, origin, group),
            ClientCommand::Group { group, content } => self.send_group(sender, group, content),
            ClientCommand::Broadcast { content } => Ok(self.broadcast(
                &OutboundEnvelope::new(OutboundKind::Broadcast, sender.as_str(), content),
                None,
            )),
            ClientCommand::Users => Ok(self.active_users(origin)),
        }
    }

    /// Returns `true` if `origin` is open and is the connection the registry
    /// maps `sender` to.
    #[must_use]
    pub fn is_current(&self, sender: &Identity, origin: &ConnectionHandle) -> bool {
        origin.is_open()
            && self
                .connections
                .lookup(sender)
                .is_some_and(|current| current.same_connection(origin))
    }

    /// Sends an `error` envelope describing `error` to `origin`.
    pub fn reject(&self, origin: &ConnectionHandle, error: &ChatError) -> bool {
        deliver(origin, &OutboundEnvelope::error(error))
    }

    /// Sends `envelope` to every registered connection except `except`.
    ///
    /// Returns the number of connections it was enqueued on.
    pub fn broadcast(&self, envelope: &OutboundEnvelope, except: Option<&Identity>) -> usize {
        let targets = self
            .connections
            .handles()
            .into_iter()
            .filter(|(identity, _)| Some(identity) != except)
            .map(|(_, handle)| handle);
        fan_out(targets, envelope)
    }

    fn send_private(
        &self,
        sender: &Identity,
        receiver: &Identity,
        content: String,
    ) -> Result<usize, ChatError> {
        let envelope = OutboundEnvelope::new(OutboundKind::Private, sender.as_str(), content);
        match self.connections.lookup(receiver) {
            Some(handle) if deliver(&handle, &envelope) => Ok(1),
            _ => Err(ChatError::ReceiverUnreachable(receiver.to_string())),
        }
    }

    fn create_group(
        &self,
        sender: &Identity,
        origin: &ConnectionHandle,
        name: &str,
    ) -> Result<usize, ChatError> {
        let group_id = self.groups.create(name, sender);
        self.undo_if_departed(sender, group_id)?;
        tracing::info!(identity = %sender, %group_id, name, "group created");
        let reply = OutboundEnvelope::new(
            OutboundKind::System,
            sender.as_str(),
            format!("Group '{name}' created successfully. -GroupId : {group_id}"),
        );
        Ok(usize::from(deliver(origin, &reply)))
    }

    fn join_group(
        &self,
        sender: &Identity,
        origin: &ConnectionHandle,
        group: GroupId,
    ) -> Result<usize, ChatError> {
        let outcome = self.groups.join(group, sender)?;
        if outcome == JoinOutcome::Joined {
            self.undo_if_departed(sender, group)?;
        }
        let name = self
            .groups
            .get(group)
            .map_or_else(|| group.to_string(), |entry| entry.name);

        let message = match outcome {
            JoinOutcome::Joined => format!("You have joined the group '{name}'!"),
            JoinOutcome::AlreadyMember => format!("You are already in the group '{name}'."),
        };
        let reply = OutboundEnvelope::new(OutboundKind::System, sender.as_str(), message);
        let mut delivered = usize::from(deliver(origin, &reply));

        if outcome == JoinOutcome::Joined {
            tracing::info!(identity = %sender, group_id = %group, "joined group");
            let notice = OutboundEnvelope::new(
                OutboundKind::Group,
                SYSTEM_SENDER,
                format!("{sender} has joined the group '{name}'."),
            );
            delivered += self.fan_out_to_members(group, &notice, Some(sender));
        }
        Ok(delivered)
    }

    fn leave_group(
        &self,
        sender: &Identity,
        origin: &ConnectionHandle,
        group: GroupId,
    ) -> Result<usize, ChatError> {
        let outcome = self.groups.leave(group, sender)?;
        tracing::info!(
            identity = %sender,
            group_id = %group,
            dissolved = outcome.dissolved,
            "left group"
        );

        let reply = OutboundEnvelope::new(
            OutboundKind::System,
            sender.as_str(),
            format!("You have left the group '{}'!", outcome.group_name),
        );
        let mut delivered = usize::from(deliver(origin, &reply));

        let notice = OutboundEnvelope::new(
            OutboundKind::Group,
            SYSTEM_SENDER,
            format!("{sender} has left the group '{}'.", outcome.group_name),
        );
        let targets = outcome
            .remaining
            .iter()
            .filter_map(|member| self.connections.lookup(member));
        delivered += fan_out(targets, &notice);
        Ok(delivered)
    }

    fn send_group(
        &self,
        sender: &Identity,
        group: GroupId,
        content: String,
    ) -> Result<usize, ChatError> {
        let members = self.groups.members_of(group)?;
        if !members.contains(sender) {
            return Err(ChatError::NotAGroupMember(group.to_string()));
        }
        let envelope = OutboundEnvelope::new(OutboundKind::Group, sender.as_str(), content);
        let targets = members
            .iter()
            .filter_map(|member| self.connections.lookup(member));
        Ok(fan_out(targets, &envelope))
    }

    fn active_users(&self, origin: &ConnectionHandle) -> usize {
        let users = self.connections.snapshot();
        let listing = serde_json::to_string(&users).unwrap_or_default();
        let envelope = OutboundEnvelope::new(
            OutboundKind::ActiveUsers,
            SYSTEM_SENDER,
            listing,
        )
        .with_data(serde_json::json!(users));
        usize::from(deliver(origin, &envelope))
    }

    /// Reverts a membership just added for `sender` if its session was
    /// released meanwhile.
    ///
    /// Release unregisters before it purges, so either the purge sees the new
    /// membership or this check sees the identity gone.
    fn undo_if_departed(&self, sender: &Identity, group: GroupId) -> Result<(), ChatError> {
        if self.connections.contains(sender) {
            return Ok(());
        }
        let _ = self.groups.leave(group, sender);
        tracing::debug!(identity = %sender, group_id = %group, "reverted membership of departed identity");
        Err(ChatError::SessionClosed(sender.to_string()))
    }

    fn fan_out_to_members(
        &self,
        group: GroupId,
        envelope: &OutboundEnvelope,
        except: Option<&Identity>,
    ) -> usize {
        let Ok(members) = self.groups.members_of(group) else {
            return 0;
        };
        let targets = members
            .iter()
            .filter(|member| Some(*member) != except)
            .filter_map(|member| self.connections.lookup(member));
        fan_out(targets, envelope)
    }
}

/// Encodes `envelope` and enqueues it on `handle`.
fn deliver(handle: &ConnectionHandle, envelope: &OutboundEnvelope) -> bool {
    match envelope.encode() {
        Ok(frame) => handle.send_text(frame),
        Err(error) => {
            tracing::error!(%error, "failed to encode outbound envelope");
            false
        }
    }
}

/// Encodes `envelope` once and enqueues it on every open target.
fn fan_out(targets: impl Iterator<Item = ConnectionHandle>, envelope: &OutboundEnvelope) -> usize {
    let frame = match envelope.encode() {
        Ok(frame) => frame,
        Err(error) => {
            tracing::error!(%error, "failed to encode outbound envelope");
            return 0;
        }
    };
    targets
        .filter(ConnectionHandle::is_open)
        .filter(|handle| handle.send_text(frame.clone()))
        .count()
}
