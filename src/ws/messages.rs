//! WebSocket envelope codec.
//!
//! Clients send [`InboundEnvelope`]s:
//! `{ "type", "sender", "receiver"?, "group"?, "content"? }`.
//! The server answers with [`OutboundEnvelope`]s:
//! `{ "type", "sender", "message", "data"?, "timestamp" }`.
//!
//! Decoding is two-step: [`InboundEnvelope::decode`] checks JSON shape, and
//! [`InboundEnvelope::command`] turns the loosely typed record into a
//! [`ClientCommand`], the exhaustive set of operations the router handles.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, Identity};
use crate::error::ChatError;

/// Sender name used on server-originated envelopes.
pub const SYSTEM_SENDER: &str = "system";

/// Inbound wire envelope, as sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Message type discriminator (see [`MessageKind`]).
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Client-declared sender. Informational only.
    pub sender: String,
    /// Target identity for `private` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Group id, or the display name for `create_group`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The seven inbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Direct message to one identity.
    Private,
    /// Create a group with the sender as its only member.
    CreateGroup,
    /// Join an existing group.
    JoinGroup,
    /// Leave a group.
    LeaveGroup,
    /// Message to every member of a group.
    Group,
    /// Message to every connected identity.
    Broadcast,
    /// List connected identities.
    Users,
}

impl MessageKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::CreateGroup => "create_group",
            Self::JoinGroup => "join_group",
            Self::LeaveGroup => "leave_group",
            Self::Group => "group",
            Self::Broadcast => "broadcast",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ChatError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "create_group" => Ok(Self::CreateGroup),
            "join_group" => Ok(Self::JoinGroup),
            "leave_group" => Ok(Self::LeaveGroup),
            "group" => Ok(Self::Group),
            "broadcast" => Ok(Self::Broadcast),
            "users" => Ok(Self::Users),
            _ => Err(ChatError::UnknownMessageType(s.to_string())),
        }
    }
}

/// A fully validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Deliver `content` to `receiver` only.
    Private {
        /// Target identity.
        receiver: Identity,
        /// Message body.
        content: String,
    },
    /// Create a group named `name`.
    CreateGroup {
        /// Display name.
        name: String,
    },
    /// Join the group.
    JoinGroup {
        /// Target group.
        group: GroupId,
    },
    /// Leave the group.
    LeaveGroup {
        /// Target group.
        group: GroupId,
    },
    /// Deliver `content` to every open member of the group.
    Group {
        /// Target group.
        group: GroupId,
        /// Message body.
        content: String,
    },
    /// Deliver `content` to every connected identity.
    Broadcast {
        /// Message body.
        content: String,
    },
    /// Ask for the list of connected identities.
    Users,
}

impl ClientCommand {
    /// Returns the kind of this command.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Private { .. } => MessageKind::Private,
            Self::CreateGroup { .. } => MessageKind::CreateGroup,
            Self::JoinGroup { .. } => MessageKind::JoinGroup,
            Self::LeaveGroup { .. } => MessageKind::LeaveGroup,
            Self::Group { .. } => MessageKind::Group,
            Self::Broadcast { .. } => MessageKind::Broadcast,
            Self::Users => MessageKind::Users,
        }
    }

    /// Builds the wire envelope a client would send for this command.
    #[must_use]
    pub fn into_envelope(self, sender: &Identity) -> InboundEnvelope {
        let mut envelope = InboundEnvelope {
            msg_type: self.kind().as_str().to_string(),
            sender: sender.to_string(),
            receiver: None,
            group: None,
            content: None,
        };
        match self {
            Self::Private { receiver, content } => {
                envelope.receiver = Some(receiver.into_inner());
                envelope.content = Some(content);
            }
            Self::CreateGroup { name } => envelope.group = Some(name),
            Self::JoinGroup { group } | Self::LeaveGroup { group } => {
                envelope.group = Some(group.to_string());
            }
            Self::Group { group, content } => {
                envelope.group = Some(group.to_string());
                envelope.content = Some(content);
            }
            Self::Broadcast { content } => envelope.content = Some(content),
            Self::Users => {}
        }
        envelope
    }
}

impl InboundEnvelope {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::MalformedEnvelope`] for invalid JSON or a missing
    /// `type`/`sender` field.
    pub fn decode(text: &str) -> Result<Self, ChatError> {
        serde_json::from_str(text).map_err(|e| ChatError::MalformedEnvelope(e.to_string()))
    }

    /// Serializes the envelope to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Internal`] if serialization fails.
    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::Internal(e.to_string()))
    }

    /// Validates the type-dependent fields and yields a [`ClientCommand`].
    ///
    /// # Errors
    ///
    /// - [`ChatError::UnknownMessageType`] for an unrecognized `type`.
    /// - [`ChatError::MalformedEnvelope`] when a field the type needs is absent.
    /// - [`ChatError::GroupNotFound`] when `group` is not a well-formed group id.
    pub fn command(&self) -> Result<ClientCommand, ChatError> {
        let kind: MessageKind = self.msg_type.parse()?;
        let command = match kind {
            MessageKind::Private => ClientCommand::Private {
                receiver: Identity::new(self.require(kind, "receiver", &self.receiver)?),
                content: self.require(kind, "content", &self.content)?,
            },
            MessageKind::CreateGroup => {
                let name = self.require(kind, "group", &self.group)?;
                if name.trim().is_empty() {
                    return Err(ChatError::MalformedEnvelope(
                        "group name must not be empty".to_string(),
                    ));
                }
                ClientCommand::CreateGroup { name }
            }
            MessageKind::JoinGroup => ClientCommand::JoinGroup {
                group: self.group_id(kind)?,
            },
            MessageKind::LeaveGroup => ClientCommand::LeaveGroup {
                group: self.group_id(kind)?,
            },
            MessageKind::Group => ClientCommand::Group {
                group: self.group_id(kind)?,
                content: self.require(kind, "content", &self.content)?,
            },
            MessageKind::Broadcast => ClientCommand::Broadcast {
                content: self.require(kind, "content", &self.content)?,
            },
            MessageKind::Users => ClientCommand::Users,
        };
        Ok(command)
    }

    fn require(
        &self,
        kind: MessageKind,
        field: &str,
        value: &Option<String>,
    ) -> Result<String, ChatError> {
        value
            .clone()
            .ok_or_else(|| ChatError::MalformedEnvelope(format!("`{kind}` requires `{field}`")))
    }

    fn group_id(&self, kind: MessageKind) -> Result<GroupId, ChatError> {
        let raw = self.require(kind, "group", &self.group)?;
        raw.parse().map_err(|_| ChatError::GroupNotFound(raw))
    }
}

/// Discriminator for server-originated envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    /// Confirmations and presence notices.
    System,
    /// Direct message.
    Private,
    /// Group message or group notice.
    Group,
    /// Message to everyone.
    Broadcast,
    /// Reply to a `users` query; carries `data`.
    ActiveUsers,
    /// Failure report addressed to the originating connection.
    Error,
}

/// Outbound wire envelope, as written to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: OutboundKind,
    /// Originating identity, or [`SYSTEM_SENDER`].
    pub sender: String,
    /// Human-readable body.
    pub message: String,
    /// Structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// UTC time the envelope was built.
    #[serde(with = "utc_millis")]
    pub timestamp: DateTime<Utc>,
}

impl OutboundEnvelope {
    /// Creates an envelope stamped with the current time.
    #[must_use]
    pub fn new(msg_type: OutboundKind, sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            msg_type,
            sender: sender.into(),
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a `system` envelope from [`SYSTEM_SENDER`].
    #[must_use]
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(OutboundKind::System, SYSTEM_SENDER, message)
    }

    /// Creates an `error` envelope describing `error`.
    #[must_use]
    pub fn error(error: &ChatError) -> Self {
        Self::new(OutboundKind::Error, SYSTEM_SENDER, error.to_string())
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serializes the envelope to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Internal`] if serialization fails.
    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::Internal(e.to_string()))
    }

    /// Parses an outbound envelope. Used by clients and tests.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::MalformedEnvelope`] if `text` is not a valid
    /// outbound envelope.
    pub fn decode(text: &str) -> Result<Self, ChatError> {
        serde_json::from_str(text).map_err(|e| ChatError::MalformedEnvelope(e.to_string()))
    }
}

/// Fixed `YYYY-MM-DDTHH:MM:SS.mmmZ` timestamps.
mod utc_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
