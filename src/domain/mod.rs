//! Domain layer: identities, connection handles, and the two shared stores.
//!
//! [`ConnectionRegistry`] tracks which identity is bound to which live
//! connection; [`GroupDirectory`] tracks group membership. Both are owned by
//! the server context and shared by reference with every session task.

pub mod connection;
pub mod connection_registry;
pub mod group_directory;
pub mod group_id;
pub mod identity;

pub use connection::{
    CLOSE_POLICY_VIOLATION, CloseRequest, ConnectionHandle, ConnectionId, ConnectionReceiver,
};
pub use connection_registry::ConnectionRegistry;
pub use group_directory::{GroupDirectory, GroupEntry, JoinOutcome, LeaveOutcome, PurgeReport};
pub use group_id::GroupId;
pub use identity::Identity;
