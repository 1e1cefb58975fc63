//! Concurrent group membership directory.
//!
//! [`GroupDirectory`] stores every live group together with its member set,
//! and keeps a reverse index from [`Identity`] to the groups it belongs to so
//! that disconnect cleanup costs time proportional to that identity's own
//! memberships rather than to the total number of groups.
//!
//! A group exists exactly as long as its member set is non-empty: the leave
//! or purge that removes the last member deletes the group under the same
//! per-key lock.

use std::collections::HashSet;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{GroupId, Identity};
use crate::error::ChatError;

/// A named, dynamically created set of member identities.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    /// Display name chosen by the creator. Not unique.
    pub name: String,
    /// Identity that created the group.
    pub creator: Identity,
    /// Current members. Never empty while the entry exists.
    pub members: HashSet<Identity>,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The identity was added to the group.
    Joined,
    /// The identity was already a member; nothing changed.
    AlreadyMember,
}

/// Result of a successful leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Display name of the group that was left.
    pub group_name: String,
    /// Members still in the group after the leave.
    pub remaining: HashSet<Identity>,
    /// `true` if the group became empty and was deleted.
    pub dissolved: bool,
}

/// Groups touched by [`GroupDirectory::purge_identity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Groups the identity was removed from.
    pub left: Vec<GroupId>,
    /// Subset of `left` that became empty and was deleted.
    pub dissolved: Vec<GroupId>,
}

/// Group id → group map plus identity → group-set reverse index.
///
/// # Concurrency
///
/// - Membership changes to one group are serialized by that group's shard lock.
/// - No operation holds a lock on both maps at once.
/// - The reverse index is updated after the group itself; a reader may
///   briefly observe one without the other.
#[derive(Debug, Default)]
pub struct GroupDirectory {
    groups: DashMap<GroupId, GroupEntry>,
    memberships: DashMap<Identity, HashSet<GroupId>>,
}

impl GroupDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group named `name` whose only member is `creator`.
    pub fn create(&self, name: impl Into<String>, creator: &Identity) -> GroupId {
        let group_id = GroupId::new();
        let entry = GroupEntry {
            name: name.into(),
            creator: creator.clone(),
            members: HashSet::from([creator.clone()]),
        };
        self.groups.insert(group_id, entry);
        self.remember(creator, group_id);
        tracing::debug!(%group_id, creator = %creator, "group created");
        group_id
    }

    /// Adds `identity` to the group.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::GroupNotFound`] if the group does not exist; the
    /// directory is left unchanged.
    pub fn join(&self, group_id: GroupId, identity: &Identity) -> Result<JoinOutcome, ChatError> {
        let inserted = {
            let mut group = self
                .groups
                .get_mut(&group_id)
                .ok_or_else(|| ChatError::GroupNotFound(group_id.to_string()))?;
            group.members.insert(identity.clone())
        };
        if !inserted {
            return Ok(JoinOutcome::AlreadyMember);
        }
        self.remember(identity, group_id);
        Ok(JoinOutcome::Joined)
    }

    /// Removes `identity` from the group, deleting the group if it empties.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::GroupNotFound`] if the group does not exist, or
    /// [`ChatError::NotAGroupMember`] if `identity` is not one of its members.
    pub fn leave(&self, group_id: GroupId, identity: &Identity) -> Result<LeaveOutcome, ChatError> {
        let outcome = match self.groups.entry(group_id) {
            Entry::Vacant(_) => return Err(ChatError::GroupNotFound(group_id.to_string())),
            Entry::Occupied(mut entry) => {
                if !entry.get_mut().members.remove(identity) {
                    return Err(ChatError::NotAGroupMember(group_id.to_string()));
                }
                let group_name = entry.get().name.clone();
                if entry.get().members.is_empty() {
                    entry.remove();
                    LeaveOutcome {
                        group_name,
                        remaining: HashSet::new(),
                        dissolved: true,
                    }
                } else {
                    LeaveOutcome {
                        group_name,
                        remaining: entry.get().members.clone(),
                        dissolved: false,
                    }
                }
            }
        };
        self.forget(identity, group_id);
        if outcome.dissolved {
            tracing::debug!(%group_id, "group dissolved");
        }
        Ok(outcome)
    }

    /// Returns a snapshot of the group's members.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::GroupNotFound`] if the group does not exist.
    pub fn members_of(&self, group_id: GroupId) -> Result<HashSet<Identity>, ChatError> {
        self.groups
            .get(&group_id)
            .map(|group| group.members.clone())
            .ok_or_else(|| ChatError::GroupNotFound(group_id.to_string()))
    }

    /// Returns a copy of the whole group entry.
    #[must_use]
    pub fn get(&self, group_id: GroupId) -> Option<GroupEntry> {
        self.groups.get(&group_id).map(|group| group.value().clone())
    }

    /// Removes `identity` from every group it belongs to.
    ///
    /// Groups left empty are deleted. Cost is proportional to the identity's
    /// own membership count.
    pub fn purge_identity(&self, identity: &Identity) -> PurgeReport {
        let Some((_, group_ids)) = self.memberships.remove(identity) else {
            return PurgeReport::default();
        };

        let mut report = PurgeReport::default();
        for group_id in group_ids {
            let Entry::Occupied(mut entry) = self.groups.entry(group_id) else {
                continue;
            };
            if !entry.get_mut().members.remove(identity) {
                continue;
            }
            report.left.push(group_id);
            if entry.get().members.is_empty() {
                entry.remove();
                report.dissolved.push(group_id);
            }
        }
        report
    }

    /// Returns the number of live groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if there are no live groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn remember(&self, identity: &Identity, group_id: GroupId) {
        self.memberships
            .entry(identity.clone())
            .or_default()
            .insert(group_id);
    }

    fn forget(&self, identity: &Identity, group_id: GroupId) {
        if let Some(mut groups) = self.memberships.get_mut(identity) {
            groups.remove(&group_id);
        }
        self.memberships
            .remove_if(identity, |_, groups| groups.is_empty());
    }
}
