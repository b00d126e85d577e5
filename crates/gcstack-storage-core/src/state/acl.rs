//! Access-control state: ACL lists, IAM policy, notification configs.
//!
//! An [`AclList`] is an entity-keyed map layered under an ordered-list view:
//! insert-or-update is O(1) while list responses keep deterministic insertion
//! order. The same layout backs bucket ACLs, default-object ACLs, and
//! per-object ACLs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

// ---------------------------------------------------------------------------
// AclList
// ---------------------------------------------------------------------------

/// A single access-control entry: an entity string paired with a role.
///
/// Entities follow the GCS grammar (`user-<email>`, `group-<email>`,
/// `allUsers`, `project-owners-<id>`, ...); the emulator treats them as
/// opaque keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclEntry {
    /// The entity the role is granted to.
    pub entity: String,
    /// The granted role (`OWNER`, `WRITER`, `READER`).
    pub role: String,
}

/// An ordered access-control list with unique entities.
///
/// Re-inserting an existing entity replaces its role in place; the entry
/// keeps its original list position.
#[derive(Debug, Clone, Default)]
pub struct AclList {
    entries: Vec<AclEntry>,
    index: HashMap<String, usize>,
}

impl AclList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry or update the role of an existing entity.
    ///
    /// Returns the resulting entry and whether it was newly created.
    pub fn upsert(&mut self, entity: impl Into<String>, role: impl Into<String>) -> (AclEntry, bool) {
        let entity = entity.into();
        let role = role.into();
        if let Some(&pos) = self.index.get(&entity) {
            self.entries[pos].role = role;
            (self.entries[pos].clone(), false)
        } else {
            let entry = AclEntry {
                entity: entity.clone(),
                role,
            };
            self.index.insert(entity, self.entries.len());
            self.entries.push(entry.clone());
            (entry, true)
        }
    }

    /// Look up the entry for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AclEntryNotFound`] if the entity is absent.
    pub fn get(&self, entity: &str) -> StorageResult<&AclEntry> {
        self.index
            .get(entity)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(|| StorageError::AclEntryNotFound {
                entity: entity.to_owned(),
            })
    }

    /// Remove the entry for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AclEntryNotFound`] if the entity is absent —
    /// deleting a never-added entity is an error, not a silent no-op.
    pub fn delete(&mut self, entity: &str) -> StorageResult<AclEntry> {
        let pos = self
            .index
            .remove(entity)
            .ok_or_else(|| StorageError::AclEntryNotFound {
                entity: entity.to_owned(),
            })?;
        let removed = self.entries.remove(pos);
        // Positions after the removed entry shift down by one.
        for (i, entry) in self.entries.iter().enumerate().skip(pos) {
            self.index.insert(entry.entity.clone(), i);
        }
        Ok(removed)
    }

    /// The entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<AclEntry> for AclList {
    fn from_iter<T: IntoIterator<Item = AclEntry>>(iter: T) -> Self {
        let mut list = Self::new();
        for entry in iter {
            list.upsert(entry.entity, entry.role);
        }
        list
    }
}

// ---------------------------------------------------------------------------
// IAM policy
// ---------------------------------------------------------------------------

/// One role-to-members binding within an IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamBinding {
    /// The granted role (e.g. `roles/storage.objectViewer`).
    pub role: String,
    /// The members the role is granted to.
    pub members: Vec<String>,
}

/// A bucket IAM policy.
///
/// The emulator stores and returns policies verbatim and never enforces
/// them; `testIamPermissions` echoes the requested permissions back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicy {
    /// The role bindings, replaced wholesale on every set call.
    pub bindings: Vec<IamBinding>,
    /// Policy format version.
    #[serde(default)]
    pub version: i32,
}

// ---------------------------------------------------------------------------
// Notification configs
// ---------------------------------------------------------------------------

/// A bucket notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    /// Server-assigned numeric id, unique within the bucket.
    pub id: String,
    /// The Pub/Sub topic notifications are sent to.
    pub topic: String,
    /// The payload format (`JSON_API_V1` or `NONE`).
    pub payload_format: String,
    /// Event types this config fires on; empty means all.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Custom attributes attached to every notification.
    #[serde(default)]
    pub custom_attributes: HashMap<String, String>,
}

/// The id-keyed, insertion-ordered notification list of a bucket.
#[derive(Debug, Default)]
pub struct NotificationList {
    configs: Vec<NotificationConfig>,
    next_id: u64,
}

impl NotificationList {
    /// Insert a config, assigning it the next id. Returns the stored config.
    pub fn insert(
        &mut self,
        topic: String,
        payload_format: String,
        event_types: Vec<String>,
        custom_attributes: HashMap<String, String>,
    ) -> NotificationConfig {
        self.next_id += 1;
        let config = NotificationConfig {
            id: self.next_id.to_string(),
            topic,
            payload_format,
            event_types,
            custom_attributes,
        };
        self.configs.push(config.clone());
        config
    }

    /// Look up a config by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotificationNotFound`] if no config has that id.
    pub fn get(&self, id: &str) -> StorageResult<&NotificationConfig> {
        self.configs
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StorageError::NotificationNotFound { id: id.to_owned() })
    }

    /// Remove a config by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotificationNotFound`] if no config has that id.
    pub fn delete(&mut self, id: &str) -> StorageResult<NotificationConfig> {
        let pos = self
            .configs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StorageError::NotificationNotFound { id: id.to_owned() })?;
        Ok(self.configs.remove(pos))
    }

    /// The configs in insertion order.
    #[must_use]
    pub fn configs(&self) -> &[NotificationConfig] {
        &self.configs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
