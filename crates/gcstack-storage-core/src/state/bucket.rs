//! Bucket entity and its interior-mutable state.
//!
//! Each [`Bucket`] guards all of its mutable state (metageneration, ACLs,
//! IAM policy, notifications, retention policy, object index) behind a single
//! `parking_lot::RwLock`. Holding the write guard is the per-bucket critical
//! section: precondition checks, metageneration bumps and generation
//! allocation all happen under it, so concurrent mutations of the same key
//! serialize there.

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::checksums::etag_for;
use crate::error::{StorageError, StorageResult};
use crate::state::acl::{AclList, IamPolicy, NotificationList};
use crate::state::keystore::ObjectIndex;
use crate::state::object::DEFAULT_STORAGE_CLASS;

/// Default location reported for all buckets.
pub const DEFAULT_LOCATION: &str = "US-CENTRAL1";

/// A bucket retention policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Minimum object retention, in seconds.
    pub retention_period: i64,
    /// When this policy took effect.
    pub effective_time: DateTime<Utc>,
    /// Once locked, the policy can never be removed or shortened.
    pub is_locked: bool,
}

/// Caller-supplied template for a new bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketSpec {
    /// The owning project identifier.
    pub project: String,
    /// Whether object versioning starts enabled.
    pub versioning_enabled: bool,
    /// Initial bucket ACL.
    pub acl: AclList,
    /// Initial default-object ACL, copied onto newly created objects.
    pub default_object_acl: AclList,
    /// Initial retention period in seconds, if any.
    pub retention_period: Option<i64>,
    /// Bucket location; defaults to [`DEFAULT_LOCATION`].
    pub location: Option<String>,
}

/// A metadata-only bucket update. `None` fields are left unchanged.
///
/// `retention_period` uses two option layers: the outer one is "touch this
/// field at all", the inner one is "the new period, or clear the policy".
#[derive(Debug, Clone, Default)]
pub struct BucketPatch {
    /// Replacement versioning flag.
    pub versioning_enabled: Option<bool>,
    /// Replacement retention period (`Some(None)` removes the policy).
    pub retention_period: Option<Option<i64>>,
}

/// Everything about a bucket that can change after creation.
#[derive(Debug)]
pub struct BucketState {
    /// The bucket name, mirrored here so mutators can build errors.
    name: String,
    /// The owning project identifier.
    pub project: String,
    /// Bucket location string, fixed at creation.
    pub location: String,
    /// Storage class string, fixed at creation.
    pub storage_class: String,
    /// Metadata generation; starts at 1, +1 on every metadata mutation.
    pub metageneration: i64,
    /// Whether object overwrites retain prior generations.
    pub versioning_enabled: bool,
    /// The bucket's object index; owns the generation counter.
    pub objects: ObjectIndex,
    /// Bucket-level ACL.
    pub acl: AclList,
    /// Default ACL for newly created objects.
    pub default_object_acl: AclList,
    /// The bucket IAM policy, stored verbatim.
    pub iam_policy: IamPolicy,
    /// Notification configurations.
    pub notifications: NotificationList,
    /// Optional retention policy.
    pub retention_policy: Option<RetentionPolicy>,
    /// Creation timestamp.
    pub time_created: DateTime<Utc>,
    /// Last metadata modification timestamp.
    pub updated: DateTime<Utc>,
}

impl BucketState {
    /// The bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque entity tag for the current metadata revision.
    #[must_use]
    pub fn etag(&self) -> String {
        etag_for(0, self.metageneration)
    }

    /// Record a metadata mutation: +1 metageneration, fresh `updated`.
    pub fn bump_metageneration(&mut self) {
        self.metageneration += 1;
        self.updated = Utc::now();
    }

    /// Apply a metadata patch and bump the metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RetentionPolicyLocked`] if the patch would
    /// remove or shorten a locked retention policy; nothing changes then.
    pub fn apply_patch(&mut self, patch: BucketPatch) -> StorageResult<()> {
        if let Some(period) = patch.retention_period {
            self.set_retention_period(period)?;
        }
        if let Some(enabled) = patch.versioning_enabled {
            self.versioning_enabled = enabled;
        }
        self.bump_metageneration();
        Ok(())
    }

    /// Replace or clear the retention policy.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RetentionPolicyLocked`] if the current policy
    /// is locked and the change would remove or shorten it.
    pub fn set_retention_period(&mut self, period: Option<i64>) -> StorageResult<()> {
        if let Some(current) = &self.retention_policy {
            if current.is_locked && period.is_none_or(|p| p < current.retention_period) {
                return Err(StorageError::RetentionPolicyLocked {
                    bucket: self.name.clone(),
                });
            }
        }
        self.retention_policy = period.map(|retention_period| RetentionPolicy {
            retention_period,
            effective_time: Utc::now(),
            is_locked: self
                .retention_policy
                .as_ref()
                .is_some_and(|p| p.is_locked),
        });
        Ok(())
    }

    /// Permanently lock the retention policy.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if the bucket has no
    /// retention policy to lock.
    pub fn lock_retention_policy(&mut self) -> StorageResult<()> {
        let Some(policy) = self.retention_policy.as_mut() else {
            return Err(StorageError::invalid(format!(
                "bucket {} has no retention policy to lock",
                self.name
            )));
        };
        policy.is_locked = true;
        self.bump_metageneration();
        Ok(())
    }
}

/// A stored bucket: an immutable name plus lock-guarded state.
#[derive(Debug)]
pub struct Bucket {
    /// The bucket name, unique within the emulator.
    pub name: String,
    state: RwLock<BucketState>,
}

impl Bucket {
    /// Create a bucket from a spec. Metageneration starts at 1.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: BucketSpec) -> Self {
        let name = name.into();
        let now = Utc::now();
        let retention_policy = spec.retention_period.map(|retention_period| RetentionPolicy {
            retention_period,
            effective_time: now,
            is_locked: false,
        });
        Self {
            state: RwLock::new(BucketState {
                name: name.clone(),
                project: spec.project,
                location: spec.location.unwrap_or_else(|| DEFAULT_LOCATION.to_owned()),
                storage_class: DEFAULT_STORAGE_CLASS.to_owned(),
                metageneration: 1,
                versioning_enabled: spec.versioning_enabled,
                objects: ObjectIndex::default(),
                acl: spec.acl,
                default_object_acl: spec.default_object_acl,
                iam_policy: IamPolicy::default(),
                notifications: NotificationList::default(),
                retention_policy,
                time_created: now,
                updated: now,
            }),
            name,
        }
    }

    /// Shared access to the bucket state.
    pub fn read(&self) -> RwLockReadGuard<'_, BucketState> {
        self.state.read()
    }

    /// Exclusive access to the bucket state. This guard is the per-bucket
    /// critical section for all mutations.
    pub fn write(&self) -> RwLockWriteGuard<'_, BucketState> {
        self.state.write()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
