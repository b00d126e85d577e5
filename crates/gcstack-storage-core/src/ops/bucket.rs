//! Bucket CRUD operation handlers.
//!
//! Implements `insert_bucket`, `get_bucket`, `list_buckets`,
//! `update_bucket`, `delete_bucket` and `lock_bucket_retention_policy`.

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::preconditions::BucketPreconditions;
use crate::provider::StorageEmulator;
use crate::resource::{BucketResource, KIND_BUCKETS, ListResponse};
use crate::state::bucket::{BucketPatch, BucketSpec};

/// Check a bucket name against the GCS naming rules the emulator enforces:
/// 3-63 characters of lowercase letters, digits, `-`, `_` and `.`, starting
/// and ending with a letter or digit.
pub(crate) fn validate_bucket_name(name: &str) -> StorageResult<()> {
    let bytes = name.as_bytes();
    let valid_len = (3..=63).contains(&bytes.len());
    let alnum = |b: Option<&u8>| b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    let valid_edges = alnum(bytes.first()) && alnum(bytes.last());
    let valid_chars = bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'_' | b'.'));
    if valid_len && valid_edges && valid_chars {
        Ok(())
    } else {
        Err(StorageError::invalid(format!(
            "invalid bucket name: {name}"
        )))
    }
}

impl StorageEmulator {
    /// Create a new bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] for a malformed name and
    /// [`StorageError::BucketAlreadyExists`] for a taken one.
    pub fn insert_bucket(&self, name: &str, spec: BucketSpec) -> StorageResult<BucketResource> {
        validate_bucket_name(name)?;
        let bucket = self.state.insert_bucket(name, spec)?;
        Ok(BucketResource::from_state(&bucket.read()))
    }

    /// Fetch a bucket's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::PreconditionFailed`].
    pub fn get_bucket(
        &self,
        name: &str,
        preconditions: &BucketPreconditions,
    ) -> StorageResult<BucketResource> {
        let bucket = self.state.bucket(name)?;
        let state = bucket.read();
        preconditions.check(state.metageneration)?;
        Ok(BucketResource::from_state(&state))
    }

    /// List the buckets of a project, sorted by name.
    #[must_use]
    pub fn list_buckets(&self, project: &str) -> ListResponse<BucketResource> {
        let items = self
            .state
            .buckets_for_project(project)
            .iter()
            .map(|bucket| BucketResource::from_state(&bucket.read()))
            .collect();
        ListResponse::new(KIND_BUCKETS, items)
    }

    /// Apply a metadata patch to a bucket.
    ///
    /// Preconditions are evaluated against the current metageneration before
    /// anything changes; on success the metageneration is bumped once.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::PreconditionFailed`] or
    /// [`StorageError::RetentionPolicyLocked`].
    pub fn update_bucket(
        &self,
        name: &str,
        patch: BucketPatch,
        preconditions: &BucketPreconditions,
    ) -> StorageResult<BucketResource> {
        let bucket = self.state.bucket(name)?;
        let mut state = bucket.write();
        preconditions.check(state.metageneration)?;
        state.apply_patch(patch)?;
        debug!(bucket = %name, metageneration = state.metageneration, "updated bucket");
        Ok(BucketResource::from_state(&state))
    }

    /// Delete a bucket and all objects in it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::PreconditionFailed`]; on precondition failure the
    /// bucket is left untouched.
    pub fn delete_bucket(
        &self,
        name: &str,
        preconditions: &BucketPreconditions,
    ) -> StorageResult<()> {
        let bucket = self.state.bucket(name)?;
        preconditions.check(bucket.read().metageneration)?;
        self.state.remove_bucket(name)?;
        Ok(())
    }

    /// Permanently lock a bucket's retention policy.
    ///
    /// The caller must name the current metageneration; a stale value is a
    /// precondition failure, mirroring the required `ifMetagenerationMatch`
    /// parameter of the real endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::PreconditionFailed`] or
    /// [`StorageError::InvalidArgument`] when there is no policy to lock.
    pub fn lock_bucket_retention_policy(
        &self,
        name: &str,
        if_metageneration_match: i64,
    ) -> StorageResult<BucketResource> {
        let bucket = self.state.bucket(name)?;
        let mut state = bucket.write();
        BucketPreconditions::metageneration_match(if_metageneration_match)
            .check(state.metageneration)?;
        state.lock_retention_policy()?;
        debug!(bucket = %name, "locked retention policy");
        Ok(BucketResource::from_state(&state))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
