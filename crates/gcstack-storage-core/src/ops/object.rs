//! Object CRUD operation handlers.
//!
//! Implements `insert_object` (the simple, single-call upload),
//! `get_object`, `list_objects`, `update_object` and `delete_object`.
//! [`create_object_in`] is the one creation path shared with the upload,
//! compose and rewrite handlers, so default-object-ACL application and
//! precondition handling behave identically everywhere.

use bytes::Bytes;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::preconditions::Preconditions;
use crate::provider::StorageEmulator;
use crate::state::bucket::BucketState;
use crate::state::keystore::{ListObjectsQuery, ObjectListing};
use crate::state::object::{ObjectPatch, ObjectSpec, StorageObject};

/// Materialize a new object generation inside a held bucket write guard.
///
/// The bucket's default-object ACL seeds the object ACL, with the caller's
/// explicit entries layered on top. Preconditions are evaluated by the index
/// atomically with generation allocation.
pub(crate) fn create_object_in(
    state: &mut BucketState,
    name: &str,
    content: Bytes,
    mut spec: ObjectSpec,
    preconditions: &Preconditions,
) -> StorageResult<StorageObject> {
    if !state.default_object_acl.is_empty() {
        let mut acl = state.default_object_acl.clone();
        for entry in spec.acl.entries() {
            acl.upsert(entry.entity.clone(), entry.role.clone());
        }
        spec.acl = acl;
    }
    let versioning = state.versioning_enabled;
    let object = StorageObject::from_spec(
        state.name().to_owned(),
        name.to_owned(),
        spec,
        content,
    );
    state.objects.create(object, preconditions, versioning)
}

fn object_not_found(bucket: &str, name: &str, generation: Option<i64>) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_owned(),
        name: name.to_owned(),
        generation,
    }
}

impl StorageEmulator {
    /// Store an object in a single call (the simple upload path).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::PreconditionFailed`].
    pub fn insert_object(
        &self,
        bucket: &str,
        name: &str,
        content: Bytes,
        spec: ObjectSpec,
        preconditions: &Preconditions,
    ) -> StorageResult<StorageObject> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let object = create_object_in(&mut state, name, content, spec, preconditions)?;
        debug!(
            bucket = %bucket,
            object = %name,
            generation = object.generation,
            size = object.size,
            "inserted object"
        );
        Ok(object)
    }

    /// Fetch an object, including its content.
    ///
    /// Without a pinned generation this resolves the newest live generation;
    /// preconditions are evaluated against the resolved object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::ObjectNotFound`] or
    /// [`StorageError::PreconditionFailed`].
    pub fn get_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        preconditions: &Preconditions,
    ) -> StorageResult<StorageObject> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        let object = state
            .objects
            .get(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        preconditions.check(Some(object.versions()))?;
        Ok(object.clone())
    }

    /// List the objects of a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn list_objects(
        &self,
        bucket: &str,
        query: &ListObjectsQuery,
    ) -> StorageResult<ObjectListing> {
        let handle = self.state.bucket(bucket)?;
        Ok(handle.read().objects.list(query))
    }

    /// Apply a metadata-only patch to an object.
    ///
    /// Bumps the metageneration; content, generation and checksums are never
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::ObjectNotFound`] or
    /// [`StorageError::PreconditionFailed`]; nothing changes on failure.
    pub fn update_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        patch: ObjectPatch,
        preconditions: &Preconditions,
    ) -> StorageResult<StorageObject> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let object = state
            .objects
            .get_mut(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        preconditions.check(Some(object.versions()))?;
        object.apply_patch(patch);
        debug!(
            bucket = %bucket,
            object = %name,
            metageneration = object.metageneration,
            "updated object metadata"
        );
        Ok(object.clone())
    }

    /// Delete one object generation (the newest when unpinned).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::ObjectNotFound`] or
    /// [`StorageError::PreconditionFailed`]; nothing changes on failure.
    pub fn delete_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        preconditions: &Preconditions,
    ) -> StorageResult<()> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let target = state
            .objects
            .get(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        preconditions.check(Some(target.versions()))?;

        state.objects.delete(name, generation);
        debug!(bucket = %bucket, object = %name, "deleted object");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
