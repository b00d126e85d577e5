//! Access-control handlers: ACLs, IAM policy, notifications.
//!
//! Bucket ACL, default-object ACL and per-object ACL expose the same
//! list/get/upsert/delete surface. Every ACL or IAM mutation bumps the
//! owning entity's metageneration, so metageneration preconditions observe
//! access-control changes just like any other metadata change. IAM policies
//! are stored verbatim and never enforced; `test_iam_permissions` echoes
//! the requested permissions back.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::provider::StorageEmulator;
use crate::resource::{
    BucketAclResource, KIND_BUCKET_ACLS, KIND_NOTIFICATIONS, KIND_OBJECT_ACLS, ListResponse,
    NotificationResource, ObjectAclResource, PolicyResource, TestPermissionsResource,
};
use crate::state::acl::IamPolicy;

fn object_not_found(bucket: &str, name: &str, generation: Option<i64>) -> StorageError {
    StorageError::ObjectNotFound {
        bucket: bucket.to_owned(),
        name: name.to_owned(),
        generation,
    }
}

impl StorageEmulator {
    // -----------------------------------------------------------------------
    // Bucket ACL
    // -----------------------------------------------------------------------

    /// List a bucket's ACL entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn list_bucket_acls(
        &self,
        bucket: &str,
    ) -> StorageResult<ListResponse<BucketAclResource>> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        let items = state
            .acl
            .entries()
            .iter()
            .map(|entry| BucketAclResource::new(bucket, entry))
            .collect();
        Ok(ListResponse::new(KIND_BUCKET_ACLS, items))
    }

    /// Fetch one bucket ACL entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::AclEntryNotFound`].
    pub fn get_bucket_acl(&self, bucket: &str, entity: &str) -> StorageResult<BucketAclResource> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        Ok(BucketAclResource::new(bucket, state.acl.get(entity)?))
    }

    /// Insert or update a bucket ACL entry; bumps the bucket metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn upsert_bucket_acl(
        &self,
        bucket: &str,
        entity: &str,
        role: &str,
    ) -> StorageResult<BucketAclResource> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let (entry, created) = state.acl.upsert(entity, role);
        state.bump_metageneration();
        debug!(bucket = %bucket, entity = %entity, role = %role, created, "upserted bucket acl");
        Ok(BucketAclResource::new(bucket, &entry))
    }

    /// Remove a bucket ACL entry; bumps the bucket metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::AclEntryNotFound`]; nothing changes when the entity
    /// was never granted anything.
    pub fn delete_bucket_acl(&self, bucket: &str, entity: &str) -> StorageResult<()> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        state.acl.delete(entity)?;
        state.bump_metageneration();
        debug!(bucket = %bucket, entity = %entity, "deleted bucket acl");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Default-object ACL
    // -----------------------------------------------------------------------

    /// List a bucket's default-object ACL entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn list_default_object_acls(
        &self,
        bucket: &str,
    ) -> StorageResult<ListResponse<ObjectAclResource>> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        let items = state
            .default_object_acl
            .entries()
            .iter()
            .map(|entry| ObjectAclResource::for_default(bucket, entry))
            .collect();
        Ok(ListResponse::new(KIND_OBJECT_ACLS, items))
    }

    /// Fetch one default-object ACL entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::AclEntryNotFound`].
    pub fn get_default_object_acl(
        &self,
        bucket: &str,
        entity: &str,
    ) -> StorageResult<ObjectAclResource> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        Ok(ObjectAclResource::for_default(
            bucket,
            state.default_object_acl.get(entity)?,
        ))
    }

    /// Insert or update a default-object ACL entry; bumps the bucket
    /// metageneration. Already-stored objects are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn upsert_default_object_acl(
        &self,
        bucket: &str,
        entity: &str,
        role: &str,
    ) -> StorageResult<ObjectAclResource> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let (entry, _) = state.default_object_acl.upsert(entity, role);
        state.bump_metageneration();
        debug!(bucket = %bucket, entity = %entity, role = %role, "upserted default object acl");
        Ok(ObjectAclResource::for_default(bucket, &entry))
    }

    /// Remove a default-object ACL entry; bumps the bucket metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::AclEntryNotFound`].
    pub fn delete_default_object_acl(&self, bucket: &str, entity: &str) -> StorageResult<()> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        state.default_object_acl.delete(entity)?;
        state.bump_metageneration();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Object ACL
    // -----------------------------------------------------------------------

    /// List an object's ACL entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::ObjectNotFound`].
    pub fn list_object_acls(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
    ) -> StorageResult<ListResponse<ObjectAclResource>> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        let object = state
            .objects
            .get(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        let items = object
            .acl
            .entries()
            .iter()
            .map(|entry| ObjectAclResource::new(object, entry))
            .collect();
        Ok(ListResponse::new(KIND_OBJECT_ACLS, items))
    }

    /// Fetch one object ACL entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::ObjectNotFound`] or
    /// [`StorageError::AclEntryNotFound`].
    pub fn get_object_acl(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        entity: &str,
    ) -> StorageResult<ObjectAclResource> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        let object = state
            .objects
            .get(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        Ok(ObjectAclResource::new(object, object.acl.get(entity)?))
    }

    /// Insert or update an object ACL entry; bumps the object
    /// metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::ObjectNotFound`].
    pub fn upsert_object_acl(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        entity: &str,
        role: &str,
    ) -> StorageResult<ObjectAclResource> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let object = state
            .objects
            .get_mut(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        let (entry, _) = object.acl.upsert(entity, role);
        object.bump_metageneration();
        debug!(
            bucket = %bucket,
            object = %name,
            entity = %entity,
            role = %role,
            metageneration = object.metageneration,
            "upserted object acl"
        );
        Ok(ObjectAclResource::new(object, &entry))
    }

    /// Remove an object ACL entry; bumps the object metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::ObjectNotFound`] or
    /// [`StorageError::AclEntryNotFound`]; nothing changes on failure.
    pub fn delete_object_acl(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<i64>,
        entity: &str,
    ) -> StorageResult<()> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let object = state
            .objects
            .get_mut(name, generation)
            .ok_or_else(|| object_not_found(bucket, name, generation))?;
        object.acl.delete(entity)?;
        object.bump_metageneration();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // IAM
    // -----------------------------------------------------------------------

    /// Fetch a bucket's IAM policy.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn get_iam_policy(&self, bucket: &str) -> StorageResult<PolicyResource> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        Ok(PolicyResource::new(
            bucket,
            &state.iam_policy,
            state.metageneration,
        ))
    }

    /// Replace a bucket's IAM policy wholesale; bumps the bucket
    /// metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn set_iam_policy(&self, bucket: &str, policy: IamPolicy) -> StorageResult<PolicyResource> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        state.iam_policy = policy;
        state.bump_metageneration();
        debug!(bucket = %bucket, bindings = state.iam_policy.bindings.len(), "set iam policy");
        Ok(PolicyResource::new(
            bucket,
            &state.iam_policy,
            state.metageneration,
        ))
    }

    /// Echo back the requested permissions.
    ///
    /// The emulator performs no enforcement, so every asked-for permission
    /// is reported as held.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn test_iam_permissions(
        &self,
        bucket: &str,
        permissions: Vec<String>,
    ) -> StorageResult<TestPermissionsResource> {
        self.state.bucket(bucket)?;
        Ok(TestPermissionsResource::new(permissions))
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Create a notification config; the server assigns the next id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn insert_notification(
        &self,
        bucket: &str,
        topic: &str,
        payload_format: &str,
        event_types: Vec<String>,
        custom_attributes: HashMap<String, String>,
    ) -> StorageResult<NotificationResource> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        let config = state.notifications.insert(
            topic.to_owned(),
            payload_format.to_owned(),
            event_types,
            custom_attributes,
        );
        debug!(bucket = %bucket, id = %config.id, topic = %topic, "created notification");
        Ok(NotificationResource::from(&config))
    }

    /// List a bucket's notification configs.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn list_notifications(
        &self,
        bucket: &str,
    ) -> StorageResult<ListResponse<NotificationResource>> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        let items = state
            .notifications
            .configs()
            .iter()
            .map(NotificationResource::from)
            .collect();
        Ok(ListResponse::new(KIND_NOTIFICATIONS, items))
    }

    /// Fetch one notification config.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::NotificationNotFound`].
    pub fn get_notification(&self, bucket: &str, id: &str) -> StorageResult<NotificationResource> {
        let handle = self.state.bucket(bucket)?;
        let state = handle.read();
        Ok(NotificationResource::from(state.notifications.get(id)?))
    }

    /// Remove a notification config.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] or
    /// [`StorageError::NotificationNotFound`].
    pub fn delete_notification(&self, bucket: &str, id: &str) -> StorageResult<()> {
        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();
        state.notifications.delete(id)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
