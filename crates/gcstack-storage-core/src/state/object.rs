//! Canonical object entity and its creation/patch templates.
//!
//! A [`StorageObject`] is one immutable content version of a (bucket, name)
//! key. Content never changes after materialization; metadata-only updates
//! bump the metageneration and leave generation and bytes untouched.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::checksums::{ObjectChecksums, etag_for};
use crate::state::acl::AclList;

/// Default storage class reported for all objects and buckets.
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

/// A fully materialized object version.
#[derive(Debug, Clone)]
pub struct StorageObject {
    /// The owning bucket name.
    pub bucket: String,
    /// The object name.
    pub name: String,
    /// Content generation, strictly increasing per (bucket, name).
    pub generation: i64,
    /// Metadata generation for this content generation; starts at 1.
    pub metageneration: i64,
    /// The object content. Immutable once created.
    pub content: Bytes,
    /// Content length in bytes.
    pub size: u64,
    /// MIME type, when supplied by the caller.
    pub content_type: Option<String>,
    /// The storage class (always `STANDARD` in the emulator).
    pub storage_class: String,
    /// Arbitrary user metadata.
    pub metadata: HashMap<String, String>,
    /// Per-object access-control list.
    pub acl: AclList,
    /// CRC32C and MD5 checksums, computed at materialization time.
    pub checksums: ObjectChecksums,
    /// When this generation was created.
    pub time_created: DateTime<Utc>,
    /// When metadata was last modified.
    pub updated: DateTime<Utc>,
}

impl StorageObject {
    /// Build a new object version from a spec and its content.
    ///
    /// Generation is assigned later by the object index; checksums and size
    /// are derived from the content here so a materialized object is always
    /// self-consistent.
    #[must_use]
    pub fn from_spec(bucket: String, name: String, spec: ObjectSpec, content: Bytes) -> Self {
        let now = Utc::now();
        let checksums = ObjectChecksums::compute(&content);
        let size = content.len() as u64;
        Self {
            bucket,
            name,
            generation: 0,
            metageneration: 1,
            content,
            size,
            content_type: spec.content_type,
            storage_class: DEFAULT_STORAGE_CLASS.to_owned(),
            metadata: spec.metadata,
            acl: spec.acl,
            checksums,
            time_created: now,
            updated: now,
        }
    }

    /// The `(generation, metageneration)` pair used by precondition checks.
    #[must_use]
    pub fn versions(&self) -> (i64, i64) {
        (self.generation, self.metageneration)
    }

    /// Opaque entity tag for the current metadata revision.
    #[must_use]
    pub fn etag(&self) -> String {
        etag_for(self.generation, self.metageneration)
    }

    /// Record a metadata mutation (ACL changes included): +1 metageneration,
    /// fresh `updated`.
    pub fn bump_metageneration(&mut self) {
        self.metageneration += 1;
        self.updated = Utc::now();
    }

    /// Apply a metadata patch and bump the metageneration.
    ///
    /// Content, generation, and checksums are never touched.
    pub fn apply_patch(&mut self, patch: ObjectPatch) {
        if let Some(content_type) = patch.content_type {
            self.content_type = Some(content_type);
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.bump_metageneration();
    }
}

/// Caller-supplied template for a new object.
#[derive(Debug, Clone, Default)]
pub struct ObjectSpec {
    /// MIME type for the new object.
    pub content_type: Option<String>,
    /// User metadata for the new object.
    pub metadata: HashMap<String, String>,
    /// Explicit ACL entries; merged over the bucket's default-object ACL.
    pub acl: AclList,
}

/// A metadata-only update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ObjectPatch {
    /// Replacement MIME type.
    pub content_type: Option<String>,
    /// Replacement user-metadata map.
    pub metadata: Option<HashMap<String, String>>,
}

impl ObjectPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content_type.is_none() && self.metadata.is_none()
    }
}

/// A `(bucket, name, generation)` reference to a materialized object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// The owning bucket name.
    pub bucket: String,
    /// The object name.
    pub name: String,
    /// The referenced content generation.
    pub generation: i64,
}
