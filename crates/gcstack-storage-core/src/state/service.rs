//! Service-wide entity registries.
//!
//! [`StorageState`] is the root of all emulator state: the bucket registry
//! plus the service-wide upload and rewrite registries, each a `DashMap` so
//! independent keys proceed concurrently. Buckets are handed out as `Arc`s;
//! callers clone the handle out of the registry and take the bucket's own
//! lock, so no registry shard lock is held across a bucket critical section.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::state::bucket::{Bucket, BucketSpec};
use crate::state::upload::{RewriteState, Upload};

/// All emulator state.
#[derive(Debug, Default)]
pub struct StorageState {
    buckets: DashMap<String, Arc<Bucket>>,
    uploads: DashMap<String, Upload>,
    rewrites: DashMap<String, RewriteState>,
}

impl StorageState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    /// Register a new bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketAlreadyExists`] if the name is taken.
    pub fn insert_bucket(&self, name: &str, spec: BucketSpec) -> StorageResult<Arc<Bucket>> {
        match self.buckets.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(StorageError::BucketAlreadyExists {
                bucket: name.to_owned(),
            }),
            Entry::Vacant(slot) => {
                let bucket = Arc::new(Bucket::new(name, spec));
                slot.insert(Arc::clone(&bucket));
                info!(bucket = %name, "created bucket");
                Ok(bucket)
            }
        }
    }

    /// Look up a bucket handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if no such bucket exists.
    pub fn bucket(&self, name: &str) -> StorageResult<Arc<Bucket>> {
        self.buckets
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::BucketNotFound {
                bucket: name.to_owned(),
            })
    }

    /// All buckets of a project, sorted by name for deterministic listings.
    #[must_use]
    pub fn buckets_for_project(&self, project: &str) -> Vec<Arc<Bucket>> {
        let mut buckets: Vec<Arc<Bucket>> = self
            .buckets
            .iter()
            .filter(|entry| entry.value().read().project == project)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        buckets
    }

    /// Remove a bucket and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if no such bucket exists.
    pub fn remove_bucket(&self, name: &str) -> StorageResult<Arc<Bucket>> {
        let (_, bucket) =
            self.buckets
                .remove(name)
                .ok_or_else(|| StorageError::BucketNotFound {
                    bucket: name.to_owned(),
                })?;
        info!(bucket = %name, "deleted bucket");
        Ok(bucket)
    }

    // -----------------------------------------------------------------------
    // Uploads
    // -----------------------------------------------------------------------

    /// Register an upload, returning its id.
    pub fn insert_upload(&self, upload: Upload) -> String {
        let id = upload.upload_id.clone();
        self.uploads.insert(id.clone(), upload);
        id
    }

    /// Run `f` with shared access to an upload record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`] for an unknown id.
    pub fn with_upload<R>(&self, id: &str, f: impl FnOnce(&Upload) -> R) -> StorageResult<R> {
        self.uploads
            .get(id)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| StorageError::UploadNotFound {
                upload_id: id.to_owned(),
            })
    }

    /// Run `f` with exclusive access to an upload record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`] for an unknown id.
    pub fn with_upload_mut<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Upload) -> R,
    ) -> StorageResult<R> {
        self.uploads
            .get_mut(id)
            .map(|mut entry| f(entry.value_mut()))
            .ok_or_else(|| StorageError::UploadNotFound {
                upload_id: id.to_owned(),
            })
    }

    /// Remove an upload record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`] for an unknown id.
    pub fn remove_upload(&self, id: &str) -> StorageResult<Upload> {
        self.uploads
            .remove(id)
            .map(|(_, upload)| upload)
            .ok_or_else(|| StorageError::UploadNotFound {
                upload_id: id.to_owned(),
            })
    }

    // -----------------------------------------------------------------------
    // Rewrites
    // -----------------------------------------------------------------------

    /// Register a rewrite, returning its token.
    pub fn insert_rewrite(&self, rewrite: RewriteState) -> String {
        let token = rewrite.token.clone();
        self.rewrites.insert(token.clone(), rewrite);
        token
    }

    /// Run `f` with exclusive access to a rewrite record. The guard makes
    /// concurrent calls with the same token single-flight.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RewriteTokenNotFound`] for an unknown token.
    pub fn with_rewrite_mut<R>(
        &self,
        token: &str,
        f: impl FnOnce(&mut RewriteState) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut entry =
            self.rewrites
                .get_mut(token)
                .ok_or_else(|| StorageError::RewriteTokenNotFound {
                    token: token.to_owned(),
                })?;
        f(entry.value_mut())
    }

    /// Drop a finished rewrite's token.
    pub fn remove_rewrite(&self, token: &str) {
        self.rewrites.remove(token);
    }

    /// Drop all buckets, uploads and rewrites.
    pub fn reset(&self) {
        self.buckets.clear();
        self.uploads.clear();
        self.rewrites.clear();
        info!("reset all storage state");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
