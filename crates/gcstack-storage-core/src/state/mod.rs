//! Storage emulator state management.
//!
//! This module provides the in-memory state for the emulator:
//!
//! - [`StorageState`] -- top-level service owning buckets, uploads, rewrites
//! - [`Bucket`] / [`BucketState`] -- per-bucket state behind one lock
//! - [`ObjectIndex`] -- name-to-generation-chain index per bucket
//! - [`StorageObject`] / [`ObjectSpec`] / [`ObjectPatch`] -- object types
//! - [`Upload`] / [`RewriteState`] -- long-running operation records
//! - [`AclList`] / [`IamPolicy`] / [`NotificationList`] -- access control
//!
//! # Thread Safety
//!
//! All types are `Send + Sync`. Concurrent access is handled via:
//!
//! - `DashMap` for the bucket, upload and rewrite registries
//! - `parking_lot::RwLock` for the whole of a bucket's mutable state,
//!   including its object index

pub(crate) mod acl;
pub(crate) mod bucket;
pub(crate) mod keystore;
pub(crate) mod object;
pub(crate) mod service;
pub(crate) mod upload;

pub use acl::{AclEntry, AclList, IamBinding, IamPolicy, NotificationConfig, NotificationList};
pub use bucket::{Bucket, BucketPatch, BucketSpec, BucketState, DEFAULT_LOCATION, RetentionPolicy};
pub use keystore::{ListObjectsQuery, ObjectIndex, ObjectListing};
pub use object::{DEFAULT_STORAGE_CLASS, ObjectPatch, ObjectRef, ObjectSpec, StorageObject};
pub use service::StorageState;
pub use upload::{RewriteState, Upload, UploadState, WriteStatus};
