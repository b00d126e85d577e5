//! In-memory Google Cloud Storage test double for GCStack.
//!
//! This crate implements the storage emulation engine consumed by the
//! client-library integration tests: bucket and object CRUD with GCS
//! generation/metageneration semantics, preconditions, resumable and
//! streamed uploads, compose, copy and chunked rewrite, ACLs, IAM policies
//! and notification configs. Protocol adapters (gRPC and REST) sit on top
//! and carry no business logic of their own.
//!
//! # Architecture
//!
//! ```text
//! gRPC / REST adapters (routing, wire schemas)
//!        |
//!        v
//! StorageEmulator (operation handlers in ops/)
//!        |
//!        v
//!   StorageState (buckets, uploads, rewrites)
//!        |
//!        v
//!   Bucket state (object index, ACLs, policies)
//! ```
//!
//! Adapters project handler results through [`resource`] and map errors
//! through [`error::StorageError::http_status`] /
//! [`error::StorageError::rpc_code`].

pub mod checksums;
pub mod config;
pub mod error;
mod ops;
pub mod preconditions;
pub mod provider;
pub mod resource;
pub mod state;

pub use config::StorageConfig;
pub use error::{RpcCode, StorageError, StorageResult};
pub use ops::{ComposeSource, CopySpec, MAX_COMPOSE_SOURCES, StreamingWrite};
pub use preconditions::{BucketPreconditions, Preconditions};
pub use provider::StorageEmulator;
