//! Object composition handler.
//!
//! `compose_object` concatenates 1 to 32 same-bucket source objects into a
//! destination object. Source validation, byte collection and destination
//! creation all happen under one bucket write guard, so the composed bytes
//! are a consistent snapshot and no source can change mid-compose.

use bytes::BytesMut;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::ops::object::create_object_in;
use crate::preconditions::Preconditions;
use crate::provider::StorageEmulator;
use crate::state::object::{ObjectSpec, StorageObject};

/// Maximum number of source objects in one compose call.
pub const MAX_COMPOSE_SOURCES: usize = 32;

/// One source of a compose call.
#[derive(Debug, Clone, Default)]
pub struct ComposeSource {
    /// Source object name, in the same bucket as the destination.
    pub name: String,
    /// Pin a specific generation; the newest when absent.
    pub generation: Option<i64>,
    /// Per-source generation precondition.
    pub if_generation_match: Option<i64>,
}

impl StorageEmulator {
    /// Concatenate `sources` into a new object named `destination`.
    ///
    /// The destination inherits only the concatenated bytes; metadata, type
    /// and ACL come from `spec` (plus the bucket's default-object ACL), and
    /// checksums are computed over the combined content.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] for zero or more than 32
    /// sources, [`StorageError::ObjectNotFound`] for a missing source, and
    /// [`StorageError::PreconditionFailed`] for a failed per-source or
    /// destination condition. No state changes on any failure.
    pub fn compose_object(
        &self,
        bucket: &str,
        destination: &str,
        sources: &[ComposeSource],
        spec: ObjectSpec,
        preconditions: &Preconditions,
    ) -> StorageResult<StorageObject> {
        if sources.is_empty() {
            return Err(StorageError::invalid("compose requires at least one source"));
        }
        if sources.len() > MAX_COMPOSE_SOURCES {
            return Err(StorageError::invalid(format!(
                "compose accepts at most {MAX_COMPOSE_SOURCES} sources, got {}",
                sources.len()
            )));
        }

        let handle = self.state.bucket(bucket)?;
        let mut state = handle.write();

        let mut combined = BytesMut::new();
        for source in sources {
            let object = state.objects.get(&source.name, source.generation).ok_or_else(|| {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_owned(),
                    name: source.name.clone(),
                    generation: source.generation,
                }
            })?;
            if let Some(expected) = source.if_generation_match {
                Preconditions::generation_match(expected).check(Some(object.versions()))?;
            }
            combined.extend_from_slice(&object.content);
        }

        let object = create_object_in(
            &mut state,
            destination,
            combined.freeze(),
            spec,
            preconditions,
        )?;
        debug!(
            bucket = %bucket,
            destination = %destination,
            sources = sources.len(),
            size = object.size,
            "composed object"
        );
        Ok(object)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
