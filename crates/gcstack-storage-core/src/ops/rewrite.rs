//! Copy and rewrite handlers.
//!
//! `copy_object` is the single-call copy; `rewrite_object` /
//! `rewrite_continue` implement the token-resumable, chunked variant used
//! for large objects. Both finalize the destination the same way: a fresh
//! generation created through the normal creation path carrying the
//! source's bytes and metadata, then any destination overrides applied as a
//! regular metadata update.

use tracing::{debug, info};

use crate::error::StorageResult;
use crate::preconditions::Preconditions;
use crate::provider::StorageEmulator;
use crate::resource::{KIND_REWRITE, ObjectResource, RewriteResource};
use crate::state::acl::AclList;
use crate::state::object::{ObjectPatch, ObjectRef, ObjectSpec, StorageObject};
use crate::state::upload::RewriteState;

/// Parameters of a copy or rewrite call.
#[derive(Debug, Clone, Default)]
pub struct CopySpec {
    /// Source bucket name.
    pub source_bucket: String,
    /// Source object name.
    pub source_object: String,
    /// Pin a specific source generation; the newest when absent.
    pub source_generation: Option<i64>,
    /// Preconditions evaluated against the source.
    pub source_preconditions: Preconditions,
    /// Destination bucket name.
    pub destination_bucket: String,
    /// Destination object name.
    pub destination_object: String,
    /// Preconditions evaluated against the destination key.
    pub destination_preconditions: Preconditions,
    /// Metadata overrides applied to the destination after creation.
    pub overrides: ObjectPatch,
}

impl StorageEmulator {
    /// Copy an object in a single call.
    ///
    /// The destination gets a fresh generation carrying the source's bytes,
    /// content type and metadata; its ACL starts from the destination
    /// bucket's default-object ACL. Overrides, when present, are applied as
    /// a normal metadata update afterwards and bump the metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`],
    /// [`StorageError::ObjectNotFound`] or
    /// [`StorageError::PreconditionFailed`].
    pub fn copy_object(&self, spec: &CopySpec) -> StorageResult<StorageObject> {
        let source = self.get_object(
            &spec.source_bucket,
            &spec.source_object,
            spec.source_generation,
            &spec.source_preconditions,
        )?;
        let object = self.finalize_copy(&source, spec)?;
        info!(
            source = %format!("{}/{}", spec.source_bucket, spec.source_object),
            destination = %format!("{}/{}", spec.destination_bucket, spec.destination_object),
            generation = object.generation,
            "copied object"
        );
        Ok(object)
    }

    /// Start a chunked rewrite.
    ///
    /// Pins the source generation so every later step copies from the same
    /// content. When the source fits in one configured chunk the rewrite
    /// completes immediately and no token is issued; otherwise the returned
    /// token resumes the operation via [`rewrite_continue`](Self::rewrite_continue).
    ///
    /// # Errors
    ///
    /// Same as [`copy_object`](Self::copy_object).
    pub fn rewrite_object(&self, spec: &CopySpec) -> StorageResult<RewriteResource> {
        let source = self.get_object(
            &spec.source_bucket,
            &spec.source_object,
            spec.source_generation,
            &spec.source_preconditions,
        )?;

        let mut rewrite = RewriteState::new(
            ObjectRef {
                bucket: source.bucket.clone(),
                name: source.name.clone(),
                generation: source.generation,
            },
            spec.destination_bucket.clone(),
            spec.destination_object.clone(),
            spec.overrides.clone(),
            spec.destination_preconditions,
            source.size,
        );

        if rewrite.advance(self.config.rewrite_chunk_size) {
            let object = self.finalize_rewrite(&rewrite)?;
            return Ok(done_response(rewrite.total_bytes, &object));
        }

        let progress = rewrite.bytes_rewritten;
        let total = rewrite.total_bytes;
        let token = self.state.insert_rewrite(rewrite);
        debug!(token = %token, progress, total, "started rewrite");
        Ok(progress_response(progress, total, token))
    }

    /// Advance a rewrite by one chunk.
    ///
    /// Progress is monotonic and the call is retry-safe: repeating a step
    /// never skips bytes. When the final chunk lands, the destination is
    /// finalized and the token retired.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RewriteTokenNotFound`] for an unknown or
    /// retired token, [`StorageError::ObjectNotFound`] if the pinned source
    /// generation has been deleted mid-rewrite, and the destination
    /// creation errors on the final step.
    pub fn rewrite_continue(&self, token: &str) -> StorageResult<RewriteResource> {
        let chunk = self.config.rewrite_chunk_size;
        let response = self.state.with_rewrite_mut(token, |rewrite| {
            if rewrite.advance(chunk) {
                let object = self.finalize_rewrite(rewrite)?;
                Ok(done_response(rewrite.total_bytes, &object))
            } else {
                debug!(
                    token = %token,
                    progress = rewrite.bytes_rewritten,
                    total = rewrite.total_bytes,
                    "advanced rewrite"
                );
                Ok(progress_response(
                    rewrite.bytes_rewritten,
                    rewrite.total_bytes,
                    token.to_owned(),
                ))
            }
        })?;
        if response.done {
            self.state.remove_rewrite(token);
        }
        Ok(response)
    }

    /// Create the destination object of a copy or rewrite step.
    fn finalize_copy(&self, source: &StorageObject, spec: &CopySpec) -> StorageResult<StorageObject> {
        let template = ObjectSpec {
            content_type: source.content_type.clone(),
            metadata: source.metadata.clone(),
            acl: AclList::new(),
        };
        let created = self.insert_object(
            &spec.destination_bucket,
            &spec.destination_object,
            source.content.clone(),
            template,
            &spec.destination_preconditions,
        )?;
        if spec.overrides.is_empty() {
            return Ok(created);
        }
        self.update_object(
            &spec.destination_bucket,
            &spec.destination_object,
            Some(created.generation),
            spec.overrides.clone(),
            &Preconditions::none(),
        )
    }

    fn finalize_rewrite(&self, rewrite: &RewriteState) -> StorageResult<StorageObject> {
        let source = self.get_object(
            &rewrite.source.bucket,
            &rewrite.source.name,
            Some(rewrite.source.generation),
            &Preconditions::none(),
        )?;
        let spec = CopySpec {
            source_bucket: rewrite.source.bucket.clone(),
            source_object: rewrite.source.name.clone(),
            source_generation: Some(rewrite.source.generation),
            source_preconditions: Preconditions::none(),
            destination_bucket: rewrite.dest_bucket.clone(),
            destination_object: rewrite.dest_name.clone(),
            destination_preconditions: rewrite.preconditions,
            overrides: rewrite.overrides.clone(),
        };
        let object = self.finalize_copy(&source, &spec)?;
        info!(
            destination = %format!("{}/{}", rewrite.dest_bucket, rewrite.dest_name),
            generation = object.generation,
            "finished rewrite"
        );
        Ok(object)
    }
}

fn done_response(total: u64, object: &StorageObject) -> RewriteResource {
    RewriteResource {
        kind: KIND_REWRITE.to_owned(),
        total_bytes_rewritten: total,
        object_size: total,
        done: true,
        rewrite_token: None,
        resource: Some(ObjectResource::from(object)),
    }
}

fn progress_response(progress: u64, total: u64, token: String) -> RewriteResource {
    RewriteResource {
        kind: KIND_REWRITE.to_owned(),
        total_bytes_rewritten: progress,
        object_size: total,
        done: false,
        rewrite_token: Some(token),
        resource: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::config::StorageConfig;
    use crate::error::StorageError;
    use crate::state::bucket::BucketSpec;

    fn emulator_with_chunk(chunk: u64) -> StorageEmulator {
        let emulator = StorageEmulator::new(
            StorageConfig::builder().rewrite_chunk_size(chunk).build(),
        );
        for name in ["src-bkt", "dst-bkt"] {
            emulator
                .insert_bucket(
                    name,
                    BucketSpec {
                        project: "proj".to_owned(),
                        ..BucketSpec::default()
                    },
                )
                .unwrap_or_else(|e| panic!("bucket setup failed: {e}"));
        }
        emulator
    }

    fn put(emulator: &StorageEmulator, content: &'static [u8]) -> StorageObject {
        emulator
            .insert_object(
                "src-bkt",
                "src",
                Bytes::from_static(content),
                ObjectSpec {
                    content_type: Some("text/plain".to_owned()),
                    metadata: std::collections::HashMap::from([(
                        "origin".to_owned(),
                        "src".to_owned(),
                    )]),
                    ..ObjectSpec::default()
                },
                &Preconditions::none(),
            )
            .unwrap_or_else(|e| panic!("insert failed: {e}"))
    }

    fn cross_bucket_spec() -> CopySpec {
        CopySpec {
            source_bucket: "src-bkt".to_owned(),
            source_object: "src".to_owned(),
            destination_bucket: "dst-bkt".to_owned(),
            destination_object: "dst".to_owned(),
            ..CopySpec::default()
        }
    }

    #[test]
    fn test_should_copy_bytes_and_metadata() {
        let emulator = emulator_with_chunk(1024);
        put(&emulator, b"copy me");

        let copied = emulator
            .copy_object(&cross_bucket_spec())
            .unwrap_or_else(|e| panic!("copy failed: {e}"));
        assert_eq!(copied.bucket, "dst-bkt");
        assert_eq!(copied.content.as_ref(), b"copy me");
        assert_eq!(copied.content_type.as_deref(), Some("text/plain"));
        assert_eq!(copied.metadata.get("origin").map(String::as_str), Some("src"));
        assert_eq!(copied.generation, 1);
        assert_eq!(copied.metageneration, 1);
    }

    #[test]
    fn test_should_apply_overrides_as_metadata_update() {
        let emulator = emulator_with_chunk(1024);
        put(&emulator, b"data");

        let spec = CopySpec {
            overrides: ObjectPatch {
                content_type: Some("application/json".to_owned()),
                metadata: None,
            },
            ..cross_bucket_spec()
        };
        let copied = emulator
            .copy_object(&spec)
            .unwrap_or_else(|e| panic!("copy failed: {e}"));
        assert_eq!(copied.content_type.as_deref(), Some("application/json"));
        // The override went through the update path.
        assert_eq!(copied.metageneration, 2);
    }

    #[test]
    fn test_should_check_source_and_destination_preconditions() {
        let emulator = emulator_with_chunk(1024);
        let source = put(&emulator, b"data");

        let stale_source = CopySpec {
            source_preconditions: Preconditions::generation_match(source.generation + 1),
            ..cross_bucket_spec()
        };
        assert!(matches!(
            emulator.copy_object(&stale_source),
            Err(StorageError::PreconditionFailed { .. })
        ));

        emulator
            .copy_object(&cross_bucket_spec())
            .unwrap_or_else(|e| panic!("copy failed: {e}"));
        let dest_must_not_exist = CopySpec {
            destination_preconditions: Preconditions::generation_match(0),
            ..cross_bucket_spec()
        };
        assert!(matches!(
            emulator.copy_object(&dest_must_not_exist),
            Err(StorageError::PreconditionFailed { .. })
        ));
    }

    #[test]
    fn test_should_complete_small_rewrite_without_token() {
        let emulator = emulator_with_chunk(1024);
        put(&emulator, b"small");

        let response = emulator
            .rewrite_object(&cross_bucket_spec())
            .unwrap_or_else(|e| panic!("rewrite failed: {e}"));
        assert!(response.done);
        assert!(response.rewrite_token.is_none());
        assert_eq!(response.total_bytes_rewritten, 5);
        assert_eq!(response.object_size, 5);
        assert!(response.resource.is_some());
    }

    #[test]
    fn test_should_rewrite_in_chunks_with_monotonic_progress() {
        let emulator = emulator_with_chunk(4);
        put(&emulator, b"0123456789");

        let first = emulator
            .rewrite_object(&cross_bucket_spec())
            .unwrap_or_else(|e| panic!("rewrite failed: {e}"));
        assert!(!first.done);
        assert_eq!(first.total_bytes_rewritten, 4);
        let token = first
            .rewrite_token
            .unwrap_or_else(|| panic!("expected a token"));

        // Destination does not exist until the rewrite completes.
        assert!(
            emulator
                .get_object("dst-bkt", "dst", None, &Preconditions::none())
                .is_err()
        );

        let second = emulator
            .rewrite_continue(&token)
            .unwrap_or_else(|e| panic!("continue failed: {e}"));
        assert!(!second.done);
        assert_eq!(second.total_bytes_rewritten, 8);

        let last = emulator
            .rewrite_continue(&token)
            .unwrap_or_else(|e| panic!("continue failed: {e}"));
        assert!(last.done);
        assert_eq!(last.total_bytes_rewritten, 10);

        let object = emulator
            .get_object("dst-bkt", "dst", None, &Preconditions::none())
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(object.content.as_ref(), b"0123456789");

        // The token is retired once done.
        assert!(matches!(
            emulator.rewrite_continue(&token),
            Err(StorageError::RewriteTokenNotFound { .. })
        ));
    }

    #[test]
    fn test_should_pin_source_generation_across_steps() {
        let emulator = emulator_with_chunk(4);
        put(&emulator, b"original##");

        let first = emulator
            .rewrite_object(&cross_bucket_spec())
            .unwrap_or_else(|e| panic!("rewrite failed: {e}"));
        let token = first
            .rewrite_token
            .unwrap_or_else(|| panic!("expected a token"));

        // The source is overwritten mid-rewrite; the pinned generation is
        // gone because the source bucket has no versioning.
        put(&emulator, b"replaced!!");

        let err = loop {
            match emulator.rewrite_continue(&token) {
                Ok(response) => assert!(!response.done),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[test]
    fn test_should_fail_unknown_rewrite_token() {
        let emulator = emulator_with_chunk(4);
        assert!(matches!(
            emulator.rewrite_continue("no-such-token"),
            Err(StorageError::RewriteTokenNotFound { .. })
        ));
    }
}
