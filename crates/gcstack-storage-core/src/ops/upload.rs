//! Resumable and streamed upload handlers.
//!
//! Implements `start_resumable_write`, `write_chunk`, `query_write_status`,
//! `cancel_upload` and the [`StreamingWrite`] wrapper used by the gRPC
//! bidirectional write path. The finishing chunk materializes the object
//! through the same creation path as a simple insert, under the upload
//! record's exclusive guard, so a finish observed by one caller is the
//! finish every caller sees.

use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::ops::object::create_object_in;
use crate::preconditions::Preconditions;
use crate::provider::StorageEmulator;
use crate::state::object::{ObjectRef, ObjectSpec, StorageObject};
use crate::state::upload::{Upload, UploadState, WriteStatus};

impl StorageEmulator {
    /// Open a resumable upload and return its id.
    ///
    /// Preconditions are captured now but only evaluated when the upload
    /// finishes, against the state at that moment.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn start_resumable_write(
        &self,
        bucket: &str,
        name: &str,
        spec: ObjectSpec,
        preconditions: Preconditions,
    ) -> StorageResult<String> {
        self.state.bucket(bucket)?;
        let upload = Upload::new(bucket, name, spec, preconditions);
        let id = self.state.insert_upload(upload);
        info!(bucket = %bucket, object = %name, upload_id = %id, "started resumable write");
        Ok(id)
    }

    /// Append a chunk to an upload; a finish-flagged chunk materializes the
    /// object.
    ///
    /// Returns the committed size after the chunk. When `finish` is set the
    /// captured preconditions are re-evaluated and, on success, the object
    /// becomes visible with a fresh generation; on failure the buffered
    /// content is kept so the finish can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`] for an unknown id,
    /// [`StorageError::AlreadyCancelled`] for a finished upload, and the
    /// creation-path errors when finishing.
    pub fn write_chunk(
        &self,
        upload_id: &str,
        data: &[u8],
        finish: bool,
    ) -> StorageResult<WriteStatus> {
        self.state.with_upload_mut(upload_id, |upload| {
            let committed_size = upload.append(data)?;
            if !finish {
                debug!(upload_id = %upload_id, committed_size, "appended chunk");
                return Ok(upload.status());
            }

            let content = upload.take_content()?;
            let created = self.state.bucket(&upload.bucket).and_then(|handle| {
                let mut state = handle.write();
                create_object_in(
                    &mut state,
                    &upload.name,
                    content.clone(),
                    upload.spec.clone(),
                    &upload.preconditions,
                )
            });
            match created {
                Ok(object) => {
                    let size = object.size;
                    upload.complete(
                        ObjectRef {
                            bucket: object.bucket,
                            name: object.name,
                            generation: object.generation,
                        },
                        size,
                    );
                    info!(upload_id = %upload_id, size, "finished resumable write");
                    Ok(WriteStatus {
                        committed_size: size,
                        complete: true,
                    })
                }
                Err(e) => {
                    // Keep the buffer so the finish can be retried.
                    upload.append(&content)?;
                    Err(e)
                }
            }
        })?
    }

    /// Report the committed size and completion state of an upload.
    ///
    /// Completed uploads stay queryable until the emulator is reset.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`] for an unknown id.
    pub fn query_write_status(&self, upload_id: &str) -> StorageResult<WriteStatus> {
        self.state.with_upload(upload_id, Upload::status)
    }

    /// Cancel an open upload, discarding its buffered content.
    ///
    /// Always returns the terminal status of the call as a [`StorageError`]:
    /// a successful cancellation reports [`StorageError::RequestCancelled`]
    /// (HTTP 499 / RPC `CANCELLED`), a finished upload
    /// [`StorageError::AlreadyCancelled`], and an unknown id
    /// [`StorageError::UploadNotFound`].
    #[must_use]
    pub fn cancel_upload(&self, upload_id: &str) -> StorageError {
        let open = match self.state.with_upload(upload_id, Upload::is_open) {
            Ok(open) => open,
            Err(e) => return e,
        };
        if !open {
            return StorageError::AlreadyCancelled {
                upload_id: upload_id.to_owned(),
            };
        }
        match self.state.remove_upload(upload_id) {
            Ok(_) => {
                info!(upload_id = %upload_id, "cancelled upload");
                StorageError::RequestCancelled {
                    upload_id: upload_id.to_owned(),
                }
            }
            Err(e) => e,
        }
    }

    /// Open a streaming write for a new upload.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`].
    pub fn open_streaming_write(
        &self,
        bucket: &str,
        name: &str,
        spec: ObjectSpec,
        preconditions: Preconditions,
    ) -> StorageResult<StreamingWrite<'_>> {
        let upload_id = self.start_resumable_write(bucket, name, spec, preconditions)?;
        Ok(StreamingWrite {
            emulator: self,
            upload_id,
            finished: false,
        })
    }

    /// Attach a streaming write to an existing upload id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`] for an unknown id.
    pub fn resume_streaming_write(&self, upload_id: &str) -> StorageResult<StreamingWrite<'_>> {
        let status = self.query_write_status(upload_id)?;
        Ok(StreamingWrite {
            emulator: self,
            upload_id: upload_id.to_owned(),
            finished: status.complete,
        })
    }
}

/// A message-at-a-time view of an upload, as used by bidirectional write
/// streams: one [`push`](Self::push) per message, then [`close`](Self::close)
/// when the stream ends.
#[derive(Debug)]
pub struct StreamingWrite<'a> {
    emulator: &'a StorageEmulator,
    upload_id: String,
    finished: bool,
}

impl StreamingWrite<'_> {
    /// The underlying upload id.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Append one message's data; `finish` marks the last message.
    ///
    /// # Errors
    ///
    /// Same as [`StorageEmulator::write_chunk`].
    pub fn push(&mut self, data: &[u8], finish: bool) -> StorageResult<WriteStatus> {
        let status = self.emulator.write_chunk(&self.upload_id, data, finish)?;
        self.finished = status.complete;
        Ok(status)
    }

    /// Close the stream and return the materialized object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if the stream ended without
    /// a message that had the finish flag set.
    pub fn close(self) -> StorageResult<StorageObject> {
        if !self.finished {
            return Err(StorageError::invalid(
                "stream closed without finish_write set",
            ));
        }
        let object = self
            .emulator
            .state
            .with_upload(&self.upload_id, |upload| match &upload.state {
                UploadState::Complete { object, .. } => Some(object.clone()),
                UploadState::Open { .. } => None,
            })?
            .ok_or_else(|| {
                StorageError::invalid("stream closed without finish_write set")
            })?;
        self.emulator.get_object(
            &object.bucket,
            &object.name,
            Some(object.generation),
            &Preconditions::none(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::state::bucket::BucketSpec;

    fn emulator_with_bucket() -> StorageEmulator {
        let emulator = StorageEmulator::new(StorageConfig::default());
        emulator
            .insert_bucket(
                "bkt",
                BucketSpec {
                    project: "proj".to_owned(),
                    ..BucketSpec::default()
                },
            )
            .unwrap_or_else(|e| panic!("bucket setup failed: {e}"));
        emulator
    }

    fn start(emulator: &StorageEmulator) -> String {
        emulator
            .start_resumable_write("bkt", "obj", ObjectSpec::default(), Preconditions::none())
            .unwrap_or_else(|e| panic!("start failed: {e}"))
    }

    #[test]
    fn test_should_track_committed_size_across_chunks() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);

        let status = emulator
            .write_chunk(&id, b"hello ", false)
            .unwrap_or_else(|e| panic!("chunk failed: {e}"));
        assert_eq!(status.committed_size, 6);
        assert!(!status.complete);

        let status = emulator
            .query_write_status(&id)
            .unwrap_or_else(|e| panic!("status failed: {e}"));
        assert_eq!(status.committed_size, 6);
    }

    #[test]
    fn test_should_keep_object_invisible_until_finish() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);
        emulator
            .write_chunk(&id, b"partial", false)
            .unwrap_or_else(|e| panic!("chunk failed: {e}"));

        assert!(matches!(
            emulator.get_object("bkt", "obj", None, &Preconditions::none()),
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_should_materialize_object_on_finish() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);
        emulator
            .write_chunk(&id, b"hello ", false)
            .unwrap_or_else(|e| panic!("chunk failed: {e}"));
        let status = emulator
            .write_chunk(&id, b"world", true)
            .unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert!(status.complete);
        assert_eq!(status.committed_size, 11);

        let object = emulator
            .get_object("bkt", "obj", None, &Preconditions::none())
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(object.content.as_ref(), b"hello world");
        assert_eq!(object.generation, 1);
    }

    #[test]
    fn test_should_keep_completed_upload_queryable() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);
        emulator
            .write_chunk(&id, b"data", true)
            .unwrap_or_else(|e| panic!("finish failed: {e}"));

        let status = emulator
            .query_write_status(&id)
            .unwrap_or_else(|e| panic!("status failed: {e}"));
        assert!(status.complete);
        assert_eq!(status.committed_size, 4);

        // But no further data is accepted.
        assert!(matches!(
            emulator.write_chunk(&id, b"late", false),
            Err(StorageError::AlreadyCancelled { .. })
        ));
    }

    #[test]
    fn test_should_reevaluate_preconditions_at_finish() {
        let emulator = emulator_with_bucket();
        let id = emulator
            .start_resumable_write(
                "bkt",
                "obj",
                ObjectSpec::default(),
                Preconditions::generation_match(0),
            )
            .unwrap_or_else(|e| panic!("start failed: {e}"));

        // The key gains an object between start and finish.
        emulator
            .insert_object(
                "bkt",
                "obj",
                bytes::Bytes::from_static(b"raced"),
                ObjectSpec::default(),
                &Preconditions::none(),
            )
            .unwrap_or_else(|e| panic!("insert failed: {e}"));

        assert!(matches!(
            emulator.write_chunk(&id, b"data", true),
            Err(StorageError::PreconditionFailed { .. })
        ));
        // The upload survives the failed finish and is still open.
        let status = emulator
            .query_write_status(&id)
            .unwrap_or_else(|e| panic!("status failed: {e}"));
        assert!(!status.complete);
        assert_eq!(status.committed_size, 4);
    }

    #[test]
    fn test_should_cancel_open_upload() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);
        emulator
            .write_chunk(&id, b"buffered", false)
            .unwrap_or_else(|e| panic!("chunk failed: {e}"));

        assert!(matches!(
            emulator.cancel_upload(&id),
            StorageError::RequestCancelled { .. }
        ));
        // The record is gone: a re-cancel is NotFound.
        assert!(matches!(
            emulator.cancel_upload(&id),
            StorageError::UploadNotFound { .. }
        ));
        assert!(matches!(
            emulator.get_object("bkt", "obj", None, &Preconditions::none()),
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_should_refuse_to_cancel_finished_upload() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);
        emulator
            .write_chunk(&id, b"data", true)
            .unwrap_or_else(|e| panic!("finish failed: {e}"));

        assert!(matches!(
            emulator.cancel_upload(&id),
            StorageError::AlreadyCancelled { .. }
        ));
    }

    #[test]
    fn test_should_fail_unknown_upload_id() {
        let emulator = emulator_with_bucket();
        assert!(matches!(
            emulator.write_chunk("ghost", b"x", false),
            Err(StorageError::UploadNotFound { .. })
        ));
        assert!(matches!(
            emulator.query_write_status("ghost"),
            Err(StorageError::UploadNotFound { .. })
        ));
    }

    #[test]
    fn test_should_stream_messages_then_close() {
        let emulator = emulator_with_bucket();
        let mut stream = emulator
            .open_streaming_write("bkt", "obj", ObjectSpec::default(), Preconditions::none())
            .unwrap_or_else(|e| panic!("open failed: {e}"));

        stream
            .push(b"one ", false)
            .unwrap_or_else(|e| panic!("push failed: {e}"));
        stream
            .push(b"two", true)
            .unwrap_or_else(|e| panic!("push failed: {e}"));

        let object = stream
            .close()
            .unwrap_or_else(|e| panic!("close failed: {e}"));
        assert_eq!(object.content.as_ref(), b"one two");
    }

    #[test]
    fn test_should_reject_close_without_finish() {
        let emulator = emulator_with_bucket();
        let mut stream = emulator
            .open_streaming_write("bkt", "obj", ObjectSpec::default(), Preconditions::none())
            .unwrap_or_else(|e| panic!("open failed: {e}"));
        stream
            .push(b"data", false)
            .unwrap_or_else(|e| panic!("push failed: {e}"));

        assert!(matches!(
            stream.close(),
            Err(StorageError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_should_resume_stream_on_existing_upload() {
        let emulator = emulator_with_bucket();
        let id = start(&emulator);
        emulator
            .write_chunk(&id, b"first ", false)
            .unwrap_or_else(|e| panic!("chunk failed: {e}"));

        let mut stream = emulator
            .resume_streaming_write(&id)
            .unwrap_or_else(|e| panic!("resume failed: {e}"));
        stream
            .push(b"second", true)
            .unwrap_or_else(|e| panic!("push failed: {e}"));
        let object = stream
            .close()
            .unwrap_or_else(|e| panic!("close failed: {e}"));
        assert_eq!(object.content.as_ref(), b"first second");
    }
}
