//! Upload records and rewrite progress state.
//!
//! An [`Upload`] is the server-side record of a resumable or streamed write:
//! an accumulating buffer while open, the materialized object reference once
//! finished. Cancelled uploads are removed from the registry outright, so
//! the state machine only models OPEN and COMPLETE; a later append or cancel
//! against a COMPLETE record is an illegal transition and is rejected, never
//! silently applied. Completed records stay queryable so clients can poll
//! write status after the finishing call.

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::preconditions::Preconditions;
use crate::state::object::{ObjectPatch, ObjectRef, ObjectSpec};

/// Where an upload stands.
#[derive(Debug, Clone)]
pub enum UploadState {
    /// Accepting data. `buffer` holds everything committed so far.
    Open {
        /// Bytes committed so far, in arrival order.
        buffer: BytesMut,
    },
    /// Finished; the object is visible under `object`.
    Complete {
        /// The materialized object.
        object: ObjectRef,
        /// Final object size, reported as the committed size from now on.
        size: u64,
    },
}

/// Reported write progress: `(committed_size, complete)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStatus {
    /// Bytes durably accepted so far.
    pub committed_size: u64,
    /// Whether the upload has materialized its object.
    pub complete: bool,
}

/// A resumable or streamed upload in progress.
#[derive(Debug, Clone)]
pub struct Upload {
    /// The server-assigned upload id.
    pub upload_id: String,
    /// Destination bucket name.
    pub bucket: String,
    /// Destination object name.
    pub name: String,
    /// Metadata template for the object to materialize.
    pub spec: ObjectSpec,
    /// Preconditions captured at start, re-evaluated at materialization.
    pub preconditions: Preconditions,
    /// Current state.
    pub state: UploadState,
}

impl Upload {
    /// Open a new upload with a fresh id.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        name: impl Into<String>,
        spec: ObjectSpec,
        preconditions: Preconditions,
    ) -> Self {
        Self {
            upload_id: Uuid::new_v4().to_string(),
            bucket: bucket.into(),
            name: name.into(),
            spec,
            preconditions,
            state: UploadState::Open {
                buffer: BytesMut::new(),
            },
        }
    }

    /// Append a chunk and return the new committed size.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyCancelled`] when the upload has
    /// already completed.
    pub fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        match &mut self.state {
            UploadState::Open { buffer } => {
                buffer.extend_from_slice(data);
                Ok(buffer.len() as u64)
            }
            UploadState::Complete { .. } => Err(StorageError::AlreadyCancelled {
                upload_id: self.upload_id.clone(),
            }),
        }
    }

    /// Current write progress.
    #[must_use]
    pub fn status(&self) -> WriteStatus {
        match &self.state {
            UploadState::Open { buffer } => WriteStatus {
                committed_size: buffer.len() as u64,
                complete: false,
            },
            UploadState::Complete { size, .. } => WriteStatus {
                committed_size: *size,
                complete: true,
            },
        }
    }

    /// Take the buffered content for materialization.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyCancelled`] when the upload has
    /// already completed.
    pub fn take_content(&mut self) -> StorageResult<Bytes> {
        match &mut self.state {
            UploadState::Open { buffer } => Ok(std::mem::take(buffer).freeze()),
            UploadState::Complete { .. } => Err(StorageError::AlreadyCancelled {
                upload_id: self.upload_id.clone(),
            }),
        }
    }

    /// Record the materialized object, moving OPEN → COMPLETE.
    pub fn complete(&mut self, object: ObjectRef, size: u64) {
        self.state = UploadState::Complete { object, size };
    }

    /// Whether the upload is still accepting data.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state, UploadState::Open { .. })
    }
}

/// Token-keyed progress of one rewrite operation.
#[derive(Debug, Clone)]
pub struct RewriteState {
    /// The rewrite token handed back to the caller.
    pub token: String,
    /// The pinned source generation the rewrite copies from.
    pub source: ObjectRef,
    /// Destination bucket name.
    pub dest_bucket: String,
    /// Destination object name.
    pub dest_name: String,
    /// Metadata overrides applied to the destination after creation.
    pub overrides: ObjectPatch,
    /// Destination preconditions, checked when the rewrite finalizes.
    pub preconditions: Preconditions,
    /// Bytes copied so far. Monotonic.
    pub bytes_rewritten: u64,
    /// Total source size.
    pub total_bytes: u64,
}

impl RewriteState {
    /// Start tracking a rewrite with a fresh token.
    #[must_use]
    pub fn new(
        source: ObjectRef,
        dest_bucket: impl Into<String>,
        dest_name: impl Into<String>,
        overrides: ObjectPatch,
        preconditions: Preconditions,
        total_bytes: u64,
    ) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            source,
            dest_bucket: dest_bucket.into(),
            dest_name: dest_name.into(),
            overrides,
            preconditions,
            bytes_rewritten: 0,
            total_bytes,
        }
    }

    /// Advance progress by one chunk; returns whether all bytes are copied.
    pub fn advance(&mut self, chunk_size: u64) -> bool {
        self.bytes_rewritten = (self.bytes_rewritten + chunk_size).min(self.total_bytes);
        self.is_done()
    }

    /// Whether every source byte has been accounted for.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.bytes_rewritten >= self.total_bytes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn open_upload() -> Upload {
        Upload::new("bucket", "obj", ObjectSpec::default(), Preconditions::none())
    }

    #[test]
    fn test_should_accumulate_committed_size() {
        let mut upload = open_upload();
        assert_eq!(upload.status().committed_size, 0);

        let after_first = upload
            .append(b"hello ")
            .unwrap_or_else(|e| panic!("append failed: {e}"));
        assert_eq!(after_first, 6);

        let after_second = upload
            .append(b"world")
            .unwrap_or_else(|e| panic!("append failed: {e}"));
        assert_eq!(after_second, 11);
        assert!(!upload.status().complete);
    }

    #[test]
    fn test_should_assign_unique_upload_ids() {
        assert_ne!(open_upload().upload_id, open_upload().upload_id);
    }

    #[test]
    fn test_should_take_buffered_content_in_order() {
        let mut upload = open_upload();
        upload
            .append(b"abc")
            .unwrap_or_else(|e| panic!("append failed: {e}"));
        upload
            .append(b"def")
            .unwrap_or_else(|e| panic!("append failed: {e}"));

        let content = upload
            .take_content()
            .unwrap_or_else(|e| panic!("take failed: {e}"));
        assert_eq!(content.as_ref(), b"abcdef");
    }

    #[test]
    fn test_should_report_final_size_after_completion() {
        let mut upload = open_upload();
        upload
            .append(b"data")
            .unwrap_or_else(|e| panic!("append failed: {e}"));
        upload.complete(
            ObjectRef {
                bucket: "bucket".to_owned(),
                name: "obj".to_owned(),
                generation: 1,
            },
            4,
        );

        let status = upload.status();
        assert!(status.complete);
        assert_eq!(status.committed_size, 4);
        assert!(!upload.is_open());
    }

    #[test]
    fn test_should_reject_append_after_completion() {
        let mut upload = open_upload();
        upload.complete(
            ObjectRef {
                bucket: "bucket".to_owned(),
                name: "obj".to_owned(),
                generation: 1,
            },
            0,
        );
        assert!(matches!(
            upload.append(b"late"),
            Err(StorageError::AlreadyCancelled { .. })
        ));
        assert!(matches!(
            upload.take_content(),
            Err(StorageError::AlreadyCancelled { .. })
        ));
    }

    #[test]
    fn test_should_advance_rewrite_monotonically() {
        let source = ObjectRef {
            bucket: "b".to_owned(),
            name: "src".to_owned(),
            generation: 3,
        };
        let mut rewrite = RewriteState::new(
            source,
            "b",
            "dst",
            ObjectPatch::default(),
            Preconditions::none(),
            10,
        );

        assert!(!rewrite.advance(4));
        assert_eq!(rewrite.bytes_rewritten, 4);
        assert!(!rewrite.advance(4));
        assert_eq!(rewrite.bytes_rewritten, 8);
        // Final chunk clamps to the total.
        assert!(rewrite.advance(4));
        assert_eq!(rewrite.bytes_rewritten, 10);
    }

    #[test]
    fn test_should_complete_empty_rewrite_immediately() {
        let source = ObjectRef {
            bucket: "b".to_owned(),
            name: "src".to_owned(),
            generation: 1,
        };
        let rewrite = RewriteState::new(
            source,
            "b",
            "dst",
            ObjectPatch::default(),
            Preconditions::none(),
            0,
        );
        assert!(rewrite.is_done());
    }
}
