//! Storage-emulator error types.
//!
//! Defines [`StorageError`], the protocol-independent error taxonomy for the
//! emulation engine. Every variant maps to both an HTTP status code (for the
//! REST adapter) and an [`RpcCode`] (for the gRPC adapter) through methods on
//! the enum, so the adapters translate the core's decision instead of
//! re-deriving it.
//!
//! # Usage
//!
//! ```
//! use gcstack_storage_core::error::{RpcCode, StorageError};
//!
//! let err = StorageError::BucketNotFound {
//!     bucket: "my-bucket".to_owned(),
//! };
//! assert_eq!(err.http_status().as_u16(), 404);
//! assert_eq!(err.rpc_code(), RpcCode::NotFound);
//! ```

use http::StatusCode;

/// HTTP status reported for an explicitly cancelled resumable upload.
///
/// 499 ("client closed request") is outside the named `StatusCode` constants
/// but inside the valid range; it is what real clients observe when they
/// `DELETE` an in-progress upload session.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Canonical RPC status codes used by the gRPC adapter.
///
/// A small subset of the gRPC canonical codes — only the ones the emulation
/// engine can actually produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    /// The operation was explicitly cancelled.
    Cancelled,
    /// A request argument was malformed or missing.
    InvalidArgument,
    /// A referenced entity does not exist.
    NotFound,
    /// An entity the operation tried to create already exists.
    AlreadyExists,
    /// The caller lacks permission for the operation.
    PermissionDenied,
    /// A caller-supplied precondition did not hold.
    FailedPrecondition,
    /// An internal invariant was violated.
    Internal,
}

/// Storage emulation error type.
///
/// Each variant carries enough detail (offending identifier, expected vs.
/// actual value) for client-library tests to assert on it. Validation always
/// happens before mutation, so an error implies no observable state change —
/// with the single documented exception of [`StorageError::RequestCancelled`],
/// which is the deliberate outcome of a successful upload cancellation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The referenced bucket does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The referenced object (or object generation) does not exist.
    #[error("object not found: {bucket}/{name}{}", .generation.map(|g| format!("#{g}")).unwrap_or_default())]
    ObjectNotFound {
        /// The bucket searched.
        bucket: String,
        /// The object name that was not found.
        name: String,
        /// The specific generation requested, if any.
        generation: Option<i64>,
    },

    /// The referenced upload session does not exist.
    #[error("upload not found: {upload_id}")]
    UploadNotFound {
        /// The upload id that was not found.
        upload_id: String,
    },

    /// The referenced ACL entity is not present in the list.
    #[error("ACL entity not found: {entity}")]
    AclEntryNotFound {
        /// The entity string that was not found.
        entity: String,
    },

    /// The referenced notification configuration does not exist.
    #[error("notification config not found: {id}")]
    NotificationNotFound {
        /// The notification id that was not found.
        id: String,
    },

    /// The supplied rewrite token does not correspond to an in-flight rewrite.
    #[error("rewrite token not found: {token}")]
    RewriteTokenNotFound {
        /// The invalid or expired token.
        token: String,
    },

    /// A bucket with the requested name already exists.
    #[error("bucket already exists: {bucket}")]
    BucketAlreadyExists {
        /// The name that is already taken.
        bucket: String,
    },

    /// A caller-supplied generation/metageneration precondition did not hold.
    #[error("precondition {condition} failed: expected {expected}, actual {actual}")]
    PreconditionFailed {
        /// The precondition field that failed (e.g. `ifGenerationMatch`).
        condition: &'static str,
        /// The value the caller required ("not N" for not-match conditions).
        expected: String,
        /// The entity's current value.
        actual: String,
    },

    /// A request argument was malformed, missing, or out of range.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The operation targets an upload that was already cancelled or completed.
    #[error("upload already finalized or cancelled: {upload_id}")]
    AlreadyCancelled {
        /// The upload id in its terminal state.
        upload_id: String,
    },

    /// An open resumable upload was explicitly cancelled.
    ///
    /// This is the outcome of a successful `cancel_upload` call, distinct
    /// from ordinary success: the REST adapter must answer HTTP 499 and the
    /// gRPC adapter `CANCELLED`, so retrying it as a normal delete is not
    /// idempotent-safe.
    #[error("upload cancelled: {upload_id}")]
    RequestCancelled {
        /// The upload id that was cancelled.
        upload_id: String,
    },

    /// The bucket's retention policy is locked and cannot be weakened.
    #[error("retention policy is locked on bucket: {bucket}")]
    RetentionPolicyLocked {
        /// The bucket with the locked policy.
        bucket: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StorageError {
    /// The HTTP status the REST adapter reports for this error.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::BucketNotFound { .. }
            | Self::ObjectNotFound { .. }
            | Self::UploadNotFound { .. }
            | Self::AclEntryNotFound { .. }
            | Self::NotificationNotFound { .. }
            | Self::RewriteTokenNotFound { .. } => StatusCode::NOT_FOUND,
            Self::BucketAlreadyExists { .. } => StatusCode::CONFLICT,
            Self::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            Self::InvalidArgument { .. } | Self::AlreadyCancelled { .. } => StatusCode::BAD_REQUEST,
            Self::RequestCancelled { .. } => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::RetentionPolicyLocked { .. } => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The RPC status code the gRPC adapter reports for this error.
    #[must_use]
    pub fn rpc_code(&self) -> RpcCode {
        match self {
            Self::BucketNotFound { .. }
            | Self::ObjectNotFound { .. }
            | Self::UploadNotFound { .. }
            | Self::AclEntryNotFound { .. }
            | Self::NotificationNotFound { .. }
            | Self::RewriteTokenNotFound { .. } => RpcCode::NotFound,
            Self::BucketAlreadyExists { .. } => RpcCode::AlreadyExists,
            Self::PreconditionFailed { .. } | Self::AlreadyCancelled { .. } => {
                RpcCode::FailedPrecondition
            }
            Self::InvalidArgument { .. } => RpcCode::InvalidArgument,
            Self::RequestCancelled { .. } => RpcCode::Cancelled,
            Self::RetentionPolicyLocked { .. } => RpcCode::PermissionDenied,
            Self::Internal(_) => RpcCode::Internal,
        }
    }

    /// Shorthand for an [`StorageError::InvalidArgument`] with a formatted message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
