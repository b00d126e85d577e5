//! Generation and metageneration precondition evaluation.
//!
//! Every object-mutating operation may carry a [`Preconditions`] set, and
//! bucket-mutating operations a [`BucketPreconditions`] set. All supplied
//! conditions are evaluated against the current entity state *before* the
//! mutation is applied; if any fails the whole call is rejected with
//! [`StorageError::PreconditionFailed`] and no state changes occur.
//!
//! A missing object is treated as generation 0 / metageneration 0, which
//! gives `ifGenerationMatch: 0` its GCS meaning of "the object must not
//! exist".

use crate::error::{StorageError, StorageResult};

/// Object-level preconditions supplied by a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preconditions {
    /// The mutation applies only if the live generation equals this value
    /// (0 = the object must not exist).
    pub if_generation_match: Option<i64>,
    /// The mutation applies only if the live generation differs from this value.
    pub if_generation_not_match: Option<i64>,
    /// The mutation applies only if the metageneration equals this value.
    pub if_metageneration_match: Option<i64>,
    /// The mutation applies only if the metageneration differs from this value.
    pub if_metageneration_not_match: Option<i64>,
}

impl Preconditions {
    /// Preconditions that always hold.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Shorthand for a bare `ifGenerationMatch` condition.
    #[must_use]
    pub fn generation_match(generation: i64) -> Self {
        Self {
            if_generation_match: Some(generation),
            ..Self::default()
        }
    }

    /// Shorthand for a bare `ifMetagenerationMatch` condition.
    #[must_use]
    pub fn metageneration_match(metageneration: i64) -> Self {
        Self {
            if_metageneration_match: Some(metageneration),
            ..Self::default()
        }
    }

    /// Whether no condition was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate all supplied conditions against the current live state of a
    /// (bucket, name) key.
    ///
    /// `current` is the `(generation, metageneration)` of the live object, or
    /// `None` when no live object exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PreconditionFailed`] naming the first failing
    /// condition with expected and actual values.
    pub fn check(&self, current: Option<(i64, i64)>) -> StorageResult<()> {
        let (generation, metageneration) = current.unwrap_or((0, 0));

        if let Some(expected) = self.if_generation_match {
            if generation != expected {
                return Err(failed("ifGenerationMatch", expected, generation));
            }
        }
        if let Some(forbidden) = self.if_generation_not_match {
            if generation == forbidden {
                return Err(failed_not("ifGenerationNotMatch", forbidden, generation));
            }
        }
        if let Some(expected) = self.if_metageneration_match {
            if metageneration != expected {
                return Err(failed("ifMetagenerationMatch", expected, metageneration));
            }
        }
        if let Some(forbidden) = self.if_metageneration_not_match {
            if metageneration == forbidden {
                return Err(failed_not(
                    "ifMetagenerationNotMatch",
                    forbidden,
                    metageneration,
                ));
            }
        }

        Ok(())
    }
}

/// Bucket-level metageneration preconditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketPreconditions {
    /// The mutation applies only if the bucket metageneration equals this value.
    pub if_metageneration_match: Option<i64>,
    /// The mutation applies only if the bucket metageneration differs from
    /// this value.
    pub if_metageneration_not_match: Option<i64>,
}

impl BucketPreconditions {
    /// Preconditions that always hold.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Shorthand for a bare `ifMetagenerationMatch` condition.
    #[must_use]
    pub fn metageneration_match(metageneration: i64) -> Self {
        Self {
            if_metageneration_match: Some(metageneration),
            if_metageneration_not_match: None,
        }
    }

    /// Evaluate the supplied conditions against the bucket's metageneration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PreconditionFailed`] naming the failing
    /// condition.
    pub fn check(&self, metageneration: i64) -> StorageResult<()> {
        if let Some(expected) = self.if_metageneration_match {
            if metageneration != expected {
                return Err(failed("ifMetagenerationMatch", expected, metageneration));
            }
        }
        if let Some(forbidden) = self.if_metageneration_not_match {
            if metageneration == forbidden {
                return Err(failed_not(
                    "ifMetagenerationNotMatch",
                    forbidden,
                    metageneration,
                ));
            }
        }
        Ok(())
    }
}

fn failed(condition: &'static str, expected: i64, actual: i64) -> StorageError {
    StorageError::PreconditionFailed {
        condition,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn failed_not(condition: &'static str, forbidden: i64, actual: i64) -> StorageError {
    StorageError::PreconditionFailed {
        condition,
        expected: format!("not {forbidden}"),
        actual: actual.to_string(),
    }
}
