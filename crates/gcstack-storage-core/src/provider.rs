//! The storage emulator provider.
//!
//! [`StorageEmulator`] is the explicitly constructed root object that owns
//! all service state and configuration. Both protocol adapters (gRPC and
//! REST) hold the same instance and call the operations in [`crate::ops`]
//! through it; nothing in the crate relies on global state.

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;
use crate::state::bucket::BucketSpec;
use crate::state::service::StorageState;

/// The project that the seeded test bucket belongs to.
pub const TEST_PROJECT: &str = "test-project";

/// The main storage emulator instance.
///
/// All fields are `Arc`-wrapped for cheap cloning and shared ownership
/// across handler threads.
///
/// # Examples
///
/// ```
/// use gcstack_storage_core::StorageEmulator;
/// use gcstack_storage_core::config::StorageConfig;
///
/// let emulator = StorageEmulator::new(StorageConfig::default());
/// assert!(!emulator.config().test_bucket_name.is_empty());
/// ```
#[derive(Debug)]
pub struct StorageEmulator {
    /// Bucket, upload and rewrite state.
    pub(crate) state: Arc<StorageState>,
    /// Emulator configuration.
    pub(crate) config: Arc<StorageConfig>,
}

impl StorageEmulator {
    /// Create a new emulator with the given configuration.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            state: Arc::new(StorageState::new()),
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the service state.
    #[must_use]
    pub fn state(&self) -> &StorageState {
        &self.state
    }

    /// Returns a reference to the emulator configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Ensure the configured test bucket exists.
    ///
    /// Client-library test suites expect a pre-seeded bucket whose name comes
    /// from `GOOGLE_CLOUD_CPP_STORAGE_TEST_BUCKET_NAME`, with versioning
    /// enabled and a metageneration of 4 so metageneration-sensitive tests
    /// start from a known value. Idempotent: an existing bucket is left
    /// untouched.
    pub fn seed_test_bucket(&self) {
        let name = &self.config.test_bucket_name;
        let spec = BucketSpec {
            project: TEST_PROJECT.to_owned(),
            versioning_enabled: true,
            ..BucketSpec::default()
        };
        let Ok(bucket) = self.state.insert_bucket(name, spec) else {
            return;
        };
        bucket.write().metageneration = 4;
        info!(bucket = %name, "seeded test bucket");
    }

    /// Reset all state (buckets, objects, uploads, rewrites).
    ///
    /// Primarily useful for tests that reuse one emulator instance.
    pub fn reset(&self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_emulator_with_defaults() {
        let emulator = StorageEmulator::new(StorageConfig::default());
        assert_eq!(emulator.config().test_bucket_name, "test-bucket");
        assert!(emulator.state().bucket("test-bucket").is_err());
    }

    #[test]
    fn test_should_seed_test_bucket() {
        let emulator = StorageEmulator::new(StorageConfig::default());
        emulator.seed_test_bucket();

        let bucket = emulator
            .state()
            .bucket("test-bucket")
            .unwrap_or_else(|e| panic!("seed missing: {e}"));
        let state = bucket.read();
        assert_eq!(state.metageneration, 4);
        assert!(state.versioning_enabled);
        assert_eq!(state.project, TEST_PROJECT);
    }

    #[test]
    fn test_should_seed_idempotently() {
        let emulator = StorageEmulator::new(StorageConfig::default());
        emulator.seed_test_bucket();

        {
            let bucket = emulator
                .state()
                .bucket("test-bucket")
                .unwrap_or_else(|e| panic!("seed missing: {e}"));
            bucket.write().bump_metageneration();
        }
        emulator.seed_test_bucket();

        let bucket = emulator
            .state()
            .bucket("test-bucket")
            .unwrap_or_else(|e| panic!("seed missing: {e}"));
        // A second seed call must not recreate or rewind the bucket.
        assert_eq!(bucket.read().metageneration, 5);
    }

    #[test]
    fn test_should_honor_configured_bucket_name() {
        let config = StorageConfig::builder()
            .test_bucket_name("custom-seed".into())
            .build();
        let emulator = StorageEmulator::new(config);
        emulator.seed_test_bucket();
        assert!(emulator.state().bucket("custom-seed").is_ok());
    }

    #[test]
    fn test_should_reset_state() {
        let emulator = StorageEmulator::new(StorageConfig::default());
        emulator.seed_test_bucket();
        emulator.reset();
        assert!(emulator.state().bucket("test-bucket").is_err());
    }

    #[test]
    fn test_should_share_via_arc() {
        let emulator = Arc::new(StorageEmulator::new(StorageConfig::default()));
        let clone = Arc::clone(&emulator);
        clone.seed_test_bucket();
        assert!(emulator.state().bucket("test-bucket").is_ok());
    }
}
