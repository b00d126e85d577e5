//! Emulator configuration.
//!
//! Provides [`StorageConfig`] for configuring the GCStack storage emulator.
//! Configuration values are loaded from environment variables, matching the
//! conventions of the GCS client-library test suites (notably
//! `GOOGLE_CLOUD_CPP_STORAGE_TEST_BUCKET_NAME` for the seeded test bucket).

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Storage emulator configuration.
///
/// All fields have defaults suitable for running client-library tests
/// locally. Configuration can be loaded from environment variables via
/// [`StorageConfig::from_env`].
///
/// # Examples
///
/// ```
/// use gcstack_storage_core::config::StorageConfig;
///
/// let config = StorageConfig::default();
/// assert_eq!(config.test_bucket_name, "test-bucket");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Bind address for the gRPC adapter (e.g. `"[::]:8000"`).
    #[builder(default = String::from("[::]:8000"))]
    pub grpc_listen: String,

    /// Bind address for the REST adapter (e.g. `"localhost:9000"`).
    #[builder(default = String::from("localhost:9000"))]
    pub rest_listen: String,

    /// Name of the bucket seeded by the bootstrap call at the start of most
    /// operations.
    #[builder(default = String::from("test-bucket"))]
    pub test_bucket_name: String,

    /// Maximum number of bytes a single rewrite call copies before returning
    /// a continuation token.
    #[builder(default = 1_048_576)]
    pub rewrite_chunk_size: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            grpc_listen: String::from("[::]:8000"),
            rest_listen: String::from("localhost:9000"),
            test_bucket_name: String::from("test-bucket"),
            rewrite_chunk_size: 1_048_576,
            log_level: String::from("info"),
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GCSTACK_GRPC_LISTEN` | `[::]:8000` |
    /// | `GCSTACK_REST_LISTEN` | `localhost:9000` |
    /// | `GOOGLE_CLOUD_CPP_STORAGE_TEST_BUCKET_NAME` | `test-bucket` |
    /// | `GCSTACK_REWRITE_CHUNK_SIZE` | `1048576` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GCSTACK_GRPC_LISTEN") {
            config.grpc_listen = v;
        }
        if let Ok(v) = std::env::var("GCSTACK_REST_LISTEN") {
            config.rest_listen = v;
        }
        if let Ok(v) = std::env::var("GOOGLE_CLOUD_CPP_STORAGE_TEST_BUCKET_NAME") {
            config.test_bucket_name = v;
        }
        if let Ok(v) = std::env::var("GCSTACK_REWRITE_CHUNK_SIZE") {
            if let Ok(n) = v.parse::<u64>() {
                config.rewrite_chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}
