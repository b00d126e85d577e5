//! Checksum computation for stored objects.
//!
//! GCS reports two content checksums on every object: CRC32C (Castagnoli,
//! base64 of the big-endian digest) and MD5 (`md5Hash`, base64 of the raw
//! digest). Both are computed once at materialization time, since object
//! content is immutable after creation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// The checksum fields attached to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChecksums {
    /// Base64-encoded big-endian CRC32C of the content.
    pub crc32c: String,
    /// Base64-encoded MD5 digest of the content.
    pub md5_hash: String,
}

impl ObjectChecksums {
    /// Compute both checksums over the full object content.
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let crc = crc32c::crc32c(data);
        let md5 = Md5::digest(data);
        Self {
            crc32c: BASE64_STANDARD.encode(crc.to_be_bytes()),
            md5_hash: BASE64_STANDARD.encode(md5),
        }
    }
}

/// Derive an opaque entity tag for an object or bucket revision.
///
/// Real GCS etags are opaque tokens derived from generation and
/// metageneration; clients only compare them for equality, so any stable
/// derivation works.
#[must_use]
pub fn etag_for(generation: i64, metageneration: i64) -> String {
    hex::encode(format!("{generation}/{metageneration}"))
}
