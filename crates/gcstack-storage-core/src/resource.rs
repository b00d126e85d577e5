//! Canonical-to-wire resource projections.
//!
//! One JSON-facing projection per resource type, shared by both protocol
//! adapters so the REST routes and the gRPC JSON transcoding produce
//! identical documents. Follows the GCS JSON API conventions: camelCase
//! field names, a `kind` discriminator on every resource, and int64 fields
//! (generations, sizes, retention periods) rendered as decimal strings.

use serde::{Deserialize, Serialize};

use crate::checksums::etag_for;
use crate::state::acl::{AclEntry, IamBinding, IamPolicy, NotificationConfig};
use crate::state::bucket::BucketState;
use crate::state::object::StorageObject;

/// `kind` value for bucket resources.
pub const KIND_BUCKET: &str = "storage#bucket";
/// `kind` value for bucket listings.
pub const KIND_BUCKETS: &str = "storage#buckets";
/// `kind` value for object resources.
pub const KIND_OBJECT: &str = "storage#object";
/// `kind` value for object listings.
pub const KIND_OBJECTS: &str = "storage#objects";
/// `kind` value for bucket ACL entries.
pub const KIND_BUCKET_ACL: &str = "storage#bucketAccessControl";
/// `kind` value for bucket ACL listings.
pub const KIND_BUCKET_ACLS: &str = "storage#bucketAccessControls";
/// `kind` value for object ACL entries.
pub const KIND_OBJECT_ACL: &str = "storage#objectAccessControl";
/// `kind` value for object ACL listings.
pub const KIND_OBJECT_ACLS: &str = "storage#objectAccessControls";
/// `kind` value for IAM policies.
pub const KIND_POLICY: &str = "storage#policy";
/// `kind` value for notification configs.
pub const KIND_NOTIFICATION: &str = "storage#notification";
/// `kind` value for notification listings.
pub const KIND_NOTIFICATIONS: &str = "storage#notifications";
/// `kind` value for rewrite responses.
pub const KIND_REWRITE: &str = "storage#rewriteResponse";
/// `kind` value for `testIamPermissions` responses.
pub const KIND_TEST_PERMISSIONS: &str = "storage#testIamPermissionsResponse";

/// Serde adapter rendering an `i64` as a decimal string, per the GCS JSON
/// API's int64 convention.
pub mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serialize the value as a decimal string.
    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Parse the value back from its decimal-string form.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Serde adapter rendering a `u64` as a decimal string.
pub mod uint64_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serialize the value as a decimal string.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Parse the value back from its decimal-string form.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// Wire form of a bucket's versioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningResource {
    /// Whether object versioning is enabled.
    pub enabled: bool,
}

/// Wire form of a bucket retention policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicyResource {
    /// Retention period in seconds, as a decimal string.
    #[serde(with = "int64_string")]
    pub retention_period: i64,
    /// RFC 3339 effective time.
    pub effective_time: String,
    /// Whether the policy is locked.
    pub is_locked: bool,
}

/// Wire form of a bucket resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketResource {
    /// Always [`KIND_BUCKET`].
    pub kind: String,
    /// Resource id; equals the bucket name.
    pub id: String,
    /// The bucket name.
    pub name: String,
    /// Bucket location.
    pub location: String,
    /// Storage class.
    pub storage_class: String,
    /// Metadata generation, as a decimal string.
    #[serde(with = "int64_string")]
    pub metageneration: i64,
    /// Versioning configuration.
    pub versioning: VersioningResource,
    /// Retention policy, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_policy: Option<RetentionPolicyResource>,
    /// Opaque entity tag.
    pub etag: String,
    /// RFC 3339 creation time.
    pub time_created: String,
    /// RFC 3339 last-update time.
    pub updated: String,
}

impl BucketResource {
    /// Project a bucket's current state into its wire form.
    #[must_use]
    pub fn from_state(state: &BucketState) -> Self {
        Self {
            kind: KIND_BUCKET.to_owned(),
            id: state.name().to_owned(),
            name: state.name().to_owned(),
            location: state.location.clone(),
            storage_class: state.storage_class.clone(),
            metageneration: state.metageneration,
            versioning: VersioningResource {
                enabled: state.versioning_enabled,
            },
            retention_policy: state.retention_policy.as_ref().map(|p| {
                RetentionPolicyResource {
                    retention_period: p.retention_period,
                    effective_time: p.effective_time.to_rfc3339(),
                    is_locked: p.is_locked,
                }
            }),
            etag: state.etag(),
            time_created: state.time_created.to_rfc3339(),
            updated: state.updated.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// Wire form of an object resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResource {
    /// Always [`KIND_OBJECT`].
    pub kind: String,
    /// Resource id: `bucket/name/generation`.
    pub id: String,
    /// The owning bucket.
    pub bucket: String,
    /// The object name.
    pub name: String,
    /// Content generation, as a decimal string.
    #[serde(with = "int64_string")]
    pub generation: i64,
    /// Metadata generation, as a decimal string.
    #[serde(with = "int64_string")]
    pub metageneration: i64,
    /// Content size in bytes, as a decimal string.
    #[serde(with = "uint64_string")]
    pub size: u64,
    /// MIME type, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Storage class.
    pub storage_class: String,
    /// Base64 MD5 digest of the content.
    pub md5_hash: String,
    /// Base64 big-endian CRC32C of the content.
    pub crc32c: String,
    /// Opaque entity tag.
    pub etag: String,
    /// User metadata, omitted when empty.
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty", default)]
    pub metadata: std::collections::HashMap<String, String>,
    /// RFC 3339 creation time of this generation.
    pub time_created: String,
    /// RFC 3339 last metadata update time.
    pub updated: String,
}

impl From<&StorageObject> for ObjectResource {
    fn from(object: &StorageObject) -> Self {
        Self {
            kind: KIND_OBJECT.to_owned(),
            id: format!("{}/{}/{}", object.bucket, object.name, object.generation),
            bucket: object.bucket.clone(),
            name: object.name.clone(),
            generation: object.generation,
            metageneration: object.metageneration,
            size: object.size,
            content_type: object.content_type.clone(),
            storage_class: object.storage_class.clone(),
            md5_hash: object.checksums.md5_hash.clone(),
            crc32c: object.checksums.crc32c.clone(),
            etag: object.etag(),
            metadata: object.metadata.clone(),
            time_created: object.time_created.to_rfc3339(),
            updated: object.updated.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

/// Wire form of a bucket ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAclResource {
    /// Always [`KIND_BUCKET_ACL`].
    pub kind: String,
    /// The owning bucket.
    pub bucket: String,
    /// The grantee entity.
    pub entity: String,
    /// The granted role.
    pub role: String,
}

impl BucketAclResource {
    /// Project one bucket ACL entry.
    #[must_use]
    pub fn new(bucket: &str, entry: &AclEntry) -> Self {
        Self {
            kind: KIND_BUCKET_ACL.to_owned(),
            bucket: bucket.to_owned(),
            entity: entry.entity.clone(),
            role: entry.role.clone(),
        }
    }
}

/// Wire form of an object ACL entry (also used for default-object ACLs,
/// where `object` is empty and `generation` is zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAclResource {
    /// Always [`KIND_OBJECT_ACL`].
    pub kind: String,
    /// The owning bucket.
    pub bucket: String,
    /// The owning object name; empty for default-object ACL entries.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub object: String,
    /// The owning object generation, as a decimal string.
    #[serde(with = "int64_string")]
    pub generation: i64,
    /// The grantee entity.
    pub entity: String,
    /// The granted role.
    pub role: String,
}

impl ObjectAclResource {
    /// Project one object ACL entry.
    #[must_use]
    pub fn new(object: &StorageObject, entry: &AclEntry) -> Self {
        Self {
            kind: KIND_OBJECT_ACL.to_owned(),
            bucket: object.bucket.clone(),
            object: object.name.clone(),
            generation: object.generation,
            entity: entry.entity.clone(),
            role: entry.role.clone(),
        }
    }

    /// Project one default-object ACL entry of a bucket.
    #[must_use]
    pub fn for_default(bucket: &str, entry: &AclEntry) -> Self {
        Self {
            kind: KIND_OBJECT_ACL.to_owned(),
            bucket: bucket.to_owned(),
            object: String::new(),
            generation: 0,
            entity: entry.entity.clone(),
            role: entry.role.clone(),
        }
    }
}

/// Wire form of a bucket IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResource {
    /// Always [`KIND_POLICY`].
    pub kind: String,
    /// The resource the policy is attached to.
    pub resource_id: String,
    /// The role bindings.
    pub bindings: Vec<IamBinding>,
    /// Opaque entity tag.
    pub etag: String,
}

impl PolicyResource {
    /// Project a bucket's IAM policy. The etag tracks the bucket
    /// metageneration, which every `set_iam_policy` call bumps.
    #[must_use]
    pub fn new(bucket: &str, policy: &IamPolicy, metageneration: i64) -> Self {
        Self {
            kind: KIND_POLICY.to_owned(),
            resource_id: format!("projects/_/buckets/{bucket}"),
            bindings: policy.bindings.clone(),
            etag: etag_for(0, metageneration),
        }
    }
}

/// Wire form of a notification config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResource {
    /// Always [`KIND_NOTIFICATION`].
    pub kind: String,
    /// Server-assigned id.
    pub id: String,
    /// Destination Pub/Sub topic.
    pub topic: String,
    /// Payload format.
    pub payload_format: String,
    /// Event-type filter; empty means all events.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub event_types: Vec<String>,
    /// Custom attributes attached to notifications.
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty", default)]
    pub custom_attributes: std::collections::HashMap<String, String>,
}

impl From<&NotificationConfig> for NotificationResource {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            kind: KIND_NOTIFICATION.to_owned(),
            id: config.id.clone(),
            topic: config.topic.clone(),
            payload_format: config.payload_format.clone(),
            event_types: config.event_types.clone(),
            custom_attributes: config.custom_attributes.clone(),
        }
    }
}

/// Wire form of a `testIamPermissions` response: the requested permissions
/// echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPermissionsResource {
    /// Always [`KIND_TEST_PERMISSIONS`].
    pub kind: String,
    /// The permissions the caller asked about.
    pub permissions: Vec<String>,
}

impl TestPermissionsResource {
    /// Echo the requested permissions.
    #[must_use]
    pub fn new(permissions: Vec<String>) -> Self {
        Self {
            kind: KIND_TEST_PERMISSIONS.to_owned(),
            permissions,
        }
    }
}

// ---------------------------------------------------------------------------
// Rewrite & listings
// ---------------------------------------------------------------------------

/// Wire form of one rewrite step's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResource {
    /// Always [`KIND_REWRITE`].
    pub kind: String,
    /// Bytes copied so far, as a decimal string.
    #[serde(with = "uint64_string")]
    pub total_bytes_rewritten: u64,
    /// Source object size, as a decimal string.
    #[serde(with = "uint64_string")]
    pub object_size: u64,
    /// Whether the rewrite has finished.
    pub done: bool,
    /// Continuation token; present iff not done.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite_token: Option<String>,
    /// The finished destination object; present iff done.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ObjectResource>,
}

/// Generic wire form of a listing response.
///
/// `nextPageToken` is always empty: the emulator returns full listings in
/// one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// The listing kind discriminator.
    pub kind: String,
    /// Always empty.
    pub next_page_token: String,
    /// The listed resources.
    pub items: Vec<T>,
    /// Rolled-up prefixes, for delimited object listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<Vec<String>>,
}

impl<T> ListResponse<T> {
    /// Build a single-page listing of `items`.
    #[must_use]
    pub fn new(kind: &str, items: Vec<T>) -> Self {
        Self {
            kind: kind.to_owned(),
            next_page_token: String::new(),
            items,
            prefixes: None,
        }
    }

    /// Attach rolled-up prefixes (object listings with a delimiter).
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = Some(prefixes);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::Value;

    use super::*;
    use crate::state::bucket::{Bucket, BucketSpec};
    use crate::state::object::ObjectSpec;

    fn sample_object() -> StorageObject {
        let mut object = StorageObject::from_spec(
            "bucket".to_owned(),
            "obj".to_owned(),
            ObjectSpec {
                content_type: Some("text/plain".to_owned()),
                ..ObjectSpec::default()
            },
            Bytes::from_static(b"hello world"),
        );
        object.generation = 7;
        object
    }

    fn to_json<T: Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or_else(|e| panic!("serialization failed: {e}"))
    }

    #[test]
    fn test_should_render_int64_fields_as_strings() {
        let json = to_json(&ObjectResource::from(&sample_object()));
        assert_eq!(json["generation"], Value::String("7".to_owned()));
        assert_eq!(json["metageneration"], Value::String("1".to_owned()));
        assert_eq!(json["size"], Value::String("11".to_owned()));
    }

    #[test]
    fn test_should_carry_object_kind_and_id() {
        let json = to_json(&ObjectResource::from(&sample_object()));
        assert_eq!(json["kind"], Value::String(KIND_OBJECT.to_owned()));
        assert_eq!(json["id"], Value::String("bucket/obj/7".to_owned()));
        assert_eq!(json["crc32c"], Value::String("yZRlqg==".to_owned()));
    }

    #[test]
    fn test_should_parse_int64_strings_back() {
        let resource = ObjectResource::from(&sample_object());
        let json = serde_json::to_string(&resource)
            .unwrap_or_else(|e| panic!("serialization failed: {e}"));
        let parsed: ObjectResource =
            serde_json::from_str(&json).unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(parsed.generation, 7);
        assert_eq!(parsed.size, 11);
    }

    #[test]
    fn test_should_project_bucket_resource() {
        let bucket = Bucket::new(
            "bucket",
            BucketSpec {
                versioning_enabled: true,
                retention_period: Some(60),
                ..BucketSpec::default()
            },
        );
        let json = to_json(&BucketResource::from_state(&bucket.read()));
        assert_eq!(json["kind"], Value::String(KIND_BUCKET.to_owned()));
        assert_eq!(json["metageneration"], Value::String("1".to_owned()));
        assert_eq!(json["versioning"]["enabled"], Value::Bool(true));
        assert_eq!(
            json["retentionPolicy"]["retentionPeriod"],
            Value::String("60".to_owned())
        );
    }

    #[test]
    fn test_should_omit_retention_policy_when_absent() {
        let bucket = Bucket::new("bucket", BucketSpec::default());
        let json = to_json(&BucketResource::from_state(&bucket.read()));
        assert!(json.get("retentionPolicy").is_none());
    }

    #[test]
    fn test_should_project_acl_resources() {
        let entry = AclEntry {
            entity: "allUsers".to_owned(),
            role: "READER".to_owned(),
        };
        let bucket_acl = to_json(&BucketAclResource::new("bucket", &entry));
        assert_eq!(bucket_acl["kind"], Value::String(KIND_BUCKET_ACL.to_owned()));

        let object_acl = to_json(&ObjectAclResource::new(&sample_object(), &entry));
        assert_eq!(object_acl["kind"], Value::String(KIND_OBJECT_ACL.to_owned()));
        assert_eq!(object_acl["generation"], Value::String("7".to_owned()));

        // Default-object ACL entries have no object or generation to name.
        let default_acl = to_json(&ObjectAclResource::for_default("bucket", &entry));
        assert!(default_acl.get("object").is_none());
    }

    #[test]
    fn test_should_project_policy_with_resource_id() {
        let policy = IamPolicy {
            bindings: vec![IamBinding {
                role: "roles/storage.objectViewer".to_owned(),
                members: vec!["allUsers".to_owned()],
            }],
            version: 1,
        };
        let json = to_json(&PolicyResource::new("bucket", &policy, 3));
        assert_eq!(json["kind"], Value::String(KIND_POLICY.to_owned()));
        assert_eq!(
            json["resourceId"],
            Value::String("projects/_/buckets/bucket".to_owned())
        );
    }

    #[test]
    fn test_should_render_empty_page_token_on_listings() {
        let listing = ListResponse::new(
            KIND_OBJECTS,
            vec![ObjectResource::from(&sample_object())],
        )
        .with_prefixes(vec!["dir/".to_owned()]);

        let json = to_json(&listing);
        assert_eq!(json["kind"], Value::String(KIND_OBJECTS.to_owned()));
        assert_eq!(json["nextPageToken"], Value::String(String::new()));
        assert_eq!(json["prefixes"][0], Value::String("dir/".to_owned()));
    }

    #[test]
    fn test_should_omit_rewrite_token_when_done() {
        let rewrite = RewriteResource {
            kind: KIND_REWRITE.to_owned(),
            total_bytes_rewritten: 11,
            object_size: 11,
            done: true,
            rewrite_token: None,
            resource: Some(ObjectResource::from(&sample_object())),
        };
        let json = to_json(&rewrite);
        assert!(json.get("rewriteToken").is_none());
        assert_eq!(json["totalBytesRewritten"], Value::String("11".to_owned()));
    }
}
