//! Per-bucket object index.
//!
//! [`ObjectIndex`] maps object names to their generation chains and owns the
//! bucket's generation counter. All mutations happen under the owning
//! bucket's write lock, which makes generation allocation atomic with the
//! existence check: two concurrent creates of the same key both succeed with
//! distinct, strictly increasing generations and the latest pointer reflects
//! the last writer to commit.
//!
//! Names are kept in insertion order (an order vector layered over the name
//! map) so listings are deterministic for tests. Deleting a generation
//! removes exactly that entry; remaining generations of the same name stay
//! individually addressable, with the newest remaining one serving reads by
//! bare name.

use std::collections::HashMap;

use tracing::debug;

use crate::error::StorageResult;
use crate::preconditions::Preconditions;
use crate::state::object::StorageObject;

/// Result of a `list_objects` operation.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    /// Matching objects, in bucket insertion order.
    pub items: Vec<StorageObject>,
    /// Common prefixes when a delimiter is used, in first-seen order.
    pub prefixes: Vec<String>,
}

/// Listing parameters.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsQuery {
    /// Only names starting with this prefix are returned.
    pub prefix: Option<String>,
    /// Names containing this delimiter after the prefix are rolled up into
    /// `prefixes` instead of being listed.
    pub delimiter: Option<String>,
    /// When true, every retained generation is listed, not only the newest.
    pub versions: bool,
}

/// All generations of one object name, oldest first.
#[derive(Debug, Default)]
struct GenerationChain {
    versions: Vec<StorageObject>,
}

impl GenerationChain {
    fn newest(&self) -> Option<&StorageObject> {
        self.versions.last()
    }
}

/// The name-to-generations index of one bucket.
#[derive(Debug)]
pub struct ObjectIndex {
    /// Next generation to assign. Monotonic for the bucket's lifetime, so
    /// generations are never reused even across deletions.
    next_generation: i64,
    /// Object names in insertion order.
    order: Vec<String>,
    /// Name to generation chain. A name is present iff its chain is non-empty.
    chains: HashMap<String, GenerationChain>,
}

impl Default for ObjectIndex {
    fn default() -> Self {
        Self {
            next_generation: 1,
            order: Vec::new(),
            chains: HashMap::new(),
        }
    }
}

impl ObjectIndex {
    /// The newest retained generation for a name.
    #[must_use]
    pub fn newest(&self, name: &str) -> Option<&StorageObject> {
        self.chains.get(name).and_then(GenerationChain::newest)
    }

    /// Get an object by name, optionally pinning a specific generation.
    #[must_use]
    pub fn get(&self, name: &str, generation: Option<i64>) -> Option<&StorageObject> {
        match generation {
            None => self.newest(name),
            Some(g) => self
                .chains
                .get(name)
                .and_then(|chain| chain.versions.iter().find(|o| o.generation == g)),
        }
    }

    /// Mutable access to an object, for metadata updates.
    pub fn get_mut(&mut self, name: &str, generation: Option<i64>) -> Option<&mut StorageObject> {
        let chain = self.chains.get_mut(name)?;
        match generation {
            None => chain.versions.last_mut(),
            Some(g) => chain.versions.iter_mut().find(|o| o.generation == g),
        }
    }

    /// Create a new generation for `object.name`.
    ///
    /// Evaluates `preconditions` against the newest live generation, then
    /// assigns the next generation in the same critical section. When
    /// versioning is disabled the prior generations of the name are dropped,
    /// mirroring an overwrite; with versioning enabled they are retained.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PreconditionFailed`] if a supplied
    /// precondition does not hold; nothing is changed in that case.
    ///
    /// [`StorageError::PreconditionFailed`]: crate::error::StorageError::PreconditionFailed
    pub fn create(
        &mut self,
        mut object: StorageObject,
        preconditions: &Preconditions,
        versioning_enabled: bool,
    ) -> StorageResult<StorageObject> {
        let current = self.newest(&object.name).map(StorageObject::versions);
        preconditions.check(current)?;

        object.generation = self.next_generation;
        self.next_generation += 1;

        let name = object.name.clone();
        let chain = self.chains.entry(name.clone()).or_default();
        if chain.versions.is_empty() {
            self.order.push(name.clone());
        } else if !versioning_enabled {
            chain.versions.clear();
        }
        debug!(name = %name, generation = object.generation, "stored object generation");
        chain.versions.push(object.clone());
        Ok(object)
    }

    /// Remove one generation (the newest when `generation` is `None`).
    ///
    /// Returns the removed object, or `None` if the name or generation does
    /// not exist.
    pub fn delete(&mut self, name: &str, generation: Option<i64>) -> Option<StorageObject> {
        let chain = self.chains.get_mut(name)?;
        let pos = match generation {
            None => chain.versions.len().checked_sub(1)?,
            Some(g) => chain.versions.iter().position(|o| o.generation == g)?,
        };
        let removed = chain.versions.remove(pos);
        if chain.versions.is_empty() {
            self.chains.remove(name);
            self.order.retain(|n| n != name);
        }
        debug!(name, generation = removed.generation, "removed object generation");
        Some(removed)
    }

    /// List objects, honoring prefix/delimiter grouping and the versions flag.
    #[must_use]
    pub fn list(&self, query: &ListObjectsQuery) -> ObjectListing {
        let prefix = query.prefix.as_deref().unwrap_or("");
        let delimiter = query.delimiter.as_deref().unwrap_or("");
        let mut listing = ObjectListing::default();

        for name in &self.order {
            if !name.starts_with(prefix) {
                continue;
            }
            if !delimiter.is_empty() {
                let after_prefix = &name[prefix.len()..];
                if let Some(pos) = after_prefix.find(delimiter) {
                    let rolled = format!("{prefix}{}{delimiter}", &after_prefix[..pos]);
                    if !listing.prefixes.contains(&rolled) {
                        listing.prefixes.push(rolled);
                    }
                    continue;
                }
            }
            let Some(chain) = self.chains.get(name) else {
                continue;
            };
            if query.versions {
                listing.items.extend(chain.versions.iter().cloned());
            } else if let Some(newest) = chain.newest() {
                listing.items.push(newest.clone());
            }
        }

        listing
    }

    /// Count of names with at least one retained generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no object is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::StorageError;
    use crate::state::object::ObjectSpec;

    fn make_object(name: &str, content: &'static [u8]) -> StorageObject {
        StorageObject::from_spec(
            "bucket".to_owned(),
            name.to_owned(),
            ObjectSpec::default(),
            Bytes::from_static(content),
        )
    }

    fn create(index: &mut ObjectIndex, name: &str, content: &'static [u8]) -> StorageObject {
        index
            .create(make_object(name, content), &Preconditions::none(), true)
            .unwrap_or_else(|e| panic!("create {name} failed: {e}"))
    }

    #[test]
    fn test_should_assign_strictly_increasing_generations() {
        let mut index = ObjectIndex::default();
        let g1 = create(&mut index, "obj", b"a").generation;
        let g2 = create(&mut index, "obj", b"b").generation;
        let g3 = create(&mut index, "other", b"c").generation;
        assert!(g1 < g2 && g2 < g3);
    }

    #[test]
    fn test_should_never_reuse_generations_across_deletions() {
        let mut index = ObjectIndex::default();
        let g1 = create(&mut index, "obj", b"a").generation;
        index.delete("obj", None);
        let g2 = create(&mut index, "obj", b"b").generation;
        assert!(g2 > g1, "generation {g2} must exceed deleted {g1}");
    }

    #[test]
    fn test_should_return_newest_generation_by_name() {
        let mut index = ObjectIndex::default();
        create(&mut index, "obj", b"v1");
        let g2 = create(&mut index, "obj", b"v2").generation;

        let got = index.get("obj", None);
        assert_eq!(got.map(|o| o.generation), Some(g2));
        assert_eq!(got.map(|o| o.content.as_ref()), Some(b"v2".as_slice()));
    }

    #[test]
    fn test_should_get_pinned_generation() {
        let mut index = ObjectIndex::default();
        let g1 = create(&mut index, "obj", b"v1").generation;
        create(&mut index, "obj", b"v2");

        let old = index.get("obj", Some(g1));
        assert_eq!(old.map(|o| o.content.as_ref()), Some(b"v1".as_slice()));
        assert!(index.get("obj", Some(999)).is_none());
    }

    #[test]
    fn test_should_drop_prior_generations_without_versioning() {
        let mut index = ObjectIndex::default();
        let g1 = index
            .create(make_object("obj", b"v1"), &Preconditions::none(), false)
            .unwrap_or_else(|e| panic!("create failed: {e}"))
            .generation;
        index
            .create(make_object("obj", b"v2"), &Preconditions::none(), false)
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        assert!(index.get("obj", Some(g1)).is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_should_retain_older_generations_with_versioning() {
        let mut index = ObjectIndex::default();
        let g1 = create(&mut index, "obj", b"v1").generation;
        let g2 = create(&mut index, "obj", b"v2").generation;

        // Deleting the newest exposes the older generation by name.
        index.delete("obj", None);
        assert_eq!(index.get("obj", None).map(|o| o.generation), Some(g1));
        assert!(index.get("obj", Some(g2)).is_none());
    }

    #[test]
    fn test_should_delete_specific_generation() {
        let mut index = ObjectIndex::default();
        let g1 = create(&mut index, "obj", b"v1").generation;
        let g2 = create(&mut index, "obj", b"v2").generation;

        let removed = index.delete("obj", Some(g1));
        assert_eq!(removed.map(|o| o.generation), Some(g1));
        assert_eq!(index.get("obj", None).map(|o| o.generation), Some(g2));
    }

    #[test]
    fn test_should_remove_name_when_last_generation_deleted() {
        let mut index = ObjectIndex::default();
        create(&mut index, "obj", b"v1");
        index.delete("obj", None);
        assert!(index.is_empty());
        assert!(index.get("obj", None).is_none());
        assert!(index.delete("obj", None).is_none());
    }

    #[test]
    fn test_should_reject_create_on_failed_precondition() {
        let mut index = ObjectIndex::default();
        let g1 = create(&mut index, "obj", b"v1").generation;

        let result = index.create(
            make_object("obj", b"v2"),
            &Preconditions::generation_match(g1 + 1),
            true,
        );
        assert!(matches!(
            result,
            Err(StorageError::PreconditionFailed { .. })
        ));
        // No state change on failure.
        assert_eq!(index.get("obj", None).map(|o| o.generation), Some(g1));
    }

    #[test]
    fn test_should_honor_generation_match_zero_on_create() {
        let mut index = ObjectIndex::default();
        index
            .create(
                make_object("fresh", b"x"),
                &Preconditions::generation_match(0),
                true,
            )
            .unwrap_or_else(|e| panic!("create failed: {e}"));

        let result = index.create(
            make_object("fresh", b"y"),
            &Preconditions::generation_match(0),
            true,
        );
        assert!(matches!(
            result,
            Err(StorageError::PreconditionFailed { .. })
        ));
    }

    #[test]
    fn test_should_list_in_insertion_order() {
        let mut index = ObjectIndex::default();
        for name in ["zebra", "alpha", "mango"] {
            create(&mut index, name, b"x");
        }
        let listing = index.list(&ListObjectsQuery::default());
        let names: Vec<&str> = listing.items.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["zebra", "alpha", "mango"]);
    }

    #[test]
    fn test_should_list_with_prefix_and_delimiter() {
        let mut index = ObjectIndex::default();
        for name in [
            "photos/2023/jan.jpg",
            "photos/2023/feb.jpg",
            "photos/2024/mar.jpg",
            "docs/readme.txt",
        ] {
            create(&mut index, name, b"x");
        }

        let listing = index.list(&ListObjectsQuery {
            prefix: Some("photos/".to_owned()),
            delimiter: Some("/".to_owned()),
            versions: false,
        });
        assert!(listing.items.is_empty());
        assert_eq!(
            listing.prefixes,
            vec!["photos/2023/".to_owned(), "photos/2024/".to_owned()]
        );

        let listing = index.list(&ListObjectsQuery {
            prefix: Some("photos/2023/".to_owned()),
            delimiter: Some("/".to_owned()),
            versions: false,
        });
        assert_eq!(listing.items.len(), 2);
        assert!(listing.prefixes.is_empty());
    }

    #[test]
    fn test_should_list_all_generations_with_versions_flag() {
        let mut index = ObjectIndex::default();
        create(&mut index, "obj", b"v1");
        create(&mut index, "obj", b"v2");

        let current = index.list(&ListObjectsQuery::default());
        assert_eq!(current.items.len(), 1);

        let all = index.list(&ListObjectsQuery {
            versions: true,
            ..ListObjectsQuery::default()
        });
        assert_eq!(all.items.len(), 2);
        assert!(all.items[0].generation < all.items[1].generation);
    }
}
