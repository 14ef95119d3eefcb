use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::error::IndexError;

pub(crate) const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ImageReference {
    pub(crate) name: String,
    pub(crate) tag: String,
}

impl ImageReference {
    pub(crate) fn new(name: &str, tag: &str) -> Self {
        ImageReference {
            name: name.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl FromStr for ImageReference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err("image reference is empty".to_string());
        }

        // A colon before the last '/' belongs to a registry host, not a tag.
        let (name, tag) = match value.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (value, DEFAULT_TAG),
        };

        if name.is_empty() || tag.is_empty() {
            return Err(format!("invalid image reference '{}'", value));
        }

        Ok(ImageReference::new(name, tag))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ImageRecord {
    pub(crate) reference: ImageReference,
    pub(crate) content_id: String,
    pub(crate) source_dir: PathBuf,
    pub(crate) usage_count: u32,
    pub(crate) created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub(crate) fn new(reference: ImageReference, content_id: String, source_dir: &Path) -> Self {
        ImageRecord {
            reference,
            content_id,
            source_dir: source_dir.to_path_buf(),
            usage_count: 0,
            created_at: Utc::now(),
        }
    }
}

// `None` marks a record deleted while other tasks were queued on its lock.
type Slot = Arc<Mutex<Option<ImageRecord>>>;

/// Images built through this service, keyed by reference.
///
/// Each reference owns its own async lock so a caller can hold it across a
/// daemon call (usage check then removal, lookup then container create).
#[derive(Default)]
pub(crate) struct ImageIndex {
    slots: RwLock<HashMap<ImageReference, Slot>>,
    building: StdMutex<HashSet<ImageReference>>,
    content_ids: RwLock<HashMap<ImageReference, String>>,
}

/// Exclusive hold on one indexed image.
pub(crate) struct ImageLease {
    reference: ImageReference,
    guard: OwnedMutexGuard<Option<ImageRecord>>,
}

/// Claim on a reference whose build is in flight. Dropping it releases the claim.
pub(crate) struct ImageReservation<'a> {
    index: &'a ImageIndex,
    reference: ImageReference,
}

impl ImageIndex {
    pub(crate) fn new() -> Self {
        ImageIndex::default()
    }

    pub(crate) fn reserve(&self, reference: &ImageReference) -> Result<ImageReservation<'_>, IndexError> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut building = self.building.lock().unwrap_or_else(PoisonError::into_inner);

        if slots.contains_key(reference) || !building.insert(reference.clone()) {
            return Err(IndexError::AlreadyExists(reference.to_string()));
        }

        Ok(ImageReservation {
            index: self,
            reference: reference.clone(),
        })
    }

    pub(crate) async fn lock(&self, reference: &ImageReference) -> Result<ImageLease, IndexError> {
        let slot = {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            slots.get(reference).cloned()
        };

        let slot = slot.ok_or_else(|| IndexError::ImageNotFound(reference.to_string()))?;
        let guard = slot.lock_owned().await;

        if guard.is_none() {
            return Err(IndexError::ImageNotFound(reference.to_string()));
        }

        Ok(ImageLease {
            reference: reference.clone(),
            guard,
        })
    }

    pub(crate) async fn get(&self, reference: &ImageReference) -> Result<ImageRecord, IndexError> {
        let lease = self.lock(reference).await?;
        Ok(lease.record().clone())
    }

    /// Deletes the record held by `lease`, refusing while containers still use it.
    pub(crate) fn remove(&self, mut lease: ImageLease) -> Result<ImageRecord, IndexError> {
        let usage_count = lease.record().usage_count;
        if usage_count > 0 {
            return Err(IndexError::InUse {
                reference: lease.reference.to_string(),
                usage_count,
            });
        }

        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&lease.reference);
        self.content_ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&lease.reference);

        let record = lease.guard.take();
        record.ok_or_else(|| IndexError::ImageNotFound(lease.reference.to_string()))
    }

    pub(crate) fn content_id_of(&self, reference: &ImageReference) -> Option<String> {
        self.content_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
    }

    pub(crate) fn references_with_content_id(&self, content_id: &str) -> Vec<ImageReference> {
        let content_ids = self.content_ids.read().unwrap_or_else(PoisonError::into_inner);
        let mut references: Vec<ImageReference> = content_ids
            .iter()
            .filter(|(_, id)| id.as_str() == content_id)
            .map(|(reference, _)| reference.clone())
            .collect();
        references.sort();
        references
    }
}

impl ImageReservation<'_> {
    pub(crate) fn put(self, record: ImageRecord) -> Result<(), IndexError> {
        assert_eq!(record.reference, self.reference, "image record stored under a foreign reservation");

        let mut slots = self.index.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&self.reference) {
            return Err(IndexError::AlreadyExists(self.reference.to_string()));
        }

        self.index
            .content_ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.reference.clone(), record.content_id.clone());
        slots.insert(self.reference.clone(), Arc::new(Mutex::new(Some(record))));

        debug!("Image {} indexed", self.reference);
        Ok(())
    }
}

impl Drop for ImageReservation<'_> {
    fn drop(&mut self) {
        self.index
            .building
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.reference);
    }
}

impl ImageLease {
    pub(crate) fn record(&self) -> &ImageRecord {
        match self.guard.as_ref() {
            Some(record) => record,
            None => unreachable!("lease on image {} outlived its record", self.reference),
        }
    }

    pub(crate) fn increment_usage(&mut self) {
        if let Some(record) = self.guard.as_mut() {
            record.usage_count += 1;
            debug!("Image {} usage count is now {}", record.reference, record.usage_count);
        }
    }

    pub(crate) fn decrement_usage(&mut self) {
        if let Some(record) = self.guard.as_mut() {
            assert!(record.usage_count > 0, "usage count of image {} would go negative", record.reference);
            record.usage_count -= 1;
            debug!("Image {} usage count is now {}", record.reference, record.usage_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reference: &str, content_id: &str) -> ImageRecord {
        ImageRecord::new(reference.parse().unwrap(), content_id.to_string(), Path::new("/tmp/context"))
    }

    #[test]
    fn test_parse_reference_defaults_tag_to_latest() {
        let reference: ImageReference = "test-image".parse().unwrap();
        assert_eq!(reference, ImageReference::new("test-image", "latest"));
        assert_eq!(reference.to_string(), "test-image:latest");
    }

    #[test]
    fn test_parse_reference_with_tag() {
        let reference: ImageReference = "test-image:1.2".parse().unwrap();
        assert_eq!(reference.name, "test-image");
        assert_eq!(reference.tag, "1.2");
    }

    #[test]
    fn test_parse_reference_with_registry_port() {
        let reference: ImageReference = "localhost:5000/team/app".parse().unwrap();
        assert_eq!(reference.name, "localhost:5000/team/app");
        assert_eq!(reference.tag, "latest");

        let reference: ImageReference = "localhost:5000/team/app:v2".parse().unwrap();
        assert_eq!(reference.name, "localhost:5000/team/app");
        assert_eq!(reference.tag, "v2");
    }

    #[test]
    fn test_parse_reference_rejects_empty_parts() {
        assert!("".parse::<ImageReference>().is_err());
        assert!("app:".parse::<ImageReference>().is_err());
        assert!(":v1".parse::<ImageReference>().is_err());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let index = ImageIndex::new();
        let reference: ImageReference = "test-image:latest".parse().unwrap();

        index.reserve(&reference).unwrap().put(record("test-image:latest", "sha256:aaa")).unwrap();

        let stored = index.get(&reference).await.unwrap();
        assert_eq!(stored.content_id, "sha256:aaa");
        assert_eq!(stored.usage_count, 0);
        assert_eq!(index.content_id_of(&reference), Some("sha256:aaa".to_string()));
    }

    #[tokio::test]
    async fn test_get_unknown_reference() {
        let index = ImageIndex::new();
        let reference: ImageReference = "ghost:latest".parse().unwrap();
        assert_eq!(
            index.get(&reference).await.unwrap_err(),
            IndexError::ImageNotFound("ghost:latest".to_string())
        );
    }

    #[test]
    fn test_reserve_rejects_concurrent_build_and_existing_record() {
        let index = ImageIndex::new();
        let reference: ImageReference = "test-image:latest".parse().unwrap();

        let reservation = index.reserve(&reference).unwrap();
        assert!(matches!(index.reserve(&reference), Err(IndexError::AlreadyExists(_))));

        reservation.put(record("test-image:latest", "sha256:aaa")).unwrap();
        assert!(matches!(index.reserve(&reference), Err(IndexError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_dropped_reservation_leaves_no_record() {
        let index = ImageIndex::new();
        let reference: ImageReference = "test-image:latest".parse().unwrap();

        drop(index.reserve(&reference).unwrap());

        assert_eq!(index.content_id_of(&reference), None);
        assert!(index.get(&reference).await.is_err());
        assert!(index.reserve(&reference).is_ok());
    }

    #[tokio::test]
    async fn test_remove_refuses_while_in_use() {
        let index = ImageIndex::new();
        let reference: ImageReference = "test-image:latest".parse().unwrap();
        index.reserve(&reference).unwrap().put(record("test-image:latest", "sha256:aaa")).unwrap();

        let mut lease = index.lock(&reference).await.unwrap();
        lease.increment_usage();
        drop(lease);

        let lease = index.lock(&reference).await.unwrap();
        assert_eq!(
            index.remove(lease).unwrap_err(),
            IndexError::InUse { reference: "test-image:latest".to_string(), usage_count: 1 }
        );

        let mut lease = index.lock(&reference).await.unwrap();
        lease.decrement_usage();
        let removed = index.remove(lease).unwrap();
        assert_eq!(removed.usage_count, 0);
        assert_eq!(index.content_id_of(&reference), None);
    }

    #[tokio::test]
    #[should_panic(expected = "would go negative")]
    async fn test_decrement_below_zero_panics() {
        let index = ImageIndex::new();
        let reference: ImageReference = "test-image:latest".parse().unwrap();
        index.reserve(&reference).unwrap().put(record("test-image:latest", "sha256:aaa")).unwrap();

        let mut lease = index.lock(&reference).await.unwrap();
        lease.decrement_usage();
    }

    #[tokio::test]
    async fn test_waiter_sees_removal() {
        let index = Arc::new(ImageIndex::new());
        let reference: ImageReference = "test-image:latest".parse().unwrap();
        index.reserve(&reference).unwrap().put(record("test-image:latest", "sha256:aaa")).unwrap();

        let lease = index.lock(&reference).await.unwrap();

        let waiter = {
            let index = Arc::clone(&index);
            let reference = reference.clone();
            tokio::spawn(async move { index.lock(&reference).await.map(|_| ()) })
        };

        tokio::task::yield_now().await;
        index.remove(lease).unwrap();

        assert!(matches!(waiter.await.unwrap(), Err(IndexError::ImageNotFound(_))));
    }

    #[test]
    fn test_references_with_content_id() {
        let index = ImageIndex::new();
        for (reference, content_id) in [("app:v1", "sha256:aaa"), ("app:latest", "sha256:aaa"), ("db:latest", "sha256:bbb")] {
            let parsed: ImageReference = reference.parse().unwrap();
            index.reserve(&parsed).unwrap().put(record(reference, content_id)).unwrap();
        }

        let references = index.references_with_content_id("sha256:aaa");
        assert_eq!(references, vec![ImageReference::new("app", "latest"), ImageReference::new("app", "v1")]);
        assert!(index.references_with_content_id("sha256:ccc").is_empty());
    }
}
