use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use crate::models::error::IndexError;
use crate::models::images::ImageReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ContainerState {
    Created,
    Running,
    Stopped,
    Removed,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Host port published to a container port (tcp).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PortBinding {
    pub(crate) host_port: u16,
    pub(crate) container_port: u16,
}

impl FromStr for PortBinding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parse = |port: &str| {
            port.trim()
                .parse::<u16>()
                .map_err(|_| format!("Invalid port '{}'", value))
        };

        match value.split_once(':') {
            Some((host, container)) => Ok(PortBinding {
                host_port: parse(host)?,
                container_port: parse(container)?,
            }),
            None => {
                let port = parse(value)?;
                Ok(PortBinding { host_port: port, container_port: port })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ContainerRecord {
    pub(crate) id: String,
    pub(crate) image_reference: ImageReference,
    pub(crate) port_binding: Option<PortBinding>,
    pub(crate) bind_address: String,
    pub(crate) network: Option<String>,
    pub(crate) state: ContainerState,
    pub(crate) ip_address: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl ContainerRecord {
    pub(crate) fn new(id: String, image_reference: ImageReference, port_binding: Option<PortBinding>, bind_address: String) -> Self {
        ContainerRecord {
            id,
            image_reference,
            port_binding,
            bind_address,
            network: None,
            state: ContainerState::Created,
            ip_address: None,
            created_at: Utc::now(),
        }
    }
}

/// Containers created through this service.
///
/// Records in the `Removed` state are being deleted and are invisible to
/// lookups; they only come back if the deletion is rolled back.
#[derive(Default)]
pub(crate) struct ContainerIndex {
    records: Mutex<HashMap<String, ContainerRecord>>,
}

impl ContainerIndex {
    pub(crate) fn new() -> Self {
        ContainerIndex::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, ContainerRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn put(&self, record: ContainerRecord) -> Result<(), IndexError> {
        let mut records = self.records();
        if records.contains_key(&record.id) {
            return Err(IndexError::AlreadyExists(record.id));
        }

        debug!("Container {} indexed for image {}", record.id, record.image_reference);
        records.insert(record.id.clone(), record);
        Ok(())
    }

    pub(crate) fn get(&self, id: &str) -> Result<ContainerRecord, IndexError> {
        self.records()
            .get(id)
            .filter(|record| record.state != ContainerState::Removed)
            .cloned()
            .ok_or_else(|| IndexError::ContainerNotFound(id.to_string()))
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }

    /// Atomically moves `id` from one of `from` to `to`, returning the record as it was.
    pub(crate) fn transition(&self, id: &str, from: &[ContainerState], to: ContainerState) -> Result<ContainerRecord, IndexError> {
        let mut records = self.records();
        let record = records
            .get_mut(id)
            .filter(|record| record.state != ContainerState::Removed)
            .ok_or_else(|| IndexError::ContainerNotFound(id.to_string()))?;

        if !from.contains(&record.state) {
            return Err(IndexError::InvalidState {
                id: id.to_string(),
                state: record.state,
            });
        }

        let previous = record.clone();
        record.state = to;
        debug!("Container {} {} -> {}", id, previous.state, to);
        Ok(previous)
    }

    /// Restores `previous` if the record is still in `expected`. Returns whether it did.
    pub(crate) fn revert(&self, previous: &ContainerRecord, expected: ContainerState) -> bool {
        let mut records = self.records();
        match records.get_mut(&previous.id) {
            Some(record) if record.state == expected => {
                debug!("Container {} {} -> {} (rollback)", previous.id, record.state, previous.state);
                record.state = previous.state;
                record.network = previous.network.clone();
                record.ip_address = previous.ip_address.clone();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn update(&self, id: &str, f: impl FnOnce(&mut ContainerRecord)) -> Result<(), IndexError> {
        let mut records = self.records();
        let record = records
            .get_mut(id)
            .ok_or_else(|| IndexError::ContainerNotFound(id.to_string()))?;
        f(record);
        Ok(())
    }

    pub(crate) fn remove(&self, id: &str) -> Result<ContainerRecord, IndexError> {
        self.records()
            .remove(id)
            .ok_or_else(|| IndexError::ContainerNotFound(id.to_string()))
    }

    /// Live containers backed by any of `references`.
    pub(crate) fn ids_by_images(&self, references: &[ImageReference]) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records()
            .values()
            .filter(|record| record.state != ContainerState::Removed)
            .filter(|record| references.contains(&record.image_reference))
            .map(|record| record.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(id: &str, image: &str) -> ContainerRecord {
        ContainerRecord::new(id.to_string(), image.parse().unwrap(), None, "0.0.0.0".to_string())
    }

    #[test]
    fn test_parse_single_port_binds_same_port() {
        let binding: PortBinding = "8080".parse().unwrap();
        assert_eq!(binding, PortBinding { host_port: 8080, container_port: 8080 });
    }

    #[test]
    fn test_parse_host_and_container_port() {
        let binding: PortBinding = "8081:80".parse().unwrap();
        assert_eq!(binding, PortBinding { host_port: 8081, container_port: 80 });
    }

    #[test]
    fn test_parse_invalid_port() {
        assert_eq!("http".parse::<PortBinding>().unwrap_err(), "Invalid port 'http'");
        assert!("70000".parse::<PortBinding>().is_err());
        assert!("80:".parse::<PortBinding>().is_err());
    }

    #[test]
    fn test_put_rejects_duplicate_id() {
        let index = ContainerIndex::new();
        index.put(record("abc", "app")).unwrap();
        assert_eq!(index.put(record("abc", "app")).unwrap_err(), IndexError::AlreadyExists("abc".to_string()));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let index = ContainerIndex::new();
        index.put(record("abc", "app")).unwrap();

        let previous = index.transition("abc", &[ContainerState::Created, ContainerState::Stopped], ContainerState::Running).unwrap();
        assert_eq!(previous.state, ContainerState::Created);
        assert_eq!(index.get("abc").unwrap().state, ContainerState::Running);

        index.transition("abc", &[ContainerState::Running], ContainerState::Stopped).unwrap();
        index.transition("abc", &[ContainerState::Created, ContainerState::Stopped], ContainerState::Running).unwrap();
        assert_eq!(index.get("abc").unwrap().state, ContainerState::Running);
    }

    #[test]
    fn test_transition_from_disallowed_state() {
        let index = ContainerIndex::new();
        index.put(record("abc", "app")).unwrap();

        assert_eq!(
            index.transition("abc", &[ContainerState::Running], ContainerState::Stopped).unwrap_err(),
            IndexError::InvalidState { id: "abc".to_string(), state: ContainerState::Created }
        );
        assert_eq!(index.get("abc").unwrap().state, ContainerState::Created);
    }

    #[test]
    fn test_removed_records_are_invisible() {
        let index = ContainerIndex::new();
        index.put(record("abc", "app")).unwrap();
        let previous = index.transition("abc", &[ContainerState::Created], ContainerState::Removed).unwrap();

        assert!(!index.contains("abc"));
        assert!(matches!(
            index.transition("abc", &[ContainerState::Removed], ContainerState::Running),
            Err(IndexError::ContainerNotFound(_))
        ));
        assert!(index.ids_by_images(&["app".parse().unwrap()]).is_empty());

        assert!(index.revert(&previous, ContainerState::Removed));
        assert_eq!(index.get("abc").unwrap().state, ContainerState::Created);
    }

    #[test]
    fn test_revert_skips_records_moved_on() {
        let index = ContainerIndex::new();
        index.put(record("abc", "app")).unwrap();
        let previous = index.transition("abc", &[ContainerState::Created], ContainerState::Running).unwrap();
        index.transition("abc", &[ContainerState::Running], ContainerState::Stopped).unwrap();

        assert!(!index.revert(&previous, ContainerState::Running));
        assert_eq!(index.get("abc").unwrap().state, ContainerState::Stopped);
    }

    #[test]
    fn test_concurrent_start_has_single_winner() {
        let index = Arc::new(ContainerIndex::new());
        index.put(record("abc", "app")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    index.transition("abc", &[ContainerState::Created, ContainerState::Stopped], ContainerState::Running)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|err| matches!(err, IndexError::InvalidState { state: ContainerState::Running, .. })));
    }

    #[test]
    fn test_ids_by_images() {
        let index = ContainerIndex::new();
        index.put(record("b", "app:v1")).unwrap();
        index.put(record("a", "app:v1")).unwrap();
        index.put(record("c", "db")).unwrap();

        assert_eq!(index.ids_by_images(&["app:v1".parse().unwrap()]), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(index.ids_by_images(&["db:latest".parse().unwrap()]), vec!["c".to_string()]);
    }
}
