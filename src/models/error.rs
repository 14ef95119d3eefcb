use std::fmt;

use crate::models::containers::ContainerState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IndexError {
    ImageNotFound(String),
    ContainerNotFound(String),
    AlreadyExists(String),
    InUse { reference: String, usage_count: u32 },
    InvalidState { id: String, state: ContainerState },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::ImageNotFound(reference) => write!(f, "image {} is not indexed", reference),
            IndexError::ContainerNotFound(id) => write!(f, "container {} is not indexed", id),
            IndexError::AlreadyExists(key) => write!(f, "{} is already indexed", key),
            IndexError::InUse { reference, usage_count } => {
                write!(f, "image {} is used by {} container(s)", reference, usage_count)
            }
            IndexError::InvalidState { id, state } => write!(f, "container {} is {}", id, state),
        }
    }
}

impl std::error::Error for IndexError {}
