use std::fmt;

use crate::models::containers::ContainerState;
use crate::models::error::IndexError;
use crate::runtime::error::RuntimeError;

#[derive(Debug)]
pub(crate) enum EngineError {
    ImageNotFound(String),
    ImageAlreadyExists(String),
    ContainerNotFound(String),
    ImageInUse { reference: String, containers: Vec<String> },
    InvalidState { id: String, state: ContainerState, operation: &'static str },
    StopFailed(Vec<(String, EngineError)>),
    Runtime(RuntimeError),
    Timeout(RuntimeError),
}

impl EngineError {
    /// Maps an index refusal raised while running `operation`.
    pub(crate) fn from_index(operation: &'static str) -> impl FnOnce(IndexError) -> EngineError {
        move |err| match err {
            IndexError::ImageNotFound(reference) => EngineError::ImageNotFound(reference),
            IndexError::ContainerNotFound(id) => EngineError::ContainerNotFound(id),
            IndexError::AlreadyExists(reference) => EngineError::ImageAlreadyExists(reference),
            IndexError::InUse { reference, .. } => EngineError::ImageInUse { reference, containers: vec![] },
            IndexError::InvalidState { id, state } => EngineError::InvalidState { id, state, operation },
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ImageNotFound(_) => write!(f, "Image not found"),
            EngineError::ImageAlreadyExists(reference) => write!(f, "Image already exists: {}", reference),
            EngineError::ContainerNotFound(id) => write!(f, "Error response from daemon: No such container: {}", id),
            EngineError::ImageInUse { reference, containers } => {
                write!(f, "Unable to delete {}: image is being used by running container", reference)?;
                if !containers.is_empty() {
                    write!(f, " {}", containers.join(", "))?;
                }
                Ok(())
            }
            EngineError::InvalidState { id, state, operation } => {
                write!(f, "Cannot {} container {}: container is {}", operation, id, state)
            }
            EngineError::StopFailed(failures) => {
                let details: Vec<String> = failures
                    .iter()
                    .map(|(id, err)| format!("{}: {}", id, err))
                    .collect();
                write!(f, "{}", details.join("; "))
            }
            EngineError::Runtime(err) => write!(f, "{}", err),
            EngineError::Timeout(err) => write!(f, "{}; the daemon may still complete the request", err),
        }
    }
}

impl std::error::Error for EngineError {}
