mod container;
mod image;

use async_trait::async_trait;
use bollard::Docker;
use std::path::Path;

use crate::models::containers::PortBinding;
use crate::models::images::ImageReference;
use crate::runtime::error::RuntimeError;
use crate::runtime::runtime::{Inspection, RuntimeInterface};

impl From<bollard::errors::Error> for RuntimeError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match err {
            Error::DockerResponseServerError { status_code: 404, message } => {
                RuntimeError::NotFound(daemon_message(&message))
            }
            Error::DockerResponseServerError { message, .. } => RuntimeError::Daemon(daemon_message(&message)),
            Error::DockerStreamError { error } => RuntimeError::Daemon(error),
            Error::RequestTimeoutError => RuntimeError::ConnectionFailed("request to the Docker daemon timed out".to_string()),
            other => {
                let err_msg = other.to_string();
                if err_msg.contains("No such container") || err_msg.contains("No such image") {
                    RuntimeError::NotFound(err_msg)
                } else {
                    RuntimeError::Daemon(err_msg)
                }
            }
        }
    }
}

// Same wording as the docker CLI, callers match on it.
pub(crate) fn daemon_message(message: &str) -> String {
    format!("Error response from daemon: {}", message.trim())
}

pub(crate) struct DockerRuntime {
    docker: Docker,
    dockerfile: String,
}

impl DockerRuntime {
    pub(crate) fn connect(dockerfile: String) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::ConnectionFailed(format!("Failed to connect to Docker: {}", e)))?;

        Ok(DockerRuntime { docker, dockerfile })
    }
}

#[async_trait]
impl RuntimeInterface for DockerRuntime {
    async fn build(&self, source_dir: &Path, reference: &ImageReference) -> Result<String, RuntimeError> {
        image::build_image(&self.docker, source_dir, &reference.to_string(), &self.dockerfile).await
    }

    async fn create(&self, reference: &ImageReference, port_binding: Option<PortBinding>, bind_address: &str, request_id: &str) -> Result<String, RuntimeError> {
        container::create_container(&self.docker, &reference.to_string(), port_binding, bind_address, request_id).await
    }

    async fn find_by_request(&self, request_id: &str) -> Result<Option<String>, RuntimeError> {
        container::find_by_request(&self.docker, request_id).await
    }

    async fn start(&self, id: &str, network: Option<&str>) -> Result<(), RuntimeError> {
        container::start_container(&self.docker, id, network).await
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        container::stop_container(&self.docker, id).await
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        container::remove_container(&self.docker, id).await
    }

    async fn remove_image(&self, reference: &ImageReference) -> Result<(), RuntimeError> {
        image::remove_image(&self.docker, &reference.to_string()).await
    }

    async fn inspect(&self, id: &str) -> Result<Inspection, RuntimeError> {
        container::inspect_container(&self.docker, id).await
    }

    async fn resolve_content_id(&self, reference: &ImageReference) -> Result<String, RuntimeError> {
        image::resolve_content_id(&self.docker, &reference.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::errors::Error;

    #[test]
    fn test_not_found_keeps_daemon_wording() {
        let err = RuntimeError::from(Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: 1234".to_string(),
        });
        assert_eq!(err, RuntimeError::NotFound("Error response from daemon: No such container: 1234".to_string()));
    }

    #[test]
    fn test_server_error_keeps_daemon_wording() {
        let err = RuntimeError::from(Error::DockerResponseServerError {
            status_code: 500,
            message: "Cannot locate specified Dockerfile: Dockerfile".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Error response from daemon: Cannot locate specified Dockerfile: Dockerfile"
        );
    }

    #[test]
    fn test_stream_errors_are_passed_verbatim() {
        let err = RuntimeError::from(Error::DockerStreamError {
            error: "The command '/bin/sh -c exit 1' returned a non-zero code: 1".to_string(),
        });
        assert_eq!(err, RuntimeError::Daemon("The command '/bin/sh -c exit 1' returned a non-zero code: 1".to_string()));
    }

    #[test]
    fn test_request_timeout_is_uncertain() {
        assert!(RuntimeError::from(Error::RequestTimeoutError).is_uncertain());
    }
}
