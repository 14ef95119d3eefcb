use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::docker::DockerConfig;
use crate::models::containers::PortBinding;
use crate::models::images::ImageReference;
use crate::runtime::docker::DockerRuntime;
use crate::runtime::error::RuntimeError;

pub(crate) const REQUEST_LABEL: &str = "dockyard.request";

/// Narrow command interface to the container daemon. No policy, no retries.
#[async_trait]
pub(crate) trait RuntimeInterface: Send + Sync {
    async fn build(&self, source_dir: &Path, reference: &ImageReference) -> Result<String, RuntimeError>;
    /// `request_id` is stored as the `REQUEST_LABEL` label so an unconfirmed create can be found again.
    async fn create(&self, reference: &ImageReference, port_binding: Option<PortBinding>, bind_address: &str, request_id: &str) -> Result<String, RuntimeError>;
    async fn find_by_request(&self, request_id: &str) -> Result<Option<String>, RuntimeError>;
    async fn start(&self, id: &str, network: Option<&str>) -> Result<(), RuntimeError>;
    async fn stop(&self, id: &str) -> Result<(), RuntimeError>;
    async fn remove(&self, id: &str) -> Result<(), RuntimeError>;
    async fn remove_image(&self, reference: &ImageReference) -> Result<(), RuntimeError>;
    async fn inspect(&self, id: &str) -> Result<Inspection, RuntimeError>;
    async fn resolve_content_id(&self, reference: &ImageReference) -> Result<String, RuntimeError>;
}

pub(crate) struct Runtime {
}

impl Runtime {
    pub(crate) fn docker(config: &DockerConfig) -> Result<Arc<dyn RuntimeInterface>, RuntimeError> {
        let runtime = DockerRuntime::connect(config.dockerfile.clone())?;
        Ok(Arc::new(runtime))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NetworkAttachment {
    pub(crate) network: String,
    pub(crate) ip_address: String,
    pub(crate) prefix_len: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Inspection {
    pub(crate) running: bool,
    pub(crate) networks: Vec<NetworkAttachment>,
}

impl Inspection {
    pub(crate) fn is_attached(&self, network: &str) -> bool {
        self.networks.iter().any(|attachment| attachment.network == network)
    }

    /// `<ip>/<prefix>` on `network`, only while the container runs there with an address.
    pub(crate) fn address(&self, network: &str) -> Option<String> {
        if !self.running {
            return None;
        }

        self.networks
            .iter()
            .find(|attachment| attachment.network == network && !attachment.ip_address.is_empty())
            .map(|attachment| format!("{}/{}", attachment.ip_address, attachment.prefix_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspection(running: bool, ip_address: &str) -> Inspection {
        Inspection {
            running,
            networks: vec![NetworkAttachment {
                network: "golang-docker_default".to_string(),
                ip_address: ip_address.to_string(),
                prefix_len: 16,
            }],
        }
    }

    #[test]
    fn test_address_of_running_container() {
        assert_eq!(inspection(true, "172.27.0.3").address("golang-docker_default"), Some("172.27.0.3/16".to_string()));
    }

    #[test]
    fn test_no_address_when_stopped_or_detached() {
        assert_eq!(inspection(false, "172.27.0.3").address("golang-docker_default"), None);
        assert_eq!(inspection(true, "").address("golang-docker_default"), None);
        assert_eq!(inspection(true, "172.27.0.3").address("bridge"), None);
    }

    #[test]
    fn test_is_attached_ignores_run_state() {
        assert!(inspection(false, "").is_attached("golang-docker_default"));
        assert!(!inspection(true, "172.27.0.3").is_attached("bridge"));
    }
}
