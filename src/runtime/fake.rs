use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::models::containers::PortBinding;
use crate::models::images::ImageReference;
use crate::runtime::error::RuntimeError;
use crate::runtime::runtime::{Inspection, NetworkAttachment, RuntimeInterface};

const STALL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stall {
    /// Hang without touching daemon state.
    BeforeApplying,
    /// Apply the call, then hang as if the reply was lost.
    AfterApplying,
}

#[derive(Debug, Clone)]
struct FakeContainer {
    image: String,
    request_id: String,
    running: bool,
    networks: Vec<(String, String)>,
}

#[derive(Default)]
struct FakeState {
    images: HashMap<String, String>,
    containers: HashMap<String, FakeContainer>,
    failures: HashMap<&'static str, RuntimeError>,
    stalls: HashMap<&'static str, Stall>,
    calls: Vec<&'static str>,
    next_host: u8,
}

/// In-memory daemon speaking the same error dialect as dockerd.
#[derive(Default)]
pub(crate) struct FakeRuntime {
    state: Mutex<FakeState>,
}

fn no_such_container(id: &str) -> RuntimeError {
    RuntimeError::NotFound(format!("Error response from daemon: No such container: {}", id))
}

fn no_such_image(image: &str) -> RuntimeError {
    RuntimeError::NotFound(format!("Error response from daemon: No such image: {}", image))
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        FakeRuntime::default()
    }

    /// Makes the next `operation` call fail with `err`.
    pub(crate) fn fail_next(&self, operation: &'static str, err: RuntimeError) {
        self.state.lock().unwrap().failures.insert(operation, err);
    }

    pub(crate) fn stall(&self, operation: &'static str, stall: Stall) {
        self.state.lock().unwrap().stalls.insert(operation, stall);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn is_running(&self, id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(id)
            .map(|container| container.running)
            .unwrap_or(false)
    }

    pub(crate) fn has_container(&self, id: &str) -> bool {
        self.state.lock().unwrap().containers.contains_key(id)
    }

    /// An image the daemon knows about without this service having built it.
    pub(crate) fn seed_image(&self, image: &str, content_id: &str) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(image.to_string(), content_id.to_string());
    }

    pub(crate) fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    pub(crate) fn has_image(&self, image: &str) -> bool {
        self.state.lock().unwrap().images.contains_key(image)
    }

    async fn enter(&self, operation: &'static str) -> Result<Option<Stall>, RuntimeError> {
        let (failure, stall) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(operation);
            (state.failures.remove(operation), state.stalls.get(operation).copied())
        };

        if let Some(err) = failure {
            return Err(err);
        }

        if stall == Some(Stall::BeforeApplying) {
            tokio::time::sleep(STALL).await;
        }

        Ok(stall)
    }

    async fn leave(&self, stall: Option<Stall>) {
        if stall == Some(Stall::AfterApplying) {
            tokio::time::sleep(STALL).await;
        }
    }
}

#[async_trait]
impl RuntimeInterface for FakeRuntime {
    async fn build(&self, source_dir: &Path, reference: &ImageReference) -> Result<String, RuntimeError> {
        let stall = self.enter("build").await?;

        if !source_dir.is_dir() {
            return Err(RuntimeError::FileSystemError("No such file or directory (os error 2)".to_string()));
        }

        if !source_dir.join("Dockerfile").is_file() {
            return Err(RuntimeError::Daemon(
                "Error response from daemon: Cannot locate specified Dockerfile: Dockerfile".to_string(),
            ));
        }

        let content_id = format!("sha256:{}", Uuid::new_v4().simple());
        self.state
            .lock()
            .unwrap()
            .images
            .insert(reference.to_string(), content_id.clone());

        self.leave(stall).await;
        Ok(content_id)
    }

    async fn create(&self, reference: &ImageReference, _port_binding: Option<PortBinding>, _bind_address: &str, request_id: &str) -> Result<String, RuntimeError> {
        let stall = self.enter("create").await?;

        let id = {
            let mut state = self.state.lock().unwrap();
            let image = reference.to_string();
            if !state.images.contains_key(&image) {
                return Err(no_such_image(&image));
            }

            let id = Uuid::new_v4().simple().to_string();
            state.containers.insert(id.clone(), FakeContainer {
                image,
                request_id: request_id.to_string(),
                running: false,
                networks: vec![],
            });
            id
        };

        self.leave(stall).await;
        Ok(id)
    }

    async fn find_by_request(&self, request_id: &str) -> Result<Option<String>, RuntimeError> {
        let stall = self.enter("find_by_request").await?;

        let id = self
            .state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|(_, container)| container.request_id == request_id)
            .map(|(id, _)| id.clone());

        self.leave(stall).await;
        Ok(id)
    }

    async fn start(&self, id: &str, network: Option<&str>) -> Result<(), RuntimeError> {
        let stall = self.enter("start").await?;

        {
            let mut state = self.state.lock().unwrap();
            state.next_host = state.next_host.wrapping_add(1);
            let host = state.next_host.wrapping_add(1);

            let container = state.containers.get_mut(id).ok_or_else(|| no_such_container(id))?;
            if let Some(network) = network {
                if !container.networks.iter().any(|(name, _)| name == network) {
                    container.networks.push((network.to_string(), format!("172.27.0.{}", host)));
                }
            }
            container.running = true;
        }

        self.leave(stall).await;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        let stall = self.enter("stop").await?;

        {
            let mut state = self.state.lock().unwrap();
            let container = state.containers.get_mut(id).ok_or_else(|| no_such_container(id))?;
            container.running = false;
        }

        self.leave(stall).await;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        let stall = self.enter("remove").await?;

        {
            let mut state = self.state.lock().unwrap();
            let container = state.containers.get(id).ok_or_else(|| no_such_container(id))?;
            if container.running {
                return Err(RuntimeError::Daemon(format!(
                    "Error response from daemon: You cannot remove a running container {}. Stop the container before attempting removal or force remove",
                    id
                )));
            }
            state.containers.remove(id);
        }

        self.leave(stall).await;
        Ok(())
    }

    async fn remove_image(&self, reference: &ImageReference) -> Result<(), RuntimeError> {
        let stall = self.enter("remove_image").await?;

        {
            let mut state = self.state.lock().unwrap();
            let image = reference.to_string();
            let content_id = state.images.get(&image).cloned().ok_or_else(|| no_such_image(&image))?;

            if let Some((id, _)) = state.containers.iter().find(|(_, container)| container.image == image) {
                return Err(RuntimeError::Daemon(format!(
                    "Error response from daemon: conflict: unable to remove repository reference \"{}\" (must force) - container {} is using its referenced image {}",
                    image, id, content_id
                )));
            }
            state.images.remove(&image);
        }

        self.leave(stall).await;
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<Inspection, RuntimeError> {
        let stall = self.enter("inspect").await?;

        let inspection = {
            let state = self.state.lock().unwrap();
            let container = state.containers.get(id).ok_or_else(|| no_such_container(id))?;
            Inspection {
                running: container.running,
                networks: container
                    .networks
                    .iter()
                    .map(|(network, ip_address)| NetworkAttachment {
                        network: network.clone(),
                        ip_address: if container.running { ip_address.clone() } else { String::new() },
                        prefix_len: if container.running { 16 } else { 0 },
                    })
                    .collect(),
            }
        };

        self.leave(stall).await;
        Ok(inspection)
    }

    async fn resolve_content_id(&self, reference: &ImageReference) -> Result<String, RuntimeError> {
        let stall = self.enter("resolve_content_id").await?;

        let image = reference.to_string();
        let content_id = self
            .state
            .lock()
            .unwrap()
            .images
            .get(&image)
            .cloned()
            .ok_or_else(|| no_such_image(&image))?;

        self.leave(stall).await;
        Ok(content_id)
    }
}
