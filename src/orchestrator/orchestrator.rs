use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::docker::DockerConfig;
use crate::models::containers::{ContainerIndex, ContainerRecord, ContainerState, PortBinding};
use crate::models::error::IndexError;
use crate::models::images::{ImageIndex, ImageRecord, ImageReference};
use crate::orchestrator::error::EngineError;
use crate::orchestrator::outcome::{bounded, CallOutcome};
use crate::orchestrator::resolver::Resolver;
use crate::runtime::error::RuntimeError;
use crate::runtime::runtime::{Inspection, RuntimeInterface};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct OrchestratorConfig {
    pub(crate) call_timeout: Duration,
    pub(crate) default_network: Option<String>,
}

impl From<&DockerConfig> for OrchestratorConfig {
    fn from(config: &DockerConfig) -> Self {
        OrchestratorConfig {
            call_timeout: Duration::from_secs(config.timeout),
            default_network: config.network.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NetworkAddress {
    Assigned(String),
    Unassigned,
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkAddress::Assigned(address) => write!(f, "{}", address),
            NetworkAddress::Unassigned => write!(f, "Container is not running or not connected to any network"),
        }
    }
}

/// Image and container lifecycle on top of one container daemon.
pub(crate) struct Orchestrator {
    runtime: Arc<dyn RuntimeInterface>,
    images: Arc<ImageIndex>,
    containers: Arc<ContainerIndex>,
    resolver: Resolver,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub(crate) fn new(runtime: Arc<dyn RuntimeInterface>, config: OrchestratorConfig) -> Self {
        let images = Arc::new(ImageIndex::new());
        let containers = Arc::new(ContainerIndex::new());
        let resolver = Resolver::new(
            Arc::clone(&images),
            Arc::clone(&containers),
            Arc::clone(&runtime),
            config.call_timeout,
        );

        Orchestrator { runtime, images, containers, resolver, config }
    }

    async fn call<T, F>(&self, operation: &str, call: F) -> CallOutcome<T>
    where
        F: std::future::Future<Output = Result<T, RuntimeError>>,
    {
        bounded(self.config.call_timeout, operation, call).await
    }

    pub(crate) async fn build_image(&self, reference: &ImageReference, source_dir: &Path) -> Result<ImageRecord, EngineError> {
        info!("Build image {} from {}", reference, source_dir.display());

        let reservation = self.images.reserve(reference).map_err(EngineError::from_index("build"))?;
        let content_id = self
            .call("build", self.runtime.build(source_dir, reference))
            .await
            .into_result()?;

        let record = ImageRecord::new(reference.clone(), content_id, source_dir);
        reservation.put(record.clone()).map_err(EngineError::from_index("build"))?;

        info!("Image {} built with content id {}", reference, record.content_id);
        Ok(record)
    }

    pub(crate) async fn get_image(&self, reference: &ImageReference) -> Result<ImageRecord, EngineError> {
        self.images.get(reference).await.map_err(EngineError::from_index("get"))
    }

    pub(crate) async fn image_content_id(&self, reference: &ImageReference) -> Result<String, EngineError> {
        self.resolver.tag_to_content_id(reference).await
    }

    pub(crate) async fn delete_image(&self, reference: &ImageReference) -> Result<ImageRecord, EngineError> {
        info!("Delete image {}", reference);

        // Held until the record is gone: no container can be created in between.
        let mut lease = self.images.lock(reference).await.map_err(EngineError::from_index("delete"))?;

        let dependents = self.containers.ids_by_images(std::slice::from_ref(reference));
        let running: Vec<String> = dependents
            .iter()
            .filter(|id| matches!(self.containers.get(id), Ok(record) if record.state == ContainerState::Running))
            .cloned()
            .collect();
        if !running.is_empty() {
            info!("Image {} still used by running {:?}", reference, running);
            return Err(EngineError::ImageInUse {
                reference: reference.to_string(),
                containers: running,
            });
        }

        // Created and stopped containers go with their image.
        for id in dependents {
            let previous = match self.containers.transition(&id, &[ContainerState::Created, ContainerState::Stopped], ContainerState::Removed) {
                Ok(previous) => previous,
                Err(IndexError::ContainerNotFound(_)) => continue,
                Err(IndexError::InvalidState { state: ContainerState::Running, .. }) => {
                    info!("Container {} started while deleting image {}", id, reference);
                    return Err(EngineError::ImageInUse {
                        reference: reference.to_string(),
                        containers: vec![id],
                    });
                }
                Err(err) => return Err(EngineError::from_index("delete")(err)),
            };

            self.remove_from_daemon(&previous).await?;
            self.containers.remove(&id).map_err(EngineError::from_index("delete"))?;
            lease.decrement_usage();
            info!("Container {} deleted along with image {}", id, reference);
        }

        // A concurrent delete still owes its decrement; let it land first.
        if lease.record().usage_count > 0 {
            return Err(EngineError::ImageInUse {
                reference: reference.to_string(),
                containers: self.containers.ids_by_images(std::slice::from_ref(reference)),
            });
        }

        match self.call("remove_image", self.runtime.remove_image(reference)).await {
            CallOutcome::Confirmed(()) => {}
            CallOutcome::Failed(err) => {
                error!("Daemon refused to delete image {}: {}", reference, err);
                return Err(EngineError::Runtime(err));
            }
            CallOutcome::Uncertain(err) => {
                match self.call("resolve", self.runtime.resolve_content_id(reference)).await {
                    CallOutcome::Failed(RuntimeError::NotFound(_)) => {
                        warn!("Image {} is gone despite an unconfirmed delete", reference);
                    }
                    _ => return Err(EngineError::Timeout(err)),
                }
            }
        }

        let record = self.images.remove(lease).map_err(EngineError::from_index("delete"))?;
        info!("Image {} deleted", reference);
        Ok(record)
    }

    pub(crate) async fn create_container(&self, reference: &ImageReference, port_binding: Option<PortBinding>, bind_address: &str) -> Result<ContainerRecord, EngineError> {
        info!("Create container from {} ({:?} on {})", reference, port_binding, bind_address);

        // Held across the daemon call so the image cannot be deleted underneath.
        let mut lease = self.images.lock(reference).await.map_err(EngineError::from_index("create"))?;

        let request_id = Uuid::new_v4().to_string();
        let id = match self.call("create", self.runtime.create(reference, port_binding, bind_address, &request_id)).await {
            CallOutcome::Confirmed(id) => id,
            CallOutcome::Failed(err) => return Err(EngineError::Runtime(err)),
            CallOutcome::Uncertain(err) => match self.call("find_by_request", self.runtime.find_by_request(&request_id)).await {
                CallOutcome::Confirmed(Some(id)) => {
                    warn!("Container {} created despite: {}", id, err);
                    id
                }
                CallOutcome::Confirmed(None) => {
                    warn!("No container was created for request {}", request_id);
                    return Err(EngineError::Timeout(err));
                }
                _ => {
                    error!("Unable to tell whether request {} created a container", request_id);
                    return Err(EngineError::Timeout(err));
                }
            },
        };

        let record = ContainerRecord::new(id, reference.clone(), port_binding, bind_address.to_string());
        if let Err(err) = self.containers.put(record.clone()) {
            panic!("daemon handed out a duplicate container id: {}", err);
        }
        lease.increment_usage();

        info!("Container {} created from {}", record.id, reference);
        Ok(record)
    }

    pub(crate) fn get_container(&self, id: &str) -> Result<ContainerRecord, EngineError> {
        self.containers.get(id).map_err(EngineError::from_index("get"))
    }

    pub(crate) fn container_exists(&self, id: &str) -> bool {
        self.containers.contains(id)
    }

    pub(crate) async fn start_container(&self, id: &str, network: Option<&str>) -> Result<ContainerRecord, EngineError> {
        let network = network
            .map(str::to_string)
            .or_else(|| self.config.default_network.clone());
        info!("Start container {} (network {:?})", id, network);

        let previous = self
            .containers
            .transition(id, &[ContainerState::Created, ContainerState::Stopped], ContainerState::Running)
            .map_err(EngineError::from_index("start"))?;

        match self.call("start", self.runtime.start(id, network.as_deref())).await {
            CallOutcome::Confirmed(()) => {}
            CallOutcome::Failed(err) => {
                error!("Failed to start container {}: {}", id, err);
                self.containers.revert(&previous, ContainerState::Running);
                return Err(EngineError::Runtime(err));
            }
            CallOutcome::Uncertain(err) => {
                if !self.observed_running(id, false).await {
                    warn!("Container {} not confirmed running, rolling back", id);
                    self.containers.revert(&previous, ContainerState::Running);
                    return Err(EngineError::Timeout(err));
                }
                warn!("Container {} confirmed running despite: {}", id, err);
            }
        }

        let attached = network.or(previous.network);
        let ip_address = match attached.as_deref() {
            Some(network) => self.lookup_address(id, network).await,
            None => None,
        };

        self.containers
            .update(id, |record| {
                if record.state == ContainerState::Running {
                    record.network = attached;
                    record.ip_address = ip_address;
                }
            })
            .map_err(EngineError::from_index("start"))?;

        info!("Container {} started", id);
        self.get_container(id)
    }

    /// Stopping a container that is not running is a no-op success.
    pub(crate) async fn stop_container(&self, id: &str) -> Result<ContainerRecord, EngineError> {
        info!("Stop container {}", id);

        let previous = match self.containers.transition(id, &[ContainerState::Running], ContainerState::Stopped) {
            Ok(previous) => previous,
            Err(IndexError::InvalidState { state: ContainerState::Created, .. })
            | Err(IndexError::InvalidState { state: ContainerState::Stopped, .. }) => {
                debug!("Container {} is not running, nothing to stop", id);
                return self.get_container(id);
            }
            Err(err) => return Err(EngineError::from_index("stop")(err)),
        };

        match self.call("stop", self.runtime.stop(id)).await {
            CallOutcome::Confirmed(()) => {}
            CallOutcome::Failed(err) => {
                error!("Failed to stop container {}: {}", id, err);
                self.containers.revert(&previous, ContainerState::Stopped);
                return Err(EngineError::Runtime(err));
            }
            CallOutcome::Uncertain(err) => {
                if self.observed_running(id, true).await {
                    warn!("Container {} still running, rolling back", id);
                    self.containers.revert(&previous, ContainerState::Stopped);
                    return Err(EngineError::Timeout(err));
                }
                warn!("Container {} confirmed stopped despite: {}", id, err);
            }
        }

        self.containers
            .update(id, |record| record.ip_address = None)
            .map_err(EngineError::from_index("stop"))?;

        info!("Container {} stopped", id);
        self.get_container(id)
    }

    /// Stops every live container whose image carries `content_id`.
    pub(crate) async fn stop_containers_by_image_id(&self, content_id: &str) -> Result<Vec<String>, EngineError> {
        info!("Stop containers by image id {}", content_id);

        let targets = self.resolver.content_id_to_containers(content_id)?;
        let mut stopped = Vec::with_capacity(targets.len());
        let mut failures = vec![];

        for id in targets {
            match self.stop_container(&id).await {
                Ok(_) => stopped.push(id),
                // Deleted since the scan, nothing left to stop.
                Err(EngineError::ContainerNotFound(_)) => {}
                Err(err) => failures.push((id, err)),
            }
        }

        if !failures.is_empty() {
            return Err(EngineError::StopFailed(failures));
        }

        debug!("Stopped {:?} for image id {}", stopped, content_id);
        Ok(stopped)
    }

    pub(crate) async fn delete_container(&self, id: &str) -> Result<ContainerRecord, EngineError> {
        info!("Delete container {}", id);

        let previous = self
            .containers
            .transition(id, &[ContainerState::Created, ContainerState::Stopped], ContainerState::Removed)
            .map_err(EngineError::from_index("delete"))?;

        self.remove_from_daemon(&previous).await?;

        let record = self.containers.remove(id).map_err(EngineError::from_index("delete"))?;

        match self.images.lock(&record.image_reference).await {
            Ok(mut lease) => lease.decrement_usage(),
            Err(err) => panic!("container {} referenced a missing image: {}", id, err),
        }

        info!("Container {} deleted", id);
        Ok(record)
    }

    pub(crate) async fn container_ip(&self, id: &str, network: Option<&str>) -> Result<NetworkAddress, EngineError> {
        let record = self.get_container(id)?;

        let network = match network.map(str::to_string).or(record.network) {
            Some(network) if record.state == ContainerState::Running => network,
            _ => return Ok(NetworkAddress::Unassigned),
        };

        let inspection = self
            .call("inspect", self.runtime.inspect(id))
            .await
            .into_result()
            .map_err(|err| match err {
                EngineError::Runtime(RuntimeError::NotFound(_)) => EngineError::ContainerNotFound(id.to_string()),
                err => err,
            })?;

        let address = inspection.address(&network);
        let refreshed = self.containers.update(id, |record| {
            if record.state == ContainerState::Running {
                record.ip_address = address.clone();
            }
        });
        if let Err(err) = refreshed {
            debug!("Address of container {} not cached: {}", id, err);
        }

        Ok(match address {
            Some(address) => NetworkAddress::Assigned(address),
            None => NetworkAddress::Unassigned,
        })
    }

    /// Removes a container already marked `Removed`, rolling the mark back if the daemon keeps it.
    async fn remove_from_daemon(&self, previous: &ContainerRecord) -> Result<(), EngineError> {
        let id = previous.id.as_str();

        match self.call("remove", self.runtime.remove(id)).await {
            CallOutcome::Confirmed(()) => Ok(()),
            CallOutcome::Failed(RuntimeError::NotFound(msg)) => {
                warn!("Container {} was already gone from the daemon: {}", id, msg);
                Ok(())
            }
            CallOutcome::Failed(err) => {
                error!("Failed to delete container {}: {}", id, err);
                self.containers.revert(previous, ContainerState::Removed);
                Err(EngineError::Runtime(err))
            }
            CallOutcome::Uncertain(err) => match self.call("inspect", self.runtime.inspect(id)).await {
                CallOutcome::Failed(RuntimeError::NotFound(_)) => {
                    warn!("Container {} is gone despite an unconfirmed delete", id);
                    Ok(())
                }
                _ => {
                    self.containers.revert(previous, ContainerState::Removed);
                    Err(EngineError::Timeout(err))
                }
            },
        }
    }

    async fn inspect_quietly(&self, id: &str) -> Option<Inspection> {
        match self.call("inspect", self.runtime.inspect(id)).await {
            CallOutcome::Confirmed(inspection) => Some(inspection),
            _ => None,
        }
    }

    /// Settles an unconfirmed start or stop. When the daemon cannot tell, `unknown` is assumed.
    async fn observed_running(&self, id: &str, unknown: bool) -> bool {
        match self.inspect_quietly(id).await {
            Some(inspection) => inspection.running,
            None => unknown,
        }
    }

    async fn lookup_address(&self, id: &str, network: &str) -> Option<String> {
        let address = self.inspect_quietly(id).await.and_then(|inspection| inspection.address(network));
        if address.is_none() {
            debug!("Container {} has no address on {}", id, network);
        }
        address
    }
}
