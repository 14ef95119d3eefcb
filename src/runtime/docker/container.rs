use bollard::{
    Docker,
    errors::Error,
    models::{ContainerCreateBody, EndpointSettings, HostConfig, NetworkConnectRequest, PortBinding as DockerPortBinding},
    query_parameters::{
        CreateContainerOptions,
        InspectContainerOptions,
        ListContainersOptionsBuilder,
        RemoveContainerOptionsBuilder,
        StartContainerOptionsBuilder,
        StopContainerOptionsBuilder,
    },
};
use std::collections::HashMap;

use crate::models::containers::PortBinding;
use crate::runtime::error::RuntimeError;
use crate::runtime::runtime::{Inspection, NetworkAttachment, REQUEST_LABEL};

fn build_host_config(port_binding: Option<PortBinding>, bind_address: &str) -> HostConfig {
    let port_bindings = port_binding.map(|binding| {
        HashMap::from([(
            format!("{}/tcp", binding.container_port),
            Some(vec![DockerPortBinding {
                host_ip: Some(bind_address.to_string()),
                host_port: Some(binding.host_port.to_string()),
            }]),
        )])
    });

    HostConfig {
        port_bindings,
        ..Default::default()
    }
}

pub(crate) async fn create_container(docker: &Docker, image: &str, port_binding: Option<PortBinding>, bind_address: &str, request_id: &str) -> Result<String, RuntimeError> {
    debug!("Create container from image {} (request {})", image, request_id);

    let config = ContainerCreateBody {
        image: Some(image.to_string()),
        host_config: Some(build_host_config(port_binding, bind_address)),
        labels: Some(HashMap::from([(REQUEST_LABEL.to_string(), request_id.to_string())])),
        ..Default::default()
    };

    match docker.create_container(None::<CreateContainerOptions>, config).await {
        Ok(container) => {
            for warning in container.warnings.iter() {
                warn!("Docker create container {}: {}", container.id, warning);
            }
            info!("Docker container {} created from {}", container.id, image);
            Ok(container.id)
        }
        Err(e) => {
            error!("Docker failed to create container: {}", e);
            Err(RuntimeError::from(e))
        }
    }
}

pub(crate) async fn find_by_request(docker: &Docker, request_id: &str) -> Result<Option<String>, RuntimeError> {
    let filters = HashMap::from([
        ("label".to_string(), vec![format!("{}={}", REQUEST_LABEL, request_id)]),
    ]);
    let options = ListContainersOptionsBuilder::new().all(true).filters(&filters).build();

    let containers = docker.list_containers(Some(options)).await?;
    let id = containers.into_iter().find_map(|container| {
        let labels = container.labels?;
        if labels.get(REQUEST_LABEL).map(String::as_str) == Some(request_id) {
            container.id
        } else {
            None
        }
    });

    debug!("Container for request {}: {:?}", request_id, id);
    Ok(id)
}

pub(crate) async fn start_container(docker: &Docker, id: &str, network: Option<&str>) -> Result<(), RuntimeError> {
    if let Some(network) = network {
        // A restarted container keeps its previous endpoints.
        if !inspect_container(docker, id).await?.is_attached(network) {
            let connect_request = NetworkConnectRequest {
                container: Some(id.to_string()),
                endpoint_config: Some(EndpointSettings::default()),
            };

            docker.connect_network(network, connect_request).await?;
            debug!("Docker container {} connected to network {}", id, network);
        }
    }

    let start_options = StartContainerOptionsBuilder::new().build();
    docker.start_container(id, Some(start_options)).await?;

    info!("Docker container {} started", id);
    Ok(())
}

pub(crate) async fn stop_container(docker: &Docker, id: &str) -> Result<(), RuntimeError> {
    let stop_options = StopContainerOptionsBuilder::new().build();

    match docker.stop_container(id, Some(stop_options)).await {
        Ok(_) => {
            debug!("Container {} stopped successfully", id);
            Ok(())
        }
        Err(Error::DockerResponseServerError { status_code: 304, .. }) => {
            debug!("Container {} was already stopped", id);
            Ok(())
        }
        Err(e) => {
            error!("Error stopping container {}: {}", id, e);
            Err(RuntimeError::from(e))
        }
    }
}

pub(crate) async fn remove_container(docker: &Docker, id: &str) -> Result<(), RuntimeError> {
    let remove_options = RemoveContainerOptionsBuilder::new().build();

    match docker.remove_container(id, Some(remove_options)).await {
        Ok(_) => {
            info!("Container {} removed successfully", id);
            Ok(())
        }
        Err(e) => {
            error!("Error removing container {}: {}", id, e);
            Err(RuntimeError::from(e))
        }
    }
}

pub(crate) async fn inspect_container(docker: &Docker, id: &str) -> Result<Inspection, RuntimeError> {
    let info = docker.inspect_container(id, None::<InspectContainerOptions>).await?;

    let running = info
        .state
        .and_then(|state| state.running)
        .unwrap_or(false);

    let mut networks: Vec<NetworkAttachment> = info
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .into_iter()
        .map(|(network, endpoint)| NetworkAttachment {
            network,
            ip_address: endpoint.ip_address.unwrap_or_default(),
            prefix_len: endpoint.ip_prefix_len.unwrap_or(0) as u8,
        })
        .collect();
    networks.sort_by(|a, b| a.network.cmp(&b.network));

    Ok(Inspection { running, networks })
}
