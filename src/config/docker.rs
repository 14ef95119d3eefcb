use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct DockerConfig {
    /// Seconds allowed for a single daemon call.
    pub(crate) timeout: u64,
    /// Network joined by containers started without one.
    pub(crate) network: Option<String>,
    pub(crate) dockerfile: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        DockerConfig {
            timeout: 60,
            network: None,
            dockerfile: "Dockerfile".to_string(),
        }
    }
}
