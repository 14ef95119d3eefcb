use std::env;
use std::fs;
use serde::Deserialize;
use local_ip_address::local_ip;
use crate::config;
use toml::de::Error as TomlError;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) host: String,
    pub(crate) api: config::api::Api,
    pub(crate) docker: config::docker::DockerConfig,
}

impl Config {
    pub(crate) fn get_api_url(&self) -> String {
        format!("{}://{}:{}", self.api.scheme, self.host, self.api.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: local_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            api: config::api::Api::default(),
            docker: config::docker::DockerConfig::default(),
        }
    }
}

pub(crate) fn get_config_dir() -> String {
    match env::var("DOCKYARD_CONFIG_DIR") {
        Ok(dir) => dir,
        Err(_) => format!("{}/.config/dockyard", env::var("HOME").unwrap_or_else(|_| ".".to_string())),
    }
}

pub(crate) fn parse_config(contents: &str) -> Result<Config, TomlError> {
    toml::from_str(contents)
}

pub(crate) fn load_config() -> Config {
    let file = format!("{}/config.toml", get_config_dir());

    debug!("load config file {}", file);

    match fs::read_to_string(&file) {
        Ok(contents) => match parse_config(&contents) {
            Ok(config) => return config,
            Err(err) => error!("Error while deserializing the TOML file : {}", err),
        },
        Err(err) => debug!("No config file {}: {}", file, err),
    }

    debug!("Switch to default configuration");

    Config::default()
}
