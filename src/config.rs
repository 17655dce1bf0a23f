use crate::{load_balancer::Strategy, service_registry::InstanceEntry};
use serde::Deserialize;
use std::{collections::HashMap, fs::File, io::BufReader, net::SocketAddr, path::Path};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "greeting_lb.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file '{path}' : {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen: SocketAddr,
    pub greeting: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            listen: SocketAddr::from(([127, 0, 0, 1], 8081)),
            greeting: "Hello, world!".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Logical id the client calls
    pub service_id: String,
    pub path: String,
    pub strategy: Strategy,
    pub request_timeout_secs: u64,
    /// Statically known instances per service id
    pub instances: HashMap<String, Vec<InstanceEntry>>,
    pub consul: Option<ConsulSettings>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let local = InstanceEntry {
            host: "127.0.0.1".to_string(),
            port: 8081,
            metadata: HashMap::new(),
        };
        ClientConfig {
            service_id: "api".to_string(),
            path: "/greetings".to_string(),
            strategy: Strategy::RoundRobin,
            request_timeout_secs: 10,
            instances: HashMap::from([("api".to_string(), vec![local])]),
            consul: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsulSettings {
    pub url: String,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_refresh_secs() -> u64 {
    30
}

impl Config {
    /// Load and parse configuration from the given YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let p = path.as_ref();
        let file = File::open(p)
            .map_err(|e| ConfigError::Io { path: p.display().to_string(), source: e })?;
        let reader = BufReader::new(file);
        let cfg = serde_yaml::from_reader(reader)?;
        Ok(cfg)
    }

    /// Explicit path must exist; otherwise fall back to the default file, then built-ins.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Config::default()),
        }
    }
}
