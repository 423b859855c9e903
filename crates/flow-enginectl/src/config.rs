//! Settings for the flow engine daemon (spec.md §6 "Configuration").
//!
//! Precedence is file → environment variable → built-in default, mirroring
//! the original service's `pkg/config/config.go` (a defaulted struct loaded
//! once, then overlaid with `env`-tagged fields) in the shape the teacher's
//! own `ServeConfig`/`ServerConfig` pair uses: one typed struct per concern,
//! `#[serde(default = "...")]` per field rather than an `Option` everywhere.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid bind address {host}:{port}: {source}")]
    BindAddr {
        host: String,
        port: u16,
        #[source]
        source: std::net::AddrParseError,
    },
}

fn default_url_prefix() -> String {
    String::new()
}

fn default_server_port() -> u16 {
    8000
}

fn default_debug() -> bool {
    false
}

fn default_driver() -> String {
    "kubernetes".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_storage_class() -> String {
    String::new()
}

fn default_broker_address() -> String {
    "tcp://localhost:1883".to_string()
}

fn default_zookeeper() -> String {
    "localhost:2181".to_string()
}

/// Endpoint URLs for the external collaborators behind the client contracts
/// in `flow-clients` (spec.md §4.5).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceUrls {
    #[serde(default = "ServiceUrls::default_parser")]
    pub parser: String,
    #[serde(default = "ServiceUrls::default_permission")]
    pub permission: String,
    #[serde(default = "ServiceUrls::default_kafka_mqtt_bridge")]
    pub kafka_mqtt_bridge: String,
    #[serde(default = "ServiceUrls::default_device_manager")]
    pub device_manager: String,
    #[serde(default = "ServiceUrls::default_pipeline_registry")]
    pub pipeline_registry: String,
}

impl ServiceUrls {
    fn default_parser() -> String {
        "http://localhost:8001".to_string()
    }
    fn default_permission() -> String {
        "http://localhost:8002".to_string()
    }
    fn default_kafka_mqtt_bridge() -> String {
        "http://localhost:8003".to_string()
    }
    fn default_device_manager() -> String {
        "http://localhost:8004".to_string()
    }
    fn default_pipeline_registry() -> String {
        "http://localhost:8005".to_string()
    }

    fn overlay_from_env(&mut self) {
        overlay(&mut self.parser, "PARSER_URL");
        overlay(&mut self.permission, "PERMISSION_URL");
        overlay(&mut self.kafka_mqtt_bridge, "KAFKA_MQTT_BRIDGE_URL");
        overlay(&mut self.device_manager, "DEVICE_MANAGER_URL");
        overlay(&mut self.pipeline_registry, "PIPELINE_REGISTRY_URL");
    }
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            parser: Self::default_parser(),
            permission: Self::default_permission(),
            kafka_mqtt_bridge: Self::default_kafka_mqtt_bridge(),
            device_manager: Self::default_device_manager(),
            pipeline_registry: Self::default_pipeline_registry(),
        }
    }
}

/// Cluster backend selection and credentials (spec.md §4.3, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_driver")]
    pub kind: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub project: String,
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: default_driver(),
            namespace: default_namespace(),
            project: String::new(),
            storage_class: default_storage_class(),
        }
    }
}

impl DriverConfig {
    fn overlay_from_env(&mut self) {
        overlay(&mut self.kind, "DRIVER");
        overlay(&mut self.namespace, "NAMESPACE");
        overlay(&mut self.project, "PROJECT");
        overlay(&mut self.storage_class, "STORAGE_CLASS");
    }
}

/// Broker connection settings for the fog bridge (spec.md §4.4).
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_address")]
    pub address: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: default_broker_address(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl BrokerConfig {
    fn overlay_from_env(&mut self) {
        overlay(&mut self.address, "BROKER_ADDRESS");
        overlay(&mut self.user, "BROKER_USER");
        overlay(&mut self.password, "BROKER_PASSWORD");
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default = "default_zookeeper")]
    pub zookeeper: String,
    #[serde(default)]
    pub services: ServiceUrls,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url_prefix: default_url_prefix(),
            server_port: default_server_port(),
            debug: default_debug(),
            driver: DriverConfig::default(),
            broker: BrokerConfig::default(),
            zookeeper: default_zookeeper(),
            services: ServiceUrls::default(),
        }
    }
}

impl Config {
    /// Load from an optional YAML file, then overlay recognised environment
    /// variables, then fall back to the built-in defaults (spec.md §6).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
            }
            None => Config::default(),
        };

        config.overlay_from_env();
        Ok(config)
    }

    fn overlay_from_env(&mut self) {
        overlay(&mut self.url_prefix, "URL_PREFIX");
        overlay_parsed(&mut self.server_port, "SERVER_PORT");
        overlay_parsed(&mut self.debug, "DEBUG");
        overlay(&mut self.zookeeper, "ZOOKEEPER");
        self.driver.overlay_from_env();
        self.broker.overlay_from_env();
        self.services.overlay_from_env();
    }

    /// `0.0.0.0` normally; loopback when `debug` is set, matching the
    /// original service's habit of binding narrow during local development.
    pub fn bind_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        let host = if self.debug { "127.0.0.1" } else { "0.0.0.0" };
        format!("{host}:{}", self.server_port)
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                host: host.to_string(),
                port: self.server_port,
                source,
            })
    }
}

fn overlay(field: &mut String, env_var: &str) {
    if let Ok(value) = std::env::var(env_var) {
        *field = value;
    }
}

fn overlay_parsed<T: std::str::FromStr>(field: &mut T, env_var: &str) {
    if let Ok(value) = std::env::var(env_var) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}
