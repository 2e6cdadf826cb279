use crate::subsystems::SubsystemSet;
use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level server configuration.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfigInner {
    pub server: ServerSection,
    pub scanner: ScannerConfig,
    pub logging: LoggingConfig,
    pub subsystems: SubsystemSet,
    pub web: WebConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(flatten, default)]
    inner: Arc<ServerConfigInner>,
}

impl Deref for ServerConfig {
    type Target = ServerConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ServerConfig {
    fn deref_mut(&mut self) -> &mut ServerConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Process identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub name: String,
}

/// Filesystem deployment scanner.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub interval_ms: u64,
    pub auto_deploy_archives: bool,
    /// Exploded directories otherwise need a `.dodeploy` marker.
    pub auto_deploy_exploded: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub env_filter: Option<String>,
    pub console: bool,
    pub path: Option<PathBuf>,
    pub json: bool,
    pub max_files: usize,
}

/// Defaults for the web subsystem model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub default_host: String,
}

// --- Default ---

impl Default for ServerSection {
    fn default() -> Self {
        Self { name: "dhub".to_owned() }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("deployments"),
            interval_ms: 5000,
            auto_deploy_archives: true,
            auto_deploy_exploded: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            env_filter: None,
            console: true,
            path: None,
            json: false,
            max_files: 10,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { default_host: "default-host".to_owned() }
    }
}
