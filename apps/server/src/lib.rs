//! # DeployHub Server
//!
//! Boots the deployment kernel, activates the configured subsystems and keeps a
//! deployments directory in sync until shutdown.
//!
//! ## Example
//! ```no_run
//! use dhub_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .deployments("/srv/deployments")
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod scanner;

pub use crate::scanner::{DeploymentScanner, ScanReport};

use anyhow::{Context, Result, anyhow};
use dhub::domain::config::ServerConfig;
use dhub::kernel::prelude::{DeploymentChainProvider, DeploymentManager, ModelController, ServiceContainer};
use dhub_event_bus::EventBus;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: ServerConfig,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: ServerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Overrides the scanned deployments directory.
    pub fn deployments(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.scanner.path = path.into();
        self
    }

    /// Consumes the builder and initializes the server.
    ///
    /// # Process
    /// 1. Creates the event bus, service container and chain provider
    /// 2. Activates the configured subsystems through the management model
    /// 3. Prepares the deployments directory when scanning is enabled
    ///
    /// # Errors
    /// Returns an error if:
    /// * A subsystem fails to activate
    /// * The deployments directory cannot be created
    pub fn build(self) -> Result<Server> {
        info!(server = %self.cfg.server.name, "Initializing server");

        let events = EventBus::new();
        let services = ServiceContainer::new();
        let provider = Arc::new(DeploymentChainProvider::new());
        let controller = ModelController::new(Arc::clone(&provider), services.clone());

        let subsystems = dhub::init(&self.cfg, &controller)
            .map_err(|e| anyhow!("Subsystem bootstrap failed: {e}"))?;

        let manager = Arc::new(DeploymentManager::new(provider, services.clone(), events.clone()));

        let scanner = if self.cfg.scanner.enabled {
            let path = &self.cfg.scanner.path;
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create deployments directory {}", path.display()))?;
            Some(Arc::new(DeploymentScanner::new(&self.cfg.scanner, Arc::clone(&manager))))
        } else {
            None
        };

        Ok(Server { cfg: self.cfg, events, services, controller, manager, scanner, subsystems })
    }
}

/// A fully initialized server instance ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    cfg: ServerConfig,
    events: EventBus,
    services: ServiceContainer,
    controller: ModelController,
    manager: Arc<DeploymentManager>,
    scanner: Option<Arc<DeploymentScanner>>,
    subsystems: Vec<&'static str>,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Runs the deployment scanner until Ctrl+C or SIGTERM, then shuts down.
    ///
    /// # Errors
    /// Returns an error if the signal handlers cannot be installed.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Like [`Server::run`], but stops when `shutdown` completes.
    ///
    /// # Errors
    /// Returns the error `shutdown` resolves to, after shutting down.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!(
            subsystems = ?self.subsystems,
            scanner = self.scanner.as_ref().map(|s| s.root().display().to_string()),
            "Starting server"
        );

        let mut ticker = tokio::time::interval(Duration::from_millis(self.cfg.scanner.interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                res = &mut shutdown => {
                    info!("Shutdown signal received, undeploying");
                    break res;
                },
                _ = ticker.tick(), if self.scanner.is_some() => {
                    if let Some(scanner) = &self.scanner {
                        scan(Arc::clone(scanner)).await;
                    }
                },
            }
        };

        self.shutdown();
        outcome
    }

    fn shutdown(&self) {
        let undeployed = self.manager.undeploy_all();
        let stopped = self.services.shutdown();
        let receivers = self.events.shutdown();
        info!(undeployed, stopped, receivers, "Server shutdown complete");
    }

    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn controller(&self) -> &ModelController {
        &self.controller
    }

    #[must_use]
    pub fn manager(&self) -> Arc<DeploymentManager> {
        Arc::clone(&self.manager)
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn scanner(&self) -> Option<Arc<DeploymentScanner>> {
        self.scanner.clone()
    }

    /// Subsystems activated at boot.
    #[must_use]
    pub fn subsystems(&self) -> &[&'static str] {
        &self.subsystems
    }
}

/// Deployment processing blocks, so each pass runs off the async workers.
async fn scan(scanner: Arc<DeploymentScanner>) {
    match tokio::task::spawn_blocking(move || scanner.scan()).await {
        Ok(Ok(report)) if !report.is_empty() => debug!(?report, "Deployments changed"),
        Ok(Ok(_)) => {},
        Ok(Err(e)) => warn!("Deployment scan failed: {e:#}"),
        Err(e) => error!("Deployment scan panicked: {e}"),
    }
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
