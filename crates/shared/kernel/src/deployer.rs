use crate::chain::{DeploymentChain, OrderedProcessor};
use crate::error::DeploymentError;
use crate::provider::DeploymentChainProvider;
use crate::unit::{DeploymentUnit, SUB_DEPLOYMENTS};
use dhub_domain::events::{ActiveDeployments, DeploymentEvent};
use dhub_event_bus::EventBus;
use dhub_services::{ServiceContainer, ServiceName};
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Summary of an active deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentInfo {
    pub name: String,
    pub chain: String,
    pub path: PathBuf,
    pub sub_deployments: Vec<String>,
}

struct Deployment {
    unit: DeploymentUnit,
    chain: Arc<DeploymentChain>,
    /// Processors that ran for `unit`, in order.
    completed: Vec<OrderedProcessor>,
    children: Vec<Deployment>,
}

impl Deployment {
    fn info(&self) -> DeploymentInfo {
        DeploymentInfo {
            name: self.unit.name().to_owned(),
            chain: self.chain.name().to_owned(),
            path: self.unit.root().to_path_buf(),
            sub_deployments: self.children.iter().map(|c| c.unit.name().to_owned()).collect(),
        }
    }
}

#[derive(Default)]
struct Ledger {
    deployed: BTreeMap<String, Deployment>,
    /// Names reserved by deployments still running through their chain.
    pending: FxHashSet<String>,
}

/// Runs deployment units through their chains and keeps track of what is deployed.
///
/// Units are processed on the calling thread. Different units may deploy
/// concurrently; a name is reserved while its deployment runs.
pub struct DeploymentManager {
    provider: Arc<DeploymentChainProvider>,
    services: ServiceContainer,
    events: EventBus,
    ledger: Mutex<Ledger>,
}

impl DeploymentManager {
    #[must_use]
    pub fn new(provider: Arc<DeploymentChainProvider>, services: ServiceContainer, events: EventBus) -> Self {
        Self { provider, services, events, ledger: Mutex::default() }
    }

    /// Mounts `path` and deploys it.
    ///
    /// # Errors
    /// See [`DeploymentUnit::mount`] and [`DeploymentManager::deploy`].
    pub fn deploy_path(&self, path: impl AsRef<Path>) -> Result<DeploymentInfo, DeploymentError> {
        self.deploy(DeploymentUnit::mount(path)?)
    }

    /// Deploys `unit` and then the sub-deployments its processors discovered.
    ///
    /// On any failure, processors that ran are undone in reverse, every service
    /// under the unit's service name is removed, and a `Failed` event is published.
    ///
    /// # Errors
    /// * [`DeploymentError::Duplicate`] when a unit with that name is deployed or deploying.
    /// * [`DeploymentError::NoChain`] when no selector supports the unit.
    /// * [`DeploymentError::Processor`] when a processor fails.
    /// * [`DeploymentError::Verification`] when installed services failed or miss dependencies.
    pub fn deploy(&self, unit: DeploymentUnit) -> Result<DeploymentInfo, DeploymentError> {
        let name = unit.name().to_owned();
        {
            let mut ledger = self.ledger.lock();
            if ledger.deployed.contains_key(&name) || !ledger.pending.insert(name.clone()) {
                return Err(DeploymentError::Duplicate { message: name.into(), context: None });
            }
        }

        let outcome = self.deploy_unit(unit).and_then(|deployment| match self.verify(&deployment.unit) {
            Ok(()) => Ok(deployment),
            Err(err) => {
                self.undeploy_tree(deployment);
                Err(err)
            },
        });

        let mut ledger = self.ledger.lock();
        ledger.pending.remove(&name);
        match outcome {
            Ok(deployment) => {
                let info = deployment.info();
                ledger.deployed.insert(name.clone(), deployment);
                drop(ledger);
                info!(deployment = %name, chain = %info.chain, "Deployed");
                self.publish(DeploymentEvent::Deployed { name, chain: info.chain.clone() });
                self.publish_active();
                Ok(info)
            },
            Err(err) => {
                drop(ledger);
                error!(deployment = %name, error = %err, "Deployment failed");
                self.publish(DeploymentEvent::Failed { name, reason: err.to_string() });
                Err(err)
            },
        }
    }

    fn deploy_unit(&self, mut unit: DeploymentUnit) -> Result<Deployment, DeploymentError> {
        let chain = self.provider.determine_deployment_chain(&unit)?.ok_or_else(|| {
            DeploymentError::NoChain { message: unit.name().to_owned().into(), context: None }
        })?;

        let mut completed = Vec::new();
        if let Err(err) = chain.process_recorded(&mut unit, &self.services, &mut completed) {
            chain.undo_completed(&mut unit, &completed);
            self.services.remove_children(&unit.service_name());
            return Err(err);
        }

        let mut children = Vec::new();
        for child in unit.attachments_mut().take_list(SUB_DEPLOYMENTS) {
            let child_name = child.name().to_owned();
            match self.deploy_unit(child) {
                Ok(deployment) => children.push(deployment),
                Err(err) => {
                    warn!(unit = unit.name(), sub_deployment = %child_name, "Sub-deployment failed, undoing parent");
                    self.undeploy_tree(Deployment { unit, chain, completed, children });
                    return Err(err);
                },
            }
        }

        Ok(Deployment { unit, chain, completed, children })
    }

    /// Every service below the unit's name must be `Up` or waiting on something installed.
    fn verify(&self, unit: &DeploymentUnit) -> Result<(), DeploymentError> {
        let root = unit.service_name();
        let under = |name: &ServiceName| *name == root || root.is_parent_of(name);

        let failed: Vec<String> = self
            .services
            .failed()
            .into_iter()
            .filter(|(name, _)| under(name))
            .map(|(name, reason)| format!("{name}: {reason}"))
            .collect();
        let missing: Vec<String> = self
            .services
            .missing_dependencies()
            .into_iter()
            .filter(|(name, _)| under(name))
            .map(|(name, deps)| {
                let deps: Vec<String> = deps.iter().map(ToString::to_string).collect();
                format!("{name} is missing {}", deps.join(", "))
            })
            .collect();

        if failed.is_empty() && missing.is_empty() {
            return Ok(());
        }
        Err(DeploymentError::Verification {
            message: failed.into_iter().chain(missing).collect::<Vec<_>>().join("; ").into(),
            context: Some(unit.name().to_owned().into()),
        })
    }

    fn undeploy_tree(&self, deployment: Deployment) {
        let Deployment { mut unit, chain, completed, children } = deployment;
        for child in children.into_iter().rev() {
            self.undeploy_tree(child);
        }
        chain.undo_completed(&mut unit, &completed);
        let removed = self.services.remove_children(&unit.service_name());
        info!(unit = unit.name(), services = removed, "Deployment unit undone");
    }

    /// Undeploys a deployment by name.
    ///
    /// # Errors
    /// Returns [`DeploymentError::NotDeployed`] if nothing with that name is deployed.
    pub fn undeploy(&self, name: &str) -> Result<(), DeploymentError> {
        let deployment = self.ledger.lock().deployed.remove(name).ok_or_else(|| {
            DeploymentError::NotDeployed { message: name.to_owned().into(), context: None }
        })?;

        self.undeploy_tree(deployment);
        info!(deployment = name, "Undeployed");
        self.publish(DeploymentEvent::Undeployed { name: name.to_owned() });
        self.publish_active();
        Ok(())
    }

    /// Undeploys whatever is deployed under the name of `path`, then deploys it again.
    ///
    /// # Errors
    /// Same as [`DeploymentManager::deploy_path`].
    pub fn redeploy(&self, path: impl AsRef<Path>) -> Result<DeploymentInfo, DeploymentError> {
        let unit = DeploymentUnit::mount(path)?;
        if self.is_deployed(unit.name()) {
            self.undeploy(unit.name())?;
        }
        self.deploy(unit)
    }

    #[must_use]
    pub fn deployments(&self) -> Vec<DeploymentInfo> {
        self.ledger.lock().deployed.values().map(Deployment::info).collect()
    }

    #[must_use]
    pub fn deployment(&self, name: &str) -> Option<DeploymentInfo> {
        self.ledger.lock().deployed.get(name).map(Deployment::info)
    }

    #[must_use]
    pub fn is_deployed(&self, name: &str) -> bool {
        self.ledger.lock().deployed.contains_key(name)
    }

    /// Undeploys everything in reverse name order. Returns how many were undeployed.
    pub fn undeploy_all(&self) -> usize {
        let names: Vec<String> = self.ledger.lock().deployed.keys().rev().cloned().collect();
        names.iter().filter(|name| self.undeploy(name).is_ok()).count()
    }

    /// Replaces the [`ActiveDeployments`] watch value. The ledger stays locked while
    /// publishing, so the last value always matches the ledger.
    fn publish_active(&self) {
        let ledger = self.ledger.lock();
        let names = ledger.deployed.keys().cloned().collect();
        if let Err(err) = self.events.publish_watch(ActiveDeployments { names }) {
            warn!(error = %err, "Failed to publish active deployments");
        }
    }

    fn publish(&self, event: DeploymentEvent) {
        if let Err(err) = self.events.publish(event) {
            warn!(error = %err, "Failed to publish deployment event");
        }
    }
}

impl std::fmt::Debug for DeploymentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentManager")
            .field("deployments", &self.ledger.lock().deployed.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
