//! WAR deployments.
//!
//! Activation installs the configured virtual host and registers the `web`
//! chain: `WEB-INF` discovery, the shared module processors from `dhub-jar`,
//! context root resolution and the web context service.
//!
//! Model attributes:
//! * `default-host`: host that web contexts register on.
//! * `context-roots`: object mapping deployment names to context roots.

mod error;
mod host;
mod processors;

pub use crate::error::{WebError, WebErrorExt};
pub use crate::host::{VirtualHost, WebContext, host_service_name};
pub use crate::processors::{
    CONTEXT_ROOT, ContextRootProcessor, WAR_METADATA, WEB_DESCRIPTOR, WarMetadata, WarStructureProcessor,
    WebContextInstallProcessor,
};

use dhub_kernel::operation::{DeploymentProcessorTarget, OperationError, Subsystem};
use dhub_kernel::prelude::{ArchiveSelector, DeploymentChain, Phase, slots};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SUBSYSTEM: &str = dhub_kernel::domain::subsystems::WEB;
pub const CHAIN: &str = "web";
pub const DEFAULT_HOST: &str = "default-host";
pub const CONTEXT_ROOTS: &str = "context-roots";

#[derive(Debug, Default)]
pub struct WebSubsystem;

impl WebSubsystem {
    fn default_host(model: &Value) -> Result<&str, WebError> {
        match model.get(DEFAULT_HOST) {
            Some(Value::String(host)) if !host.trim().is_empty() => Ok(host),
            _ => Err(WebError::Model { message: format!("'{DEFAULT_HOST}' must be a non-empty string").into(), context: None }),
        }
    }

    fn context_roots(model: &Value) -> Result<BTreeMap<String, String>, WebError> {
        let Some(roots) = model.get(CONTEXT_ROOTS) else {
            return Ok(BTreeMap::new());
        };
        let Value::Object(roots) = roots else {
            return Err(WebError::Model { message: format!("'{CONTEXT_ROOTS}' must be an object").into(), context: None });
        };
        roots
            .iter()
            .map(|(deployment, root)| match root {
                Value::String(root) => Ok((deployment.clone(), root.clone())),
                _ => Err(WebError::Model {
                    message: "context roots must be strings".into(),
                    context: Some(deployment.clone().into()),
                }),
            })
            .collect()
    }
}

impl Subsystem for WebSubsystem {
    fn name(&self) -> &'static str {
        SUBSYSTEM
    }

    fn default_model(&self) -> Value {
        json!({ DEFAULT_HOST: DEFAULT_HOST, CONTEXT_ROOTS: {} })
    }

    fn validate(&self, model: &Value) -> Result<(), OperationError> {
        Self::default_host(model)?;
        Self::context_roots(model)?;
        Ok(())
    }

    fn activate(&self, model: &Value, target: &mut DeploymentProcessorTarget) -> Result<(), OperationError> {
        let host_name = Self::default_host(model)?;
        let host = host_service_name(host_name);
        target.install_service(host.clone(), VirtualHost::new(host_name), [])?;

        target.add_deployment_chain(Arc::new(DeploymentChain::new(CHAIN)), Arc::new(ArchiveSelector::war()), None);
        target.add_deployment_processor(CHAIN, Phase::Parse, slots::PARSE_WEB_DESCRIPTOR, Arc::new(WarStructureProcessor))?;
        dhub_jar::register_module_processors(target, CHAIN)?;
        target.add_deployment_processor(
            CHAIN,
            Phase::PostModule,
            slots::POST_MODULE_WEB_CONTEXT_ROOT,
            Arc::new(ContextRootProcessor::new(Self::context_roots(model)?)),
        )?;
        target.add_deployment_processor(
            CHAIN,
            Phase::Install,
            slots::INSTALL_WEB_CONTEXT,
            Arc::new(WebContextInstallProcessor::new(host)),
        )?;
        tracing::info!(host = host_name, "Web subsystem activated");
        Ok(())
    }
}
