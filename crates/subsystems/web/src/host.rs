use crate::error::WebError;
use dhub_kernel::prelude::{Service, ServiceError, ServiceName, StartContext};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Service name of the virtual host `host`.
#[must_use]
pub fn host_service_name(host: &str) -> ServiceName {
    ServiceName::of(["dhub", "web", "host"]).append(host)
}

/// A virtual host serving web contexts, keyed by context root.
#[derive(Debug)]
pub struct VirtualHost {
    name: String,
    contexts: Mutex<BTreeMap<String, String>>,
}

impl VirtualHost {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), contexts: Mutex::default() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context roots mapped to the deployment serving them.
    #[must_use]
    pub fn contexts(&self) -> BTreeMap<String, String> {
        self.contexts.lock().clone()
    }

    #[must_use]
    pub fn deployment_at(&self, context_root: &str) -> Option<String> {
        self.contexts.lock().get(context_root).cloned()
    }

    /// # Errors
    /// Returns [`WebError::ContextConflict`] when another deployment holds `context_root`.
    pub fn register(&self, context_root: &str, deployment: &str) -> Result<(), WebError> {
        let mut contexts = self.contexts.lock();
        if let Some(owner) = contexts.get(context_root) {
            return Err(WebError::ContextConflict {
                message: format!("{context_root} is served by {owner}").into(),
                context: Some(self.name.clone().into()),
            });
        }
        contexts.insert(context_root.to_owned(), deployment.to_owned());
        Ok(())
    }

    pub fn unregister(&self, context_root: &str) -> bool {
        self.contexts.lock().remove(context_root).is_some()
    }
}

impl Service for VirtualHost {
    fn start(&self, _ctx: &StartContext<'_>) -> Result<(), ServiceError> {
        info!(host = %self.name, "Virtual host started");
        Ok(())
    }

    fn stop(&self) {
        info!(host = %self.name, contexts = self.contexts.lock().len(), "Virtual host stopped");
    }
}

/// A deployment's web application, registered on its host while up.
#[derive(Debug)]
pub struct WebContext {
    deployment: String,
    context_root: String,
    host: ServiceName,
    registered: Mutex<Option<Arc<VirtualHost>>>,
}

impl WebContext {
    #[must_use]
    pub fn new(deployment: impl Into<String>, context_root: impl Into<String>, host: ServiceName) -> Self {
        Self { deployment: deployment.into(), context_root: context_root.into(), host, registered: Mutex::default() }
    }

    #[must_use]
    pub fn context_root(&self) -> &str {
        &self.context_root
    }

    #[must_use]
    pub fn deployment(&self) -> &str {
        &self.deployment
    }
}

impl Service for WebContext {
    fn start(&self, ctx: &StartContext<'_>) -> Result<(), ServiceError> {
        let host = ctx.dependency::<VirtualHost>(&self.host)?;
        host.register(&self.context_root, &self.deployment).map_err(|err| ServiceError::StartFailed {
            message: err.to_string().into(),
            context: Some(ctx.name().to_string().into()),
        })?;
        debug!(deployment = %self.deployment, context_root = %self.context_root, host = host.name(), "Web context registered");
        *self.registered.lock() = Some(host);
        Ok(())
    }

    fn stop(&self) {
        if let Some(host) = self.registered.lock().take() {
            host.unregister(&self.context_root);
            debug!(deployment = %self.deployment, context_root = %self.context_root, "Web context unregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_roots_are_exclusive() {
        let host = VirtualHost::new("default-host");
        host.register("/shop", "shop.war").unwrap();

        let err = host.register("/shop", "other.war").unwrap_err();
        assert!(err.to_string().contains("shop.war"), "{err}");
        assert_eq!(host.deployment_at("/shop").as_deref(), Some("shop.war"));

        assert!(host.unregister("/shop"));
        assert!(!host.unregister("/shop"));
        host.register("/shop", "other.war").unwrap();
    }
}
