//! Facade crate for `DeployHub` subsystems and shared modules.
//! Re-exports domain/kernel primitives and aggregates subsystem activation.
//! Keep this crate thin: it should compose other crates, not implement deployment logic.
//!
//! ## Usage
//! - Add `dhub` with the desired subsystem feature flags (`jar`/`web`/`ear`, or `full`).
//! - Call [`init`] once the model controller exists to activate the subsystems the
//!   configuration enables.

pub use dhub_domain as domain;
pub use dhub_kernel as kernel;

use dhub_domain::config::ServerConfig;
use dhub_kernel::operation::{ModelController, Operation, OperationError, PathAddress};
use serde_json::Value;
use tracing::{info, warn};

/// Subsystem registry for runtime introspection.
pub mod subsystems {
    use dhub_kernel::operation::Subsystem;
    use std::sync::Arc;

    #[cfg(feature = "ear")]
    pub use dhub_ear as ear;
    #[cfg(feature = "jar")]
    pub use dhub_jar as jar;
    #[cfg(feature = "web")]
    pub use dhub_web as web;

    /// Build-time enabled subsystems (by Cargo feature), in boot order.
    pub const ENABLED: &[&str] = &[
        #[cfg(feature = "jar")]
        "jar",
        #[cfg(feature = "web")]
        "web",
        #[cfg(feature = "ear")]
        "ear",
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }

    /// One instance of every compiled subsystem, in boot order.
    #[must_use]
    pub fn available() -> Vec<Arc<dyn Subsystem>> {
        let mut all: Vec<Arc<dyn Subsystem>> = Vec::new();
        #[cfg(feature = "jar")]
        all.push(Arc::new(jar::JarSubsystem));
        #[cfg(feature = "web")]
        all.push(Arc::new(web::WebSubsystem));
        #[cfg(feature = "ear")]
        all.push(Arc::new(ear::EarSubsystem));
        all
    }
}

/// Registers every compiled subsystem with `controller`, then activates the ones
/// `config.subsystems` enables in a single composite operation.
///
/// Returns the names of the activated subsystems.
///
/// # Errors
/// Returns the error of the failed `add`; no subsystem stays active in that case.
pub fn init(config: &ServerConfig, controller: &ModelController) -> Result<Vec<&'static str>, OperationError> {
    for subsystem in subsystems::available() {
        controller.register_subsystem(subsystem);
    }

    let mut activated = Vec::new();
    let mut steps = Vec::new();
    for name in config.subsystems.names() {
        if !subsystems::is_enabled(name) {
            warn!(subsystem = name, "Subsystem enabled in configuration but not compiled in");
            continue;
        }
        steps.push(Operation::add(PathAddress::subsystem(name), params(config, name)));
        activated.push(name);
    }

    if !steps.is_empty() {
        controller.execute(&Operation::composite(steps))?;
    }
    info!(subsystems = ?activated, "Subsystems initialized");
    Ok(activated)
}

fn params(config: &ServerConfig, subsystem: &str) -> Value {
    match subsystem {
        domain::subsystems::WEB => serde_json::json!({ "default-host": config.web.default_host }),
        _ => Value::Null,
    }
}
