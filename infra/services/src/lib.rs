//! # Services
//!
//! A small dependency-resolving container for the runtime services installed
//! by deployment processors and subsystems.
//!
//! Services are registered under a hierarchical [`ServiceName`] together with
//! the names they depend on. The container starts a service as soon as all of
//! its dependencies are `Up`, and takes dependents down before a dependency
//! leaves. Names form a tree, so everything a deployment installed can be
//! removed at once with [`ServiceContainer::remove_children`].
//!
//! ```rust
//! use dhub_services::{Service, ServiceContainer, ServiceError, ServiceName, ServiceState, StartContext};
//!
//! struct Host;
//! impl Service for Host {
//!     fn start(&self, _: &StartContext<'_>) -> Result<(), ServiceError> {
//!         Ok(())
//!     }
//! }
//!
//! let container = ServiceContainer::new();
//! let host = ServiceName::of(["dhub", "web", "host"]);
//! let state = container.add_service(host.clone(), Host).install().unwrap();
//! assert_eq!(state, ServiceState::Up);
//! assert!(container.value::<Host>(&host).is_some());
//! ```

mod container;
mod error;
mod name;
mod service;

pub use container::{ServiceBuilder, ServiceContainer};
pub use error::{ServiceError, ServiceErrorExt};
pub use name::ServiceName;
pub use service::{Service, ServiceMode, ServiceState, StartContext};
