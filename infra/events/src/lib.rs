//! # Event Bus
//!
//! A type-keyed, thread-safe event bus. The deployment manager publishes
//! lifecycle notifications on it; the server and tests subscribe.
//!
//! * **Broadcast** channels fan every event out to every subscriber.
//! * **Watch** channels keep only the latest value (e.g. a deployment count).
//!
//! # Example
//!
//! ```rust
//! use dhub_event_bus::{EventBus, EventBusError, EventReceiverExt};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct UnitDeployed { name: String }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!     let mut rx = bus.subscribe::<UnitDeployed>()?;
//!     bus.publish(UnitDeployed { name: "app.war".into() })?;
//!
//!     let event = rx.next_event().await.expect("bus is open");
//!     assert_eq!(event.name, "app.war");
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{ChannelKind, Event, EventBus};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
