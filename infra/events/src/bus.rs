use crate::error::EventBusError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{trace, warn};

/// Deployment notifications are bursty at boot (one per unit), 256 covers a
/// full deployment directory without lagging a slow subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Channel flavour registered for an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Every subscriber sees every event.
    Broadcast { capacity: usize },
    /// Subscribers only see the latest value.
    Watch,
}

/// Anything `Send + Sync + 'static` can travel on the bus.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

#[derive(Debug)]
struct Channel {
    kind: ChannelKind,
    sender: Box<dyn Any + Send + Sync>,
}

impl Channel {
    fn broadcast<T: Event>(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel::<Arc<T>>(capacity);
        Self { kind: ChannelKind::Broadcast { capacity }, sender: Box::new(tx) }
    }

    fn watch<T: Event>(initial: Arc<T>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { kind: ChannelKind::Watch, sender: Box::new(tx) }
    }

    fn broadcast_sender<T: Event>(&self) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
        match self.kind {
            ChannelKind::Broadcast { .. } => self
                .sender
                .downcast_ref::<broadcast::Sender<Arc<T>>>()
                .cloned()
                .ok_or_else(mismatch::<T>),
            ChannelKind::Watch => Err(kind_mismatch::<T>("Broadcast", self.kind)),
        }
    }

    fn watch_sender<T: Event>(&self) -> Result<watch::Sender<Arc<T>>, EventBusError> {
        match self.kind {
            ChannelKind::Watch => self
                .sender
                .downcast_ref::<watch::Sender<Arc<T>>>()
                .cloned()
                .ok_or_else(mismatch::<T>),
            ChannelKind::Broadcast { .. } => Err(kind_mismatch::<T>("Watch", self.kind)),
        }
    }
}

/// Thread-safe event bus keyed by the event's [`TypeId`].
///
/// Cloning is cheap; clones share the same channels.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    channels: Arc<RwLock<FxHashMap<TypeId, Channel>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to broadcast events of type `T`.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if `T` is registered as a watch channel.
    pub fn subscribe<T: Event>(&self) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        self.subscribe_with_capacity::<T>(DEFAULT_CAPACITY)
    }

    /// Subscribes with an explicit buffer capacity; only the first registration
    /// decides the capacity.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidCapacity`] for zero capacity or
    /// [`EventBusError::ChannelKindMismatch`] for a watch channel.
    pub fn subscribe_with_capacity<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        if capacity == 0 {
            return Err(EventBusError::InvalidCapacity {
                message: "capacity must be greater than zero".into(),
                context: Some(type_name::<T>().into()),
            });
        }
        Ok(self.broadcast_sender::<T>(capacity)?.subscribe())
    }

    /// Publishes `event` to broadcast subscribers and returns how many received it.
    ///
    /// Publishing without subscribers is not an error.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if `T` is registered as a watch channel.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, EventBusError> {
        let sender = self.broadcast_sender::<T>(DEFAULT_CAPACITY)?;
        match sender.send(Arc::new(event)) {
            Ok(count) => {
                trace!(event = type_name::<T>(), count, "Event dispatched");
                Ok(count)
            },
            Err(_) => {
                trace!(event = type_name::<T>(), "Event dropped: no active subscribers");
                Ok(0)
            },
        }
    }

    /// Subscribes to the latest value of `T`, seeding the channel with `initial`
    /// if it does not exist yet.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if `T` is a broadcast channel.
    pub fn subscribe_watch<T: Event>(
        &self,
        initial: T,
    ) -> Result<watch::Receiver<Arc<T>>, EventBusError> {
        Ok(self.watch_sender(Arc::new(initial))?.subscribe())
    }

    /// Replaces the latest value of `T`.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if `T` is a broadcast channel.
    pub fn publish_watch<T: Event>(&self, value: T) -> Result<(), EventBusError> {
        let value = Arc::new(value);
        self.watch_sender(value.clone())?.send_replace(value);
        Ok(())
    }

    /// Drops every channel; receivers observe closure. Returns the number closed.
    #[must_use]
    pub fn shutdown(&self) -> usize {
        let mut channels = self.channels.write();
        let count = channels.len();
        channels.clear();
        count
    }

    fn broadcast_sender<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
        let id = TypeId::of::<T>();
        if let Some(channel) = self.channels.read().get(&id) {
            if let ChannelKind::Broadcast { capacity: existing } = channel.kind
                && existing != capacity
                && capacity != DEFAULT_CAPACITY
            {
                warn!(
                    event = type_name::<T>(),
                    existing,
                    requested = capacity,
                    "Broadcast channel already initialized with a different capacity"
                );
            }
            return channel.broadcast_sender::<T>();
        }

        self.channels
            .write()
            .entry(id)
            .or_insert_with(|| {
                trace!(event = type_name::<T>(), capacity, "Initializing broadcast channel");
                Channel::broadcast::<T>(capacity)
            })
            .broadcast_sender::<T>()
    }

    fn watch_sender<T: Event>(
        &self,
        initial: Arc<T>,
    ) -> Result<watch::Sender<Arc<T>>, EventBusError> {
        let id = TypeId::of::<T>();
        if let Some(channel) = self.channels.read().get(&id) {
            return channel.watch_sender::<T>();
        }

        self.channels
            .write()
            .entry(id)
            .or_insert_with(|| {
                trace!(event = type_name::<T>(), "Initializing watch channel");
                Channel::watch(initial)
            })
            .watch_sender::<T>()
    }
}

fn mismatch<T>() -> EventBusError {
    EventBusError::TypeMismatch {
        message: type_name::<T>().into(),
        context: Some("Unexpected event type".into()),
    }
}

fn kind_mismatch<T>(expected: &str, found: ChannelKind) -> EventBusError {
    EventBusError::ChannelKindMismatch {
        message: format!("Expected {expected} but found {found:?} for {}", type_name::<T>()).into(),
        context: None,
    }
}
