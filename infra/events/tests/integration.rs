use dhub_event_bus::{EventBus, EventBusError, EventReceiverExt};

#[derive(Clone, Debug, PartialEq, Eq)]
struct UnitDeployed(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
struct ActiveDeployments(pub usize);

#[tokio::test]
async fn test_broadcast_reaches_every_subscriber() {
    let bus = EventBus::new();
    let mut first = bus.subscribe::<UnitDeployed>().unwrap();
    let mut second = bus.subscribe::<UnitDeployed>().unwrap();

    assert_eq!(bus.publish(UnitDeployed(7)).unwrap(), 2);

    assert_eq!(*first.next_event().await.unwrap(), UnitDeployed(7));
    assert_eq!(*second.next_event().await.unwrap(), UnitDeployed(7));
}

#[tokio::test]
async fn test_publish_without_subscribers_is_not_an_error() {
    let bus = EventBus::new();
    assert_eq!(bus.publish(UnitDeployed(1)).unwrap(), 0);
}

#[tokio::test]
async fn test_lagged_receiver_resumes() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe_with_capacity::<UnitDeployed>(2).unwrap();

    for i in 0..10 {
        bus.publish(UnitDeployed(i)).unwrap();
    }

    let first = rx.next_event().await.unwrap();
    assert!(first.0 >= 8, "expected the retained tail, got {}", first.0);
    let second = rx.next_event().await.unwrap();
    assert_eq!(second.0, first.0 + 1);
}

#[tokio::test]
async fn test_watch_keeps_latest_value() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe_watch(ActiveDeployments(0)).unwrap();

    bus.publish_watch(ActiveDeployments(1)).unwrap();
    bus.publish_watch(ActiveDeployments(3)).unwrap();

    assert_eq!(*rx.next_event().await.unwrap(), ActiveDeployments(3));
}

#[tokio::test]
async fn test_kind_mismatch_is_reported() {
    let bus = EventBus::new();
    let _rx = bus.subscribe_watch(ActiveDeployments(0)).unwrap();

    let err = bus.publish(ActiveDeployments(1)).unwrap_err();
    assert!(matches!(err, EventBusError::ChannelKindMismatch { .. }));
}

#[tokio::test]
async fn test_zero_capacity_rejected() {
    let bus = EventBus::new();
    let err = bus.subscribe_with_capacity::<UnitDeployed>(0).unwrap_err();
    assert!(matches!(err, EventBusError::InvalidCapacity { .. }));
}

#[tokio::test]
async fn test_shutdown_closes_receivers() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe::<UnitDeployed>().unwrap();

    assert_eq!(bus.shutdown(), 1);
    assert!(rx.next_event().await.is_none());
}
