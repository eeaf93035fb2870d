//! In-process event bus backed by a tokio broadcast channel.
//!
//! The transport publishes; each use case registers a
//! [`UseCaseEventHandler`] and gets its own dispatcher task, so events reach
//! a given use case in publication order.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use cem_domain::event::UseCaseEvent;

use crate::ports::{EventPublisher, UseCaseEventHandler};

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Cloning is cheap and yields a handle to the same bus.
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<UseCaseEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to raw events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UseCaseEvent> {
        self.sender.subscribe()
    }

    /// Register a handler and spawn its dispatcher task.
    ///
    /// The handler sees every event published after this call. Errors it
    /// returns are logged; they never stop the dispatcher.
    pub fn subscribe_handler<H: UseCaseEventHandler>(&self, handler: H) -> JoinHandle<()> {
        let events = BroadcastStream::new(self.sender.subscribe());
        tokio::spawn(dispatch(handler, events))
    }

    /// Number of live subscribers (raw receivers and handlers).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: UseCaseEvent) {
        // broadcast::send fails only when there are zero receivers,
        // which is fine, the event is simply dropped.
        let _ = self.sender.send(event);
    }
}

async fn dispatch<H: UseCaseEventHandler>(handler: H, mut events: BroadcastStream<UseCaseEvent>) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                let ski = event.ski().clone();
                tracing::trace!(handler = handler.name(), %ski, ?event, "dispatching event");
                if let Err(err) = handler.handle_event(event).await {
                    tracing::warn!(handler = handler.name(), %ski, %err, "event handling failed");
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(
                    handler = handler.name(),
                    skipped,
                    "event dispatcher lagged, events dropped"
                );
            }
        }
    }
    tracing::debug!(handler = handler.name(), "event bus closed, dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use cem_domain::binding::SubscriptionRequest;
    use cem_domain::device::RemoteDevice;
    use cem_domain::error::{AddressResolutionError, CemError};
    use cem_domain::event::{DataPayload, ElementChange};
    use cem_domain::measurement::MeasurementData;
    use cem_domain::ski::Ski;
    use tokio::sync::mpsc;

    fn ski(raw: &str) -> Ski {
        Ski::new(raw).unwrap()
    }

    fn device_added(raw: &str) -> UseCaseEvent {
        UseCaseEvent::DeviceChange {
            change: ElementChange::Add,
            device: Arc::new(RemoteDevice::builder(ski(raw)).build()),
        }
    }

    /// Forwards a label per handled event; fails on subscription changes.
    #[derive(Clone)]
    struct RecordingHandler {
        seen: mpsc::UnboundedSender<String>,
        calls: Arc<Mutex<usize>>,
    }

    impl UseCaseEventHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn on_device_change(
            &self,
            change: ElementChange,
            device: Arc<RemoteDevice>,
        ) -> Result<(), CemError> {
            *self.calls.lock().unwrap() += 1;
            let _ = self.seen.send(format!("device:{change:?}:{}", device.ski));
            Ok(())
        }

        async fn on_subscription_change(
            &self,
            _change: ElementChange,
            ski: Ski,
            _data: SubscriptionRequest,
        ) -> Result<(), CemError> {
            *self.calls.lock().unwrap() += 1;
            let _ = self.seen.send(format!("subscription:{ski}"));
            Err(AddressResolutionError::UnknownDevice { ski }.into())
        }

        async fn on_data_change(
            &self,
            _change: ElementChange,
            ski: Ski,
            data: DataPayload,
        ) -> Result<(), CemError> {
            *self.calls.lock().unwrap() += 1;
            let _ = self.seen.send(format!("data:{ski}:{}", data.kind()));
            Ok(())
        }
    }

    fn recording() -> (RecordingHandler, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = RecordingHandler {
            seen: tx,
            calls: Arc::new(Mutex::new(0)),
        };
        (handler, rx)
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(device_added("ski-1"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.ski(), &ski("ski-1"));
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(device_added("ski-1"));

        assert_eq!(rx1.recv().await.unwrap().ski(), &ski("ski-1"));
        assert_eq!(rx2.recv().await.unwrap().ski(), &ski("ski-1"));
    }

    #[tokio::test]
    async fn should_not_panic_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        bus.publish(device_added("ski-1"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(device_added("early"));

        let mut rx = bus.subscribe();
        bus.publish(device_added("late"));

        assert_eq!(rx.recv().await.unwrap().ski(), &ski("late"));
    }

    #[tokio::test]
    async fn should_route_events_to_handler_in_publication_order() {
        let bus = InProcessEventBus::new(16);
        let (handler, mut seen) = recording();
        let _dispatcher = bus.subscribe_handler(handler);

        bus.publish(device_added("ski-1"));
        bus.publish(UseCaseEvent::DataChange {
            change: ElementChange::Update,
            ski: ski("ski-1"),
            data: DataPayload::MeasurementListData(vec![MeasurementData::reading(1, 10)]),
        });

        assert_eq!(seen.recv().await.unwrap(), "device:Add:ski-1");
        assert_eq!(seen.recv().await.unwrap(), "data:ski-1:measurementListData");
    }

    #[tokio::test]
    async fn should_keep_dispatching_after_handler_error() {
        let bus = InProcessEventBus::new(16);
        let (handler, mut seen) = recording();
        let calls = Arc::clone(&handler.calls);
        let _dispatcher = bus.subscribe_handler(handler);

        bus.publish(UseCaseEvent::SubscriptionChange {
            change: ElementChange::Add,
            ski: ski("ski-1"),
            data: SubscriptionRequest {
                client_address: None,
                server_address: None,
                server_feature_type: None,
            },
        });
        bus.publish(device_added("ski-2"));

        assert_eq!(seen.recv().await.unwrap(), "subscription:ski-1");
        assert_eq!(seen.recv().await.unwrap(), "device:Add:ski-2");
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn should_stop_dispatcher_when_bus_is_dropped() {
        let bus = InProcessEventBus::new(16);
        let (handler, _seen) = recording();
        let dispatcher = bus.subscribe_handler(handler);

        drop(bus);

        dispatcher.await.unwrap();
    }
}
