//! Event bus port — publishing transport events and handling them per use case.

use std::future::Future;
use std::sync::Arc;

use cem_domain::binding::SubscriptionRequest;
use cem_domain::device::RemoteDevice;
use cem_domain::error::CemError;
use cem_domain::event::{DataPayload, ElementChange, UseCaseEvent};
use cem_domain::ski::Ski;

/// Publishes transport events to every subscribed use case.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    ///
    /// Publishing never fails: with no subscriber the event is dropped.
    fn publish(&self, event: UseCaseEvent);
}

impl<T: EventPublisher + Send + Sync> EventPublisher for Arc<T> {
    fn publish(&self, event: UseCaseEvent) {
        (**self).publish(event);
    }
}

/// The fixed capability every use case exposes to the event bus.
///
/// Each handler method returns its own failure instead of only logging it,
/// so callers and tests can assert on it; the bus dispatcher logs whatever
/// comes back and keeps going.
pub trait UseCaseEventHandler: Send + Sync + 'static {
    /// Short name used in logs (e.g. `"measurement"`).
    fn name(&self) -> &'static str;

    /// A remote device connected or disconnected.
    fn on_device_change(
        &self,
        change: ElementChange,
        device: Arc<RemoteDevice>,
    ) -> impl Future<Output = Result<(), CemError>> + Send;

    /// A remote device changed a subscription on one of our features.
    fn on_subscription_change(
        &self,
        change: ElementChange,
        ski: Ski,
        data: SubscriptionRequest,
    ) -> impl Future<Output = Result<(), CemError>> + Send;

    /// A remote feature reported new data.
    fn on_data_change(
        &self,
        change: ElementChange,
        ski: Ski,
        data: DataPayload,
    ) -> impl Future<Output = Result<(), CemError>> + Send;

    /// Route an event to the matching handler method.
    ///
    /// Event shapes this version does not know about are ignored.
    fn handle_event(
        &self,
        event: UseCaseEvent,
    ) -> impl Future<Output = Result<(), CemError>> + Send {
        async move {
            match event {
                UseCaseEvent::DeviceChange { change, device } => {
                    self.on_device_change(change, device).await
                }
                UseCaseEvent::SubscriptionChange { change, ski, data } => {
                    self.on_subscription_change(change, ski, data).await
                }
                UseCaseEvent::DataChange { change, ski, data } => {
                    self.on_data_change(change, ski, data).await
                }
                _ => Ok(()),
            }
        }
    }
}
