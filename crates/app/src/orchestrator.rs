//! Orchestrator — owns the event bus subscriptions and every installed use case.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cem_domain::ski::Ski;

use crate::event_bus::InProcessEventBus;
use crate::ports::{HvacDelegate, MeasurementDelegate, Transport};
use crate::refresh::RefreshStrategy;
use crate::use_cases::{Hvac, HvacUseCase, Measurement, MeasurementUseCase, UseCase};

/// Wires use cases to a transport and an event bus.
///
/// Each installed use case gets its own dispatcher task on the bus, so a
/// slow use case never holds up another one.
pub struct Cem<T> {
    transport: T,
    bus: InProcessEventBus,
    shutdown: CancellationToken,
    dispatchers: Vec<JoinHandle<()>>,
}

impl<T> Cem<T>
where
    T: Transport + Clone + 'static,
{
    #[must_use]
    pub fn new(transport: T, bus: InProcessEventBus) -> Self {
        Self {
            transport,
            bus,
            shutdown: CancellationToken::new(),
            dispatchers: Vec::new(),
        }
    }

    /// Install power consumption monitoring, reporting to `delegate`.
    pub fn add_measurement_support<D: MeasurementDelegate>(
        &mut self,
        delegate: D,
        strategy: RefreshStrategy,
    ) -> MeasurementUseCase<T, D> {
        let use_case = UseCase::install(
            self.transport.clone(),
            Measurement::new(delegate),
            strategy,
            &self.shutdown,
        );
        self.dispatchers
            .push(self.bus.subscribe_handler(use_case.clone()));
        use_case
    }

    /// Install HVAC overrun monitoring and control, reporting to `delegate`.
    pub fn add_hvac_support<D: HvacDelegate>(
        &mut self,
        delegate: D,
        strategy: RefreshStrategy,
    ) -> HvacUseCase<T, D> {
        let use_case = UseCase::install(
            self.transport.clone(),
            Hvac::new(delegate),
            strategy,
            &self.shutdown,
        );
        self.dispatchers
            .push(self.bus.subscribe_handler(use_case.clone()));
        use_case
    }

    /// Allow and trust the remote service identified by `ski`.
    pub fn connect_remote(&self, ski: &Ski) {
        self.transport.register_remote_service(ski);
        self.transport.update_trust(ski, true);
        tracing::info!(%ski, "remote service registered and trusted");
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn bus(&self) -> &InProcessEventBus {
        &self.bus
    }

    /// Token cancelled on [`shutdown`](Self::shutdown); background tasks
    /// outside the core can hang off it.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop every device task and event dispatcher.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for dispatcher in &self.dispatchers {
            dispatcher.abort();
        }
        for dispatcher in self.dispatchers {
            if let Err(err) = dispatcher.await
                && !err.is_cancelled()
            {
                tracing::warn!(%err, "event dispatcher ended abnormally");
            }
        }
        tracing::info!("orchestrator stopped");
    }
}
