//! Use cases — the per-device state tracker shared by Measurement and HVAC.
//!
//! A [`UseCase`] reacts to transport events for one remote feature type:
//! it starts a refresh task when a device that exposes the feature appears,
//! releases everything it holds for the device when it disappears, and keeps
//! a descriptor cache so each cycle only fetches live values. What differs
//! between use cases (feature type, payload shapes, delegate) is captured by
//! a [`UseCaseProfile`].

pub mod hvac;
pub mod measurement;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cem_domain::binding::{BindingRequest, SubscriptionRequest};
use cem_domain::device::{PRIMARY_ENTITY, RemoteDevice};
use cem_domain::error::{AddressResolutionError, CemError, RemoteRequestError};
use cem_domain::event::{DataPayload, ElementChange};
use cem_domain::feature::{FeatureType, FunctionType, Role, UseCaseSupport};
use cem_domain::ski::Ski;
use cem_domain::snapshot::{AnnotatedSnapshot, Identified, annotate};

use crate::descriptor_cache::DescriptorCache;
use crate::link::{self, FeatureLink};
use crate::ports::{Transport, UseCaseEventHandler};
use crate::refresh::{
    self, DeviceLoop, LoopRegistry, PUSH_TRIGGER_CAPACITY, RefreshStrategy, TriggerOutcome,
};

pub use hvac::{Hvac, HvacUseCase};
pub use measurement::{Measurement, MeasurementUseCase};

/// What makes one use case different from another.
pub trait UseCaseProfile: Send + Sync + 'static {
    /// Live data point reported by the remote server feature.
    type Value: Identified + Clone + Send + Sync + 'static;
    /// Static metadata explaining a [`Self::Value`].
    type Description: Identified<Id = <Self::Value as Identified>::Id>
        + Clone
        + Send
        + Sync
        + 'static;

    /// Short name used in logs.
    const NAME: &'static str;
    /// Remote server feature this use case reads from.
    const FEATURE: FeatureType;
    /// Description of the local client feature added on install.
    const CLIENT_DESCRIPTION: &'static str;
    const VALUE_FUNCTION: FunctionType;
    const DESCRIPTION_FUNCTION: FunctionType;

    /// Use-case support announced on install.
    fn support() -> UseCaseSupport;

    /// Extract live values, handing back payloads of any other shape.
    ///
    /// # Errors
    ///
    /// Returns the payload unchanged when it does not carry values.
    fn values(payload: DataPayload) -> Result<Vec<Self::Value>, DataPayload>;

    /// Extract descriptors, handing back payloads of any other shape.
    ///
    /// # Errors
    ///
    /// Returns the payload unchanged when it does not carry descriptors.
    fn descriptions(payload: DataPayload) -> Result<Vec<Self::Description>, DataPayload>;

    /// Hand a completed snapshot to the application.
    fn deliver(&self, ski: &Ski, snapshot: AnnotatedSnapshot<Self::Value, Self::Description>);

    /// Report a failed refresh cycle to the application.
    fn cycle_failed(&self, ski: &Ski, err: &CemError);
}

/// Event-driven state tracker for one use case.
///
/// Cloning is cheap and yields a handle to the same state; one clone is
/// registered on the event bus, others serve as the facade.
pub struct UseCase<T, P: UseCaseProfile> {
    inner: Arc<Inner<T, P>>,
}

impl<T, P: UseCaseProfile> Clone for UseCase<T, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, P: UseCaseProfile> {
    transport: T,
    profile: P,
    strategy: RefreshStrategy,
    descriptors: DescriptorCache<P::Description>,
    loops: LoopRegistry<P::Value>,
    shutdown: CancellationToken,
}

impl<T, P> UseCase<T, P>
where
    T: Transport + 'static,
    P: UseCaseProfile,
{
    /// Add the local client feature, announce support and start tracking.
    ///
    /// Every device task is stopped when `shutdown` is cancelled.
    pub fn install(
        transport: T,
        profile: P,
        strategy: RefreshStrategy,
        shutdown: &CancellationToken,
    ) -> Self {
        let local = transport.add_local_feature(P::FEATURE, Role::Client, P::CLIENT_DESCRIPTION);
        transport.announce_use_case(P::support());
        tracing::info!(use_case = P::NAME, %local, ?strategy, "use case installed");

        Self {
            inner: Arc::new(Inner {
                transport,
                profile,
                strategy,
                descriptors: DescriptorCache::new(),
                loops: LoopRegistry::new(),
                shutdown: shutdown.child_token(),
            }),
        }
    }

    #[must_use]
    pub fn strategy(&self) -> RefreshStrategy {
        self.inner.strategy
    }

    /// Whether a refresh task currently runs for `ski`.
    #[must_use]
    pub fn is_tracking(&self, ski: &Ski) -> bool {
        self.inner.loops.is_active(ski)
    }

    /// Number of devices with a registered refresh task.
    #[must_use]
    pub fn tracked_devices(&self) -> usize {
        self.inner.loops.len()
    }

    /// Descriptors cached for `ski`, if any.
    #[must_use]
    pub fn cached_descriptors(&self, ski: &Ski) -> Option<Arc<[P::Description]>> {
        self.inner.descriptors.get(ski)
    }

    /// Bind our client feature to the remote server feature of `ski`.
    ///
    /// # Errors
    ///
    /// Returns [`CemError::AddressResolution`] without writing anything when
    /// the device, one of the features or the remote node management cannot
    /// be resolved, and [`CemError::BindingWrite`] when the write fails.
    #[tracing::instrument(skip(self), fields(use_case = P::NAME))]
    pub async fn bind(&self, ski: &Ski) -> Result<(), CemError> {
        let link = link::client_link(&self.inner.transport, ski, P::FEATURE)?;
        let node_management = link
            .device
            .node_management()
            .map(|f| f.address.clone())
            .ok_or_else(|| AddressResolutionError::MissingRemoteFeature {
                ski: ski.clone(),
                feature: FeatureType::NodeManagement,
                role: Role::Special,
            })?;
        let request = BindingRequest {
            client_address: link.local.clone(),
            server_address: link.remote.clone(),
            server_feature_type: P::FEATURE,
        };

        self.inner
            .transport
            .write_binding(&link.local, &node_management, request)
            .await
            .map_err(CemError::BindingWrite)?;

        tracing::info!(remote = %link.remote, "binding written");
        Ok(())
    }

    /// Stop every device task and forget their state.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.loops.cancel_all();
        tracing::info!(use_case = P::NAME, "use case stopped");
    }

    fn start_device(&self, device: Arc<RemoteDevice>) -> Result<(), CemError> {
        let ski = device.ski.clone();
        if self.inner.loops.is_active(&ski) {
            tracing::debug!(use_case = P::NAME, %ski, "device already tracked");
            return Ok(());
        }
        if device
            .feature(PRIMARY_ENTITY, P::FEATURE, Role::Server)
            .is_none()
        {
            tracing::debug!(
                use_case = P::NAME,
                %ski,
                feature = ?P::FEATURE,
                "device does not expose the feature, ignoring"
            );
            return Ok(());
        }

        let link = link::client_link_on(&self.inner.transport, device, P::FEATURE)?;
        let live = self.inner.shutdown.child_token();
        let inner = Arc::clone(&self.inner);
        let token = live.clone();

        let (trigger, handle) = match self.inner.strategy {
            RefreshStrategy::Polling { interval } => {
                let handle = tokio::spawn(async move {
                    let this = &*inner;
                    let link = &link;
                    let live = &token;
                    refresh::run_polling(token.clone(), interval, move || {
                        this.run_cycle(link, live, None)
                    })
                    .await;
                    tracing::debug!(use_case = P::NAME, ski = %link.ski(), "polling stopped");
                });
                (None, handle)
            }
            RefreshStrategy::SubscriptionPush => {
                let (tx, rx) = mpsc::channel(PUSH_TRIGGER_CAPACITY);
                let handle = tokio::spawn(async move { inner.push_device(link, token, rx).await });
                (Some(tx), handle)
            }
        };

        self.inner
            .loops
            .insert(ski.clone(), DeviceLoop::new(live, trigger, handle));
        tracing::info!(use_case = P::NAME, %ski, "device tracked");
        Ok(())
    }

    fn stop_device(&self, ski: &Ski) {
        // Cancel first so a cycle still in flight cannot re-populate the cache.
        let stopped = self.inner.loops.cancel(ski);
        let dropped = self.inner.descriptors.remove(ski);
        if stopped || dropped {
            tracing::info!(use_case = P::NAME, %ski, "device released");
        } else {
            tracing::debug!(use_case = P::NAME, %ski, "device was not tracked");
        }
    }
}

impl<T, P> Inner<T, P>
where
    T: Transport + 'static,
    P: UseCaseProfile,
{
    async fn push_device(
        self: Arc<Self>,
        link: FeatureLink,
        live: CancellationToken,
        triggers: mpsc::Receiver<Vec<P::Value>>,
    ) {
        let ski = link.ski().clone();
        if let Err(source) = self.transport.subscribe(&link.local, &link.remote).await {
            let err = CemError::Subscription(source);
            tracing::warn!(
                use_case = P::NAME,
                %ski,
                %err,
                "subscription failed, device not refreshed"
            );
            self.profile.cycle_failed(&ski, &err);
            return;
        }
        tracing::debug!(use_case = P::NAME, %ski, remote = %link.remote, "subscribed");

        if let Err(err) = self.descriptors_for(&link, &live).await {
            tracing::warn!(
                use_case = P::NAME,
                %ski,
                %err,
                "descriptor prefetch failed, retrying on next update"
            );
        }

        let this = &*self;
        let link = &link;
        let token = &live;
        refresh::run_push(live.clone(), triggers, move |values| {
            this.run_cycle(link, token, Some(values))
        })
        .await;
        tracing::debug!(use_case = P::NAME, %ski, "push updates stopped");
    }

    async fn run_cycle(
        &self,
        link: &FeatureLink,
        live: &CancellationToken,
        pushed: Option<Vec<P::Value>>,
    ) {
        let ski = link.ski();
        match self.cycle(link, live, pushed).await {
            Ok(_) if live.is_cancelled() => {
                tracing::debug!(
                    use_case = P::NAME,
                    %ski,
                    "device released mid-cycle, dropping snapshot"
                );
            }
            Ok(snapshot) => {
                tracing::debug!(
                    use_case = P::NAME,
                    %ski,
                    entries = snapshot.len(),
                    "delivering snapshot"
                );
                self.profile.deliver(ski, snapshot);
            }
            Err(err) => {
                tracing::warn!(use_case = P::NAME, %ski, %err, "refresh cycle failed");
                self.profile.cycle_failed(ski, &err);
            }
        }
    }

    async fn cycle(
        &self,
        link: &FeatureLink,
        live: &CancellationToken,
        pushed: Option<Vec<P::Value>>,
    ) -> Result<AnnotatedSnapshot<P::Value, P::Description>, CemError> {
        let descriptions = self.descriptors_for(link, live).await?;
        let values = match pushed {
            Some(values) => values,
            None => {
                let payload = self.request(link, P::VALUE_FUNCTION).await?;
                P::values(payload).map_err(|other| unexpected(P::VALUE_FUNCTION, &other))?
            }
        };
        Ok(annotate(link.ski(), &values, &descriptions, Utc::now()))
    }

    async fn descriptors_for(
        &self,
        link: &FeatureLink,
        live: &CancellationToken,
    ) -> Result<Arc<[P::Description]>, CemError> {
        self.descriptors
            .get_or_fetch(link.ski(), live, || async {
                let payload = self.request(link, P::DESCRIPTION_FUNCTION).await?;
                P::descriptions(payload)
                    .map_err(|other| unexpected(P::DESCRIPTION_FUNCTION, &other))
            })
            .await
    }

    async fn request(
        &self,
        link: &FeatureLink,
        function: FunctionType,
    ) -> Result<DataPayload, CemError> {
        let token = self
            .transport
            .request_data(function, &link.local, &link.remote)
            .await
            .map_err(|source| RemoteRequestError::Request { function, source })?;
        let payload = self
            .transport
            .fetch_result(token, &link.remote)
            .await
            .map_err(|source| RemoteRequestError::Fetch { function, source })?;
        Ok(payload)
    }
}

fn unexpected(expected: FunctionType, actual: &DataPayload) -> CemError {
    RemoteRequestError::UnexpectedPayload {
        expected,
        actual: actual.kind(),
    }
    .into()
}

impl<T, P> UseCaseEventHandler for UseCase<T, P>
where
    T: Transport + 'static,
    P: UseCaseProfile,
{
    fn name(&self) -> &'static str {
        P::NAME
    }

    async fn on_device_change(
        &self,
        change: ElementChange,
        device: Arc<RemoteDevice>,
    ) -> Result<(), CemError> {
        match change {
            ElementChange::Add => self.start_device(device),
            ElementChange::Remove => {
                self.stop_device(&device.ski);
                Ok(())
            }
            ElementChange::Update => Ok(()),
        }
    }

    async fn on_subscription_change(
        &self,
        change: ElementChange,
        ski: Ski,
        data: SubscriptionRequest,
    ) -> Result<(), CemError> {
        if change != ElementChange::Add || !data.targets(P::FEATURE) {
            return Ok(());
        }

        let link = link::server_link(&self.inner.transport, &ski, P::FEATURE)?;
        self.inner
            .transport
            .start_heartbeat(&ski, &link.local, &link.remote)
            .map_err(CemError::Heartbeat)?;
        tracing::info!(use_case = P::NAME, %ski, destination = %link.remote, "heartbeat started");
        Ok(())
    }

    async fn on_data_change(
        &self,
        change: ElementChange,
        ski: Ski,
        data: DataPayload,
    ) -> Result<(), CemError> {
        if change != ElementChange::Update {
            return Ok(());
        }
        let Ok(values) = P::values(data) else {
            return Ok(());
        };
        if !self.inner.strategy.is_push() {
            tracing::debug!(use_case = P::NAME, %ski, "pushed values ignored while polling");
            return Ok(());
        }

        match self.inner.loops.trigger(&ski, values) {
            TriggerOutcome::Queued => {
                tracing::trace!(use_case = P::NAME, %ski, "update queued");
            }
            TriggerOutcome::Busy => {
                tracing::warn!(use_case = P::NAME, %ski, "device busy, update dropped");
            }
            TriggerOutcome::Inactive => {
                tracing::debug!(use_case = P::NAME, %ski, "update for untracked device ignored");
            }
        }
        Ok(())
    }
}
