//! # cem-adapter-virtual
//!
//! Virtual/demo transport that simulates remote devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Kind | Features (entity `[1]`) | Behaviour |
//! |------|-------------------------|-----------|
//! | `evse` | Measurement server | Reports power, energy and current following a load profile |
//! | `hvac` | HVAC server and client | Holds three overrun slots; written active slots start running |
//! | `hybrid` | All of the above | Both |
//!
//! Every device also exposes node management on entity `[0]`.
//!
//! ## Lifecycle
//!
//! A device connects once its SKI is both registered and trusted; the
//! transport then publishes a device-add event, and a subscription change for
//! every local server feature the device has a client for. Data changes are
//! published for subscribed features: measurement readings on each
//! [`simulation`](VirtualTransport::start_simulation) step, overrun states
//! after each write.
//!
//! ## Dependency rule
//!
//! Depends on `cem-app` (port traits) and `cem-domain` only.

mod devices;
mod error;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use cem_app::ports::{EventPublisher, Transport};
use cem_domain::binding::{BindingRequest, SubscriptionRequest};
use cem_domain::device::{
    DEVICE_INFORMATION_ENTITY, LocalServiceDescription, PRIMARY_ENTITY, RemoteDevice,
};
use cem_domain::error::TransportError;
use cem_domain::event::{DataPayload, ElementChange, UseCaseEvent};
use cem_domain::feature::{FeatureAddress, FeatureType, FunctionType, Role, UseCaseSupport};
use cem_domain::id::CorrelationToken;
use cem_domain::ski::Ski;

pub use devices::{DeviceKind, OverrunSlots, PowerMeter, SimulatedDevice};
pub use error::VirtualTransportError;

/// Transport backed by in-memory simulated devices.
///
/// Cloning is cheap and yields a handle to the same simulation.
pub struct VirtualTransport<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for VirtualTransport<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P> {
    publisher: P,
    service: LocalServiceDescription,
    next_token: AtomicU64,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    local_features: Vec<LocalFeature>,
    use_cases: Vec<UseCaseSupport>,
    devices: HashMap<Ski, SimulatedDevice>,
    registered: HashSet<Ski>,
    trusted: HashSet<Ski>,
    connected: HashMap<Ski, Arc<RemoteDevice>>,
    pending: HashMap<CorrelationToken, DataPayload>,
    subscriptions: HashSet<(Ski, FeatureType)>,
    bindings: Vec<(Ski, BindingRequest)>,
    heartbeats: Vec<(Ski, FeatureAddress, FeatureAddress)>,
}

#[derive(Debug, Clone)]
struct LocalFeature {
    feature: FeatureType,
    role: Role,
    address: FeatureAddress,
}

impl State {
    /// The connected device owning `address`, with its feature type.
    fn owner(&self, address: &FeatureAddress) -> Result<(Ski, FeatureType), VirtualTransportError> {
        self.connected
            .values()
            .flat_map(|device| {
                device
                    .entities
                    .iter()
                    .flat_map(|e| e.features.iter())
                    .map(move |f| (device, f))
            })
            .find(|(_, f)| &f.address == address)
            .map(|(device, f)| (device.ski.clone(), f.feature_type))
            .ok_or_else(|| VirtualTransportError::UnknownFeature {
                address: address.clone(),
            })
    }
}

impl<P> VirtualTransport<P>
where
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create the transport for the local service described by `service`.
    ///
    /// The local device starts with node management on entity `[0]`; use
    /// cases add their own features.
    #[must_use]
    pub fn new(service: LocalServiceDescription, publisher: P) -> Self {
        let node_management = LocalFeature {
            feature: FeatureType::NodeManagement,
            role: Role::Special,
            address: FeatureAddress::new(
                Some(local_address(&service)),
                DEVICE_INFORMATION_ENTITY.to_vec(),
                0,
            ),
        };
        tracing::info!(
            brand = %service.brand,
            model = %service.model,
            serial = %service.serial_number,
            identifier = %service.identifier,
            "virtual transport ready"
        );
        Self {
            inner: Arc::new(Inner {
                publisher,
                service,
                next_token: AtomicU64::new(1),
                state: Mutex::new(State {
                    local_features: vec![node_management],
                    ..State::default()
                }),
            }),
        }
    }

    /// Make a simulated device reachable. It connects once its SKI is
    /// registered and trusted.
    pub fn add_device(&self, device: SimulatedDevice) {
        let ski = device.ski().clone();
        self.lock().devices.insert(ski.clone(), device);
        self.try_connect(&ski);
    }

    /// Drop the connection to `ski`, as if the device went offline.
    pub fn disconnect(&self, ski: &Ski) {
        let removed = {
            let mut state = self.lock();
            state.subscriptions.retain(|(s, _)| s != ski);
            state.heartbeats.retain(|(s, _, _)| s != ski);
            state.connected.remove(ski)
        };
        if let Some(device) = removed {
            tracing::info!(%ski, "virtual device disconnected");
            self.inner.publisher.publish(UseCaseEvent::DeviceChange {
                change: ElementChange::Remove,
                device,
            });
        }
    }

    #[must_use]
    pub fn service(&self) -> &LocalServiceDescription {
        &self.inner.service
    }

    #[must_use]
    pub fn is_connected(&self, ski: &Ski) -> bool {
        self.lock().connected.contains_key(ski)
    }

    #[must_use]
    pub fn announced_use_cases(&self) -> Vec<UseCaseSupport> {
        self.lock().use_cases.clone()
    }

    #[must_use]
    pub fn bindings(&self) -> Vec<(Ski, BindingRequest)> {
        self.lock().bindings.clone()
    }

    #[must_use]
    pub fn heartbeats(&self) -> Vec<(Ski, FeatureAddress, FeatureAddress)> {
        self.lock().heartbeats.clone()
    }

    #[must_use]
    pub fn is_subscribed(&self, ski: &Ski, feature: FeatureType) -> bool {
        self.lock().subscriptions.contains(&(ski.clone(), feature))
    }

    /// Advance every connected meter by one step and publish new readings
    /// for subscribed devices.
    pub fn step(&self) {
        let updates: Vec<(Ski, DataPayload)> = {
            let mut state = self.lock();
            let State {
                devices,
                connected,
                subscriptions,
                ..
            } = &mut *state;
            devices
                .iter_mut()
                .filter(|(ski, _)| connected.contains_key(*ski))
                .filter_map(|(ski, device)| {
                    let readings = device.step()?;
                    subscriptions
                        .contains(&(ski.clone(), FeatureType::Measurement))
                        .then(|| (ski.clone(), readings))
                })
                .collect()
        };
        for (ski, data) in updates {
            tracing::trace!(%ski, "publishing simulated readings");
            self.inner.publisher.publish(UseCaseEvent::DataChange {
                change: ElementChange::Update,
                ski,
                data,
            });
        }
    }

    /// Spawn the simulation loop, stepping every `interval` until `cancel`
    /// fires.
    pub fn start_simulation(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => transport.step(),
                }
            }
            tracing::debug!("virtual simulation stopped");
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_connect(&self, ski: &Ski) {
        let (device, subscriptions) = {
            let mut state = self.lock();
            if state.connected.contains_key(ski)
                || !state.registered.contains(ski)
                || !state.trusted.contains(ski)
            {
                return;
            }
            let Some(simulated) = state.devices.get(ski) else {
                tracing::debug!(%ski, "trusted remote service not reachable yet");
                return;
            };
            let device = Arc::new(simulated.describe());
            state.connected.insert(ski.clone(), Arc::clone(&device));
            let subscriptions = remote_subscriptions(&device, &state.local_features);
            (device, subscriptions)
        };

        tracing::info!(%ski, ship_id = %ship_id(ski), "virtual device connected");
        self.inner.publisher.publish(UseCaseEvent::DeviceChange {
            change: ElementChange::Add,
            device,
        });
        for data in subscriptions {
            self.inner.publisher.publish(UseCaseEvent::SubscriptionChange {
                change: ElementChange::Add,
                ski: ski.clone(),
                data,
            });
        }
    }

    fn publish_overruns(&self, ski: &Ski) {
        let payload = {
            let state = self.lock();
            if !state.subscriptions.contains(&(ski.clone(), FeatureType::Hvac)) {
                return;
            }
            state
                .devices
                .get(ski)
                .and_then(|d| d.read(FunctionType::HvacOverrunListData))
        };
        if let Some(data) = payload {
            self.inner.publisher.publish(UseCaseEvent::DataChange {
                change: ElementChange::Update,
                ski: ski.clone(),
                data,
            });
        }
    }
}

/// Subscriptions a freshly connected device places on our server features.
fn remote_subscriptions(
    device: &RemoteDevice,
    local_features: &[LocalFeature],
) -> Vec<SubscriptionRequest> {
    local_features
        .iter()
        .filter(|local| local.role == Role::Server)
        .filter_map(|local| {
            let client = device.feature(PRIMARY_ENTITY, local.feature, Role::Client)?;
            Some(SubscriptionRequest {
                client_address: Some(client.address.clone()),
                server_address: Some(local.address.clone()),
                server_feature_type: Some(local.feature),
            })
        })
        .collect()
}

fn local_address(service: &LocalServiceDescription) -> String {
    format!("d:_i:{}", service.identifier)
}

fn ship_id(ski: &Ski) -> String {
    format!("virtual-{ski}")
}

impl<P> Transport for VirtualTransport<P>
where
    P: EventPublisher + Send + Sync + 'static,
{
    fn remote_device(&self, ski: &Ski) -> Option<Arc<RemoteDevice>> {
        self.lock().connected.get(ski).cloned()
    }

    fn local_feature(&self, feature: FeatureType, role: Role) -> Option<FeatureAddress> {
        self.lock()
            .local_features
            .iter()
            .find(|f| f.feature == feature && f.role == role)
            .map(|f| f.address.clone())
    }

    fn add_local_feature(
        &self,
        feature: FeatureType,
        role: Role,
        description: &str,
    ) -> FeatureAddress {
        let mut state = self.lock();
        if let Some(existing) = state
            .local_features
            .iter()
            .find(|f| f.feature == feature && f.role == role)
        {
            return existing.address.clone();
        }
        let index = state
            .local_features
            .iter()
            .filter(|f| f.address.entity == PRIMARY_ENTITY)
            .count();
        let address = FeatureAddress::new(
            Some(local_address(&self.inner.service)),
            PRIMARY_ENTITY.to_vec(),
            u32::try_from(index).unwrap_or(u32::MAX),
        );
        tracing::debug!(?feature, ?role, %address, description, "local feature added");
        state.local_features.push(LocalFeature {
            feature,
            role,
            address: address.clone(),
        });
        address
    }

    fn announce_use_case(&self, support: UseCaseSupport) {
        tracing::debug!(name = ?support.name, version = %support.version, "use case announced");
        self.lock().use_cases.push(support);
    }

    fn register_remote_service(&self, ski: &Ski) {
        self.lock().registered.insert(ski.clone());
        self.try_connect(ski);
    }

    fn update_trust(&self, ski: &Ski, trusted: bool) {
        if trusted {
            self.lock().trusted.insert(ski.clone());
            self.try_connect(ski);
        } else {
            self.lock().trusted.remove(ski);
            self.disconnect(ski);
        }
    }

    async fn request_data(
        &self,
        function: FunctionType,
        _local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> Result<CorrelationToken, TransportError> {
        let mut state = self.lock();
        let (ski, _) = state.owner(remote)?;
        let payload = state
            .devices
            .get(&ski)
            .and_then(|d| d.read(function))
            .ok_or(VirtualTransportError::UnsupportedFunction { ski, function })?;
        let token = CorrelationToken::new(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        state.pending.insert(token, payload);
        Ok(token)
    }

    async fn fetch_result(
        &self,
        token: CorrelationToken,
        _remote: &FeatureAddress,
    ) -> Result<DataPayload, TransportError> {
        self.lock()
            .pending
            .remove(&token)
            .ok_or_else(|| VirtualTransportError::UnknownToken(token).into())
    }

    async fn subscribe(
        &self,
        _local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        let (ski, feature) = state.owner(remote)?;
        tracing::debug!(%ski, ?feature, "subscription accepted");
        state.subscriptions.insert((ski, feature));
        Ok(())
    }

    async fn write_binding(
        &self,
        _local: &FeatureAddress,
        node_management: &FeatureAddress,
        request: BindingRequest,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        let (ski, feature) = state.owner(node_management)?;
        if feature != FeatureType::NodeManagement {
            return Err(VirtualTransportError::WriteRejected {
                ski,
                payload: "nodeManagementBindingData",
            }
            .into());
        }
        tracing::debug!(%ski, server = %request.server_address, "binding accepted");
        state.bindings.push((ski, request));
        Ok(())
    }

    async fn write_data(
        &self,
        _local: &FeatureAddress,
        remote: &FeatureAddress,
        payload: DataPayload,
    ) -> Result<(), TransportError> {
        let ski = {
            let mut state = self.lock();
            let (ski, _) = state.owner(remote)?;
            let applied = match &payload {
                DataPayload::HvacOverrunListData(overruns) => state
                    .devices
                    .get_mut(&ski)
                    .is_some_and(|d| d.write_overruns(overruns)),
                _ => false,
            };
            if !applied {
                return Err(VirtualTransportError::WriteRejected {
                    ski,
                    payload: payload.kind(),
                }
                .into());
            }
            ski
        };
        self.publish_overruns(&ski);
        Ok(())
    }

    fn start_heartbeat(
        &self,
        ski: &Ski,
        sender: &FeatureAddress,
        destination: &FeatureAddress,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        let (owner, _) = state.owner(destination)?;
        if &owner != ski {
            return Err(VirtualTransportError::UnknownFeature {
                address: destination.clone(),
            }
            .into());
        }
        tracing::debug!(%ski, %sender, %destination, "heartbeat running");
        state
            .heartbeats
            .push((ski.clone(), sender.clone(), destination.clone()));
        Ok(())
    }
}
