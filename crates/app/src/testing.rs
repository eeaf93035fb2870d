//! In-memory fakes of the ports, shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use cem_domain::binding::BindingRequest;
use cem_domain::device::{DEVICE_INFORMATION_ENTITY, PRIMARY_ENTITY, RemoteDevice};
use cem_domain::error::{CemError, TransportError};
use cem_domain::event::DataPayload;
use cem_domain::feature::{FeatureAddress, FeatureType, FunctionType, Role, UseCaseSupport};
use cem_domain::hvac::HvacSnapshot;
use cem_domain::id::CorrelationToken;
use cem_domain::measurement::MeasurementSnapshot;
use cem_domain::ski::Ski;

use crate::ports::{HvacDelegate, MeasurementDelegate, Transport};

pub(crate) fn ski(raw: &str) -> Ski {
    Ski::new(raw).unwrap()
}

/// Charging station: node management, plus a Measurement server and client.
pub(crate) fn evse(raw: &str) -> RemoteDevice {
    RemoteDevice::builder(ski(raw))
        .address(format!("d:_i:{raw}"))
        .feature(DEVICE_INFORMATION_ENTITY, FeatureType::NodeManagement, Role::Special)
        .feature(PRIMARY_ENTITY, FeatureType::Measurement, Role::Server)
        .feature(PRIMARY_ENTITY, FeatureType::Measurement, Role::Client)
        .build()
}

/// Heat pump: node management, plus HVAC server and client.
pub(crate) fn heat_pump(raw: &str) -> RemoteDevice {
    RemoteDevice::builder(ski(raw))
        .address(format!("d:_i:{raw}"))
        .feature(DEVICE_INFORMATION_ENTITY, FeatureType::NodeManagement, Role::Special)
        .feature(PRIMARY_ENTITY, FeatureType::Hvac, Role::Server)
        .feature(PRIMARY_ENTITY, FeatureType::Hvac, Role::Client)
        .build()
}

/// Scripted transport. Fetch results are consumed per function in order;
/// the last scripted result keeps being returned.
#[derive(Default)]
pub(crate) struct FakeTransport {
    devices: Mutex<HashMap<Ski, Arc<RemoteDevice>>>,
    local_features: Mutex<Vec<(FeatureType, Role, FeatureAddress, String)>>,
    pub(crate) announcements: Mutex<Vec<UseCaseSupport>>,
    pub(crate) trusted: Mutex<Vec<(Ski, bool)>>,
    pub(crate) registered: Mutex<Vec<Ski>>,
    responses: Mutex<HashMap<FunctionType, VecDeque<Result<DataPayload, String>>>>,
    requests: Mutex<HashMap<FunctionType, usize>>,
    pending: Mutex<HashMap<CorrelationToken, FunctionType>>,
    next_token: AtomicU64,
    pub(crate) subscriptions: Mutex<Vec<(FeatureAddress, FeatureAddress)>>,
    pub(crate) bindings: Mutex<Vec<(FeatureAddress, BindingRequest)>>,
    pub(crate) writes: Mutex<Vec<(FeatureAddress, DataPayload)>>,
    pub(crate) heartbeats: Mutex<Vec<(Ski, FeatureAddress, FeatureAddress)>>,
    pub(crate) fail_subscribe: AtomicBool,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) fail_heartbeat: AtomicBool,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_device(&self, device: RemoteDevice) -> Arc<RemoteDevice> {
        let device = Arc::new(device);
        self.devices
            .lock()
            .unwrap()
            .insert(device.ski.clone(), Arc::clone(&device));
        device
    }

    pub(crate) fn script(&self, function: FunctionType, results: Vec<Result<DataPayload, &str>>) {
        let queue = results
            .into_iter()
            .map(|r| r.map_err(str::to_owned))
            .collect();
        self.responses.lock().unwrap().insert(function, queue);
    }

    pub(crate) fn requests(&self, function: FunctionType) -> usize {
        self.requests
            .lock()
            .unwrap()
            .get(&function)
            .copied()
            .unwrap_or(0)
    }

    fn next_response(&self, function: FunctionType) -> Result<DataPayload, String> {
        let mut responses = self.responses.lock().unwrap();
        let Some(queue) = responses.get_mut(&function) else {
            return Err(format!("no response scripted for {function:?}"));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err("empty script".to_owned()))
        }
    }
}

impl Transport for FakeTransport {
    fn remote_device(&self, ski: &Ski) -> Option<Arc<RemoteDevice>> {
        self.devices.lock().unwrap().get(ski).cloned()
    }

    fn local_feature(&self, feature: FeatureType, role: Role) -> Option<FeatureAddress> {
        self.local_features
            .lock()
            .unwrap()
            .iter()
            .find(|(f, r, _, _)| *f == feature && *r == role)
            .map(|(_, _, address, _)| address.clone())
    }

    fn add_local_feature(
        &self,
        feature: FeatureType,
        role: Role,
        description: &str,
    ) -> FeatureAddress {
        if let Some(existing) = self.local_feature(feature, role) {
            return existing;
        }
        let mut features = self.local_features.lock().unwrap();
        let index = u32::try_from(features.len()).unwrap() + 1;
        let address =
            FeatureAddress::new(Some("d:_i:cem".to_owned()), PRIMARY_ENTITY.to_vec(), index);
        features.push((feature, role, address.clone(), description.to_owned()));
        address
    }

    fn announce_use_case(&self, support: UseCaseSupport) {
        self.announcements.lock().unwrap().push(support);
    }

    fn register_remote_service(&self, ski: &Ski) {
        self.registered.lock().unwrap().push(ski.clone());
    }

    fn update_trust(&self, ski: &Ski, trusted: bool) {
        self.trusted.lock().unwrap().push((ski.clone(), trusted));
    }

    async fn request_data(
        &self,
        function: FunctionType,
        _local: &FeatureAddress,
        _remote: &FeatureAddress,
    ) -> Result<CorrelationToken, TransportError> {
        *self.requests.lock().unwrap().entry(function).or_default() += 1;
        let token = CorrelationToken::new(self.next_token.fetch_add(1, Ordering::SeqCst));
        self.pending.lock().unwrap().insert(token, function);
        Ok(token)
    }

    async fn fetch_result(
        &self,
        token: CorrelationToken,
        _remote: &FeatureAddress,
    ) -> Result<DataPayload, TransportError> {
        let function = self
            .pending
            .lock()
            .unwrap()
            .remove(&token)
            .ok_or_else(|| TransportError::msg(format!("unknown token {token}")))?;
        self.next_response(function).map_err(TransportError::msg)
    }

    async fn subscribe(
        &self,
        local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> Result<(), TransportError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::msg("subscription rejected"));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((local.clone(), remote.clone()));
        Ok(())
    }

    async fn write_binding(
        &self,
        _local: &FeatureAddress,
        node_management: &FeatureAddress,
        request: BindingRequest,
    ) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::msg("write rejected"));
        }
        self.bindings
            .lock()
            .unwrap()
            .push((node_management.clone(), request));
        Ok(())
    }

    async fn write_data(
        &self,
        _local: &FeatureAddress,
        remote: &FeatureAddress,
        payload: DataPayload,
    ) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::msg("write rejected"));
        }
        self.writes.lock().unwrap().push((remote.clone(), payload));
        Ok(())
    }

    fn start_heartbeat(
        &self,
        ski: &Ski,
        sender: &FeatureAddress,
        destination: &FeatureAddress,
    ) -> Result<(), TransportError> {
        if self.fail_heartbeat.load(Ordering::SeqCst) {
            return Err(TransportError::msg("heartbeat rejected"));
        }
        self.heartbeats
            .lock()
            .unwrap()
            .push((ski.clone(), sender.clone(), destination.clone()));
        Ok(())
    }
}

/// What a [`RecordingDelegate`] received.
#[derive(Debug)]
pub(crate) enum Delivery {
    Measurement(MeasurementSnapshot),
    Hvac(HvacSnapshot),
    Failed(Ski, String),
}

/// Forwards every delegate call to a channel.
#[derive(Clone)]
pub(crate) struct RecordingDelegate {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl RecordingDelegate {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MeasurementDelegate for RecordingDelegate {
    fn on_measurement_snapshot(&self, _ski: &Ski, snapshot: MeasurementSnapshot) {
        let _ = self.tx.send(Delivery::Measurement(snapshot));
    }

    fn on_cycle_failed(&self, ski: &Ski, err: &CemError) {
        let _ = self.tx.send(Delivery::Failed(ski.clone(), err.to_string()));
    }
}

impl HvacDelegate for RecordingDelegate {
    fn on_hvac_snapshot(&self, _ski: &Ski, snapshot: HvacSnapshot) {
        let _ = self.tx.send(Delivery::Hvac(snapshot));
    }

    fn on_cycle_failed(&self, ski: &Ski, err: &CemError) {
        let _ = self.tx.send(Delivery::Failed(ski.clone(), err.to_string()));
    }
}
