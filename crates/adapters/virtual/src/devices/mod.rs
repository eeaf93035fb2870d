//! Simulated remote devices — charging station, heat pump, or both.
//!
//! Each device is keyed by its SKI and exposes a fixed feature layout, so
//! the addresses the core resolves stay stable across reconnects.

mod heat_pump;
mod meter;

pub use heat_pump::OverrunSlots;
pub use meter::PowerMeter;

use serde::{Deserialize, Serialize};

use cem_domain::device::{DEVICE_INFORMATION_ENTITY, PRIMARY_ENTITY, RemoteDevice};
use cem_domain::event::DataPayload;
use cem_domain::feature::{FeatureType, FunctionType, Role};
use cem_domain::hvac::HvacOverrun;
use cem_domain::ski::Ski;

/// Which use cases a simulated device serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Charging station reporting power consumption.
    Evse,
    /// Heat pump with controllable overruns.
    Hvac,
    /// Heat pump that also reports power consumption.
    Hybrid,
}

impl DeviceKind {
    #[must_use]
    pub fn has_measurement(self) -> bool {
        matches!(self, Self::Evse | Self::Hybrid)
    }

    #[must_use]
    pub fn has_hvac(self) -> bool {
        matches!(self, Self::Hvac | Self::Hybrid)
    }
}

/// A remote device living entirely in memory.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    ski: Ski,
    kind: DeviceKind,
    meter: Option<PowerMeter>,
    overruns: Option<OverrunSlots>,
}

impl SimulatedDevice {
    #[must_use]
    pub fn new(ski: Ski, kind: DeviceKind) -> Self {
        let meter = kind.has_measurement().then(|| match kind {
            DeviceKind::Evse => PowerMeter::new(3_700),
            _ => PowerMeter::new(1_200),
        });
        let overruns = kind.has_hvac().then(OverrunSlots::default);
        Self {
            ski,
            kind,
            meter,
            overruns,
        }
    }

    #[must_use]
    pub fn ski(&self) -> &Ski {
        &self.ski
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Device address used in every feature address of this device.
    #[must_use]
    pub fn address(&self) -> String {
        format!("d:_i:virtual_{}", self.ski)
    }

    /// The feature layout announced to the core on connect.
    #[must_use]
    pub fn describe(&self) -> RemoteDevice {
        let mut builder = RemoteDevice::builder(self.ski.clone())
            .address(self.address())
            .feature(DEVICE_INFORMATION_ENTITY, FeatureType::NodeManagement, Role::Special)
            .feature(PRIMARY_ENTITY, FeatureType::DeviceDiagnosis, Role::Server);
        if self.kind.has_measurement() {
            builder = builder.feature(PRIMARY_ENTITY, FeatureType::Measurement, Role::Server);
        }
        if self.kind.has_hvac() {
            builder = builder
                .feature(PRIMARY_ENTITY, FeatureType::Hvac, Role::Server)
                .feature(PRIMARY_ENTITY, FeatureType::Hvac, Role::Client);
        }
        builder.build()
    }

    /// Answer a read of `function`, if this device serves it.
    #[must_use]
    pub fn read(&self, function: FunctionType) -> Option<DataPayload> {
        match function {
            FunctionType::MeasurementListData => self
                .meter
                .as_ref()
                .map(|m| DataPayload::MeasurementListData(m.readings())),
            FunctionType::MeasurementDescriptionListData => self
                .meter
                .as_ref()
                .map(|_| DataPayload::MeasurementDescriptionListData(PowerMeter::descriptions())),
            FunctionType::HvacOverrunListData => self
                .overruns
                .as_ref()
                .map(|o| DataPayload::HvacOverrunListData(o.states().to_vec())),
            FunctionType::HvacOverrunDescriptionListData => self
                .overruns
                .as_ref()
                .map(|_| DataPayload::HvacOverrunDescriptionListData(OverrunSlots::descriptions())),
            FunctionType::NodeManagementBindingData
            | FunctionType::NodeManagementSubscriptionData => None,
        }
    }

    /// Apply an overrun list written by the core. Returns `false` when the
    /// device has no overruns.
    pub fn write_overruns(&mut self, overruns: &[HvacOverrun]) -> bool {
        match self.overruns.as_mut() {
            Some(slots) => {
                slots.apply(overruns);
                true
            }
            None => false,
        }
    }

    /// Advance the simulated meter by one step; returns the new readings.
    pub fn step(&mut self) -> Option<DataPayload> {
        let meter = self.meter.as_mut()?;
        meter.step();
        Some(DataPayload::MeasurementListData(meter.readings()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(kind: DeviceKind) -> SimulatedDevice {
        SimulatedDevice::new(Ski::new("ski-1").unwrap(), kind)
    }

    #[test]
    fn should_expose_measurement_server_on_evse_only() {
        let evse = device(DeviceKind::Evse).describe();
        assert!(
            evse.feature(PRIMARY_ENTITY, FeatureType::Measurement, Role::Server)
                .is_some()
        );
        assert!(
            evse.feature(PRIMARY_ENTITY, FeatureType::Hvac, Role::Server)
                .is_none()
        );
        assert!(evse.node_management().is_some());
    }

    #[test]
    fn should_expose_both_servers_on_hybrid() {
        let hybrid = device(DeviceKind::Hybrid).describe();
        assert!(
            hybrid
                .feature(PRIMARY_ENTITY, FeatureType::Measurement, Role::Server)
                .is_some()
        );
        assert!(
            hybrid
                .feature(PRIMARY_ENTITY, FeatureType::Hvac, Role::Client)
                .is_some()
        );
    }

    #[test]
    fn should_not_serve_overruns_from_evse() {
        let mut evse = device(DeviceKind::Evse);
        assert!(evse.read(FunctionType::HvacOverrunListData).is_none());
        assert!(!evse.write_overruns(&[]));
    }

    #[test]
    fn should_not_step_without_meter() {
        assert!(device(DeviceKind::Hvac).step().is_none());
    }

    #[test]
    fn should_parse_kind_from_lowercase() {
        #[derive(Deserialize)]
        struct Entry {
            kind: DeviceKind,
        }
        let entry: Entry = toml::from_str(r#"kind = "hybrid""#).unwrap();
        assert_eq!(entry.kind, DeviceKind::Hybrid);
    }
}
