//! Features — addressable protocol endpoints and the functions they expose.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of capability a feature exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Measurement,
    Hvac,
    NodeManagement,
    DeviceDiagnosis,
}

/// Whether a feature consumes (client) or provides (server) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
    Special,
}

/// Data function addressed by a request, write or notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionType {
    MeasurementListData,
    MeasurementDescriptionListData,
    HvacOverrunListData,
    HvacOverrunDescriptionListData,
    NodeManagementBindingData,
    NodeManagementSubscriptionData,
}

/// Fully qualified address of a feature: device, entity path and feature index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub entity: Vec<u32>,
    pub feature: u32,
}

impl FeatureAddress {
    #[must_use]
    pub fn new(device: Option<String>, entity: Vec<u32>, feature: u32) -> Self {
        Self {
            device,
            entity,
            feature,
        }
    }
}

impl fmt::Display for FeatureAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(device) = &self.device {
            write!(f, "{device}")?;
        }
        for part in &self.entity {
            write!(f, "/{part}")?;
        }
        write!(f, "#{}", self.feature)
    }
}

/// Protocol name of a use case announced by the local entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UseCaseName {
    MonitoringOfPowerConsumption,
    MonitoringAndControlOfSmartGridReadyConditions,
}

/// Use-case support advertised to remote devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseSupport {
    pub name: UseCaseName,
    pub version: String,
    pub scenarios: Vec<u32>,
}

impl UseCaseSupport {
    #[must_use]
    pub fn new(name: UseCaseName, version: impl Into<String>, scenarios: Vec<u32>) -> Self {
        Self {
            name,
            version: version.into(),
            scenarios,
        }
    }
}
