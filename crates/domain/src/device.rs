//! Devices — the local service description and remote device handles.
//!
//! A [`RemoteDevice`] is owned by the transport; the core only keeps shared
//! references to it and never tears it down.

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureAddress, FeatureType, Role};
use crate::ski::Ski;

/// Entity address on which remote devices expose their use-case features.
pub const PRIMARY_ENTITY: &[u32] = &[1];

/// Entity address of the node-management feature.
pub const DEVICE_INFORMATION_ENTITY: &[u32] = &[0];

/// Class of device announced in the service description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    EnergyManagementSystem,
    ChargingStation,
    HeatPumpAppliance,
    Generic,
}

/// How the local service presents itself to remote devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalServiceDescription {
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    pub identifier: String,
    pub device_type: DeviceType,
}

/// A feature exposed by a remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFeature {
    pub address: FeatureAddress,
    pub feature_type: FeatureType,
    pub role: Role,
}

/// An entity of a remote device and the features it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub address: Vec<u32>,
    pub features: Vec<RemoteFeature>,
}

/// A discovered remote device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDevice {
    pub ski: Ski,
    pub address: Option<String>,
    pub entities: Vec<RemoteEntity>,
}

impl RemoteDevice {
    #[must_use]
    pub fn builder(ski: Ski) -> RemoteDeviceBuilder {
        RemoteDeviceBuilder {
            ski,
            address: None,
            entities: Vec::new(),
        }
    }

    /// Look up an entity by its address path.
    #[must_use]
    pub fn entity(&self, address: &[u32]) -> Option<&RemoteEntity> {
        self.entities.iter().find(|e| e.address == address)
    }

    /// Find the feature of a given type and role on an entity.
    #[must_use]
    pub fn feature(
        &self,
        entity: &[u32],
        feature_type: FeatureType,
        role: Role,
    ) -> Option<&RemoteFeature> {
        self.entity(entity)?
            .features
            .iter()
            .find(|f| f.feature_type == feature_type && f.role == role)
    }

    /// The device-wide node-management feature, wherever it is hosted.
    #[must_use]
    pub fn node_management(&self) -> Option<&RemoteFeature> {
        self.entities
            .iter()
            .flat_map(|e| e.features.iter())
            .find(|f| f.feature_type == FeatureType::NodeManagement)
    }
}

/// Step-by-step builder for [`RemoteDevice`].
///
/// Feature indices are assigned per entity in insertion order.
#[derive(Debug)]
pub struct RemoteDeviceBuilder {
    ski: Ski,
    address: Option<String>,
    entities: Vec<RemoteEntity>,
}

impl RemoteDeviceBuilder {
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn feature(mut self, entity: &[u32], feature_type: FeatureType, role: Role) -> Self {
        let index = match self.entities.iter().position(|e| e.address == entity) {
            Some(index) => index,
            None => {
                self.entities.push(RemoteEntity {
                    address: entity.to_vec(),
                    features: Vec::new(),
                });
                self.entities.len() - 1
            }
        };
        let target = &mut self.entities[index];
        let feature_index = u32::try_from(target.features.len()).unwrap_or(u32::MAX);
        target.features.push(RemoteFeature {
            address: FeatureAddress::new(self.address.clone(), entity.to_vec(), feature_index),
            feature_type,
            role,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> RemoteDevice {
        RemoteDevice {
            ski: self.ski,
            address: self.address,
            entities: self.entities,
        }
    }
}
