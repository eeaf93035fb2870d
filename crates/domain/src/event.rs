//! Events delivered by the transport — device lifecycle, subscription
//! changes and data notifications.
//!
//! Both enums are `#[non_exhaustive]`: handlers must ignore shapes they do
//! not understand.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::binding::{BindingRequest, SubscriptionRequest};
use crate::device::RemoteDevice;
use crate::hvac::{HvacOverrun, HvacOverrunDescription};
use crate::measurement::{MeasurementData, MeasurementDescription};
use crate::ski::Ski;

/// What happened to the element an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementChange {
    Add,
    Remove,
    Update,
}

/// Typed data carried by requests, writes and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", content = "data", rename_all = "camelCase")]
#[non_exhaustive]
pub enum DataPayload {
    MeasurementListData(Vec<MeasurementData>),
    MeasurementDescriptionListData(Vec<MeasurementDescription>),
    HvacOverrunListData(Vec<HvacOverrun>),
    HvacOverrunData(HvacOverrun),
    HvacOverrunDescriptionListData(Vec<HvacOverrunDescription>),
    NodeManagementBindingData(BindingRequest),
}

impl DataPayload {
    /// Short name of the payload shape, for logs and error reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MeasurementListData(_) => "measurementListData",
            Self::MeasurementDescriptionListData(_) => "measurementDescriptionListData",
            Self::HvacOverrunListData(_) => "hvacOverrunListData",
            Self::HvacOverrunData(_) => "hvacOverrunData",
            Self::HvacOverrunDescriptionListData(_) => "hvacOverrunDescriptionListData",
            Self::NodeManagementBindingData(_) => "nodeManagementBindingData",
        }
    }
}

/// A notification from the transport, consumed by every use case.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UseCaseEvent {
    /// A remote device connected or disconnected.
    DeviceChange {
        change: ElementChange,
        device: Arc<RemoteDevice>,
    },
    /// A remote device subscribed to (or unsubscribed from) a local feature.
    SubscriptionChange {
        change: ElementChange,
        ski: Ski,
        data: SubscriptionRequest,
    },
    /// A remote feature reported new data.
    DataChange {
        change: ElementChange,
        ski: Ski,
        data: DataPayload,
    },
}

impl UseCaseEvent {
    /// The remote device this event concerns.
    #[must_use]
    pub fn ski(&self) -> &Ski {
        match self {
            Self::DeviceChange { device, .. } => &device.ski,
            Self::SubscriptionChange { ski, .. } | Self::DataChange { ski, .. } => ski,
        }
    }

    #[must_use]
    pub fn change(&self) -> ElementChange {
        match self {
            Self::DeviceChange { change, .. }
            | Self::SubscriptionChange { change, .. }
            | Self::DataChange { change, .. } => *change,
        }
    }
}
