//! HVAC overrun model — overrun states, their descriptions, and override
//! request construction.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::HvacOverrunId;
use crate::snapshot::{AnnotatedSnapshot, Identified};

/// Number of overrun slots written by an override request.
pub const OVERRUN_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HvacOverrunStatus {
    Active,
    Running,
    Finished,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HvacOverrunType {
    OneTimeDhw,
    Sgready,
    OneDayVentilation,
    FlexibleTimeFunction,
}

/// Current state of one overrun slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HvacOverrun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrun_id: Option<HvacOverrunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrun_status: Option<HvacOverrunStatus>,
}

impl HvacOverrun {
    #[must_use]
    pub fn new(id: u32, status: HvacOverrunStatus) -> Self {
        Self {
            overrun_id: Some(HvacOverrunId::new(id)),
            overrun_status: Some(status),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.overrun_status == Some(HvacOverrunStatus::Active)
    }
}

/// Static metadata for an overrun slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HvacOverrunDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrun_id: Option<HvacOverrunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrun_type: Option<HvacOverrunType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HvacOverrunDescription {
    #[must_use]
    pub fn new(id: u32, overrun_type: HvacOverrunType, label: impl Into<String>) -> Self {
        Self {
            overrun_id: Some(HvacOverrunId::new(id)),
            overrun_type: Some(overrun_type),
            label: Some(label.into()),
            description: None,
        }
    }
}

impl Identified for HvacOverrun {
    type Id = HvacOverrunId;

    fn identifier(&self) -> Option<HvacOverrunId> {
        self.overrun_id
    }
}

impl Identified for HvacOverrunDescription {
    type Id = HvacOverrunId;

    fn identifier(&self) -> Option<HvacOverrunId> {
        self.overrun_id
    }
}

/// Overrun states of one device, annotated with their descriptions.
pub type HvacSnapshot = AnnotatedSnapshot<HvacOverrun, HvacOverrunDescription>;

/// Build the [`OVERRUN_SLOTS`] entries with only `active_index` active.
///
/// Total over `usize`: an index past the last slot leaves every entry
/// inactive.
#[must_use]
pub fn build_overrun_vector(active_index: usize) -> Vec<HvacOverrun> {
    (0..OVERRUN_SLOTS)
        .map(|slot| {
            let status = if slot == active_index {
                HvacOverrunStatus::Active
            } else {
                HvacOverrunStatus::Inactive
            };
            HvacOverrun::new(u32::try_from(slot).unwrap_or(u32::MAX), status)
        })
        .collect()
}

/// Overrun list written to a remote HVAC server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrunOverrideRequest {
    pub hvac_overrun_data: Vec<HvacOverrun>,
}

impl OverrunOverrideRequest {
    /// Activate exactly one slot.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OverrunIndexOutOfRange`] when `index` does
    /// not address one of the [`OVERRUN_SLOTS`].
    pub fn activate(index: usize) -> Result<Self, ValidationError> {
        if index >= OVERRUN_SLOTS {
            return Err(ValidationError::OverrunIndexOutOfRange {
                index,
                slots: OVERRUN_SLOTS,
            });
        }
        Ok(Self {
            hvac_overrun_data: build_overrun_vector(index),
        })
    }

    /// Mark every slot inactive.
    #[must_use]
    pub fn clear() -> Self {
        Self {
            hvac_overrun_data: build_overrun_vector(OVERRUN_SLOTS),
        }
    }

    /// Index of the active slot, if any.
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.hvac_overrun_data.iter().position(HvacOverrun::is_active)
    }
}
