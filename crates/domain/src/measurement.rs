//! Measurement data model — live readings and their static descriptions.

use serde::{Deserialize, Serialize};

use crate::id::MeasurementId;
use crate::snapshot::{AnnotatedSnapshot, Identified, Timestamp};

/// A decimal number encoded as `number * 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledNumber {
    pub number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i8>,
}

impl ScaledNumber {
    #[must_use]
    pub fn new(number: i64, scale: i8) -> Self {
        Self {
            number,
            scale: Some(scale),
        }
    }

    #[must_use]
    pub fn integer(number: i64) -> Self {
        Self {
            number,
            scale: None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        let scale = self.scale.unwrap_or(0);
        self.number as f64 * 10f64.powi(i32::from(scale))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementValueType {
    Value,
    AverageValue,
    MinValue,
    MaxValue,
    StandardDeviation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementValueState {
    Normal,
    OutOfRange,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementType {
    Power,
    Energy,
    Current,
    Voltage,
    Frequency,
    Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommodityType {
    Electricity,
    Heat,
    DomesticHotWater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasurement {
    #[serde(rename = "W")]
    Watt,
    #[serde(rename = "Wh")]
    WattHour,
    #[serde(rename = "A")]
    Ampere,
    #[serde(rename = "V")]
    Volt,
    #[serde(rename = "Hz")]
    Hertz,
    #[serde(rename = "degC")]
    Celsius,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeType {
    AcPowerTotal,
    AcPower,
    AcCurrent,
    AcVoltage,
    AcFrequency,
    Charge,
    RoomAirTemperature,
}

/// A live reading reported by a remote Measurement server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<MeasurementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<MeasurementValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScaledNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_state: Option<MeasurementValueState>,
}

impl MeasurementData {
    /// A plain reading with an id and an unscaled value.
    #[must_use]
    pub fn reading(id: u32, value: i64) -> Self {
        Self {
            measurement_id: Some(MeasurementId::new(id)),
            value_type: Some(MeasurementValueType::Value),
            value: Some(ScaledNumber::integer(value)),
            ..Self::default()
        }
    }
}

/// Static metadata explaining what a measurement id means.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<MeasurementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_type: Option<MeasurementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commodity_type: Option<CommodityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitOfMeasurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<ScopeType>,
}

impl MeasurementDescription {
    #[must_use]
    pub fn new(id: u32, measurement_type: MeasurementType) -> Self {
        Self {
            measurement_id: Some(MeasurementId::new(id)),
            measurement_type: Some(measurement_type),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: UnitOfMeasurement) -> Self {
        self.unit = Some(unit);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeType) -> Self {
        self.scope_type = Some(scope);
        self
    }

    #[must_use]
    pub fn with_commodity(mut self, commodity: CommodityType) -> Self {
        self.commodity_type = Some(commodity);
        self
    }
}

impl Identified for MeasurementData {
    type Id = MeasurementId;

    fn identifier(&self) -> Option<MeasurementId> {
        self.measurement_id
    }
}

impl Identified for MeasurementDescription {
    type Id = MeasurementId;

    fn identifier(&self) -> Option<MeasurementId> {
        self.measurement_id
    }
}

/// Measurement readings of one device, annotated with their descriptions.
pub type MeasurementSnapshot = AnnotatedSnapshot<MeasurementData, MeasurementDescription>;
