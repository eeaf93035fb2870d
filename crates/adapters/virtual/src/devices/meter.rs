//! Simulated power meter — total power, energy and current.

use chrono::Utc;

use cem_domain::id::MeasurementId;
use cem_domain::measurement::{
    CommodityType, MeasurementData, MeasurementDescription, MeasurementType,
    MeasurementValueState, MeasurementValueType, ScaledNumber, ScopeType, UnitOfMeasurement,
};

const POWER_ID: u32 = 1;
const ENERGY_ID: u32 = 2;
const CURRENT_ID: u32 = 3;

/// Nominal single-phase voltage used to derive the current.
const VOLTAGE: i64 = 230;

/// Deterministic load profile, in watts, added on top of the base load.
const PROFILE: [i64; 8] = [0, 150, 420, 300, -80, -240, 60, 210];

/// A meter whose load follows [`PROFILE`] around a base value.
#[derive(Debug, Clone)]
pub struct PowerMeter {
    base_watts: i64,
    step: usize,
    energy_wh: i64,
}

impl PowerMeter {
    #[must_use]
    pub fn new(base_watts: i64) -> Self {
        Self {
            base_watts,
            step: 0,
            energy_wh: 0,
        }
    }

    #[must_use]
    pub fn power(&self) -> i64 {
        self.base_watts + PROFILE[self.step % PROFILE.len()]
    }

    /// Move to the next load point and account the energy of the last one.
    pub fn step(&mut self) {
        self.energy_wh += self.power() / 60;
        self.step += 1;
    }

    #[must_use]
    pub fn readings(&self) -> Vec<MeasurementData> {
        let now = Utc::now();
        let reading = |id: u32, value: ScaledNumber| MeasurementData {
            measurement_id: Some(MeasurementId::new(id)),
            value_type: Some(MeasurementValueType::Value),
            timestamp: Some(now),
            value: Some(value),
            value_state: Some(MeasurementValueState::Normal),
        };
        vec![
            reading(POWER_ID, ScaledNumber::integer(self.power())),
            reading(ENERGY_ID, ScaledNumber::integer(self.energy_wh)),
            // Current in tenths of an ampere.
            reading(CURRENT_ID, ScaledNumber::new(self.power() * 10 / VOLTAGE, -1)),
        ]
    }

    #[must_use]
    pub fn descriptions() -> Vec<MeasurementDescription> {
        vec![
            MeasurementDescription::new(POWER_ID, MeasurementType::Power)
                .with_unit(UnitOfMeasurement::Watt)
                .with_scope(ScopeType::AcPowerTotal)
                .with_commodity(CommodityType::Electricity),
            MeasurementDescription::new(ENERGY_ID, MeasurementType::Energy)
                .with_unit(UnitOfMeasurement::WattHour)
                .with_scope(ScopeType::Charge)
                .with_commodity(CommodityType::Electricity),
            MeasurementDescription::new(CURRENT_ID, MeasurementType::Current)
                .with_unit(UnitOfMeasurement::Ampere)
                .with_scope(ScopeType::AcCurrent)
                .with_commodity(CommodityType::Electricity),
        ]
    }
}
