//! Monitoring of power consumption.

use cem_domain::error::CemError;
use cem_domain::event::DataPayload;
use cem_domain::feature::{FeatureType, FunctionType, UseCaseName, UseCaseSupport};
use cem_domain::measurement::{MeasurementData, MeasurementDescription, MeasurementSnapshot};
use cem_domain::ski::Ski;

use super::{UseCase, UseCaseProfile};
use crate::ports::MeasurementDelegate;

/// Measurement use case driving delegate `D`.
pub type MeasurementUseCase<T, D> = UseCase<T, Measurement<D>>;

/// Reads Measurement server features and reports annotated readings.
pub struct Measurement<D> {
    delegate: D,
}

impl<D: MeasurementDelegate> Measurement<D> {
    #[must_use]
    pub fn new(delegate: D) -> Self {
        Self { delegate }
    }
}

impl<D: MeasurementDelegate> UseCaseProfile for Measurement<D> {
    type Value = MeasurementData;
    type Description = MeasurementDescription;

    const NAME: &'static str = "measurement";
    const FEATURE: FeatureType = FeatureType::Measurement;
    const CLIENT_DESCRIPTION: &'static str = "Measurement Client";
    const VALUE_FUNCTION: FunctionType = FunctionType::MeasurementListData;
    const DESCRIPTION_FUNCTION: FunctionType = FunctionType::MeasurementDescriptionListData;

    fn support() -> UseCaseSupport {
        UseCaseSupport::new(UseCaseName::MonitoringOfPowerConsumption, "1.0.0", vec![1, 2, 3, 4])
    }

    fn values(payload: DataPayload) -> Result<Vec<MeasurementData>, DataPayload> {
        match payload {
            DataPayload::MeasurementListData(values) => Ok(values),
            other => Err(other),
        }
    }

    fn descriptions(payload: DataPayload) -> Result<Vec<MeasurementDescription>, DataPayload> {
        match payload {
            DataPayload::MeasurementDescriptionListData(descriptions) => Ok(descriptions),
            other => Err(other),
        }
    }

    fn deliver(&self, ski: &Ski, snapshot: MeasurementSnapshot) {
        self.delegate.on_measurement_snapshot(ski, snapshot);
    }

    fn cycle_failed(&self, ski: &Ski, err: &CemError) {
        self.delegate.on_cycle_failed(ski, err);
    }
}
