//! Application delegate port — where annotated snapshots are delivered.
//!
//! Delegates are called from per-device refresh tasks, so implementations
//! must be cheap and non-blocking: hand the snapshot off (channel, log,
//! store) rather than doing IO inline.

use cem_domain::error::CemError;
use cem_domain::hvac::HvacSnapshot;
use cem_domain::measurement::MeasurementSnapshot;
use cem_domain::ski::Ski;

/// Receives Measurement snapshots.
pub trait MeasurementDelegate: Send + Sync + 'static {
    /// Called once per successful Measurement refresh cycle.
    fn on_measurement_snapshot(&self, ski: &Ski, snapshot: MeasurementSnapshot);

    /// Called when a refresh cycle (or the initial subscription) failed.
    fn on_cycle_failed(&self, _ski: &Ski, _err: &CemError) {}
}

/// Receives HVAC overrun snapshots.
pub trait HvacDelegate: Send + Sync + 'static {
    /// Called once per successful HVAC refresh cycle.
    fn on_hvac_snapshot(&self, ski: &Ski, snapshot: HvacSnapshot);

    /// Called when a refresh cycle (or the initial subscription) failed.
    fn on_cycle_failed(&self, _ski: &Ski, _err: &CemError) {}
}

impl<D: MeasurementDelegate> MeasurementDelegate for std::sync::Arc<D> {
    fn on_measurement_snapshot(&self, ski: &Ski, snapshot: MeasurementSnapshot) {
        (**self).on_measurement_snapshot(ski, snapshot);
    }

    fn on_cycle_failed(&self, ski: &Ski, err: &CemError) {
        (**self).on_cycle_failed(ski, err);
    }
}

impl<D: HvacDelegate> HvacDelegate for std::sync::Arc<D> {
    fn on_hvac_snapshot(&self, ski: &Ski, snapshot: HvacSnapshot) {
        (**self).on_hvac_snapshot(ski, snapshot);
    }

    fn on_cycle_failed(&self, ski: &Ski, err: &CemError) {
        (**self).on_cycle_failed(ski, err);
    }
}
