//! Demo wiring — JSON snapshot reporting and the bind/override sequence.
//!
//! Every heat pump walks through [`DemoStep`]: the first snapshot triggers a
//! binding, the next one an overrun override, and a later snapshot showing
//! the overridden slot active or running confirms the sequence.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cem_app::ports::{HvacDelegate, MeasurementDelegate, Transport};
use cem_app::use_cases::HvacUseCase;
use cem_domain::error::CemError;
use cem_domain::hvac::{HvacOverrunStatus, HvacSnapshot};
use cem_domain::measurement::MeasurementSnapshot;
use cem_domain::ski::Ski;

/// Overrun slot activated by the demo sequence (smart grid ready).
pub const DEMO_OVERRUN_INDEX: usize = 1;

/// Where one heat pump stands in the demo sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemoStep {
    #[default]
    AwaitingSnapshot,
    Bound,
    Overridden,
    Confirmed,
}

/// Facade call requested by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoAction {
    Bind,
    SetOverrun(usize),
}

impl DemoStep {
    /// Account for a snapshot that just arrived.
    #[must_use]
    pub fn observe(self, snapshot: &HvacSnapshot) -> Self {
        if self != Self::Overridden {
            return self;
        }
        let slot_running = snapshot
            .entries
            .get(DEMO_OVERRUN_INDEX)
            .and_then(|entry| entry.value.as_ref())
            .and_then(|overrun| overrun.overrun_status)
            .is_some_and(|status| {
                matches!(status, HvacOverrunStatus::Active | HvacOverrunStatus::Running)
            });
        if slot_running { Self::Confirmed } else { self }
    }

    /// The call this step asks for, if any.
    #[must_use]
    pub fn next_action(self) -> Option<DemoAction> {
        match self {
            Self::AwaitingSnapshot => Some(DemoAction::Bind),
            Self::Bound => Some(DemoAction::SetOverrun(DEMO_OVERRUN_INDEX)),
            Self::Overridden | Self::Confirmed => None,
        }
    }

    /// Move on after `action` finished. A failed action is retried on the
    /// next snapshot.
    #[must_use]
    pub fn after(self, action: DemoAction, succeeded: bool) -> Self {
        match (action, succeeded) {
            (DemoAction::Bind, true) => Self::Bound,
            (DemoAction::SetOverrun(_), true) => Self::Overridden,
            (_, false) => self,
        }
    }
}

/// Drive the demo sequence from HVAC snapshots until `cancel` fires.
pub async fn run<T, D>(
    hvac: HvacUseCase<T, D>,
    mut snapshots: mpsc::UnboundedReceiver<HvacSnapshot>,
    cancel: CancellationToken,
) where
    T: Transport + 'static,
    D: HvacDelegate,
{
    let mut steps: HashMap<Ski, DemoStep> = HashMap::new();
    loop {
        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = snapshots.recv() => match received {
                Some(snapshot) => snapshot,
                None => break,
            },
        };
        let ski = snapshot.ski.clone();
        let step = steps.entry(ski.clone()).or_default();
        let observed = step.observe(&snapshot);
        if observed == DemoStep::Confirmed && *step != DemoStep::Confirmed {
            tracing::info!(%ski, slot = DEMO_OVERRUN_INDEX, "overrun override confirmed");
        }
        *step = observed;

        let Some(action) = step.next_action() else {
            continue;
        };
        let result = match action {
            DemoAction::Bind => hvac.bind(&ski).await,
            DemoAction::SetOverrun(index) => hvac.set_overrun(&ski, index).await,
        };
        if let Err(err) = &result {
            tracing::warn!(%ski, ?action, error = %err, "demo action failed");
        }
        *step = step.after(action, result.is_ok());
        tracing::debug!(%ski, step = ?*step, "demo step");
    }
    tracing::debug!("demo sequence stopped");
}

/// Logs every snapshot as JSON and feeds HVAC snapshots to the demo.
#[derive(Debug, Clone, Default)]
pub struct JsonReporter {
    hvac_snapshots: Option<mpsc::UnboundedSender<HvacSnapshot>>,
}

impl JsonReporter {
    /// A reporter forwarding HVAC snapshots, with the receiving end.
    #[must_use]
    pub fn with_demo() -> (Self, mpsc::UnboundedReceiver<HvacSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                hvac_snapshots: Some(tx),
            },
            rx,
        )
    }

    fn report<S: Serialize>(ski: &Ski, kind: &'static str, snapshot: &S) {
        match serde_json::to_string(snapshot) {
            Ok(json) => tracing::info!(%ski, kind, snapshot = %json, "snapshot received"),
            Err(err) => tracing::warn!(%ski, kind, error = %err, "snapshot not serializable"),
        }
    }
}

impl MeasurementDelegate for JsonReporter {
    fn on_measurement_snapshot(&self, ski: &Ski, snapshot: MeasurementSnapshot) {
        Self::report(ski, "measurement", &snapshot);
    }

    fn on_cycle_failed(&self, ski: &Ski, err: &CemError) {
        tracing::warn!(%ski, kind = "measurement", error = %err, "refresh failed");
    }
}

impl HvacDelegate for JsonReporter {
    fn on_hvac_snapshot(&self, ski: &Ski, snapshot: HvacSnapshot) {
        Self::report(ski, "hvac", &snapshot);
        if let Some(tx) = &self.hvac_snapshots
            && tx.send(snapshot).is_err()
        {
            tracing::debug!(%ski, "demo sequence no longer listening");
        }
    }

    fn on_cycle_failed(&self, ski: &Ski, err: &CemError) {
        tracing::warn!(%ski, kind = "hvac", error = %err, "refresh failed");
    }
}
