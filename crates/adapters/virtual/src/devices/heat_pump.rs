//! Simulated heat pump overruns.

use cem_domain::hvac::{
    HvacOverrun, HvacOverrunDescription, HvacOverrunStatus, HvacOverrunType, OVERRUN_SLOTS,
};

/// Overrun slots of one heat pump, all inactive at start.
#[derive(Debug, Clone)]
pub struct OverrunSlots {
    states: Vec<HvacOverrun>,
}

impl Default for OverrunSlots {
    fn default() -> Self {
        let states = (0..OVERRUN_SLOTS)
            .map(|slot| HvacOverrun::new(slot_id(slot), HvacOverrunStatus::Inactive))
            .collect();
        Self { states }
    }
}

impl OverrunSlots {
    #[must_use]
    pub fn states(&self) -> &[HvacOverrun] {
        &self.states
    }

    /// Take over the status of every written entry whose id matches a slot.
    /// Entries for unknown slots are ignored.
    pub fn apply(&mut self, written: &[HvacOverrun]) {
        for entry in written {
            let Some(status) = entry.overrun_status else {
                continue;
            };
            // An active overrun starts running right away on this device.
            let status = match status {
                HvacOverrunStatus::Active => HvacOverrunStatus::Running,
                other => other,
            };
            if let Some(slot) = self
                .states
                .iter_mut()
                .find(|s| s.overrun_id.is_some() && s.overrun_id == entry.overrun_id)
            {
                slot.overrun_status = Some(status);
            }
        }
    }

    #[must_use]
    pub fn descriptions() -> Vec<HvacOverrunDescription> {
        vec![
            HvacOverrunDescription::new(
                slot_id(0),
                HvacOverrunType::OneTimeDhw,
                "one-time hot water",
            ),
            HvacOverrunDescription::new(slot_id(1), HvacOverrunType::Sgready, "smart grid ready"),
            HvacOverrunDescription::new(
                slot_id(2),
                HvacOverrunType::OneDayVentilation,
                "one-day ventilation",
            ),
        ]
    }
}

fn slot_id(slot: usize) -> u32 {
    u32::try_from(slot).unwrap_or(u32::MAX)
}
