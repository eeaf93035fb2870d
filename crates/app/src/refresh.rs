//! Refresh driver — one background task per remote device.
//!
//! A device task runs refresh cycles either on a fixed timer
//! ([`RefreshStrategy::Polling`]) or whenever the remote pushes new values
//! ([`RefreshStrategy::SubscriptionPush`]). Each task owns a single-use
//! [`CancellationToken`]; the token is only checked between cycles, so a
//! fetch that is already in flight completes (or fails) first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use cem_domain::ski::Ski;

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pending pushed value lists per device before new ones are dropped.
pub const PUSH_TRIGGER_CAPACITY: usize = 8;

/// How a use case keeps its devices' values fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Fetch the values every `interval`; the first cycle runs one interval
    /// after the device appeared.
    Polling { interval: Duration },
    /// Subscribe once, then run a cycle for every pushed update.
    SubscriptionPush,
}

impl RefreshStrategy {
    #[must_use]
    pub fn polling(interval: Duration) -> Self {
        Self::Polling { interval }
    }

    #[must_use]
    pub fn is_push(&self) -> bool {
        matches!(self, Self::SubscriptionPush)
    }
}

impl Default for RefreshStrategy {
    fn default() -> Self {
        Self::polling(DEFAULT_POLL_INTERVAL)
    }
}

/// Handle on a running device task.
pub struct DeviceLoop<V> {
    cancel: CancellationToken,
    trigger: Option<mpsc::Sender<Vec<V>>>,
    handle: JoinHandle<()>,
}

impl<V> DeviceLoop<V> {
    #[must_use]
    pub fn new(
        cancel: CancellationToken,
        trigger: Option<mpsc::Sender<Vec<V>>>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            cancel,
            trigger,
            handle,
        }
    }

    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Outcome of handing pushed values to a device task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Queued,
    /// The task is still busy with earlier updates; these values were dropped.
    Busy,
    /// No push-driven task runs for this device.
    Inactive,
}

/// The active device tasks of one use case, keyed by SKI.
///
/// At most one task per device is registered at a time.
pub struct LoopRegistry<V> {
    loops: Mutex<HashMap<Ski, DeviceLoop<V>>>,
}

impl<V> Default for LoopRegistry<V> {
    fn default() -> Self {
        Self {
            loops: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> LoopRegistry<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the task of `ski`, cancelling any task it replaces.
    pub fn insert(&self, ski: Ski, device_loop: DeviceLoop<V>) {
        let previous = self
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ski, device_loop);
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    /// Whether a task for `ski` is registered and still running.
    pub fn is_active(&self, ski: &Ski) -> bool {
        self.loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ski)
            .is_some_and(DeviceLoop::is_running)
    }

    /// Stop and forget the task of `ski`.
    ///
    /// Returns `false` when there was nothing to stop; calling it twice is
    /// fine.
    pub fn cancel(&self, ski: &Ski) -> bool {
        let removed = self
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(ski);
        match removed {
            Some(device_loop) => {
                device_loop.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Hand pushed values to the task of `ski` without waiting.
    pub fn trigger(&self, ski: &Ski, values: Vec<V>) -> TriggerOutcome {
        let loops = self.loops.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = loops.get(ski).and_then(|l| l.trigger.as_ref()) else {
            return TriggerOutcome::Inactive;
        };
        match sender.try_send(values) {
            Ok(()) => TriggerOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => TriggerOutcome::Busy,
            Err(mpsc::error::TrySendError::Closed(_)) => TriggerOutcome::Inactive,
        }
    }

    /// Stop every registered task.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, device_loop) in drained {
            device_loop.cancel.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.loops.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `cycle` every `period` until `cancel` fires.
///
/// The first cycle runs one full period after the call. A slow cycle delays
/// the following ticks instead of bursting to catch up.
pub async fn run_polling<F, Fut>(cancel: CancellationToken, period: Duration, mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => cycle().await,
        }
    }
}

/// Run `cycle` with every value list received on `triggers` until `cancel`
/// fires or every sender is gone.
pub async fn run_push<V, F, Fut>(
    cancel: CancellationToken,
    mut triggers: mpsc::Receiver<Vec<V>>,
    mut cycle: F,
) where
    F: FnMut(Vec<V>) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = triggers.recv() => match received {
                Some(values) => cycle(values).await,
                None => break,
            },
        }
    }
}
