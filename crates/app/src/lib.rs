//! # cem-app
//!
//! Application layer — use-case orchestration and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** the outside world implements:
//!   - `Transport` — remote device lookup, request/fetch, subscribe, writes
//!   - `EventPublisher` — how the transport hands events to the core
//!   - `MeasurementDelegate` / `HvacDelegate` — where snapshots go
//! - Define the **driving port** every use case exposes: `UseCaseEventHandler`
//! - Provide the use cases themselves:
//!   - [`Measurement`](use_cases::Measurement) — power consumption monitoring
//!   - [`Hvac`](use_cases::Hvac) — heat pump overrun monitoring and control
//! - Run one refresh task per connected device, keep a descriptor cache per
//!   device, and interlink live values with their descriptors
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `cem-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod descriptor_cache;
pub mod event_bus;
pub mod link;
pub mod orchestrator;
pub mod ports;
pub mod refresh;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;
