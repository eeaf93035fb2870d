//! Port definitions — traits that adapters and applications implement.
//!
//! Ports are the boundaries between the orchestration core and the outside
//! world: the transport collaborator on one side, the application delegate
//! on the other. They live here (in `app`) so that adapters and the binary
//! can depend on them without creating circular dependencies.

pub mod delegate;
pub mod event_bus;
pub mod transport;

pub use delegate::{HvacDelegate, MeasurementDelegate};
pub use event_bus::{EventPublisher, UseCaseEventHandler};
pub use transport::Transport;
