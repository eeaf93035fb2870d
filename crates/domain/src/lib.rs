//! # cem-domain
//!
//! Pure domain model for the CEM use-case orchestrator.
//!
//! ## Responsibilities
//! - Foundational types: [`Ski`](ski::Ski), typed protocol identifiers,
//!   error conventions
//! - Describe **features** (addressable protocol endpoints) and **remote
//!   devices** (the handles the transport hands out)
//! - Define **measurement** and **HVAC overrun** data with their static
//!   descriptions
//! - Define **events** delivered by the transport
//! - Interlink live values with descriptions into annotated **snapshots**
//! - Build overrun override requests
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! The transport and the application delegate are expressed as traits in
//! the `app` crate (ports).

pub mod error;
pub mod id;
pub mod ski;

pub mod binding;
pub mod device;
pub mod event;
pub mod feature;
pub mod hvac;
pub mod measurement;
pub mod snapshot;
