//! # cemd — CEM daemon
//!
//! Composition root that wires the orchestrator to the virtual transport and
//! runs the demo sequence.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize logging
//! - Construct the event bus and the transport adapter
//! - Install the enabled use cases with their refresh strategies
//! - Register and trust the configured remote devices
//! - Drive the bind/override demo sequence on heat pumps
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod demo;

use tracing_subscriber::EnvFilter;

use cem_adapter_virtual::{SimulatedDevice, VirtualTransport};
use cem_app::event_bus::InProcessEventBus;
use cem_app::orchestrator::Cem;
use cem_app::ports::Transport;
use cem_domain::feature::{FeatureType, Role};

use crate::config::Config;
use crate::demo::JsonReporter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Event bus and transport
    let bus = InProcessEventBus::new(config.event_bus.capacity);
    let transport = VirtualTransport::new(config.service(), bus.clone());

    // Heat pumps subscribe to our HVAC server; the subscription starts the
    // heartbeat.
    if config.hvac.enabled {
        transport.add_local_feature(FeatureType::Hvac, Role::Server, "Hvac Server");
    }

    // Use cases
    let mut cem = Cem::new(transport.clone(), bus);
    let (reporter, hvac_snapshots) = JsonReporter::with_demo();
    if config.measurement.enabled {
        cem.add_measurement_support(reporter.clone(), config.measurement_strategy());
    }
    let demo = config.hvac.enabled.then(|| {
        let hvac = cem.add_hvac_support(reporter, config.hvac_strategy());
        tokio::spawn(demo::run(hvac, hvac_snapshots, cem.shutdown_token()))
    });

    // Remote devices
    for (ski, kind) in config.remote_devices()? {
        transport.add_device(SimulatedDevice::new(ski.clone(), kind));
        cem.connect_remote(&ski);
    }
    let simulation =
        transport.start_simulation(config.simulation_interval(), cem.shutdown_token());

    tracing::info!(
        identifier = %transport.service().identifier,
        devices = config.simulation.devices.len(),
        "cemd running, press ctrl-c to stop"
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    cem.shutdown().await;
    if let Err(err) = simulation.await {
        tracing::warn!(%err, "simulation ended abnormally");
    }
    if let Some(demo) = demo
        && let Err(err) = demo.await
    {
        tracing::warn!(%err, "demo sequence ended abnormally");
    }

    Ok(())
}
