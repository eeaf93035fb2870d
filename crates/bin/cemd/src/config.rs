//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `cem.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use cem_adapter_virtual::DeviceKind;
use cem_app::refresh::RefreshStrategy;
use cem_domain::device::{DeviceType, LocalServiceDescription};
use cem_domain::ski::Ski;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How the local service presents itself.
    pub device: DeviceConfig,
    /// In-process event bus settings.
    pub event_bus: EventBusConfig,
    /// Power consumption monitoring.
    pub measurement: UseCaseConfig,
    /// HVAC overrun monitoring and control.
    pub hvac: UseCaseConfig,
    /// Remote devices served by the virtual transport.
    pub simulation: SimulationConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Local service description.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    pub identifier: String,
    pub device_type: DeviceType,
}

/// Event bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before the slowest one lags.
    pub capacity: usize,
}

/// How one use case refreshes its devices.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UseCaseConfig {
    pub enabled: bool,
    /// Falls back to the use case's own default when unset.
    pub strategy: Option<StrategyKind>,
    /// Polling period, ignored for push.
    pub interval_secs: u64,
}

/// Refresh strategy as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Push,
    Polling,
}

/// Simulated remote devices.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub devices: Vec<SimulatedDeviceConfig>,
    /// Seconds between two simulated meter updates.
    pub update_interval_secs: u64,
}

/// One simulated remote device.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedDeviceConfig {
    pub ski: String,
    pub kind: DeviceKind,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `cem.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("cem.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("CEM_REMOTE_SKI") {
            match self.simulation.devices.first_mut() {
                Some(first) => first.ski = val,
                None => self.simulation.devices.push(SimulatedDeviceConfig {
                    ski: val,
                    kind: DeviceKind::Hybrid,
                }),
            }
        }
        if let Some(val) = var("CEM_MEASUREMENT_STRATEGY")
            && let Ok(kind) = val.parse()
        {
            self.measurement.strategy = Some(kind);
        }
        if let Some(val) = var("CEM_POLL_INTERVAL_SECS")
            && let Ok(secs) = val.parse()
        {
            self.measurement.interval_secs = secs;
            self.hvac.interval_secs = secs;
        }
        if let Some(val) = var("CEM_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.event_bus.capacity == 0 {
            return Err(ConfigError::Validation(
                "event bus capacity must be non-zero".to_string(),
            ));
        }
        if !self.measurement.enabled && !self.hvac.enabled {
            return Err(ConfigError::Validation(
                "at least one use case must be enabled".to_string(),
            ));
        }
        for (name, use_case) in [("measurement", &self.measurement), ("hvac", &self.hvac)] {
            if use_case.interval_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} interval must be non-zero"
                )));
            }
        }
        if self.simulation.update_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "simulation update interval must be non-zero".to_string(),
            ));
        }
        if self.device.identifier.trim().is_empty() {
            return Err(ConfigError::Validation(
                "device identifier must not be empty".to_string(),
            ));
        }
        let devices = self.remote_devices()?;
        for (pos, (ski, _)) in devices.iter().enumerate() {
            if devices[..pos].iter().any(|(other, _)| other == ski) {
                return Err(ConfigError::Validation(format!(
                    "simulated device {ski} is listed twice"
                )));
            }
        }
        Ok(())
    }

    /// The local service description announced to remote devices.
    #[must_use]
    pub fn service(&self) -> LocalServiceDescription {
        LocalServiceDescription {
            brand: self.device.brand.clone(),
            model: self.device.model.clone(),
            serial_number: self.device.serial_number.clone(),
            identifier: self.device.identifier.clone(),
            device_type: self.device.device_type,
        }
    }

    /// Simulated remote devices with their normalised SKI.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a blank SKI.
    pub fn remote_devices(&self) -> Result<Vec<(Ski, DeviceKind)>, ConfigError> {
        self.simulation
            .devices
            .iter()
            .map(|device| {
                Ski::new(&device.ski)
                    .map(|ski| (ski, device.kind))
                    .map_err(|err| ConfigError::Validation(format!("simulated device: {err}")))
            })
            .collect()
    }

    /// Refresh strategy of the Measurement use case; push unless configured.
    #[must_use]
    pub fn measurement_strategy(&self) -> RefreshStrategy {
        self.measurement.refresh_strategy(StrategyKind::Push)
    }

    /// Refresh strategy of the HVAC use case; polling unless configured.
    #[must_use]
    pub fn hvac_strategy(&self) -> RefreshStrategy {
        self.hvac.refresh_strategy(StrategyKind::Polling)
    }

    #[must_use]
    pub fn simulation_interval(&self) -> Duration {
        Duration::from_secs(self.simulation.update_interval_secs)
    }
}

impl UseCaseConfig {
    fn refresh_strategy(&self, fallback: StrategyKind) -> RefreshStrategy {
        match self.strategy.unwrap_or(fallback) {
            StrategyKind::Push => RefreshStrategy::SubscriptionPush,
            StrategyKind::Polling => {
                RefreshStrategy::polling(Duration::from_secs(self.interval_secs))
            }
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(Self::Push),
            "polling" => Ok(Self::Polling),
            other => Err(ConfigError::Validation(format!(
                "unknown refresh strategy {other:?}"
            ))),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            brand: "Demo".to_string(),
            model: "HEMS".to_string(),
            serial_number: "123456789".to_string(),
            identifier: "cem-123456789".to_string(),
            device_type: DeviceType::EnergyManagementSystem,
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for UseCaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: None,
            interval_secs: 5,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            devices: vec![
                SimulatedDeviceConfig {
                    ski: "ski-evse".to_string(),
                    kind: DeviceKind::Evse,
                },
                SimulatedDeviceConfig {
                    ski: "ski-heatpump".to_string(),
                    kind: DeviceKind::Hvac,
                },
            ],
            update_interval_secs: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "cemd=info,cem_app=info,cem_adapter_virtual=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
