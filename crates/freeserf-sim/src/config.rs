//! Configuration loading and typed config structures for the simulation
//! engine.
//!
//! The canonical configuration is a YAML file. This module mirrors its
//! structure with strongly-typed, `#[serde(default)]` structs so a
//! partial or empty file still produces a runnable configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The parsed configuration failed a validation check.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Map geometry and seed.
    #[serde(default)]
    pub world: WorldConfig,

    /// Tick cadence and starting game speed.
    #[serde(default)]
    pub tick: TickConfig,

    /// Default per-player priority tables.
    #[serde(default)]
    pub priorities: PriorityConfig,

    /// Structured logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Read-only observer API configuration.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Local snapshot persistence configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if it fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if it fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.world.cols.is_power_of_two() || !self.world.rows.is_power_of_two() {
            return Err(ConfigError::Invalid {
                reason: "world.cols and world.rows must both be powers of two".to_owned(),
            });
        }
        if self.tick.game_speed == 0 {
            return Err(ConfigError::Invalid {
                reason: "tick.game_speed must be nonzero (use tick.paused instead)".to_owned(),
            });
        }
        Ok(())
    }
}

/// Map geometry and RNG seed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Map width in tiles; must be a power of two.
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Map height in tiles; must be a power of two.
    #[serde(default = "default_rows")]
    pub rows: u32,
    /// The three-word RNG seed.
    #[serde(default = "default_seed")]
    pub seed: (u16, u16, u16),
    /// Number of player slots (1..4).
    #[serde(default = "default_player_count")]
    pub player_count: u8,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
            seed: default_seed(),
            player_count: default_player_count(),
        }
    }
}

/// Tick cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Real-time milliseconds per tick (the original engine's fixed 20ms).
    #[serde(default = "default_tick_length_ms")]
    pub tick_length_ms: u32,
    /// Starting game speed (`game_tick` increment per real tick).
    #[serde(default = "default_game_speed")]
    pub game_speed: u32,
    /// Whether the simulation starts paused.
    #[serde(default)]
    pub paused: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_length_ms: default_tick_length_ms(),
            game_speed: default_game_speed(),
            paused: false,
        }
    }
}

/// Default per-player priority tables, applied to every player at
/// creation unless a save overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriorityConfig {
    /// Default flag transport priority, uniform across all 26 resources.
    #[serde(default = "default_flag_prio")]
    pub flag_prio: u8,
    /// Default inventory stocking priority, uniform across all 26
    /// resources.
    #[serde(default = "default_inventory_prio")]
    pub inventory_prio: u8,
    /// Default tool-making priority, uniform across all 9 tool kinds.
    #[serde(default = "default_tool_prio")]
    pub tool_prio: u8,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            flag_prio: default_flag_prio(),
            inventory_prio: default_inventory_prio(),
            tool_prio: default_tool_prio(),
        }
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Read-only observer API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether the observer HTTP/WS server is started at all.
    #[serde(default)]
    pub enabled: bool,
    /// Bind port for the observer server.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_observer_port(),
        }
    }
}

/// Local snapshot persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Directory snapshots are written to and loaded from.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    /// Write a snapshot automatically every N ticks (0 = never).
    #[serde(default)]
    pub autosave_interval_ticks: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            autosave_interval_ticks: 0,
        }
    }
}

const fn default_cols() -> u32 {
    64
}

const fn default_rows() -> u32 {
    64
}

const fn default_seed() -> (u16, u16, u16) {
    (0x5a5a, 0x0001, 0x0001)
}

const fn default_player_count() -> u8 {
    2
}

const fn default_tick_length_ms() -> u32 {
    freeserf_types::TICK_LENGTH_MS
}

const fn default_game_speed() -> u32 {
    freeserf_types::DEFAULT_GAME_SPEED
}

const fn default_flag_prio() -> u8 {
    128
}

const fn default_inventory_prio() -> u8 {
    128
}

const fn default_tool_prio() -> u8 {
    128
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_snapshot_dir() -> String {
    "./snapshots".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.world.cols, 64);
        assert_eq!(config.tick.game_speed, freeserf_types::DEFAULT_GAME_SPEED);
    }

    #[test]
    fn rejects_non_power_of_two_map() {
        let yaml = "world:\n  cols: 50\n  rows: 64\n";
        assert!(SimulationConfig::parse(yaml).is_err());
    }

    #[test]
    fn rejects_zero_game_speed() {
        let yaml = "tick:\n  game_speed: 0\n";
        assert!(SimulationConfig::parse(yaml).is_err());
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = "world:\n  seed: [1, 2, 3]\n";
        let config = SimulationConfig::parse(yaml).unwrap_or_else(|_| SimulationConfig::default());
        assert_eq!(config.world.seed, (1, 2, 3));
        assert_eq!(config.world.cols, 64);
    }
}
