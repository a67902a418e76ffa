// Configuration loading and parsing (gridpot.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// gridpot.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire gridpot.toml file. Every
/// section is optional; missing sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    game: GameSection,
    #[serde(default)]
    sync: SyncSection,
    #[serde(default)]
    store: StoreSection,
    #[serde(default)]
    roster: RosterSection,
}

/// How a joining participant's starting balance is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuyInPolicy {
    /// Everyone starts with the configured buy-in amount.
    Fixed,
    /// Everyone starts at zero and antes drive balances negative.
    Zero,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameSection {
    /// Per-round ante suggested to new rooms. Admins can change it in SETUP.
    pub default_ante: u32,
    /// Starting balance handed to joining participants under `fixed`.
    pub buy_in: i64,
    pub buy_in_policy: BuyInPolicy,
}

impl Default for GameSection {
    fn default() -> Self {
        GameSection {
            default_ante: 2,
            buy_in: 50,
            buy_in_policy: BuyInPolicy::Fixed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// How often the sync engine refetches authoritative state.
    pub poll_interval_ms: u64,
    /// How long a store write may block before it is surfaced as a timeout.
    pub store_timeout_ms: u64,
    /// Room-code collision retries before create_room gives up.
    pub create_room_attempts: u32,
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            poll_interval_ms: 1_000,
            store_timeout_ms: 5_000,
            create_room_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            path: "gridpot.db".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterSource {
    Espn,
    Static,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RosterSection {
    pub source: RosterSource,
    /// Overrides the provider's default API root. Tests point this at a
    /// local mock server.
    pub base_url: Option<String>,
}

impl Default for RosterSection {
    fn default() -> Self {
        RosterSection {
            source: RosterSource::Espn,
            base_url: None,
        }
    }
}

/// The assembled application config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub game: GameSection,
    pub sync: SyncSection,
    pub store: StoreSection,
    pub roster: RosterSection,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load configuration from `gridpot.toml` in the given directory. A
/// missing file yields the built-in defaults; a present-but-broken file
/// is an error.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("gridpot.toml");

    let file: ConfigFile = if path.exists() {
        let text = read_file(&path)?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?
    } else {
        ConfigFile::default()
    };

    let config = Config {
        game: file.game,
        sync: file.sync,
        store: file.store,
        roster: file.roster,
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.game.buy_in < 0 {
        return Err(ConfigError::ValidationError {
            field: "game.buy_in".into(),
            message: format!("must be >= 0, got {}", config.game.buy_in),
        });
    }

    if config.sync.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "sync.poll_interval_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.sync.store_timeout_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "sync.store_timeout_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.sync.create_room_attempts == 0 {
        return Err(ConfigError::ValidationError {
            field: "sync.create_room_attempts".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.store.path.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "store.path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
