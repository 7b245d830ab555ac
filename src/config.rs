//! Game tuning loaded once at startup and shared read-only by the state
//! machine and the terminal front end.

use std::{fs, io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snake::Position;

/// Side of the playable square, in grid cells.
pub const BOARD_SIZE: i32 = 20;
pub const INITIAL_SNAKE_LENGTH: usize = 3;

const DEFAULT_TICK_MS: u64 = 100;
const DEFAULT_FOOD_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SURVIVAL_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("tick_ms must be non-zero")]
    ZeroTick,
    #[error("{0} must be non-zero")]
    ZeroTimeout(&'static str),
    #[error("food timeout ({food_ms} ms) must be shorter than survival timeout ({survival_ms} ms)")]
    WinnableTimeouts { food_ms: u64, survival_ms: u64 },
}

/// Fixed geometry of the playable square. Not part of the config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Board {
    pub width: i32,
    pub height: i32,
}

impl Board {
    pub fn contains(&self, pos: Position) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    pub fn center(&self) -> Position {
        Position::new(self.width / 2, self.height / 2)
    }

    /// Cells food may occupy: everything except the outermost ring.
    pub fn interior(&self) -> impl Iterator<Item = Position> + '_ {
        (1..self.height - 1).flat_map(move |y| (1..self.width - 1).map(move |x| Position::new(x, y)))
    }
}

impl Default for Board {
    fn default() -> Self {
        Board { width: BOARD_SIZE, height: BOARD_SIZE }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tick_ms: u64,
    pub food_timeout_ms: u64,
    pub survival_timeout_ms: u64,
    #[serde(skip)]
    pub board: Board,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_ms: DEFAULT_TICK_MS,
            food_timeout_ms: DEFAULT_FOOD_TIMEOUT_MS,
            survival_timeout_ms: DEFAULT_SURVIVAL_TIMEOUT_MS,
            board: Board::default(),
        }
    }
}

impl Config {
    /// Loads the YAML file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Config::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations where surviving the food timer would be
    /// possible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.food_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("food_timeout_ms"));
        }
        if self.survival_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("survival_timeout_ms"));
        }
        if self.food_timeout_ms >= self.survival_timeout_ms {
            return Err(ConfigError::WinnableTimeouts {
                food_ms: self.food_timeout_ms,
                survival_ms: self.survival_timeout_ms,
            });
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn food_timeout(&self) -> Duration {
        Duration::from_millis(self.food_timeout_ms)
    }

    pub fn survival_timeout(&self) -> Duration {
        Duration::from_millis(self.survival_timeout_ms)
    }
}
