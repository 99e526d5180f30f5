//! Optional `~/.dayboard/config.yaml`.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::BoardDate;

/// Default pending-event bound per live listener.
pub const DEFAULT_LISTENER_CAPACITY: usize = 1000;

/// Singapore time; the zone the board was first run in.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Offset used only when a client omits the date.
    pub utc_offset_minutes: i32,
    pub listener_capacity: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            listener_capacity: DEFAULT_LISTENER_CAPACITY,
        }
    }
}

impl BoardConfig {
    /// `<home>/.dayboard/config.yaml`
    pub fn path_at(home: &Path) -> PathBuf {
        crate::store::board_root(home).join("config.yaml")
    }

    /// Load the config, falling back to defaults when the file is absent.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        // An empty file deserializes to `null`, which means "all defaults".
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path, source })?;
        config.listener_capacity = config.listener_capacity.max(1);
        config.offset()?;
        Ok(config)
    }

    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidOffset(self.utc_offset_minutes))
    }

    /// Today's date in the configured offset.
    pub fn today(&self) -> Result<BoardDate, ConfigError> {
        let offset = self.offset()?;
        Ok(BoardDate::new(
            Utc::now().with_timezone(&offset).date_naive(),
        ))
    }
}
