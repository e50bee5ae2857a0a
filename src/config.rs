//! Configuration management
//!
//! Loads and validates the YAML file naming the MIDI ports, the per-pad
//! key bindings and the LED colors painted on bound pads.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::fs;

use crate::codec::{Brightness, PadAddress, Region};
use crate::error::Error;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub bindings: BindingsConfig,
    #[serde(default)]
    pub leds: LedConfig,
}

/// MIDI port configuration (substring patterns, case-insensitive)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    pub input_port: String,
    pub output_port: String,
}

/// Key bindings, one map of pad index to key name per region
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BindingsConfig {
    #[serde(default)]
    pub grid: BTreeMap<u8, String>,
    #[serde(default)]
    pub row: BTreeMap<u8, String>,
    #[serde(default)]
    pub column: BTreeMap<u8, String>,
}

impl BindingsConfig {
    /// All bindings as (region, index, key) triples, grid first
    pub fn iter(&self) -> impl Iterator<Item = (Region, u8, &str)> {
        let grid = self
            .grid
            .iter()
            .map(|(index, key)| (Region::Grid, *index, key.as_str()));
        let row = self
            .row
            .iter()
            .map(|(index, key)| (Region::CommandRow, *index, key.as_str()));
        let column = self
            .column
            .iter()
            .map(|(index, key)| (Region::CommandColumn, *index, key.as_str()));
        grid.chain(row).chain(column)
    }

    /// Total number of bound pads
    pub fn len(&self) -> usize {
        self.grid.len() + self.row.len() + self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject indices outside their region's range
    pub fn validate(&self) -> Result<(), Error> {
        for (region, index, _) in self.iter() {
            PadAddress::new(region, index)?;
        }
        Ok(())
    }
}

/// LED colors painted on bound pads at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedConfig {
    #[serde(default = "default_grid_color")]
    pub grid: LedColor,
    #[serde(default = "default_strip_color")]
    pub row: LedColor,
    #[serde(default = "default_strip_color")]
    pub column: LedColor,
}

impl LedConfig {
    pub fn for_region(&self, region: Region) -> LedColor {
        match region {
            Region::Grid => self.grid,
            Region::CommandRow => self.row,
            Region::CommandColumn => self.column,
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            grid: default_grid_color(),
            row: default_strip_color(),
            column: default_strip_color(),
        }
    }
}

/// One green/red intensity pair
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LedColor {
    pub green: Brightness,
    pub red: Brightness,
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config
            .bindings
            .validate()
            .with_context(|| format!("Invalid binding in config: {}", path))?;

        Ok(config)
    }
}

// Default value functions
fn default_grid_color() -> LedColor {
    LedColor {
        green: Brightness::High,
        red: Brightness::High,
    }
}

fn default_strip_color() -> LedColor {
    LedColor {
        green: Brightness::Off,
        red: Brightness::High,
    }
}
