//! Configuration and palette management for ampcore.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.ampcore/config.toml`
//! - Validation of screen geometry and indicator address ownership
//! - Built-in 16-colour palettes for the terminal monitor
//!
//! # Configuration File
//!
//! ```toml
//! [screen]
//! cols = 40
//! rows = 25
//! background = 6
//! palette = "pepto"
//!
//! [pane]
//! overlay_row = 24
//! fill_colour = 1
//!
//! [indicators]
//! pause_addr = 2
//! spinner_frames = "|/-\\"
//! flash_with_blink = true
//!
//! [timing]
//! blink_interval_ms = 200
//! ```
//!
//! # Available Palettes
//!
//! - `pepto` - measured colours of the original machine
//! - `green-phosphor` - monochrome green monitor
//! - `amber` - monochrome amber monitor

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::{IndicatorLayout, PANE_WIDTH};
use crate::session::SessionOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub screen: ScreenConfig,
    pub pane: PaneConfig,
    pub indicators: IndicatorConfig,
    pub timing: TimingConfig,
}

/// Screen geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub cols: u16,
    pub rows: u16,
    pub background: u8,
    pub palette: String,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            cols: 40,
            rows: 25,
            background: 6,
            palette: "pepto".to_string(),
        }
    }
}

/// Masked pane settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneConfig {
    pub overlay_row: u16,
    pub fill_colour: u8,
}

impl Default for PaneConfig {
    fn default() -> Self {
        Self {
            overlay_row: 24,
            fill_colour: 1,
        }
    }
}

/// Status line cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub pause_addr: usize,
    pub abort_addr: usize,
    pub spinner_addr: usize,
    pub carrier_addrs: [usize; 2],
    pub minutes_addr: usize,
    pub separator_addr: usize,
    pub tens_addr: usize,
    pub ones_addr: usize,
    pub pause_glyph: char,
    pub abort_glyph: char,
    pub carrier_glyph: char,
    pub separator_glyph: char,
    pub base_digit_glyph: char,
    pub spinner_frames: String,
    pub colour: u8,
    pub flash_with_blink: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        let layout = IndicatorLayout::default();
        Self {
            pause_addr: layout.pause_addr,
            abort_addr: layout.abort_addr,
            spinner_addr: layout.spinner_addr,
            carrier_addrs: layout.carrier_addrs,
            minutes_addr: layout.minutes_addr,
            separator_addr: layout.separator_addr,
            tens_addr: layout.tens_addr,
            ones_addr: layout.ones_addr,
            pause_glyph: char::from(layout.pause_glyph),
            abort_glyph: char::from(layout.abort_glyph),
            carrier_glyph: char::from(layout.carrier_glyph),
            separator_glyph: char::from(layout.separator_glyph),
            base_digit_glyph: char::from(layout.base_digit_glyph),
            spinner_frames: layout.spinner_frames.iter().map(|&b| char::from(b)).collect(),
            colour: layout.colour,
            flash_with_blink: layout.flash_with_blink,
        }
    }
}

/// Idle tick cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub blink_interval_ms: u64,
    /// How often the monitor runs an idle pass
    pub tick_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            blink_interval_ms: 200,
            tick_interval_ms: 200,
        }
    }
}

/// Glyphs are single bytes
fn glyph_byte(name: &str, ch: char) -> Result<u8, ConfigError> {
    u8::try_from(u32::from(ch))
        .map_err(|_| ConfigError::Invalid(format!("{} {:?} is not a single-byte glyph", name, ch)))
}

impl IndicatorConfig {
    pub fn to_layout(&self) -> Result<IndicatorLayout, ConfigError> {
        let spinner_frames = self
            .spinner_frames
            .chars()
            .map(|ch| glyph_byte("spinner frame", ch))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IndicatorLayout {
            pause_addr: self.pause_addr,
            abort_addr: self.abort_addr,
            spinner_addr: self.spinner_addr,
            carrier_addrs: self.carrier_addrs,
            minutes_addr: self.minutes_addr,
            separator_addr: self.separator_addr,
            tens_addr: self.tens_addr,
            ones_addr: self.ones_addr,
            pause_glyph: glyph_byte("pause_glyph", self.pause_glyph)?,
            abort_glyph: glyph_byte("abort_glyph", self.abort_glyph)?,
            carrier_glyph: glyph_byte("carrier_glyph", self.carrier_glyph)?,
            separator_glyph: glyph_byte("separator_glyph", self.separator_glyph)?,
            base_digit_glyph: glyph_byte("base_digit_glyph", self.base_digit_glyph)?,
            spinner_frames,
            colour: self.colour,
            flash_with_blink: self.flash_with_blink,
        })
    }
}

impl Config {
    /// Load configuration from the default file, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => warn!("Ignoring {}: {}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::get_config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            fs::write(&path, content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let ampcore_dir = home.join(".ampcore");
            if !ampcore_dir.exists() {
                let _ = fs::create_dir_all(&ampcore_dir);
            }
            return Some(ampcore_dir.join("config.toml"));
        }
        None
    }

    /// Check geometry and that indicator cells and the overlay row never share an address
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let screen = &self.screen;

        if (screen.cols as usize) < PANE_WIDTH {
            return invalid(format!("screen.cols {} is narrower than the pane", screen.cols));
        }
        if self.pane.overlay_row >= screen.rows {
            return invalid(format!(
                "pane.overlay_row {} is outside {} rows",
                self.pane.overlay_row, screen.rows
            ));
        }
        if self.timing.blink_interval_ms == 0 || self.timing.tick_interval_ms == 0 {
            return invalid("timing intervals must be non-zero".to_string());
        }

        let layout = self.indicators.to_layout()?;
        if layout.spinner_frames.is_empty() {
            return invalid("indicators.spinner_frames is empty".to_string());
        }

        let size = screen.cols as usize * screen.rows as usize;
        let overlay_start = self.pane.overlay_row as usize * screen.cols as usize;
        let overlay = overlay_start..overlay_start + PANE_WIDTH;
        let mut seen = Vec::new();
        for addr in layout.addresses() {
            if addr >= size {
                return invalid(format!("indicator address {} is outside the screen", addr));
            }
            if overlay.contains(&addr) {
                return invalid(format!("indicator address {} overlaps the masked pane", addr));
            }
            if seen.contains(&addr) {
                return invalid(format!("indicator address {} is used twice", addr));
            }
            seen.push(addr);
        }
        Ok(())
    }

    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        Ok(SessionOptions {
            cols: self.screen.cols,
            rows: self.screen.rows,
            background: self.screen.background,
            overlay_row: self.pane.overlay_row,
            fill_colour: self.pane.fill_colour,
            layout: self.indicators.to_layout()?,
            blink_interval: Duration::from_millis(self.timing.blink_interval_ms),
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timing.tick_interval_ms)
    }

    /// Get the palette
    pub fn get_palette(&self) -> Palette {
        Palette::by_name(&self.screen.palette)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }

    const fn scaled(self, level: u8) -> Self {
        Self::new(
            (self.r as u16 * level as u16 / 255) as u8,
            (self.g as u16 * level as u16 / 255) as u8,
            (self.b as u16 * level as u16 / 255) as u8,
        )
    }
}

/// 16-entry colour table indexed by the low nibble of a colour byte
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub name: String,
    pub colours: [Color; 16],
}

impl Default for Palette {
    fn default() -> Self {
        Self::pepto()
    }
}

/// Perceived brightness of each pepto entry, used for the monochrome palettes
const LUMA: [u8; 16] = [
    0, 255, 80, 150, 100, 125, 60, 190, 100, 70, 130, 90, 120, 210, 130, 165,
];

impl Palette {
    /// Measured colours of the original video chip
    pub fn pepto() -> Self {
        Self {
            name: "pepto".to_string(),
            colours: [
                Color::new(0, 0, 0),       // black
                Color::new(255, 255, 255), // white
                Color::new(104, 55, 43),   // red
                Color::new(112, 164, 178), // cyan
                Color::new(111, 61, 134),  // purple
                Color::new(88, 141, 67),   // green
                Color::new(53, 40, 121),   // blue
                Color::new(184, 199, 111), // yellow
                Color::new(111, 79, 37),   // orange
                Color::new(67, 57, 0),     // brown
                Color::new(154, 103, 89),  // light red
                Color::new(68, 68, 68),    // dark grey
                Color::new(108, 108, 108), // grey
                Color::new(154, 210, 132), // light green
                Color::new(108, 94, 181),  // light blue
                Color::new(149, 149, 149), // light grey
            ],
        }
    }

    fn monochrome(name: &str, tint: Color) -> Self {
        let mut colours = [Color::new(0, 0, 0); 16];
        for (colour, level) in colours.iter_mut().zip(LUMA) {
            *colour = tint.scaled(level);
        }
        Self {
            name: name.to_string(),
            colours,
        }
    }

    pub fn green_phosphor() -> Self {
        Self::monochrome("green-phosphor", Color::new(51, 255, 102))
    }

    pub fn amber() -> Self {
        Self::monochrome("amber", Color::new(255, 176, 0))
    }

    /// Get palette by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "green-phosphor" | "green_phosphor" | "green" => Self::green_phosphor(),
            "amber" => Self::amber(),
            _ => Self::pepto(),
        }
    }

    /// List available palettes
    pub fn list() -> Vec<&'static str> {
        vec!["pepto", "green-phosphor", "amber"]
    }

    pub fn colour(&self, index: u8) -> Color {
        self.colours[(index & 0x0F) as usize]
    }
}

// Get home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let options = config.session_options().unwrap();
        assert_eq!(options.layout, IndicatorLayout::default());
        assert_eq!(options.blink_interval, Duration::from_millis(200));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [screen]
            palette = "amber"

            [indicators]
            spinner_frames = ".oO"
            flash_with_blink = false
            "#,
        )
        .unwrap();

        assert_eq!(config.screen.cols, 40);
        assert_eq!(config.get_palette().name, "amber");
        let layout = config.indicators.to_layout().unwrap();
        assert_eq!(layout.spinner_frames, b".oO".to_vec());
        assert!(!layout.flash_with_blink);
    }

    #[test]
    fn test_overlap_with_pane_rejected() {
        let mut config = Config::default();
        config.indicators.pause_addr = 965;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut config = Config::default();
        config.indicators.abort_addr = config.indicators.pause_addr;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_geometry_rejected() {
        let mut config = Config::default();
        config.screen.cols = 32;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pane.overlay_row = 25;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.indicators.spinner_frames.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.indicators.pause_glyph = 'é';
        assert!(config.validate().is_ok());
        config.indicators.pause_glyph = '€';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(Config::parse("screen = 3"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_palette_lookup() {
        let palette = Palette::by_name("PEPTO");
        assert_eq!(palette.colour(1), Color::new(255, 255, 255));
        assert_eq!(palette.colour(0x16), Color::new(53, 40, 121));
        assert_eq!(Palette::green_phosphor().colour(0), Color::new(0, 0, 0));
        assert_eq!(Palette::list().len(), 3);
    }
}
