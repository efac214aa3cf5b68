// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lab settings and configuration.
//!
//! This module manages lab-level settings including:
//! - The cranes and conveyors on the factory floor
//! - Autoplay options
//! - Snapshot output options

use robolab_sequencer::{ConfigError, ConveyorConfig, CraneConfig, PhaseDurations};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "robolab.ron";

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Settings written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// A robot configuration is invalid
    #[error(transparent)]
    Robot(#[from] ConfigError),
}

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Autoplay options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoplaySettings {
    /// Grab/drop cycles each crane runs
    pub cycles: u32,
    /// Pause between cycles in milliseconds
    pub pause_ms: u64,
    /// Scale applied to every phase duration (0.5 plays twice as fast)
    pub time_scale: f32,
}

impl Default for AutoplaySettings {
    fn default() -> Self {
        Self {
            cycles: 2,
            pause_ms: 250,
            time_scale: 1.0,
        }
    }
}

/// Snapshot output options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Print crane snapshots
    pub cranes: bool,
    /// Print conveyor snapshots (one per frame, noisy)
    pub conveyors: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            cranes: true,
            conveyors: false,
        }
    }
}

/// Complete lab settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabSettings {
    /// Settings format version
    pub version: u32,
    /// Cranes on the floor
    pub cranes: Vec<CraneConfig>,
    /// Conveyors on the floor
    pub conveyors: Vec<ConveyorConfig>,
    /// Autoplay options
    pub autoplay: AutoplaySettings,
    /// Output options
    pub output: OutputSettings,
}

impl Default for LabSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            cranes: vec![CraneConfig::new("CR-001"), CraneConfig::new("CR-002").broken()],
            conveyors: vec![ConveyorConfig::new("CB-001")],
            autoplay: AutoplaySettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl LabSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::info!("Loaded lab settings from {:?}", path);
        Ok(settings)
    }

    /// Parse and validate settings
    pub fn from_ron(content: &str) -> Result<Self> {
        let settings: LabSettings = ron::from_str(content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every robot configuration
    pub fn validate(&self) -> Result<()> {
        for crane in &self.cranes {
            crane.validate()?;
        }
        for conveyor in &self.conveyors {
            conveyor.validate()?;
        }
        Ok(())
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the settings file path for a lab directory
    pub fn settings_file_path(lab_dir: &Path) -> PathBuf {
        lab_dir.join(SETTINGS_FILE_NAME)
    }

    /// Crane configurations with the autoplay time scale applied
    pub fn scaled_cranes(&self) -> Vec<CraneConfig> {
        let scale = f64::from(self.autoplay.time_scale.max(0.0));
        let scaled = |ms: u64| (ms as f64 * scale).round() as u64;

        self.cranes
            .iter()
            .map(|crane| {
                let d = crane.durations;
                crane.clone().with_durations(PhaseDurations {
                    move_ms: scaled(d.move_ms),
                    open_claw_ms: scaled(d.open_claw_ms),
                    lower_cable_ms: scaled(d.lower_cable_ms),
                    close_claw_ms: scaled(d.close_claw_ms),
                    raise_cable_ms: scaled(d.raise_cable_ms),
                })
            })
            .collect()
    }
}
