use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::cell::CellIndex;
use std::path::Path;

/// Optical photon PDG encoding.
pub const OPTICAL_PHOTON_PDG: i32 = -22;

// Worker settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    /// Number of worker threads; 0 lets rayon decide.
    #[serde(default)]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig { workers: 0 }
    }
}

// Names and extent of the crystal array, as placed by the geometry collaborator
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GeometryConfig {
    #[serde(default = "default_sensitive_volume")]
    pub sensitive_volume: String,
    #[serde(default = "default_surrounding_volume")]
    pub surrounding_volume: String,
    /// Number of crystals along x, y, z.
    #[serde(default = "default_array_dims")]
    pub array_dims: [u8; 3],
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig {
            sensitive_volume: default_sensitive_volume(),
            surrounding_volume: default_surrounding_volume(),
            array_dims: default_array_dims(),
        }
    }
}

fn default_sensitive_volume() -> String {
    "CsI".to_string()
}

fn default_surrounding_volume() -> String {
    "World".to_string()
}

fn default_array_dims() -> [u8; 3] {
    [10, 10, 10]
}

// Counting of particles leaving the crystals
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BoundaryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_species_pdg")]
    pub species_pdg: i32,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        BoundaryConfig { enabled: true, species_pdg: OPTICAL_PHOTON_PDG }
    }
}

fn default_species_pdg() -> i32 {
    OPTICAL_PHOTON_PDG
}

// Trajectory recording
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TrajectoryConfig {
    #[serde(default = "default_true")]
    pub record: bool,
    /// Particle codes whose tracks get no trajectory (optical photons are often far too many).
    #[serde(default)]
    pub skip_pdg: Vec<i32>,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        TrajectoryConfig { record: true, skip_pdg: Vec::new() }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Bincode,
    Messagepack,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Bincode => "bin",
            OutputFormat::Messagepack => "msgpack",
        }
    }

    /// Picks the format matching a file's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(OutputFormat::Json),
            Some("bin") | Some("bincode") => Ok(OutputFormat::Bincode),
            Some("msgpack") | Some("mp") => Ok(OutputFormat::Messagepack),
            _ => anyhow::bail!("Cannot infer replay format from '{}' (expected .json, .bin or .msgpack)", path_ref.display()),
        }
    }
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub save_events: bool,
    #[serde(default)]
    pub save_trajectories: bool,
    #[serde(default = "default_true")]
    pub save_exit_counts: bool,
    #[serde(default = "default_process_map_file")]
    pub process_map_file: String,
}

fn default_format() -> OutputFormat {
    OutputFormat::Json
}

fn default_process_map_file() -> String {
    "ProcessIDMap.txt".to_string()
}

fn default_true() -> bool {
    true
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DetectorConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
    pub output: OutputConfig,
}

impl DetectorConfig {
    /// Loads the detector configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::parse(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a TOML document.
    pub fn parse(config_str: &str) -> Result<Self> {
        let config: DetectorConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.geometry.sensitive_volume.is_empty() || self.geometry.surrounding_volume.is_empty() {
            anyhow::bail!("geometry volume names must not be empty.");
        }
        if self.geometry.sensitive_volume == self.geometry.surrounding_volume {
            anyhow::bail!("sensitive_volume and surrounding_volume must differ.");
        }
        if self.geometry.array_dims.iter().any(|&d| d == 0 || d > 100) {
            anyhow::bail!("array_dims entries must be in 1..=100.");
        }
        if self.output.base_filename.trim().is_empty() {
            anyhow::bail!("output.base_filename must not be empty.");
        }
        if self.output.process_map_file.trim().is_empty() {
            anyhow::bail!("output.process_map_file must not be empty.");
        }
        Ok(())
    }

    /// Whether `cell_address` names a crystal of the configured array.
    pub fn is_known_cell(&self, cell_address: i32) -> bool {
        CellIndex::from_address(cell_address)
            .map(|c| c.within(self.geometry.array_dims))
            .unwrap_or(false)
    }
}
