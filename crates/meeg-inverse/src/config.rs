//! Run configuration for the inverse demonstration

use meeg_core::{config_error, Colormap, MeegResult, PlotStyle, ViewAxis, DEFAULT_MATRIX_KEY};
use meeg_simulation::{NoiseConfig, SimulationConfig, DEFAULT_NOISE_STD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Configuration name/profile
    pub name: String,
    /// Where the meshes, sensors and leadfield come from
    pub data: DataSource,
    /// Simulated ground truth
    pub simulation: SimulationConfig,
    /// Inverse solver parameters
    pub inverse: InverseParams,
    /// Figure styling
    pub display: DisplayParams,
    /// Logging verbosity
    pub log_level: LogLevel,
}

/// Input data location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Precomputed files on disk
    Files(DataPaths),
    /// Spherical geometry with an analytic dipole leadfield
    Synthetic(SyntheticGeometry),
}

/// Input file paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Source space surface, one vertex per dipole
    pub cortex_mesh: PathBuf,
    /// EEG electrode coordinates, one row per channel
    pub eeg_locations: PathBuf,
    /// MEG squid coordinates and orientations
    pub meg_locations: Option<PathBuf>,
    /// Surface through the electrodes, used for topographies
    pub eeg_mesh: PathBuf,
    /// Forward operator file
    pub leadfield: PathBuf,
    /// Key of the forward operator inside keyed containers
    pub leadfield_key: String,
}

/// Parameters of the synthetic spherical head
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticGeometry {
    /// Radius of the source sphere (m)
    pub cortex_radius: f64,
    pub cortex_stacks: usize,
    pub cortex_slices: usize,
    /// Radius of the electrode sphere (m)
    pub sensor_radius: f64,
    pub sensor_stacks: usize,
    pub sensor_slices: usize,
}

/// Inverse solver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverseParams {
    /// Tikhonov regularization
    pub lambda: f64,
}

/// Figure styling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayParams {
    pub opacity: f32,
    pub topography_colormap: Colormap,
    pub estimate_colormap: Colormap,
    pub view: ViewAxis,
    pub cull_back_faces: bool,
}

/// Debug logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    None,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl DataPaths {
    /// File names used by the OpenMEEG inverse example, relative to `dir`
    pub fn openmeeg_layout(dir: &Path) -> Self {
        Self {
            cortex_mesh: dir.join("cortex.tri"),
            eeg_locations: dir.join("eeg_channels_locations.txt"),
            meg_locations: Some(dir.join("meg_channels_locations.squids")),
            eeg_mesh: dir.join("eeg_channels_mesh.tri"),
            leadfield: dir.join("leadfield_eeg.json"),
            leadfield_key: DEFAULT_MATRIX_KEY.to_string(),
        }
    }

    /// Resolve relative paths against `base`
    pub fn resolved_against(&self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            cortex_mesh: resolve(&self.cortex_mesh),
            eeg_locations: resolve(&self.eeg_locations),
            meg_locations: self.meg_locations.as_ref().map(resolve),
            eeg_mesh: resolve(&self.eeg_mesh),
            leadfield: resolve(&self.leadfield),
            leadfield_key: self.leadfield_key.clone(),
        }
    }
}

impl Default for SyntheticGeometry {
    fn default() -> Self {
        Self {
            cortex_radius: 0.07,
            cortex_stacks: 16,
            cortex_slices: 24,
            sensor_radius: 0.09,
            sensor_stacks: 6,
            sensor_slices: 10,
        }
    }
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            topography_colormap: Colormap::BlueRed,
            estimate_colormap: Colormap::Hot,
            view: ViewAxis::Top,
            cull_back_faces: true,
        }
    }
}

impl DisplayParams {
    pub fn topography_style(&self) -> PlotStyle {
        self.style(self.topography_colormap)
    }

    pub fn estimate_style(&self) -> PlotStyle {
        self.style(self.estimate_colormap)
    }

    fn style(&self, colormap: Colormap) -> PlotStyle {
        PlotStyle {
            opacity: self.opacity,
            colormap,
            view: self.view,
            cull_back_faces: self.cull_back_faces,
        }
    }
}

impl LogLevel {
    /// Maximum `tracing` level, `None` when logging is off
    pub fn as_tracing_level(&self) -> Option<tracing::Level> {
        match self {
            LogLevel::None => None,
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Warning => Some(tracing::Level::WARN),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Trace => Some(tracing::Level::TRACE),
        }
    }
}

/// Preset configurations
impl RunConfig {
    /// Synthetic spherical head, runs without any input files
    pub fn synthetic() -> Self {
        RunConfig {
            name: "Synthetic sphere".to_string(),
            data: DataSource::Synthetic(SyntheticGeometry::default()),
            simulation: SimulationConfig {
                dipole_index: 100,
                amplitude: 1.0,
                noise: NoiseConfig {
                    gaussian_std: DEFAULT_NOISE_STD,
                },
                seed: Some(42),
            },
            inverse: InverseParams { lambda: 1e-6 },
            display: DisplayParams::default(),
            log_level: LogLevel::Info,
        }
    }

    /// The OpenMEEG EEG inverse example: dipole 1000, noise 1e-8, lambda 1e-20
    pub fn openmeeg_example(data_dir: &Path) -> Self {
        RunConfig {
            name: "OpenMEEG EEG example".to_string(),
            data: DataSource::Files(DataPaths::openmeeg_layout(data_dir)),
            simulation: SimulationConfig::default(),
            inverse: InverseParams { lambda: 1e-20 },
            display: DisplayParams::default(),
            log_level: LogLevel::Info,
        }
    }

    /// Validate entire configuration
    pub fn validate(&self) -> MeegResult<()> {
        self.simulation.validate()?;

        if !(self.inverse.lambda.is_finite() && self.inverse.lambda >= 0.0) {
            return Err(config_error!(
                "regularization lambda must be finite and >= 0, got {}",
                self.inverse.lambda
            ));
        }

        if !(0.0..=1.0).contains(&self.display.opacity) {
            return Err(config_error!("opacity must be between 0.0 and 1.0"));
        }

        match &self.data {
            DataSource::Files(paths) => {
                if paths.leadfield_key.is_empty() {
                    return Err(config_error!("leadfield key cannot be empty"));
                }
            }
            DataSource::Synthetic(geometry) => self.validate_geometry(geometry)?,
        }

        Ok(())
    }

    fn validate_geometry(&self, geometry: &SyntheticGeometry) -> MeegResult<()> {
        if !(geometry.cortex_radius > 0.0 && geometry.sensor_radius > geometry.cortex_radius) {
            return Err(config_error!(
                "sensor radius ({}) must exceed cortex radius ({}) > 0",
                geometry.sensor_radius,
                geometry.cortex_radius
            ));
        }
        for (stacks, slices) in [
            (geometry.cortex_stacks, geometry.cortex_slices),
            (geometry.sensor_stacks, geometry.sensor_slices),
        ] {
            if stacks < 2 || slices < 3 {
                return Err(config_error!(
                    "sphere resolution {}x{} too coarse (need >= 2 stacks, >= 3 slices)",
                    stacks,
                    slices
                ));
            }
        }
        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> MeegResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("Failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> MeegResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize configuration: {}", e))
    }

    /// Load and validate a configuration file.
    ///
    /// Relative data paths are taken relative to the file's directory.
    pub fn from_file(path: &Path) -> MeegResult<Self> {
        let json = meeg_core::matrix_io::read_file(path)?;
        let mut config = Self::from_json(&json)?;

        if let DataSource::Files(paths) = &mut config.data {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            *paths = paths.resolved_against(base);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::synthetic()
    }
}
