//! Forward simulation: single active dipole plus sensor noise

use meeg_core::{MeegError, MeegResult};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sensor noise standard deviation used by the reference demo
pub const DEFAULT_NOISE_STD: f64 = 1e-8;

/// Configuration for forward simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Index of the single active dipole
    pub dipole_index: usize,
    /// Activation assigned to that dipole
    pub amplitude: f64,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Additive sensor noise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: DEFAULT_NOISE_STD,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dipole_index: 1000,
            amplitude: 1.0,
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> MeegResult<()> {
        if !self.amplitude.is_finite() {
            return Err(MeegError::InvalidConfig {
                reason: format!("dipole amplitude must be finite, got {}", self.amplitude),
            });
        }
        if !(self.noise.gaussian_std.is_finite() && self.noise.gaussian_std >= 0.0) {
            return Err(MeegError::InvalidConfig {
                reason: format!(
                    "noise standard deviation must be >= 0, got {}",
                    self.noise.gaussian_std
                ),
            });
        }
        Ok(())
    }
}

/// Outcome of one forward simulation
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Ground-truth activation, one entry per dipole
    pub activation: DVector<f64>,
    /// G * activation
    pub clean: DVector<f64>,
    /// clean + noise
    pub measurement: DVector<f64>,
}

/// Apply the forward operator: `m = G * x`
pub fn forward(leadfield: &DMatrix<f64>, activation: &DVector<f64>) -> MeegResult<DVector<f64>> {
    if activation.len() != leadfield.ncols() {
        return Err(MeegError::DimensionMismatch {
            operation: "forward model",
            expected: leadfield.ncols(),
            found: activation.len(),
        });
    }
    Ok(leadfield * activation)
}

/// Sparse activation with `amplitude` at `dipole_index`
pub fn single_dipole_activation(
    n_dipoles: usize,
    dipole_index: usize,
    amplitude: f64,
) -> MeegResult<DVector<f64>> {
    if dipole_index >= n_dipoles {
        return Err(MeegError::IndexOutOfRange {
            what: "dipole",
            index: dipole_index,
            len: n_dipoles,
        });
    }
    let mut activation = DVector::zeros(n_dipoles);
    activation[dipole_index] = amplitude;
    Ok(activation)
}

/// One-shot simulation with the default noise level and an entropy-seeded RNG
pub fn simulate(
    leadfield: &DMatrix<f64>,
    dipole_index: usize,
    amplitude: f64,
) -> MeegResult<DVector<f64>> {
    let config = SimulationConfig {
        dipole_index,
        amplitude,
        ..SimulationConfig::default()
    };
    Ok(ForwardSimulator::new(config)?.simulate(leadfield)?.measurement)
}

/// Forward simulator holding its own random stream
pub struct ForwardSimulator {
    config: SimulationConfig,
    rng: StdRng,
    normal_dist: Normal<f64>,
}

impl ForwardSimulator {
    /// Create new simulator with configuration
    pub fn new(config: SimulationConfig) -> MeegResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std).map_err(|e| {
            MeegError::Simulation {
                message: format!("Failed to create normal distribution: {}", e),
            }
        })?;

        Ok(ForwardSimulator {
            config,
            rng,
            normal_dist,
        })
    }

    /// Activate the configured dipole, project through `leadfield` and add noise
    pub fn simulate(&mut self, leadfield: &DMatrix<f64>) -> MeegResult<Simulation> {
        let activation = single_dipole_activation(
            leadfield.ncols(),
            self.config.dipole_index,
            self.config.amplitude,
        )?;
        let clean = forward(leadfield, &activation)?;
        let measurement = self.add_noise(&clean);

        debug!(
            dipole = self.config.dipole_index,
            channels = clean.len(),
            noise_std = self.config.noise.gaussian_std,
            "forward simulation done"
        );

        Ok(Simulation {
            activation,
            clean,
            measurement,
        })
    }

    /// Add independent Gaussian noise to every channel
    pub fn add_noise(&mut self, clean: &DVector<f64>) -> DVector<f64> {
        if self.config.noise.gaussian_std == 0.0 {
            return clean.clone();
        }
        clean.map(|value| value + self.normal_dist.sample(&mut self.rng))
    }

    /// Get current configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}
