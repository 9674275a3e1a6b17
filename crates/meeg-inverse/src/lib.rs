//! MEEG-Inverse: minimum-norm source estimation
//!
//! Regularized minimum-norm solver, run configuration and the sequential
//! simulate / invert / display pipeline.

pub mod config;
pub mod dataset;
pub mod minimum_norm;
pub mod pipeline;

pub use config::{DataPaths, DataSource, DisplayParams, InverseParams, LogLevel, RunConfig, SyntheticGeometry};
pub use dataset::Dataset;
pub use minimum_norm::{minimum_norm, regularization_path, InverseSolver, MinimumNorm, RegularizationPoint, SourceEstimate};
pub use pipeline::{InversePipeline, RunReport, ESTIMATE_FIGURE, TOPOGRAPHY_FIGURE};
