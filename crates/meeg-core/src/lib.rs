//! MEEG-Core: foundation types for EEG/MEG source imaging
//!
//! Meshes, sensor arrays, matrix loaders and the rendering seam shared by
//! the simulation and inverse crates.

pub mod error;
pub mod matrix_io;
pub mod mesh;
pub mod render;
pub mod sensors;

pub use error::{MeegError, MeegResult};
pub use matrix_io::{load_matrix, load_text_matrix, MatrixFormat, MatrixRecord, DEFAULT_MATRIX_KEY};
pub use mesh::{Mesh, MeshInfo};
pub use render::{Colormap, NullRenderer, PlotStyle, ScalarField, SceneRenderer, SummaryRenderer, ViewAxis};
pub use sensors::{SensorArray, SensorKind};
