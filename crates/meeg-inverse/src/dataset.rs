//! Everything a run reads: meshes, sensors and the forward operator

use crate::config::{DataPaths, DataSource, SyntheticGeometry};
use meeg_core::{load_matrix, MeegError, MeegResult, Mesh, SensorArray, SensorKind};
use meeg_simulation::{analytic_leadfield, normal_dipoles};
use nalgebra::DMatrix;
use tracing::{info, warn};

/// Loaded (or generated) input data, read-only for the run
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Source space: one vertex per dipole
    pub cortex: Mesh,
    /// EEG electrodes, one per leadfield row
    pub electrodes: SensorArray,
    /// MEG squids, loaded for completeness
    pub squids: Option<SensorArray>,
    /// Surface whose vertices are the electrodes
    pub electrodes_mesh: Mesh,
    /// Forward operator, n_channels x n_dipoles
    pub leadfield: DMatrix<f64>,
}

impl Dataset {
    pub fn from_source(source: &DataSource) -> MeegResult<Self> {
        match source {
            DataSource::Files(paths) => Self::load(paths),
            DataSource::Synthetic(geometry) => Self::synthetic(geometry),
        }
    }

    /// Read all inputs from disk
    pub fn load(paths: &DataPaths) -> MeegResult<Self> {
        let cortex = Mesh::load(&paths.cortex_mesh)?;
        let electrodes = SensorArray::load(SensorKind::Electrode, &paths.eeg_locations)?;
        let squids = paths
            .meg_locations
            .as_deref()
            .map(|path| SensorArray::load(SensorKind::Squid, path))
            .transpose()?;
        let electrodes_mesh = Mesh::load(&paths.eeg_mesh)?;
        let leadfield = load_matrix(&paths.leadfield, &paths.leadfield_key)?;

        let dataset = Dataset {
            cortex,
            electrodes,
            squids,
            electrodes_mesh,
            leadfield,
        };
        dataset.check_consistency()?;
        dataset.log_summary();
        Ok(dataset)
    }

    /// Concentric spheres with radial dipoles on the inner one
    pub fn synthetic(geometry: &SyntheticGeometry) -> MeegResult<Self> {
        let cortex = Mesh::uv_sphere(
            "cortex",
            geometry.cortex_radius,
            geometry.cortex_stacks,
            geometry.cortex_slices,
        )?;
        let electrodes_mesh = Mesh::uv_sphere(
            "eeg_channels_mesh",
            geometry.sensor_radius,
            geometry.sensor_stacks,
            geometry.sensor_slices,
        )?;
        let electrodes =
            SensorArray::from_positions(SensorKind::Electrode, electrodes_mesh.vertices().to_vec());
        let leadfield = analytic_leadfield(electrodes.positions(), &normal_dipoles(&cortex))?;

        let dataset = Dataset {
            cortex,
            electrodes,
            squids: None,
            electrodes_mesh,
            leadfield,
        };
        dataset.check_consistency()?;
        dataset.log_summary();
        Ok(dataset)
    }

    pub fn n_channels(&self) -> usize {
        self.leadfield.nrows()
    }

    pub fn n_dipoles(&self) -> usize {
        self.leadfield.ncols()
    }

    /// Leadfield rows must match electrodes and the topography mesh
    fn check_consistency(&self) -> MeegResult<()> {
        if self.electrodes.len() != self.n_channels() {
            return Err(MeegError::DimensionMismatch {
                operation: "leadfield rows vs EEG electrodes",
                expected: self.electrodes.len(),
                found: self.n_channels(),
            });
        }
        if self.electrodes_mesh.vertex_count() != self.n_channels() {
            return Err(MeegError::DimensionMismatch {
                operation: "leadfield rows vs EEG mesh vertices",
                expected: self.electrodes_mesh.vertex_count(),
                found: self.n_channels(),
            });
        }
        if self.cortex.vertex_count() != self.n_dipoles() {
            // Still solvable, but the estimate cannot be drawn on the cortex
            warn!(
                vertices = self.cortex.vertex_count(),
                dipoles = self.n_dipoles(),
                "cortex mesh does not have one vertex per dipole"
            );
        }
        Ok(())
    }

    fn log_summary(&self) {
        info!(
            channels = self.n_channels(),
            dipoles = self.n_dipoles(),
            cortex_vertices = self.cortex.vertex_count(),
            cortex_triangles = self.cortex.triangle_count(),
            squids = self.squids.as_ref().map_or(0, |s| s.len()),
            "dataset ready"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_synthetic_dataset_shapes() {
        let geometry = SyntheticGeometry {
            cortex_radius: 0.07,
            cortex_stacks: 6,
            cortex_slices: 8,
            sensor_radius: 0.09,
            sensor_stacks: 4,
            sensor_slices: 6,
        };
        let dataset = Dataset::synthetic(&geometry).unwrap();

        assert_eq!(dataset.n_dipoles(), 2 + 5 * 8);
        assert_eq!(dataset.n_channels(), 2 + 3 * 6);
        assert_eq!(dataset.electrodes.len(), dataset.electrodes_mesh.vertex_count());
        assert!(dataset.leadfield.iter().all(|v| v.is_finite()));
        assert!(dataset.squids.is_none());
    }

    #[test]
    fn test_missing_files_fail() {
        let paths = DataPaths::openmeeg_layout(Path::new("/nonexistent/openmeeg"));
        let err = Dataset::load(&paths).unwrap_err();
        assert!(matches!(err, MeegError::Io { .. }));
    }
}
