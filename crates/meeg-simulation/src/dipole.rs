//! Current dipoles in an infinite homogeneous medium
//!
//! Used to build analytic leadfields for synthetic datasets when no
//! precomputed forward operator is available.

use meeg_core::{MeegError, MeegResult, Mesh};
use nalgebra::{DMatrix, Vector3};

/// Point current source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dipole {
    pub position: Vector3<f64>,
    pub moment: Vector3<f64>,
}

impl Dipole {
    pub fn new(position: Vector3<f64>, moment: Vector3<f64>) -> Self {
        Self { position, moment }
    }

    /// Potential at `r` (unit conductivity, constant factors dropped):
    /// `V = q . (r - r0) / |r - r0|^3`
    pub fn potential(&self, r: &Vector3<f64>) -> f64 {
        let x = r - self.position;
        let nrm2 = x.norm_squared();
        self.moment.dot(&x) / (nrm2 * nrm2.sqrt())
    }
}

/// Unit dipoles sitting on mesh vertices, oriented along the vertex normals
pub fn normal_dipoles(mesh: &Mesh) -> Vec<Dipole> {
    mesh.vertices()
        .iter()
        .zip(mesh.normals())
        .map(|(position, normal)| Dipole::new(*position, *normal))
        .collect()
}

/// Leadfield with `G[i, j]` = potential of source `j` at sensor `i`
pub fn analytic_leadfield(sensors: &[Vector3<f64>], sources: &[Dipole]) -> MeegResult<DMatrix<f64>> {
    let mut leadfield = DMatrix::zeros(sensors.len(), sources.len());

    for (j, dipole) in sources.iter().enumerate() {
        for (i, sensor) in sensors.iter().enumerate() {
            let value = dipole.potential(sensor);
            if !value.is_finite() {
                return Err(MeegError::Simulation {
                    message: format!("sensor {} coincides with source {}", i, j),
                });
            }
            leadfield[(i, j)] = value;
        }
    }

    Ok(leadfield)
}
