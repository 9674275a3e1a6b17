//! Regularized minimum-norm source estimation
//!
//! `x = G^T (G G^T + lambda I)^-1 m`, solved with one dense LU
//! factorization of the n_channels x n_channels Gram matrix.

use meeg_core::{MeegError, MeegResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Core trait for inverse solvers
pub trait InverseSolver {
    /// Estimate source activity from `measurement` through `leadfield`
    fn solve(&self, leadfield: &DMatrix<f64>, measurement: &DVector<f64>) -> MeegResult<SourceEstimate>;

    /// Get solver name/identifier
    fn name(&self) -> &str;
}

/// Estimated source activity
#[derive(Debug, Clone)]
pub struct SourceEstimate {
    /// One value per dipole
    pub activation: DVector<f64>,
    /// Dipole with the largest absolute activation
    pub peak_index: usize,
    pub peak_amplitude: f64,
    /// Euclidean norm of the activation
    pub norm: f64,
}

impl SourceEstimate {
    pub fn from_activation(activation: DVector<f64>) -> Self {
        let (peak_index, peak_amplitude) = activation
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
            .unwrap_or((0, 0.0));
        let norm = activation.norm();

        Self {
            activation,
            peak_index,
            peak_amplitude,
            norm,
        }
    }
}

/// Tikhonov-regularized minimum-norm solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinimumNorm {
    /// Regularization parameter, >= 0
    pub lambda: f64,
}

impl MinimumNorm {
    pub fn new(lambda: f64) -> MeegResult<Self> {
        check_lambda(lambda)?;
        Ok(Self { lambda })
    }
}

impl InverseSolver for MinimumNorm {
    fn solve(&self, leadfield: &DMatrix<f64>, measurement: &DVector<f64>) -> MeegResult<SourceEstimate> {
        let activation = minimum_norm(measurement, leadfield, self.lambda)?;
        Ok(SourceEstimate::from_activation(activation))
    }

    fn name(&self) -> &str {
        "minimum_norm"
    }
}

fn check_lambda(lambda: f64) -> MeegResult<()> {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(MeegError::InvalidConfig {
            reason: format!("regularization lambda must be finite and >= 0, got {}", lambda),
        });
    }
    Ok(())
}

/// Compute basic minimum-norm solution
/// `x = G^T (G G^T + lambda I)^-1 m`
///
/// Fails with [`MeegError::DimensionMismatch`] when `m` does not have one
/// entry per row of `G`, and with [`MeegError::SingularMatrix`] when the
/// regularized Gram matrix cannot be inverted.
pub fn minimum_norm(m: &DVector<f64>, g: &DMatrix<f64>, lambda: f64) -> MeegResult<DVector<f64>> {
    check_lambda(lambda)?;

    let n_channels = g.nrows();
    if m.len() != n_channels {
        return Err(MeegError::DimensionMismatch {
            operation: "minimum_norm",
            expected: n_channels,
            found: m.len(),
        });
    }

    let mut gram = g * g.transpose();
    for i in 0..n_channels {
        gram[(i, i)] += lambda;
    }

    let lu = gram.lu();
    let pivots = lu.u().diagonal();
    let (min_pivot, max_pivot) = (pivots.amin(), pivots.amax());
    if max_pivot > 0.0 && min_pivot / max_pivot < f64::EPSILON {
        warn!(
            size = n_channels,
            lambda,
            pivot_ratio = min_pivot / max_pivot,
            "regularized Gram matrix is close to singular"
        );
    }

    let y = lu.solve(m).ok_or(MeegError::SingularMatrix {
        size: n_channels,
        reason: "zero pivot in LU factorization",
    })?;
    if y.iter().any(|v| !v.is_finite()) {
        return Err(MeegError::SingularMatrix {
            size: n_channels,
            reason: "solution is not finite",
        });
    }

    let x = g.tr_mul(&y);
    debug!(channels = n_channels, dipoles = g.ncols(), lambda, norm = x.norm(), "minimum norm solved");
    Ok(x)
}

/// One point of an L-curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularizationPoint {
    pub lambda: f64,
    /// `|G x - m|`
    pub residual_norm: f64,
    /// `|x|`
    pub solution_norm: f64,
}

/// Solve for every lambda in `lambdas`, in order
pub fn regularization_path(
    m: &DVector<f64>,
    g: &DMatrix<f64>,
    lambdas: &[f64],
) -> MeegResult<Vec<RegularizationPoint>> {
    lambdas
        .iter()
        .map(|&lambda| -> MeegResult<RegularizationPoint> {
            let x = minimum_norm(m, g, lambda)?;
            Ok(RegularizationPoint {
                lambda,
                residual_norm: (g * &x - m).norm(),
                solution_norm: x.norm(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3 channels x 5 dipoles, full row rank
    fn wide_leadfield() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 5, &[
            1.0, 0.5, 0.0, 2.0, 0.1,
            0.0, 1.0, 1.5, 0.3, 0.7,
            0.4, 0.0, 1.0, 1.0, 2.0,
        ])
    }

    #[test]
    fn test_exact_fit_without_regularization() {
        let g = wide_leadfield();
        let x_simu = DVector::from_vec(vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        let m = &g * &x_simu;

        let x = minimum_norm(&m, &g, 0.0).unwrap();

        assert_eq!(x.len(), 5);
        let residual = (&g * &x - &m).norm();
        assert!(residual < 1e-10, "residual {}", residual);
    }

    #[test]
    fn test_recovers_sparse_source_tall_leadfield() {
        let g = DMatrix::from_row_slice(4, 3, &[
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 1.0,
            1.0, 1.0, 1.0,
        ]);
        let x_simu = DVector::from_vec(vec![0.0, 1.0, 0.0]);
        let m = &g * &x_simu;

        let x = minimum_norm(&m, &g, 1e-10).unwrap();

        for (estimate, truth) in x.iter().zip(x_simu.iter()) {
            assert!((estimate - truth).abs() < 1e-6, "{} vs {}", estimate, truth);
        }
    }

    #[test]
    fn test_norm_shrinks_as_lambda_grows() {
        let g = wide_leadfield();
        let m = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let lambdas = [0.0, 1e-4, 1e-2, 0.1, 1.0, 10.0, 1000.0];

        let path = regularization_path(&m, &g, &lambdas).unwrap();

        assert_eq!(path.len(), lambdas.len());
        for pair in path.windows(2) {
            assert!(pair[1].solution_norm <= pair[0].solution_norm * (1.0 + 1e-12));
            assert!(pair[1].residual_norm >= pair[0].residual_norm - 1e-12);
        }
    }

    #[test]
    fn test_measurement_length_mismatch() {
        let g = wide_leadfield();
        let m = DVector::from_vec(vec![1.0, 2.0]);

        let err = minimum_norm(&m, &g, 1.0).unwrap_err();
        assert_eq!(
            err,
            MeegError::DimensionMismatch { operation: "minimum_norm", expected: 3, found: 2 }
        );
    }

    #[test]
    fn test_deterministic() {
        let g = wide_leadfield();
        let m = DVector::from_vec(vec![0.3, 0.2, -0.1]);

        let first = minimum_norm(&m, &g, 0.05).unwrap();
        let second = minimum_norm(&m, &g, 0.05).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_singular_gram_matrix_reported() {
        let g = DMatrix::from_row_slice(2, 3, &[
            1.0, 2.0, 3.0,
            0.0, 0.0, 0.0,
        ]);
        let m = DVector::from_vec(vec![1.0, 0.0]);

        let err = minimum_norm(&m, &g, 0.0).unwrap_err();
        assert!(matches!(err, MeegError::SingularMatrix { size: 2, .. }));

        // Any positive lambda makes the same system solvable
        assert!(minimum_norm(&m, &g, 1e-3).is_ok());
    }

    #[test]
    fn test_invalid_lambda() {
        let g = wide_leadfield();
        let m = DVector::zeros(3);
        assert!(matches!(minimum_norm(&m, &g, -1.0), Err(MeegError::InvalidConfig { .. })));
        assert!(matches!(minimum_norm(&m, &g, f64::NAN), Err(MeegError::InvalidConfig { .. })));
        assert!(MinimumNorm::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_solver_trait_reports_peak() {
        let g = DMatrix::identity(3, 3);
        let m = DVector::from_vec(vec![0.1, -0.9, 0.2]);
        let solver = MinimumNorm::new(0.0).unwrap();

        let estimate = solver.solve(&g, &m).unwrap();

        assert_eq!(solver.name(), "minimum_norm");
        assert_eq!(estimate.peak_index, 1);
        assert!((estimate.peak_amplitude + 0.9).abs() < 1e-12);
        assert!((estimate.norm - m.norm()).abs() < 1e-12);
    }
}
