//! Sensor coordinate tables (EEG electrodes, MEG squids)

use crate::error::{MeegError, MeegResult};
use crate::matrix_io::load_text_matrix;
use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Kind of sensor described by a coordinate table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    /// EEG electrode: position only
    Electrode,
    /// MEG gradiometer/magnetometer coil: position and orientation
    Squid,
}

impl SensorKind {
    pub fn label(&self) -> &'static str {
        match self {
            SensorKind::Electrode => "EEG electrodes",
            SensorKind::Squid => "MEG squids",
        }
    }
}

/// Ordered set of sensors, one per table row
#[derive(Debug, Clone)]
pub struct SensorArray {
    kind: SensorKind,
    positions: Vec<Vector3<f64>>,
    orientations: Option<Vec<Vector3<f64>>>,
}

impl SensorArray {
    /// Build from a coordinate table.
    ///
    /// Columns 0..3 are positions. Columns 3..6, when present, are
    /// orientations; squids require them.
    pub fn from_table(kind: SensorKind, table: &DMatrix<f64>) -> MeegResult<Self> {
        let required = match kind {
            SensorKind::Electrode => 3,
            SensorKind::Squid => 6,
        };
        if table.ncols() < required {
            return Err(MeegError::DimensionMismatch {
                operation: "sensor coordinate table",
                expected: required,
                found: table.ncols(),
            });
        }

        let positions = table
            .row_iter()
            .map(|row| Vector3::new(row[0], row[1], row[2]))
            .collect();
        let orientations = (table.ncols() >= 6).then(|| {
            table
                .row_iter()
                .map(|row| Vector3::new(row[3], row[4], row[5]))
                .collect()
        });

        Ok(Self {
            kind,
            positions,
            orientations,
        })
    }

    /// Build directly from positions
    pub fn from_positions(kind: SensorKind, positions: Vec<Vector3<f64>>) -> Self {
        Self {
            kind,
            positions,
            orientations: None,
        }
    }

    /// Load a plain text coordinate file
    pub fn load(kind: SensorKind, path: &Path) -> MeegResult<Self> {
        let table = load_text_matrix(path)?;
        let sensors = Self::from_table(kind, &table)?;
        debug!(kind = kind.label(), count = sensors.len(), "sensors loaded");
        Ok(sensors)
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn orientations(&self) -> Option<&[Vector3<f64>]> {
        self.orientations.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_electrodes_from_table() {
        let table = DMatrix::from_row_slice(2, 3, &[0.0, 0.0, 0.09, 0.09, 0.0, 0.0]);
        let sensors = SensorArray::from_table(SensorKind::Electrode, &table).unwrap();

        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors.positions()[1], Vector3::new(0.09, 0.0, 0.0));
        assert!(sensors.orientations().is_none());
    }

    #[test]
    fn test_squids_need_orientation() {
        let table = DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 0.12]);
        assert!(SensorArray::from_table(SensorKind::Squid, &table).is_err());

        let table = DMatrix::from_row_slice(1, 6, &[0.0, 0.0, 0.12, 0.0, 0.0, 1.0]);
        let squids = SensorArray::from_table(SensorKind::Squid, &table).unwrap();
        assert_eq!(squids.orientations().unwrap()[0], Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_too_few_columns() {
        let table = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let err = SensorArray::from_table(SensorKind::Electrode, &table).unwrap_err();
        assert!(matches!(err, MeegError::DimensionMismatch { expected: 3, found: 2, .. }));
    }
}
