//! Matrix and coordinate table loading
//!
//! Two on-disk layouts are understood: whitespace separated text tables
//! (one row per line) and JSON containers holding named matrices.

use crate::error::{MeegError, MeegResult};
use crate::format_error;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Key under which forward operators are conventionally stored
pub const DEFAULT_MATRIX_KEY: &str = "linop";

/// On-disk matrix layout, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixFormat {
    /// Whitespace separated rows
    Text,
    /// JSON object of named [`MatrixRecord`]s
    KeyedJson,
}

impl MatrixFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => MatrixFormat::KeyedJson,
            _ => MatrixFormat::Text,
        }
    }
}

/// Serialized dense matrix, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl MatrixRecord {
    pub fn from_matrix(matrix: &DMatrix<f64>) -> Self {
        let mut data = Vec::with_capacity(matrix.len());
        for row in matrix.row_iter() {
            data.extend(row.iter().copied());
        }
        Self {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
            data,
        }
    }

    pub fn into_matrix(self, source: &str) -> MeegResult<DMatrix<f64>> {
        let len = self.rows.checked_mul(self.cols).ok_or_else(|| {
            format_error!(source, None, "matrix dimensions {}x{} overflow", self.rows, self.cols)
        })?;
        if self.data.len() != len {
            return Err(format_error!(
                source,
                None,
                "matrix declares {}x{} but holds {} values",
                self.rows,
                self.cols,
                self.data.len()
            ));
        }
        Ok(DMatrix::from_row_slice(self.rows, self.cols, &self.data))
    }
}

/// Read a whole file, mapping failures to [`MeegError::Io`]
pub fn read_file(path: &Path) -> MeegResult<String> {
    std::fs::read_to_string(path).map_err(|e| MeegError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parse a whitespace separated numeric table.
///
/// Blank lines and lines starting with `#` or `%` are skipped. All rows must
/// have the same number of columns.
pub fn parse_text_matrix(text: &str, source: &str) -> MeegResult<DMatrix<f64>> {
    let mut data = Vec::new();
    let mut cols: Option<usize> = None;
    let mut rows = 0;

    for (line_idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
            continue;
        }

        let before = data.len();
        for token in trimmed.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| {
                format_error!(source, Some(line_idx + 1), "'{}' is not a number", token)
            })?;
            data.push(value);
        }
        let width = data.len() - before;

        match cols {
            None => cols = Some(width),
            Some(expected) if expected != width => {
                return Err(format_error!(
                    source,
                    Some(line_idx + 1),
                    "expected {} columns, found {}",
                    expected,
                    width
                ));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let cols = cols.ok_or_else(|| format_error!(source, None, "no numeric rows"))?;
    Ok(DMatrix::from_row_slice(rows, cols, &data))
}

/// Parse a JSON container and extract the matrix stored under `key`
pub fn parse_keyed_matrix(json: &str, key: &str, source: &str) -> MeegResult<DMatrix<f64>> {
    let mut container: BTreeMap<String, MatrixRecord> = serde_json::from_str(json)
        .map_err(|e| format_error!(source, Some(e.line()), "{}", e))?;

    match container.remove(key) {
        Some(record) => record.into_matrix(source),
        None => Err(MeegError::MissingKey {
            key: key.to_string(),
            available: container.into_keys().collect(),
        }),
    }
}

/// Load a plain text table such as a sensor coordinate file
pub fn load_text_matrix(path: &Path) -> MeegResult<DMatrix<f64>> {
    let text = read_file(path)?;
    parse_text_matrix(&text, &path.display().to_string())
}

/// Load a matrix, selecting the format from the extension.
///
/// `key` only applies to keyed containers.
pub fn load_matrix(path: &Path, key: &str) -> MeegResult<DMatrix<f64>> {
    let text = read_file(path)?;
    let source = path.display().to_string();
    let format = MatrixFormat::from_path(path);
    debug!(path = %source, ?format, "loading matrix");

    let matrix = match format {
        MatrixFormat::KeyedJson => parse_keyed_matrix(&text, key, &source)?,
        MatrixFormat::Text => parse_text_matrix(&text, &source)?,
    };

    debug!(rows = matrix.nrows(), cols = matrix.ncols(), "matrix loaded");
    Ok(matrix)
}
