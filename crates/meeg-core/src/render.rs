//! Rendering seam: scalar fields on meshes, colormaps and projections
//!
//! Rendering backends implement [`SceneRenderer`]. The pipeline only ever
//! hands them a mesh together with a per-vertex field.

use crate::error::{MeegError, MeegResult};
use crate::mesh::Mesh;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One value per mesh vertex
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    values: Vec<f64>,
}

impl ScalarField {
    /// Attach `values` to `mesh`, one per vertex
    pub fn on_mesh(mesh: &Mesh, values: Vec<f64>) -> MeegResult<Self> {
        if values.len() != mesh.vertex_count() {
            return Err(MeegError::DimensionMismatch {
                operation: "scalar field on mesh",
                expected: mesh.vertex_count(),
                found: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (min, max) over finite values
    pub fn range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo > hi {
            (0.0, 0.0)
        } else {
            (lo, hi)
        }
    }

    /// Largest absolute value
    pub fn max_abs(&self) -> f64 {
        let (lo, hi) = self.range();
        lo.abs().max(hi.abs())
    }

    /// Index and value of the largest absolute entry
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
    }

    /// Map a value into [0, 1] for `colormap`.
    ///
    /// Diverging maps are centred on zero so that sign is preserved.
    pub fn normalize(&self, value: f64, colormap: Colormap) -> f32 {
        let t = if colormap.is_diverging() {
            let scale = self.max_abs();
            if scale == 0.0 {
                0.5
            } else {
                0.5 + 0.5 * value / scale
            }
        } else {
            let (lo, hi) = self.range();
            if hi > lo {
                (value - lo) / (hi - lo)
            } else {
                0.5
            }
        };
        t.clamp(0.0, 1.0) as f32
    }
}

/// Color schemes for scalar fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colormap {
    /// Blue (negative) through white to red (positive)
    BlueRed,
    /// Black through red and yellow to white
    Hot,
}

impl Default for Colormap {
    fn default() -> Self {
        Self::BlueRed
    }
}

impl Colormap {
    pub fn is_diverging(&self) -> bool {
        matches!(self, Colormap::BlueRed)
    }

    /// Convert a normalized value (0-1) to RGB
    pub fn to_rgb(&self, value: f32) -> [u8; 3] {
        let v = value.clamp(0.0, 1.0);

        match self {
            Colormap::BlueRed => {
                if v < 0.5 {
                    let t = v * 2.0;
                    [(t * 255.0) as u8, (t * 255.0) as u8, 255]
                } else {
                    let t = (v - 0.5) * 2.0;
                    [255, ((1.0 - t) * 255.0) as u8, ((1.0 - t) * 255.0) as u8]
                }
            }
            Colormap::Hot => {
                let r = (v * 3.0).min(1.0);
                let g = (v * 3.0 - 1.0).clamp(0.0, 1.0);
                let b = (v * 3.0 - 2.0).clamp(0.0, 1.0);
                [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
            }
        }
    }
}

/// Orthographic viewing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewAxis {
    /// Looking down the z axis
    Top,
    /// Looking along the y axis
    Front,
    /// Looking along the x axis
    Side,
}

impl Default for ViewAxis {
    fn default() -> Self {
        Self::Top
    }
}

impl ViewAxis {
    /// Project onto the view plane
    pub fn project(&self, v: &Vector3<f64>) -> [f64; 2] {
        match self {
            ViewAxis::Top => [v.x, v.y],
            ViewAxis::Front => [v.x, v.z],
            ViewAxis::Side => [v.y, v.z],
        }
    }

    /// Unit vector pointing from the scene towards the viewer
    pub fn towards_viewer(&self) -> Vector3<f64> {
        match self {
            ViewAxis::Top => Vector3::z(),
            ViewAxis::Front => -Vector3::y(),
            ViewAxis::Side => Vector3::x(),
        }
    }

    /// Whether a vertex with `normal` faces the viewer
    pub fn faces_viewer(&self, normal: &Vector3<f64>) -> bool {
        normal.dot(&self.towards_viewer()) >= 0.0
    }
}

/// Display options for a figure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotStyle {
    /// 0.0 transparent, 1.0 opaque
    pub opacity: f32,
    pub colormap: Colormap,
    pub view: ViewAxis,
    /// Hide vertices whose normal points away from the viewer
    pub cull_back_faces: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            colormap: Colormap::BlueRed,
            view: ViewAxis::Top,
            cull_back_faces: true,
        }
    }
}

/// Something that can display a scalar field on a mesh
pub trait SceneRenderer {
    /// Show `field` on `mesh` in figure number `figure`, replacing its content
    fn plot(
        &mut self,
        figure: usize,
        title: &str,
        mesh: &Mesh,
        field: &ScalarField,
        style: &PlotStyle,
    ) -> MeegResult<()>;
}

/// Renderer that draws nothing and remembers what it was asked to plot
#[derive(Debug, Default)]
pub struct NullRenderer {
    plotted: Vec<(usize, String)>,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (figure, title) of every plot call, in order
    pub fn plotted(&self) -> &[(usize, String)] {
        &self.plotted
    }
}

impl SceneRenderer for NullRenderer {
    fn plot(
        &mut self,
        figure: usize,
        title: &str,
        _mesh: &Mesh,
        _field: &ScalarField,
        _style: &PlotStyle,
    ) -> MeegResult<()> {
        self.plotted.push((figure, title.to_string()));
        Ok(())
    }
}

/// Headless renderer that logs field statistics
#[derive(Debug, Default)]
pub struct SummaryRenderer;

impl SceneRenderer for SummaryRenderer {
    fn plot(
        &mut self,
        figure: usize,
        title: &str,
        mesh: &Mesh,
        field: &ScalarField,
        _style: &PlotStyle,
    ) -> MeegResult<()> {
        let (min, max) = field.range();
        let (peak_index, peak_value) = field.peak().unwrap_or((0, 0.0));
        let peak_position = mesh
            .vertices()
            .get(peak_index)
            .copied()
            .unwrap_or_else(Vector3::zeros);

        info!(
            figure,
            title,
            mesh = mesh.name(),
            min,
            max,
            peak_index,
            peak_value,
            peak_x = peak_position.x,
            peak_y = peak_position.y,
            peak_z = peak_position.z,
            "figure"
        );
        Ok(())
    }
}
