//! Figure storage and drawing

use egui::Color32;
use egui_plot::{Plot, PlotPoints, Points};
use meeg_core::{Colormap, MeegResult, Mesh, PlotStyle, ScalarField, SceneRenderer, ViewAxis};
use meeg_inverse::{DisplayParams, ESTIMATE_FIGURE, TOPOGRAPHY_FIGURE};

/// Number of discrete colormap levels drawn per figure
const COLOR_LEVELS: usize = 32;

/// UI state management
#[derive(Debug)]
pub struct UIState {
    pub show_report: bool,
    pub view: ViewAxis,
    pub cull_back_faces: bool,
    pub topography_colormap: Colormap,
    pub estimate_colormap: Colormap,
    pub point_radius: f32,
    /// log10 of the regularization used on re-run
    pub lambda_exponent: f64,
    /// Re-run without regularization, ignoring the exponent
    pub lambda_zero: bool,
    pub dipole_index: usize,
}

impl UIState {
    pub fn new(display: &DisplayParams, lambda: f64, dipole_index: usize) -> Self {
        Self {
            show_report: true,
            view: display.view,
            cull_back_faces: display.cull_back_faces,
            topography_colormap: display.topography_colormap,
            estimate_colormap: display.estimate_colormap,
            point_radius: 3.0,
            lambda_exponent: if lambda > 0.0 { lambda.log10() } else { -24.0 },
            lambda_zero: lambda == 0.0,
            dipole_index,
        }
    }

    pub fn lambda(&self) -> f64 {
        if self.lambda_zero {
            0.0
        } else {
            10f64.powf(self.lambda_exponent)
        }
    }

    /// Colormap selected for `figure`, falling back to the one it was plotted with
    pub fn colormap_for(&self, figure: &Figure) -> Colormap {
        match figure.number {
            TOPOGRAPHY_FIGURE => self.topography_colormap,
            ESTIMATE_FIGURE => self.estimate_colormap,
            _ => figure.style.colormap,
        }
    }
}

/// A scalar field on a mesh, as handed over by the pipeline
pub struct Figure {
    pub number: usize,
    pub title: String,
    pub mesh: Mesh,
    pub field: ScalarField,
    pub style: PlotStyle,
}

/// Renderer that keeps figures around for the egui frame loop
#[derive(Default)]
pub struct FigureCollector {
    figures: Vec<Figure>,
}

impl FigureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.figures.clear();
    }

    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }
}

impl SceneRenderer for FigureCollector {
    fn plot(
        &mut self,
        figure: usize,
        title: &str,
        mesh: &Mesh,
        field: &ScalarField,
        style: &PlotStyle,
    ) -> MeegResult<()> {
        let entry = Figure {
            number: figure,
            title: title.to_string(),
            mesh: mesh.clone(),
            field: field.clone(),
            style: *style,
        };
        match self.figures.iter_mut().find(|f| f.number == figure) {
            Some(existing) => *existing = entry,
            None => {
                self.figures.push(entry);
                self.figures.sort_by_key(|f| f.number);
            }
        }
        Ok(())
    }
}

/// Projected vertex positions grouped by colormap level
fn bucket_vertices(
    figure: &Figure,
    colormap: Colormap,
    view: ViewAxis,
    cull_back_faces: bool,
) -> Vec<Vec<[f64; 2]>> {
    let mut buckets = vec![Vec::new(); COLOR_LEVELS];
    let vertices = figure.mesh.vertices().iter().zip(figure.mesh.normals());

    for ((vertex, normal), &value) in vertices.zip(figure.field.values()) {
        if cull_back_faces && !view.faces_viewer(normal) {
            continue;
        }
        let t = figure.field.normalize(value, colormap);
        let level = ((t * (COLOR_LEVELS - 1) as f32).round() as usize).min(COLOR_LEVELS - 1);
        buckets[level].push(view.project(vertex));
    }

    buckets
}

/// Show one figure as a colored point cloud
pub fn show_figure(ui: &mut egui::Ui, figure: &Figure, ui_state: &UIState) {
    ui.heading(format!("Figure {}: {}", figure.number, figure.title));

    let (min, max) = figure.field.range();
    ui.label(format!(
        "{} ({} vertices), range [{:.3e}, {:.3e}]",
        figure.mesh.name(),
        figure.mesh.vertex_count(),
        min,
        max
    ));

    let colormap = ui_state.colormap_for(figure);
    let buckets = bucket_vertices(figure, colormap, ui_state.view, ui_state.cull_back_faces);
    let alpha = (figure.style.opacity.clamp(0.0, 1.0) * 255.0) as u8;

    Plot::new(format!("figure_{}", figure.number))
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_zoom(true)
        .allow_drag(true)
        .show(ui, |plot_ui| {
            for (level, points) in buckets.into_iter().enumerate() {
                if points.is_empty() {
                    continue;
                }
                let t = level as f32 / (COLOR_LEVELS - 1) as f32;
                let [r, g, b] = colormap.to_rgb(t);

                plot_ui.points(
                    Points::new(PlotPoints::from(points))
                        .radius(ui_state.point_radius)
                        .filled(true)
                        .color(Color32::from_rgba_unmultiplied(r, g, b, alpha)),
                );
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figure(values: Vec<f64>) -> Figure {
        let mesh = Mesh::uv_sphere("sphere", 1.0, 4, 6).unwrap();
        let field = ScalarField::on_mesh(&mesh, values).unwrap();
        Figure {
            number: 1,
            title: "test".to_string(),
            mesh,
            field,
            style: PlotStyle {
                colormap: Colormap::BlueRed,
                ..PlotStyle::default()
            },
        }
    }

    #[test]
    fn test_collector_replaces_figures_by_number() {
        let mesh = Mesh::uv_sphere("sphere", 1.0, 3, 4).unwrap();
        let field = ScalarField::on_mesh(&mesh, vec![0.0; mesh.vertex_count()]).unwrap();
        let style = PlotStyle::default();
        let mut collector = FigureCollector::new();

        collector.plot(2, "estimate", &mesh, &field, &style).unwrap();
        collector.plot(1, "topography", &mesh, &field, &style).unwrap();
        collector.plot(2, "estimate again", &mesh, &field, &style).unwrap();

        let titles: Vec<&str> = collector.figures().iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["topography", "estimate again"]);
    }

    #[test]
    fn test_buckets_cover_visible_vertices() {
        let mesh_vertices = 2 + 3 * 6;
        let values: Vec<f64> = (0..mesh_vertices).map(|i| i as f64 - 10.0).collect();
        let figure = figure(values);

        let all: usize = bucket_vertices(&figure, Colormap::BlueRed, ViewAxis::Top, false).iter().map(Vec::len).sum();
        assert_eq!(all, mesh_vertices);

        let front: usize = bucket_vertices(&figure, Colormap::BlueRed, ViewAxis::Top, true).iter().map(Vec::len).sum();
        assert!(front < mesh_vertices);
        assert!(front > 0);
    }

    #[test]
    fn test_colormap_selection_per_figure() {
        let ui_state = UIState::new(&DisplayParams::default(), 1e-6, 0);
        let mut figure = figure(vec![0.0; 2 + 3 * 6]);

        figure.number = TOPOGRAPHY_FIGURE;
        assert_eq!(ui_state.colormap_for(&figure), Colormap::BlueRed);
        figure.number = ESTIMATE_FIGURE;
        assert_eq!(ui_state.colormap_for(&figure), Colormap::Hot);
        assert!((ui_state.lambda() - 1e-6).abs() < 1e-18);
    }

    #[test]
    fn test_zero_lambda_survives_rerun() {
        let mut ui_state = UIState::new(&DisplayParams::default(), 0.0, 0);
        assert!(ui_state.lambda_zero);
        assert_eq!(ui_state.lambda(), 0.0);

        ui_state.lambda_zero = false;
        assert!((ui_state.lambda() - 1e-24).abs() < 1e-36);
    }

    #[test]
    fn test_extremes_land_in_end_buckets() {
        let mut values = vec![0.0; 2 + 3 * 6];
        values[0] = -1.0;
        values[1] = 1.0;
        let buckets = bucket_vertices(&figure(values), Colormap::BlueRed, ViewAxis::Top, false);

        assert_eq!(buckets[0].len(), 1);
        assert_eq!(buckets[COLOR_LEVELS - 1].len(), 1);
    }
}
