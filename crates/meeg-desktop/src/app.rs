//! Main application state: runs the pipeline and shows its figures

use meeg_core::{Colormap, ViewAxis};
use meeg_inverse::{InversePipeline, RunConfig, RunReport};
use tracing::{error, info};

use crate::ui::{show_figure, FigureCollector, UIState};

/// Main application state
pub struct InverseApp {
    config: RunConfig,
    figures: FigureCollector,
    report: Option<RunReport>,
    last_error: Option<String>,
    pub ui_state: UIState,
}

impl InverseApp {
    /// Create the application and run the configured pipeline once
    pub fn new(config: RunConfig) -> Self {
        let ui_state = UIState::new(
            &config.display,
            config.inverse.lambda,
            config.simulation.dipole_index,
        );
        let mut app = Self {
            config,
            figures: FigureCollector::new(),
            report: None,
            last_error: None,
            ui_state,
        };
        app.rerun();
        app
    }

    /// Run the pipeline with the current configuration
    pub fn rerun(&mut self) {
        self.figures.clear();
        self.report = None;

        let result = InversePipeline::new(self.config.clone())
            .and_then(|pipeline| pipeline.run_configured(&mut self.figures));

        match result {
            Ok(report) => {
                self.report = Some(report);
                self.last_error = None;
            }
            Err(e) => {
                error!("run failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Apply the side panel parameters and run again
    fn apply_parameters(&mut self) {
        self.config.inverse.lambda = self.ui_state.lambda();
        self.config.simulation.dipole_index = self.ui_state.dipole_index;
        info!(
            lambda = self.config.inverse.lambda,
            dipole = self.config.simulation.dipole_index,
            "re-running with new parameters"
        );
        self.rerun();
    }

    /// Let the user pick a configuration file
    fn open_config(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Run configuration", &["json"])
            .pick_file()
        else {
            return;
        };

        match RunConfig::from_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), "configuration loaded");
                self.ui_state = UIState::new(
                    &config.display,
                    config.inverse.lambda,
                    config.simulation.dipole_index,
                );
                self.config = config;
                self.rerun();
            }
            Err(e) => {
                error!("cannot load {}: {}", path.display(), e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn show_report(&self, ui: &mut egui::Ui) {
        ui.heading("Run");
        ui.label(self.config.name.as_str());
        ui.separator();

        let Some(report) = &self.report else {
            ui.label("No result");
            return;
        };

        egui::Grid::new("report_grid").striped(true).show(ui, |ui| {
            ui.label("Channels");
            ui.label(report.n_channels.to_string());
            ui.end_row();

            ui.label("Dipoles");
            ui.label(report.n_dipoles.to_string());
            ui.end_row();

            ui.label("True dipole");
            ui.label(report.true_dipole.to_string());
            ui.end_row();

            ui.label("Estimated peak");
            ui.label(report.estimated_peak.to_string());
            ui.end_row();

            ui.label("Peak amplitude");
            ui.label(format!("{:.3e}", report.peak_amplitude));
            ui.end_row();

            ui.label("Localization error");
            ui.label(match report.localization_error {
                Some(distance) => format!("{:.1} mm", distance * 1000.0),
                None => "n/a".to_string(),
            });
            ui.end_row();

            ui.label("Relative residual");
            ui.label(format!("{:.3e}", report.relative_residual));
            ui.end_row();

            ui.label("|x|");
            ui.label(format!("{:.3e}", report.estimate_norm));
            ui.end_row();

            ui.label("Solve time");
            ui.label(format!("{:.2} ms", report.solve_time_ms));
            ui.end_row();
        });
    }

    fn show_parameters(&mut self, ui: &mut egui::Ui) {
        ui.heading("Parameters");

        ui.horizontal(|ui| {
            ui.label("log10 λ:");
            ui.add_enabled(
                !self.ui_state.lambda_zero,
                egui::Slider::new(&mut self.ui_state.lambda_exponent, -24.0..=4.0),
            );
        });
        ui.checkbox(&mut self.ui_state.lambda_zero, "λ = 0");

        let max_dipole = self.report.as_ref().map_or(0, |r| r.n_dipoles.saturating_sub(1));
        ui.horizontal(|ui| {
            ui.label("Dipole:");
            ui.add(egui::Slider::new(&mut self.ui_state.dipole_index, 0..=max_dipole));
        });

        if ui.button("Re-run").clicked() {
            self.apply_parameters();
        }
    }
}

fn colormap_combo(ui: &mut egui::Ui, id: &str, label: &str, colormap: &mut Colormap) {
    ui.label(format!("{}:", label));
    egui::ComboBox::from_id_source(id)
        .selected_text(format!("{:?}", colormap))
        .show_ui(ui, |ui| {
            ui.selectable_value(colormap, Colormap::BlueRed, "BlueRed");
            ui.selectable_value(colormap, Colormap::Hot, "Hot");
        });
}

impl eframe::App for InverseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open config…").clicked() {
                    self.open_config();
                }
                if ui.button("Re-run").clicked() {
                    self.rerun();
                }

                ui.separator();

                ui.label("View:");
                egui::ComboBox::from_id_source("view_axis")
                    .selected_text(format!("{:?}", self.ui_state.view))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.ui_state.view, ViewAxis::Top, "Top");
                        ui.selectable_value(&mut self.ui_state.view, ViewAxis::Front, "Front");
                        ui.selectable_value(&mut self.ui_state.view, ViewAxis::Side, "Side");
                    });
                colormap_combo(ui, "topography_colormap", "Topography", &mut self.ui_state.topography_colormap);
                colormap_combo(ui, "estimate_colormap", "Estimate", &mut self.ui_state.estimate_colormap);
                ui.checkbox(&mut self.ui_state.cull_back_faces, "Hide back");
                ui.add(egui::Slider::new(&mut self.ui_state.point_radius, 1.0..=8.0).text("point size"));

                ui.separator();
                ui.checkbox(&mut self.ui_state.show_report, "Report");
            });
        });

        if self.ui_state.show_report {
            egui::SidePanel::left("report_panel")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    self.show_report(ui);
                    ui.separator();
                    self.show_parameters(ui);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(message) = &self.last_error {
                ui.colored_label(egui::Color32::from_rgb(255, 100, 100), message.as_str());
                ui.separator();
            }

            let figures = self.figures.figures();
            if figures.is_empty() {
                ui.label("Nothing to display");
                return;
            }

            let ui_state = &self.ui_state;
            ui.columns(figures.len(), |columns| {
                for (column, figure) in columns.iter_mut().zip(figures) {
                    show_figure(column, figure, ui_state);
                }
            });
        });
    }
}
