//! Headless run on the synthetic spherical head
//!
//! Prints the regularization path so the effect of lambda can be inspected
//! without the desktop viewer.

use meeg_core::SummaryRenderer;
use meeg_inverse::{regularization_path, Dataset, InversePipeline, RunConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RunConfig::synthetic();
    let pipeline = InversePipeline::new(config)?;
    let dataset = Dataset::from_source(&pipeline.config().data)?;
    let report = pipeline.run(&dataset, &mut SummaryRenderer)?;

    println!("=== Synthetic minimum-norm run ===");
    println!("channels: {}, dipoles: {}", report.n_channels, report.n_dipoles);
    println!("true dipole: {}, estimated peak: {}", report.true_dipole, report.estimated_peak);
    if let Some(distance) = report.localization_error {
        println!("localization error: {:.1} mm", distance * 1000.0);
    }

    println!("\n{:>10} {:>14} {:>14}", "lambda", "|Gx - m|", "|x|");
    let lambdas: Vec<f64> = (-10..=2).map(|e| 10f64.powi(e)).collect();
    for point in regularization_path(&report.measurement, &dataset.leadfield, &lambdas)? {
        println!("{:>10.0e} {:>14.4e} {:>14.4e}", point.lambda, point.residual_norm, point.solution_norm);
    }

    Ok(())
}
