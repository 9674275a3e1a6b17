//! MEEG Desktop Application - minimum-norm inverse demonstration

mod app;
mod ui;

use anyhow::{bail, Context};
use app::InverseApp;
use meeg_core::SummaryRenderer;
use meeg_inverse::{InversePipeline, RunConfig};
use std::path::PathBuf;

const USAGE: &str = "usage: meeg-desktop [CONFIG.json] [--headless]";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    headless: bool,
    help: bool,
}

impl CliArgs {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut parsed = CliArgs::default();
        for arg in args {
            match arg.as_str() {
                "--headless" => parsed.headless = true,
                "-h" | "--help" => parsed.help = true,
                flag if flag.starts_with('-') => bail!("unknown option '{}'\n{}", flag, USAGE),
                path => {
                    if parsed.config.is_some() {
                        bail!("only one configuration file may be given\n{}", USAGE);
                    }
                    parsed.config = Some(PathBuf::from(path));
                }
            }
        }
        Ok(parsed)
    }
}

fn init_logging(config: &RunConfig) {
    if let Some(level) = config.log_level.as_tracing_level() {
        tracing_subscriber::fmt().with_max_level(level).init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RunConfig::synthetic(),
    };
    init_logging(&config);

    if args.headless {
        let pipeline = InversePipeline::new(config)?;
        let report = pipeline.run_configured(&mut SummaryRenderer)?;
        println!(
            "true dipole {} | estimated peak {} | relative residual {:.3e} | |x| {:.3e}",
            report.true_dipole, report.estimated_peak, report.relative_residual, report.estimate_norm
        );
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "MEEG - Minimum-norm inverse",
        options,
        Box::new(move |_cc| Ok(Box::new(InverseApp::new(config)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run native app: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_arguments() {
        let parsed = CliArgs::parse(args(&["run.json", "--headless"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("run.json")));
        assert!(parsed.headless);

        assert_eq!(CliArgs::parse(args(&[])).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_reject_bad_arguments() {
        assert!(CliArgs::parse(args(&["--verbose"])).is_err());
        assert!(CliArgs::parse(args(&["a.json", "b.json"])).is_err());
    }
}
