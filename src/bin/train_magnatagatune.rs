//! Train the default tagger on MagnaTagATune spectrograms.
//!
//! Settings come from `TrainConfig::default()`, overridden by the TOML file
//! named in `TAGTUNE_CONFIG` when it is set.

use std::env;
use std::path::PathBuf;
use tagtune::engine::burn::tensor::backend::AutodiffBackend;
use tagtune::{EpochCallback, EpochReport, Result, SpotifyTrainer, TrainConfig, TrainingDevice};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "TAGTUNE_CONFIG";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!("Loading config from {}", path.display());
            TrainConfig::from_toml_file(&path)?
        }
        None => TrainConfig::default(),
    };

    let device = TrainingDevice::select(config.device);
    tracing::info!("Training on {}", device.name());

    match device {
        TrainingDevice::Cpu(device) => run::<tagtune::CpuBackend>(config, device),
        #[cfg(feature = "wgpu")]
        TrainingDevice::Gpu { device, .. } => run::<tagtune::GpuBackend>(config, device),
    }
}

fn run<B: AutodiffBackend>(config: TrainConfig, device: B::Device) -> Result<()> {
    let mut trainer = SpotifyTrainer::<B>::spotify(config, device)?;
    trainer.fit_with(&mut ConsoleReport)?;
    tracing::info!("Training finished");
    Ok(())
}

/// Epoch progress on stdout.
struct ConsoleReport;

impl EpochCallback for ConsoleReport {
    fn on_epoch_begin(&mut self, epoch: usize, epochs: usize) {
        println!("Epoch {} / {}", epoch, epochs);
    }

    fn on_epoch_end(&mut self, report: &EpochReport) {
        println!("  Train accuracy: {:.6}", report.train_accuracy);
        println!("  Val accuracy: {:.6}", report.val_accuracy);
        println!();
    }
}
