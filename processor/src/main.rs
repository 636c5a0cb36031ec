use anyhow::{bail, Context};
use clap::Parser;
use frames::FramePairer;
use generator::GeneratorConfig;
use log::info;
use std::path::{Path, PathBuf};
use workflow::config::ProcessorConfig;
use workflow::runner::Runner;

mod frames;
mod generator;
mod monitor;
mod recorder;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Phase-correlation tissue-strain processing driver")]
struct Args {
    /// Load a processing config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory containing .raw frame files (overrides the config)
    #[arg(long)]
    raw_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 64)]
    beams: usize,
    #[arg(long, default_value_t = 1024)]
    depth: usize,
    /// Keep every Nth frame when forming pairs
    #[arg(long, default_value_t = 1)]
    skip: usize,
    /// Output directory for zone and monitoring streams
    #[arg(long, default_value = "output")]
    output: PathBuf,
    /// Run a single synthetic frame pair and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        ProcessorConfig::load(path)?
    } else {
        ProcessorConfig::from_args(args.beams, args.depth, args.skip)
    };
    if let Some(dir) = args.raw_dir {
        config.raw_dir = Some(dir);
    }

    if args.offline {
        run_offline(&config, &args.output)
    } else {
        run_directory(&config, &args.output)
    }
}

fn run_offline(config: &ProcessorConfig, output: &Path) -> anyhow::Result<()> {
    let generator_config = GeneratorConfig {
        beams: config.beams,
        depth: config.depth,
        ..GeneratorConfig::default()
    };
    let (first, second) = generator::build_frame_pair(&generator_config)?;
    let mut runner = Runner::new(config, output)?;
    let summary = runner.process_step(&first, &second)?;

    println!(
        "Offline run -> step {}, non-finite {}, mean strain {:.6}",
        summary.step, summary.non_finite, summary.mean_strain
    );
    runner.finish()
}

fn run_directory(config: &ProcessorConfig, output: &Path) -> anyhow::Result<()> {
    let raw_dir = config
        .raw_dir
        .as_ref()
        .context("no raw frame directory configured (set raw_dir or pass --raw-dir)")?;
    let files = frames::scan_raw_files(raw_dir)?;
    if files.is_empty() {
        bail!(
            "no .{} frames found in {}",
            frames::RAW_EXTENSION,
            raw_dir.display()
        );
    }

    let mut runner = Runner::new(config, output)?;
    let mut pairer = FramePairer::new(config.skip);
    for path in &files {
        if !pairer.admit() {
            continue;
        }
        let frame = frames::read_raw_frame(path, config.beams, config.depth)?;
        if let Some((first, second)) = pairer.push(frame) {
            let summary = runner.process_step(&first, &second)?;
            info!(
                "step {}: file {}, non-finite {}, mean strain {:.6}",
                summary.step,
                path.display(),
                summary.non_finite,
                summary.mean_strain
            );
        }
    }

    let (steps, collaborator_errors) = runner.metrics().snapshot();
    info!(
        "processed {} frame pairs ({} collaborator errors)",
        steps, collaborator_errors
    );
    runner.finish()
}
