use crate::monitor::MonitorSet;
use crate::recorder::{CoordinateGrid, ZoneRecorder};
use crate::workflow::config::ProcessorConfig;
use anyhow::Context;
use log::warn;
use std::fs;
use std::path::Path;
use ustcore::telemetry::MetricsRecorder;
use ustcore::{DisplacementEngine, Field, FilterChain, RawFrame};

/// Name of the strain field as recorded and monitored.
pub const STRAIN_FIELD: &str = "epsilon";

/// Per-step outcome surfaced to the driver's log line.
pub struct StepSummary {
    pub step: usize,
    pub non_finite: usize,
    pub mean_strain: f64,
}

/// Owns the engine, the filter chain, and the output collaborators for one
/// processing run. The displacement and strain fields are allocated once
/// and reused in place every step; strain accumulates across steps.
pub struct Runner {
    engine: DisplacementEngine,
    chain: FilterChain,
    displacement: Field,
    strain: Field,
    coords: CoordinateGrid,
    recorder: Option<ZoneRecorder>,
    monitor: Option<MonitorSet>,
    metrics: MetricsRecorder,
    step: usize,
}

impl Runner {
    pub fn new(config: &ProcessorConfig, output_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;

        let engine = DisplacementEngine::new(config.engine_config())
            .context("constructing displacement engine")?;
        let chain = FilterChain::new(&config.filter);
        let coords = CoordinateGrid::new(config.beams, config.depth, config.area);
        let metrics = MetricsRecorder::new();

        // Recorder and probe failures stay local to the collaborator: a
        // run without outputs still exercises the numeric pipeline.
        let recorder = match ZoneRecorder::create(
            &output_dir.join(format!("{}.plt", STRAIN_FIELD)),
            &["x", "z", STRAIN_FIELD],
            config.beams,
            config.depth,
        ) {
            Ok(recorder) => Some(recorder),
            Err(err) => {
                warn!("zone recorder unavailable: {:#}", err);
                metrics.record_collaborator_error();
                None
            }
        };
        let monitor = match &config.monitoring_config {
            Some(path) => match MonitorSet::load(
                path,
                config.beams,
                config.depth,
                config.area,
                output_dir,
                &[STRAIN_FIELD],
            ) {
                Ok(set) => Some(set),
                Err(err) => {
                    warn!("monitoring unavailable: {:#}", err);
                    metrics.record_collaborator_error();
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            engine,
            chain,
            displacement: Field::zeros((config.beams, config.depth)),
            strain: Field::zeros((config.beams, config.depth)),
            coords,
            recorder,
            monitor,
            metrics,
            step: 0,
        })
    }

    /// Runs one frame pair through the engine and filter chain, then hands
    /// the strain field to the probe and recorder collaborators.
    pub fn process_step(
        &mut self,
        first: &RawFrame,
        second: &RawFrame,
    ) -> anyhow::Result<StepSummary> {
        self.step += 1;
        self.engine
            .estimate(first, second, &mut self.displacement)
            .context("estimating displacement")?;
        self.chain.run(&mut self.displacement, &mut self.strain);

        let label = self.step.to_string();
        if let Some(monitor) = self.monitor.as_mut() {
            if let Err(err) = monitor.process(STRAIN_FIELD, &self.strain, &label) {
                warn!("monitoring step {} failed: {:#}", label, err);
                self.metrics.record_collaborator_error();
            }
        }
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(err) = recorder.write_zone(&self.coords, &[&self.strain]) {
                warn!("recording step {} failed: {:#}", label, err);
                self.metrics.record_collaborator_error();
            }
        }
        self.metrics.record_step();

        let non_finite = self
            .displacement
            .iter()
            .filter(|value| !value.is_finite())
            .count();
        let (sum, count) = self
            .strain
            .iter()
            .filter(|value| value.is_finite())
            .fold((0.0, 0usize), |(sum, count), &value| (sum + value, count + 1));
        Ok(StepSummary {
            step: self.step,
            non_finite,
            mean_strain: if count > 0 { sum / count as f64 } else { 0.0 },
        })
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn recorded_zones(&self) -> usize {
        self.recorder
            .as_ref()
            .map(ZoneRecorder::zones_written)
            .unwrap_or(0)
    }

    pub fn finish(self) -> anyhow::Result<()> {
        if let Some(recorder) = self.recorder {
            recorder.finish()?;
        }
        Ok(())
    }
}
