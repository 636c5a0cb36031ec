use anyhow::bail;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use ustcore::RawFrame;

/// Configuration for synthesizing a uniformly shifted frame pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub beams: usize,
    pub depth: usize,
    pub cycles: f64,
    pub amplitude: f64,
    pub noise: f64,
    pub shift: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            beams: 64,
            depth: 256,
            cycles: 6.0,
            amplitude: 12_000.0,
            noise: 0.01,
            shift: 0.35,
            seed: 0,
        }
    }
}

/// Builds a sinusoidal frame and the same signal sampled with a constant
/// sub-sample axial shift, quantized to the raw sample type. The pair
/// exercises the full pipeline with a known motion direction.
pub fn build_frame_pair(config: &GeneratorConfig) -> anyhow::Result<(RawFrame, RawFrame)> {
    if config.beams == 0 || config.depth == 0 {
        bail!("generator dimensions must be non-zero");
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut first = RawFrame::zeros((config.beams, config.depth));
    let mut second = RawFrame::zeros((config.beams, config.depth));

    for i in 0..config.beams {
        let beam_phase = i as f64 * 0.1;
        for j in 0..config.depth {
            first[[i, j]] = sample(config, &mut rng, beam_phase, j as f64);
            second[[i, j]] = sample(config, &mut rng, beam_phase, j as f64 - config.shift);
        }
    }
    Ok((first, second))
}

fn sample(config: &GeneratorConfig, rng: &mut StdRng, beam_phase: f64, position: f64) -> i16 {
    let phase = 2.0 * PI * config.cycles * position / config.depth as f64 + beam_phase;
    let envelope = 0.4 + 0.6 * (1.0 - position.max(0.0) / config.depth as f64);
    let jitter = if config.noise > 0.0 {
        rng.gen_range(-config.noise..config.noise) * config.amplitude
    } else {
        0.0
    };
    (config.amplitude * envelope * phase.sin() + jitter).round() as i16
}
