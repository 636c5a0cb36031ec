use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Raw beam-sampled amplitude frame, `beams x depth`, row per beam.
pub type RawFrame = Array2<i16>;

/// Complex analytic field with the same layout as the raw frames.
pub type AnalyticField = Array2<Complex64>;

/// Real-valued field used for displacement and strain grids.
pub type Field = Array2<f64>;

/// Leading axial samples corrupted by the transducer near field.
///
/// These samples are excluded from mean removal and never enter the
/// analytic transform as real input.
pub const DEFAULT_NEAR_FIELD_DEFECTS: usize = 14;

fn default_window_lateral() -> usize {
    4
}

fn default_window_axial() -> usize {
    26
}

fn default_near_field_defects() -> usize {
    DEFAULT_NEAR_FIELD_DEFECTS
}

/// Geometry shared by the displacement engine and its processing stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub beams: usize,
    pub depth: usize,
    #[serde(default = "default_window_lateral")]
    pub window_lateral: usize,
    #[serde(default = "default_window_axial")]
    pub window_axial: usize,
    #[serde(default = "default_near_field_defects")]
    pub near_field_defects: usize,
}

impl EngineConfig {
    /// Engine geometry with the platform's default correlation window and
    /// near-field exclusion zone.
    pub fn new(beams: usize, depth: usize) -> Self {
        Self {
            beams,
            depth,
            window_lateral: default_window_lateral(),
            window_axial: default_window_axial(),
            near_field_defects: default_near_field_defects(),
        }
    }
}

/// Common error type for engine construction and execution.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
