//! Displacement-estimation and strain-filtering core for the ultrasound
//! tissue-motion platform.
//!
//! The modules mirror the legacy beam-processing pipeline while providing
//! safe rectangular-grid containers, a pooled worker-thread engine, and
//! well-defined sequential filter stages.

pub mod math;
pub mod pool;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use pool::WorkerPool;
pub use prelude::{
    AnalyticField, EngineConfig, EngineError, EngineResult, Field, RawFrame,
    DEFAULT_NEAR_FIELD_DEFECTS,
};
pub use processing::{DisplacementEngine, FieldFilter, FilterChain, FilterParams};
