pub mod analytic;
pub mod correlation;
pub mod engine;
pub mod filters;

pub use engine::{DisplacementEngine, Partition};
pub use filters::{FieldFilter, FilterChain, FilterParams};
