pub mod hilbert;
pub mod stats;

pub use hilbert::AnalyticTransform;
pub use stats::StatsHelper;
