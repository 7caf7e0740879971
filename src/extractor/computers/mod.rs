//! Concrete feature computers

mod band_stats;
mod threshold;

pub use self::band_stats::BandStatsComputer;
pub use self::threshold::{ThresholdRegionsComputer, DEFAULT_MIN_AREA_RATIO};
