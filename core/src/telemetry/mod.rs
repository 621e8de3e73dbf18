pub mod metrics;

pub use metrics::RegionCounters;
