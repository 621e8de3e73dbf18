//! Core spectral-estimation pipeline for regional BOLD time series.
//!
//! The modules cover the path from a labeled segmentation and a 4D
//! functional image to one averaged power spectrum per region, plus the
//! cross-subject statistics used for group summaries.

pub mod math;
pub mod prelude;
pub mod processing;
pub mod tables;
pub mod telemetry;
pub mod volume;

pub use prelude::{PipelineStage, RegionConfig, StageError, StageResult};
