use serde::{Deserialize, Serialize};

/// Shared configuration for the per-region processing stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Erosion passes applied to each region mask before resampling.
    pub erosion_iterations: usize,
    /// Welch segment length, clamped to the series length at run time.
    pub nperseg: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            erosion_iterations: 1,
            nperseg: 256,
        }
    }
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("volume i/o failure: {0}")]
    VolumeIo(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing the object-oriented stages of the region pipeline.
///
/// Inputs borrow the subject's volumes, so the trait carries the borrow
/// lifetime. Each stage is initialized once per subject and executed once
/// per region.
pub trait PipelineStage<'a> {
    type Input: 'a;
    type Output;

    fn initialize(&mut self, config: &RegionConfig) -> StageResult<()>;
    fn execute(&mut self, input: Self::Input) -> StageResult<Self::Output>;
    fn cleanup(&mut self);
}
