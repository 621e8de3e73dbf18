pub mod extract;
pub mod mask;
pub mod resample;
pub mod spectrum;

pub use extract::ExtractStage;
pub use mask::MaskStage;
pub use resample::ResampleStage;
pub use spectrum::SpectrumStage;
