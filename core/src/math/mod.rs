pub mod fft;
pub mod stats;
pub mod welch;
pub mod window;

pub use fft::FftHelper;
pub use stats::{GroupStats, StatsHelper};
pub use welch::WelchEstimator;
