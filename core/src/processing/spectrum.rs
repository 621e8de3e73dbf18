use log::debug;

use crate::math::welch::WelchEstimator;
use crate::prelude::{PipelineStage, RegionConfig, StageError, StageResult};
use crate::processing::extract::TimeSeriesMatrix;
use crate::tables::spectra::RegionSpectrum;

#[derive(Debug, Clone, Copy)]
pub struct SpectrumInput<'a> {
    pub series: &'a TimeSeriesMatrix,
    pub sampling_rate: f64,
}

/// Stage that runs Welch's method on every voxel of a region and averages
/// the per-voxel spectra into one representative spectrum.
pub struct SpectrumStage {
    config: Option<RegionConfig>,
    estimator: Option<WelchEstimator>,
}

impl SpectrumStage {
    pub fn new() -> Self {
        Self {
            config: None,
            estimator: None,
        }
    }

    /// The estimator depends on the series length and sampling rate, so
    /// it is built on first use and reused while both stay the same.
    fn estimator(
        &mut self,
        sampling_rate: f64,
        timepoints: usize,
        nperseg: usize,
    ) -> StageResult<&WelchEstimator> {
        let wanted = nperseg.min(timepoints);
        let rebuild = match self.estimator {
            Some(ref estimator) => estimator.nperseg() != wanted,
            None => true,
        };
        if rebuild {
            self.estimator = Some(WelchEstimator::new(sampling_rate, nperseg, timepoints)?);
        }
        self.estimator
            .as_ref()
            .ok_or_else(|| StageError::Internal("welch estimator unavailable".into()))
    }
}

impl Default for SpectrumStage {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PipelineStage<'a> for SpectrumStage {
    type Input = SpectrumInput<'a>;
    type Output = RegionSpectrum;

    fn initialize(&mut self, config: &RegionConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: SpectrumInput<'a>) -> StageResult<RegionSpectrum> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("spectrum stage not initialized".into()))?;
        let voxels = input.series.voxels();
        if voxels == 0 {
            return Err(StageError::InvalidInput(
                "no voxel series to estimate a spectrum from".into(),
            ));
        }

        let nperseg = config.nperseg;
        let estimator =
            self.estimator(input.sampling_rate, input.series.timepoints(), nperseg)?;

        let mut mean_power = vec![0.0; estimator.nperseg() / 2 + 1];
        for row in input.series.data.rows() {
            let voxel_series: Vec<f64> = row.to_vec();
            let psd = estimator.estimate(&voxel_series)?;
            for (acc, p) in mean_power.iter_mut().zip(psd.iter()) {
                *acc += p;
            }
        }
        let inv = 1.0 / voxels as f64;
        for value in mean_power.iter_mut() {
            *value *= inv;
        }

        debug!(
            "averaged welch spectrum over {} voxels, {} bins",
            voxels,
            mean_power.len()
        );
        Ok(RegionSpectrum {
            frequencies: estimator.frequencies(),
            power: mean_power,
            voxels,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
        self.estimator = None;
    }
}
