use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::prelude::{StageError, StageResult};

/// Cross-subject statistics for one (group, region) pair.
#[derive(Debug, Clone)]
pub struct GroupStats {
    pub mean: Array1<f64>,
    pub std_error: Array1<f64>,
    pub ci_half_width: Array1<f64>,
    pub samples: usize,
}

pub struct StatsHelper;

impl StatsHelper {
    /// Mean, standard error, and z-scaled confidence half-width per row.
    ///
    /// `spectra` has one row per frequency bin and one column per subject.
    /// The standard deviation is the population one (ddof = 0).
    pub fn mean_stderr_ci(spectra: ArrayView2<f64>, z: f64) -> StageResult<GroupStats> {
        let samples = spectra.ncols();
        if samples == 0 {
            return Err(StageError::InvalidInput(
                "no subject spectra to aggregate".into(),
            ));
        }

        let mean = spectra
            .mean_axis(Axis(1))
            .ok_or_else(|| StageError::Internal("mean over empty axis".into()))?;
        let std_error = spectra.std_axis(Axis(1), 0.0) / (samples as f64).sqrt();
        let ci_half_width = &std_error * z;

        Ok(GroupStats {
            mean,
            std_error,
            ci_half_width,
            samples,
        })
    }

    /// Stacks equally sized per-subject spectra as the columns of a matrix.
    pub fn stack_columns(spectra: &[Vec<f64>]) -> StageResult<Array2<f64>> {
        let rows = spectra
            .first()
            .map(|s| s.len())
            .ok_or_else(|| StageError::InvalidInput("no spectra to stack".into()))?;
        if spectra.iter().any(|s| s.len() != rows) {
            return Err(StageError::InvalidInput(
                "subject spectra have mismatched lengths".into(),
            ));
        }

        let mut stacked = Array2::zeros((rows, spectra.len()));
        for (column, spectrum) in spectra.iter().enumerate() {
            for (row, &value) in spectrum.iter().enumerate() {
                stacked[[row, column]] = value;
            }
        }
        Ok(stacked)
    }
}
