use serde::{Deserialize, Serialize};

use crate::prelude::{StageError, StageResult};

/// Averaged power spectrum of one region of one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpectrum {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
    /// Voxels that contributed to the average.
    pub voxels: usize,
}

/// Per-subject spectrum table: one shared frequency axis plus one column
/// per region. A `None` column records a region that had no voxels left
/// to sample; it serializes as NaN so downstream aggregation can skip it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSpectra {
    frequencies: Vec<f64>,
    regions: Vec<(String, Option<Vec<f64>>)>,
}

impl SubjectSpectra {
    pub fn new(frequencies: Vec<f64>) -> Self {
        Self {
            frequencies,
            regions: Vec::new(),
        }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn regions(&self) -> impl Iterator<Item = (&str, Option<&[f64]>)> {
        self.regions
            .iter()
            .map(|(name, power)| (name.as_str(), power.as_deref()))
    }

    pub fn region(&self, name: &str) -> Option<Option<&[f64]>> {
        self.regions
            .iter()
            .find(|(region, _)| region == name)
            .map(|(_, power)| power.as_deref())
    }

    pub fn push_region(
        &mut self,
        name: impl Into<String>,
        power: Option<Vec<f64>>,
    ) -> StageResult<()> {
        if let Some(ref spectrum) = power {
            if spectrum.len() != self.frequencies.len() {
                return Err(StageError::InvalidInput(format!(
                    "spectrum of {} bins does not match frequency axis of {}",
                    spectrum.len(),
                    self.frequencies.len()
                )));
            }
        }
        self.regions.push((name.into(), power));
        Ok(())
    }

    /// Restricts the table to frequencies inside `[low, high]` (inclusive),
    /// trimming the bins too close to the spectrum edges.
    pub fn band_filter(&self, low: f64, high: f64) -> SubjectSpectra {
        let keep: Vec<usize> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= low && f <= high)
            .map(|(i, _)| i)
            .collect();

        SubjectSpectra {
            frequencies: keep.iter().map(|&i| self.frequencies[i]).collect(),
            regions: self
                .regions
                .iter()
                .map(|(name, power)| {
                    let filtered = power
                        .as_ref()
                        .map(|p| keep.iter().map(|&i| p[i]).collect());
                    (name.clone(), filtered)
                })
                .collect(),
        }
    }
}

/// Group-level statistics of one region, ready for CSV and plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub frequencies: Vec<f64>,
    pub mean: Vec<f64>,
    pub std_error: Vec<f64>,
    pub ci_half_width: Vec<f64>,
    pub samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_region_checks_axis_length() {
        let mut table = SubjectSpectra::new(vec![0.0, 0.1, 0.2]);
        assert!(table
            .push_region("Left-Putamen", Some(vec![1.0, 2.0, 3.0]))
            .is_ok());
        assert!(table.push_region("Right-Putamen", Some(vec![1.0])).is_err());
        assert!(table.push_region("Left-Caudate", None).is_ok());
    }

    #[test]
    fn band_filter_trims_axis_and_columns() {
        let mut table = SubjectSpectra::new(vec![0.0, 0.01, 0.2, 0.4, 0.45]);
        table
            .push_region("Left-Putamen", Some(vec![1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();
        table.push_region("Left-Caudate", None).unwrap();

        let banded = table.band_filter(0.01, 0.4);
        assert_eq!(banded.frequencies(), &[0.01, 0.2, 0.4]);
        assert_eq!(
            banded.region("Left-Putamen").unwrap().unwrap(),
            &[2.0, 3.0, 4.0]
        );
        assert_eq!(banded.region("Left-Caudate").unwrap(), None);
        assert_eq!(banded.region("Missing"), None);
    }
}
