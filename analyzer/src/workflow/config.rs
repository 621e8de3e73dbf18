use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use spectracore::prelude::RegionConfig;

/// Tunable parameters of the whole analysis, loadable from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Erosion passes applied to each region mask.
    pub erosion_iterations: usize,
    /// Welch segment length.
    pub nperseg: usize,
    /// Lower edge of the analysis band in Hz, inclusive.
    pub band_low_hz: f64,
    /// Upper edge of the analysis band in Hz, inclusive.
    pub band_high_hz: f64,
    /// z-value scaling the standard error into a confidence interval.
    pub ci_z_value: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            erosion_iterations: 1,
            nperseg: 256,
            band_low_hz: 0.01,
            band_high_hz: 0.4,
            ci_z_value: 1.96,
        }
    }
}

impl AnalysisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading analysis config {}", path_ref.display()))?;
        let config: AnalysisConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing analysis config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Loads from `path` when given, falls back to defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Builds a config from the subject-side command-line knobs, keeping
    /// the group-level defaults.
    pub fn from_args(erosion_iterations: usize, nperseg: usize) -> Self {
        Self {
            erosion_iterations,
            nperseg,
            ..Self::default()
        }
    }

    pub fn to_region_config(&self) -> RegionConfig {
        RegionConfig {
            erosion_iterations: self.erosion_iterations,
            nperseg: self.nperseg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_analysis_band() {
        let config = AnalysisConfig::default();
        assert_eq!(config.erosion_iterations, 1);
        assert_eq!(config.nperseg, 256);
        assert!((config.band_low_hz - 0.01).abs() < 1e-12);
        assert!((config.band_high_hz - 0.4).abs() < 1e-12);
        assert_eq!(config.to_region_config().nperseg, 256);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"erosion_iterations: 2\nnperseg: 128\nband_high_hz: 0.25\n")
            .unwrap();
        let path = temp.into_temp_path();
        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.erosion_iterations, 2);
        assert_eq!(config.nperseg, 128);
        assert!((config.band_high_hz - 0.25).abs() < 1e-12);
        // untouched fields keep their defaults
        assert!((config.ci_z_value - 1.96).abs() < 1e-12);
    }

    #[test]
    fn from_args_keeps_group_defaults() {
        let config = AnalysisConfig::from_args(3, 128);
        assert_eq!(config.erosion_iterations, 3);
        assert_eq!(config.nperseg, 128);
        assert!((config.band_high_hz - 0.4).abs() < 1e-12);
    }
}
