use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use log::{info, warn};
use spectracore::math::StatsHelper;
use spectracore::prelude::PipelineStage;
use spectracore::processing::extract::{ExtractInput, ExtractStage};
use spectracore::processing::mask::{MaskInput, MaskStage};
use spectracore::processing::resample::{ResampleInput, ResampleStage};
use spectracore::processing::spectrum::{SpectrumInput, SpectrumStage};
use spectracore::tables::{GroupSummary, LabelTable, SubjectSpectra};
use spectracore::telemetry::RegionCounters;
use spectracore::volume::{Volume3, Volume4};

use crate::report;
use crate::workflow::config::AnalysisConfig;

/// Drives the mask, resample, extract, and spectrum stages over every
/// region of one subject.
pub struct SubjectRunner {
    config: AnalysisConfig,
}

impl SubjectRunner {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn execute(
        &self,
        segmentation: &Volume3,
        bold: &Volume4,
        labels: &LabelTable,
    ) -> anyhow::Result<SubjectSpectra> {
        let region_config = self.config.to_region_config();
        let counters = RegionCounters::new();

        let mut mask_stage = MaskStage::new();
        let mut resample_stage = ResampleStage::new();
        let mut extract_stage = ExtractStage::new();
        let mut spectrum_stage = SpectrumStage::new();
        mask_stage
            .initialize(&region_config)
            .context("initializing mask stage")?;
        resample_stage
            .initialize(&region_config)
            .context("initializing resample stage")?;
        extract_stage
            .initialize(&region_config)
            .context("initializing extract stage")?;
        spectrum_stage
            .initialize(&region_config)
            .context("initializing spectrum stage")?;

        let mut columns: Vec<(String, Option<Vec<f64>>)> = Vec::new();
        let mut frequencies: Option<Vec<f64>> = None;

        for label in labels.iter() {
            if label.is_background() {
                continue;
            }

            let masked = mask_stage
                .execute(MaskInput {
                    segmentation,
                    label_value: label.value,
                })
                .with_context(|| format!("masking region {}", label.name))?;
            if masked.voxels_before_erosion == 0 {
                info!("{} has no voxel", label.name);
                counters.record_empty();
                columns.push((label.name.clone(), None));
                continue;
            }
            info!(
                "{} originally has {} voxels on the segmentation grid",
                label.name, masked.voxels_before_erosion
            );

            let resampled = resample_stage
                .execute(ResampleInput {
                    mask: &masked.mask,
                    mask_affine: &segmentation.affine,
                    target_shape: bold.spatial_shape(),
                    target_affine: &bold.affine,
                })
                .with_context(|| format!("resampling region {}", label.name))?;
            if resampled.voxels == 0 {
                info!("{} has no voxel left after erosion", label.name);
                counters.record_empty_after_erosion();
                columns.push((label.name.clone(), None));
                continue;
            }
            info!(
                "{} has {} voxels remaining on the functional grid",
                label.name, resampled.voxels
            );

            let series = extract_stage
                .execute(ExtractInput {
                    bold,
                    mask: &resampled.mask,
                })
                .with_context(|| format!("extracting series for region {}", label.name))?;
            let spectrum = spectrum_stage
                .execute(SpectrumInput {
                    series: &series,
                    sampling_rate: bold.sampling_rate(),
                })
                .with_context(|| format!("estimating spectrum of region {}", label.name))?;

            if frequencies.is_none() {
                frequencies = Some(spectrum.frequencies.clone());
            }
            columns.push((label.name.clone(), Some(spectrum.power)));
            counters.record_processed();
        }

        mask_stage.cleanup();
        resample_stage.cleanup();
        extract_stage.cleanup();
        spectrum_stage.cleanup();

        let snapshot = counters.snapshot();
        info!(
            "subject done: {} regions processed, {} without voxels, {} emptied by erosion",
            snapshot.processed, snapshot.empty, snapshot.empty_after_erosion
        );

        let frequencies = frequencies.ok_or_else(|| {
            anyhow!(
                "no voxels found in any of the requested regions; \
                 check the segmentation or lower erosion_iterations"
            )
        })?;
        let mut spectra = SubjectSpectra::new(frequencies);
        for (name, power) in columns {
            spectra
                .push_region(&name, power)
                .with_context(|| format!("assembling spectra table column {}", name))?;
        }
        Ok(spectra)
    }
}

/// Aggregates per-subject spectra tables into group summaries and plots.
pub struct GroupRunner {
    config: AnalysisConfig,
}

impl GroupRunner {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Runs every (region, group) pair and writes one summary CSV and one
    /// figure for each.
    pub fn execute(
        &self,
        group_files: &BTreeMap<String, Vec<PathBuf>>,
        labels: &LabelTable,
        output_path: &Path,
        figure_path: &Path,
    ) -> anyhow::Result<()> {
        for region in labels.region_names() {
            for (group, files) in group_files {
                let (summary, retained) = self
                    .analyze(files, region, group)
                    .with_context(|| format!("aggregating {} for group {}", region, group))?;

                let figure = figure_path.join(format!(
                    "{}_{}_group_mean_spectra.png",
                    region, group
                ));
                report::figures::plot_group_spectra(&figure, region, group, &summary, &retained)
                    .map_err(|e| anyhow!("rendering figure {}: {}", figure.display(), e))?;

                let csv = output_path
                    .join(group)
                    .join(format!("{}_Averaged_spectrum_{}.csv", group, region));
                report::tables::write_group_summary(&csv, &summary)?;
                info!(
                    "{} {}: n = {} subjects, {} frequency bins",
                    group,
                    region,
                    summary.samples,
                    summary.frequencies.len()
                );
            }
        }
        Ok(())
    }

    /// Loads and band-filters every subject's spectrum for one region,
    /// skipping subjects with NaN columns, and computes the statistics.
    fn analyze(
        &self,
        files: &[PathBuf],
        region: &str,
        group: &str,
    ) -> anyhow::Result<(GroupSummary, Vec<Vec<f64>>)> {
        let mut spectra: Vec<Vec<f64>> = Vec::new();
        let mut frequencies: Option<Vec<f64>> = None;

        for file in files {
            let table = report::tables::read_subject_spectra(file)?;
            let banded = table.band_filter(self.config.band_low_hz, self.config.band_high_hz);
            let column = banded
                .region(region)
                .ok_or_else(|| {
                    anyhow!("{} has no column for region {}", file.display(), region)
                })?
                .map(<[f64]>::to_vec)
                .unwrap_or_default();

            if column.is_empty() || column.iter().any(|v| v.is_nan()) {
                warn!(
                    "NaN values found in {} for region {}",
                    file.display(),
                    region
                );
                continue;
            }

            match frequencies {
                Some(ref axis) if axis != banded.frequencies() => {
                    bail!(
                        "{} uses a different frequency axis for region {}",
                        file.display(),
                        region
                    );
                }
                None => frequencies = Some(banded.frequencies().to_vec()),
                _ => {}
            }
            spectra.push(column);
        }

        if spectra.is_empty() {
            bail!(
                "no valid subjects for group {} and region {}; \
                 check the data or drop the region from the analysis",
                group,
                region
            );
        }

        let stacked = StatsHelper::stack_columns(&spectra)?;
        let stats = StatsHelper::mean_stderr_ci(stacked.view(), self.config.ci_z_value)?;
        let frequencies = frequencies.unwrap_or_default();

        Ok((
            GroupSummary {
                frequencies,
                mean: stats.mean.to_vec(),
                std_error: stats.std_error.to_vec(),
                ci_half_width: stats.ci_half_width.to_vec(),
                samples: stats.samples,
            },
            spectra,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::synth::{build_dataset, SynthConfig};
    use crate::report::tables::write_subject_spectra;
    use tempfile::tempdir;

    fn synthetic_spectra() -> SubjectSpectra {
        let dataset = build_dataset(&SynthConfig::default()).unwrap();
        let runner = SubjectRunner::new(AnalysisConfig::default());
        runner
            .execute(&dataset.segmentation, &dataset.bold, &dataset.labels)
            .unwrap()
    }

    #[test]
    fn subject_runner_recovers_region_frequencies() {
        let spectra = synthetic_spectra();

        // 200 timepoints at TR 2 s: one Welch segment of 200 samples.
        assert_eq!(spectra.frequencies().len(), 101);

        for (region_index, name) in ["Region-01", "Region-02", "Region-03"]
            .iter()
            .enumerate()
        {
            let power = spectra
                .region(name)
                .expect("column present")
                .expect("region has voxels");
            let peak = power
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(k, _)| k)
                .unwrap();
            let expected = 0.05 * (region_index + 1) as f64;
            assert!(
                (spectra.frequencies()[peak] - expected).abs() < 0.005,
                "{} peaked at {} Hz instead of {} Hz",
                name,
                spectra.frequencies()[peak],
                expected
            );
        }
    }

    #[test]
    fn subject_runner_fails_when_every_region_is_empty() {
        let dataset = build_dataset(&SynthConfig::default()).unwrap();
        let labels = LabelTable::new(vec![spectracore::tables::RegionLabel {
            value: 77,
            name: "Phantom".to_string(),
        }]);
        let runner = SubjectRunner::new(AnalysisConfig::default());
        assert!(runner
            .execute(&dataset.segmentation, &dataset.bold, &labels)
            .is_err());
    }

    #[test]
    fn group_runner_writes_summaries_and_figures() {
        let spectra = synthetic_spectra();
        let dir = tempdir().unwrap();

        let mut files = Vec::new();
        for subject in ["sub-01", "sub-02"] {
            let path = dir
                .path()
                .join(subject)
                .join(format!("{}_power_spectras.csv", subject));
            write_subject_spectra(&path, &spectra).unwrap();
            files.push(path);
        }
        let mut group_files = BTreeMap::new();
        group_files.insert("HC".to_string(), files);

        let dataset = build_dataset(&SynthConfig::default()).unwrap();
        let output = dir.path().join("stats");
        let figures = dir.path().join("figures");
        GroupRunner::new(AnalysisConfig::default())
            .execute(&group_files, &dataset.labels, &output, &figures)
            .unwrap();

        let summary_path = output.join("HC").join("HC_Averaged_spectrum_Region-01.csv");
        assert!(summary_path.exists());
        assert!(figures.join("Region-01_HC_group_mean_spectra.png").exists());

        let contents = std::fs::read_to_string(summary_path).unwrap();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("Standard error"));
        // identical subjects: standard error column is zero
        let first_row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(first_row[4], "2");
        assert_eq!(first_row[2].parse::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn group_runner_fails_without_valid_subjects() {
        let dir = tempdir().unwrap();
        let mut spectra = SubjectSpectra::new(vec![0.05, 0.1]);
        spectra.push_region("Region-01", None).unwrap();
        let path = dir.path().join("sub-01_power_spectras.csv");
        write_subject_spectra(&path, &spectra).unwrap();

        let mut group_files = BTreeMap::new();
        group_files.insert("HC".to_string(), vec![path]);
        let labels = LabelTable::new(vec![spectracore::tables::RegionLabel {
            value: 1,
            name: "Region-01".to_string(),
        }]);

        let runner = GroupRunner::new(AnalysisConfig::default());
        let result = runner.execute(
            &group_files,
            &labels,
            dir.path().join("stats").as_path(),
            dir.path().join("figures").as_path(),
        );
        assert!(result.is_err());
    }
}
