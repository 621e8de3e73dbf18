use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::json;

use generator::synth::{build_dataset, SynthConfig};
use manifest::{group_names, read_label_file, read_subject_manifest, spectra_path};
use spectracore::volume::nifti_io;
use workflow::config::AnalysisConfig;
use workflow::runner::{GroupRunner, SubjectRunner};

mod generator;
mod manifest;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Regional BOLD power-spectrum workflows")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute per-region power spectra for one subject
    Subject {
        /// Path to the labeled segmentation image
        #[arg(long)]
        seg_file: PathBuf,
        /// Path to the 4D BOLD image
        #[arg(long)]
        bold_file: PathBuf,
        /// Path to the region label file
        #[arg(long)]
        label_file: PathBuf,
        /// Prefix for the output file names
        #[arg(long, default_value = "./")]
        output_prefix: String,
        /// Also write one spectrum figure per region
        #[arg(long, default_value_t = false)]
        plot: bool,
        /// Erosion passes applied to each region mask
        #[arg(long, default_value_t = 1)]
        erosion_iterations: usize,
        /// Welch segment length
        #[arg(long, default_value_t = 256)]
        nperseg: usize,
        /// Load analysis parameters from YAML instead of the flags above
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Aggregate per-subject spectra into group summaries
    Group {
        /// Directory containing per-subject spectra tables
        #[arg(long)]
        data_dir: PathBuf,
        /// Directory for the summary CSVs
        #[arg(long)]
        output_path: PathBuf,
        /// Directory for the figures
        #[arg(long)]
        figure_path: PathBuf,
        /// Manifest with one `subject group` pair per line
        #[arg(long)]
        subjects_file: PathBuf,
        /// Path to the region label file
        #[arg(long)]
        label_file: PathBuf,
        /// Load analysis parameters from YAML
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a synthetic BOLD + segmentation + label-file triple
    Synth {
        /// Directory for the generated files
        #[arg(long, default_value = "synthetic")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 200)]
        timepoints: usize,
        #[arg(long, default_value_t = 2.0)]
        tr: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Run the subject pipeline end to end on in-memory synthetic data
    Demo {
        /// Directory for the demo outputs
        #[arg(long, default_value = "demo_outputs")]
        output_dir: PathBuf,
        /// Load analysis parameters from YAML
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Subject {
            seg_file,
            bold_file,
            label_file,
            output_prefix,
            plot,
            erosion_iterations,
            nperseg,
            config,
        } => {
            let config = match config {
                Some(path) => AnalysisConfig::load(path)?,
                None => AnalysisConfig::from_args(erosion_iterations, nperseg),
            };
            run_subject(&seg_file, &bold_file, &label_file, &output_prefix, plot, config)
        }
        Command::Group {
            data_dir,
            output_path,
            figure_path,
            subjects_file,
            label_file,
            config,
        } => run_group(
            &data_dir,
            &output_path,
            &figure_path,
            &subjects_file,
            &label_file,
            config.as_deref(),
        ),
        Command::Synth {
            output_dir,
            timepoints,
            tr,
            seed,
        } => run_synth(&output_dir, timepoints, tr, seed),
        Command::Demo { output_dir, config } => run_demo(&output_dir, config.as_deref()),
    }
}

fn run_subject(
    seg_file: &Path,
    bold_file: &Path,
    label_file: &Path,
    output_prefix: &str,
    plot: bool,
    config: AnalysisConfig,
) -> anyhow::Result<()> {
    info!("starting processing of {}", seg_file.display());

    let labels = read_label_file(label_file)?;
    let segmentation = nifti_io::load_segmentation(seg_file)
        .with_context(|| format!("loading segmentation {}", seg_file.display()))?;
    let bold = nifti_io::load_bold(bold_file)
        .with_context(|| format!("loading BOLD series {}", bold_file.display()))?;

    let spectra = SubjectRunner::new(config).execute(&segmentation, &bold, &labels)?;

    let table_path = PathBuf::from(format!("{}_power_spectras.csv", output_prefix));
    report::tables::write_subject_spectra(&table_path, &spectra)?;
    info!("power spectra data saved to {}", table_path.display());

    if plot {
        for (region, power) in spectra.regions() {
            let Some(power) = power else { continue };
            let figure = PathBuf::from(format!("{}_{}_spectrum.png", output_prefix, region));
            report::figures::plot_region_spectrum(&figure, region, spectra.frequencies(), power)
                .map_err(|e| anyhow!("rendering figure {}: {}", figure.display(), e))?;
        }
    }
    Ok(())
}

fn run_group(
    data_dir: &Path,
    output_path: &Path,
    figure_path: &Path,
    subjects_file: &Path,
    label_file: &Path,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let config = AnalysisConfig::load_or_default(config)?;
    let labels = read_label_file(label_file)?;
    let entries = read_subject_manifest(subjects_file)?;
    let groups = group_names(&entries);

    let mut group_files: BTreeMap<String, Vec<PathBuf>> =
        groups.iter().map(|g| (g.clone(), Vec::new())).collect();
    for entry in &entries {
        let path = spectra_path(data_dir, &entry.subject);
        if path.exists() {
            if let Some(files) = group_files.get_mut(&entry.group) {
                files.push(path);
            }
        } else {
            warn!(
                "skipping {}: no spectra table at {}",
                entry.subject,
                path.display()
            );
        }
    }

    GroupRunner::new(config).execute(&group_files, &labels, output_path, figure_path)
}

fn run_synth(output_dir: &Path, timepoints: usize, tr: f64, seed: u64) -> anyhow::Result<()> {
    let config = SynthConfig {
        timepoints,
        tr_seconds: tr,
        seed,
        ..SynthConfig::default()
    };
    let dataset = build_dataset(&config)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let bold_path = output_dir.join("synthetic_bold.nii.gz");
    let seg_path = output_dir.join("synthetic_seg.nii.gz");
    let label_path = output_dir.join("synthetic_labels.txt");

    nifti_io::write_bold(&bold_path, &dataset.bold)
        .with_context(|| format!("writing {}", bold_path.display()))?;
    nifti_io::write_segmentation(&seg_path, &dataset.segmentation)
        .with_context(|| format!("writing {}", seg_path.display()))?;

    let mut labels_text = String::new();
    for label in dataset.labels.iter() {
        labels_text.push_str(&format!("{} {}\n", label.value, label.name));
    }
    std::fs::write(&label_path, labels_text)
        .with_context(|| format!("writing {}", label_path.display()))?;

    info!("synthetic dataset written to {}", output_dir.display());
    Ok(())
}

fn run_demo(output_dir: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = AnalysisConfig::load_or_default(config)?;
    let dataset = build_dataset(&SynthConfig::default())?;

    let spectra =
        SubjectRunner::new(config.clone()).execute(&dataset.segmentation, &dataset.bold, &dataset.labels)?;
    let table_path = output_dir.join("demo_power_spectras.csv");
    report::tables::write_subject_spectra(&table_path, &spectra)?;

    let banded = spectra.band_filter(config.band_low_hz, config.band_high_hz);
    let regions_with_voxels = spectra
        .regions()
        .filter(|(_, power)| power.is_some())
        .count();

    let summary = json!({
        "output_table": table_path,
        "regions": spectra.regions().count(),
        "regions_with_voxels": regions_with_voxels,
        "frequency_bins": spectra.frequencies().len(),
        "frequency_bins_in_band": banded.frequencies().len(),
        "band_hz": [config.band_low_hz, config.band_high_hz],
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
