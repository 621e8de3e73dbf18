use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use spectracore::tables::{GroupSummary, SubjectSpectra};

pub const FREQUENCY_COLUMN: &str = "Frequencies (Hz)";

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    Ok(())
}

/// Writes a per-subject spectra table: the frequency axis plus one column
/// per region. Regions without voxels serialize as NaN columns.
pub fn write_subject_spectra(path: &Path, spectra: &SubjectSpectra) -> anyhow::Result<()> {
    ensure_parent(path)?;

    let mut out = String::from(FREQUENCY_COLUMN);
    for (name, _) in spectra.regions() {
        out.push(',');
        out.push_str(name);
    }
    out.push('\n');

    for (row, &frequency) in spectra.frequencies().iter().enumerate() {
        out.push_str(&format!("{}", frequency));
        for (_, power) in spectra.regions() {
            let value = power.map_or(f64::NAN, |p| p[row]);
            out.push_str(&format!(",{}", value));
        }
        out.push('\n');
    }

    fs::write(path, out).with_context(|| format!("writing spectra table {}", path.display()))
}

/// Reads a per-subject spectra table written by [`write_subject_spectra`].
pub fn read_subject_spectra(path: &Path) -> anyhow::Result<SubjectSpectra> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading spectra table {}", path.display()))?;
    let mut lines = contents.lines();

    let header = lines
        .next()
        .with_context(|| format!("{} is empty", path.display()))?;
    let names: Vec<&str> = header.split(',').collect();
    if names.first() != Some(&FREQUENCY_COLUMN) {
        bail!(
            "{}: expected first column {:?}, found {:?}",
            path.display(),
            FREQUENCY_COLUMN,
            names.first().unwrap_or(&"")
        );
    }
    let region_names = &names[1..];

    let mut frequencies = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); region_names.len()];
    for (line_index, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != names.len() {
            bail!(
                "{} line {}: expected {} fields, found {}",
                path.display(),
                line_index + 2,
                names.len(),
                fields.len()
            );
        }
        let parse = |field: &str| -> anyhow::Result<f64> {
            field.parse().with_context(|| {
                format!(
                    "{} line {}: {:?} is not a number",
                    path.display(),
                    line_index + 2,
                    field
                )
            })
        };
        frequencies.push(parse(fields[0])?);
        for (column, field) in columns.iter_mut().zip(&fields[1..]) {
            column.push(parse(field)?);
        }
    }

    let mut table = SubjectSpectra::new(frequencies);
    for (name, column) in region_names.iter().zip(columns) {
        table.push_region(*name, Some(column))?;
    }
    Ok(table)
}

/// Writes the group-level summary for one (group, region) pair.
pub fn write_group_summary(path: &Path, summary: &GroupSummary) -> anyhow::Result<()> {
    ensure_parent(path)?;

    let mut out = String::from(
        "Frequencies (Hz),Power,Standard error,95% confidence interval,Number of samples (n)\n",
    );
    for row in 0..summary.frequencies.len() {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            summary.frequencies[row],
            summary.mean[row],
            summary.std_error[row],
            summary.ci_half_width[row],
            summary.samples
        ));
    }

    fs::write(path, out).with_context(|| format!("writing group summary {}", path.display()))
}
