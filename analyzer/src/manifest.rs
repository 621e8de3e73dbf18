use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use spectracore::tables::{LabelTable, RegionLabel};

/// Reads a region label file: whitespace-separated `value name` lines.
/// Lines with any other field count are ignored.
pub fn read_label_file(path: &Path) -> anyhow::Result<LabelTable> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading label file {}", path.display()))?;

    let mut labels = Vec::new();
    for (line_index, line) in contents.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            continue;
        }
        let value: i32 = fields[0].parse().with_context(|| {
            format!(
                "{} line {}: label value {:?} is not an integer",
                path.display(),
                line_index + 1,
                fields[0]
            )
        })?;
        labels.push(RegionLabel {
            value,
            name: fields[1].to_string(),
        });
    }
    Ok(LabelTable::new(labels))
}

/// One row of the subject manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectEntry {
    pub subject: String,
    pub group: String,
}

/// Reads the subject manifest: `subject group` per line.
pub fn read_subject_manifest(path: &Path) -> anyhow::Result<Vec<SubjectEntry>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading subject manifest {}", path.display()))?;

    let mut entries = Vec::new();
    for (line_index, line) in contents.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 2 {
            bail!(
                "{} line {}: expected `subject group`, got {:?}",
                path.display(),
                line_index + 1,
                line
            );
        }
        entries.push(SubjectEntry {
            subject: fields[0].to_string(),
            group: fields[1].to_string(),
        });
    }
    Ok(entries)
}

/// Group names present in the manifest, deduplicated and sorted so runs
/// are deterministic.
pub fn group_names(entries: &[SubjectEntry]) -> Vec<String> {
    let mut names: Vec<String> = entries.iter().map(|e| e.group.clone()).collect();
    names.sort();
    names.dedup();
    names
}

/// Location of a subject's spectra table inside the data directory.
pub fn spectra_path(data_dir: &Path, subject: &str) -> PathBuf {
    data_dir
        .join(subject)
        .join("frequency_analysis_outputs")
        .join(format!("{}_power_spectras.csv", subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn label_file_keeps_two_field_lines_in_order() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"# comment line with extra fields\n0 Background\n10 Left-Thalamus\n\n49 Right-Thalamus\n",
        )
        .unwrap();

        let table = read_label_file(temp.path()).unwrap();
        let names: Vec<&str> = table.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Background", "Left-Thalamus", "Right-Thalamus"]);
        assert_eq!(table.region_names(), vec!["Left-Thalamus", "Right-Thalamus"]);
    }

    #[test]
    fn label_file_rejects_non_integer_values() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"ten Left-Thalamus\n").unwrap();
        assert!(read_label_file(temp.path()).is_err());
    }

    #[test]
    fn missing_label_file_is_an_error() {
        assert!(read_label_file(Path::new("/nonexistent/labels.txt")).is_err());
    }

    #[test]
    fn manifest_parses_subjects_and_groups() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"sub-01 HC\nsub-02 CLBP\nsub-03 HC\n").unwrap();

        let entries = read_subject_manifest(temp.path()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].subject, "sub-02");
        assert_eq!(group_names(&entries), vec!["CLBP", "HC"]);
    }

    #[test]
    fn manifest_rejects_single_field_lines() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"sub-01\n").unwrap();
        assert!(read_subject_manifest(temp.path()).is_err());
    }

    #[test]
    fn spectra_path_follows_layout() {
        let path = spectra_path(Path::new("/data"), "sub-07");
        assert_eq!(
            path,
            Path::new("/data/sub-07/frequency_analysis_outputs/sub-07_power_spectras.csv")
        );
    }
}
