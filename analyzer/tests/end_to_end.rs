use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn run(args: &[&str]) {
    let output = Command::new(env!("CARGO_BIN_EXE_analyzer"))
        .args(args)
        .output()
        .expect("spawning analyzer");
    assert!(
        output.status.success(),
        "analyzer {:?} failed:\n{}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn synth_subject_group_round_trip() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");

    run(&["synth", "--output-dir", path_str(&data)]);
    let seg = data.join("synthetic_seg.nii.gz");
    let bold = data.join("synthetic_bold.nii.gz");
    let labels = data.join("synthetic_labels.txt");
    assert!(seg.exists() && bold.exists() && labels.exists());

    // Two manifest subjects sharing one synthetic acquisition.
    for subject in ["sub-01", "sub-02"] {
        let prefix = data
            .join(subject)
            .join("frequency_analysis_outputs")
            .join(subject);
        run(&[
            "subject",
            "--seg-file",
            path_str(&seg),
            "--bold-file",
            path_str(&bold),
            "--label-file",
            path_str(&labels),
            "--output-prefix",
            path_str(&prefix),
        ]);
    }

    let subject_csv = data
        .join("sub-01")
        .join("frequency_analysis_outputs")
        .join("sub-01_power_spectras.csv");
    let contents = fs::read_to_string(&subject_csv).unwrap();
    let header = contents.lines().next().unwrap();
    assert!(header.starts_with("Frequencies (Hz)"));
    assert!(header.contains("Region-01"));
    // 200 timepoints at TR 2 s: one Welch segment, 101 one-sided bins.
    assert_eq!(contents.lines().count(), 102);

    let manifest = dir.path().join("subjects.txt");
    fs::write(&manifest, "sub-01 HC\nsub-02 HC\n").unwrap();
    let stats = dir.path().join("stats");
    let figures = dir.path().join("figures");
    run(&[
        "group",
        "--data-dir",
        path_str(&data),
        "--output-path",
        path_str(&stats),
        "--figure-path",
        path_str(&figures),
        "--subjects-file",
        path_str(&manifest),
        "--label-file",
        path_str(&labels),
    ]);

    for region in ["Region-01", "Region-02", "Region-03"] {
        let csv = stats
            .join("HC")
            .join(format!("HC_Averaged_spectrum_{}.csv", region));
        let contents = fs::read_to_string(&csv).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Frequencies (Hz),Power,Standard error,95% confidence interval,Number of samples (n)"
        );
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 5);
            assert_eq!(fields[4], "2");
            // identical subjects: zero spread
            assert_eq!(fields[2].parse::<f64>().unwrap(), 0.0);
            let frequency: f64 = fields[0].parse().unwrap();
            assert!((0.01..=0.4).contains(&frequency));
        }

        assert!(figures
            .join(format!("{}_HC_group_mean_spectra.png", region))
            .exists());
    }
}
