use std::error::Error;
use std::fs;
use std::path::Path;

use plotters::prelude::*;
use spectracore::tables::GroupSummary;

/// Floor applied before log-scaling so zero-power bins stay drawable.
fn positive_floor(values: impl Iterator<Item = f64>) -> f64 {
    let smallest = values
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if smallest.is_finite() {
        smallest / 10.0
    } else {
        1e-12
    }
}

/// Plots one (group, region) pair: per-subject spectra as thin lines, the
/// group mean in red with its confidence band, on a log power axis.
pub fn plot_group_spectra(
    path: &Path,
    region: &str,
    group: &str,
    summary: &GroupSummary,
    subject_spectra: &[Vec<f64>],
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let frequencies = &summary.frequencies;
    let x_min = frequencies.first().copied().unwrap_or(0.0);
    let x_max = frequencies.last().copied().unwrap_or(1.0);

    let floor = positive_floor(
        subject_spectra
            .iter()
            .flatten()
            .copied()
            .chain(summary.mean.iter().copied()),
    );
    let clamp = move |value: f64| if value > floor { value } else { floor };

    let mut y_max = floor;
    for value in subject_spectra.iter().flatten().chain(summary.mean.iter()) {
        if value.is_finite() && *value > y_max {
            y_max = *value;
        }
    }
    let y_range = (floor..y_max * 2.0).log_scale();

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Power Spectra of {} {}", region, group),
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Frequency (Hz)")
        .y_desc("Power")
        .draw()?;

    for (index, spectrum) in subject_spectra.iter().enumerate() {
        let color = Palette99::pick(index).mix(0.5);
        chart.draw_series(LineSeries::new(
            frequencies
                .iter()
                .zip(spectrum.iter())
                .map(|(&f, &p)| (f, clamp(p))),
            color.stroke_width(1),
        ))?;
    }

    let band: Vec<(f64, f64)> = frequencies
        .iter()
        .zip(summary.mean.iter().zip(summary.ci_half_width.iter()))
        .map(|(&f, (&m, &ci))| (f, clamp(m + ci)))
        .chain(
            frequencies
                .iter()
                .zip(summary.mean.iter().zip(summary.ci_half_width.iter()))
                .rev()
                .map(|(&f, (&m, &ci))| (f, clamp(m - ci))),
        )
        .collect();
    chart
        .draw_series(std::iter::once(Polygon::new(band, RED.mix(0.3))))?
        .label("95% CI")
        .legend(|(x, y)| {
            Rectangle::new([(x, y - 4), (x + 16, y + 4)], RED.mix(0.3).filled())
        });

    chart
        .draw_series(LineSeries::new(
            frequencies
                .iter()
                .zip(summary.mean.iter())
                .map(|(&f, &m)| (f, clamp(m))),
            RED.stroke_width(2),
        ))?
        .label("Mean Spectrum")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.draw(&Text::new(
        format!("N = {}", summary.samples),
        (80, 60),
        ("sans-serif", 20).into_font().color(&BLACK),
    ))?;

    root.present()?;
    Ok(())
}

/// Plots one region of one subject, used by the `--plot` flag.
pub fn plot_region_spectrum(
    path: &Path,
    region: &str,
    frequencies: &[f64],
    power: &[f64],
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let x_min = frequencies.first().copied().unwrap_or(0.0);
    let x_max = frequencies.last().copied().unwrap_or(1.0);
    let floor = positive_floor(power.iter().copied());
    let y_max = power
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(floor, f64::max);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Power Spectrum of {}", region),
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, (floor..y_max * 2.0).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Frequency (Hz)")
        .y_desc("Power")
        .draw()?;

    chart.draw_series(LineSeries::new(
        frequencies
            .iter()
            .zip(power.iter())
            .map(|(&f, &p)| (f, if p > floor { p } else { floor })),
        BLUE.stroke_width(2),
    ))?;

    root.present()?;
    Ok(())
}
