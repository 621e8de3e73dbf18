use std::f64::consts::PI;

/// Periodic Hann window of length `n`.
pub fn hann(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Sum of squared window coefficients, used for density normalization.
pub fn energy(window: &[f64]) -> f64 {
    window.iter().map(|&w| w * w).sum()
}
