use crate::math::fft::FftHelper;
use crate::math::window;
use crate::prelude::{StageError, StageResult};

/// Welch power-spectral-density estimator.
///
/// Segments the signal with 50% overlap, removes each segment's mean,
/// applies a periodic Hann window, and averages the one-sided density
/// periodograms. One instance is reused across all voxels of a region,
/// so the FFT plan and window are built once.
pub struct WelchEstimator {
    fs: f64,
    nperseg: usize,
    window: Vec<f64>,
    window_energy: f64,
    fft: FftHelper,
}

impl WelchEstimator {
    /// `nperseg` is clamped to `signal_len`.
    pub fn new(fs: f64, nperseg: usize, signal_len: usize) -> StageResult<Self> {
        if fs <= 0.0 {
            return Err(StageError::InvalidInput(format!(
                "sampling rate must be positive, got {}",
                fs
            )));
        }
        if nperseg == 0 || signal_len == 0 {
            return Err(StageError::InvalidInput(
                "segment length and signal length must be non-zero".into(),
            ));
        }
        let nperseg = nperseg.min(signal_len);
        let window = window::hann(nperseg);
        let window_energy = window::energy(&window);
        Ok(Self {
            fs,
            nperseg,
            window,
            window_energy,
            fft: FftHelper::new(nperseg),
        })
    }

    pub fn nperseg(&self) -> usize {
        self.nperseg
    }

    /// One-sided frequency axis in Hz, `nperseg / 2 + 1` bins.
    pub fn frequencies(&self) -> Vec<f64> {
        let df = self.fs / self.nperseg as f64;
        (0..=self.nperseg / 2).map(|k| k as f64 * df).collect()
    }

    /// Estimates the PSD of `signal`. Output length matches
    /// [`WelchEstimator::frequencies`].
    pub fn estimate(&self, signal: &[f64]) -> StageResult<Vec<f64>> {
        if signal.len() < self.nperseg {
            return Err(StageError::InvalidInput(format!(
                "signal of {} samples is shorter than segment length {}",
                signal.len(),
                self.nperseg
            )));
        }

        let half = self.nperseg / 2;
        let step = self.nperseg - self.nperseg / 2;
        let scale = 1.0 / (self.fs * self.window_energy);

        let mut psd = vec![0.0; half + 1];
        let mut segment = vec![0.0; self.nperseg];
        let mut segments = 0usize;
        let mut start = 0usize;
        while start + self.nperseg <= signal.len() {
            let chunk = &signal[start..start + self.nperseg];
            let mean = chunk.iter().sum::<f64>() / self.nperseg as f64;
            for (dst, (&value, &w)) in segment
                .iter_mut()
                .zip(chunk.iter().zip(self.window.iter()))
            {
                *dst = (value - mean) * w;
            }

            let spectrum = self.fft.forward(&segment);
            for (k, bin) in psd.iter_mut().enumerate() {
                let mut power = spectrum[k].norm_sqr() * scale;
                let at_nyquist = self.nperseg % 2 == 0 && k == half;
                if k > 0 && !at_nyquist {
                    power *= 2.0;
                }
                *bin += power;
            }

            segments += 1;
            start += step;
        }

        let inv = 1.0 / segments as f64;
        for bin in psd.iter_mut() {
            *bin *= inv;
        }
        Ok(psd)
    }
}
