//! Spectral analysis of a filled analysis window.
//!
//! Three whole-window steps run in place on the window's buffers:
//!
//! 1. Hamming taper, `w[i] = 0.54 - 0.46 cos(2π i / (N - 1))`
//! 2. Forward radix-2 FFT
//! 3. Complex-to-magnitude conversion into the real buffer
//!
//! Band energy is then the unweighted sum of magnitudes at the even bins
//! `2, 4, .., 2·low_band_bins - 2`. Only every second bin is integrated and
//! indices above `N/2` read mirror bins. Deployed thresholds are calibrated
//! against exactly this metric.

use crate::config::ConfigError;
use std::f64::consts::PI;

/// Hamming taper coefficients for a window of `len` samples.
pub fn hamming(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// In-place iterative radix-2 forward FFT. Both slices must share a power-of-two length.
pub fn fft_in_place(real: &mut [f64], imag: &mut [f64]) {
    let n = real.len().min(imag.len());
    if n < 2 || !n.is_power_of_two() {
        return;
    }

    // Bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            real.swap(i, j);
            imag.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let step = -2.0 * PI / len as f64;
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let (sin, cos) = (step * k as f64).sin_cos();
                let a = start + k;
                let b = a + half;
                let tr = real[b] * cos - imag[b] * sin;
                let ti = real[b] * sin + imag[b] * cos;
                real[b] = real[a] - tr;
                imag[b] = imag[a] - ti;
                real[a] += tr;
                imag[a] += ti;
            }
        }
        len <<= 1;
    }
}

/// Replace each bin of `real` with `|real + i·imag|`.
pub fn complex_to_magnitude(real: &mut [f64], imag: &[f64]) {
    for (re, im) in real.iter_mut().zip(imag) {
        *re = (*re * *re + *im * *im).sqrt();
    }
}

/// Indices of the bins integrated into band energy.
pub fn band_bin_indices(low_band_bins: usize) -> impl Iterator<Item = usize> {
    (2..2 * low_band_bins).step_by(2)
}

/// Sum of magnitudes at the even low-band bins.
pub fn band_energy(spectrum: &[f64], low_band_bins: usize) -> f64 {
    band_bin_indices(low_band_bins)
        .filter_map(|i| spectrum.get(i))
        .sum()
}

/// Magnitudes at the even low-band bins, in bin order.
pub fn band_magnitudes(spectrum: &[f64], low_band_bins: usize) -> Vec<f64> {
    band_bin_indices(low_band_bins)
        .filter_map(|i| spectrum.get(i).copied())
        .collect()
}

/// Taper + transform + magnitude + band integration for a fixed window length.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    taper: Vec<f64>,
    low_band_bins: usize,
}

impl SpectralAnalyzer {
    pub fn new(len: usize, low_band_bins: usize) -> Result<Self, ConfigError> {
        if len < 2 || !len.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "window length {len} must be a power of two >= 2"
            )));
        }
        if low_band_bins < 2 || 2 * low_band_bins > len {
            return Err(ConfigError::Invalid(format!(
                "low band of {low_band_bins} bins does not fit a window of {len}"
            )));
        }
        Ok(Self {
            taper: hamming(len),
            low_band_bins,
        })
    }

    pub fn len(&self) -> usize {
        self.taper.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taper.is_empty()
    }

    pub fn low_band_bins(&self) -> usize {
        self.low_band_bins
    }

    /// Turn a time-domain window into its magnitude spectrum in place and
    /// return the band energy. `real` holds the spectrum afterwards.
    pub fn analyze(&self, real: &mut [f64], imag: &mut [f64]) -> f64 {
        for (sample, w) in real.iter_mut().zip(&self.taper) {
            *sample *= w;
        }
        fft_in_place(real, imag);
        complex_to_magnitude(real, imag);
        band_energy(real, self.low_band_bins)
    }
}
