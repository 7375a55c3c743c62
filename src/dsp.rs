//! DSP primitives: real FFT spectra, band power, brick-wall bandpass
//! filtering, cross-correlation, peak finding, -3 dB width, and
//! timing-tolerant calibration subtraction.
//!
//! Every primitive here is a pure function over slices. FFT planners are
//! constructed and dropped within each call rather than cached, matching
//! the batch, single-threaded nature of the pipeline (nothing is shared
//! across calls).

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex32;

use crate::params::EPSILON;

/// Zero-pad `x` to length `n`, forward real FFT it, and return the
/// magnitude-squared spectrum's first `n/2` bins: `|X[k]|^2 / n^2`.
pub fn power_spectrum(x: &[f32], n_fft: usize) -> Vec<f32> {
    let spectrum = forward_real_fft(x, n_fft);
    let norm = (n_fft as f32) * (n_fft as f32);
    spectrum[..n_fft / 2]
        .iter()
        .map(|c| c.norm_sqr() / norm)
        .collect()
}

/// Forward real FFT of `x`, zero-padded (or truncated) to `n_fft`.
/// Returns `n_fft/2 + 1` complex bins, DC through Nyquist.
fn forward_real_fft(x: &[f32], n_fft: usize) -> Vec<Complex32> {
    let mut planner = RealFftPlanner::<f32>::new();
    let r2c = planner.plan_fft_forward(n_fft);
    let mut input = r2c.make_input_vec();
    let copy_len = x.len().min(n_fft);
    input[..copy_len].copy_from_slice(&x[..copy_len]);
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut input, &mut spectrum)
        .expect("fixed-size real FFT plan never fails on correctly sized buffers");
    spectrum
}

/// Inverse real FFT: `spectrum` must hold `n_fft/2 + 1` bins. Returns
/// `n_fft` time-domain samples, correctly normalized.
fn inverse_real_fft(mut spectrum: Vec<Complex32>, n_fft: usize) -> Vec<f32> {
    let mut planner = RealFftPlanner::<f32>::new();
    let c2r = planner.plan_fft_inverse(n_fft);
    let mut output = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut output)
        .expect("fixed-size real IFFT plan never fails on correctly sized buffers");
    let norm = n_fft as f32;
    for v in &mut output {
        *v /= norm;
    }
    output
}

/// Lowest FFT bin index covering `freq_hz` and above (floor).
fn bin_floor(freq_hz: f64, n_fft: usize, sample_rate: f64) -> usize {
    ((freq_hz * n_fft as f64) / sample_rate).floor().max(0.0) as usize
}

/// Highest FFT bin index covering `freq_hz` and below (ceil).
fn bin_ceil(freq_hz: f64, n_fft: usize, sample_rate: f64) -> usize {
    ((freq_hz * n_fft as f64) / sample_rate).ceil().max(0.0) as usize
}

/// Mean power over the inclusive bin range covering `[f_lo, f_hi]`.
/// Returns the epsilon floor if the band contains no bins.
pub fn band_power(spectrum: &[f32], f_lo: f64, f_hi: f64, n_fft: usize, sample_rate: f64) -> f64 {
    let lo = (f_lo * n_fft as f64 / sample_rate).ceil().max(0.0) as usize;
    let hi = ((f_hi * n_fft as f64 / sample_rate).floor() as isize).max(0) as usize;
    let hi = hi.min(spectrum.len().saturating_sub(1));
    if lo > hi || lo >= spectrum.len() {
        return EPSILON;
    }
    let sum: f64 = spectrum[lo..=hi].iter().map(|&v| v as f64).sum();
    let count = (hi - lo + 1) as f64;
    (sum / count).max(EPSILON)
}

/// Phase-preserving brick-wall bandpass: zero all bins outside
/// `[f_lo, f_hi]` (and always zero DC and Nyquist), inverse FFT, truncate
/// back to `x.len()`.
pub fn bandpass(x: &[f32], f_lo: f64, f_hi: f64, n_fft: usize, sample_rate: f64) -> Vec<f32> {
    let mut spectrum = forward_real_fft(x, n_fft);
    let keep_lo = bin_floor(f_lo, n_fft, sample_rate);
    let keep_hi = bin_ceil(f_hi, n_fft, sample_rate).min(spectrum.len() - 1);
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let in_band = k >= keep_lo && k <= keep_hi;
        let is_dc_or_nyquist = k == 0 || k == spectrum.len() - 1;
        if !in_band || is_dc_or_nyquist {
            *bin = Complex32::new(0.0, 0.0);
        }
    }
    let filtered = inverse_real_fft(spectrum, n_fft);
    filtered[..x.len().min(n_fft)].to_vec()
}

/// Sliding-dot-product cross-correlation: `c[n] = sum_k s[n+k] * r[k]`.
/// The reference is used forward, not time-reversed — this is
/// correlation, not convolution. `signal.len()` must be at least
/// `reference.len()`; the output has length `signal.len() - reference.len() + 1`.
pub fn cross_correlate(signal: &[f32], reference: &[f32]) -> Vec<f32> {
    assert!(
        signal.len() >= reference.len(),
        "signal must be at least as long as the reference"
    );
    let out_len = signal.len() - reference.len() + 1;
    let mut out = Vec::with_capacity(out_len);
    for n in 0..out_len {
        let window = &signal[n..n + reference.len()];
        let acc: f32 = window
            .iter()
            .zip(reference.iter())
            .map(|(s, r)| s * r)
            .sum();
        out.push(acc);
    }
    out
}

/// Absolute-value maximum at or after `start`. Returns `(0, 0.0)` if
/// `start` is out of bounds.
pub fn find_peak(a: &[f32], start: usize) -> (usize, f32) {
    if start >= a.len() {
        return (0, 0.0);
    }
    let mut best_idx = start;
    let mut best_val = a[start].abs();
    for (i, &v) in a.iter().enumerate().skip(start + 1) {
        let v = v.abs();
        if v > best_val {
            best_val = v;
            best_idx = i;
        }
    }
    (best_idx, best_val)
}

/// Width (in samples) of the region around `peak` where `|a[i]|` stays at
/// or above `|a[peak]| / sqrt(2)` (the -3 dB point).
pub fn width_at_minus_3db(a: &[f32], peak: usize) -> usize {
    if a.is_empty() || peak >= a.len() {
        return 0;
    }
    let threshold = a[peak].abs() / std::f32::consts::SQRT_2;
    let mut left = peak;
    while left > 0 && a[left - 1].abs() >= threshold {
        left -= 1;
    }
    let mut right = peak;
    while right + 1 < a.len() && a[right + 1].abs() >= threshold {
        right += 1;
    }
    right - left
}

/// Median of `|a[i]|`, a robust noise-floor estimator. The mean of the two
/// middle values is used for even-length input.
pub fn median_abs(a: &[f32]) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f32> = a.iter().map(|v| v.abs()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Remove the stable direct-path response in `template` from `x`, allowing
/// an integer timing shift of up to `max_shift` samples and fitting the
/// best amplitude by least squares. Returns `x` unchanged over any region
/// beyond the template's length, and unchanged entirely if the template
/// has negligible energy.
pub fn subtract_calibration(x: &[f32], template: &[f32], max_shift: i32) -> Vec<f32> {
    let n = template.len().min(x.len());
    if n == 0 {
        return x.to_vec();
    }

    let mut best_shift = 0i32;
    let mut best_score = 0.0f64;
    for delta in -max_shift..=max_shift {
        let mut score = 0.0f64;
        for i in 0..n {
            let xi = i as i32 + delta;
            if xi < 0 || xi as usize >= x.len() {
                continue;
            }
            score += x[xi as usize] as f64 * template[i] as f64;
        }
        if score > best_score {
            best_score = score;
            best_shift = delta;
        }
    }
    // A negative-only maximum means no real alignment; treat as no shift
    // with zero inner product, which the energy guard below will zero out.
    if best_score <= 0.0 {
        best_shift = 0;
    }

    // c'[j] = template[j - best_shift], so that the inner product against
    // x at index j lines up with the lag that maximized the score above.
    let mut shifted = vec![0.0f32; n];
    for (j, slot) in shifted.iter_mut().enumerate() {
        let ti = j as i32 - best_shift;
        if ti >= 0 && (ti as usize) < n {
            *slot = template[ti as usize];
        }
    }

    let energy: f64 = shifted.iter().map(|&v| (v as f64) * (v as f64)).sum();
    if energy < EPSILON {
        return x.to_vec();
    }
    let inner: f64 = x[..n]
        .iter()
        .zip(shifted.iter())
        .map(|(&xi, &ci)| xi as f64 * ci as f64)
        .sum();
    let alpha = (inner / energy) as f32;

    let mut out = x.to_vec();
    for i in 0..n {
        out[i] -= alpha * shifted[i];
    }
    out
}
