//! Operational parameters for the ranging pipeline.
//!
//! All constants named in the design are grouped here instead of scattered
//! through the pipeline as magic numbers, so a caller targeting different
//! hardware can recalibrate thresholds without touching DSP code.

/// Every configurable constant of the acoustic ranging pipeline.
///
/// `Default` reproduces the reference hardware setup: a 48 kHz session, a
/// 2400-sample 16-20 kHz chirp, 200 cycles with a 1200-sample guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    /// Sample rate of chirp synthesis and the expected recording, in Hz.
    pub sample_rate: f64,
    /// Chirp fundamental low edge, in Hz.
    pub f0: f64,
    /// Chirp fundamental high edge, in Hz.
    pub f1: f64,
    /// Chirp length in samples (L_c).
    pub chirp_len: usize,
    /// Silent samples between chirps within a cycle (L_guard).
    pub guard_len: usize,
    /// Number of cycles in one playback (N_cycles).
    pub n_cycles: usize,
    /// Leading silence before the first cycle, in samples (L_lead).
    pub lead_len: usize,
    /// Correlation margin appended to the chirp length for the averaged
    /// segment (M). Bounds the maximum resolvable round-trip delay.
    pub seg_margin: usize,
    /// FFT size used for spectra and bandpass filtering (N_fft).
    pub fft_len: usize,
    /// Search half-window for onset refinement, in samples (W).
    pub refine_window: usize,
    /// Lags skipped at the start of a matched-filter output before peak
    /// search (suppresses on-set artifacts).
    pub skip_lag: usize,
    /// Maximum integer lag searched during calibration subtraction.
    pub max_cal_shift: i32,
    /// Alias SNR threshold for experiment 1, in dB.
    pub snr_threshold_db: f32,
    /// Peak / noise-floor ratio threshold for experiment 2.
    pub peak_over_noise_threshold: f32,
    /// Correct / wrong direction ratio threshold for experiment 2.
    pub direction_threshold: f32,
    /// Speed of sound used to convert sample delay to range, in m/s.
    pub speed_of_sound: f32,
}

impl PipelineParams {
    /// Chirp duration, in seconds.
    pub fn chirp_duration(&self) -> f64 {
        self.chirp_len as f64 / self.sample_rate
    }

    /// Length of one playback cycle: chirp plus guard.
    pub fn cycle_len(&self) -> usize {
        self.chirp_len + self.guard_len
    }

    /// Length of a coherently averaged segment: chirp plus margin.
    pub fn seg_len(&self) -> usize {
        self.chirp_len + self.seg_margin
    }

    /// Alias band, 8-16 kHz by construction (half and full fundamental
    /// low edge).
    pub fn alias_band(&self) -> (f64, f64) {
        (self.f0 / 2.0, self.f0)
    }

    /// Fundamental band, f0-f1.
    pub fn fundamental_band(&self) -> (f64, f64) {
        (self.f0, self.f1)
    }
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            f0: 16_000.0,
            f1: 20_000.0,
            chirp_len: 2400,
            guard_len: 1200,
            n_cycles: 200,
            lead_len: 24_000,
            seg_margin: 600,
            fft_len: 4096,
            refine_window: 50,
            skip_lag: 20,
            max_cal_shift: 10,
            snr_threshold_db: 3.0,
            peak_over_noise_threshold: 2.0,
            direction_threshold: 1.5,
            speed_of_sound: 343.0,
        }
    }
}

/// Floor applied to band power and other quantities before taking a
/// logarithm or dividing, so near-zero inputs never produce `-inf`/`NaN`.
pub const EPSILON: f64 = 1e-20;
