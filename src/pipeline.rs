//! The analysis pipeline: coherent averaging, band isolation, calibration
//! subtraction, matched filtering, and the three probe experiments.

use log::debug;

use crate::average::coherent_average;
use crate::calibration::CalibrationTemplate;
use crate::chirp::ChirpSpec;
use crate::dsp::{
    band_power, bandpass, cross_correlate, find_peak, median_abs, power_spectrum,
    subtract_calibration, width_at_minus_3db,
};
use crate::onset::detect_onsets;
use crate::params::{PipelineParams, EPSILON};

/// Experiment 1: is there energy in the 8-16 kHz alias band that is
/// time-locked to the transmitted chirp (as opposed to ambient noise)?
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AliasDetection {
    pub fundamental_db: f32,
    pub alias_db: f32,
    pub noise_db: f32,
    pub snr_db: f32,
    pub alias_below_fundamental_db: f32,
    pub passed: bool,
}

/// Experiment 2: does the alias-band energy behave like a frequency-
/// doubled, Nyquist-folded replica of the fundamental (a 16->8 kHz
/// downchirp), rather than incidental broadband correlation?
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCoherence {
    pub peak_sample: usize,
    pub distance_mm: f32,
    pub alias_peak_strength: f32,
    pub direction_ratio: f32,
    pub passed: bool,
}

/// Experiment 3: does stitching the fundamental and alias matched-filter
/// outputs together narrow the main lobe relative to the fundamental
/// alone?
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub fundamental_width: usize,
    pub stitched_width: usize,
    pub ratio: f32,
    pub passed: bool,
}

/// The full verdict of one probe run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub alias: AliasDetection,
    pub range: RangeCoherence,
    pub resolution: Resolution,
    pub all_confirmed: bool,
}

/// Run the full analysis: the crate's public §6 surface,
/// `analyze(recording, chirp_template, sample_rate, calibration_template?)`.
/// Uses the reference hardware's default [`PipelineParams`]; see
/// [`analyze_with_params`] to override any operational constant.
pub fn analyze(
    recording: &[f32],
    chirp: &[f32],
    sample_rate: f64,
    calibration: Option<&CalibrationTemplate>,
) -> ProbeResult {
    let mut params = PipelineParams::default();
    params.sample_rate = sample_rate;
    analyze_with_params(recording, chirp, calibration, &params)
}

/// As [`analyze`], but with an explicit, fully overridable parameter set.
pub fn analyze_with_params(
    recording: &[f32],
    chirp: &[f32],
    calibration: Option<&CalibrationTemplate>,
    params: &PipelineParams,
) -> ProbeResult {
    let onsets = detect_onsets(
        recording,
        chirp,
        params.cycle_len(),
        params.n_cycles,
        params.refine_window,
        params.lead_len,
    );
    debug!("detected {} onsets out of {} expected", onsets.len(), params.n_cycles);

    let alias = alias_detection(recording, &onsets, params);

    let (averaged, valid_cycles) = coherent_average(recording, &onsets, params.seg_len());
    debug!("coherent average used {valid_cycles} cycles");

    let (alias_band, fundamental_band) = isolate_bands(&averaged, calibration, params);

    let range = range_coherence(&alias_band, params);
    let resolution = resolution_improvement(&fundamental_band, &alias_band, &range, params);

    ProbeResult {
        alias,
        range,
        resolution,
        all_confirmed: alias.passed && range.passed && resolution.passed,
    }
}

/// Bandpass-filter the averaged segment into fundamental and alias
/// copies, then (if a calibration template is available) subtract the
/// template's own band-filtered copies. Per-band subtraction, not
/// broadband, since low-frequency content varies run to run and would
/// otherwise inflate the broadband inner product.
fn isolate_bands(
    averaged: &[f32],
    calibration: Option<&CalibrationTemplate>,
    params: &PipelineParams,
) -> (Vec<f32>, Vec<f32>) {
    let (alias_lo, alias_hi) = params.alias_band();
    let (fund_lo, fund_hi) = params.fundamental_band();

    let mut alias_band = bandpass(averaged, alias_lo, alias_hi, params.fft_len, params.sample_rate);
    let mut fundamental_band =
        bandpass(averaged, fund_lo, fund_hi, params.fft_len, params.sample_rate);

    if let Some(cal) = calibration {
        let cal_alias = bandpass(
            &cal.segment,
            alias_lo,
            alias_hi,
            params.fft_len,
            params.sample_rate,
        );
        let cal_fund = bandpass(
            &cal.segment,
            fund_lo,
            fund_hi,
            params.fft_len,
            params.sample_rate,
        );
        alias_band = subtract_calibration(&alias_band, &cal_alias, params.max_cal_shift);
        fundamental_band = subtract_calibration(&fundamental_band, &cal_fund, params.max_cal_shift);
    }

    (alias_band, fundamental_band)
}

fn alias_detection(recording: &[f32], onsets: &[usize], params: &PipelineParams) -> AliasDetection {
    let (alias_lo, alias_hi) = params.alias_band();
    let (fund_lo, fund_hi) = params.fundamental_band();
    let cycle_len = params.cycle_len();

    let mut alias_chirp_sum = 0.0f64;
    let mut alias_guard_sum = 0.0f64;
    let mut fundamental_sum = 0.0f64;
    let mut count = 0usize;

    for &onset in onsets {
        if onset + cycle_len > recording.len() {
            continue;
        }
        let chirp_window = &recording[onset..onset + params.chirp_len];
        let guard_window = &recording[onset + params.chirp_len..onset + cycle_len];

        let chirp_spectrum = power_spectrum(chirp_window, params.fft_len);
        let guard_spectrum = power_spectrum(guard_window, params.fft_len);

        alias_chirp_sum += band_power(&chirp_spectrum, alias_lo, alias_hi, params.fft_len, params.sample_rate);
        alias_guard_sum += band_power(&guard_spectrum, alias_lo, alias_hi, params.fft_len, params.sample_rate);
        fundamental_sum += band_power(&chirp_spectrum, fund_lo, fund_hi, params.fft_len, params.sample_rate);
        count += 1;
    }

    let to_db = |mean: f64| 10.0 * mean.max(EPSILON).log10();
    let (alias_db, noise_db, fundamental_db) = if count == 0 {
        (to_db(EPSILON), to_db(EPSILON), to_db(EPSILON))
    } else {
        let n = count as f64;
        (
            to_db(alias_chirp_sum / n),
            to_db(alias_guard_sum / n),
            to_db(fundamental_sum / n),
        )
    };

    let snr_db = (alias_db - noise_db) as f32;
    AliasDetection {
        fundamental_db: fundamental_db as f32,
        alias_db: alias_db as f32,
        noise_db: noise_db as f32,
        snr_db,
        alias_below_fundamental_db: (fundamental_db - alias_db) as f32,
        passed: snr_db > params.snr_threshold_db,
    }
}

fn range_coherence(alias_band: &[f32], params: &PipelineParams) -> RangeCoherence {
    let alias_ref = ChirpSpec::alias_reference(params).samples();
    let wrong_ref = ChirpSpec::wrong_direction_reference(params).samples();

    if alias_band.len() < alias_ref.len() {
        return RangeCoherence {
            peak_sample: 0,
            distance_mm: 0.0,
            alias_peak_strength: 0.0,
            direction_ratio: 0.0,
            passed: false,
        };
    }

    let corr_correct = cross_correlate(alias_band, &alias_ref);
    let corr_wrong = cross_correlate(alias_band, &wrong_ref);

    let skip = params.skip_lag.min(corr_correct.len().saturating_sub(1));
    let (p_alias, v_correct) = find_peak(&corr_correct, skip);
    let (_, v_wrong) = find_peak(&corr_wrong, skip);

    let noise_floor = median_abs(&corr_correct).max(EPSILON as f32);
    let peak_over_noise = v_correct / noise_floor;
    let direction_ratio = if v_wrong > 0.0 {
        v_correct / v_wrong
    } else {
        f32::INFINITY
    };

    let passed =
        peak_over_noise > params.peak_over_noise_threshold && direction_ratio > params.direction_threshold;

    let distance_mm = (p_alias as f32 / params.sample_rate as f32) * params.speed_of_sound / 2.0 * 1000.0;

    RangeCoherence {
        peak_sample: p_alias,
        distance_mm,
        alias_peak_strength: v_correct,
        direction_ratio,
        passed,
    }
}

fn resolution_improvement(
    fundamental_band: &[f32],
    alias_band: &[f32],
    range: &RangeCoherence,
    params: &PipelineParams,
) -> Resolution {
    let fundamental_ref = ChirpSpec::fundamental(params).samples();
    let alias_ref = ChirpSpec::alias_reference(params).samples();

    if fundamental_band.len() < fundamental_ref.len() || alias_band.len() < alias_ref.len() {
        return Resolution {
            fundamental_width: 0,
            stitched_width: 0,
            ratio: 0.0,
            passed: false,
        };
    }

    let corr_f = cross_correlate(fundamental_band, &fundamental_ref);
    let corr_a = cross_correlate(alias_band, &alias_ref);

    let p_a = range.peak_sample.min(corr_a.len().saturating_sub(1));
    let fundamental_width = width_at_minus_3db(&corr_f, p_a.min(corr_f.len().saturating_sub(1)));

    let common_len = corr_f.len().min(corr_a.len());
    let f_at_p = corr_f.get(p_a).copied().unwrap_or(0.0);
    let a_at_p = corr_a.get(p_a).copied().unwrap_or(0.0);

    let norm_f = if f_at_p > 0.0 { f_at_p } else { 1.0 };
    let norm_a = if a_at_p > 0.0 { a_at_p } else { 1.0 };

    let stitched: Vec<f32> = (0..common_len)
        .map(|i| corr_f[i] / norm_f + corr_a[i] / norm_a)
        .collect();
    let stitched_width = width_at_minus_3db(&stitched, p_a.min(stitched.len().saturating_sub(1)));

    let ratio = if stitched_width > 0 {
        fundamental_width as f32 / stitched_width as f32
    } else {
        0.0
    };

    Resolution {
        fundamental_width,
        stitched_width,
        ratio,
        passed: stitched_width > 0 && stitched_width < fundamental_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::calibrate_with_params;
    use crate::chirp::build_playback;

    fn xorshift(state: &mut u32) -> f32 {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        (*state as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    fn add_noise(signal: &mut [f32], amplitude: f32, state: &mut u32) {
        for s in signal.iter_mut() {
            *s += amplitude * xorshift(state);
        }
    }

    #[test]
    fn no_reflector_recording_fails_both_alias_and_range_tests() {
        let params = PipelineParams::default();
        let chirp = ChirpSpec::fundamental(&params).samples();
        let mut recording =
            build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);
        let mut state = 1u32;
        add_noise(&mut recording, 0.01, &mut state); // -40 dBFS-ish

        let result = analyze(&recording, &chirp, params.sample_rate, None);

        assert!(!result.alias.passed);
        assert!(!result.range.passed);
    }

    #[test]
    fn injected_alias_downchirp_is_detected_with_correct_direction() {
        let params = PipelineParams::default();
        let chirp = ChirpSpec::fundamental(&params).samples();
        let mut recording =
            build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);

        let alias_ref = ChirpSpec::alias_reference(&params).samples();
        let delay = 90usize;
        let amplitude = 10f32.powf(-25.0 / 20.0);
        for cycle in 0..params.n_cycles {
            let base = params.lead_len + cycle * params.cycle_len() + delay;
            if base + alias_ref.len() > recording.len() {
                break;
            }
            for (i, &s) in alias_ref.iter().enumerate() {
                recording[base + i] += amplitude * s;
            }
        }
        let mut state = 2u32;
        add_noise(&mut recording, 0.01, &mut state);

        let calibration = calibrate_with_params(
            &build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len),
            &chirp,
            &params,
        );

        let result = analyze(&recording, &chirp, params.sample_rate, Some(&calibration));

        assert!(result.alias.snr_db > 10.0, "snr was {}", result.alias.snr_db);
        assert!(result.range.direction_ratio > params.direction_threshold);
        assert!(
            (85..=95).contains(&result.range.peak_sample),
            "peak at {}",
            result.range.peak_sample
        );
    }

    #[test]
    fn wrong_direction_injection_fails_range_coherence_despite_alias_energy() {
        let params = PipelineParams::default();
        let chirp = ChirpSpec::fundamental(&params).samples();
        let mut recording =
            build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);

        let wrong_ref = ChirpSpec::wrong_direction_reference(&params).samples();
        let delay = 90usize;
        let amplitude = 10f32.powf(-25.0 / 20.0);
        for cycle in 0..params.n_cycles {
            let base = params.lead_len + cycle * params.cycle_len() + delay;
            if base + wrong_ref.len() > recording.len() {
                break;
            }
            for (i, &s) in wrong_ref.iter().enumerate() {
                recording[base + i] += amplitude * s;
            }
        }
        let mut state = 3u32;
        add_noise(&mut recording, 0.01, &mut state);

        let calibration = calibrate_with_params(
            &build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len),
            &chirp,
            &params,
        );

        let result = analyze(&recording, &chirp, params.sample_rate, Some(&calibration));

        assert!(result.alias.passed, "alias energy should be present");
        assert!(
            result.range.direction_ratio < 1.0,
            "direction ratio was {}",
            result.range.direction_ratio
        );
        assert!(!result.range.passed);
    }

    #[test]
    fn missing_calibration_still_returns_a_valid_result() {
        let params = PipelineParams::default();
        let chirp = ChirpSpec::fundamental(&params).samples();
        let recording =
            build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);
        let result = analyze(&recording, &chirp, params.sample_rate, None);
        // No panics, and a well-formed result with a valid peak index.
        assert!(result.range.peak_sample < params.seg_len());
    }

    #[test]
    fn stitched_resolution_is_never_wider_when_it_passes() {
        let params = PipelineParams::default();
        let chirp = ChirpSpec::fundamental(&params).samples();
        let mut recording =
            build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);

        // Reflect into both bands at the same delay, as a real reflector would.
        let alias_ref = ChirpSpec::alias_reference(&params).samples();
        let delay = 33usize;
        let inject = |recording: &mut Vec<f32>, reference: &[f32], amplitude: f32| {
            for cycle in 0..params.n_cycles {
                let base = params.lead_len + cycle * params.cycle_len() + delay;
                if base + reference.len() > recording.len() {
                    break;
                }
                for (i, &s) in reference.iter().enumerate() {
                    recording[base + i] += amplitude * s;
                }
            }
        };
        inject(&mut recording, &chirp, 10f32.powf(-22.0 / 20.0));
        inject(&mut recording, &alias_ref, 10f32.powf(-18.0 / 20.0));

        let result = analyze(&recording, &chirp, params.sample_rate, None);
        assert!(result.resolution.passed);
        assert!(result.resolution.ratio >= 1.3, "ratio was {}", result.resolution.ratio);
    }
}
