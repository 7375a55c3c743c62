//! Calibration: capture a no-reflector recording once per session and
//! retain its averaged segment as the stable direct-path template that
//! every subsequent analysis subtracts out.

use log::warn;

use crate::average::coherent_average;
use crate::onset::detect_onsets;
use crate::params::PipelineParams;

/// The direct-path response, averaged over a no-reflector recording.
/// Immutable once built; re-used by every `analyze` call in the session.
#[derive(Debug, Clone)]
pub struct CalibrationTemplate {
    /// Averaged segment, `chirp_len + seg_margin` samples long.
    pub segment: Vec<f32>,
    /// Number of cycles that actually contributed to the average.
    pub cycles_used: usize,
}

/// Run onset detection and coherent averaging on a no-reflector
/// recording, producing the template later analyses subtract.
///
/// This is the crate's public §6 surface: `calibrate(recording,
/// chirp_template, sample_rate)`. It runs with the reference hardware's
/// default [`PipelineParams`]; use [`calibrate_with_params`] to override
/// any operational constant.
pub fn calibrate(recording: &[f32], chirp: &[f32], sample_rate: f64) -> CalibrationTemplate {
    let mut params = PipelineParams::default();
    params.sample_rate = sample_rate;
    calibrate_with_params(recording, chirp, &params)
}

/// As [`calibrate`], but with an explicit, fully overridable parameter set.
pub fn calibrate_with_params(
    recording: &[f32],
    chirp: &[f32],
    params: &PipelineParams,
) -> CalibrationTemplate {
    let onsets = detect_onsets(
        recording,
        chirp,
        params.cycle_len(),
        params.n_cycles,
        params.refine_window,
        params.lead_len,
    );
    let (segment, cycles_used) = coherent_average(recording, &onsets, params.seg_len());
    if cycles_used < params.n_cycles {
        warn!(
            "calibration used {cycles_used}/{} cycles (recording may be short or noisy)",
            params.n_cycles
        );
    }
    CalibrationTemplate {
        segment,
        cycles_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chirp::{build_playback, ChirpSpec};

    #[test]
    fn calibration_on_a_clean_synthetic_recording_uses_every_cycle() {
        let params = PipelineParams::default();
        let chirp = ChirpSpec::fundamental(&params).samples();
        let recording =
            build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);

        let template = calibrate_with_params(&recording, &chirp, &params);

        assert_eq!(template.cycles_used, params.n_cycles);
        assert_eq!(template.segment.len(), params.seg_len());
    }
}
