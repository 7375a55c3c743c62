//! Per-cycle chirp onset detection: coarse correlation to find the first
//! cycle, then a self-correcting refinement pass over the rest.

use crate::dsp::{cross_correlate, find_peak};

/// Locate the sample index of each transmitted chirp in `recording`.
///
/// The coarse pass cross-correlates the first `min(len, 4*cycle_len +
/// lead_len)` samples against `chirp` to find cycle 0 — the `lead_len`
/// term extends the coarse window far enough to cover the playback's
/// leading silence, without which the first cycle would sit outside a
/// bare `4*cycle_len` window. Each subsequent cycle is expected at the
/// *previous accepted onset* plus `cycle_len`, searched within `+/-
/// window` samples — this lets the detector track slow sample-rate drift
/// instead of assuming a fixed stride. Detection stops early once a
/// search window would run past the end of the recording.
pub fn detect_onsets(
    recording: &[f32],
    chirp: &[f32],
    cycle_len: usize,
    n_cycles: usize,
    window: usize,
    lead_len: usize,
) -> Vec<usize> {
    if recording.len() < chirp.len() || n_cycles == 0 {
        return Vec::new();
    }

    let coarse_span = recording.len().min(4 * cycle_len + lead_len);
    if coarse_span < chirp.len() {
        return Vec::new();
    }
    let coarse_corr = cross_correlate(&recording[..coarse_span], chirp);
    let (onset0, _) = find_peak(&coarse_corr, 0);

    let mut onsets = Vec::with_capacity(n_cycles);
    onsets.push(onset0);

    for j in 1..n_cycles {
        let expected = onsets[j - 1] + cycle_len;
        let lo = expected.saturating_sub(window);
        let max_start = recording.len().saturating_sub(chirp.len());
        let hi_start = (expected + window).min(max_start);
        if lo > hi_start {
            break;
        }
        let hi_exclusive = hi_start + chirp.len();
        if hi_exclusive > recording.len() {
            break;
        }
        let window_slice = &recording[lo..hi_exclusive];
        let local_corr = cross_correlate(window_slice, chirp);
        let (local_peak, _) = find_peak(&local_corr, 0);
        onsets.push(lo + local_peak);
    }

    onsets
}
