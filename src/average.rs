//! Coherent per-cycle averaging.

/// Sum `recording[o .. o + seg_len]` for every onset `o` whose window
/// fits inside the recording, then divide by the number of segments that
/// were actually added. Onsets whose window runs past the end of the
/// recording are silently skipped, per the pipeline's degenerate-input
/// policy — callers get back the valid count rather than an error.
///
/// Returns `(averaged_segment, valid_cycle_count)`. If no onset yields a
/// valid segment, the averaged segment is all zeros and the count is 0.
pub fn coherent_average(recording: &[f32], onsets: &[usize], seg_len: usize) -> (Vec<f32>, usize) {
    let mut acc = vec![0.0f64; seg_len];
    let mut valid = 0usize;

    for &onset in onsets {
        if onset + seg_len > recording.len() {
            continue;
        }
        for (a, &x) in acc.iter_mut().zip(&recording[onset..onset + seg_len]) {
            *a += x as f64;
        }
        valid += 1;
    }

    let averaged = if valid == 0 {
        vec![0.0f32; seg_len]
    } else {
        acc.iter().map(|&v| (v / valid as f64) as f32).collect()
    };
    (averaged, valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averaging_identical_segments_returns_that_segment() {
        let segment: Vec<f32> = (0..300).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut recording = Vec::new();
        let onsets: Vec<usize> = (0..10)
            .map(|i| {
                let start = recording.len();
                recording.extend_from_slice(&segment);
                let _ = i;
                start
            })
            .collect();

        let (averaged, valid) = coherent_average(&recording, &onsets, segment.len());
        assert_eq!(valid, 10);
        for (a, b) in averaged.iter().zip(segment.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn out_of_bounds_onsets_are_skipped_not_errors() {
        let recording = vec![1.0f32; 100];
        let onsets = vec![0, 50, 90]; // 90 + 20 > 100, should be skipped
        let (_averaged, valid) = coherent_average(&recording, &onsets, 20);
        assert_eq!(valid, 2);
    }

    #[test]
    fn averaging_independent_noise_reduces_rms_by_sqrt_n() {
        // A simple deterministic pseudo-noise generator (xorshift) keeps
        // this test free of any RNG dependency.
        fn xorshift(state: &mut u32) -> f32 {
            *state ^= *state << 13;
            *state ^= *state >> 17;
            *state ^= *state << 5;
            (*state as f32 / u32::MAX as f32) * 2.0 - 1.0
        }

        let seg_len = 200;
        let n = 64;
        let mut state = 0x1234_5678u32;
        let mut recording = Vec::with_capacity(n * seg_len);
        for _ in 0..n * seg_len {
            recording.push(xorshift(&mut state));
        }
        let onsets: Vec<usize> = (0..n).map(|i| i * seg_len).collect();

        let (averaged, valid) = coherent_average(&recording, &onsets, seg_len);
        assert_eq!(valid, n);

        let rms = |x: &[f32]| -> f32 {
            (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
        };
        let single_rms = rms(&recording[..seg_len]);
        let averaged_rms = rms(&averaged);
        // White noise should be attenuated roughly by sqrt(n); allow
        // generous slack since this is a short, non-Gaussian sequence.
        assert!(averaged_rms < single_rms / (n as f32).sqrt() * 3.0);
    }
}
