//! Linear FM chirp generation and playback buffer construction.

use core::f64::consts::PI;

use crate::params::PipelineParams;

/// A linear frequency-modulated chirp specification.
///
/// `f0` may be greater than `f1`; a downchirp is a first-class signal here
/// since it is used both as the alias reference (16->8 kHz) and the
/// wrong-direction reference (8->16 kHz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChirpSpec {
    pub f0: f64,
    pub f1: f64,
    pub len: usize,
    pub sample_rate: f64,
    pub amplitude: f32,
}

impl ChirpSpec {
    /// The transmitted fundamental: 16 kHz to 20 kHz.
    pub fn fundamental(params: &PipelineParams) -> Self {
        Self {
            f0: params.f0,
            f1: params.f1,
            len: params.chirp_len,
            sample_rate: params.sample_rate,
            amplitude: 1.0,
        }
    }

    /// The predicted second-harmonic alias: a 16 kHz to 8 kHz downchirp.
    pub fn alias_reference(params: &PipelineParams) -> Self {
        Self {
            f0: params.f0,
            f1: params.f0 / 2.0,
            len: params.chirp_len,
            sample_rate: params.sample_rate,
            amplitude: 1.0,
        }
    }

    /// The nonsense hypothesis used to rule out incidental correlation: an
    /// 8 kHz to 16 kHz upchirp, same span as the alias reference but swept
    /// in the wrong direction.
    pub fn wrong_direction_reference(params: &PipelineParams) -> Self {
        Self {
            f0: params.f0 / 2.0,
            f1: params.f0,
            len: params.chirp_len,
            sample_rate: params.sample_rate,
            amplitude: 1.0,
        }
    }

    /// Synthesize the chirp's samples.
    ///
    /// Phase is accumulated analytically rather than by a running
    /// oscillator, so it stays exact regardless of `len`:
    /// phi(t) = 2*pi*(f0*t + 0.5*k*t^2), k = (f1-f0)/T.
    pub fn samples(&self) -> Vec<f32> {
        let t_total = self.len as f64 / self.sample_rate;
        let k = if t_total > 0.0 {
            (self.f1 - self.f0) / t_total
        } else {
            0.0
        };
        (0..self.len)
            .map(|i| {
                let t = i as f64 / self.sample_rate;
                let phase = 2.0 * PI * (self.f0 * t + 0.5 * k * t * t);
                (self.amplitude as f64 * phase.sin()) as f32
            })
            .collect()
    }
}

/// Build the full playback waveform: leading silence, then `n_cycles`
/// repetitions of `{chirp, guard zeros}`.
pub fn build_playback(chirp: &[f32], n_cycles: usize, lead: usize, guard: usize) -> Vec<f32> {
    let cycle_len = chirp.len() + guard;
    let mut out = Vec::with_capacity(lead + n_cycles * cycle_len);
    out.resize(lead, 0.0);
    for _ in 0..n_cycles {
        out.extend_from_slice(chirp);
        out.resize(out.len() + guard, 0.0);
    }
    out
}
