//! Acoustic ranging over commodity speaker/microphone hardware.
//!
//! Modern phone speakers and microphones are not perfectly linear or
//! perfectly band-limited. A chirp transmitted just above the audible
//! range (16-20 kHz) leaks a second-harmonic, Nyquist-aliased replica into
//! the 8-16 kHz band through speaker nonlinearity and imperfect anti-alias
//! filtering. That aliased replica sweeps downward (20->16 becomes
//! 8->... folded about Nyquist) and carries the same round-trip delay
//! information as the fundamental, but at roughly double its bandwidth
//! once the two bands are stitched together in a matched filter.
//!
//! This crate turns a recorded chirp-train capture into a ranging
//! verdict: [`pipeline::analyze`] runs onset detection, coherent
//! averaging, per-band isolation, optional calibration subtraction, and
//! three independent experiments (alias detection, range coherence,
//! resolution improvement), returning a [`pipeline::ProbeResult`].
//!
//! Driving real hardware (opening an audio session, playing a chirp train
//! while recording) is out of scope here; [`session::AudioSession`] is the
//! typed boundary a platform crate implements to hand this crate a
//! [`session::Recording`].
//!
//! ```no_run
//! use acoufold::{calibration, chirp, params::PipelineParams, pipeline, session::AudioSession};
//!
//! fn run(session: &impl AudioSession) {
//!     let params = PipelineParams::default();
//!     let chirp = chirp::ChirpSpec::fundamental(&params).samples();
//!     let playback = chirp::build_playback(&chirp, params.n_cycles, params.lead_len, params.guard_len);
//!
//!     let cal_recording = session.play_and_record(&playback, playback.len()).unwrap();
//!     let template = calibration::calibrate(&cal_recording.samples, &chirp, cal_recording.sample_rate);
//!
//!     let probe_recording = session.play_and_record(&playback, playback.len()).unwrap();
//!     let result = pipeline::analyze(
//!         &probe_recording.samples,
//!         &chirp,
//!         probe_recording.sample_rate,
//!         Some(&template),
//!     );
//!     println!("{:?}", result.all_confirmed);
//! }
//! ```

pub mod average;
pub mod calibration;
pub mod chirp;
pub mod dsp;
pub mod onset;
pub mod params;
pub mod pipeline;
pub mod session;

pub use calibration::{calibrate, calibrate_with_params, CalibrationTemplate};
pub use chirp::{build_playback, ChirpSpec};
pub use params::PipelineParams;
pub use pipeline::{analyze, analyze_with_params, AliasDetection, ProbeResult, RangeCoherence, Resolution};
pub use session::{AudioSession, AudioSessionError, Recording};
