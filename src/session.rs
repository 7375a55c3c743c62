//! The audio I/O boundary. Implementing a real `AudioSession` (CoreAudio,
//! ALSA, WASAPI, ...) is explicitly out of scope for this crate — see the
//! top-level docs — but the trait and error type live here so that
//! `calibrate`/`analyze` callers and platform audio crates share one
//! typed contract instead of an ad hoc tuple of buffers.

/// A time-synchronous capture of the crate's own playback.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Captured mono samples at `sample_rate`.
    pub samples: Vec<f32>,
    /// The effective sample rate the audio session actually ran at; may
    /// differ from the rate requested for playback synthesis.
    pub sample_rate: f64,
}

/// Failure modes of the external audio subsystem. None of these originate
/// inside the analysis pipeline itself — the pipeline is never invoked
/// once session setup has failed.
#[derive(thiserror::Error, Debug)]
pub enum AudioSessionError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to configure play-and-record session: {0}")]
    SessionConfiguration(String),
    #[error("recording buffer allocation failed")]
    BufferAllocation,
}

/// Plays a waveform through the default loudspeaker while recording from
/// the default microphone in the same session, returning the full
/// time-synchronous capture.
///
/// Implementations must: start capture at least 200 ms before playback
/// begins and continue at least 500 ms after playback ends (so the
/// direct-path and any reflections are fully captured); request an I/O
/// buffer of 5 ms or less; and tap the input node at its native hardware
/// format, since requesting a mismatched channel count can silently
/// yield zeros on some platforms.
pub trait AudioSession {
    fn play_and_record(
        &self,
        playback: &[f32],
        expected_duration_samples: usize,
    ) -> Result<Recording, AudioSessionError>;
}
