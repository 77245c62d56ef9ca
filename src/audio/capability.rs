//! Capability boundary for the audio detector (SPEC_FULL.md §4.3, §9). Mirrors
//! `super::video::capability::ImageAnalyzer` in shape: the pipeline logic
//! below this trait never touches a real codec or VAD binding directly, so it
//! can be driven by synthetic PCM in tests.

/// Mono, signed 16-bit PCM samples plus the sample rate they were recorded
/// at. The detector rejects any rate outside `{8000, 16000, 32000, 48000}`
/// (SPEC_FULL.md §4.3 step 2).
pub struct Pcm {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// `{extract_pcm, vad_frame}` (SPEC_FULL.md §9). A production binary wires
/// `extract_pcm` to a codec tool (e.g. ffmpeg) and `vad_frame` to a WebRTC-style
/// voice activity detector at aggressiveness level 2; tests wire both to
/// scripted stubs.
pub trait AudioAnalyzer: Send + Sync {
    /// Extracts mono 16 kHz signed-16-bit PCM from the recording at
    /// `recording_path`. Returns `None` on any extraction failure, matching
    /// "failure here aborts the detector with an empty list".
    fn extract_pcm(&self, recording_path: &str) -> Option<Pcm>;

    /// Classifies a single 30 ms frame (`sample_rate * 0.03` samples) as
    /// speech (`true`) or not (`false`).
    fn vad_frame(&self, frame: &[i16], sample_rate: u32) -> bool;
}

/// No-op [`AudioAnalyzer`]: reports no extractable audio, so the detector
/// always sees an extraction failure and runs zero audio events. Stands in
/// for the ffmpeg/VAD bindings this worker does not vendor (SPEC_FULL.md §9,
/// "Model coupling") until one is wired in via a real codec and VAD.
pub struct NullAudioAnalyzer;

impl AudioAnalyzer for NullAudioAnalyzer {
    fn extract_pcm(&self, _recording_path: &str) -> Option<Pcm> {
        None
    }

    fn vad_frame(&self, _frame: &[i16], _sample_rate: u32) -> bool {
        false
    }
}
