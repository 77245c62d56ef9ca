//! The audio detector (SPEC_FULL.md §4.3): PCM extraction, voice-activity
//! silence spans, energy-based speaker-change estimation, and RMS background
//! noise, behind the [`AudioAnalyzer`] capability (SPEC_FULL.md §9 Design
//! Notes).

mod capability;
mod detector;

pub use capability::{AudioAnalyzer, NullAudioAnalyzer, Pcm};
pub use detector::{analyze, detect_background_noise, detect_speaker_changes, detect_voice_activity};
