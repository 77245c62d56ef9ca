//! Audio analysis pipeline (SPEC_FULL.md §4.3). Ported from
//! `AudioAnalyzer.analyze_audio`'s four stages (`extract_audio`,
//! `detect_voice_activity`, `detect_multiple_speakers`,
//! `detect_background_noise`) in
//! `examples/original_source/workers/proctor/analysis/audio_analysis.py`.

use super::capability::{AudioAnalyzer, Pcm};
use crate::events::{Event, EventKind};

const FRAME_DURATION_MS: f64 = 30.0;
const SILENCE_THRESHOLD_MS: f64 = 30_000.0;
const SPEAKER_SEGMENT_SECS: u32 = 5;
const SPEAKER_CHANGE_RATIO: f64 = 0.3;
const SPEAKER_CHANGE_MIN_ENERGY: f64 = 1000.0;
const SPEAKER_CHANGE_EVENT_THRESHOLD: usize = 3;
const NOISE_WINDOW_SECS: u32 = 2;
const NOISE_RMS_THRESHOLD: f64 = 5000.0;

fn accepted_sample_rate(rate: u32) -> bool {
    matches!(rate, 8000 | 16000 | 32000 | 48000)
}

/// Extracts PCM from `recording_path` and runs all three stages in sequence,
/// returning the merged event list. Extraction failure (or an unsupported
/// sample rate) yields an empty list, matching "failure here aborts the
/// detector with an empty list" (SPEC_FULL.md §4.3).
pub fn analyze(analyzer: &dyn AudioAnalyzer, recording_path: &str) -> Vec<Event> {
    let Some(pcm) = analyzer.extract_pcm(recording_path) else {
        return Vec::new();
    };
    let mut events = detect_voice_activity(analyzer, &pcm);
    events.extend(detect_speaker_changes(&pcm));
    events.extend(detect_background_noise(&pcm));
    events
}

/// Voice-activity detection over 30 ms frames (SPEC_FULL.md §4.3 step 2).
/// Tracks contiguous silent spans and emits one `SUSPICIOUS_SILENCE` per span
/// exceeding 30 s (strict `>`), including a trailing span at end-of-stream.
pub fn detect_voice_activity(analyzer: &dyn AudioAnalyzer, pcm: &Pcm) -> Vec<Event> {
    let mut events = Vec::new();
    if !accepted_sample_rate(pcm.sample_rate) {
        return events;
    }
    let frame_size = (pcm.sample_rate as f64 * FRAME_DURATION_MS / 1000.0) as usize;
    if frame_size == 0 {
        return events;
    }

    let mut silent_start_ms: Option<f64> = None;
    let mut time_ms = 0.0f64;
    for frame in pcm.samples.chunks(frame_size) {
        if frame.len() < frame_size {
            break;
        }
        let is_speech = analyzer.vad_frame(frame, pcm.sample_rate);
        if !is_speech {
            if silent_start_ms.is_none() {
                silent_start_ms = Some(time_ms);
            }
        } else if let Some(start) = silent_start_ms.take() {
            push_silence_if_long(&mut events, start, time_ms);
        }
        time_ms += FRAME_DURATION_MS;
    }
    if let Some(start) = silent_start_ms {
        push_silence_if_long(&mut events, start, time_ms);
    }
    events
}

fn push_silence_if_long(events: &mut Vec<Event>, start_ms: f64, end_ms: f64) {
    let duration_ms = end_ms - start_ms;
    if duration_ms > SILENCE_THRESHOLD_MS {
        events.push(
            Event::new(EventKind::SuspiciousSilence, start_ms / 1000.0)
                .with_extra("duration_seconds", duration_ms / 1000.0)
                .with_extra("start_time", start_ms / 1000.0)
                .with_extra("end_time", end_ms / 1000.0),
        );
    }
}

/// Energy-based speaker-change estimation over non-overlapping 5 s segments
/// (SPEC_FULL.md §4.3 step 3), plus a `MULTIPLE_SPEAKERS_DETECTED` summary
/// event when more than 3 changes are found.
pub fn detect_speaker_changes(pcm: &Pcm) -> Vec<Event> {
    let mut events = Vec::new();
    let segment_len = (pcm.sample_rate * SPEAKER_SEGMENT_SECS) as usize;
    if segment_len == 0 {
        return events;
    }
    let num_segments = pcm.samples.len() / segment_len;
    for i in 1..num_segments {
        let prev = &pcm.samples[(i - 1) * segment_len..i * segment_len];
        let curr = &pcm.samples[i * segment_len..(i + 1) * segment_len];
        let prev_energy = mean_abs_amplitude(prev);
        let curr_energy = mean_abs_amplitude(curr);
        if prev_energy > 0.0 {
            let ratio = (curr_energy - prev_energy).abs() / prev_energy;
            if ratio > SPEAKER_CHANGE_RATIO && curr_energy > SPEAKER_CHANGE_MIN_ENERGY {
                events.push(
                    Event::new(EventKind::PossibleSpeakerChange, i as f64 * SPEAKER_SEGMENT_SECS as f64)
                        .with_extra("energy_ratio", ratio)
                        .with_extra("segment_start", i as f64 * SPEAKER_SEGMENT_SECS as f64)
                        .with_extra("prev_energy", prev_energy)
                        .with_extra("curr_energy", curr_energy),
                );
            }
        }
    }
    if events.len() > SPEAKER_CHANGE_EVENT_THRESHOLD {
        let count = events.len();
        events.push(
            Event::new(EventKind::MultipleSpeakersDetected, 0.0)
                .with_extra("speaker_changes", count as u64)
                .with_extra("confidence", (count as f64 / 10.0).min(1.0)),
        );
    }
    events
}

fn mean_abs_amplitude(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64).abs()).sum();
    sum / samples.len() as f64
}

/// RMS background-noise detection over non-overlapping 2 s windows
/// (SPEC_FULL.md §4.3 step 4). A trailing partial window is dropped, not
/// evaluated.
pub fn detect_background_noise(pcm: &Pcm) -> Vec<Event> {
    let mut events = Vec::new();
    let window_size = (pcm.sample_rate * NOISE_WINDOW_SECS) as usize;
    let len = pcm.samples.len();
    if window_size == 0 || len <= window_size {
        return events;
    }
    let mut i = 0usize;
    while i < len - window_size {
        let window = &pcm.samples[i..i + window_size];
        let rms = rms_energy(window);
        if rms > NOISE_RMS_THRESHOLD {
            events.push(
                Event::new(EventKind::BackgroundNoise, i as f64 / pcm.sample_rate as f64)
                    .with_extra("rms_energy", rms)
                    .with_extra("duration", NOISE_WINDOW_SECS as f64),
            );
        }
        i += window_size;
    }
    events
}

fn rms_energy(samples: &[i16]) -> f64 {
    let sum_sq: f64 = samples.iter().map(|s| (*s as f64).powi(2)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysSilent;
    impl AudioAnalyzer for AlwaysSilent {
        fn extract_pcm(&self, _recording_path: &str) -> Option<Pcm> {
            None
        }
        fn vad_frame(&self, _frame: &[i16], _sample_rate: u32) -> bool {
            false
        }
    }

    #[test]
    fn extraction_failure_yields_empty_events() {
        let events = analyze(&AlwaysSilent, "missing.webm");
        assert!(events.is_empty());
    }

    struct StubVad {
        speech_frames: Vec<bool>,
    }
    impl AudioAnalyzer for StubVad {
        fn extract_pcm(&self, _recording_path: &str) -> Option<Pcm> {
            None
        }
        fn vad_frame(&self, frame: &[i16], _sample_rate: u32) -> bool {
            let idx = frame[0] as usize;
            self.speech_frames.get(idx).copied().unwrap_or(false)
        }
    }

    fn pcm_with_frame_markers(sample_rate: u32, num_frames: usize) -> Pcm {
        let frame_size = (sample_rate as f64 * FRAME_DURATION_MS / 1000.0) as usize;
        let mut samples = Vec::with_capacity(frame_size * num_frames);
        for i in 0..num_frames {
            samples.push(i as i16);
            samples.resize(samples.len() + frame_size - 1, 0);
        }
        Pcm { samples, sample_rate }
    }

    #[test]
    fn unsupported_sample_rate_yields_empty() {
        let pcm = Pcm {
            samples: vec![0; 1000],
            sample_rate: 11025,
        };
        let stub = StubVad { speech_frames: vec![] };
        assert!(detect_voice_activity(&stub, &pcm).is_empty());
    }

    #[test]
    fn silence_exactly_thirty_seconds_does_not_trigger() {
        // 1000 frames * 30ms = 30000ms exactly; boundary is strict `>`.
        let num_frames = 1000;
        let pcm = pcm_with_frame_markers(16000, num_frames + 1);
        let stub = StubVad {
            speech_frames: (0..=num_frames).map(|i| i == num_frames).collect(),
        };
        let events = detect_voice_activity(&stub, &pcm);
        assert!(events.is_empty());
    }

    #[test]
    fn silence_over_thirty_seconds_triggers_once() {
        let num_frames = 1001;
        let pcm = pcm_with_frame_markers(16000, num_frames + 1);
        let stub = StubVad {
            speech_frames: (0..=num_frames).map(|i| i == num_frames).collect(),
        };
        let events = detect_voice_activity(&stub, &pcm);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SuspiciousSilence);
    }

    #[test]
    fn trailing_silence_at_end_of_stream_is_reported() {
        let num_frames = 1001;
        let pcm = pcm_with_frame_markers(16000, num_frames);
        let stub = StubVad { speech_frames: vec![] };
        let events = detect_voice_activity(&stub, &pcm);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn speaker_change_requires_energy_above_threshold() {
        let sample_rate = 8000;
        let segment_len = (sample_rate * SPEAKER_SEGMENT_SECS) as usize;
        let mut samples = vec![0i16; segment_len];
        samples.extend(vec![5000i16; segment_len]);
        let pcm = Pcm { samples, sample_rate };
        let events = detect_speaker_changes(&pcm);
        assert!(events.iter().any(|e| e.kind == EventKind::PossibleSpeakerChange));
    }

    #[test]
    fn more_than_three_speaker_changes_yields_summary() {
        let sample_rate = 8000;
        let segment_len = (sample_rate * SPEAKER_SEGMENT_SECS) as usize;
        let mut samples = Vec::new();
        for i in 0..5 {
            let amplitude = if i % 2 == 0 { 0i16 } else { 20000i16 };
            samples.extend(vec![amplitude; segment_len]);
        }
        let pcm = Pcm { samples, sample_rate };
        let events = detect_speaker_changes(&pcm);
        assert!(events.iter().any(|e| e.kind == EventKind::MultipleSpeakersDetected));
    }

    #[test]
    fn loud_window_triggers_background_noise() {
        // Matches the source's `range(0, len - window_size, window_size)`:
        // for a two-window buffer, only the first window is ever evaluated.
        let sample_rate = 8000;
        let window_size = (sample_rate * NOISE_WINDOW_SECS) as usize;
        let samples = vec![8000i16; window_size * 2];
        let pcm = Pcm { samples, sample_rate };
        let events = detect_background_noise(&pcm);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::BackgroundNoise);
    }

    #[test]
    fn quiet_window_does_not_trigger_background_noise() {
        let sample_rate = 8000;
        let window_size = (sample_rate * NOISE_WINDOW_SECS) as usize;
        let samples = vec![10i16; window_size * 2];
        let pcm = Pcm { samples, sample_rate };
        assert!(detect_background_noise(&pcm).is_empty());
    }
}
