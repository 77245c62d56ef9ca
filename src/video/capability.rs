//! Capability boundary for the video detector. Nothing in [`super::detector`]
//! knows how a face is meshed or a box is classified; it only knows the
//! shapes below. A production binary wires this to a face-mesh model and a
//! YOLO-style detector (by native bindings or a sidecar); tests wire it to a
//! scripted stub (SPEC_FULL.md §9).

/// Six canonical landmarks in pixel coordinates, in the fixed order the
/// head-pose solver expects: nose tip, chin, left eye outer corner, right
/// eye outer corner, left mouth corner, right mouth corner.
pub type FaceLandmarks = [(f64, f64); 6];

pub struct DetectedFace {
    pub landmarks: FaceLandmarks,
}

pub struct DetectedObject {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// `{detect_faces, detect_objects}` (SPEC_FULL.md §9). A frame that fails to
/// decode is the caller's concern, not this trait's: implementations take an
/// already-decoded frame and report what they see in it, or an empty result.
pub trait ImageAnalyzer: Send + Sync {
    /// At most one face (the pipeline is configured for a single candidate).
    fn detect_faces(&self, frame_jpeg: &[u8]) -> Vec<DetectedFace>;
    fn detect_objects(&self, frame_jpeg: &[u8]) -> Vec<DetectedObject>;
}

/// Decode-and-decimate boundary (SPEC_FULL.md §4.2 step 1): wraps whatever
/// media tool turns a recording into 2 fps JPEG frames. Kept separate from
/// [`ImageAnalyzer`] because it's a container-demuxing concern, not a
/// model-inference one.
pub trait FrameSource: Send + Sync {
    /// Decodes `recording_path` into JPEG frames at 2 fps, in order. Returns
    /// an empty vector if decoding fails outright (the caller then runs zero
    /// frames of analysis, producing no video events).
    fn decode_frames(&self, recording_path: &str) -> Vec<Vec<u8>>;
}

/// No-op [`ImageAnalyzer`]/[`FrameSource`] pair: reports no faces, no
/// objects, no frames. Stands in for the native face-mesh/YOLO bindings and
/// ffmpeg wrapper this worker does not vendor (SPEC_FULL.md §9, "Model
/// coupling") until one is wired in via `MODEL_PATH` and a real decoder.
pub struct NullImageAnalyzer;

impl ImageAnalyzer for NullImageAnalyzer {
    fn detect_faces(&self, _frame_jpeg: &[u8]) -> Vec<DetectedFace> {
        Vec::new()
    }
    fn detect_objects(&self, _frame_jpeg: &[u8]) -> Vec<DetectedObject> {
        Vec::new()
    }
}

impl FrameSource for NullImageAnalyzer {
    fn decode_frames(&self, _recording_path: &str) -> Vec<Vec<u8>> {
        Vec::new()
    }
}
