//! The video detector (SPEC_FULL.md §4.2): frame decimation, head-pose
//! estimation and object detection over a decoded recording. The heavy
//! native dependencies (a face-mesh model, a general object detector) sit
//! behind the [`ImageAnalyzer`] capability so the pipeline logic here stays
//! pure and independently testable (SPEC_FULL.md §9 Design Notes).

mod capability;
mod detector;
mod objects;
mod pose;

pub use capability::{DetectedFace, DetectedObject, FrameSource, ImageAnalyzer, NullImageAnalyzer};
pub use detector::analyze_frames;
pub use objects::{PERSON_CLASS_ID, PHONE_CLASS_ID, SCORE_THRESHOLD};
pub use pose::head_pose;
