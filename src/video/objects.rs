//! Object-detection class ids and confidence threshold (SPEC_FULL.md §4.2).
//!
//! These are YOLO's 80-class COCO ordering (`person` = 0, `cell phone` =
//! 67), the scheme the original analysis pipeline (and this spec) is written
//! against. The teacher's own `analytics.rs` carried a different, 90-slot
//! TensorFlow-SSD-style label array with retired-category gaps (`cell
//! phone` at raw index 77) — not compatible with these ids, so it is not
//! reused here beyond its general shape.

pub const PERSON_CLASS_ID: u32 = 0;
pub const PHONE_CLASS_ID: u32 = 67;
pub const SCORE_THRESHOLD: f32 = 0.5;
