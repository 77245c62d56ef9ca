//! The risk engine (SPEC_FULL.md §4.4): policy tables plus the scoring
//! algorithm that consumes them.

pub mod engine;
pub mod weights;

pub use engine::{score, Breakdown, QuestionContext, RiskCategory, ViolationDetails};
