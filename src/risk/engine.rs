//! The risk engine (SPEC_FULL.md §4.4): a pure function from an event list
//! and test context to a capped, categorized, explainable score. Ported from
//! `ImprovedRiskCalculator.calculate_risk_score` in
//! `examples/original_source/workers/proctor/analysis/risk_calculator.py`;
//! the coexisting `LegacyRiskCalculator` in that file is intentionally not
//! ported (SPEC_FULL.md §9).

use super::weights::{
    is_context_adjustment_kind, is_critical, is_high_risk_violation, is_pattern_gap_kind,
    is_physical, is_rapid_switch_kind, pattern_severity, question_normalization_factor, weight,
};
use crate::events::{Event, EventKind};
use db::TestContext;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    fn from_score(total: f64) -> RiskCategory {
        if total < 15.0 {
            RiskCategory::Low
        } else if total < 35.0 {
            RiskCategory::Medium
        } else if total < 60.0 {
            RiskCategory::High
        } else {
            RiskCategory::Critical
        }
    }

    /// Ordinal used to check the "category never regresses as score rises"
    /// property (SPEC_FULL.md §8).
    pub fn rank(self) -> u8 {
        match self {
            RiskCategory::Low => 0,
            RiskCategory::Medium => 1,
            RiskCategory::High => 2,
            RiskCategory::Critical => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViolationDetails {
    pub high_risk_violations: BTreeMap<String, u32>,
    pub pattern_violations: Vec<String>,
    pub total_violations: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    pub total_questions: u32,
    pub violations_per_question: f64,
    pub high_risk_per_question: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Breakdown {
    pub total_score: f64,
    pub base_score: f64,
    pub pattern_score: f64,
    pub temporal_score: f64,
    pub context_adjustment: f64,
    pub risk_category: RiskCategory,
    pub violation_details: ViolationDetails,
    pub question_context: QuestionContext,
}

/// Scores `events` against `ctx`. Pure: identical inputs always produce a
/// byte-identical breakdown (once serialized).
pub fn score(events: &[Event], ctx: &TestContext) -> Breakdown {
    let total_questions = ctx.total_questions.max(1);
    let q = question_normalization_factor(total_questions);

    let mut by_kind: HashMap<&str, Vec<&Event>> = HashMap::new();
    for e in events {
        by_kind.entry(e.kind.as_str()).or_default().push(e);
    }

    let base_score = base_score(&by_kind, total_questions, q);

    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());

    let (pattern_score, pattern_violations) = pattern_score(&sorted, total_questions);
    let temporal_score = temporal_score(&sorted);
    let context_adjustment = context_adjustment(&sorted, total_questions, ctx.duration_minutes);

    let total_score = (base_score + pattern_score + temporal_score + context_adjustment).min(100.0);
    let risk_category = RiskCategory::from_score(total_score);

    let mut high_risk_violations = BTreeMap::new();
    for e in events {
        if is_high_risk_violation(&e.kind) {
            *high_risk_violations
                .entry(e.kind.as_str().to_string())
                .or_insert(0u32) += 1;
        }
    }
    let high_risk_count: u32 = events.iter().filter(|e| is_context_adjustment_kind(&e.kind)).count() as u32;

    Breakdown {
        total_score,
        base_score,
        pattern_score,
        temporal_score,
        context_adjustment,
        risk_category,
        violation_details: ViolationDetails {
            high_risk_violations,
            pattern_violations,
            total_violations: events.len() as u32,
        },
        question_context: QuestionContext {
            total_questions,
            violations_per_question: events.len() as f64 / total_questions as f64,
            high_risk_per_question: high_risk_count as f64 / total_questions as f64,
        },
    }
}

fn base_score(by_kind: &HashMap<&str, Vec<&Event>>, total_questions: u32, q: f64) -> f64 {
    // Sum in a fixed key order: `HashMap`'s randomized iteration order would
    // otherwise make the float summation order (and so the summed total,
    // which isn't perfectly associative) vary run to run.
    let mut kinds: Vec<&str> = by_kind.keys().copied().collect();
    kinds.sort_unstable();

    let mut total = 0.0;
    for kind_str in kinds {
        let events = &by_kind[kind_str];
        let kind = &events[0].kind;
        let w = weight(kind);
        if w == 0.0 {
            continue;
        }
        let n = events.len() as f64;
        let rate = n / total_questions as f64;

        let critical = is_critical(kind);
        let physical = is_physical(kind);

        let mut q_mult = if critical {
            let base = if rate >= 0.50 {
                3.0
            } else if rate >= 0.30 {
                2.5
            } else if rate >= 0.10 {
                2.0
            } else if rate >= 0.05 {
                1.5
            } else {
                1.0
            };
            base
        } else if physical {
            1.0 + 2.0 * rate
        } else {
            1.0 + rate
        };
        if critical {
            if total_questions <= 5 && n >= 1.0 {
                q_mult = q_mult.max(2.0);
            }
            if total_questions <= 10 && n >= 2.0 {
                q_mult = q_mult.max(1.8);
            }
        }

        let freq_mult = if critical {
            if n <= 1.0 {
                1.0
            } else if n <= 3.0 {
                1.0 + 0.8 * (n - 1.0)
            } else {
                1.0 + 2.0 * 0.8 + 1.2 * (n - 3.0)
            }
        } else if physical {
            (1.5 * n).min(4.0)
        } else {
            (1.0 + 0.4 * (n - 1.0)).min(2.5)
        };

        let mut event_score = w * freq_mult * q_mult * q;
        event_score *= contextual_multiplier(kind, events);
        total += event_score;
    }
    total
}

fn contextual_multiplier(kind: &EventKind, events: &[&Event]) -> f64 {
    match kind {
        EventKind::CopyDetected => {
            let mut m = 1.0;
            for e in events {
                let len = e.extra_f64("text_length").unwrap_or(0.0);
                if len > 100.0 {
                    m *= 1.5;
                } else if len > 50.0 {
                    m *= 1.2;
                }
            }
            m
        }
        EventKind::TabHidden => {
            let total: f64 = events.iter().map(|e| e.extra_f64("duration_seconds").unwrap_or(0.0)).sum();
            if total > 60.0 {
                2.0
            } else if total > 30.0 {
                1.5
            } else {
                1.0
            }
        }
        EventKind::LookAway => {
            let mut m = 1.0;
            for e in events {
                let yaw = e.extra_f64("yaw").unwrap_or(0.0).abs();
                if yaw > 70.0 {
                    m *= 1.8;
                } else if yaw > 45.0 {
                    m *= 1.3;
                }
            }
            m
        }
        EventKind::InactivityDetected => {
            let mut m = 1.0;
            for e in events {
                let secs = e.extra_f64("inactiveSeconds").unwrap_or(0.0);
                if secs > 600.0 {
                    m *= 3.0;
                } else if secs > 300.0 {
                    m *= 2.0;
                }
            }
            m
        }
        _ => 1.0,
    }
}

fn pattern_score(sorted: &[&Event], total_questions: u32) -> (f64, Vec<String>) {
    let mut notes = Vec::new();
    let s = pattern_severity(total_questions);

    let mut pattern_count: u32 = 0;
    for (i, e) in sorted.iter().enumerate() {
        if e.kind != EventKind::CopyDetected {
            continue;
        }
        let t = e.timestamp;
        let window_end = (i + 10).min(sorted.len());
        let mut found = false;
        for other in &sorted[i + 1..window_end] {
            if other.timestamp - t > 30.0 {
                break;
            }
            if is_pattern_gap_kind(&other.kind) {
                found = true;
            }
        }
        if found {
            pattern_count += 1;
        }
    }
    let mut pattern_total = 0.0;
    if pattern_count > 0 {
        let r = pattern_count as f64 / total_questions as f64;
        let per = if r >= 0.5 {
            25.0
        } else if r >= 0.2 {
            20.0
        } else if r >= 0.1 {
            15.0
        } else {
            10.0
        };
        pattern_total += pattern_count as f64 * per * s;
        notes.push(format!("copy_search_pattern x{}", pattern_count));
    }

    let tab_events: Vec<&&Event> = sorted.iter().filter(|e| is_rapid_switch_kind(&e.kind)).collect();
    if tab_events.len() >= 3 {
        let mut triggered = false;
        for w in tab_events.windows(3) {
            if w[2].timestamp - w[0].timestamp <= 120.0 {
                triggered = true;
                break;
            }
        }
        if triggered {
            let rate = tab_events.len() as f64 / total_questions as f64;
            let add = if rate >= 0.3 {
                30.0
            } else if rate >= 0.1 {
                20.0
            } else {
                15.0
            };
            pattern_total += add * s;
            notes.push("rapid_tab_switching".to_string());
        }
    }

    (pattern_total, notes)
}

fn temporal_score(sorted: &[&Event]) -> f64 {
    let mut buckets: HashMap<i64, u32> = HashMap::new();
    for e in sorted {
        if is_high_risk_violation(&e.kind) {
            let bucket = (e.timestamp / 60.0).floor() as i64;
            *buckets.entry(bucket).or_insert(0) += 1;
        }
    }
    let mut total = 0.0;
    for count in buckets.values() {
        if *count >= 3 {
            total += *count as f64 * 8.0;
        }
    }
    total
}

fn context_adjustment(sorted: &[&Event], total_questions: u32, duration_minutes: f64) -> f64 {
    let h = sorted.iter().filter(|e| is_context_adjustment_kind(&e.kind)).count() as f64;
    let rho = h / total_questions as f64;

    let density = if rho >= 1.0 {
        40.0
    } else if rho >= 0.5 {
        25.0
    } else if rho >= 0.3 {
        15.0
    } else if rho >= 0.1 {
        5.0
    } else {
        0.0
    };
    let absolute = if h > 20.0 {
        15.0
    } else if h > 10.0 {
        8.0
    } else {
        0.0
    };
    let short = if total_questions <= 5 && h >= 2.0 {
        20.0
    } else if total_questions <= 10 && h >= 5.0 {
        15.0
    } else {
        0.0
    };
    let d = if duration_minutes < 30.0 {
        1.3
    } else if duration_minutes > 120.0 {
        0.9
    } else {
        1.0
    };
    (density + absolute + short) * d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(total_questions: u32, duration_minutes: f64) -> TestContext {
        TestContext {
            is_public: false,
            total_questions,
            duration_minutes,
        }
    }

    #[test]
    fn clean_attempt_scores_zero() {
        let b = score(&[], &ctx(30, 60.0));
        assert_eq!(b.total_score, 0.0);
        assert_eq!(b.risk_category, RiskCategory::Low);
        assert_eq!(b.question_context.violations_per_question, 0.0);
    }

    #[test]
    fn single_glance_away_is_low() {
        let events = vec![Event::new(EventKind::LookAway, 1.0).with_extra("yaw", 35.0)];
        let b = score(&events, &ctx(30, 60.0));
        assert!((b.base_score - 3.1).abs() < 0.05);
        assert_eq!(b.pattern_score, 0.0);
        assert_eq!(b.temporal_score, 0.0);
        assert_eq!(b.risk_category, RiskCategory::Low);
    }

    #[test]
    fn phone_in_short_test_is_high() {
        let events = vec![Event::new(EventKind::PhoneDetected, 1.0).with_extra("confidence", 0.9)];
        let b = score(&events, &ctx(5, 30.0));
        assert!((b.base_score - 37.8).abs() < 0.05);
        assert_eq!(b.risk_category, RiskCategory::High);
    }

    #[test]
    fn copy_then_switch_is_high() {
        let events = vec![
            Event::new(EventKind::CopyDetected, 10.0).with_extra("text_length", 120.0),
            Event::new(EventKind::TabHidden, 25.0).with_extra("duration_seconds", 40.0),
        ];
        let b = score(&events, &ctx(20, 60.0));
        assert!(b.total_score > 45.0 && b.total_score < 57.0);
        assert_eq!(b.risk_category, RiskCategory::High);
    }

    #[test]
    fn multi_people_sustained_is_critical() {
        let events = vec![
            Event::new(EventKind::MultiplePeople, 5.0),
            Event::new(EventKind::MultiplePeople, 10.0),
            Event::new(EventKind::MultiplePeople, 15.0),
        ];
        let b = score(&events, &ctx(30, 60.0));
        // w=15, physical, q_mult=1+2*0.1=1.2, freq=min(4.5,4)=4, Q(30)=0.9 =>
        // base=15*4*1.2*0.9=64.8; temporal=3*8=24; total=88.8.
        assert!((b.total_score - 88.8).abs() < 0.05);
        assert_eq!(b.risk_category, RiskCategory::Critical);
    }

    #[test]
    fn long_silence_only_is_low() {
        let events = vec![Event::new(EventKind::SuspiciousSilence, 0.0).with_extra("duration_seconds", 150.0)];
        let b = score(&events, &ctx(30, 60.0));
        assert!(b.total_score < 2.0);
        assert_eq!(b.risk_category, RiskCategory::Low);
    }

    #[test]
    fn yaw_exactly_30_is_not_look_away_weighted_up() {
        // The detector itself enforces the strict `>` boundary (see
        // src/video/detector.rs); here we confirm the contextual multiplier
        // boundary is also strict.
        let events = vec![Event::new(EventKind::LookAway, 1.0).with_extra("yaw", 45.0)];
        let b1 = score(&events, &ctx(30, 60.0));
        let events2 = vec![Event::new(EventKind::LookAway, 1.0).with_extra("yaw", 45.01)];
        let b2 = score(&events2, &ctx(30, 60.0));
        assert!(b2.base_score > b1.base_score);
    }

    #[test]
    fn category_boundaries() {
        assert_eq!(RiskCategory::from_score(15.0), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(34.99), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(35.0), RiskCategory::High);
    }

    #[test]
    fn unknown_kind_defaults_to_weight_one() {
        let events = vec![Event::new(EventKind::Other("SOMETHING_NEW".into()), 0.0)];
        let b = score(&events, &ctx(30, 60.0));
        assert!(b.base_score > 0.0);
    }

    #[test]
    fn monotone_in_violations() {
        let base_events = vec![Event::new(EventKind::TabSwitch, 1.0)];
        let more_events = vec![
            Event::new(EventKind::TabSwitch, 1.0),
            Event::new(EventKind::TabSwitch, 2.0),
        ];
        let b1 = score(&base_events, &ctx(30, 60.0));
        let b2 = score(&more_events, &ctx(30, 60.0));
        assert!(b2.total_score >= b1.total_score);
    }

    #[test]
    fn score_is_always_bounded() {
        let many: Vec<Event> = (0..50)
            .map(|i| Event::new(EventKind::MultiplePeople, i as f64))
            .collect();
        let b = score(&many, &ctx(5, 10.0));
        assert!(b.total_score <= 100.0);
        assert!(b.total_score >= 0.0);
    }

    #[test]
    fn deterministic() {
        let events = vec![
            Event::new(EventKind::CopyDetected, 10.0).with_extra("text_length", 120.0),
            Event::new(EventKind::TabHidden, 25.0).with_extra("duration_seconds", 40.0),
        ];
        let b1 = score(&events, &ctx(20, 60.0));
        let b2 = score(&events, &ctx(20, 60.0));
        assert_eq!(
            serde_json::to_string(&b1).unwrap(),
            serde_json::to_string(&b2).unwrap()
        );
    }
}
