//! Fixed policy tables for the risk engine (SPEC_FULL.md §4.4). Ported
//! directly from `ImprovedRiskCalculator`'s `violation_weights` dict in
//! `examples/original_source/workers/proctor/analysis/risk_calculator.py`.
//! Weights, thresholds and multipliers are compile-time constants: the core
//! makes no claim to be a tunable policy engine.

use crate::events::EventKind;

/// Default weight for any kind not named in the table below (SPEC_FULL.md §3:
/// "Unknown kinds must be preserved ... rather than dropped").
pub const DEFAULT_WEIGHT: f64 = 1.0;

pub fn weight(kind: &EventKind) -> f64 {
    use EventKind::*;
    match kind {
        TabSwitch => 10.0,
        NewTabOpened => 12.0,
        TabHidden => 8.0,
        WindowBlur => 6.0,
        MouseLeftWindow => 4.0,
        CopyDetected => 8.0,
        PasteDetected => 3.0,
        SelectAllDetected => 6.0,
        DevtoolsDetected | DevtoolsShortcut | F12Pressed => 0.0,
        ContextMenuDetected => 2.0,
        CtrlC => 8.0,
        CtrlV => 3.0,
        CtrlA => 5.0,
        CtrlTab => 9.0,
        AltTab => 7.0,
        KeyboardShortcut => 2.0,
        LookAway => 3.0,
        EyesNotOnScreen => 4.0,
        PhoneDetected => 12.0,
        MultiplePeople => 15.0,
        MultipleSpeakersDetected => 10.0,
        SuspiciousSilence => 1.0,
        PossibleSpeakerChange => 2.0,
        BackgroundNoise => 0.5,
        InactivityDetected => 1.0,
        Other(_) => DEFAULT_WEIGHT,
    }
}

pub fn is_critical(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::CopyDetected | EventKind::TabHidden | EventKind::TabSwitch | EventKind::NewTabOpened
    )
}

pub fn is_physical(kind: &EventKind) -> bool {
    matches!(kind, EventKind::PhoneDetected | EventKind::MultiplePeople)
}

/// Used by both `violation_details.high_risk_violations` and the temporal
/// clustering window. Deliberately a different set from
/// `QUESTION_CONTEXT_HIGH_RISK` / the context-adjustment `H` set below — the
/// source system keeps these two "high risk" groupings distinct rather than
/// sharing one constant, and this port preserves that rather than silently
/// unifying it (see DESIGN.md).
pub fn is_high_risk_violation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::CopyDetected
            | EventKind::TabHidden
            | EventKind::TabSwitch
            | EventKind::PhoneDetected
            | EventKind::MultiplePeople
    )
}

/// Used by `question_context.high_risk_per_question` and the context
/// adjustment's `H` count.
pub fn is_context_adjustment_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::CopyDetected | EventKind::TabHidden | EventKind::TabSwitch | EventKind::NewTabOpened
    )
}

pub fn is_pattern_gap_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::TabHidden | EventKind::TabSwitch | EventKind::WindowBlur)
}

pub fn is_rapid_switch_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::TabSwitch | EventKind::TabHidden)
}

pub fn question_normalization_factor(total_questions: u32) -> f64 {
    match total_questions {
        0..=1 => 2.0,
        2..=5 => 1.5,
        6..=10 => 1.2,
        11..=20 => 1.0,
        21..=50 => 0.9,
        _ => 0.8,
    }
}

pub fn pattern_severity(total_questions: u32) -> f64 {
    match total_questions {
        0..=5 => 2.0,
        6..=10 => 1.5,
        n if n >= 50 => 0.7,
        _ => 1.0,
    }
}
