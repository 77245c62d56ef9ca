//! The event vocabulary (SPEC_FULL.md §3): a typed, timestamped observation
//! produced by a detector (or, for browser/behaviour kinds, read verbatim off
//! the queue payload) and consumed by the risk engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Closed enumeration drawn from the three families named in SPEC_FULL.md §3,
/// plus an `Other` fallback so an unrecognized kind is scored at the default
/// weight of 1.0 rather than dropping the job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    TabHidden,
    TabSwitch,
    NewTabOpened,
    WindowBlur,
    MouseLeftWindow,
    CopyDetected,
    PasteDetected,
    SelectAllDetected,
    CtrlC,
    CtrlV,
    CtrlA,
    CtrlTab,
    AltTab,
    KeyboardShortcut,
    ContextMenuDetected,
    DevtoolsDetected,
    DevtoolsShortcut,
    F12Pressed,
    InactivityDetected,
    LookAway,
    PhoneDetected,
    MultiplePeople,
    EyesNotOnScreen,
    SuspiciousSilence,
    PossibleSpeakerChange,
    MultipleSpeakersDetected,
    BackgroundNoise,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::TabHidden => "TAB_HIDDEN",
            EventKind::TabSwitch => "TAB_SWITCH",
            EventKind::NewTabOpened => "NEW_TAB_OPENED",
            EventKind::WindowBlur => "WINDOW_BLUR",
            EventKind::MouseLeftWindow => "MOUSE_LEFT_WINDOW",
            EventKind::CopyDetected => "COPY_DETECTED",
            EventKind::PasteDetected => "PASTE_DETECTED",
            EventKind::SelectAllDetected => "SELECT_ALL_DETECTED",
            EventKind::CtrlC => "CTRL_C",
            EventKind::CtrlV => "CTRL_V",
            EventKind::CtrlA => "CTRL_A",
            EventKind::CtrlTab => "CTRL_TAB",
            EventKind::AltTab => "ALT_TAB",
            EventKind::KeyboardShortcut => "KEYBOARD_SHORTCUT",
            EventKind::ContextMenuDetected => "CONTEXT_MENU_DETECTED",
            EventKind::DevtoolsDetected => "DEVTOOLS_DETECTED",
            EventKind::DevtoolsShortcut => "DEVTOOLS_SHORTCUT",
            EventKind::F12Pressed => "F12_PRESSED",
            EventKind::InactivityDetected => "INACTIVITY_DETECTED",
            EventKind::LookAway => "LOOK_AWAY",
            EventKind::PhoneDetected => "PHONE_DETECTED",
            EventKind::MultiplePeople => "MULTIPLE_PEOPLE",
            EventKind::EyesNotOnScreen => "EYES_NOT_ON_SCREEN",
            EventKind::SuspiciousSilence => "SUSPICIOUS_SILENCE",
            EventKind::PossibleSpeakerChange => "POSSIBLE_SPEAKER_CHANGE",
            EventKind::MultipleSpeakersDetected => "MULTIPLE_SPEAKERS_DETECTED",
            EventKind::BackgroundNoise => "BACKGROUND_NOISE",
            EventKind::Other(s) => s,
        }
    }

    pub fn from_str(s: &str) -> EventKind {
        match s {
            "TAB_HIDDEN" => EventKind::TabHidden,
            "TAB_SWITCH" => EventKind::TabSwitch,
            "NEW_TAB_OPENED" => EventKind::NewTabOpened,
            "WINDOW_BLUR" => EventKind::WindowBlur,
            "MOUSE_LEFT_WINDOW" => EventKind::MouseLeftWindow,
            "COPY_DETECTED" => EventKind::CopyDetected,
            "PASTE_DETECTED" => EventKind::PasteDetected,
            "SELECT_ALL_DETECTED" => EventKind::SelectAllDetected,
            "CTRL_C" => EventKind::CtrlC,
            "CTRL_V" => EventKind::CtrlV,
            "CTRL_A" => EventKind::CtrlA,
            "CTRL_TAB" => EventKind::CtrlTab,
            "ALT_TAB" => EventKind::AltTab,
            "KEYBOARD_SHORTCUT" => EventKind::KeyboardShortcut,
            "CONTEXT_MENU_DETECTED" => EventKind::ContextMenuDetected,
            "DEVTOOLS_DETECTED" => EventKind::DevtoolsDetected,
            "DEVTOOLS_SHORTCUT" => EventKind::DevtoolsShortcut,
            "F12_PRESSED" => EventKind::F12Pressed,
            "INACTIVITY_DETECTED" => EventKind::InactivityDetected,
            "LOOK_AWAY" => EventKind::LookAway,
            "PHONE_DETECTED" => EventKind::PhoneDetected,
            "MULTIPLE_PEOPLE" => EventKind::MultiplePeople,
            "EYES_NOT_ON_SCREEN" => EventKind::EyesNotOnScreen,
            "SUSPICIOUS_SILENCE" => EventKind::SuspiciousSilence,
            "POSSIBLE_SPEAKER_CHANGE" => EventKind::PossibleSpeakerChange,
            "MULTIPLE_SPEAKERS_DETECTED" => EventKind::MultipleSpeakersDetected,
            "BACKGROUND_NOISE" => EventKind::BackgroundNoise,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(EventKind::from_str(&s))
    }
}

/// `{type, timestamp: seconds-from-recording-start, extra: attribute-map}`.
/// Immutable once emitted; `timestamp` is non-negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: f64,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: f64) -> Event {
        Event {
            kind,
            timestamp,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Event {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_round_trips_as_other() {
        let kind = EventKind::from_str("SOMETHING_NEW");
        assert_eq!(kind.as_str(), "SOMETHING_NEW");
        assert!(matches!(kind, EventKind::Other(_)));
    }

    #[test]
    fn known_kind_round_trips() {
        for s in ["TAB_HIDDEN", "PHONE_DETECTED", "BACKGROUND_NOISE"] {
            assert_eq!(EventKind::from_str(s).as_str(), s);
        }
    }
}
