use std::fmt;

/// Label the classifier emits when no configured phase matches the frame.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A named point in a game's flow, as identified by on-screen pixel evidence.
///
/// The three phases the recorder reacts to get their own variants; every other
/// configured label is carried verbatim in [`Phase::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    Playing,
    Result,
    Select,
    Unknown,
    Other(String),
}

impl Phase {
    /// Parses a configured label. Matching is exact (labels are case-sensitive).
    pub fn from_label(label: &str) -> Self {
        match label {
            "Playing" => Phase::Playing,
            "Result" => Phase::Result,
            "Select" => Phase::Select,
            UNKNOWN_LABEL => Phase::Unknown,
            other => Phase::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Phase::Playing => "Playing",
            Phase::Result => "Result",
            Phase::Select => "Select",
            Phase::Unknown => UNKNOWN_LABEL,
            Phase::Other(label) => label,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Phase {
    fn from(label: String) -> Self {
        Phase::from_label(&label)
    }
}
