// Attendance event type value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of a single punch.
///
/// `Duplicate` only exists between determination and staging; it is never
/// written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    In,
    Out,
    Duplicate,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::In => "IN",
            EventType::Out => "OUT",
            EventType::Duplicate => "DUPLICATE",
            EventType::Unknown => "UNKNOWN",
        }
    }

    pub fn is_persistable(&self) -> bool {
        !matches!(self, EventType::Duplicate)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IN" => Ok(EventType::In),
            "OUT" => Ok(EventType::Out),
            "DUPLICATE" => Ok(EventType::Duplicate),
            "UNKNOWN" => Ok(EventType::Unknown),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("in".parse::<EventType>(), Ok(EventType::In));
        assert_eq!(" Out ".parse::<EventType>(), Ok(EventType::Out));
        assert!("sideways".parse::<EventType>().is_err());
    }

    #[test]
    fn duplicate_is_never_persisted() {
        assert!(!EventType::Duplicate.is_persistable());
        assert!(EventType::Unknown.is_persistable());
    }
}
