//! Share flag parsing
//!
//! A tag's value decides whether its key selects replication targets.
//! Only a case-insensitive `true` enables sharing; everything else is
//! treated as disabled and left to the caller to report.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareFlag {
    Enabled,
    Disabled,
}

impl ShareFlag {
    /// Interpret a raw tag value. Never fails.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for ShareFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}
