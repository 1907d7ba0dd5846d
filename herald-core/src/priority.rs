//! Priority bands.

use std::{fmt, str::FromStr};
use thiserror::Error;

/// Ordering key for handler invocation.
///
/// Lower bands run first. [`Priority::Final`] is reserved for handlers that
/// must observe the settled state of an event (to apply its side effects)
/// rather than influence it: it always runs after every other band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i32)]
pub enum Priority {
    /// Runs first.
    Highest = 100,
    /// Runs after `Highest`.
    High = 200,
    /// The default band.
    #[default]
    Normal = 300,
    /// Runs after `Normal`.
    Low = 400,
    /// Last of the general bands.
    Lowest = 500,
    /// Terminal band, runs after every other band.
    Final = 1000,
}

impl Priority {
    /// Every band, in invocation order.
    pub const ALL: [Priority; 6] = [
        Priority::Highest,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Lowest,
        Priority::Final,
    ];

    /// Numeric value of the band (lower = earlier).
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Whether this is the terminal band.
    pub const fn is_final(self) -> bool {
        matches!(self, Priority::Final)
    }

    /// Name of the band.
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Highest => "Highest",
            Priority::High => "High",
            Priority::Normal => "Normal",
            Priority::Low => "Low",
            Priority::Lowest => "Lowest",
            Priority::Final => "Final",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a priority band.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown priority band: {0}")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePriorityError(s.to_string()))
    }
}
