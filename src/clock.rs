// src/clock.rs
//! Time source shared by the handles
//!
//! Signature creation and verification times always come from a [`Clock`],
//! never from ad-hoc `SystemTime::now()` calls.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    System,
    /// Always reports the same instant.
    Constant(SystemTime),
}

impl Clock {
    /// A constant clock at the given Unix timestamp.
    pub fn at_unix(secs: i64) -> Self {
        Clock::Constant(from_unix(secs))
    }

    pub fn now(&self) -> SystemTime {
        match self {
            Clock::System => SystemTime::now(),
            Clock::Constant(t) => *t,
        }
    }

    pub fn unix(&self) -> i64 {
        to_unix(self.now())
    }
}

/// Unix seconds → `SystemTime`, clamped to the epoch for out-of-range input.
pub fn from_unix(secs: i64) -> SystemTime {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(SystemTime::from)
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

pub fn to_unix(t: SystemTime) -> i64 {
    DateTime::<Utc>::from(t).timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_clock_is_stable() {
        let clock = Clock::at_unix(1_700_000_000);
        assert_eq!(clock.unix(), 1_700_000_000);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_unix_roundtrip() {
        assert_eq!(to_unix(from_unix(42)), 42);
        assert_eq!(from_unix(0), SystemTime::UNIX_EPOCH);
    }
}
