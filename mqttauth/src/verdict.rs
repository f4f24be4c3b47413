//! Backend verdicts and access modes.

use std::fmt;

/// Access mode: the client reads (receives) messages on a topic.
pub const ACCESS_READ: i32 = 0x01;
/// Access mode: the client publishes to a topic.
pub const ACCESS_WRITE: i32 = 0x02;
/// Access mode: the client subscribes to a topic filter.
pub const ACCESS_SUBSCRIBE: i32 = 0x04;

/// Answer of a backend to an authentication or authorization question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// The backend grants the request.
    Allow,
    /// No opinion; the broker consults the next backend.
    #[default]
    Defer,
    /// The backend failed to answer.
    Error,
}

impl Verdict {
    /// Integer code handed to the broker.
    pub fn code(self) -> i32 {
        match self {
            Verdict::Defer => 0,
            Verdict::Allow => 1,
            Verdict::Error => 2,
        }
    }

    /// Decode a broker integer code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Verdict::Defer),
            1 => Some(Verdict::Allow),
            2 => Some(Verdict::Error),
            _ => None,
        }
    }

    /// Returns true for [`Verdict::Defer`].
    pub fn is_defer(self) -> bool {
        self == Verdict::Defer
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Defer => write!(f, "defer"),
            Verdict::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for v in [Verdict::Allow, Verdict::Defer, Verdict::Error] {
            assert_eq!(Verdict::from_code(v.code()), Some(v));
        }
        assert_eq!(Verdict::Defer.code(), 0);
        assert_eq!(Verdict::from_code(7), None);
    }

    #[test]
    fn test_default_is_defer() {
        assert!(Verdict::default().is_defer());
        assert_eq!(Verdict::Allow.to_string(), "allow");
    }
}
