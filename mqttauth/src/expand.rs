//! Placeholder expansion for stored ACL patterns.
//!
//! A stored pattern such as `users/%u/#` becomes `users/alice/#` for the
//! request being checked. Expansion is pure and total; an empty result means
//! the row must be ignored.

/// Expands request-scoped placeholders in a stored topic pattern.
pub trait TopicExpander: Send + Sync {
    /// Returns the expanded pattern, or an empty string to skip the row.
    fn expand(&self, client_id: &str, username: &str, pattern: &str) -> String;
}

/// Function-based expander.
impl<F> TopicExpander for F
where
    F: Fn(&str, &str, &str) -> String + Send + Sync,
{
    fn expand(&self, client_id: &str, username: &str, pattern: &str) -> String {
        self(client_id, username, pattern)
    }
}

/// Default expander: `%c` is the client id, `%u` the username.
///
/// A substituted value containing `+`, `#` or `/` would widen the pattern, so
/// the whole expansion becomes empty instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct Placeholders;

impl TopicExpander for Placeholders {
    fn expand(&self, client_id: &str, username: &str, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len());
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let value = match chars.peek() {
                Some('c') => client_id,
                Some('u') => username,
                _ => {
                    out.push(c);
                    continue;
                }
            };
            chars.next();
            if !is_safe_value(value) {
                return String::new();
            }
            out.push_str(value);
        }

        out
    }
}

fn is_safe_value(value: &str) -> bool {
    !value.contains(['+', '#', '/'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_username() {
        assert_eq!(Placeholders.expand("c1", "alice", "u/%u/#"), "u/alice/#");
    }

    #[test]
    fn test_expand_client_id() {
        assert_eq!(
            Placeholders.expand("dev-7", "alice", "devices/%c/%u"),
            "devices/dev-7/alice"
        );
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(Placeholders.expand("c1", "alice", "sensors/#"), "sensors/#");
        assert_eq!(Placeholders.expand("c1", "alice", ""), "");
    }

    #[test]
    fn test_literal_percent() {
        assert_eq!(Placeholders.expand("c1", "bob", "a/%x/%"), "a/%x/%");
        assert_eq!(Placeholders.expand("c1", "bob", "%%u"), "%bob");
    }

    #[test]
    fn test_wildcard_values_rejected() {
        assert_eq!(Placeholders.expand("c1", "#", "u/%u"), "");
        assert_eq!(Placeholders.expand("a+b", "bob", "d/%c"), "");
        assert_eq!(Placeholders.expand("c1", "a/b", "u/%u"), "");
        // unused placeholders are not inspected
        assert_eq!(Placeholders.expand("#", "bob", "u/%u"), "u/bob");
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(Placeholders.expand("", "", "u/%u/%c"), "u//");
    }
}
