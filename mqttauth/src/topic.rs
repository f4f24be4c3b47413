//! MQTT topic filter matching.
//!
//! Supports MQTT wildcards:
//! - `+` matches exactly one topic level
//! - `#` matches any number of remaining topic levels (must be last)
//!
//! The broker normally supplies its own predicate through [`TopicMatcher`];
//! [`MqttTopicMatcher`] is the default used when it does not.

/// Decides whether a concrete topic name matches a subscription filter.
pub trait TopicMatcher: Send + Sync {
    /// Returns true if `topic` matches `filter`.
    fn matches(&self, filter: &str, topic: &str) -> bool;
}

/// Function-based matcher.
impl<F> TopicMatcher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, filter: &str, topic: &str) -> bool {
        self(filter, topic)
    }
}

/// Standard MQTT 3.1.1 topic matching.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttTopicMatcher;

impl TopicMatcher for MqttTopicMatcher {
    fn matches(&self, filter: &str, topic: &str) -> bool {
        topic_matches_sub(filter, topic)
    }
}

/// Returns true if `filter` is a well-formed subscription filter.
pub fn validate_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        match level {
            "+" => {}
            "#" => {
                if levels.peek().is_some() {
                    return false;
                }
            }
            _ => {
                if level.contains(['+', '#']) {
                    return false;
                }
            }
        }
    }
    true
}

/// Match a topic name against a subscription filter.
///
/// Invalid filters and topic names that contain wildcards never match.
pub fn topic_matches_sub(filter: &str, topic: &str) -> bool {
    if !validate_filter(filter) || topic.is_empty() || topic.contains(['+', '#']) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    // $ topics should only match explicit $ patterns, not wildcards at root level
    let dollar_topic = topic.starts_with('$');
    let mut at_root = true;

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return !(dollar_topic && at_root),
            (Some("+"), Some(_)) => {
                if dollar_topic && at_root {
                    return false;
                }
            }
            (Some(f), Some(t)) => {
                if f != t {
                    return false;
                }
            }
            (None, None) => return true,
            (Some(_), None) | (None, Some(_)) => return false,
        }
        at_root = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert!(topic_matches_sub("a/b/c", "a/b/c"));
        assert!(!topic_matches_sub("a/b/c", "a/b"));
        assert!(!topic_matches_sub("a/b", "a/b/c"));
        assert!(!topic_matches_sub("a/b/c", "a/b/d"));
    }

    #[test]
    fn test_single_level() {
        assert!(topic_matches_sub("a/+/c", "a/b/c"));
        assert!(topic_matches_sub("a/+/c", "a//c"));
        assert!(topic_matches_sub("+/+", "/finance"));
        assert!(topic_matches_sub("+", "a"));
        assert!(!topic_matches_sub("a/+/c", "a/b/x/c"));
        assert!(!topic_matches_sub("a/+", "a/b/c"));
    }

    #[test]
    fn test_multi_level() {
        assert!(topic_matches_sub("#", "a/b/c"));
        assert!(topic_matches_sub("sensors/#", "sensors/temp"));
        assert!(topic_matches_sub("sensors/#", "sensors/temp/1"));
        assert!(topic_matches_sub("sensors/#", "sensors"));
        assert!(topic_matches_sub("a/+/#", "a/b/c/d"));
        assert!(!topic_matches_sub("sensors/#", "other/temp"));
    }

    #[test]
    fn test_dollar_topics() {
        assert!(!topic_matches_sub("#", "$SYS/broker/load"));
        assert!(!topic_matches_sub("+/broker/load", "$SYS/broker/load"));
        assert!(topic_matches_sub("$SYS/#", "$SYS/broker/load"));
        assert!(topic_matches_sub("$SYS/+/load", "$SYS/broker/load"));
    }

    #[test]
    fn test_invalid() {
        assert!(!validate_filter(""));
        assert!(!validate_filter("a/#/c"));
        assert!(!validate_filter("a/b+"));
        assert!(!validate_filter("a#"));
        assert!(validate_filter("a/+/#"));

        assert!(!topic_matches_sub("a/#/c", "a/b/c"));
        assert!(!topic_matches_sub("a/+", "a/+"));
        assert!(!topic_matches_sub("#", ""));
    }

    #[test]
    fn test_closure_matcher() {
        let exact = |f: &str, t: &str| f == t;
        assert!(exact.matches("a/b", "a/b"));
        assert!(!exact.matches("a/#", "a/b"));
        assert!(MqttTopicMatcher.matches("a/#", "a/b"));
    }
}
