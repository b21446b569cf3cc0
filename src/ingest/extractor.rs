//! Donation amount extraction from chat text.

use fancy_regex::Regex;
use tracing::warn;

use crate::common::error::ConfigError;

/// Per-channel filter and amount pattern.
#[derive(Debug, Clone)]
pub struct DonationPattern {
    filter: String,
    regex: Regex,
}

impl DonationPattern {
    pub fn new(channel: &str, filter: &str, pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            channel: channel.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            filter: filter.to_string(),
            regex,
        })
    }

    pub fn extract(&self, text: &str) -> Option<u64> {
        extract(text, &self.filter, &self.regex)
    }
}

/// Pull a donation amount out of `text`.
///
/// `text` must contain `filter` verbatim. The first match of `pattern`
/// is parsed as a non-negative number and truncated toward zero.
pub fn extract(text: &str, filter: &str, pattern: &Regex) -> Option<u64> {
    if !text.contains(filter) {
        return None;
    }

    let matched = match pattern.find(text) {
        Ok(Some(m)) => m.as_str(),
        Ok(None) => return None,
        Err(e) => {
            warn!("Amount pattern failed on {:?}: {}", text, e);
            return None;
        }
    };

    let value: f64 = matched.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> DonationPattern {
        DonationPattern::new("bar", "donated", r"\d+(\.\d+)?").unwrap()
    }

    #[test]
    fn test_fraction_is_truncated_not_rounded() {
        // 12.50 -> 12; 99.99 -> 99 matches the legacy integer cast.
        assert_eq!(pattern().extract("donated $12.50 to the cause"), Some(12));
        assert_eq!(pattern().extract("Bob donated 99.99"), Some(99));
    }

    #[test]
    fn test_filter_must_match() {
        assert_eq!(pattern().extract("just chatting"), None);
        assert_eq!(pattern().extract("I have 500 points"), None);
    }

    #[test]
    fn test_pattern_must_match() {
        assert_eq!(pattern().extract("donated nothing"), None);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(pattern().extract("donated 5 then 500"), Some(5));
    }

    #[test]
    fn test_unparseable_match_is_no_match() {
        let pattern = DonationPattern::new("bar", "donated", r"\$[\d,]+").unwrap();
        assert_eq!(pattern.extract("donated $1,000"), None);
    }

    #[test]
    fn test_negative_is_no_match() {
        let pattern = DonationPattern::new("bar", "refund", r"-?\d+").unwrap();
        assert_eq!(pattern.extract("refund -20"), None);
    }

    #[test]
    fn test_lookaround_patterns() {
        let pattern = DonationPattern::new("bar", "RUB", r"\d+(?= RUB)").unwrap();
        assert_eq!(pattern.extract("Alice: 1500 RUB for the stream"), Some(1500));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = DonationPattern::new("bar", "donated", "[unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref channel, .. } if channel == "bar"));
    }
}
