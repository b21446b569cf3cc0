//! Message types passed between ingestion, storage and the console.

/// A donation picked out of chat, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Donation {
    /// Chat account that posted the notice (empty for system notices).
    pub user: String,
    /// Channel key (no leading `#`).
    pub channel: String,
    /// First word of the notice, usually the donor's name.
    pub send_from: String,
    /// Whole currency units; fractions are truncated.
    pub amount: u64,
    /// Full notice text.
    pub text: String,
}

impl Donation {
    pub fn new(user: &str, channel: &str, amount: u64, text: &str) -> Self {
        Self {
            user: user.to_string(),
            channel: channel.to_string(),
            send_from: text.split(' ').next().unwrap_or_default().to_string(),
            amount,
            text: text.to_string(),
        }
    }

    /// Console notice for a large donation.
    pub fn console_notice(&self) -> String {
        format!("{} just got  {} donation", self.channel, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_from_is_first_word() {
        let donation = Donation::new("streamelements", "bar", 12, "Alice donated $12.50");
        assert_eq!(donation.send_from, "Alice");
        assert_eq!(donation.console_notice(), "bar just got  12 donation");
    }
}
