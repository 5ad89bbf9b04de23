use super::OfflineReason;

/// User-facing strings. None of them carries technical detail; that goes to
/// the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notices {
    name: String,
}

impl Notices {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn empty_message(&self) -> String {
        "Please enter a message.".to_string()
    }

    pub fn message_too_long(&self) -> String {
        "Your message is too long. Please shorten it and try again.".to_string()
    }

    pub fn offline(&self, reason: OfflineReason) -> String {
        match reason {
            OfflineReason::DataNotLoaded => format!(
                "{} is offline. Property data files could not be loaded. Please contact support.",
                self.name
            ),
            OfflineReason::MissingApiKey => format!(
                "{} is offline. GEMINI_API_KEY is not set. Please set it in the environment variables.",
                self.name
            ),
        }
    }

    pub fn temporarily_unavailable(&self) -> String {
        format!(
            "{} is temporarily offline. The AI server is currently experiencing high load. Please try again in a few moments!",
            self.name
        )
    }

    pub fn quota_exhausted(&self, max: u32) -> String {
        format!("The usage limit of {max} requests has been reached. Please start a new session later.")
    }

    pub fn farewell(&self) -> String {
        format!("Thanks for chatting with {}!", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::Notices;
    use crate::relay::OfflineReason;

    #[test]
    fn notices_name_the_assistant() {
        let notices = Notices::new("Adam");
        assert!(notices.offline(OfflineReason::DataNotLoaded).starts_with("Adam is offline."));
        assert!(notices.temporarily_unavailable().starts_with("Adam is temporarily offline."));
        assert_eq!(notices.farewell(), "Thanks for chatting with Adam!");
    }

    #[test]
    fn exhaustion_is_distinct_from_failures() {
        let notices = Notices::new("Adam");
        let exhausted = notices.quota_exhausted(100);
        assert!(exhausted.contains("100 requests"));
        assert_ne!(exhausted, notices.temporarily_unavailable());
        assert_ne!(notices.message_too_long(), notices.empty_message());
        assert_ne!(exhausted, notices.offline(OfflineReason::MissingApiKey));
    }
}
