//! One exchange at a time: quota check, dispatch, settle.
//!
//! ```text
//! Idle -> QuotaCheck -> Dispatch -> Settle -> {Idle, Exhausted}
//! ```
//!
//! Quota is only charged after the remote model has answered. A failed or
//! timed-out dispatch leaves the counter untouched.

mod notices;

pub use notices::Notices;

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::corpus::Corpus;
use crate::llm::provider::{AssistantInput, LlmError, LlmProvider, Turn};
use crate::prompt::{PersonaTemplate, SystemInstruction, compose};
use crate::quota::QuotaPolicy;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    DataNotLoaded,
    MissingApiKey,
}

#[derive(Debug)]
enum Availability<P> {
    Ready {
        provider: P,
        instruction: SystemInstruction,
    },
    Offline(OfflineReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Replied { text: String, remaining: u32 },
    QuotaExhausted,
    Offline(OfflineReason),
    Failed { detail: String },
}

impl ExchangeOutcome {
    pub fn next_state(&self) -> SessionState {
        match self {
            Self::Replied { remaining: 0, .. } | Self::QuotaExhausted => SessionState::Exhausted,
            _ => SessionState::Idle,
        }
    }
}

/// Turns exchanged so far within one chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    fn record(&mut self, user_text: &str, reply: &str) {
        self.turns.push(Turn::user(user_text));
        self.turns.push(Turn::model(reply));
    }
}

#[derive(Debug)]
pub struct RelayService<P> {
    availability: Availability<P>,
    quota: QuotaPolicy,
    request_timeout: Duration,
    notices: Notices,
}

impl<P: LlmProvider> RelayService<P> {
    /// Builds the service once at startup. The system instruction is composed
    /// here and reused for every exchange.
    pub fn assemble(
        corpus: &Corpus,
        persona: &PersonaTemplate,
        provider: Result<P, LlmError>,
        quota: QuotaPolicy,
        request_timeout: Duration,
    ) -> Self {
        let availability = match (corpus.text(), provider) {
            (None, _) => Availability::Offline(OfflineReason::DataNotLoaded),
            (Some(_), Err(err)) => {
                error!(%err, "remote model client is unavailable");
                Availability::Offline(OfflineReason::MissingApiKey)
            }
            (Some(text), Ok(provider)) => {
                let instruction = compose(persona, text);
                info!(
                    sources = corpus.sources().len(),
                    instruction_chars = instruction.as_str().len(),
                    "system instruction composed"
                );
                Availability::Ready {
                    provider,
                    instruction,
                }
            }
        };

        Self {
            availability,
            quota,
            request_timeout,
            notices: Notices::new(persona.name.clone()),
        }
    }

    pub fn offline_reason(&self) -> Option<OfflineReason> {
        match &self.availability {
            Availability::Ready { .. } => None,
            Availability::Offline(reason) => Some(*reason),
        }
    }

    pub fn instruction(&self) -> Option<&SystemInstruction> {
        match &self.availability {
            Availability::Ready { instruction, .. } => Some(instruction),
            Availability::Offline(_) => None,
        }
    }

    pub fn quota(&self) -> &QuotaPolicy {
        &self.quota
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub async fn exchange(
        &self,
        client: Option<&str>,
        conversation: &mut Conversation,
        user_text: &str,
    ) -> ExchangeOutcome {
        let (provider, instruction) = match &self.availability {
            Availability::Ready {
                provider,
                instruction,
            } => (provider, instruction),
            Availability::Offline(reason) => return ExchangeOutcome::Offline(*reason),
        };

        let ledger = self.quota.ledger_for(client);
        let remaining = match ledger.remaining() {
            Ok(remaining) => remaining,
            Err(err) => {
                error!(%err, "unable to read usage counter");
                return ExchangeOutcome::Failed {
                    detail: err.to_string(),
                };
            }
        };
        if remaining == 0 {
            info!(client = client.unwrap_or("-"), "quota exhausted, refusing exchange");
            return ExchangeOutcome::QuotaExhausted;
        }

        let input = AssistantInput {
            system_instruction: Some(instruction.as_str().to_string()),
            history: conversation.turns().to_vec(),
            user_message: user_text.to_string(),
        };
        let reply = match timeout(self.request_timeout, provider.generate(input)).await {
            Ok(Ok(output)) => output.text,
            Ok(Err(err)) => return self.dispatch_failed(err),
            Err(_) => {
                return self.dispatch_failed(LlmError::Timeout {
                    after_ms: self.request_timeout.as_millis() as u64,
                });
            }
        };

        let remaining = match ledger.consume() {
            Ok(next) => next,
            Err(err) => {
                error!(%err, "failed to persist usage counter");
                remaining.saturating_sub(1)
            }
        };
        debug!(remaining, "exchange settled");
        conversation.record(user_text, &reply);

        ExchangeOutcome::Replied {
            text: reply,
            remaining,
        }
    }

    /// The text a transport shows the end user for `outcome`.
    pub fn render(&self, outcome: &ExchangeOutcome) -> String {
        match outcome {
            ExchangeOutcome::Replied { text, .. } => text.clone(),
            ExchangeOutcome::QuotaExhausted => self.notices.quota_exhausted(self.quota.max()),
            ExchangeOutcome::Offline(reason) => self.notices.offline(*reason),
            ExchangeOutcome::Failed { .. } => self.notices.temporarily_unavailable(),
        }
    }

    fn dispatch_failed(&self, err: LlmError) -> ExchangeOutcome {
        error!(%err, "remote model request failed");
        ExchangeOutcome::Failed {
            detail: err.to_string(),
        }
    }
}
