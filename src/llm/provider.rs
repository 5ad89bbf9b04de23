use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantInput {
    pub system_instruction: Option<String>,
    pub history: Vec<Turn>,
    pub user_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantOutput {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("missing GEMINI_API_KEY")]
    MissingApiKey,
    #[error("provider request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("provider parse error: {0}")]
    Parse(String),
    #[error("provider returned empty response text")]
    EmptyResponse,
    #[error("provider did not answer within {after_ms} ms")]
    Timeout { after_ms: u64 },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// The remote model, as seen by the relay: instruction + history + text in,
/// reply text out.
pub trait LlmProvider {
    fn generate(
        &self,
        input: AssistantInput,
    ) -> impl std::future::Future<Output = LlmResult<AssistantOutput>> + Send;
}
