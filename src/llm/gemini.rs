use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{
    AssistantInput, AssistantOutput, LlmError, LlmProvider, LlmResult, TurnRole,
};
use super::redact::{redact_body_for_log, redact_url};

const MAX_ERROR_BODY_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        client: Client,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> LlmResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request(input: &AssistantInput) -> GeminiGenerateRequest {
        let mut contents: Vec<GeminiContent> = input
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Model => "model",
                }
                .to_string(),
                parts: vec![GeminiPart {
                    text: turn.text.clone(),
                }],
            })
            .collect();
        contents.push(GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: input.user_message.clone(),
            }],
        });

        GeminiGenerateRequest {
            contents,
            system_instruction: input
                .system_instruction
                .as_ref()
                .map(|text| GeminiSystemInstruction {
                    parts: vec![GeminiPart { text: text.clone() }],
                }),
        }
    }

    /// Text of the first candidate carrying any, with its parts joined.
    fn extract_text(resp: GeminiGenerateResponse) -> LlmResult<String> {
        resp.candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .find(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

impl LlmProvider for GeminiProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        let payload = Self::build_request(&input);
        let request = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .build()
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let body = serde_json::to_string(&payload).unwrap_or_default();
            debug!(
                url = %redact_url(request.url()),
                history = input.history.len(),
                body = %redact_body_for_log(&body),
                "sending gemini request"
            );
        }

        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        debug!(status, body = %redact_body_for_log(&body), "received gemini response");

        if !(200..300).contains(&status) {
            let body = body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
            return Err(LlmError::HttpStatus { status, body });
        }

        let parsed = serde_json::from_str::<GeminiGenerateResponse>(&body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        let text = Self::extract_text(parsed)?;
        Ok(AssistantOutput { text })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}
