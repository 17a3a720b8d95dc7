use async_trait::async_trait;
use rig::completion::{Chat, Message};
use rig::prelude::*;
use serde_json::json;

use crate::error::{InterviewError, Result};

/// Model used for the patient persona.
pub const GEMINI_MODEL: &str = "gemini-pro";

/// The remote model behind the patient persona. One blocking attempt per
/// call, no retry; an empty reply is an error so callers never log a
/// half-exchange.
#[async_trait]
pub trait PatientModel: Send + Sync {
    async fn reply(&self, history: &[Message], prompt: &str) -> Result<String>;
}

/// Gemini-backed patient persona.
///
/// The agent is pinned to near-deterministic generation (temperature 0.1,
/// topP 1, topK 1, 2048 output tokens) with every harm category set to
/// BLOCK_NONE so the role-play is not cut short by the safety filter.
pub struct GeminiPatient {
    agent: rig::agent::Agent<rig::providers::gemini::completion::CompletionModel>,
}

impl GeminiPatient {
    pub fn new(api_key: &str) -> Self {
        let client = rig::providers::gemini::Client::new(api_key);
        let agent = client
            .agent(GEMINI_MODEL)
            .temperature(0.1)
            .max_tokens(2048)
            .additional_params(json!({
                "topP": 1,
                "topK": 1,
                "safetySettings": [
                    { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
                    { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
                    { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
                    { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" }
                ]
            }))
            .build();
        Self { agent }
    }

    /// Build the patient model from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| InterviewError::ModelCallFailed("GEMINI_API_KEY not set".to_string()))?;
        Ok(Self::new(&api_key))
    }
}

#[async_trait]
impl PatientModel for GeminiPatient {
    async fn reply(&self, history: &[Message], prompt: &str) -> Result<String> {
        let reply = self
            .agent
            .chat(prompt, history.to_vec())
            .await
            .map_err(|e| InterviewError::ModelCallFailed(e.to_string()))?;

        if reply.trim().is_empty() {
            return Err(InterviewError::EmptyModelReply);
        }
        Ok(reply)
    }
}
