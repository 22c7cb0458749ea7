//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::parsing::{parse_json_payload, strip_code_fence};
use super::prompts::{insight_prompt, structuring_prompt, transaction_summary};
use super::{AiError, LanguageModel, StructuringTask};
use crate::money::CurrencyFormat;
use crate::records::TransactionRecord;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Client for the hosted Gemini model.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    currency: CurrencyFormat,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            currency: CurrencyFormat::default(),
        })
    }

    /// Points the client at another endpoint, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Currency used when amounts are written into prompts.
    pub fn with_currency(mut self, currency: CurrencyFormat) -> Self {
        self.currency = currency;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    async fn generate(&self, prompt: String) -> Result<String, AiError> {
        self.generate_with_parts(vec![Part::Text { text: prompt }]).await
    }

    #[instrument(skip(self, parts), fields(model = %self.model, parts = parts.len()))]
    async fn generate_with_parts(&self, parts: Vec<Part>) -> Result<String, AiError> {
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                let err = if e.is_timeout() {
                    AiError::Network("request timed out".to_string())
                } else {
                    AiError::Network(e.without_url().to_string())
                };
                warn!(?err, "Gemini request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = parse_error(status.as_u16(), &body);
            warn!(?err, "Gemini returned an error status");
            return Err(err);
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("JSON parse error: {e}")))?;

        let text = first_candidate_text(data)
            .ok_or_else(|| AiError::InvalidResponse("response had no text candidate".to_string()))?;
        debug!("Gemini answered with {} characters", text.len());
        Ok(text)
    }
}

fn first_candidate_text(data: GenerateContentResponse) -> Option<String> {
    data.candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().find_map(|p| p.text))
        .filter(|text| !text.trim().is_empty())
}

fn parse_error(status: u16, body: &str) -> AiError {
    let message = match status {
        401 | 403 => "invalid API key".to_string(),
        404 => "model not found".to_string(),
        429 => "rate limit or quota exceeded".to_string(),
        _ => body.chars().take(200).collect(),
    };
    AiError::Http { status, message }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn summarize(&self, query: &str, transactions: &[TransactionRecord]) -> Result<String, AiError> {
        let summary = transaction_summary(transactions, self.currency);
        let answer = self.generate(insight_prompt(query, &summary)).await?;
        Ok(strip_code_fence(&answer).to_string())
    }

    async fn structure(&self, task: StructuringTask, text: &str) -> Result<serde_json::Value, AiError> {
        let answer = self.generate(structuring_prompt(task, text)).await?;
        parse_json_payload(&answer)
    }

    async fn structure_document(
        &self,
        task: StructuringTask,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<serde_json::Value, AiError> {
        let parts = vec![
            Part::Text {
                text: structuring_prompt(task, "(see attached document)"),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data: general_purpose::STANDARD.encode(bytes),
                },
            },
        ];
        let answer = self.generate_with_parts(parts).await?;
        parse_json_payload(&answer)
    }
}
