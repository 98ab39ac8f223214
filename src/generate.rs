//! Answer, summary, and blueprint generation providers.
//!
//! The [`Generator`] trait is the seam for every chat-model call the
//! product makes: grounded question answering, strict-JSON project
//! summaries, and vision-based blueprint analysis. The grounding policy
//! lives in the engine, not here: when no context survives the budget, the
//! engine emits [`NOT_FOUND_ANSWER`] without calling the provider at all,
//! and a provider that answers with a blank string is degraded to the same
//! sentinel. Exact-match consumers depend on that string, so it must never
//! be reworded.
//!
//! The OpenAI implementation shares the embeddings client's retry
//! discipline: 429/5xx/network retry with exponential backoff, other 4xx
//! fail immediately, exhausted retries surface as `Unavailable`.

use async_trait::async_trait;
use base64::Engine as _;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::ProviderError;

/// Fixed refusal answer when nothing in the uploaded documents grounds the
/// question. Matched byte-for-byte by callers; never reword.
pub const NOT_FOUND_ANSWER: &str = "Not found in the uploaded documents.";

/// Keys every summary response must carry. Missing keys are back-filled
/// (`sources` and `key_objectives` as empty arrays, the rest as null) so
/// display code never branches on absence.
const SUMMARY_KEYS: [&str; 9] = [
    "executive_summary",
    "key_objectives",
    "scope",
    "estimated_timeline",
    "tools_and_materials",
    "stakeholders",
    "risks_and_mitigations",
    "open_questions",
    "sources",
];

const ANSWER_SYSTEM_PROMPT: &str = r#"You are Planroom, a construction document assistant.
Answer ONLY using the provided context blocks. If the answer is not explicitly present in the context, reply exactly:
"Not found in the uploaded documents."

Rules:
- Give a concise answer first.
- State where exactly the data/answer was found.
- Quote exact values (measurements, part numbers) when possible.
- Add 1-3 short bullets titled "Why", citing blocks like [#2], [#3].
- Do NOT invent data or speculate beyond the context."#;

const SUMMARY_SYSTEM_PROMPT: &str = r#"You are Planroom, a senior construction estimator and project manager.
Return STRICT JSON following the schema. Do not include prose outside JSON.
Only include stakeholders that appear in the text and cite their page/section in "source".
If the timeline is uncertain, include assumptions and set confidence low."#;

const BLUEPRINT_SYSTEM_PROMPT: &str = r#"You are Planroom, a construction estimator reading a floor-plan image.
Extract the rooms, openings, trades, and materials you can identify, with quantities where measurable.
Return ONLY a JSON object with keys:
- rooms: [{ name: string, sqft?: number }]
- openings: [{ type: string, count: number }]
- trades: { <trade>: { sqft?: number, qty_sqft?: number, cost_usd?: number } }
- materials: [{ name: string, qty?: string, notes?: string }]
- grand_total_usd?: number
Quote only what the drawing supports; omit what you cannot see."#;

/// Produces natural-language answers and structured analyses.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Answer a question against an assembled context block.
    async fn answer(&self, question: &str, context: &str) -> Result<String, ProviderError>;

    /// Summarize a corpus of project documents into schema-keyed JSON.
    async fn summarize(&self, corpus: &str) -> Result<serde_json::Value, ProviderError>;

    /// Analyze a blueprint image (PNG or JPEG bytes) into raw model output.
    async fn analyze_blueprint(
        &self,
        mime: &str,
        image: &[u8],
    ) -> Result<String, ProviderError>;
}

/// Ensure all summary keys are present, back-filling the missing ones.
pub fn normalize_summary(mut json: serde_json::Value) -> serde_json::Value {
    if !json.is_object() {
        json = serde_json::json!({});
    }
    let obj = json.as_object_mut().unwrap();
    for key in SUMMARY_KEYS {
        if !obj.contains_key(key) {
            let filler = match key {
                "sources" | "key_objectives" => serde_json::json!([]),
                _ => serde_json::Value::Null,
            };
            obj.insert(key.to_string(), filler);
        }
    }
    json
}

/// Build the user message for a summary request over the assembled corpus.
fn summary_user_prompt(corpus: &str) -> String {
    format!(
        r#"From the project documents below, produce a JSON object with keys:
- executive_summary: string (<= 180 words)
- key_objectives: string[]
- scope: {{ in_scope: string[], out_of_scope: string[] }}
- estimated_timeline: {{
    overall_duration_days: number,
    milestones: [{{ name: string, duration_days: number, dependencies?: string[], assumptions?: string[] }}],
    assumptions?: string[],
    confidence: "low" | "medium" | "high"
  }}
- tools_and_materials: {{ materials: [{{ name: string, qty?: string, notes?: string }}], tools: [{{ name: string, notes?: string }}] }}
- stakeholders: [{{ name: string, role?: string, email?: string, phone?: string, source: string }}]
- risks_and_mitigations: [{{ risk: string, impact: "low"|"med"|"high", mitigation: string }}]
- open_questions: string[]
- sources: string[]

Rules:
- Only list stakeholders if they appear in the text; include "source" (file/page/section).
- If quantities are ambiguous, leave qty blank and add a note.
- Keep it concise and printable.

DOCUMENTS:
{}"#,
        corpus
    )
}

/// Generation provider backed by the OpenAI chat completions API.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiGenerator {
    model: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }

    /// POST a chat completion with the shared retry/backoff policy and
    /// return the first choice's message content.
    async fn chat(&self, body: serde_json::Value) -> Result<String, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                        return extract_message_content(&json);
                    }

                    let message = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(ProviderError::Unavailable(format!(
                            "chat API {}: {}",
                            status, message
                        )));
                        continue;
                    }

                    return Err(ProviderError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) => {
                    last_err = Some(ProviderError::Unavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("generation failed".to_string())))
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn answer(&self, question: &str, context: &str) -> Result<String, ProviderError> {
        let user = format!("Question: {}\n\nContext:\n{}", question, context);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": ANSWER_SYSTEM_PROMPT },
                { "role": "user", "content": user },
            ],
        });
        let text = self.chat(body).await?;
        Ok(text.trim().to_string())
    }

    async fn summarize(&self, corpus: &str) -> Result<serde_json::Value, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SUMMARY_SYSTEM_PROMPT },
                { "role": "user", "content": summary_user_prompt(corpus) },
            ],
        });
        let text = self.chat(body).await?;
        // Schema back-fill happens in the engine; this just parses.
        let json: serde_json::Value =
            serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({}));
        Ok(json)
    }

    async fn analyze_blueprint(
        &self,
        mime: &str,
        image: &[u8],
    ) -> Result<String, ProviderError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let data_url = format!("data:{};base64,{}", mime, encoded);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": BLUEPRINT_SYSTEM_PROMPT },
                { "role": "user", "content": [
                    { "type": "text", "text": "Extract rooms, openings, materials and totals from this blueprint image. Respond with ONLY the JSON object." },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ]},
            ],
        });
        self.chat(body).await
    }
}

/// Pull `choices[0].message.content` out of a chat completion response.
fn extract_message_content(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::InvalidResponse("missing message content".to_string()))
}
