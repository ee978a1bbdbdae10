//! Gemini API client for chat and image analysis
//!
//! Calls `generateContent` directly over HTTP with the conversation context
//! produced by the context builder.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::context::ContextTurn;
use crate::{Error, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

/// generateContent request
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

/// One entry of the chat history
#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

/// Content part (text or inline image data)
#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Base64-encoded inline media
#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    data: String,
}

/// generateContent response
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }

    /// Generate a chat reply grounded in the given context window
    ///
    /// The context comes in chronological order; the new user input is
    /// appended as the final `user` entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::QuotaExhausted` when the backend reports quota
    /// exhaustion, `Error::Backend` for any other API failure
    pub async fn generate_reply(&self, context: &[ContextTurn], user_input: &str) -> Result<String> {
        let mut contents: Vec<Content> = context
            .iter()
            .map(|turn| Content {
                role: turn.role.as_str(),
                parts: vec![Part::text(turn.text.clone())],
            })
            .collect();

        contents.push(Content {
            role: "user",
            parts: vec![Part::text(user_input)],
        });

        self.generate(GenerateContentRequest { contents }).await
    }

    /// Analyze an image with an accompanying text prompt
    ///
    /// # Errors
    ///
    /// Returns `Error::QuotaExhausted` when the backend reports quota
    /// exhaustion, `Error::Backend` for any other API failure
    pub async fn generate_from_image(
        &self,
        prompt: &str,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::text(prompt),
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: normalize_mime_type(mime_type),
                            data,
                        }),
                    },
                ],
            }],
        };

        self.generate(request).await
    }

    async fn generate(&self, request: GenerateContentRequest) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_quota_exhausted(status.as_u16(), &body) {
                return Err(Error::QuotaExhausted(body));
            }
            return Err(Error::Backend(format!("API error {status}: {body}")));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("parse error: {e}")))?;

        let text = result
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            return Err(Error::Backend("empty response from Gemini".to_string()));
        }

        tracing::debug!(chars = text.len(), "Gemini reply received");
        Ok(text)
    }
}

/// Whether a failed response indicates quota exhaustion
///
/// Gemini reports exhaustion as HTTP 429 with a `RESOURCE_EXHAUSTED` status
/// in the error body; either signal is enough.
fn is_quota_exhausted(status: u16, body: &str) -> bool {
    status == 429 || body.contains("RESOURCE_EXHAUSTED")
}

/// Normalize MIME type for the Gemini API
fn normalize_mime_type(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/png" => "image/png",
        "image/gif" => "image/gif",
        "image/webp" => "image/webp",
        // jpeg, jpg, and any unknown type default to jpeg
        _ => "image/jpeg",
    }
}
