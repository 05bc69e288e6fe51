//! Vision classifier seam and the OpenAI chat-completions implementation.

use crate::{ClassifyError, Result};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

/// OpenAI chat completions endpoint.
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Question put to the model for every image.
pub const WATER_PROMPT: &str =
    "Does this image contain lakes or rivers? Return a JSON with format {\"status\": true|false}";

/// One image submitted for classification.
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest<'a> {
    /// Gallery subfolder holding the image.
    pub folder: &'a str,
    /// File name of the image.
    pub image_name: &'a str,
    /// JPEG bytes, standard base64.
    pub jpeg_base64: &'a str,
}

/// Answers whether an image shows open water.
pub trait Classifier {
    /// `Ok(true)` for a positive answer.
    fn classify(&self, request: &ImageRequest<'_>) -> Result<bool>;
}

/// Request body for one image.
pub fn chat_request_body(model: &str, max_tokens: u32, jpeg_base64: &str) -> Value {
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": WATER_PROMPT },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/jpeg;base64,{}", jpeg_base64) }
                }
            ]
        }],
        "max_tokens": max_tokens,
        "response_format": { "type": "json_object" },
    })
}

/// Read the model's boolean `status` out of a chat completion response.
///
/// A missing or non-boolean `status` counts as negative. A response without
/// message content, or content that is not JSON, is an error.
pub fn parse_chat_response(body: &str) -> Result<bool> {
    let doc: Value = serde_json::from_str(body)?;
    let content = doc
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifyError::missing_content(body))?;
    parse_status(content)
}

/// Parse the answer document `{"status": bool}`.
pub fn parse_status(content: &str) -> Result<bool> {
    let answer: Value = serde_json::from_str(content)?;
    Ok(answer.get("status").and_then(Value::as_bool).unwrap_or(false))
}

/// Blocking client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClassifier {
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for OpenAiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClassifier")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl OpenAiClassifier {
    /// Create a classifier for the public API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClassifyError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("geoharvest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(OPENAI_CHAT_URL, api_key, client))
    }

    /// Create a classifier for an arbitrary endpoint.
    pub fn with_client(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        client: reqwest::blocking::Client,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        }
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the completion budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Classifier for OpenAiClassifier {
    fn classify(&self, request: &ImageRequest<'_>) -> Result<bool> {
        let _span = tracing::info_span!(
            "classify",
            folder = request.folder,
            image = request.image_name,
            model = %self.model,
        )
        .entered();

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&chat_request_body(&self.model, self.max_tokens, request.jpeg_base64))
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ClassifyError::http(status.as_u16(), &body));
        }

        let positive = parse_chat_response(&body)?;
        debug!(positive, "model answered");
        Ok(positive)
    }
}

// ──────────────────────────────────────────────
// MockClassifier (testing)
// ──────────────────────────────────────────────

/// Classifier with canned answers keyed by image file name.
///
/// Unknown images answer negative. Every call is recorded as
/// `folder/image_name`.
#[derive(Debug, Default)]
pub struct MockClassifier {
    answers: HashMap<String, std::result::Result<bool, String>>,
    calls: RefCell<Vec<String>>,
}

impl MockClassifier {
    /// Mock that answers negative for everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `positive` for `image_name`.
    pub fn with_answer(mut self, image_name: &str, positive: bool) -> Self {
        self.answers.insert(image_name.to_string(), Ok(positive));
        self
    }

    /// Fail the call for `image_name`.
    pub fn with_failure(mut self, image_name: &str, message: &str) -> Self {
        self.answers
            .insert(image_name.to_string(), Err(message.to_string()));
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Classifier for MockClassifier {
    fn classify(&self, request: &ImageRequest<'_>) -> Result<bool> {
        self.calls
            .borrow_mut()
            .push(format!("{}/{}", request.folder, request.image_name));
        match self.answers.get(request.image_name) {
            Some(Ok(positive)) => Ok(*positive),
            Some(Err(message)) => Err(ClassifyError::missing_content(message)),
            None => Ok(false),
        }
    }
}
