//! Assistant capability: analyze, translate, chat.
//!
//! The workspace treats the language model as a request/response text
//! capability. `OllamaClient` talks to a local Ollama server; the
//! `ScriptedAssistant` double replays canned outcomes for tests.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistant returned status {0}")]
    Status(u16),
    #[error("assistant reply was empty")]
    EmptyReply,
    #[error("no scripted reply left")]
    Exhausted,
}

pub trait AssistantClient {
    fn analyze(&self, text: &str) -> Result<String, AssistantError>;
    fn translate(&self, text: &str) -> Result<String, AssistantError>;
    fn chat(&self, text: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Blocking client for the Ollama `/api/chat` endpoint.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn local_default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request(&self, prompt: &str) -> Result<String, AssistantError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![WireMessage { role: "user", content: prompt }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::Status(status.as_u16()));
        }

        let reply: ChatResponse = response.json()?;
        if reply.message.content.trim().is_empty() {
            return Err(AssistantError::EmptyReply);
        }

        Ok(reply.message.content)
    }
}

impl AssistantClient for OllamaClient {
    fn analyze(&self, text: &str) -> Result<String, AssistantError> {
        self.request(&analysis_prompt(text))
    }

    fn translate(&self, text: &str) -> Result<String, AssistantError> {
        self.request(&translation_prompt(text))
    }

    fn chat(&self, text: &str) -> Result<String, AssistantError> {
        self.request(text)
    }
}

pub fn analysis_prompt(text: &str) -> String {
    format!(
        "Analyze the meaning of the following passage, covering:\n\
         1. Main content\n\
         2. Key concepts\n\
         3. Important claims\n\
         4. Relevant background (if any)\n\
         \n\
         Text: {text}"
    )
}

pub fn translation_prompt(text: &str) -> String {
    format!("Translate the following text:\n{text}")
}

/// Replays queued outcomes in order; every capability pops from the same
/// queue so interleavings match the call order under test.
#[derive(Debug, Default)]
pub struct ScriptedAssistant {
    replies: RefCell<VecDeque<Result<String, AssistantError>>>,
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.borrow_mut().push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self) {
        self.replies.borrow_mut().push_back(Err(AssistantError::Status(500)));
    }

    fn next(&self) -> Result<String, AssistantError> {
        self.replies.borrow_mut().pop_front().unwrap_or(Err(AssistantError::Exhausted))
    }
}

impl AssistantClient for ScriptedAssistant {
    fn analyze(&self, _text: &str) -> Result<String, AssistantError> {
        self.next()
    }

    fn translate(&self, _text: &str) -> Result<String, AssistantError> {
        self.next()
    }

    fn chat(&self, _text: &str) -> Result<String, AssistantError> {
        self.next()
    }
}
