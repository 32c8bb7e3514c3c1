use crate::api::{GenerateContentRequest, GenerativeModel};
use crate::error::{Result, StoryboardError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const DIRECTOR_PERSONA: &str = "You are a world-class film director. The user is writing a \
    script and developing its visuals. Give professional, inspiring advice. Answer concisely \
    and artistically, in the language the user is working in.";

pub const GREETING: &str =
    "Hello! I am your AI Director. Need help refining your script or storyboard?";
pub const EMPTY_REPLY: &str = "I'm sorry, I couldn't process that.";
pub const CONNECTION_ERROR_REPLY: &str = "Error connecting to AI Assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

pub struct ChatClient {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
}

impl ChatClient {
    pub fn new(model: Arc<dyn GenerativeModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    /// Ask the director persona. Only `message` goes over the wire; the service keeps
    /// no memory between calls, so continuity lives in the caller's transcript.
    pub async fn reply(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        debug!("Chat turn with {} prior messages", history.len());

        let request =
            GenerateContentRequest::user_text(message).with_system_instruction(DIRECTOR_PERSONA);
        let response = self
            .model
            .generate_content(&self.model_name, request)
            .await
            .map_err(|e| StoryboardError::ChatFailure(e.to_string()))?;

        Ok(response.text().unwrap_or_default())
    }
}

/// Append-only conversation shown by the chat surface.
pub struct ChatTranscript {
    client: ChatClient,
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            messages: vec![ChatMessage::model(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send one user turn and return the reply that was appended.
    ///
    /// Blank input is ignored. Failures never escape; they show up as a model message.
    pub async fn send(&mut self, input: &str) -> Option<&ChatMessage> {
        if input.trim().is_empty() {
            return None;
        }

        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(input));

        let text = match self.client.reply(input, &history).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => EMPTY_REPLY.to_string(),
            Err(e) => {
                warn!("Chat request failed: {}", e);
                CONNECTION_ERROR_REPLY.to_string()
            }
        };

        self.messages.push(ChatMessage::model(text));
        self.messages.last()
    }
}
