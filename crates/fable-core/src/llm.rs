//! Generation backend trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::ProviderKind;

/// One message of a chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Why a backend could not produce an answer.
///
/// Every runtime fault of a backend collapses into one of these; the
/// orchestrator turns any of them into a single generation failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("output filter {program} failed: {message}")]
    Filter { program: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Outcome of a single generation call. An empty answer is a success.
pub type Generation = std::result::Result<String, GenerationFailure>;

/// Trait for text generation backends (Ollama daemon, CLI tools)
///
/// `generate` never returns an error type of the crate: faults are folded
/// into [`GenerationFailure`] so callers decide how to surface them.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Which provider this backend implements
    fn kind(&self) -> ProviderKind;

    /// Human readable descriptor, e.g. `ollama (llama3.1:8b)` or `codex`
    fn describe(&self) -> String {
        self.kind().name().to_string()
    }

    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Generation;

    /// Generate a reply to a chat exchange
    async fn chat(&self, messages: &[ChatMessage]) -> Generation {
        let prompt = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.generate(&prompt).await
    }
}
