//! Generation provider kinds

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Supported generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local Ollama daemon
    Ollama,
    /// Claude Code CLI
    ClaudeCode,
    /// Gemini CLI
    GeminiCli,
    /// OpenAI Codex CLI
    Codex,
}

impl ProviderKind {
    /// Get the configuration name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::ClaudeCode => "claude_code",
            ProviderKind::GeminiCli => "gemini_cli",
            ProviderKind::Codex => "codex",
        }
    }

    /// Get the display name for this provider
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama",
            ProviderKind::ClaudeCode => "Claude Code",
            ProviderKind::GeminiCli => "Gemini CLI",
            ProviderKind::Codex => "Codex",
        }
    }

    /// Whether instances of this provider are distinguished by model name.
    pub fn has_model_axis(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }

    /// Get all supported providers
    pub fn all() -> Vec<ProviderKind> {
        vec![
            ProviderKind::Ollama,
            ProviderKind::ClaudeCode,
            ProviderKind::GeminiCli,
            ProviderKind::Codex,
        ]
    }

    /// Key under which a constructed backend is cached.
    pub fn cache_key(&self, model: Option<&str>) -> String {
        match model {
            Some(model) if self.has_model_axis() => format!("{}:{}", self.name(), model),
            _ => self.name().to_string(),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ollama" => Ok(ProviderKind::Ollama),
            "claude_code" => Ok(ProviderKind::ClaudeCode),
            "gemini_cli" => Ok(ProviderKind::GeminiCli),
            "codex" => Ok(ProviderKind::Codex),
            other => Err(Error::InvalidArgument(format!(
                "Unknown LLM provider: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
