//! Command-line tool generation backends
//!
//! Each supported tool is described by a [`CliSpec`] and driven by the shared
//! [`CliBackend`] runner, so spawn, timeout and parse behaviour is identical
//! across Claude Code, Gemini CLI and Codex.

pub mod backend;
pub mod claude;
pub mod codex;
pub mod gemini;


pub use backend::{extract_answer, CliBackend, CliSpec, FilterStage, PromptDelivery, DEFAULT_TIMEOUT};

use fable_core::ProviderKind;

/// Invocation protocol for a CLI provider; `None` for providers that are not CLI tools.
pub fn spec_for(kind: ProviderKind) -> Option<CliSpec> {
    match kind {
        ProviderKind::ClaudeCode => Some(claude::spec()),
        ProviderKind::GeminiCli => Some(gemini::spec()),
        ProviderKind::Codex => Some(codex::spec()),
        ProviderKind::Ollama => None,
    }
}
