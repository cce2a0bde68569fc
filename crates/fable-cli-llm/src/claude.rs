//! Claude Code CLI

use fable_core::ProviderKind;

use crate::backend::{CliSpec, PromptDelivery};

pub const PROGRAM: &str = "claude";

/// `claude --output-format json -p <prompt>`, answer in `result`
pub fn spec() -> CliSpec {
    CliSpec {
        kind: ProviderKind::ClaudeCode,
        program: PROGRAM.to_string(),
        args: vec!["--output-format".to_string(), "json".to_string()],
        delivery: PromptDelivery::Flag("-p".to_string()),
        filter: None,
        answer_pointers: vec!["/result".to_string()],
    }
}
