//! Gemini CLI

use fable_core::ProviderKind;

use crate::backend::{CliSpec, PromptDelivery};

pub const PROGRAM: &str = "gemini";

/// Prompt on stdin, `gemini --output-format json`, answer in `response`.
///
/// No `--model` is passed; the CLI's own configured default model answers.
pub fn spec() -> CliSpec {
    CliSpec {
        kind: ProviderKind::GeminiCli,
        program: PROGRAM.to_string(),
        args: vec!["--output-format".to_string(), "json".to_string()],
        delivery: PromptDelivery::Stdin,
        filter: None,
        answer_pointers: vec!["/response".to_string()],
    }
}
