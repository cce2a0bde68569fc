//! OpenAI Codex CLI
//!
//! `codex exec --json` prints one JSON event per line. The last completed
//! agent message carries the answer, so the stream is reduced with `jq`
//! before parsing.

use fable_core::ProviderKind;

use crate::backend::{CliSpec, FilterStage, PromptDelivery};

pub const PROGRAM: &str = "codex";
pub const FILTER_PROGRAM: &str = "jq";

const LAST_AGENT_MESSAGE: &str =
    r#"map(select(.type == "item.completed" and .item.type == "agent_message")) | last"#;

/// `item.content[0].text`, or `item.text` in newer event streams
const ANSWER_POINTERS: [&str; 2] = ["/item/content/0/text", "/item/text"];

pub fn spec() -> CliSpec {
    CliSpec {
        kind: ProviderKind::Codex,
        program: PROGRAM.to_string(),
        args: vec![
            "exec".to_string(),
            "--json".to_string(),
            "--skip-git-repo-check".to_string(),
        ],
        delivery: PromptDelivery::Trailing,
        filter: Some(FilterStage {
            program: FILTER_PROGRAM.to_string(),
            args: vec![
                "-s".to_string(),
                "-c".to_string(),
                LAST_AGENT_MESSAGE.to_string(),
            ],
        }),
        answer_pointers: ANSWER_POINTERS.iter().map(|p| p.to_string()).collect(),
    }
}
