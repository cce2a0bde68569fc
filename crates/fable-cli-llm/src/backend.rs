//! Shared runner for command-line generation backends
//!
//! Every CLI variant is a [`CliSpec`]: which executable to start, how the
//! prompt reaches it, an optional filter process its stdout is piped through,
//! and the JSON field holding the answer. [`CliBackend`] owns the spawn,
//! wait-with-timeout and parse steps for all of them.

use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use fable_core::{Error, Generation, GenerationBackend, GenerationFailure, ProviderKind, Result};

/// Fixed wall-clock limit for one CLI generation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the prompt is handed to the executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptDelivery {
    /// `<flag> <prompt>` appended after the fixed arguments
    Flag(String),
    /// Prompt appended as the last argument
    Trailing,
    /// Prompt written to stdin, which is then closed
    Stdin,
}

/// A second process the tool's stdout is piped through before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStage {
    pub program: String,
    pub args: Vec<String>,
}

/// Invocation protocol of one CLI variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliSpec {
    pub kind: ProviderKind,
    pub program: String,
    pub args: Vec<String>,
    pub delivery: PromptDelivery,
    pub filter: Option<FilterStage>,
    /// JSON pointers to the answer in structured output, tried in order
    pub answer_pointers: Vec<String>,
}

impl CliSpec {
    fn command(&self, prompt: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        match &self.delivery {
            PromptDelivery::Flag(flag) => {
                command.arg(flag).arg(prompt);
            }
            PromptDelivery::Trailing => {
                command.arg(prompt);
            }
            PromptDelivery::Stdin => {}
        }

        let stdin = if self.delivery == PromptDelivery::Stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        command
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// A generation backend driving an external command-line tool
pub struct CliBackend {
    spec: CliSpec,
    timeout: Duration,
}

struct Collected {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    filter: Option<(ExitStatus, Vec<u8>)>,
}

impl CliBackend {
    /// Create a backend after checking its executables are installed
    pub fn new(spec: CliSpec) -> Result<Self> {
        ensure_installed(&spec.program, spec.kind)?;
        if let Some(filter) = &spec.filter {
            ensure_installed(&filter.program, spec.kind)?;
        }

        debug!(provider = %spec.kind, program = %spec.program, "CLI backend ready");
        Ok(Self {
            spec,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the generation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, prompt: &str) -> Generation {
        let program = self.spec.program.clone();
        let mut producer = self
            .spec
            .command(prompt)
            .spawn()
            .map_err(|e| GenerationFailure::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let mut filter = match &self.spec.filter {
            Some(stage) => Some(spawn_filter(stage, &mut producer)?),
            None => None,
        };

        let input = (self.spec.delivery == PromptDelivery::Stdin).then_some(prompt);
        let collected = timeout(
            self.timeout,
            collect(&mut producer, filter.as_mut(), input),
        )
        .await;

        let collected = match collected {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                terminate(&mut producer, filter.as_mut()).await;
                return Err(GenerationFailure::Transport(format!("{}: {}", program, e)));
            }
            Err(_) => {
                terminate(&mut producer, filter.as_mut()).await;
                return Err(GenerationFailure::Timeout(self.timeout));
            }
        };

        if !collected.status.success() {
            return Err(GenerationFailure::NonZeroExit {
                program,
                status: collected.status.to_string(),
                stderr: String::from_utf8_lossy(&collected.stderr).trim().to_string(),
            });
        }

        if let (Some(stage), Some((status, stderr))) = (&self.spec.filter, &collected.filter) {
            if !status.success() {
                return Err(GenerationFailure::Filter {
                    program: stage.program.clone(),
                    message: format!(
                        "{}: {}",
                        status,
                        String::from_utf8_lossy(stderr).trim()
                    ),
                });
            }
        }

        let raw = String::from_utf8_lossy(&collected.stdout);
        Ok(extract_answer(&raw, &self.spec.answer_pointers))
    }
}

#[async_trait]
impl GenerationBackend for CliBackend {
    fn kind(&self) -> ProviderKind {
        self.spec.kind
    }

    async fn generate(&self, prompt: &str) -> Generation {
        let started = Instant::now();
        let result = self.run(prompt).await;
        match &result {
            Ok(answer) => debug!(
                provider = %self.spec.kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                answer_len = answer.len(),
                "CLI generation finished"
            ),
            Err(e) => warn!(
                provider = %self.spec.kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "CLI generation failed"
            ),
        }
        result
    }
}

/// Pull the answer out of tool output.
///
/// Structured output yields the string at the first of `pointers` that
/// resolves to one; anything else (not JSON, missing field, non-string field)
/// yields the trimmed raw output.
pub fn extract_answer<S: AsRef<str>>(raw: &str, pointers: &[S]) -> String {
    let trimmed = raw.trim();
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| {
            pointers.iter().find_map(|pointer| {
                value
                    .pointer(pointer.as_ref())
                    .and_then(Value::as_str)
                    .map(|answer| answer.trim().to_string())
            })
        })
        .unwrap_or_else(|| trimmed.to_string())
}

fn ensure_installed(program: &str, kind: ProviderKind) -> Result<()> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| Error::ToolNotFound(format!("{} executable '{}'", kind.display_name(), program)))
}

fn spawn_filter(
    stage: &FilterStage,
    producer: &mut Child,
) -> std::result::Result<Child, GenerationFailure> {
    let failure = |message: String| GenerationFailure::Filter {
        program: stage.program.clone(),
        message,
    };

    let upstream = producer
        .stdout
        .take()
        .ok_or_else(|| failure("producer stdout unavailable".to_string()))?;
    let stdin: Stdio = upstream.try_into().map_err(|e: io::Error| failure(e.to_string()))?;

    Command::new(&stage.program)
        .args(&stage.args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| failure(e.to_string()))
}

async fn collect(
    producer: &mut Child,
    filter: Option<&mut Child>,
    input: Option<&str>,
) -> io::Result<Collected> {
    let feed = feed_stdin(producer.stdin.take(), input);
    let producer_stderr = read_pipe(producer.stderr.take());

    match filter {
        None => {
            let stdout = read_pipe(producer.stdout.take());
            let ((), stdout, stderr) = tokio::try_join!(feed, stdout, producer_stderr)?;
            let status = producer.wait().await?;
            Ok(Collected {
                status,
                stdout,
                stderr,
                filter: None,
            })
        }
        Some(filter) => {
            let stdout = read_pipe(filter.stdout.take());
            let filter_stderr = read_pipe(filter.stderr.take());
            let ((), stdout, stderr, filter_stderr) =
                tokio::try_join!(feed, stdout, producer_stderr, filter_stderr)?;
            let status = producer.wait().await?;
            let filter_status = filter.wait().await?;
            Ok(Collected {
                status,
                stdout,
                stderr,
                filter: Some((filter_status, filter_stderr)),
            })
        }
    }
}

async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<&str>) -> io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };

    let written = async {
        stdin.write_all(input.as_bytes()).await?;
        stdin.shutdown().await
    }
    .await;

    match written {
        // The tool may exit without reading its input; its exit status tells the story.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn terminate(producer: &mut Child, filter: Option<&mut Child>) {
    if let Err(e) = producer.kill().await {
        warn!(error = %e, "failed to kill CLI process");
    }
    if let Some(filter) = filter {
        if let Err(e) = filter.kill().await {
            warn!(error = %e, "failed to kill filter process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_structured_answer() {
        assert_eq!(
            extract_answer(r#"{"result": "Test response"}"#, &["/result"]),
            "Test response"
        );
        assert_eq!(
            extract_answer(
                r#"{"item": {"type": "agent_message", "text": "Nested"}}"#,
                &["/item/text"]
            ),
            "Nested"
        );
    }

    #[test]
    fn test_extract_tries_pointers_in_order() {
        let pointers = ["/item/content/0/text", "/item/text"];
        assert_eq!(
            extract_answer(r#"{"item": {"content": [{"text": "First"}], "text": "Second"}}"#, &pointers),
            "First"
        );
        assert_eq!(extract_answer(r#"{"item": {"text": "Second"}}"#, &pointers), "Second");
        assert_eq!(
            extract_answer(r#"{"item": {"content": []}}"#, &pointers),
            r#"{"item": {"content": []}}"#
        );
    }

    #[test]
    fn test_extract_falls_back_to_raw() {
        assert_eq!(extract_answer("  Raw text response\n", &["/result"]), "Raw text response");
        assert_eq!(
            extract_answer(r#"{"other": "field"}"#, &["/result"]),
            r#"{"other": "field"}"#
        );
        assert_eq!(extract_answer(r#"{"result": 42}"#, &["/result"]), r#"{"result": 42}"#);
    }

    #[test]
    fn test_empty_output_is_empty_answer() {
        assert_eq!(extract_answer("\n", &["/result"]), "");
    }

    #[test]
    fn test_command_places_prompt() {
        let spec = CliSpec {
            kind: ProviderKind::ClaudeCode,
            program: "claude".into(),
            args: vec!["--output-format".into(), "json".into()],
            delivery: PromptDelivery::Flag("-p".into()),
            filter: None,
            answer_pointers: vec!["/result".into()],
        };
        let command = spec.command("Hello");
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["--output-format", "json", "-p", "Hello"]);
    }
}
