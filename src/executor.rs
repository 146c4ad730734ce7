//! Runs learner code through an interpreter with a wall-clock limit.
//!
//! The code is piped to the interpreter's stdin. Whatever happens inside the
//! program is reported as an [`ExecutionResult`]; only failing to start the
//! interpreter at all is an error.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::error::AppError;

const TRUNCATION_MARKER: &str = "\n... (output truncated)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Succeeded {
        stdout: String,
        duration_ms: u64,
    },
    Raised {
        stdout: String,
        /// Last line of the interpreter's error output, e.g. the exception.
        error: String,
        details: String,
        duration_ms: u64,
    },
    TimedOut {
        limit_ms: u64,
    },
}

impl ExecutionResult {
    pub fn stdout(&self) -> &str {
        match self {
            ExecutionResult::Succeeded { stdout, .. } | ExecutionResult::Raised { stdout, .. } => {
                stdout
            }
            ExecutionResult::TimedOut { .. } => "",
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            ExecutionResult::Succeeded { .. } => None,
            ExecutionResult::Raised { error, .. } => Some(error.clone()),
            ExecutionResult::TimedOut { limit_ms } => Some(format!(
                "Your code took longer than {} seconds. Is there a loop that never stops?",
                *limit_ms as f64 / 1000.0
            )),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ExecutionResult::Succeeded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CodeRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
    max_code_bytes: usize,
}

impl CodeRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(5),
            max_output_bytes: 16 * 1024,
            max_code_bytes: 8 * 1024,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.interpreter.clone(), config.interpreter_args.clone())
            .with_timeout(config.execution_timeout())
            .with_limits(config.max_code_bytes, config.max_output_bytes)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_limits(mut self, max_code_bytes: usize, max_output_bytes: usize) -> Self {
        self.max_code_bytes = max_code_bytes;
        self.max_output_bytes = max_output_bytes;
        self
    }

    #[instrument(skip(self, code), fields(program = %self.program, code_bytes = code.len()))]
    pub async fn run(&self, code: &str) -> Result<ExecutionResult, AppError> {
        if code.len() > self.max_code_bytes {
            return Err(AppError::Validation(format!(
                "Code is too long ({} bytes, limit {})",
                code.len(),
                self.max_code_bytes
            )));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::Internal(format!("Failed to start interpreter {}: {}", self.program, e))
            })?;

        let started = Instant::now();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;

        let execution = async move {
            let feed = async move {
                if let Some(mut stdin) = stdin {
                    // The program may exit before reading all of its input.
                    if let Err(e) = stdin.write_all(code.as_bytes()).await {
                        if e.kind() != std::io::ErrorKind::BrokenPipe {
                            return Err(e);
                        }
                    }
                }
                Ok(())
            };

            let (fed, stdout, stderr, status) = tokio::join!(
                feed,
                read_capped(stdout, limit),
                read_capped(stderr, limit),
                child.wait()
            );
            fed?;
            Ok::<_, std::io::Error>(CapturedOutput {
                status: status?,
                stdout: stdout?,
                stderr: stderr?,
            })
        };

        let output = match tokio::time::timeout(self.timeout, execution).await {
            Ok(output) => output.map_err(|e| {
                AppError::Internal(format!("Failed to collect interpreter output: {}", e))
            })?,
            Err(_) => {
                // Dropping the future dropped the child, which kills it.
                warn!(limit_ms = self.timeout.as_millis() as u64, "Execution timed out");
                return Ok(ExecutionResult::TimedOut {
                    limit_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let stdout = self.truncate(String::from_utf8_lossy(&output.stdout).into_owned());

        if output.status.success() {
            debug!(duration_ms, "Execution succeeded");
            return Ok(ExecutionResult::Succeeded { stdout, duration_ms });
        }

        let details = self.truncate(String::from_utf8_lossy(&output.stderr).trim().to_string());
        let error = details
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .unwrap_or_else(|| match output.status.code() {
                Some(code) => format!("Program exited with status {}", code),
                None => "Program was stopped by a signal".to_string(),
            });

        debug!(duration_ms, error = %error, "Execution raised an error");
        Ok(ExecutionResult::Raised {
            stdout,
            error,
            details,
            duration_ms,
        })
    }

    fn truncate(&self, mut text: String) -> String {
        if text.len() <= self.max_output_bytes {
            return text;
        }
        let mut cut = self.max_output_bytes;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
        text
    }
}

struct CapturedOutput {
    status: std::process::ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Keeps the first `limit + 1` bytes of a pipe and drains the rest.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };

    let mut buffer = Vec::new();
    let mut capped = reader.take(limit as u64 + 1);
    capped.read_to_end(&mut buffer).await?;

    let mut rest = capped.into_inner();
    tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    Ok(buffer)
}
