use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use ctvp_core::api::{CommandOracleConfig, Oracle, OracleError};

use super::snippet;

const STDERR_SNIPPET_LEN: usize = 300;

/// Local CLI oracle: the prompt goes to stdin, the completion comes back on
/// stdout. The child is killed if the call is dropped.
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(cfg: &CommandOracleConfig) -> Self {
        Self {
            program: cfg.program.clone(),
            args: cfg.args.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }
}

#[async_trait]
impl Oracle for CommandOracle {
    fn name(&self) -> &str {
        &self.program
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, OracleError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("failed to spawn {}: {e}", self.program)))?;

        let stdin = child.stdin.take();
        let prompt = format!("{system_prompt}\n\n{user_prompt}");
        let program = &self.program;
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading stdin is judged by its exit status.
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    tracing::debug!(target: "ctvp.oracle", program = %program, error = %e, "stdin write failed");
                }
            }
        };

        // Stdin is fed while stdout drains so a child that streams output
        // cannot deadlock on a full pipe.
        let exchange = async {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| OracleError::Timeout)?
            .map_err(|e| OracleError::Transport(e.into()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                snippet(&stderr, STDERR_SNIPPET_LEN)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(stdout)
    }
}
