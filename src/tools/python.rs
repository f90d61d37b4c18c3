//! Python sandbox: runs model-written code in a separate interpreter process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::{truncate_chars, Tool};
use crate::sanitize::{clean_input, strip_code_fences};

const MAX_OUTPUT_CHARS: usize = 10_000;

/// Bytes read from each of stdout and stderr before the process is stopped.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Run Python code and return what it printed.
pub struct RunPythonCode {
    python_bin: String,
    timeout: Duration,
}

impl RunPythonCode {
    pub fn new(python_bin: String, timeout: Duration) -> Self {
        Self {
            python_bin,
            timeout,
        }
    }
}

#[async_trait]
impl Tool for RunPythonCode {
    fn name(&self) -> &str {
        "run_python_code"
    }

    fn description(&self) -> &str {
        "Useful for when you need to use python to answer a question. Input should be valid python code; use print() to see results."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let code = strip_code_fences(&clean_input(input));
        if code.trim().is_empty() {
            anyhow::bail!("no python code given");
        }

        tracing::info!("Executing python code ({} chars)", code.len());

        let mut child = Command::new(&self.python_bin)
            .arg("-c")
            .arg(&code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to start {}: {}", self.python_bin, e))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            anyhow::bail!("Failed to capture python output");
        };

        let overflow = CancellationToken::new();
        let capture = async {
            let readers = async {
                tokio::try_join!(
                    read_capped(stdout, &overflow),
                    read_capped(stderr, &overflow)
                )
            };
            tokio::pin!(readers);

            // A flooding stream must not leave the other reader waiting on a live process.
            let mut stopped = false;
            let captured = tokio::select! {
                res = &mut readers => res?,
                _ = overflow.cancelled() => {
                    stop_child(&mut child);
                    stopped = true;
                    readers.await?
                }
            };
            if overflow.is_cancelled() && !stopped {
                stop_child(&mut child);
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((captured, status))
        };

        // On timeout the child is dropped, and `kill_on_drop` ends it.
        let ((stdout, stderr), status) = tokio::time::timeout(self.timeout, capture)
            .await
            .map_err(|_| anyhow::anyhow!("Python execution timed out after {} seconds", self.timeout.as_secs()))?
            .map_err(|e| anyhow::anyhow!("Failed to read python output: {}", e))?;

        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);

        if overflow.is_cancelled() {
            let mut result = truncate_chars(&stdout, MAX_OUTPUT_CHARS, "\n... [output truncated]");
            result.push_str("\n(process stopped: output limit reached)");
            return Ok(result);
        }

        let result = if status.success() {
            if stdout.trim().is_empty() {
                "(no output - use print() to see results)".to_string()
            } else {
                stdout.into_owned()
            }
        } else {
            // The traceback's last line carries the exception; keep stdout for context.
            let mut combined = stdout.into_owned();
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(stderr.trim());
            combined
        };

        Ok(truncate_chars(
            &result,
            MAX_OUTPUT_CHARS,
            "\n... [output truncated]",
        ))
    }
}

/// Read at most `MAX_CAPTURE_BYTES` from a child pipe, flagging `overflow`
/// when the stream had more.
async fn read_capped<R>(reader: R, overflow: &CancellationToken) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .take(MAX_CAPTURE_BYTES as u64 + 1)
        .read_to_end(&mut buf)
        .await?;
    if buf.len() > MAX_CAPTURE_BYTES {
        buf.truncate(MAX_CAPTURE_BYTES);
        overflow.cancel();
    }
    Ok(buf)
}

fn stop_child(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to stop python process: {}", e);
    } else {
        tracing::warn!("Python output exceeded {} bytes, process stopped", MAX_CAPTURE_BYTES);
    }
}
