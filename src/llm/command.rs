//! Backend that shells out to a local CLI.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::debug;

use super::{LlmClient, LlmError};

const MODEL_PLACEHOLDER: &str = "{model}";

/// Runs `program args...`, writes the prompt to stdin and reads the
/// completion from stdout. A `{model}` argument is replaced by the model.
pub struct CommandClient {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandClient {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line.
    pub fn parse(line: &str) -> Result<Self, LlmError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| LlmError::Unavailable("empty provider command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn args_for(&self, model: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(MODEL_PLACEHOLDER, model))
            .collect()
    }
}

impl LlmClient for CommandClient {
    fn complete(&self, prompt: &str, timeout: Duration, model: &str) -> Result<String, LlmError> {
        // Prompt goes over stdin to avoid command line length limits
        let mut child = Command::new(&self.program)
            .args(self.args_for(model))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                LlmError::Unavailable(format!("Failed to run {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(prompt.as_bytes()) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(LlmError::Provider(format!(
                    "Failed to write to stdin: {}",
                    e
                )));
            }
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(read_all(stdout));
        });
        let stderr_reader = thread::spawn(move || read_all(stderr));

        let response = match rx.recv_timeout(timeout) {
            Ok(response) => response,
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LlmError::Timeout(timeout));
            }
        };

        let status = child
            .wait()
            .map_err(|e| LlmError::Provider(format!("Failed to wait for {}: {}", self.program, e)))?;
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(LlmError::Provider(format!(
                "{} failed (exit {}): stderr={} stdout={}",
                self.program,
                status.code().unwrap_or(-1),
                stderr.trim(),
                response.trim()
            )));
        }

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, stderr.trim());
        }

        Ok(response)
    }
}

fn read_all<R: Read>(source: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut source) = source {
        let _ = source.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).to_string()
}
