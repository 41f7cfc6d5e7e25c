//! Remote execution over the `ssh` client.

use async_trait::async_trait;
use tracing::debug;

use super::process::run_program;
use super::{CommandOutput, ProviderResult, RemoteExec};
use crate::error::ProviderError;

/// Exit status the ssh client uses for its own failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshExec {
    program: String,
    options: Vec<String>,
}

impl Default for SshExec {
    fn default() -> Self {
        Self::new()
    }
}

impl SshExec {
    pub fn new() -> Self {
        Self {
            program: "ssh".to_string(),
            options: vec!["-o".to_string(), "BatchMode=yes".to_string()],
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn exec(
        &self,
        host: &str,
        command: &str,
        stdin: Option<&[u8]>,
    ) -> ProviderResult<CommandOutput> {
        debug!(host, command, "ssh");
        let mut args = self.options.clone();
        args.push(host.to_string());
        args.push(command.to_string());
        let output = run_program(&self.program, &args, stdin).await?;
        if output.exit_code == SSH_CONNECTION_FAILURE {
            return Err(ProviderError::Transient(format!(
                "ssh to {host} failed: {}",
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    async fn exec_checked(&self, host: &str, command: &str, stdin: Option<&[u8]>) -> ProviderResult<()> {
        let output = self.exec(host, command, stdin).await?;
        if !output.success() {
            return Err(ProviderError::Api(format!(
                "`{command}` on {host} exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Quote for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote a glob, leaving each `*` outside the quotes so the shell expands it.
fn quote_glob(pattern: &str) -> String {
    pattern
        .split('*')
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join("*")
}

#[async_trait]
impl RemoteExec for SshExec {
    async fn run(&self, host: &str, command: &str) -> ProviderResult<CommandOutput> {
        self.exec(host, command, None).await
    }

    async fn upload(&self, host: &str, path: &str, contents: &str) -> ProviderResult<()> {
        let command = format!("cat > {}", shell_quote(path));
        self.exec_checked(host, &command, Some(contents.as_bytes()))
            .await
    }

    async fn remove(&self, host: &str, pattern: &str) -> ProviderResult<()> {
        let command = format!("rm -f -- {}", quote_glob(pattern));
        self.exec_checked(host, &command, None).await
    }
}
