//! Running external programs for the command-line backends.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::trace;

use super::{CommandOutput, ProviderResult};
use crate::error::ProviderError;

/// Run `program` with `args`, optionally feeding `stdin`, and capture its output.
///
/// A non-zero exit is returned as output, not as an error; only a program that
/// could not be started is an error.
pub async fn run_program(
    program: &str,
    args: &[String],
    stdin: Option<&[u8]>,
) -> ProviderResult<CommandOutput> {
    trace!(program, ?args, "running");
    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProviderError::Api(format!("failed to start {program}: {e}")))?;

    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        pipe.write_all(input)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to write to {program}: {e}")))?;
        pipe.shutdown()
            .await
            .map_err(|e| ProviderError::Api(format!("failed to close stdin of {program}: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ProviderError::Api(format!("failed to wait for {program}: {e}")))?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code_and_streams() {
        let output = run_program(
            "sh",
            &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            None,
        )
        .await
        .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn feeds_stdin() {
        let output = run_program("cat", &[], Some(b"hello"))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let err = run_program("fleetswap-no-such-program", &[], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
