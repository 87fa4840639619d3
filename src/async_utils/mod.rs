//! Asynchronous utilities for use with Tokio.
//!
//! Everything that touches child processes or background tasks directly lives
//! here, so the conversion pipeline itself can read like straight-line code.

use crate::prelude::*;

pub mod io;
pub mod task;

/// Report any command failures, and include any error output.
///
/// Both output streams are logged at `debug` level, because tools like
/// `ocrmypdf` write their normal progress chatter to stderr. On failure,
/// stderr goes into the returned error instead, so that whoever logs the error
/// shows it exactly once.
pub fn check_for_command_failure(
    command_name: &str,
    output: &std::process::Output,
) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %stdout,
        "Standard output from command"
    );
    debug!(
        command_name = command_name,
        output = %stderr,
        "Standard error from command",
    );

    if output.status.success() {
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} was terminated by a signal, with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{
        os::unix::process::ExitStatusExt as _,
        process::{ExitStatus, Output},
    };

    use crate::test_log::capture_logs;

    use super::*;

    fn output(raw_status: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(raw_status),
            stdout: b"some progress".to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn success_is_ok_even_with_stderr_chatter() {
        let out = output(0, "Start processing 2 pages concurrently");
        assert!(check_for_command_failure("ocrmypdf", &out).is_ok());
    }

    #[test]
    fn non_zero_exit_includes_code_and_stderr() {
        // Raw wait status: exit code lives in the high byte.
        let out = output(2 << 8, "InputFileError: not a PDF");
        let err = check_for_command_failure("ocrmypdf", &out).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 2"), "{msg}");
        assert!(msg.contains("InputFileError"), "{msg}");
    }

    #[test]
    fn failure_output_is_not_logged_as_an_error() {
        let (_guard, logs) = capture_logs(tracing::Level::WARN);
        let out = output(2 << 8, "InputFileError: not a PDF");
        let err = check_for_command_failure("ocrmypdf", &out).unwrap_err();

        // The error carries stderr, so the caller's log line shows it once.
        assert!(err.to_string().contains("InputFileError"));
        let logged = logs.contents();
        assert!(!logged.contains("InputFileError"), "{logged}");
    }

    #[test]
    fn killed_process_is_a_failure() {
        // Raw wait status 9 means "killed by SIGKILL".
        let out = output(9, "");
        let err = check_for_command_failure("gs", &out).unwrap_err();
        assert!(err.to_string().contains("terminated by a signal"));
    }
}
