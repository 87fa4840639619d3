//! Interfaces to the external tools which do the real work.
//!
//! The conversion pipeline only knows about [`OcrEngine`] and [`Compressor`].
//! The production implementations wrap the `ocrmypdf` and Ghostscript CLIs,
//! and share the process plumbing in [`ExternalTool`].

use std::{
    ffi::OsString,
    process::{Output, Stdio},
};

use tokio::process::Command;

use crate::{async_utils::check_for_command_failure, prelude::*};

pub mod ghostscript;
pub mod ocrmypdf;

/// Adds a text layer to a PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// OCR `input`, writing a complete new PDF to `output`.
    async fn ocr(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Rewrites a PDF to make it smaller.
#[async_trait]
pub trait Compressor: Send + Sync + 'static {
    /// Compress `input`, writing a new PDF to `output`.
    async fn compress(&self, input: &Path, output: &Path) -> Result<()>;
}

/// An external program, plus any arguments which must come before ours.
#[derive(Clone, Debug)]
pub struct ExternalTool {
    /// Name used in logs and error messages.
    name: &'static str,
    /// The program to launch.
    program: String,
    /// Arguments inserted before ours.
    prefix_args: Vec<String>,
}

impl ExternalTool {
    /// Describe a new external tool.
    pub fn new(name: &'static str, program: &str, prefix_args: &[String]) -> Self {
        Self {
            name,
            program: program.to_owned(),
            prefix_args: prefix_args.to_owned(),
        }
    }

    /// The name we use for this tool in messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build a command. On Unix the child leads its own process group, so
    /// [`ExternalTool::output`] can kill any helpers it starts, too.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Run the tool with `args` and collect its output.
    ///
    /// If the returned future is dropped before the tool exits (because a
    /// [`WorkerTask`](crate::async_utils::task::WorkerTask) was cancelled or
    /// timed out), the tool and everything it started are killed.
    async fn output(&self, args: &[OsString]) -> Result<Output> {
        let child = self
            .command()
            .args(args)
            .spawn()
            .with_context(|| format!("cannot run {} ({:?})", self.name, self.program))?;
        #[cfg(unix)]
        let _group = ProcessGroupGuard::new(self.name, child.id());
        child
            .wait_with_output()
            .await
            .with_context(|| format!("error waiting for {}", self.name))
    }

    /// Run the tool with `args` and wait for it to exit successfully.
    #[instrument(level = "debug", skip_all, fields(tool = self.name))]
    pub async fn run(&self, args: &[OsString]) -> Result<()> {
        debug!(program = %self.program, ?args, "Running external tool");
        let output = self.output(args).await?;
        check_for_command_failure(self.name, &output)
    }

    /// Run the tool with `--version` and return the first line it prints.
    #[instrument(level = "debug", skip_all, fields(tool = self.name))]
    pub async fn version(&self) -> Result<String> {
        let output = self.output(&["--version".into()]).await?;
        check_for_command_failure(self.name, &output)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("unknown version")
            .to_owned())
    }
}

/// Kills a child's whole process group when dropped.
///
/// `kill_on_drop` only reaches the direct child. Tools like `ocrmypdf` run
/// `tesseract`, `unpaper` and `gs` as helpers, and those must not outlive the
/// file they were working on. After a normal exit the group is usually empty,
/// and the kill is a no-op.
#[cfg(unix)]
struct ProcessGroupGuard {
    name: &'static str,
    pgid: Option<libc::pid_t>,
}

#[cfg(unix)]
impl ProcessGroupGuard {
    fn new(name: &'static str, pid: Option<u32>) -> Self {
        let pgid = pid.and_then(|pid| libc::pid_t::try_from(pid).ok());
        Self { name, pgid }
    }
}

#[cfg(unix)]
impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid else { return };
        // SAFETY: `killpg` takes plain integers and touches no memory of ours.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            debug!(tool = self.name, pgid, "Killed leftover process group");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalTool {
        ExternalTool::new("test-tool", "sh", &["-c".to_owned(), script.to_owned(), "sh".to_owned()])
    }

    #[tokio::test]
    async fn run_passes_args_after_prefix() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("args.txt");
        let tool = sh(r#"printf '%s\n' "$@" > "$1""#);
        tool.run(&[out.clone().into(), "two words".into()]).await?;
        let written = std::fs::read_to_string(&out)?;
        assert_eq!(written, format!("{}\ntwo words\n", out.display()));
        Ok(())
    }

    #[tokio::test]
    async fn run_reports_non_zero_exit() {
        let tool = sh("echo 'bad input' >&2; exit 3");
        let err = tool.run(&[]).await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("exit code 3"), "{msg}");
        assert!(msg.contains("bad input"), "{msg}");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let tool = ExternalTool::new("nope", "/nonexistent/pdf-manager-tool", &[]);
        let err = tool.run(&[]).await.unwrap_err();
        assert!(err.to_string().contains("cannot run nope"));
        assert!(tool.version().await.is_err());
    }

    #[tokio::test]
    async fn version_returns_first_line() -> Result<()> {
        let tool = sh(r#"[ "$1" = --version ] && printf '\n  1.2.3  \nextra\n'"#);
        assert_eq!(tool.version().await?, "1.2.3");
        Ok(())
    }
}
