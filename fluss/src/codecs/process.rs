//! Spawning external codec tools.

use crate::errors::OperationError;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Creates a command that does not open a console window on Windows.
pub(crate) fn std_command(program: impl AsRef<OsStr>) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// A running tool whose stderr is drained on a background thread.
///
/// Dropping a tool that was never waited on kills it, so no child outlives
/// the stage that started it.
#[derive(Debug)]
pub struct RunningTool {
    program: String,
    child: Option<Child>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl RunningTool {
    /// Spawns `program` with piped stdio as requested.
    pub fn spawn<S: AsRef<OsStr>>(
        program: &Path,
        args: &[S],
        pipe_stdin: bool,
        pipe_stdout: bool,
    ) -> Result<Self, OperationError> {
        let name = program.display().to_string();
        debug!(program = %name, "Spawning tool");

        let mut child = std_command(program)
            .args(args)
            .stdin(if pipe_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(if pipe_stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OperationError::external_tool(&name, None, e.to_string()))?;

        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        Ok(Self {
            program: name,
            child: Some(child),
            stderr,
        })
    }

    /// Takes the stdin pipe.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.as_mut().and_then(|c| c.stdin.take())
    }

    /// Takes the stdout pipe.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|c| c.stdout.take())
    }

    /// Returns the program path as text.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Waits for exit and maps a failure status to [`OperationError::ExternalTool`].
    pub fn wait(mut self) -> Result<(), OperationError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        drop(child.stdin.take());
        let status = child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .map(|buf| String::from_utf8_lossy(&buf).trim().to_string())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(OperationError::external_tool(&self.program, status.code(), stderr))
        }
    }
}

impl Drop for RunningTool {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!(program = %self.program, error = %e, "Tool already exited");
            }
            if let Err(e) = child.wait() {
                warn!(program = %self.program, error = %e, "Failed to reap tool");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_external_tool_error() {
        let err = RunningTool::spawn(Path::new("/nonexistent/codec"), &["-d"], false, false)
            .unwrap_err();
        assert!(matches!(err, OperationError::ExternalTool { exit_code: None, .. }));
    }

    #[test]
    fn test_nonzero_exit_captures_stderr() {
        let tool = RunningTool::spawn(
            Path::new("/bin/sh"),
            &["-c", "echo broken stream >&2; exit 3"],
            false,
            false,
        )
        .unwrap();

        match tool.wait() {
            Err(OperationError::ExternalTool { exit_code, stderr, .. }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "broken stream");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_stdout_pipe() {
        let mut tool =
            RunningTool::spawn(Path::new("/bin/sh"), &["-c", "printf pcm"], false, true).unwrap();
        let mut out = String::new();
        tool.take_stdout().unwrap().read_to_string(&mut out).unwrap();
        tool.wait().unwrap();
        assert_eq!(out, "pcm");
    }
}
