//! External process execution.
//!
//! Every external tool (the media engine, TTS commands, the demotape
//! renderer, the image compositor) is invoked through [`run_command`]:
//! discrete argv tokens, never a shell-interpolated string. Output is
//! captured and, when a log path is given, written as a structured log
//! artifact before the result is surfaced.

pub mod logfile;

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program:?} failed with exit={code:?}")]
    ExitStatus {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, capturing stdout/stderr. A non-zero exit
/// becomes a [`ShellError::ExitStatus`] carrying the full captured output.
/// When `log_path` is given, the command line, exit code, and both output
/// streams are written there regardless of success.
pub fn run_command(
    program: &str,
    args: &[String],
    log_path: Option<&Path>,
) -> Result<CommandOutput, ShellError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ShellError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if let Some(path) = log_path {
        write_log(path, program, args, output.status.code(), &stdout, &stderr);
    }

    if !output.status.success() {
        return Err(ShellError::ExitStatus {
            program: program.to_string(),
            args: args.to_vec(),
            code: output.status.code(),
            stdout,
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Whether an external command can be found on PATH. Used by TTS engine
/// availability probes; performs no other I/O.
pub fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

fn write_log(
    path: &Path,
    program: &str,
    args: &[String],
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) {
    let mut body = String::new();
    let _ = writeln!(body, "command: {} {}", program, args.join(" "));
    let _ = writeln!(body, "exit: {}", code.map_or("signal".into(), |c| c.to_string()));
    let _ = writeln!(body, "\n--- stdout ---\n{stdout}");
    let _ = writeln!(body, "\n--- stderr ---\n{stderr}");

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    // Logging must never mask the command result itself.
    let _ = fs::write(path, body);
}

/// Owned program + argv pair produced by the filter-graph compilers.
/// Building one is pure; only [`ExternalCommand::run`] touches the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn run(&self, log_path: Option<&Path>) -> Result<CommandOutput, ShellError> {
        run_command(&self.program, &self.args, log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_successful_command() {
        let out = run_command("true", &[], None).unwrap();
        assert_eq!(out.stdout, "");
    }

    #[test]
    fn nonzero_exit_is_a_typed_error() {
        let err = run_command("false", &[], None).unwrap_err();
        match err {
            ShellError::ExitStatus { program, code, .. } => {
                assert_eq!(program, "false");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_command("castkit-no-such-binary", &[], None).unwrap_err();
        assert!(matches!(err, ShellError::Spawn { .. }));
    }

    #[test]
    fn log_file_contains_command_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("cmd.txt");
        let args = vec!["hello".to_string()];
        run_command("echo", &args, Some(&log)).unwrap();

        let body = std::fs::read_to_string(&log).unwrap();
        assert!(body.contains("command: echo hello"));
        assert!(body.contains("exit: 0"));
        assert!(body.contains("--- stdout ---"));
        assert!(body.contains("hello"));
    }
}
