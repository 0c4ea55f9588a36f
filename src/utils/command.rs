//! Command execution utilities

use crate::utils::error::{PartplanError, Result};
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tracing::{debug, warn};

fn spawn_error(program: &str, e: std::io::Error) -> PartplanError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PartplanError::CommandNotFound(program.to_string())
    } else {
        PartplanError::Io(e)
    }
}

fn check_status(program: &str, args: &[&str], output: Output) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        warn!(
            "Command failed: {} {}\n  stderr: {}",
            program,
            args.join(" "),
            stderr.trim()
        );
        return Err(PartplanError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            stderr,
        });
    }
    Ok(output)
}

/// Execute a command and return the output
pub fn run_command(program: &str, args: &[&str]) -> Result<Output> {
    debug!("Running: {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    check_status(program, args, output)
}

/// Execute a command and return stdout as string
pub fn run_command_output(program: &str, args: &[&str]) -> Result<String> {
    let output = run_command(program, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Execute a command, feeding `input` on stdin
pub fn run_command_with_input(program: &str, args: &[&str], input: &str) -> Result<Output> {
    debug!("Running: {} {} (with {} bytes of stdin)", program, args.join(" "), input.len());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    check_status(program, args, output)
}

/// Log a command that would be run (for dry-run mode)
pub fn log_dry_run(program: &str, args: &[&str]) {
    println!("  [dry-run] {} {}", program, args.join(" "));
}

/// Wrapper for command execution that respects dry-run mode
pub struct CommandRunner {
    dry_run: bool,
}

impl CommandRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn run(&self, program: &str, args: &[&str]) -> Result<Option<Output>> {
        if self.dry_run {
            log_dry_run(program, args);
            Ok(None)
        } else {
            run_command(program, args).map(Some)
        }
    }

    /// Run with stdin input. In dry-run mode the input is echoed instead.
    pub fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<Option<Output>> {
        if self.dry_run {
            log_dry_run(program, args);
            for line in input.lines() {
                println!("    {}", line);
            }
            Ok(None)
        } else {
            run_command_with_input(program, args, input).map(Some)
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_never_executes() {
        let cmd = CommandRunner::new(true);
        assert!(cmd.is_dry_run());
        let out = cmd
            .run("definitely-not-a-real-program", &["--flag"])
            .unwrap();
        assert!(out.is_none());
        let out = cmd
            .run_with_input("definitely-not-a-real-program", &[], "label: gpt\n")
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn missing_program_is_command_not_found() {
        let err = run_command("definitely-not-a-real-program", &[]).unwrap_err();
        assert!(matches!(err, PartplanError::CommandNotFound(p) if p == "definitely-not-a-real-program"));
    }
}
