use std::io::Write;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::ShellError;
use crate::job_control::{self, WaitOutcome};
use crate::jobs::{JobState, Pid, ProcessRegistry};
use crate::parser::ParsedCommand;
use crate::pipeline;
use crate::redirect;

/// What became of a single command after it was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Foreground command finished with this shell exit code.
    Exited(Pid, i32),
    /// Foreground command was stopped (e.g. Ctrl-Z) and stays tracked.
    Stopped(Pid),
    /// Left running in the background.
    Background(Pid),
}

/// Spawn a single (non-pipeline) command and register it.
///
/// Blocking commands are waited for and their final state recorded;
/// background commands get their own process group and are left running.
pub fn execute(
    cmd: ParsedCommand,
    registry: &mut ProcessRegistry,
    debug_mode: bool,
    stderr: &mut dyn Write,
) -> Result<ExecOutcome, ShellError> {
    let stdin = redirect::stdio_for(
        cmd.program(),
        cmd.input_redirect.as_deref(),
        redirect::open_input,
    )?;
    let stdout = redirect::stdio_for(
        cmd.program(),
        cmd.output_redirect.as_deref(),
        redirect::open_output,
    )?;

    let mut command = Command::new(cmd.program());
    command.args(cmd.operands()).stdin(stdin).stdout(stdout);
    job_control::restore_default_signals(&mut command);
    if !cmd.blocking {
        command.process_group(0);
    }

    let child = command.spawn().map_err(|source| {
        if pipeline::exec_failure_code(&source).is_some() {
            ShellError::Exec {
                program: cmd.program().to_string(),
                source,
            }
        } else {
            ShellError::resource("fork", source)
        }
    })?;
    let pid = child.id() as Pid;
    // Reaping goes through waitpid on the pid from here on.
    drop(child);

    if debug_mode {
        let _ = writeln!(stderr, "PID: {pid}\nExecuting: {}", cmd.program());
    }
    debug!(pid, program = cmd.program(), blocking = cmd.blocking, "spawned");

    let blocking = cmd.blocking;
    registry.register(cmd, pid);
    if !blocking {
        return Ok(ExecOutcome::Background(pid));
    }

    match job_control::wait_for_pid(pid) {
        Ok(WaitOutcome::Exited(code)) => {
            registry.set_status(pid, JobState::Terminated);
            Ok(ExecOutcome::Exited(pid, code))
        }
        Ok(WaitOutcome::Stopped) => {
            registry.set_status(pid, JobState::Suspended);
            Ok(ExecOutcome::Stopped(pid))
        }
        Err(err) => {
            warn!(pid, %err, "waitpid failed for foreground command");
            registry.set_status(pid, JobState::Terminated);
            Ok(ExecOutcome::Exited(pid, 1))
        }
    }
}

/// Shell exit code for an outcome; stopped and background commands count
/// as success.
pub fn exit_code(outcome: ExecOutcome) -> i32 {
    match outcome {
        ExecOutcome::Exited(_, code) => code,
        ExecOutcome::Stopped(_) | ExecOutcome::Background(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn cmd(args: &[&str], blocking: bool) -> ParsedCommand {
        ParsedCommand {
            args: args.iter().map(|s| s.to_string()).collect(),
            input_redirect: None,
            output_redirect: None,
            blocking,
            next: None,
        }
    }

    #[test]
    fn foreground_command_is_registered_and_terminated() {
        let mut registry = ProcessRegistry::new();
        let outcome = execute(cmd(&["sh", "-c", "exit 4"], true), &mut registry, false, &mut Vec::new())
            .unwrap();
        let ExecOutcome::Exited(pid, code) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(code, 4);
        assert_eq!(registry.state_of(pid), Some(JobState::Terminated));

        let listed: Vec<_> = registry.list().collect();
        assert_eq!(listed.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn background_command_stays_running() {
        let mut registry = ProcessRegistry::new();
        let outcome = execute(cmd(&["sleep", "30"], false), &mut registry, false, &mut Vec::new())
            .unwrap();
        let ExecOutcome::Background(pid) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        registry.refresh_all();
        assert_eq!(registry.state_of(pid), Some(JobState::Running));
        assert_eq!(exit_code(outcome), 0);

        job_control::send_signal(pid, libc::SIGKILL).unwrap();
        job_control::wait_for_pid(pid).unwrap();
    }

    #[test]
    fn redirects_apply_to_plain_commands() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "b\na\n").unwrap();

        let mut sort = cmd(&["sort"], true);
        sort.input_redirect = Some(input);
        sort.output_redirect = Some(output.clone());
        execute(sort, &mut ProcessRegistry::new(), false, &mut Vec::new()).unwrap();

        assert_eq!(std::fs::read_to_string(output).unwrap(), "a\nb\n");
    }

    #[test]
    fn missing_program_is_exec_error_and_not_registered() {
        let mut registry = ProcessRegistry::new();
        let err = execute(
            cmd(&["jobsh-definitely-not-a-program"], true),
            &mut registry,
            false,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ShellError::Exec { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_input_file_spawns_nothing() {
        let mut registry = ProcessRegistry::new();
        let mut cat = cmd(&["cat"], true);
        cat.input_redirect = Some(PathBuf::from("/definitely/not/here.txt"));
        assert!(execute(cat, &mut registry, false, &mut Vec::new()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn debug_mode_announces_spawn() {
        let mut stderr = Vec::new();
        execute(cmd(&["true"], true), &mut ProcessRegistry::new(), true, &mut stderr).unwrap();
        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.contains("PID: "));
        assert!(stderr.contains("Executing: true"));
    }
}
