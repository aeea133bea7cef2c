//! Two-stage pipelines: `left | right`.
//!
//! The parent's copies of the pipe ends are closed as soon as the stage that
//! needs them has been spawned. The write end must be gone before `right`
//! starts, or `right` never sees EOF; the read end must be gone before the
//! parent blocks in `wait`, or a `left` that outlives `right` never gets
//! `EPIPE`.

use std::io::{self, Write};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{ShellError, UsageError};
use crate::job_control;
use crate::jobs::Pid;
use crate::parser::ParsedCommand;
use crate::redirect;
use crate::status;

/// How one side of a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    /// `None` when the stage never became a process.
    pub pid: Option<Pid>,
    pub exit_code: i32,
}

/// Both stages, reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub left: StageOutcome,
    pub right: StageOutcome,
}

impl PipelineOutcome {
    /// Shell exit status of the whole pipeline: that of the last stage.
    pub fn exit_code(&self) -> i32 {
        self.right.exit_code
    }
}

/// A stage after its spawn attempt.
enum Stage {
    Running(Child),
    /// Could not exec or open a redirect; carries the exit code to report.
    Failed(i32),
}

impl Stage {
    fn wait(self) -> StageOutcome {
        match self {
            Stage::Failed(exit_code) => StageOutcome {
                pid: None,
                exit_code,
            },
            Stage::Running(mut child) => {
                let pid = child.id() as Pid;
                let exit_code = match child.wait() {
                    Ok(status) => status::exit_code(status),
                    Err(err) => {
                        warn!(pid, %err, "wait on pipeline stage failed");
                        1
                    }
                };
                debug!(pid, exit_code, "pipeline stage reaped");
                StageOutcome {
                    pid: Some(pid),
                    exit_code,
                }
            }
        }
    }
}

/// Reject redirections that would fight with the pipe.
pub fn validate(left: &ParsedCommand, right: &ParsedCommand) -> Result<(), UsageError> {
    if left.output_redirect.is_some() {
        return Err(UsageError::OutputRedirectBeforePipe);
    }
    if right.input_redirect.is_some() {
        return Err(UsageError::InputRedirectAfterPipe);
    }
    Ok(())
}

/// Run `left | right` and wait for both.
///
/// Synchronous even when the line was marked `&`. A stage that cannot start
/// its program is reported on `stderr` and counted as failed while the other
/// stage still runs; failing to create the pipe or a process aborts.
pub fn run(
    left: &ParsedCommand,
    right: &ParsedCommand,
    stderr: &mut dyn Write,
) -> Result<PipelineOutcome, ShellError> {
    validate(left, right)?;

    let (reader, writer) = os_pipe::pipe().map_err(|e| ShellError::resource("pipe", e))?;
    debug!("pipe created");

    let left_stdin = redirect::stdio_for(
        left.program(),
        left.input_redirect.as_deref(),
        redirect::open_input,
    );
    let left_stage = launch(left, left_stdin, Ok(Stdio::from(writer)), stderr)?;
    debug!("parent closed pipe write end");

    let right_stdout = redirect::stdio_for(
        right.program(),
        right.output_redirect.as_deref(),
        redirect::open_output,
    );
    let right_stage = match launch(right, Ok(Stdio::from(reader)), right_stdout, stderr) {
        Ok(stage) => stage,
        Err(err) => {
            // Don't leave the left child as a zombie.
            let outcome = left_stage.wait();
            debug!(?outcome, "reaped left stage after right spawn failure");
            return Err(err);
        }
    };
    debug!("parent closed pipe read end");

    let left = left_stage.wait();
    let right = right_stage.wait();
    Ok(PipelineOutcome { left, right })
}

/// Spawn one stage with the given streams.
///
/// Both streams are consumed: on every path out of this function the
/// parent's copies are dropped, which closes any pipe end among them.
fn launch(
    cmd: &ParsedCommand,
    stdin: Result<Stdio, ShellError>,
    stdout: Result<Stdio, ShellError>,
    stderr: &mut dyn Write,
) -> Result<Stage, ShellError> {
    let (stdin, stdout) = match (stdin, stdout) {
        (Ok(stdin), Ok(stdout)) => (stdin, stdout),
        (Err(err), _) | (_, Err(err)) => {
            report(stderr, &err);
            return Ok(Stage::Failed(1));
        }
    };

    let mut command = Command::new(cmd.program());
    command.args(cmd.operands()).stdin(stdin).stdout(stdout);
    job_control::restore_default_signals(&mut command);

    match command.spawn() {
        Ok(child) => {
            debug!(pid = child.id(), program = cmd.program(), "pipeline stage spawned");
            Ok(Stage::Running(child))
        }
        Err(source) => match exec_failure_code(&source) {
            Some(code) => {
                report(
                    stderr,
                    &ShellError::Exec {
                        program: cmd.program().to_string(),
                        source,
                    },
                );
                Ok(Stage::Failed(code))
            }
            None => Err(ShellError::resource("fork", source)),
        },
    }
}

/// Exit code for errors that mean "this program cannot run", as opposed to
/// the OS being unable to create a process at all.
pub(crate) fn exec_failure_code(err: &io::Error) -> Option<i32> {
    match err.kind() {
        io::ErrorKind::NotFound => Some(127),
        io::ErrorKind::PermissionDenied => Some(126),
        _ => match err.raw_os_error() {
            Some(libc::ENOEXEC | libc::ENOTDIR | libc::EISDIR) => Some(126),
            _ => None,
        },
    }
}

fn report(stderr: &mut dyn Write, err: &ShellError) {
    let _ = writeln!(stderr, "jobsh: {err}");
}
