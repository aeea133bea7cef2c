use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::builtins::{self, BuiltinAction};
use crate::config::Config;
use crate::error::ShellError;
use crate::executor::{self, ExecOutcome};
use crate::history::HistoryRing;
use crate::jobs::ProcessRegistry;
use crate::parser::{self, ParsedCommand};
use crate::pipeline;
use crate::signals::SignalDispatcher;

/// Whether the read loop should keep going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

/// All state the interactive loop carries between lines.
pub struct Shell {
    config: Config,
    registry: ProcessRegistry,
    history: HistoryRing,
    signals: SignalDispatcher,
    last_exit_code: i32,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let signals = SignalDispatcher::new(&config);
        Shell {
            config,
            registry: ProcessRegistry::new(),
            history: HistoryRing::new(),
            signals,
            last_exit_code: 0,
        }
    }

    /// Prompt, read and handle lines until `quit`/`exit` or end of input.
    /// Returns the exit code for the shell process.
    pub fn run(
        &mut self,
        input: &mut dyn BufRead,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> i32 {
        loop {
            let _ = write!(stdout, "{}", prompt());
            if stdout.flush().is_err() {
                return self.last_exit_code;
            }

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => {
                    let _ = writeln!(stdout);
                    return self.last_exit_code;
                }
                Ok(_) => {
                    if let Flow::Exit(code) = self.handle_line(&line, stdout, stderr) {
                        return code;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = writeln!(stderr, "jobsh: error reading input: {e}");
                    return 1;
                }
            }
        }
    }

    /// Resolve history recall, record the line, parse and dispatch it.
    pub fn handle_line(
        &mut self,
        raw: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Flow {
        let mut line = raw.trim().to_string();

        match self.history.recall(&line) {
            Ok(Some(recalled)) => {
                let _ = writeln!(stdout, "{recalled}");
                line = recalled;
            }
            Ok(None) => {}
            Err(err) => {
                report(stderr, &err.into());
                return Flow::Continue;
            }
        }

        if line.is_empty() {
            return Flow::Continue;
        }
        self.history.push(&line);

        let cmd = match parser::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Flow::Continue,
            Err(err) => {
                report(stderr, &err.into());
                self.last_exit_code = 2;
                return Flow::Continue;
            }
        };

        match self.dispatch(cmd, stdout, stderr) {
            Ok(flow) => flow,
            Err(err) => {
                report(stderr, &err);
                self.last_exit_code = 1;
                Flow::Continue
            }
        }
    }

    fn dispatch(
        &mut self,
        mut cmd: ParsedCommand,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Flow, ShellError> {
        if let Some(right) = cmd.next.take() {
            let outcome = pipeline::run(&cmd, &right, stderr)?;
            debug!(
                left_pid = ?outcome.left.pid,
                left = outcome.left.exit_code,
                right_pid = ?outcome.right.pid,
                right = outcome.right.exit_code,
                "pipeline finished"
            );
            self.last_exit_code = outcome.exit_code();
            return Ok(Flow::Continue);
        }

        let program = cmd.program();
        if builtins::is_builtin(program) {
            let action = builtins::execute(
                program,
                cmd.operands(),
                stdout,
                stderr,
                &mut self.registry,
                &self.history,
            );
            return Ok(match action {
                BuiltinAction::Continue(code) => {
                    self.last_exit_code = code;
                    Flow::Continue
                }
                BuiltinAction::Exit(code) => Flow::Exit(code),
            });
        }

        if self.signals.action_for(program).is_some() {
            self.signals
                .dispatch(program, cmd.operands(), &mut self.registry, stdout)?;
            self.last_exit_code = 0;
            return Ok(Flow::Continue);
        }

        let outcome = executor::execute(cmd, &mut self.registry, self.config.debug, stderr)?;
        match outcome {
            ExecOutcome::Exited(pid, code) => debug!(pid, code, "foreground job finished"),
            ExecOutcome::Stopped(pid) => info!(pid, "foreground job stopped"),
            ExecOutcome::Background(pid) => debug!(pid, "running in background"),
        }
        self.last_exit_code = executor::exit_code(outcome);
        Ok(Flow::Continue)
    }

    /// Release the process table and history.
    pub fn shutdown(&mut self) {
        info!(history = self.history.len(), "shutting down");
        if !self.registry.is_empty() {
            info!(jobs = self.registry.len(), "releasing tracked jobs");
        }
        self.registry.reclaim_all();
        self.history.clear();
    }
}

fn report(stderr: &mut dyn Write, err: &ShellError) {
    let _ = writeln!(stderr, "jobsh: {err}");
}

/// `<cwd>$ `, or a bare `$ ` when the cwd is unavailable.
fn prompt() -> String {
    match std::env::current_dir() {
        Ok(dir) => format!("{}$ ", dir.display()),
        Err(_) => "$ ".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobState;

    fn shell() -> Shell {
        Shell::new(Config::default())
    }

    fn feed(shell: &mut Shell, line: &str) -> (Flow, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let flow = shell.handle_line(line, &mut out, &mut err);
        (
            flow,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn bang_bang_reruns_and_echoes() {
        let mut sh = shell();
        feed(&mut sh, "history");
        let (_, out, _) = feed(&mut sh, "!!");
        assert!(out.starts_with("history\n"), "{out}");
        assert_eq!(sh.history.len(), 2);
        assert_eq!(sh.history.newest(), Some("history"));
    }

    #[test]
    fn recall_failure_is_reported_and_not_recorded() {
        let mut sh = shell();
        let (flow, _, err) = feed(&mut sh, "!!");
        assert_eq!(flow, Flow::Continue);
        assert!(err.contains("history is empty"));
        assert!(sh.history.is_empty());

        feed(&mut sh, "history");
        let (_, _, err) = feed(&mut sh, "!9");
        assert!(err.contains("index 9"), "{err}");
        assert_eq!(sh.history.len(), 1);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let mut sh = shell();
        let (flow, out, err) = feed(&mut sh, "   \n");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty() && err.is_empty());
        assert!(sh.history.is_empty());
    }

    #[test]
    fn signal_builtin_without_pid_reports_usage() {
        let mut sh = shell();
        let (_, _, err) = feed(&mut sh, "zzzz");
        assert!(err.contains("zzzz: missing process ID"), "{err}");
        assert!(sh.registry.is_empty());
    }

    #[test]
    fn background_job_suspend_and_continue() {
        let mut sh = shell();
        feed(&mut sh, "sleep 30 &");
        let pid = {
            let mut listed: Vec<_> = sh.registry.list().collect();
            assert_eq!(listed.len(), 1);
            listed.remove(0).pid
        };

        feed(&mut sh, &format!("zzzz {pid}"));
        assert_eq!(sh.registry.state_of(pid), Some(JobState::Suspended));
        feed(&mut sh, &format!("kuku {pid}"));
        assert_eq!(sh.registry.state_of(pid), Some(JobState::Running));

        let (_, out, _) = feed(&mut sh, &format!("blast {pid}"));
        assert!(out.contains(&format!("blast: Signal sent to PID {pid}")));
        crate::job_control::wait_for_pid(pid).unwrap();
    }

    #[test]
    fn misplaced_pipe_redirect_registers_nothing() {
        let mut sh = shell();
        let (_, _, err) = feed(&mut sh, "echo hi > /tmp/jobsh_never_written | cat");
        assert!(err.contains("left side of pipe"), "{err}");
        assert!(sh.registry.is_empty());
    }

    #[test]
    fn quit_exits_and_shutdown_clears_state() {
        let mut sh = shell();
        feed(&mut sh, "sleep 30 &");
        let pid = sh.registry.list().next().unwrap().pid;
        let (flow, _, _) = feed(&mut sh, "quit");
        assert_eq!(flow, Flow::Exit(0));

        sh.shutdown();
        assert!(sh.registry.is_empty());
        assert!(sh.history.is_empty());

        crate::job_control::send_signal(pid, libc::SIGKILL).unwrap();
        crate::job_control::wait_for_pid(pid).unwrap();
    }

    #[test]
    fn run_loop_stops_at_end_of_input() {
        let mut sh = shell();
        let mut input = io::Cursor::new("history\n");
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = sh.run(&mut input, &mut out, &mut err);
        assert_eq!(code, 0);
        assert!(String::from_utf8(out).unwrap().contains("0: history"));
    }
}
