use std::io::Write;

use tracing::info;

use crate::config::Config;
use crate::error::{ShellError, UsageError};
use crate::job_control;
use crate::jobs::{JobState, Pid, ProcessRegistry};

/// The three job-control actions the shell exposes as built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Suspend,
    Continue,
    Interrupt,
}

impl SignalAction {
    pub fn signal(self) -> libc::c_int {
        match self {
            SignalAction::Suspend => libc::SIGSTOP,
            SignalAction::Continue => libc::SIGCONT,
            SignalAction::Interrupt => libc::SIGINT,
        }
    }

    /// State the target is assumed to be in once the signal lands.
    ///
    /// Interrupt assumes the default disposition; a target that catches it
    /// and survives goes back to running on the next refresh.
    pub fn implied_state(self) -> JobState {
        match self {
            SignalAction::Suspend => JobState::Suspended,
            SignalAction::Continue => JobState::Running,
            SignalAction::Interrupt => JobState::Terminated,
        }
    }
}

/// Maps the configured built-in names onto signal actions.
#[derive(Debug, Clone)]
pub struct SignalDispatcher {
    names: [(String, SignalAction); 3],
}

impl SignalDispatcher {
    pub fn new(config: &Config) -> Self {
        SignalDispatcher {
            names: [
                (config.suspend_name.clone(), SignalAction::Suspend),
                (config.continue_name.clone(), SignalAction::Continue),
                (config.interrupt_name.clone(), SignalAction::Interrupt),
            ],
        }
    }

    /// The action bound to `name`, if it is one of the signal built-ins.
    pub fn action_for(&self, name: &str) -> Option<SignalAction> {
        self.names
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, action)| *action)
    }

    /// Send the signal bound to `name` to the pid in `args[0]`, then record
    /// the implied state in `registry`.
    ///
    /// The registry is only touched after the signal was delivered.
    pub fn dispatch(
        &self,
        name: &str,
        args: &[String],
        registry: &mut ProcessRegistry,
        stdout: &mut dyn Write,
    ) -> Result<(), ShellError> {
        let Some(action) = self.action_for(name) else {
            return Err(UsageError::UnexpectedToken(name.to_string()).into());
        };
        let pid = parse_pid(name, args.first())?;

        job_control::send_signal(pid, action.signal())
            .map_err(|source| ShellError::SignalDelivery { pid, source })?;

        info!(pid, ?action, "signal sent");
        let _ = writeln!(stdout, "{name}: Signal sent to PID {pid}");
        registry.set_status(pid, action.implied_state());
        Ok(())
    }
}

fn parse_pid(command: &str, arg: Option<&String>) -> Result<Pid, UsageError> {
    let Some(arg) = arg else {
        return Err(UsageError::MissingArgument {
            command: command.to_string(),
        });
    };
    match arg.parse::<Pid>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(UsageError::InvalidPid {
            command: command.to_string(),
            arg: arg.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;
    use crate::parser::ParsedCommand;

    fn dispatcher() -> SignalDispatcher {
        SignalDispatcher::new(&Config::default())
    }

    fn tracked_sleeper(registry: &mut ProcessRegistry) -> Pid {
        let pid = Command::new("sleep").arg("30").spawn().unwrap().id() as Pid;
        registry.register(
            ParsedCommand {
                args: vec!["sleep".into(), "30".into()],
                input_redirect: None,
                output_redirect: None,
                blocking: false,
                next: None,
            },
            pid,
        );
        pid
    }

    #[test]
    fn default_names_map_to_actions() {
        let d = dispatcher();
        assert_eq!(d.action_for("zzzz"), Some(SignalAction::Suspend));
        assert_eq!(d.action_for("kuku"), Some(SignalAction::Continue));
        assert_eq!(d.action_for("blast"), Some(SignalAction::Interrupt));
        assert_eq!(d.action_for("kill"), None);
    }

    #[test]
    fn missing_pid_is_usage_error_and_leaves_registry_alone() {
        let mut registry = ProcessRegistry::new();
        let pid = tracked_sleeper(&mut registry);
        let mut out = Vec::new();

        let err = dispatcher()
            .dispatch("zzzz", &[], &mut registry, &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            ShellError::Usage(UsageError::MissingArgument { .. })
        ));
        assert_eq!(registry.state_of(pid), Some(JobState::Running));
        assert!(out.is_empty());

        job_control::send_signal(pid, libc::SIGKILL).unwrap();
        job_control::wait_for_pid(pid).unwrap();
    }

    #[test]
    fn garbage_pid_is_usage_error() {
        let mut registry = ProcessRegistry::new();
        let mut out = Vec::new();
        for arg in ["abc", "0", "-5"] {
            let err = dispatcher()
                .dispatch("kuku", &[arg.to_string()], &mut registry, &mut out)
                .unwrap_err();
            assert!(matches!(err, ShellError::Usage(UsageError::InvalidPid { .. })));
        }
    }

    #[test]
    fn suspend_then_continue_updates_state_without_refresh() {
        let mut registry = ProcessRegistry::new();
        let pid = tracked_sleeper(&mut registry);
        let d = dispatcher();
        let mut out = Vec::new();

        d.dispatch("zzzz", &[pid.to_string()], &mut registry, &mut out)
            .unwrap();
        assert_eq!(registry.state_of(pid), Some(JobState::Suspended));

        d.dispatch("kuku", &[pid.to_string()], &mut registry, &mut out)
            .unwrap();
        assert_eq!(registry.state_of(pid), Some(JobState::Running));

        d.dispatch("blast", &[pid.to_string()], &mut registry, &mut out)
            .unwrap();
        assert_eq!(registry.state_of(pid), Some(JobState::Terminated));

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(&format!("zzzz: Signal sent to PID {pid}")));
        job_control::wait_for_pid(pid).unwrap();
    }

    #[test]
    fn interrupt_survivor_is_running_again_after_refresh() {
        use std::os::unix::process::CommandExt;

        let mut sleeper = Command::new("sleep");
        sleeper.arg("30");
        // SAFETY: only signal(2) runs between fork and exec.
        unsafe {
            sleeper.pre_exec(|| {
                libc::signal(libc::SIGINT, libc::SIG_IGN);
                Ok(())
            });
        }
        let pid = sleeper.spawn().unwrap().id() as Pid;

        let mut registry = ProcessRegistry::new();
        registry.register(
            ParsedCommand {
                args: vec!["sleep".into(), "30".into()],
                input_redirect: None,
                output_redirect: None,
                blocking: false,
                next: None,
            },
            pid,
        );

        let mut out = Vec::new();
        dispatcher()
            .dispatch("blast", &[pid.to_string()], &mut registry, &mut out)
            .unwrap();
        assert_eq!(registry.state_of(pid), Some(JobState::Terminated));

        std::thread::sleep(std::time::Duration::from_millis(200));
        let listed: Vec<_> = registry.list().collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, JobState::Running);
        assert_eq!(registry.state_of(pid), Some(JobState::Running));

        job_control::send_signal(pid, libc::SIGKILL).unwrap();
        job_control::wait_for_pid(pid).unwrap();
    }

    #[test]
    fn failed_delivery_leaves_registry_alone() {
        let mut registry = ProcessRegistry::new();
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id() as Pid;
        child.wait().unwrap();
        registry.register(
            ParsedCommand {
                args: vec!["true".into()],
                input_redirect: None,
                output_redirect: None,
                blocking: true,
                next: None,
            },
            pid,
        );

        let mut out = Vec::new();
        let err = dispatcher()
            .dispatch("zzzz", &[pid.to_string()], &mut registry, &mut out)
            .unwrap_err();
        assert!(matches!(err, ShellError::SignalDelivery { .. }));
        assert_eq!(registry.state_of(pid), Some(JobState::Running));
    }
}
