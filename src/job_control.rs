use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::debug;

use crate::status::ChildEvent;

/// Result of a non-blocking status probe.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The child reported nothing new.
    Unchanged,
    Changed(ChildEvent),
}

/// Blocking wait outcome for a foreground process.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Exited(i32),
    Stopped,
}

/// Signals the shell ignores at the prompt and its children must get back.
const JOB_CONTROL_SIGNALS: &[libc::c_int] = &[libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU];

/// Signals reset to their default disposition in every child before exec.
const CHILD_DEFAULT_SIGNALS: &[libc::c_int] = &[
    libc::SIGQUIT,
    libc::SIGPIPE,
    libc::SIGTSTP,
    libc::SIGTTIN,
    libc::SIGTTOU,
    libc::SIGCHLD,
];

/// Poll a child without blocking, reporting stop, continue and exit
/// events distinctly.
pub(crate) fn probe_status(pid: libc::pid_t) -> io::Result<Probe> {
    let mut raw_status: libc::c_int = 0;
    let flags = libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, flags) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(Probe::Unchanged);
        }
        return Ok(ChildEvent::from_wait_status(raw_status)
            .map(Probe::Changed)
            .unwrap_or(Probe::Unchanged));
    }
}

/// Block until `pid` exits or stops.
pub(crate) fn wait_for_pid(pid: libc::pid_t) -> io::Result<WaitOutcome> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }

        match ChildEvent::from_wait_status(raw_status) {
            Some(ChildEvent::Stopped(signal)) => {
                debug!(pid, signal, "foreground child stopped");
                return Ok(WaitOutcome::Stopped);
            }
            Some(event) => {
                if let Some(code) = event.exit_code() {
                    return Ok(WaitOutcome::Exited(code));
                }
            }
            None => {}
        }
    }
}

/// Deliver `signal` to `pid`.
pub(crate) fn send_signal(pid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    if pid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process id",
        ));
    }

    loop {
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            debug!(pid, signal, "signal delivered");
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Make the shell immune to terminal stop signals while it sits at the prompt.
pub(crate) fn ignore_job_control_signals() -> io::Result<()> {
    for &signal in JOB_CONTROL_SIGNALS {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Arrange for the child to start with default signal dispositions.
///
/// Ignored dispositions survive `exec`, so anything the shell ignores must
/// be reset between fork and exec.
pub(crate) fn restore_default_signals(command: &mut Command) {
    // SAFETY: the closure only calls `signal(2)`, which is async-signal-safe.
    unsafe {
        command.pre_exec(|| {
            for &signal in CHILD_DEFAULT_SIGNALS {
                if libc::signal(signal, libc::SIG_DFL) == libc::SIG_ERR {
                    return Err(io::Error::last_os_error());
                }
            }
            Ok(())
        });
    }
}
