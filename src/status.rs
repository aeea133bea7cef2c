/// Convert an OS process status into shell-style exit code semantics.
///
/// Processes terminated by signal map to `128 + signal`.
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        return code;
    }
    if let Some(signal) = status.signal() {
        return 128 + signal;
    }
    1
}

/// What a `waitpid` status word says happened to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildEvent {
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
    Continued,
}

impl ChildEvent {
    /// Decode a raw status filled in by `waitpid`.
    pub fn from_wait_status(raw_status: libc::c_int) -> Option<Self> {
        if libc::WIFEXITED(raw_status) {
            return Some(ChildEvent::Exited(libc::WEXITSTATUS(raw_status)));
        }
        if libc::WIFSIGNALED(raw_status) {
            return Some(ChildEvent::Signaled(libc::WTERMSIG(raw_status)));
        }
        if libc::WIFSTOPPED(raw_status) {
            return Some(ChildEvent::Stopped(libc::WSTOPSIG(raw_status)));
        }
        if libc::WIFCONTINUED(raw_status) {
            return Some(ChildEvent::Continued);
        }
        None
    }

    /// Shell exit code for a terminal event, `None` for stop/continue.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            ChildEvent::Exited(code) => Some(code),
            ChildEvent::Signaled(signal) => Some(128 + signal),
            ChildEvent::Stopped(_) | ChildEvent::Continued => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaled_child_maps_to_128_plus_signal() {
        assert_eq!(ChildEvent::Signaled(libc::SIGINT).exit_code(), Some(130));
        assert_eq!(ChildEvent::Exited(7).exit_code(), Some(7));
        assert_eq!(ChildEvent::Stopped(libc::SIGSTOP).exit_code(), None);
    }

    #[test]
    fn exit_status_of_real_process() {
        let status = std::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .status()
            .unwrap();
        assert_eq!(exit_code(status), 3);
    }
}
