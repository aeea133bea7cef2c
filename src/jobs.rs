use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::job_control::{self, Probe};
use crate::parser::ParsedCommand;
use crate::status::ChildEvent;

pub type Pid = libc::pid_t;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Suspended,
    Terminated,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Running => "Running",
            JobState::Suspended => "Suspended",
            JobState::Terminated => "Terminated",
        })
    }
}

/// A single spawned process the shell keeps an eye on.
#[derive(Debug)]
pub struct Job {
    pub pid: Pid,
    pub command: ParsedCommand,
    pub state: JobState,
    /// Registration order; newer jobs list first.
    seq: u64,
}

/// What a listing reports about one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub pid: Pid,
    pub label: String,
    pub state: JobState,
}

/// The shell's process table, keyed by pid.
#[derive(Default)]
pub struct ProcessRegistry {
    jobs: HashMap<Pid, Job>,
    next_seq: u64,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn state_of(&self, pid: Pid) -> Option<JobState> {
        self.jobs.get(&pid).map(|job| job.state)
    }

    /// Start tracking `pid` as a running job that owns `command`.
    pub fn register(&mut self, command: ParsedCommand, pid: Pid) {
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(pid, program = command.program(), "registered job");
        self.jobs.insert(
            pid,
            Job {
                pid,
                command,
                state: JobState::Running,
                seq,
            },
        );
    }

    /// Non-blocking probe of every job, folding whatever the OS reports
    /// into its state.
    pub fn refresh_all(&mut self) {
        for job in self.jobs.values_mut() {
            let next = match job_control::probe_status(job.pid) {
                Ok(Probe::Changed(ChildEvent::Exited(_) | ChildEvent::Signaled(_))) => {
                    JobState::Terminated
                }
                Ok(Probe::Changed(ChildEvent::Stopped(_))) => JobState::Suspended,
                Ok(Probe::Changed(ChildEvent::Continued)) => JobState::Running,
                // Still alive: an interrupt it survived is undone.
                Ok(Probe::Unchanged) if job.state == JobState::Terminated => JobState::Running,
                Ok(Probe::Unchanged) => job.state,
                Err(err) => {
                    trace!(pid = job.pid, %err, "probe failed; treating job as gone");
                    JobState::Terminated
                }
            };
            if next != job.state {
                debug!(pid = job.pid, from = %job.state, to = %next, "job state changed");
                job.state = next;
            }
        }
    }

    /// Override a job's state; unknown pids are ignored.
    pub fn set_status(&mut self, pid: Pid, state: JobState) {
        if let Some(job) = self.jobs.get_mut(&pid) {
            debug!(pid, from = %job.state, to = %state, "job state set");
            job.state = state;
        }
    }

    /// Refresh, then walk every job newest first.
    ///
    /// Terminated jobs are reported once and dropped from the table as the
    /// walk passes them.
    pub fn list(&mut self) -> Listing<'_> {
        self.refresh_all();
        let mut order: Vec<(u64, Pid)> = self.jobs.values().map(|j| (j.seq, j.pid)).collect();
        order.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        Listing {
            registry: self,
            order: order.into_iter().map(|(_, pid)| pid).collect::<Vec<_>>().into_iter(),
        }
    }

    /// Release every job and the command it owns.
    pub fn reclaim_all(&mut self) {
        debug!(count = self.jobs.len(), "reclaiming job table");
        self.jobs.clear();
    }
}

/// Point-in-time walk over the registry produced by [`ProcessRegistry::list`].
pub struct Listing<'a> {
    registry: &'a mut ProcessRegistry,
    order: std::vec::IntoIter<Pid>,
}

impl Iterator for Listing<'_> {
    type Item = JobSnapshot;

    fn next(&mut self) -> Option<JobSnapshot> {
        for pid in self.order.by_ref() {
            let Some(job) = self.registry.jobs.get(&pid) else {
                continue;
            };
            let snapshot = JobSnapshot {
                pid,
                label: job.command.program().to_string(),
                state: job.state,
            };
            if job.state == JobState::Terminated {
                self.registry.jobs.remove(&pid);
                debug!(pid, "pruned terminated job");
            }
            return Some(snapshot);
        }
        None
    }
}
