//! A fixed `ls -lsa | tail -n 3` that narrates every step of the pipe
//! plumbing on stderr: both forks, which end the parent closes and when,
//! and what each child redirects before it execs.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitCode, Stdio};

const LEFT: &[&str] = &["ls", "-lsa"];
const RIGHT: &[&str] = &["tail", "-n", "3"];

const PARENT: &str = "parent_process";

const LEFT_CHILD_STEPS: [&str; 2] = [
    "(child1>redirecting stdout to the write end of the pipe...)\n",
    "(child1>going to execute cmd: ls -lsa)\n",
];
const RIGHT_CHILD_STEPS: [&str; 2] = [
    "(child2>redirecting stdin to the read end of the pipe...)\n",
    "(child2>going to execute cmd: tail -n 3)\n",
];

fn narrate(who: &str, what: &str) {
    eprintln!("({who}>{what})");
}

/// Have the child print `steps` on stderr between fork and exec.
fn narrate_in_child(command: &mut Command, steps: [&'static str; 2]) {
    // SAFETY: the closure only calls write(2), which is async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            for step in steps {
                libc::write(libc::STDERR_FILENO, step.as_ptr().cast(), step.len());
            }
            Ok(())
        });
    }
}

/// Spawn one stage. The `Command`, and with it the parent's copy of any
/// pipe end passed in, is dropped before this returns.
fn spawn(
    argv: &[&str],
    stdin: Stdio,
    stdout: Stdio,
    steps: [&'static str; 2],
) -> io::Result<Child> {
    narrate(PARENT, "forking...");
    let mut command = Command::new(argv[0]);
    command.args(&argv[1..]).stdin(stdin).stdout(stdout);
    narrate_in_child(&mut command, steps);

    let child = command.spawn()?;
    narrate(PARENT, &format!("created process with id: {}", child.id()));
    Ok(child)
}

fn run() -> io::Result<()> {
    let (reader, writer) = os_pipe::pipe()?;

    let mut left = spawn(LEFT, Stdio::inherit(), Stdio::from(writer), LEFT_CHILD_STEPS)?;
    narrate(PARENT, "closing the write end of the pipe...");

    let mut right = match spawn(RIGHT, Stdio::from(reader), Stdio::inherit(), RIGHT_CHILD_STEPS) {
        Ok(child) => child,
        Err(err) => {
            let _ = left.wait();
            return Err(err);
        }
    };
    narrate(PARENT, "closing the read end of the pipe...");

    narrate(PARENT, "waiting for child processes to terminate...");
    left.wait()?;
    right.wait()?;

    narrate(PARENT, "exiting...");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mypipeline: {err}");
            ExitCode::FAILURE
        }
    }
}
