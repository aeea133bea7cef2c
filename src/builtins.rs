use std::io::Write;

use crate::expander;
use crate::history::HistoryRing;
use crate::jobs::ProcessRegistry;

/// The list of all builtin command names, excluding the configurable
/// signal commands.
const BUILTINS: &[&str] = &["cd", "procs", "history", "quit", "exit"];

#[derive(Debug, PartialEq, Eq)]
pub enum BuiltinAction {
    Continue(i32),
    Exit(i32),
}

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Execute a builtin command, writing output to the provided streams.
pub fn execute(
    program: &str,
    args: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    registry: &mut ProcessRegistry,
    history: &HistoryRing,
) -> BuiltinAction {
    match program {
        "cd" => BuiltinAction::Continue(builtin_cd(args, stderr)),
        "procs" => BuiltinAction::Continue(builtin_procs(registry, stdout)),
        "history" => BuiltinAction::Continue(builtin_history(history, stdout)),
        "quit" => BuiltinAction::Exit(0),
        "exit" => builtin_exit(args, stderr),
        _ => {
            let _ = writeln!(stderr, "jobsh: unknown builtin: {program}");
            BuiltinAction::Continue(1)
        }
    }
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) -> i32 {
    let target = match args.first().map(String::as_str) {
        None | Some("~") => expander::home_dir(),
        Some(dir) => dir.to_string(),
    };

    if let Err(e) = std::env::set_current_dir(&target) {
        let _ = writeln!(stderr, "cd: {target}: {e}");
        return 1;
    }
    0
}

/// Print every tracked process, dropping the ones that have terminated.
fn builtin_procs(registry: &mut ProcessRegistry, stdout: &mut dyn Write) -> i32 {
    let _ = writeln!(stdout, "PID\t\tCommand\t\tSTATUS");
    for job in registry.list() {
        let _ = writeln!(stdout, "{}\t\t{}\t\t{}", job.pid, job.label, job.state);
    }
    0
}

/// Print history oldest first, numbered by ring slot so `!n` matches.
fn builtin_history(history: &HistoryRing, stdout: &mut dyn Write) -> i32 {
    for (slot, command) in history.iter() {
        let _ = writeln!(stdout, "{slot}: {command}");
    }
    0
}

fn builtin_exit(args: &[String], stderr: &mut dyn Write) -> BuiltinAction {
    match args.first() {
        None => BuiltinAction::Exit(0),
        Some(s) => match s.parse::<i32>() {
            Ok(code) => BuiltinAction::Exit(code),
            Err(_) => {
                let _ = writeln!(stderr, "exit: {s}: numeric argument required");
                BuiltinAction::Exit(2)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedCommand;

    fn run(program: &str, args: &[&str], registry: &mut ProcessRegistry, history: &HistoryRing) -> (BuiltinAction, String) {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let action = execute(program, &args, &mut out, &mut err, registry, history);
        (action, String::from_utf8(out).unwrap())
    }

    #[test]
    fn procs_prints_header_and_prunes_terminated() {
        let mut registry = ProcessRegistry::new();
        // pid 1 is never our child, so the probe marks it terminated.
        registry.register(
            ParsedCommand {
                args: vec!["ghost".into()],
                input_redirect: None,
                output_redirect: None,
                blocking: false,
                next: None,
            },
            1,
        );

        let (action, out) = run("procs", &[], &mut registry, &HistoryRing::new());
        assert_eq!(action, BuiltinAction::Continue(0));
        assert_eq!(out, "PID\t\tCommand\t\tSTATUS\n1\t\tghost\t\tTerminated\n");

        let (_, out) = run("procs", &[], &mut registry, &HistoryRing::new());
        assert_eq!(out, "PID\t\tCommand\t\tSTATUS\n");
    }

    #[test]
    fn history_lists_slots() {
        let mut history = HistoryRing::new();
        history.push("ls");
        history.push("pwd");
        let (_, out) = run("history", &[], &mut ProcessRegistry::new(), &history);
        assert_eq!(out, "0: ls\n1: pwd\n");
    }

    #[test]
    fn quit_and_exit() {
        let mut registry = ProcessRegistry::new();
        let history = HistoryRing::new();
        assert_eq!(run("quit", &[], &mut registry, &history).0, BuiltinAction::Exit(0));
        assert_eq!(run("exit", &["3"], &mut registry, &history).0, BuiltinAction::Exit(3));
        assert_eq!(run("exit", &["x"], &mut registry, &history).0, BuiltinAction::Exit(2));
    }

    #[test]
    fn builtin_names() {
        assert!(is_builtin("procs"));
        assert!(is_builtin("cd"));
        assert!(!is_builtin("ls"));
    }
}
