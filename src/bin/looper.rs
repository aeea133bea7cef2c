//! A process that idles forever and narrates the job-control signals it
//! receives. Useful as a target for the shell's suspend/continue/interrupt
//! built-ins.
//!
//! Handlers only stamp the signal with its arrival tick; the main loop
//! replays each batch in arrival order through a small state machine that
//! prints, then hands `SIGINT`/`SIGTSTP` to their default action and
//! re-arms on `SIGCONT`.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Latest arrival tick per signal, indexed by `Caught::index`; 0 = none.
static ARRIVALS: [AtomicU64; 3] = [const { AtomicU64::new(0) }; 3];
static CLOCK: AtomicU64 = AtomicU64::new(0);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caught {
    Interrupt,
    TerminalStop,
    Continue,
}

impl Caught {
    const ALL: [Caught; 3] = [Caught::Continue, Caught::TerminalStop, Caught::Interrupt];

    fn signal(self) -> libc::c_int {
        match self {
            Caught::Interrupt => libc::SIGINT,
            Caught::TerminalStop => libc::SIGTSTP,
            Caught::Continue => libc::SIGCONT,
        }
    }

    fn from_signal(signal: libc::c_int) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.signal() == signal)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    /// Handlers installed for every signal.
    Armed,
    /// `signal` was handed to its default action and its handler is gone.
    Delivering(Caught),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    /// Announce, restore the default action and re-raise.
    Deliver(Caught),
    /// Announce and reinstall the stop and continue handlers.
    Rearm,
    /// Announce only.
    Announce,
    Nothing,
}

fn transition(state: Latch, caught: Caught) -> (Latch, Effect) {
    match (state, caught) {
        (_, Caught::Continue) => (Latch::Armed, Effect::Rearm),
        (_, Caught::Interrupt) => (Latch::Delivering(Caught::Interrupt), Effect::Deliver(Caught::Interrupt)),
        (Latch::Armed, Caught::TerminalStop) => (
            Latch::Delivering(Caught::TerminalStop),
            Effect::Deliver(Caught::TerminalStop),
        ),
        // The stop handler is not installed until re-armed.
        (Latch::Delivering(_), Caught::TerminalStop) => (state, Effect::Nothing),
    }
}

/// Effects for one batch of signals, oldest first.
///
/// A stop followed by a continue in the same batch is announced but not
/// delivered, so the process does not end up stopped after being resumed.
fn plan(mut state: Latch, batch: &[Caught]) -> (Latch, Vec<(Caught, Effect)>) {
    let mut steps = Vec::with_capacity(batch.len());
    for (i, &caught) in batch.iter().enumerate() {
        let superseded =
            caught == Caught::TerminalStop && batch[i + 1..].contains(&Caught::Continue);
        let effect = if superseded {
            Effect::Announce
        } else {
            let (next, effect) = transition(state, caught);
            state = next;
            effect
        };
        steps.push((caught, effect));
    }
    (state, steps)
}

/// Take every latched signal, ordered by arrival.
fn drain() -> Vec<Caught> {
    let mut arrived: Vec<(u64, Caught)> = Caught::ALL
        .into_iter()
        .filter_map(|caught| {
            let tick = ARRIVALS[caught.index()].swap(0, Ordering::SeqCst);
            (tick != 0).then_some((tick, caught))
        })
        .collect();
    arrived.sort_unstable_by_key(|(tick, _)| *tick);
    arrived.into_iter().map(|(_, caught)| caught).collect()
}

fn announcement(caught: Caught) -> &'static str {
    match caught {
        Caught::Interrupt => "Looper handling SIGINT",
        Caught::TerminalStop => "Looper handling SIGSTOP",
        Caught::Continue => "Looper handling SIGCONT",
    }
}

extern "C" fn latch(signal: libc::c_int) {
    if let Some(caught) = Caught::from_signal(signal) {
        let tick = CLOCK.fetch_add(1, Ordering::SeqCst) + 1;
        ARRIVALS[caught.index()].store(tick, Ordering::SeqCst);
    }
}

fn install(caught: Caught) -> io::Result<()> {
    let handler = latch as extern "C" fn(libc::c_int) as libc::sighandler_t;
    let previous = unsafe { libc::signal(caught.signal(), handler) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn apply(effect: Effect, caught: Caught) -> io::Result<()> {
    if effect == Effect::Nothing {
        return Ok(());
    }
    let mut stdout = io::stdout();
    writeln!(stdout, "\n{}", announcement(caught))?;
    stdout.flush()?;

    match effect {
        Effect::Deliver(target) => {
            unsafe {
                if libc::signal(target.signal(), libc::SIG_DFL) == libc::SIG_ERR {
                    return Err(io::Error::last_os_error());
                }
                libc::raise(target.signal());
            }
            Ok(())
        }
        Effect::Rearm => {
            install(Caught::Continue)?;
            install(Caught::TerminalStop)
        }
        Effect::Announce | Effect::Nothing => Ok(()),
    }
}

fn main() -> io::Result<()> {
    println!("Starting Looper (PID: {})...", std::process::id());
    io::stdout().flush()?;

    for caught in Caught::ALL {
        install(caught)?;
    }

    let mut state = Latch::Armed;
    loop {
        thread::sleep(POLL_INTERVAL);
        let (next, steps) = plan(state, &drain());
        state = next;
        for (caught, effect) in steps {
            apply(effect, caught)?;
        }
    }
}
