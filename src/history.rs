use crate::error::HistoryError;

/// Number of slots in the history ring.
pub const HISTLEN: usize = 20;

/// Fixed-capacity circular log of raw command lines.
///
/// Entries are addressed by their physical slot. After the ring wraps, a
/// slot number refers to whatever command now occupies it, so `!n` can name
/// a different command than the one shown earlier at `n`.
pub struct HistoryRing {
    slots: [Option<String>; HISTLEN],
    /// Slot of the oldest live entry.
    oldest: usize,
    /// Slot of the most recent entry; meaningless while `count == 0`.
    newest: usize,
    count: usize,
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryRing {
    pub fn new() -> Self {
        HistoryRing {
            slots: Default::default(),
            oldest: 0,
            newest: HISTLEN - 1,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record a command, overwriting the oldest entry once the ring is full.
    pub fn push(&mut self, command: &str) {
        if self.count < HISTLEN {
            self.newest = (self.newest + 1) % HISTLEN;
            self.slots[self.newest] = Some(command.to_string());
            self.count += 1;
        } else {
            self.slots[self.oldest] = Some(command.to_string());
            self.newest = self.oldest;
            self.oldest = (self.oldest + 1) % HISTLEN;
        }
    }

    pub fn newest(&self) -> Option<&str> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.newest].as_deref()
    }

    /// Command stored in physical slot `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.slots.get(index)?.as_deref()
    }

    /// `(slot, command)` pairs from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        (0..self.count).filter_map(move |i| {
            let slot = (self.oldest + i) % HISTLEN;
            self.slots[slot].as_deref().map(|cmd| (slot, cmd))
        })
    }

    /// Resolve `!!` and `!n` recall syntax.
    ///
    /// Returns `Ok(None)` when `line` is not a recall, otherwise the recalled
    /// command line.
    pub fn recall(&self, line: &str) -> Result<Option<String>, HistoryError> {
        if line == "!!" {
            return self
                .newest()
                .map(|cmd| Some(cmd.to_string()))
                .ok_or(HistoryError::Empty);
        }

        let Some(index) = line.strip_prefix('!').filter(|rest| !rest.is_empty()) else {
            return Ok(None);
        };
        if self.is_empty() {
            return Err(HistoryError::Empty);
        }
        // Digits only: no sign, no surrounding blanks.
        let slot = index
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| index.parse::<usize>().ok())
            .flatten()
            .ok_or_else(|| HistoryError::InvalidIndex(line.to_string()))?;
        self.get(slot)
            .map(|cmd| Some(cmd.to_string()))
            .ok_or(HistoryError::NoSuchEntry(slot))
    }

    /// Drop every stored command.
    pub fn clear(&mut self) {
        self.slots = Default::default();
        self.oldest = 0;
        self.newest = HISTLEN - 1;
        self.count = 0;
    }
}
