use crate::core::Event;

/// Capacity of a per-particle event list.
pub const PEL_SIZE: usize = 3;

/// Per-particle min list: keeps the `PEL_SIZE` earliest candidate events,
/// sorted ascending.
///
/// Pushing beyond capacity discards the latest entry but remembers the
/// earliest discarded time (`overflow_floor`). Once the list drains while
/// flagged, the owner needs a full re-prediction no later than that floor:
/// nothing earlier than it was ever lost.
#[derive(Debug, Clone)]
pub struct Pel {
    events: [Option<Event>; PEL_SIZE],
    len: usize,
    overflow: bool,
    overflow_floor: f64,
}

impl Default for Pel {
    fn default() -> Self {
        Self::new()
    }
}

impl Pel {
    pub fn new() -> Self {
        Self {
            events: [None; PEL_SIZE],
            len: 0,
            overflow: false,
            overflow_floor: f64::INFINITY,
        }
    }

    pub fn clear(&mut self) {
        self.events = [None; PEL_SIZE];
        self.len = 0;
        self.overflow = false;
        self.overflow_floor = f64::INFINITY;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The earliest held event.
    #[inline]
    pub fn min(&self) -> Option<&Event> {
        self.events[0].as_ref()
    }

    pub fn push(&mut self, ev: Event) {
        if self.len == PEL_SIZE {
            match self.events[PEL_SIZE - 1] {
                Some(last) if ev < last => {
                    self.overflow = true;
                    self.overflow_floor = self.overflow_floor.min(last.time_f64());
                    self.events[PEL_SIZE - 1] = None;
                    self.len -= 1;
                    self.insert_sorted(ev);
                }
                _ => {
                    self.overflow = true;
                    self.overflow_floor = self.overflow_floor.min(ev.time_f64());
                }
            }
        } else {
            self.insert_sorted(ev);
        }
    }

    fn insert_sorted(&mut self, ev: Event) {
        let mut i = self.len;
        while i > 0 {
            match self.events[i - 1] {
                Some(prev) if prev > ev => {
                    self.events[i] = self.events[i - 1];
                    i -= 1;
                }
                _ => break,
            }
        }
        self.events[i] = Some(ev);
        self.len += 1;
    }

    pub fn pop_min(&mut self) -> Option<Event> {
        if self.len == 0 {
            return None;
        }
        let first = self.events[0].take();
        for i in 1..self.len {
            self.events[i - 1] = self.events[i].take();
        }
        self.len -= 1;
        first
    }

    /// Drained while overflowed: candidates were discarded, so the owner
    /// must re-predict.
    #[inline]
    pub fn needs_recalc(&self) -> bool {
        self.len == 0 && self.overflow
    }

    /// Earliest time an unknown discarded candidate could fire.
    #[inline]
    pub fn recalc_time(&self) -> f64 {
        self.overflow_floor
    }
}
