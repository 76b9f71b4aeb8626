use crate::core::Event;
use crate::error::{Error, Result};
use crate::sorter::pel::Pel;
use tracing::debug;

const MIN_BUCKETS: usize = 16;

/// Where a slot's entry currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loc {
    Bucket { idx: usize, pos: usize },
    Overflow { pos: usize },
}

#[derive(Debug, Clone)]
struct Slot {
    pel: Pel,
    loc: Loc,
}

/// Bounded bucket priority queue over per-slot min lists.
///
/// Each slot (one per particle, plus one per system event) appears exactly
/// once: in the bucket its earliest event falls into, or in the exhaustive
/// overflow list when that time lies beyond the window (or is infinite).
/// The cursor walks buckets in order; when the whole window is spent, the
/// bucket width is retuned from the mean pending spacing and the overflow
/// re-binned (the only moment every bucket is provably empty). Events are
/// never lost.
#[derive(Debug, Clone)]
pub struct FelBoundedPq {
    slots: Vec<Slot>,
    buckets: Vec<Vec<usize>>,
    overflow: Vec<usize>,
    t_origin: f64,
    width: f64,
    current: usize,
}

impl FelBoundedPq {
    pub fn new(n_slots: usize) -> Self {
        let n_buckets = (2 * n_slots).max(MIN_BUCKETS);
        Self {
            slots: (0..n_slots)
                .map(|pos| Slot {
                    pel: Pel::new(),
                    loc: Loc::Overflow { pos },
                })
                .collect(),
            buckets: vec![Vec::new(); n_buckets],
            overflow: (0..n_slots).collect(),
            t_origin: 0.0,
            width: 1.0,
            current: 0,
        }
    }

    /// Drop every pending event and start over with `n_slots` empty slots.
    pub fn reset(&mut self, n_slots: usize) {
        *self = Self::new(n_slots);
    }

    pub fn n_slots(&self) -> usize {
        self.slots.len()
    }

    /// The entry a slot presents to the queue: its earliest event, a
    /// re-prediction marker after an overflowed list drained, or "never".
    fn effective_event(&self, slot_id: usize) -> Event {
        let slot = &self.slots[slot_id];
        if let Some(ev) = slot.pel.min() {
            *ev
        } else if slot.pel.needs_recalc() {
            Event::non_event(slot_id, slot.pel.recalc_time())
        } else {
            Event::non_event(slot_id, f64::INFINITY)
        }
    }

    fn min_time(&self, slot_id: usize) -> f64 {
        self.effective_event(slot_id).time_f64()
    }

    /// Bucket index for an event time; `None` routes to overflow.
    fn bucket_of(&self, t: f64) -> Result<Option<usize>> {
        if t.is_infinite() {
            return Ok(None);
        }
        let x = (t - self.t_origin) / self.width;
        if !x.is_finite() {
            return Err(Error::SorterOverflow(format!(
                "bucket index for t={t:.17e} (origin {:.17e}, width {:.17e}) is not finite",
                self.t_origin, self.width
            )));
        }
        if x < 0.0 {
            // Tolerance stragglers land in the frontmost bucket.
            return Ok(Some(0));
        }
        let idx = x.floor() as usize;
        Ok(if idx < self.buckets.len() {
            Some(idx)
        } else {
            None
        })
    }

    fn insert_entry(&mut self, slot_id: usize) -> Result<()> {
        match self.bucket_of(self.min_time(slot_id))? {
            Some(idx) => {
                if idx < self.current {
                    self.current = idx;
                }
                let pos = self.buckets[idx].len();
                self.buckets[idx].push(slot_id);
                self.slots[slot_id].loc = Loc::Bucket { idx, pos };
            }
            None => {
                let pos = self.overflow.len();
                self.overflow.push(slot_id);
                self.slots[slot_id].loc = Loc::Overflow { pos };
            }
        }
        Ok(())
    }

    fn remove_entry(&mut self, slot_id: usize) {
        match self.slots[slot_id].loc {
            Loc::Bucket { idx, pos } => {
                self.buckets[idx].swap_remove(pos);
                if let Some(&moved) = self.buckets[idx].get(pos) {
                    self.slots[moved].loc = Loc::Bucket { idx, pos };
                }
            }
            Loc::Overflow { pos } => {
                self.overflow.swap_remove(pos);
                if let Some(&moved) = self.overflow.get(pos) {
                    self.slots[moved].loc = Loc::Overflow { pos };
                }
            }
        }
    }

    fn relocate(&mut self, slot_id: usize) -> Result<()> {
        self.remove_entry(slot_id);
        self.insert_entry(slot_id)
    }

    /// Add a candidate event to its owner's list. O(K) in the list plus
    /// O(1) bucket work.
    pub fn push(&mut self, slot_id: usize, ev: Event) -> Result<()> {
        self.slots[slot_id].pel.push(ev);
        self.relocate(slot_id)
    }

    /// Empty a slot (invalidation on trajectory change).
    pub fn clear_slot(&mut self, slot_id: usize) -> Result<()> {
        self.slots[slot_id].pel.clear();
        self.relocate(slot_id)
    }

    /// Drop a slot's current minimum and surface its next candidate.
    pub fn pop_discard(&mut self, slot_id: usize) -> Result<()> {
        self.slots[slot_id].pel.pop_min();
        self.relocate(slot_id)
    }

    /// The globally earliest entry. Advances the window as needed; returns
    /// an infinite `NonEvent` only when no finite event is pending
    /// anywhere.
    pub fn top(&mut self) -> Result<(usize, Event)> {
        loop {
            while self.current < self.buckets.len() {
                if !self.buckets[self.current].is_empty() {
                    let mut best: Option<Event> = None;
                    for &sid in &self.buckets[self.current] {
                        let ev = self.effective_event(sid);
                        if best.map_or(true, |b| ev < b) {
                            best = Some(ev);
                        }
                    }
                    match best {
                        Some(ev) => return Ok((ev.particle, ev)),
                        None => unreachable!("non-empty bucket yielded no event"),
                    }
                }
                self.current += 1;
            }
            if !self.rewindow()? {
                // Nothing finite remains anywhere.
                return Ok(match self.overflow.first() {
                    Some(&sid) => (sid, self.effective_event(sid)),
                    None => (0, Event::non_event(0, f64::INFINITY)),
                });
            }
        }
    }

    /// Retune the bucket width from the pending event spacing and re-bin
    /// the overflow into a fresh window. Returns false when no finite
    /// event is pending.
    fn rewindow(&mut self) -> Result<bool> {
        let mut t_min = f64::INFINITY;
        let mut sum_offset = 0.0;
        let mut n_finite = 0usize;
        for &sid in &self.overflow {
            let t = self.min_time(sid);
            if t.is_finite() {
                t_min = t_min.min(t);
                n_finite += 1;
            }
        }
        if n_finite == 0 {
            return Ok(false);
        }
        for &sid in &self.overflow {
            let t = self.min_time(sid);
            if t.is_finite() {
                sum_offset += t - t_min;
            }
        }
        let mean_offset = sum_offset / n_finite as f64;
        let window = (2.0 * mean_offset).max(1e-9 * (1.0 + t_min.abs()));
        self.t_origin = t_min;
        self.width = window / self.buckets.len() as f64;
        self.current = 0;
        debug!(
            origin = self.t_origin,
            width = self.width,
            pending = n_finite,
            "sorter window retuned"
        );
        let entries = std::mem::take(&mut self.overflow);
        for sid in entries {
            self.insert_entry(sid)?;
        }
        Ok(true)
    }
}
