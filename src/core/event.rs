use crate::core::particle::ParticleId;
use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;

/// The collaborator an event is predicted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPartner {
    /// A pair event with another particle.
    Particle(ParticleId),
    /// A local (wall/obstacle) event, by index in the locals list.
    Local(usize),
    /// A global (cell crossing) event, by index in the globals list.
    Global(usize),
    /// A system event, by index in the systems list.
    System(usize),
    /// No collaborator (synthetic sorter entries).
    NoPartner,
}

impl EventPartner {
    #[inline]
    fn order_key(&self) -> (u8, usize) {
        match *self {
            EventPartner::Particle(id) => (0, id),
            EventPartner::Local(id) => (1, id),
            EventPartner::Global(id) => (2, id),
            EventPartner::System(id) => (3, id),
            EventPartner::NoPartner => (4, 0),
        }
    }
}

/// What happens at an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Hard-core collision (pair or local reflection).
    Core,
    /// Elastic reflection off a potential shell with insufficient energy to
    /// cross it.
    BounceBack,
    /// Capture at the outer shell of a square well.
    WellIn,
    /// Release through the outer shell of a square well.
    WellOut,
    /// Inward crossing of a step of a stepped potential.
    StepIn,
    /// Outward crossing of a step of a stepped potential.
    StepOut,
    /// Neighbour-cell face crossing (virtual: no physical change).
    CellCrossing,
    /// Cell crossing through a shearing image boundary; the particle's
    /// velocity image changes and predictions are rebuilt.
    VirtualCell,
    /// Scheduled system event (ticker, thermostat).
    SysTicker,
    /// Synthetic sorter entry forcing a full re-prediction.
    NonEvent,
}

impl EventKind {
    /// Number of variants (for per-kind tallies).
    pub const COUNT: usize = 10;

    /// Stable index, also the tie-break order at equal times: physical pair
    /// events sort ahead of virtual ones.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            EventKind::Core => 0,
            EventKind::BounceBack => 1,
            EventKind::WellIn => 2,
            EventKind::WellOut => 3,
            EventKind::StepIn => 4,
            EventKind::StepOut => 5,
            EventKind::CellCrossing => 6,
            EventKind::VirtualCell => 7,
            EventKind::SysTicker => 8,
            EventKind::NonEvent => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::Core => "Core",
            EventKind::BounceBack => "BounceBack",
            EventKind::WellIn => "WellIn",
            EventKind::WellOut => "WellOut",
            EventKind::StepIn => "StepIn",
            EventKind::StepOut => "StepOut",
            EventKind::CellCrossing => "CellCrossing",
            EventKind::VirtualCell => "VirtualCell",
            EventKind::SysTicker => "SysTicker",
            EventKind::NonEvent => "NonEvent",
        }
    }
}

/// A scheduled event with deterministic total ordering.
///
/// `time` is absolute. `particle` is the owning sorter slot. `counter` is
/// the partner's `event_counter` snapshot at prediction time; a mismatch at
/// pop time means the prediction is stale and is discarded silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: NotNan<f64>,
    pub particle: ParticleId,
    pub partner: EventPartner,
    pub kind: EventKind,
    pub counter: u64,
}

impl Event {
    /// Create an event, rejecting NaN times. Infinite times are allowed and
    /// sort last (a "never" entry).
    pub fn new(
        time: f64,
        particle: ParticleId,
        partner: EventPartner,
        kind: EventKind,
        counter: u64,
    ) -> Result<Self> {
        let time = NotNan::new(time).map_err(|_| {
            Error::Physical(format!(
                "NaN event time for particle {particle} ({})",
                kind.label()
            ))
        })?;
        Ok(Self {
            time,
            particle,
            partner,
            kind,
            counter,
        })
    }

    /// Synthetic entry (no partner) used by the sorter for re-prediction
    /// markers and empty slots.
    pub fn non_event(particle: ParticleId, time: f64) -> Self {
        let time = match NotNan::new(time) {
            Ok(t) => t,
            Err(_) => match NotNan::new(f64::INFINITY) {
                Ok(t) => t,
                Err(_) => unreachable!("infinity is not NaN"),
            },
        };
        Self {
            time,
            particle,
            partner: EventPartner::NoPartner,
            kind: EventKind::NonEvent,
            counter: 0,
        }
    }

    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }

    /// Validity check against the partner's current counter. Only particle
    /// partners carry a counter; other partners never go stale on their own
    /// (their predictions live in the owning particle's slot, which is
    /// cleared whenever the owner mutates).
    #[inline]
    pub fn is_valid(&self, partner_counter_now: u64) -> bool {
        self.counter == partner_counter_now
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.kind.index().cmp(&other.kind.index()))
            .then_with(|| self.particle.cmp(&other.particle))
            .then_with(|| self.partner.order_key().cmp(&other.partner.order_key()))
            .then_with(|| self.counter.cmp(&other.counter))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
