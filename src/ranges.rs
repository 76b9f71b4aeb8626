//! ID ranges select which particles (or particle pairs) a component
//! governs. Closed sets, so tagged variants rather than trait objects.

use crate::core::particle::ParticleId;

/// A set of particle IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdRange {
    /// Every particle.
    All,
    /// The inclusive ID interval `[start, end]`.
    Ranged { start: ParticleId, end: ParticleId },
    /// An explicit ID list.
    List(Vec<ParticleId>),
}

impl IdRange {
    pub fn contains(&self, id: ParticleId) -> bool {
        match self {
            IdRange::All => true,
            IdRange::Ranged { start, end } => (*start..=*end).contains(&id),
            IdRange::List(ids) => ids.contains(&id),
        }
    }

    /// Number of members given the total particle count.
    pub fn len(&self, n_particles: usize) -> usize {
        match self {
            IdRange::All => n_particles,
            IdRange::Ranged { start, end } => {
                let end = (*end).min(n_particles.saturating_sub(1));
                end.saturating_sub(*start) + usize::from(end >= *start)
            }
            IdRange::List(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self, n_particles: usize) -> bool {
        self.len(n_particles) == 0
    }

    /// Iterate the member IDs given the total particle count.
    pub fn iter(&self, n_particles: usize) -> Box<dyn Iterator<Item = ParticleId> + '_> {
        match self {
            IdRange::All => Box::new(0..n_particles),
            IdRange::Ranged { start, end } => {
                let end = (*end + 1).min(n_particles);
                Box::new(*start..end)
            }
            IdRange::List(ids) => Box::new(ids.iter().copied()),
        }
    }
}

/// A set of unordered particle pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdPairRange {
    /// Every pair.
    All,
    /// Both members inside one ID range.
    Single(IdRange),
    /// One member in each of two ID ranges.
    Pair(IdRange, IdRange),
    /// Adjacent IDs along the inclusive interval `[start, end]` (bonded
    /// chains).
    Chain { start: ParticleId, end: ParticleId },
    /// No pair (masks particles from later interactions).
    None,
}

impl IdPairRange {
    pub fn contains(&self, i: ParticleId, j: ParticleId) -> bool {
        if i == j {
            return false;
        }
        match self {
            IdPairRange::All => true,
            IdPairRange::Single(r) => r.contains(i) && r.contains(j),
            IdPairRange::Pair(a, b) => {
                (a.contains(i) && b.contains(j)) || (a.contains(j) && b.contains(i))
            }
            IdPairRange::Chain { start, end } => {
                let (lo, hi) = if i < j { (i, j) } else { (j, i) };
                hi == lo + 1 && lo >= *start && hi <= *end
            }
            IdPairRange::None => false,
        }
    }
}
