//! A generated event: the ordered particle listing of one collision.

use serde::{Deserialize, Serialize};

use crate::particle::Particle;

/// Species identifier of the event-as-a-whole record at index 0.
pub const SYSTEM_PDG_ID: i32 = 90;

/// One simulated collision.
///
/// The listing is produced once per generation cycle and is read-only for
/// every downstream consumer. By convention index 0 holds the system record
/// (see [`SYSTEM_PDG_ID`]) so that a real child range never starts at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequential event number, starting at 0.
    pub number: u64,
    /// Event weight as reported by the generator.
    pub weight: f64,
    /// Hard-process factorization scale in GeV.
    pub scale: f64,
    /// Particle records in generation order.
    particles: Vec<Particle>,
}

impl Event {
    /// Create an event from its particle listing.
    pub const fn new(number: u64, particles: Vec<Particle>) -> Self {
        Self {
            number,
            weight: 1.0,
            scale: 0.0,
            particles,
        }
    }

    /// Set the event weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the hard-process scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Number of records, including the system record.
    pub const fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the listing is empty.
    pub const fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// The record at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    /// All records in generation order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Iterate over `(index, record)` pairs in generation order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.particles.iter().enumerate()
    }
}

/// Human-readable listing, one record per line.
impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(
            f,
            "event {} ({} records, weight {:.4e})",
            self.number,
            self.particles.len(),
            self.weight
        )?;
        writeln!(
            f,
            "{:>5} {:>9} {:>5} {:>6} {:>6} {:>10} {:>10} {:>10} {:>10}",
            "no", "id", "st", "child1", "child2", "px", "py", "pz", "e"
        )?;
        for (index, p) in self.iter() {
            writeln!(
                f,
                "{:>5} {:>9} {:>5} {:>6} {:>6} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
                index,
                p.pdg_id,
                p.status,
                p.child_first,
                p.child_last,
                p.momentum.px,
                p.momentum.py,
                p.momentum.pz,
                p.momentum.e
            )?;
        }
        Ok(())
    }
}
