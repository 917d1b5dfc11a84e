//! Host-replaceable randomness.

/// Source of uniform randomness for sequences and `RANDOM`.
///
/// The engine keeps the state itself so it can be saved and restored; an
/// algorithm only advances it.
pub trait RngAlgorithm {
    fn next_u64(&self, state: &mut u64) -> u64;
}

pub struct Lcg64;

impl RngAlgorithm for Lcg64 {
    fn next_u64(&self, state: &mut u64) -> u64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        // Low bits have short periods.
        *state >> 16
    }
}

pub struct Capabilities {
    pub rng: Box<dyn RngAlgorithm>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            rng: Box::new(Lcg64),
        }
    }
}

/// Deterministic draws from a generator seeded with story state.
pub(crate) struct SeededDraws<'a> {
    rng: &'a dyn RngAlgorithm,
    state: u64,
}

impl<'a> SeededDraws<'a> {
    pub(crate) fn new(rng: &'a dyn RngAlgorithm, seed: i64) -> Self {
        Self {
            rng,
            state: seed as u64,
        }
    }

    /// Next non-negative 31-bit draw.
    pub(crate) fn next(&mut self) -> i64 {
        (self.rng.next_u64(&mut self.state) & 0x7fff_ffff) as i64
    }
}
