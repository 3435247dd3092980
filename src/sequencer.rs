use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks the index of the next photo to show.
///
/// Sequential mode walks the collection in order and wraps; random mode
/// draws uniformly and may repeat the previous pick.
#[derive(Debug)]
pub struct Sequencer {
    last_index: Option<usize>,
    sequential: bool,
    rng: StdRng,
}

impl Sequencer {
    pub fn new(sequential: bool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            last_index: None,
            sequential,
            rng,
        }
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    pub fn is_sequential(&self) -> bool {
        self.sequential
    }

    /// Switching keeps `last_index`, so sequential mode resumes after the
    /// last random pick.
    pub fn set_sequential(&mut self, sequential: bool) {
        self.sequential = sequential;
    }

    /// Returns `None` only for an empty collection.
    pub fn next<T>(&mut self, collection: &[T]) -> Option<usize> {
        let len = collection.len();
        let index = match len {
            0 => return None,
            1 => 0,
            _ if self.sequential => self.last_index.map_or(0, |last| (last + 1) % len),
            _ => self.rng.random_range(0..len),
        };
        self.last_index = Some(index);
        Some(index)
    }
}
