use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::scenario::Transaction;

/// Uniform selection with replacement over a stage's transactions.
#[derive(Debug)]
pub(super) struct Picker {
    rng: StdRng,
}

impl Picker {
    pub(super) fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub(super) fn pick<'stage>(
        &mut self,
        transactions: &'stage [Arc<Transaction>],
    ) -> Option<&'stage Arc<Transaction>> {
        transactions.choose(&mut self.rng)
    }
}
