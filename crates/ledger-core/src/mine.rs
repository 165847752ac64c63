use crate::{digest, pow::meets_difficulty, Block, BlockDraft};
use rayon::prelude::*;
use tracing::debug;

/// Mines a draft by searching proof-of-work counters in parallel until a hash has
/// at least `difficulty` leading hex zeros.
/// The winning counter is any satisfying value at or above the draft's counter,
/// not necessarily the smallest one.
pub fn mine_parallel(draft: BlockDraft, difficulty: u32) -> Block {
    let data = draft.data.canonical_bytes();
    let previous_hash = draft.previous_hash.as_str();
    let timestamp = draft.timestamp;

    // Rayon splits the range across its thread pool.
    let found = (draft.proof_of_work..u64::MAX)
        .into_par_iter()
        .find_any(|proof_of_work| {
            let hash = digest(previous_hash, &data, timestamp, *proof_of_work);
            meets_difficulty(&hash, difficulty)
        });

    match found {
        Some(proof_of_work) => {
            let hash = digest(previous_hash, &data, timestamp, proof_of_work);
            debug!(proof_of_work, %hash, "parallel search finished");
            draft.finish(proof_of_work, hash)
        }
        // counter space exhausted; let the sequential search wrap around
        None => draft.mine(difficulty),
    }
}
