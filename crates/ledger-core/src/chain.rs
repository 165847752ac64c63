use crate::constants::DEFAULT_DIFFICULTY;
use crate::{mine, pow, Block, BlockDraft, ChainError, Payload, Result};
use tracing::{debug, info, warn};

/// How candidate blocks are mined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Miner {
    /// Single-threaded counter search.
    #[default]
    Sequential,
    /// Counter space split across the rayon thread pool.
    Parallel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    /// Leading hex zeros required of every appended block hash.
    pub difficulty: u32,
    pub miner: Miner,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            miner: Miner::default(),
        }
    }
}

/// In-memory, append-only chain. Index 0 always holds the genesis block.
///
/// `append` takes `&mut self`, so reading the tail, mining and pushing happen
/// under one exclusive borrow. Share a `Chain` across threads behind a single
/// `Mutex` covering the whole call.
#[derive(Clone, Debug)]
pub struct Chain {
    config: ChainConfig,
    pub(crate) blocks: Vec<Block>,
}

impl Chain {
    pub fn new(difficulty: u32) -> Self {
        Self::with_config(ChainConfig {
            difficulty,
            ..ChainConfig::default()
        })
    }

    pub fn with_config(config: ChainConfig) -> Self {
        let genesis = Block::genesis();
        info!(difficulty = config.difficulty, miner = ?config.miner, "chain created");
        Self {
            config,
            blocks: vec![genesis],
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is present from construction.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a `{from, to, amount}` transfer. No checks on the values.
    pub fn append(&mut self, from: &str, to: &str, amount: f64) -> Result<&Block> {
        self.append_payload(Payload::transfer(from, to, amount))
    }

    /// Mine a block carrying `data` on top of the current tip and append it.
    ///
    /// The new block is re-validated right after the push. A failure there means
    /// mining itself is broken: the block is removed again and
    /// [`ChainError::InvalidBlock`] is returned.
    pub fn append_payload(&mut self, data: Payload) -> Result<&Block> {
        let index = self.blocks.len();
        let previous_hash = self.tip().hash().to_string();
        debug!(index, %previous_hash, "mining candidate block");

        let draft = BlockDraft::new(data, previous_hash);
        let block = match self.config.miner {
            Miner::Sequential => draft.mine(self.config.difficulty),
            Miner::Parallel => mine::mine_parallel(draft, self.config.difficulty),
        };
        info!(
            index,
            proof_of_work = block.proof_of_work(),
            hash = %block.hash(),
            "mined block"
        );

        self.blocks.push(block);
        let valid = self.validate_block(index);
        debug_assert!(valid, "freshly mined block {index} failed validation");
        if !valid {
            self.blocks.pop();
            return Err(ChainError::InvalidBlock { index });
        }
        Ok(&self.blocks[index])
    }

    /// Check block `index` against its predecessor.
    ///
    /// Returns false for the genesis index and for indices past the tip.
    /// Otherwise the stored hash must match a fresh digest, equal the
    /// predecessor's hash link, and meet the chain difficulty.
    pub fn validate_block(&self, index: usize) -> bool {
        if index == 0 || index >= self.blocks.len() {
            return false;
        }
        let block = &self.blocks[index];
        let previous = &self.blocks[index - 1];

        if block.hash != block.calculate_hash() {
            warn!(index, "stored hash does not match block contents");
            return false;
        }
        if block.previous_hash != previous.hash {
            warn!(index, "previous hash does not link to predecessor");
            return false;
        }
        if !pow::meets_difficulty(&block.hash, self.config.difficulty) {
            warn!(index, difficulty = self.config.difficulty, "hash misses difficulty target");
            return false;
        }
        true
    }

    /// True iff every non-genesis block validates. Vacuously true for genesis only.
    pub fn validate_chain(&self) -> bool {
        (1..self.blocks.len()).all(|i| self.validate_block(i))
    }

    pub fn is_valid(&self) -> bool {
        self.validate_chain()
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
