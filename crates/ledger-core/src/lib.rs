pub mod chain;
pub mod constants;
pub mod mine;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::constants::{GENESIS_HASH, KEY_AMOUNT, KEY_FROM, KEY_TO};

pub use chain::{Chain, ChainConfig, Miner};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A freshly mined block failed its own post-append check.
    #[error("invalid block at index {index}")]
    InvalidBlock { index: usize },
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Block payload. Keys are kept sorted so the encoding fed to the digest
/// never depends on insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{from, to, amount}` transfer record. Non-finite amounts encode as `null`.
    pub fn transfer(from: &str, to: &str, amount: f64) -> Self {
        let mut payload = Self::new();
        payload.insert(KEY_FROM, from);
        payload.insert(KEY_TO, to);
        payload.insert(KEY_AMOUNT, amount);
        payload
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted-key JSON encoding of the payload.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // string-keyed maps of JSON values cannot fail to serialize
        serde_json::to_vec(&self.0).unwrap_or_default()
    }
}

/// SHA-256 over `previous_hash ‖ data ‖ timestamp ‖ proof_of_work`, hex encoded.
pub fn digest(previous_hash: &str, data: &[u8], timestamp: u64, proof_of_work: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(data);
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(proof_of_work.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// A mined block. Only produced by [`BlockDraft::mine`], [`mine::mine_parallel`]
/// or [`Block::genesis`]; its hash never changes afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) data: Payload,
    pub(crate) previous_hash: String,
    pub(crate) timestamp: u64,
    pub(crate) proof_of_work: u64,
    pub(crate) hash: String,
}

impl Block {
    /// Genesis block: sentinel hash, no payload, no predecessor, zero proof-of-work.
    pub fn genesis() -> Self {
        Self {
            data: Payload::new(),
            previous_hash: String::new(),
            timestamp: now_millis(),
            proof_of_work: 0,
            hash: GENESIS_HASH.to_string(),
        }
    }

    /// Recompute the digest from the current field values.
    pub fn calculate_hash(&self) -> String {
        digest(
            &self.previous_hash,
            &self.data.canonical_bytes(),
            self.timestamp,
            self.proof_of_work,
        )
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn proof_of_work(&self) -> u64 {
        self.proof_of_work
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// An unmined candidate. Mining consumes it and yields a [`Block`].
#[derive(Clone, Debug)]
pub struct BlockDraft {
    pub data: Payload,
    pub previous_hash: String,
    pub timestamp: u64,
    pub proof_of_work: u64,
}

impl BlockDraft {
    /// Draft linked to `previous_hash`, stamped now, counter at zero.
    pub fn new(data: Payload, previous_hash: impl Into<String>) -> Self {
        Self {
            data,
            previous_hash: previous_hash.into(),
            timestamp: now_millis(),
            proof_of_work: 0,
        }
    }

    pub fn calculate_hash(&self) -> String {
        digest(
            &self.previous_hash,
            &self.data.canonical_bytes(),
            self.timestamp,
            self.proof_of_work,
        )
    }

    /// Sequential search: starting at the current counter, increment until the
    /// digest has `difficulty` leading hex zeros. Unbounded.
    pub fn mine(self, difficulty: u32) -> Block {
        let data = self.data.canonical_bytes();
        let mut proof_of_work = self.proof_of_work;
        let mut hash = digest(&self.previous_hash, &data, self.timestamp, proof_of_work);
        while !pow::meets_difficulty(&hash, difficulty) {
            proof_of_work = proof_of_work.wrapping_add(1);
            hash = digest(&self.previous_hash, &data, self.timestamp, proof_of_work);
        }
        self.finish(proof_of_work, hash)
    }

    pub(crate) fn finish(self, proof_of_work: u64, hash: String) -> Block {
        Block {
            data: self.data,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
            proof_of_work,
            hash,
        }
    }
}

pub mod pow {
    /// Number of leading `'0'` characters in a hex digest.
    pub fn leading_hex_zeros(hash: &str) -> usize {
        hash.bytes().take_while(|b| *b == b'0').count()
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        leading_hex_zeros(hash) >= difficulty as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    fn fixed_draft() -> BlockDraft {
        BlockDraft {
            data: Payload::transfer("Alice", "Bob", 10.0),
            previous_hash: "00ab".to_string(),
            timestamp: 1_600_000_000_000,
            proof_of_work: 0,
        }
    }

    #[test]
    fn leading_hex_zeros_examples() {
        assert_eq!(pow::leading_hex_zeros(""), 0);
        assert_eq!(pow::leading_hex_zeros("abc"), 0);
        assert_eq!(pow::leading_hex_zeros("0abc"), 1);
        assert_eq!(pow::leading_hex_zeros("000f0"), 3);
        assert!(pow::meets_difficulty("00f", 2));
        assert!(!pow::meets_difficulty("00f", 3));
        assert!(pow::meets_difficulty("f", 0));
    }

    #[test]
    fn digest_is_hex_sha256() {
        let h = digest("", b"", 0, 0);
        assert_eq!(h.len(), HASH_HEX_SIZE);
        // sha256("00")
        assert_eq!(
            h,
            "f1534392279bddbf9d43dde8701cb5be14b82f76ec6607bf8d6ad557f60f304e"
        );
    }

    #[test]
    fn payload_encoding_is_sorted() {
        let mut a = Payload::new();
        a.insert("to", "Bob");
        a.insert("from", "Alice");
        a.insert("amount", 10.0);
        let b = Payload::transfer("Alice", "Bob", 10.0);
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
        assert_eq!(
            String::from_utf8(b.canonical_bytes()).unwrap(),
            r#"{"amount":10.0,"from":"Alice","to":"Bob"}"#
        );
    }

    #[test]
    fn non_finite_amount_encodes_as_null() {
        let p = Payload::transfer("a", "b", f64::NAN);
        assert_eq!(p.get(KEY_AMOUNT), Some(&Value::Null));
    }

    #[test]
    fn calculate_hash_is_deterministic() {
        let block = fixed_draft().mine(0);
        assert_eq!(block.calculate_hash(), block.calculate_hash());
        assert_eq!(block.calculate_hash(), block.hash());
    }

    #[test]
    fn calculate_hash_tracks_every_field() {
        let base = fixed_draft().calculate_hash();

        let mut d = fixed_draft();
        d.data.insert(KEY_AMOUNT, 11.0);
        assert_ne!(d.calculate_hash(), base);

        let mut d = fixed_draft();
        d.previous_hash.push('1');
        assert_ne!(d.calculate_hash(), base);

        let mut d = fixed_draft();
        d.timestamp += 1;
        assert_ne!(d.calculate_hash(), base);

        let mut d = fixed_draft();
        d.proof_of_work += 1;
        assert_ne!(d.calculate_hash(), base);
    }

    #[test]
    fn mine_meets_difficulty() {
        for difficulty in 0..=3 {
            let block = fixed_draft().mine(difficulty);
            assert!(pow::meets_difficulty(block.hash(), difficulty));
            assert_eq!(block.hash(), block.calculate_hash());
        }
    }

    #[test]
    fn mine_with_zero_difficulty_keeps_counter() {
        let mut draft = fixed_draft();
        draft.proof_of_work = 7;
        let block = draft.mine(0);
        assert_eq!(block.proof_of_work(), 7);
        assert_eq!(block.hash(), block.calculate_hash());
    }

    #[test]
    fn mine_starts_from_current_counter() {
        let mut draft = fixed_draft();
        draft.proof_of_work = 1_000;
        let block = draft.mine(1);
        assert!(block.proof_of_work() >= 1_000);
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis();
        assert_eq!(genesis.hash(), GENESIS_HASH);
        assert_eq!(genesis.previous_hash(), "");
        assert_eq!(genesis.proof_of_work(), 0);
        assert!(genesis.data().is_empty());
        assert!(genesis.timestamp() > 0);
    }

    #[test]
    fn block_serialization_example() {
        let block = fixed_draft().mine(1);
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains(r#""data":{"amount":10.0,"from":"Alice","to":"Bob"}"#));
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }
}
