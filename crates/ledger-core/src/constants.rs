pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Stored hash of every genesis block. Not a digest.
pub const GENESIS_HASH: &str = "0";
pub const DEFAULT_DIFFICULTY: u32 = 2;
/// Difficulties above this can never be met by a hex digest.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;

pub const KEY_FROM: &str = "from";
pub const KEY_TO: &str = "to";
pub const KEY_AMOUNT: &str = "amount";
