//! EVM event topic computation.
//!
//! The topic hash of a non-anonymous EVM event is the keccak256 hash of its
//! canonical signature string, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! For raw logs, topics[0] IS the topic hash; we only compute it once per
//! listener to build the subscription filter.

use chainlisten_core::decoder::TopicHash;
use tiny_keccak::{Hasher, Keccak};

/// Compute the keccak256 topic hash of an event signature string.
/// Input: `"EventName(type1,type2,...)"` — the canonical ABI signature.
pub fn keccak256_signature(signature: &str) -> TopicHash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    TopicHash::new(format!("0x{}", hex::encode(output)))
}
