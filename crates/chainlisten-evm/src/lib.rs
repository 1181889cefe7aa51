//! # chainlisten-evm
//!
//! EVM ABI log decoder implementing the `LogDecoder` trait.
//!
//! ## Implementation notes
//! - Uses `alloy-json-abi` to read the contract ABI and `alloy-dyn-abi` to decode
//! - topics[0] → event signature hash (keccak256), checked before decoding
//! - topics[1..] → indexed parameters (each 32 bytes, ABI-encoded)
//! - `data` → non-indexed parameters (ABI-encoded tuple)

pub mod decoder;
pub mod fingerprint;
pub mod normalizer;

pub use decoder::AbiLogDecoder;
