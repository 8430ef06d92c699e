//! Content hashing for Strata.
//!
//! All hashing wraps BLAKE3. Hashers are domain separated so that a block
//! payload and a pin-set record with identical bytes never share a key.

pub mod hasher;

pub use hasher::ContentHasher;
