//! Short label derivation for the mapping store.
//!
//! The 64-bit FNV-1a hash of the origin URL is written in base 36, least
//! significant digit first, and cut to a fixed length. Distinct origins can
//! collide; nothing here detects it.

use std::hash::Hasher;

use fnv::FnvHasher;

const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of every derived label.
pub const SHORT_LABEL_LEN: usize = 8;

pub fn fnv1a64(input: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(input.as_bytes());
    hasher.finish()
}

pub fn shorten(url: &str) -> String {
    let base = ALPHABET.len() as u64;
    let mut hash = fnv1a64(url);
    let mut label = String::with_capacity(SHORT_LABEL_LEN);
    for _ in 0..SHORT_LABEL_LEN {
        label.push(ALPHABET[(hash % base) as usize] as char);
        hash /= base;
    }
    label
}
