//! # Key Hashing
//!
//! Dictionary hash functions. Every function maps key bytes to a `u64`; the
//! dictionary reduces it modulo its bucket count.
//!
//! | Function            | Speed   | Notes                                   |
//! |---------------------|---------|-----------------------------------------|
//! | [`polynomial_hash`] | fastest | default; trivially collidable           |
//! | [`fnv1a_hash`]      | fast    | better spread on short keys             |
//! | [`sip_hash`]        | slower  | SipHash-2-4, fixed keys, resists floods |
//!
//! The polynomial hash is the classic base-31 string hash, so `"Aa"` and
//! `"BB"` hash alike. Keys are always compared byte for byte, so collisions
//! only cost a longer bucket chain.

use std::hash::Hasher;

use siphasher::sip::SipHasher24;

/// Signature of a dictionary hash function.
pub type HashFn = fn(&[u8]) -> u64;

/// Base of [`polynomial_hash`].
pub const POLYNOMIAL_BASE: u64 = 31;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

// Fixed keys: the dictionary needs identical hashes across runs.
const SIP_KEY_0: u64 = 0x6f72_6f62_6f72_6f73;
const SIP_KEY_1: u64 = 0x6d65_6d6f_7279_2d31;

/// Rolling polynomial hash: `h = h * 31 + byte` over every byte.
#[inline]
#[must_use]
pub fn polynomial_hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |hash, byte| {
        hash.wrapping_mul(POLYNOMIAL_BASE)
            .wrapping_add(u64::from(*byte))
    })
}

/// FNV-1a, 64-bit.
#[inline]
#[must_use]
pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// SipHash-2-4 with the crate's fixed keys.
#[inline]
#[must_use]
pub fn sip_hash(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(SIP_KEY_0, SIP_KEY_1);
    hasher.write(bytes);
    hasher.finish()
}
