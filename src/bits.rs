//! Fixed-width field access into a packed felt.
//!
//! Fields are laid out at `slot * width` with no gaps. Reads past the top bit are
//! zero-extended rather than rejected.

use crate::felt::Felt;
use num_bigint::BigUint;

fn to_big(value: &Felt) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes())
}

/// Keeps the low 256 bits; the field reduces anything at or above the modulus.
fn from_big(value: &BigUint) -> Felt {
    let bytes = value.to_bytes_be();
    let mut word = [0u8; 32];
    let take = bytes.len().min(32);
    word[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    Felt::from_be_bytes(word)
}

fn mask(width: u32) -> BigUint {
    (BigUint::from(1u8) << width) - 1u8
}

/// Reads `width` bits starting at `offset`.
pub fn extract(packed: &Felt, offset: u32, width: u32) -> Felt {
    from_big(&((to_big(packed) >> offset) & mask(width)))
}

/// Same as [`extract`] for fields that fit in a machine word.
pub fn extract_u64(packed: &Felt, offset: u32, width: u32) -> u64 {
    extract(packed, offset, width.min(64)).low_u64()
}

/// Writes `value` (truncated to `width` bits) at `offset`, leaving other bits untouched.
pub fn insert(packed: &Felt, offset: u32, width: u32, value: &Felt) -> Felt {
    let packed = to_big(packed);
    let field_mask = mask(width) << offset;
    let cleared = &packed - (&packed & &field_mask);
    let field = (to_big(value) << offset) & field_mask;
    from_big(&(cleared | field))
}
