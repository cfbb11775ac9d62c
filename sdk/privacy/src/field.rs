//! Field Arithmetic and Hashing
//!
//! All circuit-facing values live in the BN254 scalar field.
//!
//! ```text
//! Poseidon(x_1, .., x_n)   = sponge.absorb(x_1..x_n).squeeze(1)
//! hash_and_truncate(bytes) = keccak256(bytes)[1..32] as big-endian field element
//! ```
//!
//! Field elements are serialized as 32 little-endian bytes.

use std::sync::LazyLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::{BigInt, BigInteger, PrimeField};
use sha3::{Digest, Keccak256};

/// Decimal representation of the BN254 scalar field modulus
pub const FIELD_SIZE: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

static POSEIDON_CONFIG: LazyLock<PoseidonConfig<Fr>> = LazyLock::new(poseidon_config);

/// Poseidon hash over an arbitrary number of field elements
pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(&POSEIDON_CONFIG);
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements(1)[0]
}

/// Serialize a field element to 32 little-endian bytes
pub fn fr_to_bytes(f: &Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Serialize a field element to 32 big-endian bytes (on-chain public input order)
pub fn fr_to_be_bytes(f: &Fr) -> [u8; 32] {
    let mut arr = fr_to_bytes(f);
    arr.reverse();
    arr
}

/// Parse 32 little-endian bytes, rejecting values >= the field modulus
pub fn fr_from_bytes(bytes: &[u8; 32]) -> Option<Fr> {
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
        *limb = u64::from_le_bytes(chunk.try_into().ok()?);
    }
    Fr::from_bigint(BigInt::new(limbs))
}

/// Parse 32 little-endian bytes, reducing modulo the field size
pub fn fr_from_bytes_mod_order(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Truncated keccak256 digest used as the circuit form of ledger addresses
pub fn hash_and_truncate(data: &[u8]) -> Fr {
    let digest = Keccak256::digest(data);
    Fr::from_be_bytes_mod_order(&digest[1..32])
}

/// Try to interpret a field element as a u64
pub fn fr_to_u64(f: &Fr) -> Option<u64> {
    let bytes = fr_to_bytes(f);
    if bytes[8..].iter().any(|b| *b != 0) {
        return None;
    }
    bytes[..8].try_into().ok().map(u64::from_le_bytes)
}

/// Poseidon configuration
///
/// Field: BN254 Fr (254 bits)
/// Rate: 2, Capacity: 1
/// Rounds: 8 full, 57 partial, alpha 5
fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits: u64 = 254;
    let rate: usize = 2;
    let capacity: usize = 1;
    let full_rounds: u64 = 8;
    let partial_rounds: u64 = 57;
    let alpha: u64 = 5;

    let (ark, mds) =
        find_poseidon_ark_and_mds::<Fr>(prime_bits, rate, full_rounds, partial_rounds, 0);

    PoseidonConfig::new(
        full_rounds as usize,
        partial_rounds as usize,
        alpha,
        mds,
        ark,
        rate,
        capacity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_poseidon_deterministic() {
        let a = poseidon_hash(&[Fr::from(1u64), Fr::from(2u64)]);
        let b = poseidon_hash(&[Fr::from(1u64), Fr::from(2u64)]);
        assert_eq!(a, b);
        assert_ne!(a, poseidon_hash(&[Fr::from(2u64), Fr::from(1u64)]));
    }

    #[test]
    fn test_field_size_matches_modulus() {
        let modulus = Fr::MODULUS.to_bytes_le();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&modulus);
        assert!(fr_from_bytes(&bytes).is_none());

        let minus_one = Fr::from(0u64) - Fr::from(1u64);
        let expected_minus_one = Fr::from_str(FIELD_SIZE).unwrap_or_default() - Fr::from(1u64);
        assert_eq!(minus_one, expected_minus_one);
    }

    #[test]
    fn test_bytes_roundtrip_and_overflow() {
        let f = Fr::from(123_456_789u64);
        assert_eq!(fr_from_bytes(&fr_to_bytes(&f)), Some(f));
        assert!(fr_from_bytes(&[0xff; 32]).is_none());
        assert_eq!(fr_to_u64(&f), Some(123_456_789));
        assert_eq!(fr_to_u64(&(Fr::from(0u64) - Fr::from(1u64))), None);
    }

    #[test]
    fn test_hash_and_truncate_fits_31_bytes() {
        let h = hash_and_truncate(&[7u8; 32]);
        let bytes = fr_to_be_bytes(&h);
        assert_eq!(bytes[0], 0);
        assert_ne!(h, hash_and_truncate(&[8u8; 32]));
    }
}
