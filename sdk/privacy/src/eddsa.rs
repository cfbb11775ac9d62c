//! Poseidon EdDSA over Baby Jubjub
//!
//! ```text
//! A = s·G
//! r = H(secret, msg)            (deterministic nonce)
//! R = r·G
//! h = Poseidon(R.x, R.y, A.x, A.y, msg)
//! S = r + h·s
//! verify: S·G == R + h·A
//! ```
//!
//! The curve's base field is the BN254 scalar field, so the challenge is
//! computed with the same Poseidon instance the circuit uses.

use ark_bn254::Fr;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fr as JubjubScalar};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};

use crate::field::{fr_to_bytes, poseidon_hash};

/// Secret signing key
#[derive(Clone)]
pub struct EddsaSecretKey([u8; 32]);

/// Public verification key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EddsaPublicKey(pub EdwardsAffine);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EddsaSignature {
    pub r: EdwardsAffine,
    pub s: JubjubScalar,
}

impl EddsaSecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn scalar(&self) -> JubjubScalar {
        let wide = blake3::derive_key("obscura eddsa scalar", &self.0);
        JubjubScalar::from_le_bytes_mod_order(&wide)
    }

    pub fn public_key(&self) -> EddsaPublicKey {
        EddsaPublicKey((EdwardsAffine::generator() * self.scalar()).into_affine())
    }

    pub fn sign(&self, msg: &Fr) -> EddsaSignature {
        let secret = self.scalar();
        let public = self.public_key();

        let mut nonce_bytes = [0u8; 64];
        let mut hasher = blake3::Hasher::new_keyed(&self.0);
        hasher.update(&fr_to_bytes(msg));
        hasher.finalize_xof().fill(&mut nonce_bytes);
        let nonce = JubjubScalar::from_le_bytes_mod_order(&nonce_bytes);

        let r = (EdwardsAffine::generator() * nonce).into_affine();
        let h = challenge(&r, &public.0, msg);

        EddsaSignature {
            r,
            s: nonce + h * secret,
        }
    }
}

impl std::fmt::Debug for EddsaSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EddsaSecretKey(..)")
    }
}

impl EddsaPublicKey {
    pub fn verify(&self, msg: &Fr, signature: &EddsaSignature) -> bool {
        let h = challenge(&signature.r, &self.0, msg);
        let lhs = EdwardsAffine::generator() * signature.s;
        let rhs = signature.r.into_group() + self.0 * h;
        lhs == rhs
    }

    /// Affine coordinates as circuit inputs
    pub fn coordinates(&self) -> [Fr; 2] {
        [self.0.x, self.0.y]
    }
}

impl EddsaSignature {
    /// Compressed R (32 bytes) followed by S (32 bytes)
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut bytes = Vec::with_capacity(64);
        self.r.serialize_compressed(&mut bytes)?;
        self.s.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut reader = bytes;
        let r = EdwardsAffine::deserialize_compressed(&mut reader)?;
        let s = JubjubScalar::deserialize_compressed(&mut reader)?;
        Ok(Self { r, s })
    }
}

pub fn verify_eddsa(public_key: &EddsaPublicKey, msg: &Fr, signature: &EddsaSignature) -> bool {
    public_key.verify(msg, signature)
}

fn challenge(r: &EdwardsAffine, a: &EdwardsAffine, msg: &Fr) -> JubjubScalar {
    let h = poseidon_hash(&[r.x, r.y, a.x, a.y, *msg]);
    JubjubScalar::from_le_bytes_mod_order(&fr_to_bytes(&h))
}
