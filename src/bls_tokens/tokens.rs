use core::convert::TryFrom;
use core::fmt;

use bls12_381::{Bls12, G1Affine, G1Projective, G2Affine, G2Projective};
use pairing::Engine;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use super::blinding::BlindingFactor;
use super::keys::{PublicKey, SecretKey};
use super::util::{g1_from_bytes, g1_to_bytes, g2_from_bytes, g2_to_bytes, hash_to_group};
use super::util::{G1_BYTES, G2_BYTES};
use crate::common::{ct_verified, fixed_bytes};
use crate::error::Result;

// {{{ Token

/// A token issued for an identifier
///
/// The token is `sk·H(id)` in G1, together with the accumulated blinding: every blinding layer
/// subtracts `b·g1` from the signature, adds `b·g2` to the offset and increments the depth.
/// A blinded token verifies with the offset compensating for the missing `b·g1`. At depth zero
/// the offset has to be the identity, so a token unblinded with the wrong data fails.
#[derive(Clone)]
pub struct Token {
    signature: G1Projective,
    offset: G2Projective,
    depth: i32,
}

impl Token {
    /// The number of bytes in an encoded token
    pub const BYTES: usize = G1_BYTES + G2_BYTES + 4;

    /// Issue a token for `id`
    pub fn new(sk: &SecretKey, id: impl AsRef<[u8]>) -> Self {
        Self {
            signature: hash_to_group(id) * sk.scalar(),
            offset: G2Projective::identity(),
            depth: 0,
        }
    }

    /// Check that the token was issued for `id` by the owner of `pk`, possibly with blinding
    /// layers on top
    pub fn verify(&self, pk: &PublicKey, id: impl AsRef<[u8]>) -> Result<()> {
        let u = G1Affine::from(hash_to_group(id));
        let pk = G2Affine::from(G2Projective::from(pk));

        // e(sigma, g2) + e(g1, offset) == e(H(id), pk)
        let lhs = Bls12::pairing(&G1Affine::from(self.signature), &G2Affine::generator())
            + Bls12::pairing(&G1Affine::generator(), &G2Affine::from(self.offset));
        let rhs = Bls12::pairing(&u, &pk);
        let relation = lhs.ct_eq(&rhs);

        // the depth is public, so branching on it leaks nothing
        let layers = if self.depth > 0 {
            Choice::from(1)
        } else if self.depth == 0 {
            self.offset.is_identity()
        } else {
            Choice::from(0)
        };

        ct_verified(relation & layers, "token")
    }

    /// Layer a blinding factor on the token
    pub fn add_blinding(&self, blinding: &BlindingFactor) -> Token {
        let b = blinding.scalar();
        Token {
            signature: self.signature - G1Projective::generator() * b,
            offset: self.offset + G2Projective::generator() * b,
            depth: self.depth.wrapping_add(1),
        }
    }

    /// Take a blinding factor off the token
    pub fn remove_blinding(&self, blinding: &BlindingFactor) -> Token {
        let b = blinding.scalar();
        Token {
            signature: self.signature + G1Projective::generator() * b,
            offset: self.offset - G2Projective::generator() * b,
            depth: self.depth.wrapping_sub(1),
        }
    }

    /// Number of blinding layers applied
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Encoding: compressed signature, compressed offset, big endian depth
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut out = [0u8; Self::BYTES];
        out[..G1_BYTES].copy_from_slice(&g1_to_bytes(&self.signature));
        out[G1_BYTES..G1_BYTES + G2_BYTES].copy_from_slice(&g2_to_bytes(&self.offset));
        out[G1_BYTES + G2_BYTES..].copy_from_slice(&self.depth.to_be_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let data: [u8; Self::BYTES] = fixed_bytes(data, "token")?;

        let signature = g1_from_bytes(&data[..G1_BYTES], "token")?;
        let offset = g2_from_bytes(&data[G1_BYTES..G1_BYTES + G2_BYTES], "token")?;
        let depth: [u8; 4] = fixed_bytes(&data[G1_BYTES + G2_BYTES..], "token")?;

        Ok(Self {
            signature,
            offset,
            depth: i32::from_be_bytes(depth),
        })
    }

    pub(crate) fn signature(&self) -> &G1Projective {
        &self.signature
    }
}

impl Zeroize for Token {
    fn zeroize(&mut self) {
        self.signature = G1Projective::identity();
        self.offset = G2Projective::identity();
        self.depth = 0;
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ConstantTimeEq for Token {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.signature.ct_eq(&other.signature)
            & self.offset.ct_eq(&other.offset)
            & self.depth.ct_eq(&other.depth)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.ct_eq(other))
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    // the signature is what a proof hides, so it is not printed
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Token")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl_bytes_serde!(Token);

impl<'a> TryFrom<&'a [u8]> for Token {
    type Error = crate::error::Error;

    fn try_from(data: &'a [u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

// }}}

// {{{ Tests


// }}}
