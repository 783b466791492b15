//! Blinding factors
//!
//! A blinding factor is a scalar derived from caller data, like a pin or a password. Layering it
//! on a token makes the token useless for a proof unless the same data is supplied again, while
//! the blinded token still verifies under the issuer's public key.

use core::fmt;
use core::sync::atomic::{compiler_fence, Ordering};

use bls12_381::Scalar;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use super::tokens::Token;
use super::util::{hash_to_scalar, scalar_from_bytes, scalar_to_bytes, BLINDING_TAG, SCALAR_BYTES};
use crate::error::Result;

/// A secret scalar applied to a token
#[derive(Clone)]
pub struct BlindingFactor {
    factor: Scalar,
}

impl BlindingFactor {
    /// The number of bytes in an encoded blinding factor
    pub const BYTES: usize = SCALAR_BYTES;

    /// Derive the blinding factor for `data`
    pub fn new(data: impl AsRef<[u8]>) -> Self {
        Self {
            factor: hash_to_scalar(BLINDING_TAG, &[data.as_ref()]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        scalar_to_bytes(&self.factor)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            factor: scalar_from_bytes(data, "blinding factor")?,
        })
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.factor
    }
}

impl Zeroize for BlindingFactor {
    fn zeroize(&mut self) {
        self.factor = Scalar::zero();
        compiler_fence(Ordering::SeqCst);
    }
}

impl Drop for BlindingFactor {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ConstantTimeEq for BlindingFactor {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.factor.ct_eq(&other.factor)
    }
}

impl PartialEq for BlindingFactor {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.ct_eq(other))
    }
}

impl Eq for BlindingFactor {}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

impl_bytes_serde!(BlindingFactor);

/// Layer the blinding factor derived from `data` on the token
pub fn add_blinding(token: &Token, data: impl AsRef<[u8]>) -> Token {
    token.add_blinding(&BlindingFactor::new(data))
}

/// Remove the blinding factor derived from `data` from the token
///
/// Wrong `data` gives a well formed token, and nothing notices right away. While other layers
/// remain the token still verifies, the offset absorbs the difference. Verification fails once
/// the last layer is off, and every proof made from the token fails.
pub fn remove_blinding(token: &Token, data: impl AsRef<[u8]>) -> Token {
    token.remove_blinding(&BlindingFactor::new(data))
}
