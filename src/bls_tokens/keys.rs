use core::fmt;
use core::sync::atomic::{compiler_fence, Ordering};

use bls12_381::{G2Projective, Scalar};
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use super::tokens::Token;
use super::util::{
    g2_from_bytes, g2_to_bytes, hash_to_nonzero_scalar, random_scalar, scalar_from_bytes,
    scalar_to_bytes, G2_BYTES, SCALAR_BYTES, SEED_TAG,
};
use crate::error::{Error, Result};

/// The secret key, used to issue tokens
///
/// It is never zero. The scalar is overwritten when the key is dropped, and `Debug` does not
/// print it.
#[derive(Clone)]
pub struct SecretKey {
    key: Scalar,
}

impl SecretKey {
    /// The number of bytes in an encoded secret key
    pub const BYTES: usize = SCALAR_BYTES;

    /// Generate a new random secret key
    pub fn new() -> Self {
        Self::random(&mut rand::thread_rng())
    }

    /// Generate a new random secret key from the given rng
    pub fn random<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        SecretKey {
            key: random_scalar(rng),
        }
    }

    /// Derive a secret key deterministically from a seed
    pub fn from_seed(seed: impl AsRef<[u8]>) -> Self {
        SecretKey {
            key: hash_to_nonzero_scalar(SEED_TAG, &[seed.as_ref()]),
        }
    }

    /// Issue a token for `id`
    pub fn sign(&self, id: impl AsRef<[u8]>) -> Token {
        Token::new(self, id)
    }

    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        scalar_to_bytes(&self.key)
    }

    /// Decode a secret key, a zero or non-canonical scalar is a format error
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let key = scalar_from_bytes(data, "secret key")?;
        if bool::from(key.ct_eq(&Scalar::zero())) {
            return Err(Error::Format("secret key"));
        }
        Ok(SecretKey { key })
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.key
    }
}

impl Default for SecretKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.key = Scalar::zero();
        compiler_fence(Ordering::SeqCst);
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ConstantTimeEq for SecretKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.key.ct_eq(&other.key)
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.ct_eq(other))
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl_bytes_serde!(SecretKey);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The public key, everything a verifier needs
pub struct PublicKey {
    key: G2Projective,
}

impl From<&SecretKey> for PublicKey {
    fn from(sk: &SecretKey) -> Self {
        PublicKey {
            key: G2Projective::generator() * sk.key,
        }
    }
}

impl From<SecretKey> for PublicKey {
    fn from(key: SecretKey) -> Self {
        Self::from(&key)
    }
}

impl From<&PublicKey> for G2Projective {
    fn from(pk: &PublicKey) -> Self {
        pk.key
    }
}

impl PublicKey {
    /// The number of bytes in an encoded public key
    pub const BYTES: usize = G2_BYTES;

    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        g2_to_bytes(&self.key)
    }

    /// Decode a public key, the identity point is a format error
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let key = g2_from_bytes(data, "public key")?;
        if bool::from(key.is_identity()) {
            return Err(Error::Format("public key"));
        }
        Ok(PublicKey { key })
    }

    /// Verify that `token` is valid for `id` under this key
    pub fn verify_token(&self, token: &Token, id: impl AsRef<[u8]>) -> Result<()> {
        token.verify(self, id)
    }
}

impl_bytes_serde!(PublicKey);
