use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::common::{ct_decoded, fill_bytes, fixed_bytes};
use crate::error::Result;

/// Domain of the secret key seed oracle
pub(crate) const SEED_TAG: &[u8] = b"ATBP-BLS12381-V01-SECRET-KEY-SEED";
/// Domain of the blinding factor oracle
pub(crate) const BLINDING_TAG: &[u8] = b"ATBP-BLS12381-V01-BLINDING";
/// Domain of the Fiat-Shamir challenge oracle
pub(crate) const CHALLENGE_TAG: &[u8] = b"ATBP-BLS12381-V01-PROOF-CHALLENGE";
/// Domain of the identifier hash to curve
pub(crate) const ID_DST: &[u8] = b"ATBP-BLS12381G1_XMD:SHA-256_SSWU_RO_ID_";

pub(crate) const SCALAR_BYTES: usize = 32;
pub(crate) const G1_BYTES: usize = 48;
pub(crate) const G2_BYTES: usize = 96;

/// Generates a random non-zero scalar in constant time
///
/// 64 bytes are reduced by the modulus, so the bias is negligible. Only the (practically
/// impossible) zero scalar is rejected.
pub fn random_scalar<R: CryptoRng + RngCore>(rng: &mut R) -> Scalar {
    let mut rand_bytes = [0u8; 64];
    loop {
        fill_bytes(rng, &mut rand_bytes);
        let s = Scalar::from_bytes_wide(&rand_bytes);
        if !bool::from(s.ct_eq(&Scalar::zero())) {
            rand_bytes.zeroize();
            return s;
        }
    }
}

fn absorb(hasher: &mut Sha512, data: &[u8]) {
    // length prefixes keep the concatenation of parts unambiguous
    hasher.update((data.len() as u64).to_be_bytes());
    hasher.update(data);
}

fn finish_wide(hasher: Sha512) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    let s = Scalar::from_bytes_wide(&wide);
    wide.zeroize();
    s
}

/// Hash the tagged parts into a scalar
///
/// Constant time: sha512 output is reduced by the modulus.
pub fn hash_to_scalar(tag: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    absorb(&mut hasher, tag);
    parts.iter().for_each(|part| absorb(&mut hasher, part));
    finish_wide(hasher)
}

/// Hash the tagged parts into a scalar that is never zero
///
/// A zero result is re-hashed with an incremented counter.
pub fn hash_to_nonzero_scalar(tag: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut counter = 0u32;
    loop {
        let mut hasher = Sha512::new();
        absorb(&mut hasher, tag);
        parts.iter().for_each(|part| absorb(&mut hasher, part));
        hasher.update(counter.to_be_bytes());

        let s = finish_wide(hasher);
        if !bool::from(s.ct_eq(&Scalar::zero())) {
            return s;
        }
        counter = counter.wrapping_add(1);
    }
}

/// hash an identifier to a curve point in the G1 group.
pub fn hash_to_group(id: impl AsRef<[u8]>) -> G1Projective {
    <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(id, ID_DST)
}

// {{{ encodings

pub(crate) fn scalar_to_bytes(s: &Scalar) -> [u8; SCALAR_BYTES] {
    s.to_bytes()
}

/// Canonical little endian scalar
pub(crate) fn scalar_from_bytes(data: &[u8], what: &'static str) -> Result<Scalar> {
    let mut bytes: [u8; SCALAR_BYTES] = fixed_bytes(data, what)?;
    let s = Scalar::from_bytes(&bytes);
    bytes.zeroize();
    ct_decoded(s, what)
}

pub(crate) fn g1_to_bytes(p: &G1Projective) -> [u8; G1_BYTES] {
    G1Affine::from(p).to_compressed()
}

pub(crate) fn g1_from_bytes(data: &[u8], what: &'static str) -> Result<G1Projective> {
    let bytes: [u8; G1_BYTES] = fixed_bytes(data, what)?;
    ct_decoded(G1Affine::from_compressed(&bytes), what).map(G1Projective::from)
}

pub(crate) fn g2_to_bytes(p: &G2Projective) -> [u8; G2_BYTES] {
    G2Affine::from(p).to_compressed()
}

pub(crate) fn g2_from_bytes(data: &[u8], what: &'static str) -> Result<G2Projective> {
    let bytes: [u8; G2_BYTES] = fixed_bytes(data, what)?;
    ct_decoded(G2Affine::from_compressed(&bytes), what).map(G2Projective::from)
}

// }}}

// {{{ serde

/// Serialize a fixed size type as a struct with a single `bytes` field, and validate the bytes
/// when deserializing.
///
/// The type needs `to_bytes` and `from_bytes(&[u8]) -> Result<Self>`.
macro_rules! impl_bytes_serde {
    ($name:ident) => {
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                use serde::ser::SerializeStruct;

                let mut s = serializer.serialize_struct(stringify!($name), 1)?;
                let bytes: &[u8] = &self.to_bytes();
                s.serialize_field("bytes", &bytes)?;
                s.end()
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                use core::fmt;
                use serde::de::{self, MapAccess, Visitor};

                #[derive(serde::Deserialize)]
                #[serde(field_identifier, rename_all = "lowercase")]
                enum Field {
                    Bytes,
                }

                struct BytesVisitor;
                impl<'de> Visitor<'de> for BytesVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        formatter.write_str(concat!("struct ", stringify!($name)))
                    }

                    fn visit_map<V>(self, mut map: V) -> core::result::Result<$name, V::Error>
                    where
                        V: MapAccess<'de>,
                    {
                        let mut bytes = None;
                        while let Some(key) = map.next_key()? {
                            match key {
                                Field::Bytes => {
                                    if bytes.is_some() {
                                        return Err(de::Error::duplicate_field("bytes"));
                                    }
                                    bytes = Some(map.next_value()?);
                                }
                            }
                        }
                        let bytes: Vec<u8> =
                            bytes.ok_or_else(|| de::Error::missing_field("bytes"))?;

                        $name::from_bytes(&bytes).map_err(de::Error::custom)
                    }
                }

                const FIELDS: &[&str] = &["bytes"];
                deserializer.deserialize_struct(stringify!($name), FIELDS, BytesVisitor)
            }
        }
    };
}

// }}}
