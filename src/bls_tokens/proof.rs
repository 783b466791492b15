//! # Proofs of token possession
//!
//! A proof shows that the holder knows a token for an identifier, and the blinding factors on
//! it, without showing the token. It is bound to a nonce picked by the verifier, so it can not
//! be replayed in another session.
//!
//! With `U = H(id)` the prover picks random `r` and `k` and sends
//!
//! * `commitment = r·U`
//! * `challenge = H(U, commitment, k·U, id, nonce)`
//! * `response = challenge·commitment + r·sigma`, where `sigma` is the unblinded token
//! * `opening = k + challenge·r`
//!
//! The verifier recomputes `k·U = opening·U - challenge·commitment` and the challenge, and checks
//! `e(response, g2) == e(commitment, challenge·g2 + pk)`.

use core::convert::TryFrom;
use core::fmt;

use bls12_381::{Bls12, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use pairing::Engine;
use rand::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::blinding::BlindingFactor;
use super::keys::PublicKey;
use super::tokens::Token;
use super::util::{
    g1_from_bytes, g1_to_bytes, hash_to_group, hash_to_scalar, random_scalar, scalar_from_bytes,
    scalar_to_bytes, CHALLENGE_TAG, G1_BYTES, SCALAR_BYTES,
};
use crate::common::ct_verified;
use crate::error::{Error, Result};

// {{{ Proof

/// A non-interactive proof of possession of a token
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Proof {
    commitment: G1Projective,
    response: G1Projective,
    challenge: Scalar,
    opening: Scalar,
}

fn challenge(
    u: &G1Projective,
    commitment: &G1Projective,
    schnorr: &G1Projective,
    id: &[u8],
    nonce: &[u8],
) -> Scalar {
    hash_to_scalar(
        CHALLENGE_TAG,
        &[
            &g1_to_bytes(u),
            &g1_to_bytes(commitment),
            &g1_to_bytes(schnorr),
            id,
            nonce,
        ],
    )
}

/// Overwrite a secret intermediate
fn wipe<T>(secret: &mut T, zero: T) {
    *secret = zero;
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

impl Proof {
    /// The number of bytes in an encoded proof
    pub const BYTES: usize = 2 * G1_BYTES + 2 * SCALAR_BYTES;

    /// Prove possession of `token` with the given blindings for `id`, bound to `nonce`
    ///
    /// A blinded token needs every blinding factor that was layered on it. Wrong or missing
    /// factors give a proof that does not verify.
    pub fn new<R: CryptoRng + RngCore>(
        token: &Token,
        blindings: &[BlindingFactor],
        id: impl AsRef<[u8]>,
        nonce: impl AsRef<[u8]>,
        rng: &mut R,
    ) -> Self {
        let id = id.as_ref();
        let u = hash_to_group(id);

        let mut total = blindings
            .iter()
            .fold(Scalar::zero(), |acc, b| acc + b.scalar());
        let mut sigma = token.signature() + G1Projective::generator() * total;

        let mut r = random_scalar(rng);
        let mut k = random_scalar(rng);

        let commitment = u * r;
        let schnorr = u * k;
        let challenge = challenge(&u, &commitment, &schnorr, id, nonce.as_ref());

        let response = commitment * challenge + sigma * r;
        let opening = k + challenge * r;

        wipe(&mut total, Scalar::zero());
        wipe(&mut r, Scalar::zero());
        wipe(&mut k, Scalar::zero());
        wipe(&mut sigma, G1Projective::identity());

        Self {
            commitment,
            response,
            challenge,
            opening,
        }
    }

    /// Check the proof against the public key, the identifier and the nonce of this session
    pub fn verify(
        &self,
        pk: &PublicKey,
        id: impl AsRef<[u8]>,
        nonce: impl AsRef<[u8]>,
    ) -> Result<()> {
        let id = id.as_ref();
        let u = hash_to_group(id);

        // the commitment has to be a known multiple of H(id)
        let schnorr = u * self.opening - self.commitment * self.challenge;
        let expected = challenge(&u, &self.commitment, &schnorr, id, nonce.as_ref());
        let bound = expected.ct_eq(&self.challenge);

        let lhs = Bls12::pairing(&G1Affine::from(self.response), &G2Affine::generator());
        let rhs = Bls12::pairing(
            &G1Affine::from(self.commitment),
            &G2Affine::from(G2Projective::generator() * self.challenge + G2Projective::from(pk)),
        );

        ct_verified(
            !self.commitment.is_identity() & bound & lhs.ct_eq(&rhs),
            "proof",
        )
    }

    /// Encoding: commitment, response, challenge, opening
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut out = [0u8; Self::BYTES];
        out[..G1_BYTES].copy_from_slice(&g1_to_bytes(&self.commitment));
        out[G1_BYTES..2 * G1_BYTES].copy_from_slice(&g1_to_bytes(&self.response));
        out[2 * G1_BYTES..2 * G1_BYTES + SCALAR_BYTES]
            .copy_from_slice(&scalar_to_bytes(&self.challenge));
        out[2 * G1_BYTES + SCALAR_BYTES..].copy_from_slice(&scalar_to_bytes(&self.opening));
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != Self::BYTES {
            return Err(Error::Format("proof"));
        }
        let (points, scalars) = data.split_at(2 * G1_BYTES);
        Ok(Self {
            commitment: g1_from_bytes(&points[..G1_BYTES], "proof")?,
            response: g1_from_bytes(&points[G1_BYTES..], "proof")?,
            challenge: scalar_from_bytes(&scalars[..SCALAR_BYTES], "proof")?,
            opening: scalar_from_bytes(&scalars[SCALAR_BYTES..], "proof")?,
        })
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Proof(")?;
        self.to_bytes().iter().try_for_each(|b| write!(f, "{:02x}", b))?;
        write!(f, ")")
    }
}

impl_bytes_serde!(Proof);

impl<'a> TryFrom<&'a [u8]> for Proof {
    type Error = Error;

    fn try_from(data: &'a [u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

// }}}

// {{{ Proof builder

/// Accumulates what a proof needs, one field at a time
///
/// Setting a field again replaces it. Blinding factors accumulate in the order they are added.
/// Everything held is overwritten when the builder is dropped.
#[derive(Default)]
pub struct ProofBuilder {
    token: Option<Token>,
    id: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    blindings: Vec<BlindingFactor>,
}

impl ProofBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&mut self, token: Token) {
        self.token = Some(token);
    }

    pub fn set_id(&mut self, id: impl AsRef<[u8]>) {
        if let Some(old) = self.id.as_mut() {
            old.zeroize();
        }
        self.id = Some(id.as_ref().to_vec());
    }

    pub fn set_nonce(&mut self, nonce: impl AsRef<[u8]>) {
        if let Some(old) = self.nonce.as_mut() {
            old.zeroize();
        }
        self.nonce = Some(nonce.as_ref().to_vec());
    }

    pub fn add_blinding(&mut self, blinding: BlindingFactor) {
        // grow by hand so the old buffer is wiped before it is freed
        if self.blindings.len() == self.blindings.capacity() {
            let mut grown = Vec::with_capacity((2 * self.blindings.capacity()).max(4));
            grown.extend(self.blindings.iter().cloned());
            self.blindings.iter_mut().for_each(Zeroize::zeroize);
            self.blindings = grown;
        }
        self.blindings.push(blinding);
    }

    /// Whether anything was set yet
    pub fn is_populated(&self) -> bool {
        self.token.is_some()
            || self.id.is_some()
            || self.nonce.is_some()
            || !self.blindings.is_empty()
    }

    /// Produce the proof, the builder is left as it was
    ///
    /// Fails with an incomplete state error naming the first missing field.
    pub fn finish<R: CryptoRng + RngCore>(&self, rng: &mut R) -> Result<Proof> {
        let token = self.token.as_ref().ok_or(Error::IncompleteState("token"))?;
        let id = self.id.as_ref().ok_or(Error::IncompleteState("id"))?;
        let nonce = self.nonce.as_ref().ok_or(Error::IncompleteState("nonce"))?;

        Ok(Proof::new(token, &self.blindings, id, nonce, rng))
    }
}

impl Zeroize for ProofBuilder {
    fn zeroize(&mut self) {
        if let Some(token) = self.token.as_mut() {
            token.zeroize();
        }
        self.token = None;
        if let Some(id) = self.id.as_mut() {
            id.zeroize();
        }
        self.id = None;
        if let Some(nonce) = self.nonce.as_mut() {
            nonce.zeroize();
        }
        self.nonce = None;
        self.blindings.iter_mut().for_each(Zeroize::zeroize);
        self.blindings.clear();
    }
}

impl Drop for ProofBuilder {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for ProofBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProofBuilder")
            .field("token", &self.token.is_some())
            .field("id", &self.id.is_some())
            .field("nonce", &self.nonce.is_some())
            .field("blindings", &self.blindings.len())
            .finish()
    }
}

// }}}

// {{{ Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls_tokens::keys::SecretKey;
    use rand::{rngs::StdRng, SeedableRng};

    const ID: &[u8] = b"token test identity";

    fn setup() -> (SecretKey, PublicKey, StdRng) {
        let mut rng = StdRng::seed_from_u64(42);
        let sk = SecretKey::random(&mut rng);
        let pk = PublicKey::from(&sk);
        (sk, pk, rng)
    }

    #[test]
    fn proof_works() {
        let (sk, pk, mut rng) = setup();
        let blinding = BlindingFactor::new(b"1234");
        let blinded = sk.sign(ID).add_blinding(&blinding);

        let mut nonce = [0u8; 16];
        rng.fill_bytes(&mut nonce);

        let proof = Proof::new(&blinded, &[blinding], ID, &nonce, &mut rng);

        assert_eq!(proof.verify(&pk, ID, &nonce), Ok(()));
        assert_eq!(
            proof.verify(&pk, b"wrong id", &nonce),
            Err(Error::Verification("proof"))
        );
        assert_eq!(
            proof.verify(&pk, ID, b"wrong nonce"),
            Err(Error::Verification("proof"))
        );

        let other = PublicKey::from(&SecretKey::from_seed(b"other issuer"));
        assert_eq!(
            proof.verify(&other, ID, &nonce),
            Err(Error::Verification("proof"))
        );
    }

    #[test]
    fn unblinded_proof_works() {
        let (sk, pk, mut rng) = setup();
        let proof = Proof::new(&sk.sign(ID), &[], ID, b"nonce", &mut rng);
        assert_eq!(proof.verify(&pk, ID, b"nonce"), Ok(()));
    }

    #[test]
    fn missing_blinding_fails() {
        let (sk, pk, mut rng) = setup();
        let blinded = sk.sign(ID).add_blinding(&BlindingFactor::new(b"1234"));

        let proof = Proof::new(&blinded, &[], ID, b"nonce", &mut rng);
        assert_eq!(
            proof.verify(&pk, ID, b"nonce"),
            Err(Error::Verification("proof"))
        );

        let proof = Proof::new(&blinded, &[BlindingFactor::new(b"4321")], ID, b"nonce", &mut rng);
        assert_eq!(
            proof.verify(&pk, ID, b"nonce"),
            Err(Error::Verification("proof"))
        );
    }

    #[test]
    fn several_blindings_in_any_order() {
        let (sk, pk, mut rng) = setup();
        let pin = BlindingFactor::new(b"pin");
        let hsm = BlindingFactor::new(b"hsm");
        let blinded = sk.sign(ID).add_blinding(&pin).add_blinding(&hsm);

        let proof = Proof::new(&blinded, &[hsm, pin], ID, b"nonce", &mut rng);
        assert_eq!(proof.verify(&pk, ID, b"nonce"), Ok(()));
    }

    #[test]
    fn token_for_other_id_fails() {
        let (sk, pk, mut rng) = setup();
        let proof = Proof::new(&sk.sign(b"mallory"), &[], ID, b"nonce", &mut rng);
        assert_eq!(
            proof.verify(&pk, ID, b"nonce"),
            Err(Error::Verification("proof"))
        );
    }

    #[test]
    fn proofs_are_randomized() {
        let (sk, pk, mut rng) = setup();
        let token = sk.sign(ID);
        let a = Proof::new(&token, &[], ID, b"nonce", &mut rng);
        let b = Proof::new(&token, &[], ID, b"nonce", &mut rng);
        assert_ne!(a, b);
        assert_eq!(a.verify(&pk, ID, b"nonce"), Ok(()));
        assert_eq!(b.verify(&pk, ID, b"nonce"), Ok(()));
    }

    #[test]
    fn tampered_bytes_never_verify() {
        let (sk, pk, mut rng) = setup();
        let proof = Proof::new(&sk.sign(ID), &[], ID, b"nonce", &mut rng);
        let bytes = proof.to_bytes();

        for i in 0..Proof::BYTES {
            let mut tampered = bytes;
            tampered[i] ^= 0x01;
            match Proof::from_bytes(&tampered) {
                Ok(p) => assert_eq!(
                    p.verify(&pk, ID, b"nonce"),
                    Err(Error::Verification("proof"))
                ),
                Err(e) => assert_eq!(e, Error::Format("proof")),
            }
        }
    }

    #[test]
    fn identity_commitment_is_rejected() {
        let (_, pk, _) = setup();
        let u = hash_to_group(ID);
        let opening = Scalar::from(5u64);
        let schnorr = u * opening;
        let c = challenge(&u, &G1Projective::identity(), &schnorr, ID, b"nonce");
        let forged = Proof {
            commitment: G1Projective::identity(),
            response: G1Projective::identity(),
            challenge: c,
            opening,
        };
        assert_eq!(
            forged.verify(&pk, ID, b"nonce"),
            Err(Error::Verification("proof"))
        );
    }

    #[test]
    fn bytes() {
        let (sk, _, mut rng) = setup();
        let proof = Proof::new(&sk.sign(ID), &[], ID, b"nonce", &mut rng);
        assert_eq!(Proof::from_bytes(&proof.to_bytes()), Ok(proof));
        assert_eq!(
            Proof::from_bytes(&proof.to_bytes()[1..]),
            Err(Error::Format("proof"))
        );

        let json = serde_json::to_string(&proof).unwrap();
        let back: Proof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn builder_requires_fields() {
        let (sk, pk, mut rng) = setup();
        let mut builder = ProofBuilder::new();
        assert!(!builder.is_populated());
        assert_eq!(
            builder.finish(&mut rng).unwrap_err(),
            Error::IncompleteState("token")
        );

        builder.set_token(sk.sign(ID));
        assert!(builder.is_populated());
        assert_eq!(
            builder.finish(&mut rng).unwrap_err(),
            Error::IncompleteState("id")
        );

        builder.set_id(ID);
        assert_eq!(
            builder.finish(&mut rng).unwrap_err(),
            Error::IncompleteState("nonce")
        );

        builder.set_nonce(b"first");
        // last write wins
        builder.set_nonce(b"n1");
        let proof = builder.finish(&mut rng).unwrap();
        assert_eq!(proof.verify(&pk, ID, b"n1"), Ok(()));
        assert!(proof.verify(&pk, ID, b"first").is_err());
    }

    #[test]
    fn builder_with_blindings() {
        let (sk, pk, mut rng) = setup();
        let blinding = BlindingFactor::new(b"session-1");

        let mut builder = ProofBuilder::new();
        builder.add_blinding(blinding.clone());
        builder.set_nonce(b"n1");
        builder.set_id(b"alice");
        builder.set_token(sk.sign(b"alice").add_blinding(&blinding));

        let proof = builder.finish(&mut rng).unwrap();
        assert_eq!(proof.verify(&pk, b"alice", b"n1"), Ok(()));
        assert!(proof.verify(&pk, b"alice", b"n2").is_err());
    }

    #[test]
    fn builder_keeps_many_blindings() {
        let (sk, pk, mut rng) = setup();
        let blindings: Vec<BlindingFactor> = (0u8..9)
            .map(|i| BlindingFactor::new([b'p', b'i', b'n', i]))
            .collect();
        let blinded = blindings
            .iter()
            .fold(sk.sign(ID), |token, b| token.add_blinding(b));

        let mut builder = ProofBuilder::new();
        builder.set_token(blinded);
        builder.set_id(ID);
        builder.set_nonce(b"nonce");
        for (i, b) in blindings.iter().enumerate() {
            builder.add_blinding(b.clone());
            assert_eq!(builder.blindings.len(), i + 1);
            assert!(builder.blindings.capacity() >= 4);
        }
        assert_eq!(builder.blindings[..], blindings[..]);

        let proof = builder.finish(&mut rng).unwrap();
        assert_eq!(proof.verify(&pk, ID, b"nonce"), Ok(()));
    }

    #[test]
    fn builder_zeroize() {
        let (sk, _, mut rng) = setup();
        let mut builder = ProofBuilder::new();
        builder.set_token(sk.sign(ID));
        builder.set_id(ID);
        builder.set_nonce(b"nonce");
        builder.add_blinding(BlindingFactor::new(b"pin"));

        builder.zeroize();
        assert!(!builder.is_populated());
        assert!(builder.finish(&mut rng).is_err());
    }
}

// }}}
