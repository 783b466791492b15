//! # Byte level operations
//!
//! Everything a marshalling layer needs, on plain byte slices. Results are owned byte vectors,
//! errors carry a [status code](crate::Error::status_code) and a message. Proof builders are
//! addressed by handles into the [process wide table](crate::handles::proof_builders).

use crate::bls_tokens::{BlindingFactor, Proof, PublicKey, SecretKey, Token};
use crate::error::Result;
use crate::handles::proof_builders;

/// The status of an operation, `0` for success
pub fn status<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status_code(),
    }
}

// {{{ sizes

pub const SECRET_KEY_SIZE: usize = SecretKey::BYTES;
pub const PUBLIC_KEY_SIZE: usize = PublicKey::BYTES;
pub const TOKEN_SIZE: usize = Token::BYTES;
pub const BLINDING_SIZE: usize = BlindingFactor::BYTES;
pub const PROOF_SIZE: usize = Proof::BYTES;

pub fn secret_key_size() -> usize {
    SECRET_KEY_SIZE
}

pub fn public_key_size() -> usize {
    PUBLIC_KEY_SIZE
}

pub fn token_size() -> usize {
    TOKEN_SIZE
}

pub fn blinding_size() -> usize {
    BLINDING_SIZE
}

pub fn proof_size() -> usize {
    PROOF_SIZE
}

// }}}

// {{{ keys and tokens

/// A new random secret key, the caller has to wipe it after use
pub fn new_secret_key() -> Vec<u8> {
    SecretKey::new().to_bytes().to_vec()
}

pub fn secret_key_from_seed(seed: &[u8]) -> Vec<u8> {
    SecretKey::from_seed(seed).to_bytes().to_vec()
}

pub fn public_key(secret_key: &[u8]) -> Result<Vec<u8>> {
    let sk = SecretKey::from_bytes(secret_key)?;
    Ok(PublicKey::from(&sk).to_bytes().to_vec())
}

pub fn new_token(secret_key: &[u8], id: &[u8]) -> Result<Vec<u8>> {
    let sk = SecretKey::from_bytes(secret_key)?;
    Ok(sk.sign(id).to_bytes().to_vec())
}

pub fn verify_token(token: &[u8], public_key: &[u8], id: &[u8]) -> Result<()> {
    let token = Token::from_bytes(token)?;
    let pk = PublicKey::from_bytes(public_key)?;
    token.verify(&pk, id)
}

// }}}

// {{{ blinding

pub fn create_blinding(data: &[u8]) -> Vec<u8> {
    BlindingFactor::new(data).to_bytes().to_vec()
}

pub fn add_blinding(token: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let token = Token::from_bytes(token)?;
    Ok(crate::bls_tokens::add_blinding(&token, data).to_bytes().to_vec())
}

pub fn remove_blinding(token: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let token = Token::from_bytes(token)?;
    Ok(crate::bls_tokens::remove_blinding(&token, data)
        .to_bytes()
        .to_vec())
}

// }}}

// {{{ proofs

pub fn create_proof_init() -> Result<u64> {
    proof_builders().init()
}

/// Malformed token bytes are reported before the handle is looked at
pub fn create_proof_set_token(handle: u64, token: &[u8]) -> Result<()> {
    let token = Token::from_bytes(token)?;
    proof_builders().set_token(handle, token)
}

pub fn create_proof_set_id(handle: u64, id: &[u8]) -> Result<()> {
    proof_builders().set_id(handle, id)
}

pub fn create_proof_set_nonce(handle: u64, nonce: &[u8]) -> Result<()> {
    proof_builders().set_nonce(handle, nonce)
}

/// Add an encoded blinding factor, as returned by [`create_blinding`]
pub fn create_proof_add_blinding(handle: u64, blinding: &[u8]) -> Result<()> {
    let blinding = BlindingFactor::from_bytes(blinding)?;
    proof_builders().add_blinding(handle, blinding)
}

pub fn create_proof_finish(handle: u64) -> Result<Vec<u8>> {
    Ok(proof_builders().finish(handle)?.to_bytes().to_vec())
}

/// Release a builder without a proof
pub fn create_proof_free(handle: u64) -> Result<()> {
    proof_builders().discard(handle)
}

pub fn verify_proof(proof: &[u8], public_key: &[u8], id: &[u8], nonce: &[u8]) -> Result<()> {
    let proof = Proof::from_bytes(proof)?;
    let pk = PublicKey::from_bytes(public_key)?;
    proof.verify(&pk, id, nonce)
}

// }}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn sizes() {
        assert_eq!(secret_key_size(), 32);
        assert_eq!(public_key_size(), 96);
        assert_eq!(token_size(), 148);
        assert_eq!(blinding_size(), 32);
        assert_eq!(proof_size(), 160);
        assert_eq!(TOKEN_SIZE, token_size());

        assert_eq!(new_secret_key().len(), secret_key_size());
        assert_eq!(create_blinding(b"x").len(), blinding_size());
    }

    #[test]
    fn scenario() {
        let sk = new_secret_key();
        let pk = public_key(&sk).unwrap();
        assert_eq!(pk.len(), public_key_size());

        let token = new_token(&sk, b"alice").unwrap();
        assert_eq!(verify_token(&token, &pk, b"alice"), Ok(()));
        assert_eq!(
            verify_token(&token, &pk, b"bob"),
            Err(Error::Verification("token"))
        );

        let b = create_blinding(b"session-1");
        let token2 = add_blinding(&token, b"session-1").unwrap();
        assert_eq!(verify_token(&token2, &pk, b"alice"), Ok(()));

        let h = create_proof_init().unwrap();
        create_proof_set_token(h, &token2).unwrap();
        create_proof_set_id(h, b"alice").unwrap();
        create_proof_set_nonce(h, b"n1").unwrap();
        create_proof_add_blinding(h, &b).unwrap();
        let proof = create_proof_finish(h).unwrap();
        assert_eq!(proof.len(), proof_size());

        assert_eq!(verify_proof(&proof, &pk, b"alice", b"n1"), Ok(()));
        assert_eq!(
            verify_proof(&proof, &pk, b"alice", b"n2"),
            Err(Error::Verification("proof"))
        );

        assert_eq!(
            create_proof_finish(h),
            Err(Error::InvalidHandle(h))
        );
    }

    #[test]
    fn seeded_keys() {
        assert_eq!(secret_key_from_seed(b"seed"), secret_key_from_seed(b"seed"));
        assert_ne!(
            public_key(&secret_key_from_seed(b"seed")).unwrap(),
            public_key(&secret_key_from_seed(b"other")).unwrap()
        );
    }

    #[test]
    fn blinding_roundtrip_and_wrong_data() {
        let sk = secret_key_from_seed(b"boundary blinding");
        let pk = public_key(&sk).unwrap();
        let token = new_token(&sk, b"alice").unwrap();

        let blinded = add_blinding(&token, b"pin").unwrap();
        assert_eq!(remove_blinding(&blinded, b"pin").unwrap(), token);

        let wrong = remove_blinding(&blinded, b"nip").unwrap();
        assert_eq!(
            verify_token(&wrong, &pk, b"alice"),
            Err(Error::Verification("token"))
        );
    }

    #[test]
    fn error_kinds_stay_distinct() {
        let sk = secret_key_from_seed(b"boundary errors");
        let pk = public_key(&sk).unwrap();

        assert_eq!(public_key(&[0u8; 3]), Err(Error::Format("secret key")));
        assert_eq!(new_token(&[0u8; 32], b"id"), Err(Error::Format("secret key")));
        assert_eq!(
            verify_token(&[0u8; 148], &pk, b"id"),
            Err(Error::Format("token"))
        );
        assert_eq!(
            verify_proof(&[0u8; 160], &pk, b"id", b"n"),
            Err(Error::Format("proof"))
        );
        assert_eq!(add_blinding(&[1u8; 5], b"pin"), Err(Error::Format("token")));

        let r: Result<()> = Err(Error::Verification("proof"));
        assert_eq!(status(&r), 2);
        assert_eq!(status(&Ok::<_, Error>(())), 0);
    }

    #[test]
    fn builder_errors() {
        let h = create_proof_init().unwrap();
        assert_eq!(
            create_proof_set_token(h, &[0u8; 10]),
            Err(Error::Format("token"))
        );
        assert_eq!(
            create_proof_add_blinding(h, &[0xffu8; 32]),
            Err(Error::Format("blinding factor"))
        );
        assert_eq!(
            create_proof_finish(h),
            Err(Error::IncompleteState("token"))
        );
        assert_eq!(create_proof_free(h), Ok(()));
        assert_eq!(create_proof_free(h), Err(Error::InvalidHandle(h)));
        assert_eq!(
            create_proof_set_id(h, b"alice"),
            Err(Error::InvalidHandle(h))
        );
    }
}
