//! # Anonymous tokens with blinding and proofs of possession
//!
//! An issuer signs an identifier with its secret key, producing a token. The holder can protect
//! the token with blinding layers, each derived from some secret data such as a pin, and later
//! proves possession of the token to a verifier without revealing it. Proofs are bound to a nonce
//! chosen by the verifier, so a proof is worthless for any other session.
//!
//! ## Issuing and verifying
//!
//! ```
//!     use atbp::bls_tokens::{add_blinding, PublicKey, SecretKey};
//!
//!     // Secret key, only for the issuer
//!     let secret_key = SecretKey::new();
//!     // Public key, for holders and verifiers
//!     let public_key = PublicKey::from(&secret_key);
//!
//!     let token = secret_key.sign(b"alice");
//!     assert!(token.verify(&public_key, b"alice").is_ok());
//!     assert!(token.verify(&public_key, b"bob").is_err());
//!
//!     // A blinded token still verifies against the identifier
//!     let blinded = add_blinding(&token, b"session-1");
//!     assert!(blinded.verify(&public_key, b"alice").is_ok());
//! ```
//!
//! ## Proving possession, step by step
//!
//! Proofs are built incrementally through a handle, which makes it easy to drive from outside
//! Rust. The [`boundary`] module has the same operations on plain bytes.
//!
//! ```
//!     use atbp::bls_tokens::{add_blinding, BlindingFactor, PublicKey, SecretKey};
//!     use atbp::handles::proof_builders;
//!
//!     let secret_key = SecretKey::new();
//!     let public_key = PublicKey::from(&secret_key);
//!     let blinded = add_blinding(&secret_key.sign(b"alice"), b"session-1");
//!
//!     let builders = proof_builders();
//!     let handle = builders.init().unwrap();
//!     builders.set_token(handle, blinded).unwrap();
//!     builders.set_id(handle, b"alice").unwrap();
//!     builders.set_nonce(handle, b"n1").unwrap();
//!     builders.add_blinding(handle, BlindingFactor::new(b"session-1")).unwrap();
//!     let proof = builders.finish(handle).unwrap();
//!
//!     assert!(proof.verify(&public_key, b"alice", b"n1").is_ok());
//!     assert!(proof.verify(&public_key, b"alice", b"n2").is_err());
//!
//!     // The handle is gone once the proof is out
//!     assert!(builders.finish(handle).is_err());
//! ```

pub mod bls_tokens;
pub mod boundary;
pub mod error;
pub mod handles;

pub(crate) mod common;

pub use error::{Error, Result};
