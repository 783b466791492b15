//! # Tokens on BLS12-381
//!
//! Tokens are BLS signatures on the identifier, in G1, and public keys live in G2. This means
//! anyone holding the public key can verify a token, and a holder can prove possession of a token
//! with a proof that only needs the public key to check.
//!
//! ## Usage
//!
//! ```
//!     use atbp::bls_tokens::{BlindingFactor, Proof, PublicKey, SecretKey};
//!
//!     // Secret key, only for the issuer
//!     let secret_key = SecretKey::new();
//!     // Public key, for holders and verifiers
//!     let public_key = PublicKey::from(&secret_key);
//!
//!     let id = b"test identity";
//!     let token = secret_key.sign(id);
//!     assert!(token.verify(&public_key, id).is_ok());
//!
//!     // Protect the token with a pin, the pin is needed for every proof
//!     let pin = BlindingFactor::new(b"1234");
//!     let blinded = token.add_blinding(&pin);
//!
//!     // The verifier picks a nonce for the session
//!     let nonce = b"session nonce";
//!     let proof = Proof::new(&blinded, &[pin], id, nonce, &mut rand::thread_rng());
//!
//!     assert!(proof.verify(&public_key, id, nonce).is_ok());
//!     assert!(proof.verify(&public_key, id, b"replayed elsewhere").is_err());
//! ```

#[macro_use]
mod util;
pub mod blinding;
pub mod keys;
pub mod proof;
pub mod tokens;

pub use blinding::{add_blinding, remove_blinding, BlindingFactor};
pub use keys::{PublicKey, SecretKey};
pub use proof::{Proof, ProofBuilder};
pub use tokens::Token;
pub use util::{hash_to_group, hash_to_scalar, random_scalar};
