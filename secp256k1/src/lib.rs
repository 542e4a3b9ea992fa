//! Manage secp256k1 keys, produce canonical and recoverable ECDSA signatures, and derive tweaked keys.
//!
//! Secret scalars live in [Secret] memory (locked against swapping, inaccessible while not in use,
//! and zeroed before release). Signatures are always produced in canonical low-S form
//! ([BIP 62](https://github.com/bitcoin/bips/blob/master/bip-0062.mediawiki#low-s-values-in-signatures)),
//! either as a plain `(r, s)` [Signature] (with DER and 64-byte encodings) or as a 65-byte
//! [CompactSignature] from which the signer's [PublicKey] can be recovered. Secret and public
//! keys can be tweaked additively, the primitive behind hierarchical key derivation.
//!
//! All operations run through a [Context], created once with a [Config] (after a sanity
//! self-test of the curve backend) and torn down by [Context::stop].
//!
//! # Status
//!
//! `commonware-secp256k1` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.
//!
//! # Example
//! ```rust
//! use commonware_secp256k1::{Config, Context, SecretKey};
//! use rand::rngs::OsRng;
//!
//! // Initialize the curve context
//! let context = Context::new(Config::default()).expect("sanity check failed");
//!
//! // Generate a new secret key
//! let secret = SecretKey::generate(&mut OsRng, true).unwrap();
//!
//! // Sign a digest with a recoverable signature
//! let digest = [7u8; 32];
//! let compact = context.sign_compact(&secret, &digest).unwrap();
//!
//! // Recover the signer without transmitting the public key
//! let recovered = context.recover_compact(&digest, &compact, None).unwrap();
//! assert_eq!(recovered, secret.public_key().unwrap());
//!
//! // Derive a child key pair from a tweak
//! let tweak = [1u8; 32];
//! let child = context.tweak_secret(&secret, &tweak).unwrap();
//! let child_public = context.tweak_public(&secret.public_key().unwrap(), &tweak).unwrap();
//! assert_eq!(child.public_key().unwrap(), child_public);
//!
//! context.stop();
//! ```

use thiserror::Error;

mod context;
pub use context::{Config, Context};
pub mod curve;
mod key;
pub use key::SecretKey;
mod public_key;
pub use public_key::PublicKey;
mod recover;
pub mod secret;
pub use secret::Secret;
pub mod signature;
pub use signature::{check_signature_element, CompactSignature, RecoveryId, Signature};
mod signer;
mod tweak;

/// Length of a message digest accepted for signing and recovery.
pub const DIGEST_LENGTH: usize = 32;

/// Errors that can occur when working with secp256k1 keys and signatures.
///
/// No variant ever carries secret material.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid secret key length: {0}")]
    InvalidKeyLength(usize),
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid signature length: {0}")]
    InvalidSignatureLength(usize),
    #[error("tweak is not less than the curve order")]
    InvalidTweak,
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("invalid compact signature header: {0}")]
    InvalidHeader(u8),
    #[error("no curve point with the derived x-coordinate")]
    InvalidCoordinate,
    #[error("result is the point at infinity")]
    PointAtInfinity,
    #[error("result is the zero scalar")]
    ZeroScalar,
    #[error("no recovery id reproduces the signing key")]
    RecoveryIdNotFound,
    #[error("recovered public key does not match")]
    PublicKeyMismatch,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("provider failure: {0}")]
    Provider(String),
    #[error("secure memory failure: {0}")]
    SecureMemory(&'static str),
    #[error("sanity check failed")]
    SanityCheck,
}
