//! Handle through which every signing, recovery, and tweak operation runs.

use crate::{Error, PublicKey, SecretKey, DIGEST_LENGTH};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Prefix of the digest signed when checking that a secret and public key belong together.
const KEY_PAIR_PREFIX: &[u8] = b"_COMMONWARE_SECP256K1_KEY_PAIR_";

/// Configuration for a [Context].
#[derive(Clone, Debug)]
pub struct Config {
    /// Search recovery ids `0..=3` (rather than only `0` and `1`) when producing a
    /// [crate::CompactSignature].
    pub search_all_recovery_ids: bool,

    /// Verify every produced signature against the signer's public key before returning it.
    pub verify_after_sign: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_all_recovery_ids: true,
            verify_after_sign: true,
        }
    }
}

/// Initialized secp256k1 context.
///
/// Created once with [Context::new] (which runs a self-test of the curve backend) and torn
/// down with [Context::stop]. Holds no key material and may be shared across threads.
#[derive(Clone, Debug)]
pub struct Context {
    pub(crate) cfg: Config,
}

impl Context {
    /// Initializes a context, failing if the curve backend does not pass a
    /// generate/sign/verify/recover round.
    pub fn new(cfg: Config) -> Result<Self, Error> {
        let context = Self { cfg };
        if let Err(err) = context.sanity_check() {
            warn!(?err, "sanity check failed");
            return Err(Error::SanityCheck);
        }
        debug!(
            search_all_recovery_ids = context.cfg.search_all_recovery_ids,
            verify_after_sign = context.cfg.verify_after_sign,
            "started secp256k1 context"
        );
        Ok(context)
    }

    fn sanity_check(&self) -> Result<(), Error> {
        let secret = SecretKey::generate(&mut OsRng, true)?;
        let public_key = secret.public_key()?;
        let digest: [u8; DIGEST_LENGTH] = Sha256::digest(b"sanity check").into();

        let signature = self.sign(&secret, &digest)?;
        if !public_key.verify(&digest, &signature) {
            return Err(Error::VerificationFailed);
        }
        let compact = self.sign_compact(&secret, &digest)?;
        self.recover_compact(&digest, &compact, Some(&public_key))?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Checks that `public_key` belongs to `secret` by signing a random digest and verifying
    /// the result (rather than re-deriving the public key).
    ///
    /// Returns false for an invalid secret or when the compression flags differ.
    pub fn verify_key_pair<R: RngCore + CryptoRng>(
        &self,
        secret: &SecretKey,
        public_key: &PublicKey,
        rng: &mut R,
    ) -> bool {
        if !secret.is_valid() || secret.is_compressed() != public_key.is_compressed() {
            return false;
        }
        let mut hasher = Sha256::new();
        hasher.update(KEY_PAIR_PREFIX);
        hasher.update(rng.next_u64().to_be_bytes());
        let digest: [u8; DIGEST_LENGTH] = hasher.finalize().into();
        match self.sign(secret, &digest) {
            Ok(signature) => public_key.verify(&digest, &signature),
            Err(err) => {
                debug!(?err, "failed to sign key pair challenge");
                false
            }
        }
    }

    /// Loads a secret key and checks it against its stored public key.
    ///
    /// When `skip_check` is set only the scalar itself is validated.
    pub fn load(
        &self,
        bytes: &[u8],
        compressed: bool,
        public_key: &PublicKey,
        skip_check: bool,
    ) -> Result<SecretKey, Error> {
        let secret = SecretKey::from_bytes(bytes, compressed)?;
        if skip_check {
            return Ok(secret);
        }
        if !self.verify_key_pair(&secret, public_key, &mut OsRng) {
            debug!(%public_key, "loaded secret does not match public key");
            return Err(Error::PublicKeyMismatch);
        }
        Ok(secret)
    }

    /// Tears down the context.
    pub fn stop(self) {
        debug!("stopped secp256k1 context");
    }
}
