//! Canonical and recoverable signing.

use crate::{
    curve, CompactSignature, Context, Error, RecoveryId, SecretKey, Signature, DIGEST_LENGTH,
};
use tracing::{trace, warn};

impl Context {
    /// Signs `digest` with `secret`, returning a low-S signature.
    ///
    /// Nonces are derived deterministically (RFC 6979), so signing the same digest with the
    /// same key always yields the same signature.
    pub fn sign(
        &self,
        secret: &SecretKey,
        digest: &[u8; DIGEST_LENGTH],
    ) -> Result<Signature, Error> {
        self.sign_with_test_case(secret, digest, 0)
    }

    /// Signs `digest` with `secret`, mixing `test_case` into nonce derivation.
    ///
    /// A `test_case` of 0 is identical to [Context::sign]. Every other value yields a different
    /// (but reproducible) valid signature.
    ///
    /// The curve backend already returns low-S signatures. The result is passed through
    /// [Signature::normalize] anyway, so the low-S guarantee does not depend on the backend.
    pub fn sign_with_test_case(
        &self,
        secret: &SecretKey,
        digest: &[u8; DIGEST_LENGTH],
        test_case: u32,
    ) -> Result<Signature, Error> {
        let signature = {
            let scalar = secret.scalar()?;
            curve::ecdsa_sign(&scalar, digest, test_case)?
        };
        let (signature, _) = Signature::from(signature).normalize();

        if self.cfg.verify_after_sign {
            let public_key = secret.public_key()?;
            if !public_key.verify(digest, &signature) {
                warn!(%public_key, "produced signature failed verification");
                return Err(Error::Provider(
                    "produced signature failed verification".to_string(),
                ));
            }
        }
        Ok(signature)
    }

    /// Signs `digest` with `secret`, returning a signature from which the public key of
    /// `secret` can be recovered.
    ///
    /// The recovery id is found by recovering each candidate and comparing the result with
    /// the signer's own public key.
    pub fn sign_compact(
        &self,
        secret: &SecretKey,
        digest: &[u8; DIGEST_LENGTH],
    ) -> Result<CompactSignature, Error> {
        let signature = self.sign(secret, digest)?;
        let public_key = secret.public_key()?;
        let (r, s) = (signature.r(), signature.s());

        let candidates = if self.cfg.search_all_recovery_ids { 4 } else { 2 };
        for recovery_id in RecoveryId::first(candidates) {
            match curve::ecdsa_recover(digest, &r, &s, recovery_id) {
                Ok(point) if point == *public_key.point() => {
                    trace!(%recovery_id, "found recovery id");
                    return Ok(CompactSignature::new(
                        signature,
                        recovery_id,
                        secret.is_compressed(),
                    ));
                }
                Ok(_) => trace!(%recovery_id, "recovered a different key"),
                Err(err) => trace!(%recovery_id, ?err, "recovery id rejected"),
            }
        }
        warn!(%public_key, %signature, "no recovery id reproduces the signing key");
        Err(Error::RecoveryIdNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{curve::ORDER, Config};
    use commonware_macros::test_traced;
    use k256::elliptic_curve::bigint::{Encoding, U256};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use sha2::{Digest, Sha256};
    use std::{sync::Arc, thread};
    use test_case::test_case;

    fn context() -> Context {
        Context::new(Config::default()).unwrap()
    }

    fn digest(msg: &[u8]) -> [u8; DIGEST_LENGTH] {
        Sha256::digest(msg).into()
    }

    #[test]
    fn test_sign_verify() {
        let context = context();
        let mut rng = StdRng::seed_from_u64(0);
        let secret = SecretKey::generate(&mut rng, true).unwrap();
        let public_key = secret.public_key().unwrap();
        let (message, other) = (digest(b"hello, world!"), digest(b"hello, world?"));
        let signature = context.sign(&secret, &message).unwrap();
        assert!(public_key.verify(&message, &signature));
        assert!(!public_key.verify(&other, &signature));
    }

    #[test]
    fn test_sign_low_s_randomized() {
        let context = Context::new(Config {
            search_all_recovery_ids: true,
            verify_after_sign: false,
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1024 {
            let compressed = rng.gen();
            let secret = SecretKey::generate(&mut rng, compressed).unwrap();
            let digest: [u8; DIGEST_LENGTH] = rng.gen();
            let signature = context.sign(&secret, &digest).unwrap();
            assert!(signature.is_low_s());
            assert!(secret.public_key().unwrap().verify(&digest, &signature));
        }
    }

    #[test]
    fn test_sign_deterministic() {
        let context = context();
        let secret = SecretKey::from_bytes(&[7u8; 32], true).unwrap();
        let digest = digest(b"deterministic");
        let first = context.sign(&secret, &digest).unwrap();
        let second = context.sign(&secret, &digest).unwrap();
        assert_eq!(first, second);
        assert_eq!(context.sign_with_test_case(&secret, &digest, 0).unwrap(), first);
    }

    #[test_case(1; "one")]
    #[test_case(2; "two")]
    #[test_case(u32::MAX; "max")]
    fn test_sign_test_case(test_case: u32) {
        let context = context();
        let secret = SecretKey::from_bytes(&[7u8; 32], true).unwrap();
        let public_key = secret.public_key().unwrap();
        let digest = digest(b"test case");
        let base = context.sign(&secret, &digest).unwrap();
        let varied = context.sign_with_test_case(&secret, &digest, test_case).unwrap();
        assert_ne!(base, varied);
        assert!(varied.is_low_s());
        assert!(public_key.verify(&digest, &varied));
        assert_eq!(
            context.sign_with_test_case(&secret, &digest, test_case).unwrap(),
            varied
        );
    }

    #[test]
    fn test_sign_invalid_key() {
        let context = context();
        let digest = digest(b"invalid");
        assert!(matches!(
            context.sign(&SecretKey::default(), &digest),
            Err(Error::InvalidSecretKey)
        ));
        assert!(matches!(
            context.sign_compact(&SecretKey::default(), &digest),
            Err(Error::InvalidSecretKey)
        ));
    }

    #[test]
    fn test_normalization_branch() {
        let secret = SecretKey::from_bytes(&[9u8; 32], true).unwrap();
        let digest = digest(b"normalize");
        let raw = {
            let scalar = secret.scalar().unwrap();
            Signature::from(curve::ecdsa_sign(&scalar, &digest, 0).unwrap())
        };
        // The backend already emits low-S
        assert!(raw.is_low_s());
        let (low, changed) = raw.normalize();
        assert!(!changed);
        assert_eq!(low, raw);

        // Flip to the high-S twin and normalize back
        let high_s = ORDER.wrapping_sub(&U256::from_be_slice(&low.s())).to_be_bytes();
        let high = Signature::from_scalars(&low.r(), &high_s).unwrap();
        assert!(!high.is_low_s());
        let (normalized, changed) = high.normalize();
        assert!(changed);
        assert_eq!(normalized, low);
        assert_eq!(normalized, context().sign(&secret, &digest).unwrap());
    }

    #[test_case(true, true; "all ids compressed")]
    #[test_case(true, false; "all ids uncompressed")]
    #[test_case(false, true; "low ids compressed")]
    #[test_case(false, false; "low ids uncompressed")]
    fn test_sign_compact(search_all_recovery_ids: bool, compressed: bool) {
        let context = Context::new(Config {
            search_all_recovery_ids,
            verify_after_sign: true,
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let secret = SecretKey::generate(&mut rng, compressed).unwrap();
            let digest: [u8; DIGEST_LENGTH] = rng.gen();
            let compact = context.sign_compact(&secret, &digest).unwrap();
            assert_eq!(compact.is_compressed(), compressed);
            assert!(compact.recovery_id().to_byte() < 2);
            assert_eq!(compact.signature(), &context.sign(&secret, &digest).unwrap());
            let recovered = context.recover_compact(&digest, &compact, None).unwrap();
            assert_eq!(recovered, secret.public_key().unwrap());
        }
    }

    #[test]
    fn test_sign_concurrent_shared_key() {
        let context = Arc::new(context());
        let secret = Arc::new(SecretKey::from_bytes(&[0x21u8; 32], true).unwrap());
        let digest = digest(b"concurrent");
        let expected = context.sign(&secret, &digest).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = context.clone();
                let secret = secret.clone();
                thread::spawn(move || {
                    (0..32)
                        .map(|_| context.sign(&secret, &digest).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            for signature in handle.join().unwrap() {
                assert_eq!(signature, expected);
            }
        }
        assert!(secret.is_valid());
    }

    #[test_traced]
    fn test_sign_compact_header() {
        let context = context();
        let secret = SecretKey::from_bytes(&[3u8; 32], true).unwrap();
        let compact = context.sign_compact(&secret, &digest(b"header")).unwrap();
        let header = compact.header();
        assert!((31..=34).contains(&header));
        assert_eq!(header, 31 + compact.recovery_id().to_byte());
    }
}
