//! Public key recovery (SEC 1, Version 2.0, Section 4.1.6).

use crate::{
    curve, CompactSignature, Context, Error, PublicKey, RecoveryId, Signature, DIGEST_LENGTH,
};
use tracing::debug;

impl Context {
    /// Reconstructs the public key that produced `signature` over `digest`, returned in
    /// compressed form.
    ///
    /// A recovered key always verifies `signature` (when `signature` is low-S). Fails if the
    /// recovery id names an x-coordinate outside the field or off the curve, or if the
    /// candidate key is the point at infinity.
    pub fn recover(
        &self,
        digest: &[u8; DIGEST_LENGTH],
        signature: &Signature,
        recovery_id: RecoveryId,
    ) -> Result<PublicKey, Error> {
        let point = curve::ecdsa_recover(digest, &signature.r(), &signature.s(), recovery_id)?;
        Ok(PublicKey::from_point(point, true))
    }

    /// Reconstructs the public key that produced `compact` over `digest`, encoded as the
    /// header requests.
    ///
    /// If `expected` is provided, fails with [Error::PublicKeyMismatch] unless the recovered
    /// key (including its encoding) equals it.
    pub fn recover_compact(
        &self,
        digest: &[u8; DIGEST_LENGTH],
        compact: &CompactSignature,
        expected: Option<&PublicKey>,
    ) -> Result<PublicKey, Error> {
        let signature = compact.signature();
        let point = curve::ecdsa_recover(
            digest,
            &signature.r(),
            &signature.s(),
            compact.recovery_id(),
        )
        .inspect_err(|err| debug!(?err, header = compact.header(), "recovery failed"))?;
        let public_key = PublicKey::from_point(point, compact.is_compressed());
        if let Some(expected) = expected {
            if public_key != *expected {
                debug!(%expected, recovered = %public_key, "recovered unexpected public key");
                return Err(Error::PublicKeyMismatch);
            }
        }
        Ok(public_key)
    }
}
