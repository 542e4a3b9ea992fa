//! Additive key tweaks.
//!
//! For any key pair `(k, P = k·G)` and tweak `t`, tweaking both sides yields another key pair:
//! `(k + t)·G = P + t·G`.

use crate::{
    curve::{self, SCALAR_LENGTH},
    Context, Error, PublicKey, SecretKey,
};
use tracing::debug;
use zeroize::Zeroizing;

impl Context {
    /// Returns `(secret + tweak) mod n`.
    ///
    /// Fails with [Error::InvalidTweak] if `tweak >= n` and with [Error::ZeroScalar] if the
    /// sum is zero. The result keeps the compression flag of `secret`.
    pub fn tweak_secret(
        &self,
        secret: &SecretKey,
        tweak: &[u8; SCALAR_LENGTH],
    ) -> Result<SecretKey, Error> {
        let sum = {
            let scalar = secret.scalar()?;
            Zeroizing::new(
                curve::scalar_add(&scalar, tweak)
                    .inspect_err(|err| debug!(?err, "secret tweak rejected"))?,
            )
        };
        SecretKey::from_bytes(sum.as_slice(), secret.is_compressed())
    }

    /// Returns `public_key + tweak·G`.
    ///
    /// Fails with [Error::InvalidTweak] if `tweak >= n` and with [Error::PointAtInfinity] if
    /// the sum is the identity. The result keeps the encoding of `public_key`.
    pub fn tweak_public(
        &self,
        public_key: &PublicKey,
        tweak: &[u8; SCALAR_LENGTH],
    ) -> Result<PublicKey, Error> {
        let point = curve::point_add_tweak(public_key.point(), tweak)
            .inspect_err(|err| debug!(?err, %public_key, "public tweak rejected"))?;
        Ok(PublicKey::from_point(point, public_key.is_compressed()))
    }
}
