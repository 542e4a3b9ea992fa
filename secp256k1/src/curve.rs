//! Curve provider for secp256k1.
//!
//! Every piece of group and scalar arithmetic the crate performs goes through this module,
//! which is backed by [k256]. Scalars cross this boundary as 32-byte big-endian arrays and
//! points as [k256::PublicKey] (which can never be the point at infinity).

use crate::{
    secret::{ct_is_zero, ct_lt_bytes},
    signature::RecoveryId,
    Error,
};
use k256::{
    ecdsa::{
        signature::hazmat::{PrehashSigner, PrehashVerifier, RandomizedPrehashSigner},
        Signature as EcdsaSignature, SigningKey, VerifyingKey,
    },
    elliptic_curve::{
        bigint::{Encoding, U256},
        ops::Reduce,
        point::DecompressPoint,
        sec1::ToEncodedPoint,
        subtle::Choice,
        Curve, Field, PrimeField,
    },
    AffinePoint, FieldBytes, ProjectivePoint, Scalar, Secp256k1,
};
use rand::{rngs::StdRng, SeedableRng};

/// Length of a serialized scalar (secret key, tweak, `r`, or `s`).
pub const SCALAR_LENGTH: usize = 32;

/// Order of the secp256k1 group (`n`).
pub(crate) const ORDER: U256 = <Secp256k1 as Curve>::ORDER;

/// Prime of the secp256k1 coordinate field (`p`).
pub(crate) const FIELD_PRIME: U256 =
    U256::from_be_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F");

/// Returns whether `bytes` encodes an integer in `[1, n-1]`.
///
/// Runs in constant time with respect to the value of `bytes`.
pub fn scalar_is_valid(bytes: &[u8; SCALAR_LENGTH]) -> bool {
    let order = ORDER.to_be_bytes();
    !ct_is_zero(bytes) & ct_lt_bytes(bytes, &order)
}

/// Parses a scalar in `[0, n-1]`.
fn scalar(bytes: &[u8; SCALAR_LENGTH]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(*FieldBytes::from_slice(bytes)))
}

/// Parses a scalar in `[1, n-1]`.
fn nonzero_scalar(bytes: &[u8; SCALAR_LENGTH]) -> Option<Scalar> {
    let scalar = scalar(bytes)?;
    if bool::from(scalar.is_zero()) {
        return None;
    }
    Some(scalar)
}

/// Computes `(secret + tweak) mod n`.
pub fn scalar_add(
    secret: &[u8; SCALAR_LENGTH],
    tweak: &[u8; SCALAR_LENGTH],
) -> Result<[u8; SCALAR_LENGTH], Error> {
    let tweak = scalar(tweak).ok_or(Error::InvalidTweak)?;
    let secret = nonzero_scalar(secret).ok_or(Error::InvalidSecretKey)?;
    let sum = secret + tweak;
    if bool::from(sum.is_zero()) {
        return Err(Error::ZeroScalar);
    }
    Ok(sum.to_bytes().into())
}

/// Computes `secret·G`.
pub fn point_from_private(secret: &[u8; SCALAR_LENGTH]) -> Result<k256::PublicKey, Error> {
    let secret = k256::SecretKey::from_bytes(FieldBytes::from_slice(secret))
        .map_err(|_| Error::InvalidSecretKey)?;
    Ok(secret.public_key())
}

/// Computes `point + tweak·G`.
pub fn point_add_tweak(
    point: &k256::PublicKey,
    tweak: &[u8; SCALAR_LENGTH],
) -> Result<k256::PublicKey, Error> {
    let tweak = scalar(tweak).ok_or(Error::InvalidTweak)?;
    let sum = point.to_projective() + ProjectivePoint::GENERATOR * tweak;
    k256::PublicKey::from_affine(sum.to_affine()).map_err(|_| Error::PointAtInfinity)
}

/// Serializes a point in SEC1 form (33 bytes compressed, 65 bytes uncompressed).
pub fn point_encode(point: &k256::PublicKey, compressed: bool) -> Vec<u8> {
    point.to_encoded_point(compressed).as_bytes().to_vec()
}

/// Parses a SEC1-encoded point, rejecting anything off the curve (and the identity).
pub fn point_decode(bytes: &[u8]) -> Result<k256::PublicKey, Error> {
    k256::PublicKey::from_sec1_bytes(bytes).map_err(|_| Error::InvalidPublicKey)
}

/// Produces an ECDSA signature over a 32-byte digest.
///
/// Nonces are derived with RFC 6979 (HMAC-SHA256). When `test_case` is non-zero, 32 bytes
/// drawn from `StdRng::seed_from_u64(test_case)` are mixed into the derivation as additional
/// data, so each `test_case` yields a different but reproducible nonce.
///
/// The returned signature is not normalized.
pub fn ecdsa_sign(
    secret: &[u8; SCALAR_LENGTH],
    digest: &[u8; 32],
    test_case: u32,
) -> Result<EcdsaSignature, Error> {
    let signer = SigningKey::from_slice(secret).map_err(|_| Error::InvalidSecretKey)?;
    let result: Result<EcdsaSignature, _> = if test_case == 0 {
        signer.sign_prehash(digest)
    } else {
        let mut rng = StdRng::seed_from_u64(test_case as u64);
        signer.sign_prehash_with_rng(&mut rng, digest)
    };
    result.map_err(|err| Error::Provider(err.to_string()))
}

/// Verifies an ECDSA signature over a 32-byte digest.
///
/// The backend rejects signatures whose `s` is in the upper half of the order.
pub fn ecdsa_verify(point: &k256::PublicKey, digest: &[u8; 32], signature: &EcdsaSignature) -> bool {
    let verifier = VerifyingKey::from(point);
    verifier.verify_prehash(digest, signature).is_ok()
}

/// Reconstructs the public key that produced `(r, s)` over `digest` (SEC 1, Version 2.0,
/// Section 4.1.6).
///
/// The candidate nonce point `R` has x-coordinate `r` (or `r + n` when the recovery id says
/// the coordinate was reduced) and the y-parity carried by the recovery id. The public key
/// is then `r⁻¹(sR − eG)`. A successful result is a key for which the signature verifies.
pub fn ecdsa_recover(
    digest: &[u8; 32],
    r: &[u8; SCALAR_LENGTH],
    s: &[u8; SCALAR_LENGTH],
    recovery_id: RecoveryId,
) -> Result<k256::PublicKey, Error> {
    let r_scalar = nonzero_scalar(r).ok_or(Error::InvalidSignature)?;
    let s_scalar = nonzero_scalar(s).ok_or(Error::InvalidSignature)?;

    // Determine the x-coordinate of R
    let mut x = U256::from_be_slice(r);
    if recovery_id.is_x_reduced() {
        // r + n must still be a field element
        if x >= FIELD_PRIME.wrapping_sub(&ORDER) {
            return Err(Error::InvalidCoordinate);
        }
        x = x.wrapping_add(&ORDER);
    }
    let x = x.to_be_bytes();

    // Lift x to a curve point with the requested parity
    let y_is_odd = Choice::from(recovery_id.is_y_odd() as u8);
    let big_r: AffinePoint =
        Option::from(AffinePoint::decompress(FieldBytes::from_slice(&x), y_is_odd))
            .ok_or(Error::InvalidCoordinate)?;

    // Solve for the public key
    let e = <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(digest));
    let r_inv: Scalar = Option::from(r_scalar.invert()).ok_or(Error::InvalidSignature)?;
    let q = (ProjectivePoint::from(big_r) * s_scalar - ProjectivePoint::GENERATOR * e) * r_inv;
    k256::PublicKey::from_affine(q.to_affine()).map_err(|_| Error::PointAtInfinity)
}
