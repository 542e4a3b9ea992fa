//! ECDSA signatures over secp256k1.
//!
//! A [Signature] is the `(r, s)` pair, encoded as 64 bytes (`R || S`) or as DER. A
//! [CompactSignature] prepends a header byte carrying the [RecoveryId] and whether the signer's
//! public key is compressed:
//!
//! ```text
//! +--------+-------------------+-------------------+
//! | header |  r (32 bytes, BE) |  s (32 bytes, BE) |
//! +--------+-------------------+-------------------+
//! header = 27 + recovery_id (+ 4 if compressed)
//! ```

use crate::{
    curve::{ORDER, SCALAR_LENGTH},
    Error,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use commonware_utils::hex;
use core::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
};
use k256::{
    ecdsa::Signature as EcdsaSignature,
    elliptic_curve::{bigint::U256, scalar::IsHigh},
    FieldBytes,
};

const CURVE_NAME: &str = "secp256k1";
const SIGNATURE_LENGTH: usize = 64; // R || S
const COMPACT_SIGNATURE_LENGTH: usize = 65; // Header || R || S

const HEADER_BASE: u8 = 27;
const HEADER_COMPRESSED: u8 = 4;

/// Disambiguates the candidate nonce points that could have produced a signature.
///
/// Bit 0 is the parity of `R.y`. Bit 1 is set when `R.x` was `r + n` (it exceeded the
/// group order and was reduced).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecoveryId(u8);

impl RecoveryId {
    /// Largest valid recovery id.
    pub const MAX: u8 = 3;

    /// Builds a recovery id from its two flags.
    pub const fn new(is_y_odd: bool, is_x_reduced: bool) -> Self {
        Self((is_x_reduced as u8) << 1 | is_y_odd as u8)
    }

    pub const fn is_y_odd(self) -> bool {
        self.0 & 1 == 1
    }

    pub const fn is_x_reduced(self) -> bool {
        self.0 & 2 == 2
    }

    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// Iterates over the first `count` recovery ids (at most four).
    pub(crate) fn first(count: u8) -> impl Iterator<Item = RecoveryId> {
        (0..count.min(Self::MAX + 1)).map(RecoveryId)
    }
}

impl TryFrom<u8> for RecoveryId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(Error::InvalidRecoveryId(value));
        }
        Ok(Self(value))
    }
}

impl Display for RecoveryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns whether a big-endian `r` or `s` element lies in `[1, n-1]`, or in `[1, n/2]` when
/// `half` is set.
///
/// Leading zero bytes are ignored, so elements shorter or longer than 32 bytes are accepted
/// as long as their value is in range.
pub fn check_signature_element(bytes: &[u8], half: bool) -> bool {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let bytes = &bytes[start..];
    if bytes.is_empty() || bytes.len() > SCALAR_LENGTH {
        return false;
    }
    let mut padded = [0u8; SCALAR_LENGTH];
    padded[SCALAR_LENGTH - bytes.len()..].copy_from_slice(bytes);
    let value = U256::from_be_slice(&padded);
    let max = if half {
        ORDER.shr_vartime(1)
    } else {
        ORDER.wrapping_sub(&U256::ONE)
    };
    value <= max
}

/// ECDSA signature `(r, s)` with `r` and `s` in `[1, n-1]`.
///
/// Decoding accepts either half of the order for `s`. Signatures produced by this crate are
/// always low-S and [crate::PublicKey::verify] rejects the rest.
#[derive(Clone, Eq, PartialEq)]
pub struct Signature {
    raw: [u8; SIGNATURE_LENGTH],
    signature: EcdsaSignature,
}

impl Signature {
    /// Builds a signature from big-endian `r` and `s`.
    pub fn from_scalars(r: &[u8; SCALAR_LENGTH], s: &[u8; SCALAR_LENGTH]) -> Result<Self, Error> {
        let signature =
            EcdsaSignature::from_scalars(*FieldBytes::from_slice(r), *FieldBytes::from_slice(s))
                .map_err(|_| Error::InvalidSignature)?;
        Ok(Self::from(signature))
    }

    /// Parses a DER-encoded signature.
    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        let signature = EcdsaSignature::from_der(bytes).map_err(|_| Error::InvalidSignature)?;
        Ok(Self::from(signature))
    }

    /// Serializes the signature as DER.
    pub fn to_der(&self) -> Vec<u8> {
        self.signature.to_der().as_bytes().to_vec()
    }

    pub fn r(&self) -> [u8; SCALAR_LENGTH] {
        let mut r = [0u8; SCALAR_LENGTH];
        r.copy_from_slice(&self.raw[..SCALAR_LENGTH]);
        r
    }

    pub fn s(&self) -> [u8; SCALAR_LENGTH] {
        let mut s = [0u8; SCALAR_LENGTH];
        s.copy_from_slice(&self.raw[SCALAR_LENGTH..]);
        s
    }

    /// Returns whether `s <= n/2`.
    pub fn is_low_s(&self) -> bool {
        !bool::from(self.signature.s().is_high())
    }

    /// Returns the low-S form of the signature (replacing `s` with `n - s` if needed) and
    /// whether a replacement happened.
    pub fn normalize(&self) -> (Self, bool) {
        match self.signature.normalize_s() {
            Some(normalized) => (Self::from(normalized), true),
            None => (self.clone(), false),
        }
    }

    pub(crate) fn as_ecdsa(&self) -> &EcdsaSignature {
        &self.signature
    }
}

impl Write for Signature {
    fn write(&self, buf: &mut impl BufMut) {
        self.raw.write(buf);
    }
}

impl Read for Signature {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let raw = <[u8; Self::SIZE]>::read(buf)?;
        let signature = EcdsaSignature::from_slice(&raw)
            .map_err(|e| CodecError::Wrapped(CURVE_NAME, e.into()))?;
        Ok(Self { raw, signature })
    }
}

impl FixedSize for Signature {
    const SIZE: usize = SIGNATURE_LENGTH;
}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for Signature {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for Signature {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for Signature {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl From<EcdsaSignature> for Signature {
    fn from(value: EcdsaSignature) -> Self {
        let mut raw = [0u8; SIGNATURE_LENGTH];
        raw.copy_from_slice(&value.to_bytes());
        Self {
            raw,
            signature: value,
        }
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

/// Recoverable ECDSA signature (65 bytes).
#[derive(Clone, Eq, PartialEq)]
pub struct CompactSignature {
    raw: [u8; COMPACT_SIGNATURE_LENGTH],
    signature: Signature,
    recovery_id: RecoveryId,
    compressed: bool,
}

impl CompactSignature {
    pub fn new(signature: Signature, recovery_id: RecoveryId, compressed: bool) -> Self {
        let mut raw = [0u8; COMPACT_SIGNATURE_LENGTH];
        raw[0] = Self::header_for(recovery_id, compressed);
        raw[1..].copy_from_slice(&signature.raw);
        Self {
            raw,
            signature,
            recovery_id,
            compressed,
        }
    }

    /// Parses the 65-byte wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != COMPACT_SIGNATURE_LENGTH {
            return Err(Error::InvalidSignatureLength(bytes.len()));
        }
        let (recovery_id, compressed) = Self::parse_header(bytes[0])?;
        let signature = EcdsaSignature::from_slice(&bytes[1..])
            .map_err(|_| Error::InvalidSignature)?;
        Ok(Self::new(Signature::from(signature), recovery_id, compressed))
    }

    fn header_for(recovery_id: RecoveryId, compressed: bool) -> u8 {
        let mut header = HEADER_BASE + recovery_id.to_byte();
        if compressed {
            header += HEADER_COMPRESSED;
        }
        header
    }

    /// Splits a header byte into its recovery id and compression flag.
    fn parse_header(header: u8) -> Result<(RecoveryId, bool), Error> {
        if !(HEADER_BASE..HEADER_BASE + 2 * HEADER_COMPRESSED).contains(&header) {
            return Err(Error::InvalidHeader(header));
        }
        let offset = header - HEADER_BASE;
        let compressed = offset >= HEADER_COMPRESSED;
        let recovery_id = RecoveryId::try_from(offset % HEADER_COMPRESSED)?;
        Ok((recovery_id, compressed))
    }

    pub fn header(&self) -> u8 {
        self.raw[0]
    }

    pub fn recovery_id(&self) -> RecoveryId {
        self.recovery_id
    }

    /// Whether the signer's public key uses the compressed encoding.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl Write for CompactSignature {
    fn write(&self, buf: &mut impl BufMut) {
        self.raw.write(buf);
    }
}

impl Read for CompactSignature {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let raw = <[u8; Self::SIZE]>::read(buf)?;
        let (recovery_id, compressed) = Self::parse_header(raw[0])
            .map_err(|_| CodecError::Invalid(CURVE_NAME, "invalid compact signature header"))?;
        let signature = EcdsaSignature::from_slice(&raw[1..])
            .map_err(|e| CodecError::Wrapped(CURVE_NAME, e.into()))?;
        Ok(Self {
            raw,
            signature: Signature::from(signature),
            recovery_id,
            compressed,
        })
    }
}

impl FixedSize for CompactSignature {
    const SIZE: usize = COMPACT_SIGNATURE_LENGTH;
}

impl Hash for CompactSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl AsRef<[u8]> for CompactSignature {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for CompactSignature {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl Debug for CompactSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for CompactSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};
    use commonware_utils::from_hex_formatted;
    use k256::elliptic_curve::bigint::Encoding;
    use test_case::test_case;

    fn bytes32(hex: &str) -> [u8; 32] {
        from_hex_formatted(hex).unwrap().try_into().unwrap()
    }

    fn parse_signature(r: &str, s: &str) -> Signature {
        Signature::from_scalars(&bytes32(r), &bytes32(s)).unwrap()
    }

    fn sample() -> Signature {
        parse_signature(
            "E907831F80848D1069A5371B402410364BDF1C5F8307B0084C55F1CE2DCA8215",
            "25F66A4A85EA8B71E482A74F382D2CE5EBEEE8FDB2172F477DF4900D310536C0",
        )
    }

    #[test_case(0, false, 27; "id0 uncompressed")]
    #[test_case(1, false, 28; "id1 uncompressed")]
    #[test_case(3, false, 30; "id3 uncompressed")]
    #[test_case(0, true, 31; "id0 compressed")]
    #[test_case(2, true, 33; "id2 compressed")]
    #[test_case(3, true, 34; "id3 compressed")]
    fn test_header(recovery_id: u8, compressed: bool, expected: u8) {
        let recovery_id = RecoveryId::try_from(recovery_id).unwrap();
        let compact = CompactSignature::new(sample(), recovery_id, compressed);
        assert_eq!(compact.header(), expected);
        assert_eq!(
            CompactSignature::parse_header(expected).unwrap(),
            (recovery_id, compressed)
        );
    }

    #[test]
    fn test_recovery_id_flags() {
        assert!(RecoveryId::try_from(4).is_err());
        for (byte, odd, reduced) in [
            (0, false, false),
            (1, true, false),
            (2, false, true),
            (3, true, true),
        ] {
            let id = RecoveryId::try_from(byte).unwrap();
            assert_eq!(id.is_y_odd(), odd);
            assert_eq!(id.is_x_reduced(), reduced);
            assert_eq!(RecoveryId::new(odd, reduced), id);
        }
        assert_eq!(RecoveryId::first(2).count(), 2);
        assert_eq!(RecoveryId::first(9).count(), 4);
    }

    #[test]
    fn test_codec_signature() {
        let signature = sample();
        let encoded = signature.encode();
        assert_eq!(encoded.len(), SIGNATURE_LENGTH);
        let decoded = Signature::decode(encoded).unwrap();
        assert_eq!(signature, decoded);
    }

    #[test]
    fn test_codec_compact_signature() {
        let compact = CompactSignature::new(sample(), RecoveryId::try_from(1).unwrap(), true);
        let encoded = compact.encode();
        assert_eq!(encoded.len(), COMPACT_SIGNATURE_LENGTH);
        assert_eq!(encoded[0], 32);
        assert_eq!(&encoded[1..33], &sample().r());
        assert_eq!(&encoded[33..], &sample().s());
        let decoded = CompactSignature::decode(encoded).unwrap();
        assert_eq!(compact, decoded);
        assert_eq!(decoded.recovery_id().to_byte(), 1);
        assert!(decoded.is_compressed());
    }

    #[test_case(0; "zero")]
    #[test_case(26; "below range")]
    #[test_case(35; "above range")]
    #[test_case(255; "max")]
    fn test_decode_invalid_header(header: u8) {
        let mut raw = CompactSignature::new(sample(), RecoveryId::try_from(0).unwrap(), false)
            .encode()
            .to_vec();
        raw[0] = header;
        assert!(matches!(
            CompactSignature::decode(raw.as_slice()),
            Err(CodecError::Invalid(_, _))
        ));
        assert!(matches!(
            CompactSignature::from_bytes(&raw),
            Err(Error::InvalidHeader(h)) if h == header
        ));
    }

    #[test]
    fn test_decode_invalid_length() {
        let raw = CompactSignature::new(sample(), RecoveryId::try_from(0).unwrap(), false)
            .encode()
            .to_vec();
        assert!(CompactSignature::decode(&raw[..64]).is_err());
        assert!(matches!(
            CompactSignature::from_bytes(&raw[..64]),
            Err(Error::InvalidSignatureLength(64))
        ));
    }

    #[test]
    fn test_decode_zero_components() {
        let mut raw = sample().encode().to_vec();
        raw[..32].fill(0);
        assert!(Signature::decode(raw.as_slice()).is_err());

        let mut raw = sample().encode().to_vec();
        raw[32..].fill(0);
        assert!(Signature::decode(raw.as_slice()).is_err());
    }

    #[test]
    fn test_der() {
        let signature = sample();
        let der = signature.to_der();
        assert_eq!(der[0], 0x30);
        assert_eq!(Signature::from_der(&der).unwrap(), signature);
        assert!(Signature::from_der(&der[..der.len() - 1]).is_err());
        assert!(Signature::from_der(&[]).is_err());
    }

    #[test]
    fn test_normalize() {
        let low = sample();
        assert!(low.is_low_s());
        let (normalized, changed) = low.normalize();
        assert!(!changed);
        assert_eq!(normalized, low);

        // s' = n - s
        let high_s = ORDER.wrapping_sub(&U256::from_be_slice(&low.s())).to_be_bytes();
        let high = Signature::from_scalars(&low.r(), &high_s).unwrap();
        assert!(!high.is_low_s());
        let (normalized, changed) = high.normalize();
        assert!(changed);
        assert_eq!(normalized, low);
    }

    #[test]
    fn test_check_signature_element() {
        let order = ORDER.to_be_bytes();
        let half = ORDER.shr_vartime(1).to_be_bytes();
        let half_plus_one = ORDER.shr_vartime(1).wrapping_add(&U256::ONE).to_be_bytes();
        let order_minus_one = ORDER.wrapping_sub(&U256::ONE).to_be_bytes();

        assert!(check_signature_element(&[1], false));
        assert!(check_signature_element(&[0, 0, 1], true));
        assert!(!check_signature_element(&[], false));
        assert!(!check_signature_element(&[0; 32], false));
        assert!(!check_signature_element(&order, false));
        assert!(check_signature_element(&order_minus_one, false));
        assert!(!check_signature_element(&order_minus_one, true));
        assert!(check_signature_element(&half, true));
        assert!(!check_signature_element(&half_plus_one, true));

        // Leading zeros beyond 32 bytes do not change the value
        let mut padded = vec![0u8; 8];
        padded.extend_from_slice(&half);
        assert!(check_signature_element(&padded, true));
        assert!(!check_signature_element(&[1; 33], false));
    }

    #[test]
    fn test_display() {
        let signature = sample();
        assert_eq!(format!("{}", signature), hex(&signature.raw));
        assert_eq!(format!("{:?}", signature), hex(&signature.raw));
    }
}
