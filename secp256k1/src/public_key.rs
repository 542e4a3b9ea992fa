use crate::{curve, Error, Signature, DIGEST_LENGTH};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, EncodeSize, Read, ReadExt, Write};
use commonware_utils::hex;
use core::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
};

const CURVE_NAME: &str = "secp256k1";
const COMPRESSED_LENGTH: usize = 33; // Y-Parity || X
const UNCOMPRESSED_LENGTH: usize = 65; // 0x04 || X || Y

const TAG_EVEN: u8 = 0x02;
const TAG_ODD: u8 = 0x03;
const TAG_UNCOMPRESSED: u8 = 0x04;

/// secp256k1 public key (never the point at infinity).
///
/// Keys are held together with their SEC 1 (Version 2.0, Section 2.3.3) encoding, either
/// compressed (33 bytes) or uncompressed (65 bytes). Two keys are equal only if their
/// encodings are, so the same point in different forms compares unequal.
#[derive(Clone)]
pub struct PublicKey {
    raw: Vec<u8>,
    key: k256::PublicKey,
}

impl PublicKey {
    pub(crate) fn from_point(key: k256::PublicKey, compressed: bool) -> Self {
        let raw = curve::point_encode(&key, compressed);
        Self { raw, key }
    }

    /// Parses a SEC 1 encoded key (33 or 65 bytes).
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, Error> {
        let compressed = match (bytes.len(), bytes.first()) {
            (COMPRESSED_LENGTH, Some(&TAG_EVEN | &TAG_ODD)) => true,
            (UNCOMPRESSED_LENGTH, Some(&TAG_UNCOMPRESSED)) => false,
            _ => return Err(Error::InvalidPublicKey),
        };
        let key = curve::point_decode(bytes)?;
        Ok(Self::from_point(key, compressed))
    }

    pub fn is_compressed(&self) -> bool {
        self.raw.len() == COMPRESSED_LENGTH
    }

    /// Returns the same point in compressed form.
    pub fn compress(&self) -> Self {
        Self::from_point(self.key, true)
    }

    /// Returns the same point in uncompressed form.
    pub fn decompress(&self) -> Self {
        Self::from_point(self.key, false)
    }

    /// Verifies `signature` over `digest`.
    ///
    /// Signatures with `s` in the upper half of the curve order are rejected.
    pub fn verify(&self, digest: &[u8; DIGEST_LENGTH], signature: &Signature) -> bool {
        if !signature.is_low_s() {
            return false;
        }
        curve::ecdsa_verify(&self.key, digest, signature.as_ecdsa())
    }

    pub(crate) fn point(&self) -> &k256::PublicKey {
        &self.key
    }
}

impl Write for PublicKey {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.raw);
    }
}

impl Read for PublicKey {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let tag = u8::read(buf)?;
        let len = match tag {
            TAG_EVEN | TAG_ODD => COMPRESSED_LENGTH,
            TAG_UNCOMPRESSED => UNCOMPRESSED_LENGTH,
            _ => return Err(CodecError::Invalid(CURVE_NAME, "invalid public key tag")),
        };
        if buf.remaining() < len - 1 {
            return Err(CodecError::EndOfBuffer);
        }
        let mut raw = vec![0u8; len];
        raw[0] = tag;
        buf.copy_to_slice(&mut raw[1..]);
        Self::from_sec1(&raw).map_err(|e| CodecError::Wrapped(CURVE_NAME, e.into()))
    }
}

impl EncodeSize for PublicKey {
    fn encode_size(&self) -> usize {
        self.raw.len()
    }
}

impl Eq for PublicKey {}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Deref for PublicKey {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex(&self.raw))
    }
}
