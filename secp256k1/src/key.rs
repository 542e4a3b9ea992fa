use crate::{
    curve::{self, SCALAR_LENGTH},
    secret::{Secret, SecretGuard},
    Error, PublicKey,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use core::fmt::{Debug, Formatter};
use rand::{CryptoRng, RngCore};
use tracing::warn;
use zeroize::{Zeroize, Zeroizing};

const CURVE_NAME: &str = "secp256k1";

/// Secret scalar of a secp256k1 key pair.
///
/// The scalar is held in [Secret] memory: it is locked against swapping, only readable while
/// an operation is using it, and zeroed when the key is invalidated, reassigned, or dropped.
/// A valid key always holds a scalar in `[1, n-1]`.
///
/// The `compressed` flag only selects the encoding of the derived [PublicKey].
pub struct SecretKey {
    scalar: Secret<[u8; SCALAR_LENGTH]>,
    valid: bool,
    compressed: bool,
}

impl SecretKey {
    /// Creates an invalid (all-zero) key.
    pub fn new() -> Result<Self, Error> {
        let scalar = Secret::try_new([0u8; SCALAR_LENGTH]).map_err(Error::SecureMemory)?;
        Ok(Self {
            scalar,
            valid: false,
            compressed: false,
        })
    }

    /// Parses a 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8], compressed: bool) -> Result<Self, Error> {
        let mut key = Self::new()?;
        key.set_from_bytes(bytes, compressed)?;
        Ok(key)
    }

    /// Draws a new key from `rng`.
    ///
    /// A draw outside `[1, n-1]` (probability below 2^-127) is reported as
    /// [Error::InvalidSecretKey] rather than retried.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, compressed: bool) -> Result<Self, Error> {
        let mut key = Self::new()?;
        let valid = {
            let mut scalar = key.scalar.expose_mut();
            rng.fill_bytes(&mut *scalar);
            curve::scalar_is_valid(&scalar)
        };
        if !valid {
            warn!("generated scalar out of range");
            key.invalidate();
            return Err(Error::InvalidSecretKey);
        }
        key.valid = true;
        key.compressed = compressed;
        Ok(key)
    }

    /// Replaces the scalar with `bytes`.
    ///
    /// On failure the key is left invalid and zeroed.
    pub fn set_from_bytes(&mut self, bytes: &[u8], compressed: bool) -> Result<(), Error> {
        if bytes.len() != SCALAR_LENGTH {
            self.invalidate();
            return Err(Error::InvalidKeyLength(bytes.len()));
        }
        let valid = {
            let mut scalar = self.scalar.expose_mut();
            scalar.copy_from_slice(bytes);
            curve::scalar_is_valid(&scalar)
        };
        if !valid {
            self.invalidate();
            return Err(Error::InvalidSecretKey);
        }
        self.valid = true;
        self.compressed = compressed;
        Ok(())
    }

    /// Zeroes the scalar and marks the key invalid.
    pub fn invalidate(&mut self) {
        self.scalar.expose_mut().zeroize();
        self.valid = false;
        self.compressed = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Copies the scalar out as 32 big-endian bytes (zeroed when the copy is dropped).
    pub fn to_bytes(&self) -> Result<Zeroizing<[u8; SCALAR_LENGTH]>, Error> {
        let scalar = self.scalar()?;
        Ok(Zeroizing::new(*scalar))
    }

    /// Derives the public key, encoded as selected by [SecretKey::is_compressed].
    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let point = {
            let scalar = self.scalar()?;
            curve::point_from_private(&scalar)?
        };
        Ok(PublicKey::from_point(point, self.compressed))
    }

    /// Compares two keys in constant time.
    ///
    /// Keys are equal when their validity, compression flag, and scalar all match.
    pub fn equals(&self, other: &Self) -> bool {
        let scalar = self.scalar == other.scalar;
        scalar & (self.valid == other.valid) & (self.compressed == other.compressed)
    }

    /// Copies the key into a new secure region.
    pub fn try_clone(&self) -> Result<Self, Error> {
        let copy = Zeroizing::new(*self.scalar.expose());
        let scalar = Secret::try_new(*copy).map_err(Error::SecureMemory)?;
        Ok(Self {
            scalar,
            valid: self.valid,
            compressed: self.compressed,
        })
    }

    /// Exposes the scalar of a valid key.
    pub(crate) fn scalar(&self) -> Result<SecretGuard<'_, [u8; SCALAR_LENGTH]>, Error> {
        if !self.valid {
            return Err(Error::InvalidSecretKey);
        }
        Ok(self.scalar.expose())
    }
}

impl Clone for SecretKey {
    /// # Panics
    ///
    /// Panics if secure memory cannot be allocated. Use [SecretKey::try_clone] to handle that
    /// case.
    fn clone(&self) -> Self {
        Self {
            scalar: self.scalar.clone(),
            valid: self.valid,
            compressed: self.compressed,
        }
    }
}

impl Default for SecretKey {
    /// # Panics
    ///
    /// Panics if secure memory cannot be allocated. Use [SecretKey::new] to handle that case.
    fn default() -> Self {
        Self {
            scalar: Secret::new([0u8; SCALAR_LENGTH]),
            valid: false,
            compressed: false,
        }
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for SecretKey {}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecretKey")
            .field("scalar", &self.scalar)
            .field("valid", &self.valid)
            .field("compressed", &self.compressed)
            .finish()
    }
}

/// Writes the scalar (all zeros for an invalid key).
impl Write for SecretKey {
    fn write(&self, buf: &mut impl BufMut) {
        self.scalar.expose().write(buf);
    }
}

impl Read for SecretKey {
    /// Whether the derived public key is compressed.
    type Cfg = bool;

    fn read_cfg(buf: &mut impl Buf, compressed: &bool) -> Result<Self, CodecError> {
        let raw = Zeroizing::new(<[u8; SCALAR_LENGTH]>::read(buf)?);
        Self::from_bytes(raw.as_slice(), *compressed)
            .map_err(|e| CodecError::Wrapped(CURVE_NAME, e.into()))
    }
}

impl FixedSize for SecretKey {
    const SIZE: usize = SCALAR_LENGTH;
}
