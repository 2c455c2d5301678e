use std::fmt;
use std::str::from_utf8_unchecked;

use super::{Iter, SignatureBuf, validate};

/// A borrowed, validated D-Bus signature string.
///
/// Signatures are a run of type codes drawn from the D-Bus type alphabet.
/// Use [`Signature::new`] to validate an arbitrary byte string, or one of
/// the associated constants for well-known single-type signatures.
#[derive(Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct Signature([u8]);

impl Signature {
    /// The empty signature, used for messages with no body.
    pub const EMPTY: &'static Signature = Signature::new_const(b"");
    /// The signature of a [`Signature`] value (`g`).
    pub const SIGNATURE: &'static Signature = Signature::new_const(b"g");
    /// The signature of an object path (`o`).
    pub const OBJECT_PATH: &'static Signature = Signature::new_const(b"o");
    /// The signature of a UTF-8 string (`s`).
    pub const STRING: &'static Signature = Signature::new_const(b"s");
    /// The signature of a variant (`v`).
    pub const VARIANT: &'static Signature = Signature::new_const(b"v");
    /// A single byte (`y`).
    pub const BYTE: &'static Signature = Signature::new_const(b"y");
    /// A boolean (`b`).
    pub const BOOLEAN: &'static Signature = Signature::new_const(b"b");
    /// Signed 16-bit integer (`n`).
    pub const INT16: &'static Signature = Signature::new_const(b"n");
    /// Unsigned 16-bit integer (`q`).
    pub const UINT16: &'static Signature = Signature::new_const(b"q");
    /// Signed 32-bit integer (`i`).
    pub const INT32: &'static Signature = Signature::new_const(b"i");
    /// Unsigned 32-bit integer (`u`).
    pub const UINT32: &'static Signature = Signature::new_const(b"u");
    /// Signed 64-bit integer (`x`).
    pub const INT64: &'static Signature = Signature::new_const(b"x");
    /// Unsigned 64-bit integer (`t`).
    pub const UINT64: &'static Signature = Signature::new_const(b"t");
    /// IEEE 754 double (`d`).
    pub const DOUBLE: &'static Signature = Signature::new_const(b"d");
    /// A unix file descriptor index (`h`).
    pub const UNIX_FD: &'static Signature = Signature::new_const(b"h");

    /// Construct a signature in a const context, panicking if invalid.
    #[track_caller]
    pub const fn new_const(signature: &[u8]) -> &Signature {
        if validate(signature).is_err() {
            panic!("invalid D-Bus signature");
        }

        // SAFETY: just validated.
        unsafe { Self::new_unchecked(signature) }
    }

    /// Validate and construct a signature from a byte string.
    #[inline]
    pub fn new<S>(signature: &S) -> Result<&Signature, super::SignatureError>
    where
        S: ?Sized + AsRef<[u8]>,
    {
        let signature = signature.as_ref();
        validate(signature)?;
        // SAFETY: just validated.
        unsafe { Ok(Self::new_unchecked(signature)) }
    }

    /// Construct a signature without validating it.
    ///
    /// # Safety
    ///
    /// The caller must ensure `signature` is a valid D-Bus signature.
    #[inline]
    pub const unsafe fn new_unchecked(signature: &[u8]) -> &Self {
        unsafe { &*(signature as *const [u8] as *const Signature) }
    }

    /// The empty signature.
    pub const fn empty() -> &'static Self {
        unsafe { Self::new_unchecked(&[]) }
    }

    /// Test if this signature has zero length.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the signature in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the top-level complete types in this signature.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Borrow the signature as a UTF-8 string.
    pub fn as_str(&self) -> &str {
        // SAFETY: validation ensures the signature is ASCII, hence UTF-8.
        unsafe { from_utf8_unchecked(&self.0) }
    }

    /// Borrow the signature as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<Signature> for Signature {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self
    }
}

impl ToOwned for Signature {
    type Owned = SignatureBuf;

    #[inline]
    fn to_owned(&self) -> Self::Owned {
        // SAFETY: self is already validated.
        unsafe { SignatureBuf::from_slice_unchecked(&self.0) }
    }
}

impl PartialEq<SignatureBuf> for Signature {
    #[inline]
    fn eq(&self, other: &SignatureBuf) -> bool {
        self.0 == *other.as_bytes()
    }
}

impl PartialEq<[u8]> for Signature {
    #[inline]
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for Signature {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0 == *other.as_bytes()
    }
}

impl PartialEq<&str> for Signature {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other.as_bytes()
    }
}
