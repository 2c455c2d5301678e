use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{Signature, SignatureError};

/// An owned, validated D-Bus signature.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct SignatureBuf {
    data: Box<[u8]>,
}

impl SignatureBuf {
    /// Construct an empty signature.
    pub fn empty() -> Self {
        Self {
            data: Box::from([]),
        }
    }

    /// Validate and construct an owned signature.
    pub fn new<S>(signature: S) -> Result<Self, SignatureError>
    where
        S: AsRef<[u8]>,
    {
        let signature = signature.as_ref();
        Signature::new(signature)?;
        Ok(unsafe { Self::from_slice_unchecked(signature) })
    }

    /// Construct an owned signature without validating it.
    ///
    /// # Safety
    ///
    /// The caller must ensure `bytes` is a valid D-Bus signature.
    pub unsafe fn from_slice_unchecked(bytes: &[u8]) -> Self {
        Self {
            data: Box::from(bytes),
        }
    }

    /// Borrow this as a [`Signature`].
    pub fn as_signature(&self) -> &Signature {
        // SAFETY: construction always validates.
        unsafe { Signature::new_unchecked(&self.data) }
    }
}

impl Deref for SignatureBuf {
    type Target = Signature;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_signature()
    }
}

impl Borrow<Signature> for SignatureBuf {
    #[inline]
    fn borrow(&self) -> &Signature {
        self.as_signature()
    }
}

impl AsRef<Signature> for SignatureBuf {
    #[inline]
    fn as_ref(&self) -> &Signature {
        self.as_signature()
    }
}

impl fmt::Debug for SignatureBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_signature(), f)
    }
}

impl fmt::Display for SignatureBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_signature(), f)
    }
}

impl TryFrom<&str> for SignatureBuf {
    type Error = SignatureError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for SignatureBuf {
    type Error = SignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<&Signature> for SignatureBuf {
    fn from(value: &Signature) -> Self {
        value.to_owned()
    }
}

impl PartialEq<Signature> for SignatureBuf {
    #[inline]
    fn eq(&self, other: &Signature) -> bool {
        self.as_signature() == other
    }
}
