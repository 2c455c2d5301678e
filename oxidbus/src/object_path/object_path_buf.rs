use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use super::{ObjectPath, ObjectPathError};

/// An owned, validated D-Bus object path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectPathBuf(Box<[u8]>);

impl ObjectPathBuf {
    /// The root object path `/`.
    #[inline]
    pub fn root() -> Self {
        ObjectPath::ROOT.to_owned()
    }

    /// Validate and construct an owned object path.
    pub fn new<P>(path: P) -> Result<Self, ObjectPathError>
    where
        P: AsRef<[u8]>,
    {
        let path = path.as_ref();
        ObjectPath::new(path)?;
        Ok(unsafe { Self::from_slice_unchecked(path) })
    }

    /// Construct an owned object path without validating it.
    ///
    /// # Safety
    ///
    /// The caller must ensure `bytes` is a valid D-Bus object path.
    pub unsafe fn from_slice_unchecked(bytes: &[u8]) -> Self {
        Self(Box::from(bytes))
    }

    /// Join a single additional path element onto this path.
    pub fn join(&self, element: &str) -> Result<Self, ObjectPathError> {
        if element.is_empty()
            || !element
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ObjectPathError);
        }

        let mut buf = self.0.to_vec();

        if !self.as_object_path().is_root() {
            buf.push(b'/');
        }

        buf.extend_from_slice(element.as_bytes());
        Ok(unsafe { Self::from_slice_unchecked(&buf) })
    }

    #[inline]
    fn as_object_path(&self) -> &ObjectPath {
        unsafe { ObjectPath::new_unchecked(&self.0) }
    }
}

impl Deref for ObjectPathBuf {
    type Target = ObjectPath;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_object_path()
    }
}

impl Borrow<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn borrow(&self) -> &ObjectPath {
        self
    }
}

impl AsRef<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn as_ref(&self) -> &ObjectPath {
        self
    }
}

impl fmt::Debug for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_object_path(), f)
    }
}

impl fmt::Display for ObjectPathBuf {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_object_path(), f)
    }
}

impl TryFrom<&str> for ObjectPathBuf {
    type Error = ObjectPathError;

    #[inline]
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ObjectPathBuf {
    type Error = ObjectPathError;

    #[inline]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl PartialEq<ObjectPath> for ObjectPathBuf {
    #[inline]
    fn eq(&self, other: &ObjectPath) -> bool {
        self.as_object_path() == other
    }
}
