use std::error;
use std::fmt;

use crate::proto::Type;

/// Detailed errors raised when validation of a [`Signature`] fails.
///
/// [`Signature`]: crate::signature::Signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureError {
    pub(super) kind: SignatureErrorKind,
}

impl SignatureError {
    #[doc(hidden)]
    pub(crate) const fn new(kind: SignatureErrorKind) -> Self {
        Self { kind }
    }

    /// Indicate that a signature is too long.
    #[inline]
    pub const fn too_long() -> Self {
        Self::new(SignatureErrorKind::SignatureTooLong)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignatureErrorKind {
    UnknownTypeCode(u8),
    SignatureTooLong,
    MissingArrayElementType,
    StructEndedButNotStarted,
    DictEndedButNotStarted,
    StructStartedButNotEnded,
    DictStartedButNotEnded,
    StructHasNoFields,
    DictKeyMustBeBasicType,
    DictEntryHasNoFields,
    DictEntryHasOnlyOneField,
    DictEntryNotInsideArray,
    ExceededMaximumArrayRecursion,
    ExceededMaximumStructRecursion,
    ExceededMaximumDictRecursion,
    DictEntryHasTooManyFields,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SignatureErrorKind::UnknownTypeCode(code) => {
                write!(f, "unknown type code: {:?}", Type::new(code))
            }
            SignatureErrorKind::SignatureTooLong => write!(f, "signature too long"),
            SignatureErrorKind::MissingArrayElementType => {
                write!(f, "missing array element type")
            }
            SignatureErrorKind::StructEndedButNotStarted => {
                write!(f, "struct ended but not started")
            }
            SignatureErrorKind::DictEndedButNotStarted => {
                write!(f, "dict ended but not started")
            }
            SignatureErrorKind::StructStartedButNotEnded => {
                write!(f, "struct started but not ended")
            }
            SignatureErrorKind::DictStartedButNotEnded => {
                write!(f, "dict started but not ended")
            }
            SignatureErrorKind::StructHasNoFields => write!(f, "struct has no fields"),
            SignatureErrorKind::DictKeyMustBeBasicType => {
                write!(f, "dict key must be a basic type")
            }
            SignatureErrorKind::DictEntryHasNoFields => write!(f, "dict entry has no fields"),
            SignatureErrorKind::DictEntryHasOnlyOneField => {
                write!(f, "dict entry has only one field")
            }
            SignatureErrorKind::DictEntryNotInsideArray => {
                write!(f, "dict entry not inside array")
            }
            SignatureErrorKind::ExceededMaximumArrayRecursion => {
                write!(f, "exceeded maximum array recursion")
            }
            SignatureErrorKind::ExceededMaximumStructRecursion => {
                write!(f, "exceeded maximum struct recursion")
            }
            SignatureErrorKind::ExceededMaximumDictRecursion => {
                write!(f, "exceeded maximum dict recursion")
            }
            SignatureErrorKind::DictEntryHasTooManyFields => {
                write!(f, "dict entry has too many fields")
            }
        }
    }
}

impl error::Error for SignatureError {}
