use std::error;
use std::fmt;

use oxidbus_core::signature::SignatureError;

/// Result alias defaulting to the error type of this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised while parsing introspection XML.
#[derive(Debug)]
pub struct Error {
    path: Box<str>,
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn new<P, K>(path: P, kind: K) -> Self
    where
        Box<str>: From<P>,
        ErrorKind: From<K>,
    {
        Self {
            path: path.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::XmlParser(error) => Some(error),
            ErrorKind::Signature(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    XmlParser(xmlparser::Error),
    Signature(SignatureError),
    UnsupportedElementStart(Box<str>),
    UnsupportedElementEnd,
    UnsupportedAttribute(Box<str>),
    UnsupportedText,
    MismatchingEnd { expected: Box<str>, actual: Box<str> },
    MissingMethodName,
    MissingSignalName,
    MissingInterfaceName,
    MissingPropertyName,
    MissingPropertyType,
    MissingPropertyAccess,
    MissingArgumentType,
    MissingAnnotationName,
    MissingAnnotationValue,
    UnsupportedArgumentDirection(Box<str>),
    UnsupportedPropertyAccess(Box<str>),
}

impl From<xmlparser::Error> for ErrorKind {
    fn from(error: xmlparser::Error) -> Self {
        ErrorKind::XmlParser(error)
    }
}

impl From<SignatureError> for ErrorKind {
    fn from(error: SignatureError) -> Self {
        ErrorKind::Signature(error)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::XmlParser(error) => error.fmt(f),
            ErrorKind::Signature(error) => error.fmt(f),
            ErrorKind::UnsupportedElementStart(element) => {
                write!(f, "unsupported element: {element}")
            }
            ErrorKind::UnsupportedElementEnd => write!(f, "unsupported element end"),
            ErrorKind::UnsupportedAttribute(name) => write!(f, "unsupported attribute: {name}"),
            ErrorKind::UnsupportedText => write!(f, "unsupported text"),
            ErrorKind::MismatchingEnd { expected, actual } => {
                write!(f, "mismatching end: expected {expected}, found {actual}")
            }
            ErrorKind::MissingMethodName => write!(f, "missing method name"),
            ErrorKind::MissingSignalName => write!(f, "missing signal name"),
            ErrorKind::MissingInterfaceName => write!(f, "missing interface name"),
            ErrorKind::MissingPropertyName => write!(f, "missing property name"),
            ErrorKind::MissingPropertyType => write!(f, "missing property type"),
            ErrorKind::MissingPropertyAccess => write!(f, "missing property access"),
            ErrorKind::MissingArgumentType => write!(f, "missing argument type"),
            ErrorKind::MissingAnnotationName => write!(f, "missing annotation name"),
            ErrorKind::MissingAnnotationValue => write!(f, "missing annotation value"),
            ErrorKind::UnsupportedArgumentDirection(value) => {
                write!(f, "unsupported argument direction `{value}`")
            }
            ErrorKind::UnsupportedPropertyAccess(value) => {
                write!(f, "unsupported property access `{value}`")
            }
        }
    }
}
