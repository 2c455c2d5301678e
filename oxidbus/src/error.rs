//! The error type shared by every layer of this crate.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;

use oxidbus_core::signature::SignatureError;

use crate::object_path::ObjectPathError;

/// Result alias using an [`Error`] as the error type by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised by this crate.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Self { kind }
    }

    /// The kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Build a [`DBusError`][ErrorKind::DBusError] carrying an arbitrary
    /// failure's printable form, per the `Failed` fallback conversion.
    pub fn failed(message: impl fmt::Display) -> Error {
        Error::new(ErrorKind::DBusError {
            name: "org.freedesktop.DBus.Error.Failed".to_owned(),
            body: message.to_string(),
        })
    }
}

impl From<SignatureError> for Error {
    #[inline]
    fn from(error: SignatureError) -> Self {
        Self::new(ErrorKind::InvalidSignature(error))
    }
}

impl From<ObjectPathError> for Error {
    #[inline]
    fn from(error: ObjectPathError) -> Self {
        Self::new(ErrorKind::InvalidObjectPath(error))
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::new(ErrorKind::Io(error))
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Self {
        Self::new(ErrorKind::BadUtf8(error))
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(error) => write!(f, "I/O error: {error}"),
            ErrorKind::InvalidSignature(error) => write!(f, "invalid signature: {error}"),
            ErrorKind::InvalidObjectPath(error) => write!(f, "invalid object path: {error}"),
            ErrorKind::InvalidBusName(name) => write!(f, "invalid bus name: {name:?}"),
            ErrorKind::InvalidInterfaceName(name) => {
                write!(f, "invalid interface name: {name:?}")
            }
            ErrorKind::InvalidMemberName(name) => write!(f, "invalid member name: {name:?}"),
            ErrorKind::Truncated => write!(f, "message truncated"),
            ErrorKind::BadUtf8(error) => write!(f, "invalid UTF-8: {error}"),
            ErrorKind::NotNullTerminated => write!(f, "string is not null terminated"),
            ErrorKind::EmbeddedNul => write!(f, "embedded NUL in string"),
            ErrorKind::ArrayTooLong(length) => {
                write!(f, "array of {length} bytes exceeds the 64 MiB limit")
            }
            ErrorKind::BodyTooLong(length) => {
                write!(f, "body of {length} bytes exceeds the 128 MiB limit")
            }
            ErrorKind::BadBoolean => write!(f, "boolean value other than 0 or 1"),
            ErrorKind::SignatureMismatch => write!(f, "value does not match its signature"),
            ErrorKind::InvalidAddress(address) => write!(f, "invalid D-Bus address: {address:?}"),
            ErrorKind::MissingBus => {
                write!(f, "no bus address and DBUS_SESSION_BUS_ADDRESS is unset")
            }
            ErrorKind::AuthFailed => write!(f, "SASL authentication failed"),
            ErrorKind::Disconnected => write!(f, "connection is disconnected"),
            ErrorKind::DBusError { name, body } => write!(f, "{name}: {body}"),
            ErrorKind::UnknownObject(path) => write!(f, "unknown object {path:?}"),
            ErrorKind::UnknownInterface(iface) => write!(f, "unknown interface {iface:?}"),
            ErrorKind::UnknownMethod(member) => write!(f, "unknown method {member:?}"),
            ErrorKind::UnknownProperty(name) => write!(f, "unknown property {name:?}"),
            ErrorKind::PropertyReadOnly(name) => write!(f, "property {name:?} is read-only"),
            ErrorKind::PropertyWriteOnly(name) => write!(f, "property {name:?} is write-only"),
            ErrorKind::InvalidArgs(message) => write!(f, "invalid arguments: {message}"),
            ErrorKind::Timeout => write!(f, "call timed out"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            ErrorKind::InvalidSignature(error) => Some(error),
            ErrorKind::InvalidObjectPath(error) => Some(error),
            ErrorKind::BadUtf8(error) => Some(error),
            _ => None,
        }
    }
}

/// The specific failure behind an [`Error`].
///
/// The first three groups are rejected locally and never touch the wire;
/// the rest originate from decoding, authentication, or a peer.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Wrapped I/O failure from the underlying transport.
    Io(io::Error),
    /// A signature failed to parse.
    InvalidSignature(SignatureError),
    /// An object path failed to parse.
    InvalidObjectPath(ObjectPathError),
    /// A bus name does not meet the bus name grammar.
    InvalidBusName(String),
    /// An interface name does not meet the interface name grammar.
    InvalidInterfaceName(String),
    /// A member name does not meet the member name grammar.
    InvalidMemberName(String),
    /// The buffer ended in the middle of a value.
    Truncated,
    /// A string contained non-UTF-8 bytes.
    BadUtf8(Utf8Error),
    /// A string's length prefix was not followed by a NUL byte.
    NotNullTerminated,
    /// A string, object path, or signature contained an embedded NUL.
    EmbeddedNul,
    /// An array body exceeded the 64 MiB limit.
    ArrayTooLong(u32),
    /// A message body exceeded the 128 MiB limit.
    BodyTooLong(u32),
    /// A boolean's wire value was neither 0 nor 1.
    BadBoolean,
    /// A value did not match the signature it was marshalled or unmarshalled
    /// against.
    SignatureMismatch,
    /// A D-Bus server address string could not be parsed.
    InvalidAddress(String),
    /// No bus address was given and none could be discovered.
    MissingBus,
    /// Every offered SASL mechanism was rejected, or the peer sent `ERROR`
    /// or an unexpected verb.
    AuthFailed,
    /// The connection is closed or closing.
    Disconnected,
    /// An error reply from a peer, or a handler-raised application error.
    DBusError {
        /// The reverse-DNS error name.
        name: String,
        /// The human-readable message.
        body: String,
    },
    /// No object exists at the given path.
    UnknownObject(String),
    /// The object does not implement the given interface.
    UnknownInterface(String),
    /// No method with that name exists on the resolved interface.
    UnknownMethod(String),
    /// No property with that name exists on the resolved interface.
    UnknownProperty(String),
    /// A write was attempted on a read-only property.
    PropertyReadOnly(String),
    /// A read was attempted on a write-only property.
    PropertyWriteOnly(String),
    /// The call's arguments were invalid, or dispatch was ambiguous.
    InvalidArgs(String),
    /// A pending call's timeout elapsed before a reply arrived.
    Timeout,
}

impl ErrorKind {
    /// The reverse-DNS error name this kind is reported under on the wire.
    pub fn dbus_name(&self) -> &str {
        match self {
            ErrorKind::DBusError { name, .. } => name,
            ErrorKind::UnknownObject(..) => "org.freedesktop.DBus.Error.UnknownObject",
            ErrorKind::UnknownInterface(..) => "org.freedesktop.DBus.Error.UnknownInterface",
            ErrorKind::UnknownMethod(..) => "org.freedesktop.DBus.Error.UnknownMethod",
            ErrorKind::UnknownProperty(..) => "org.freedesktop.DBus.Error.UnknownProperty",
            ErrorKind::PropertyReadOnly(..) | ErrorKind::PropertyWriteOnly(..) => {
                "org.freedesktop.DBus.Error.PropertyReadOnly"
            }
            ErrorKind::InvalidArgs(..) => "org.freedesktop.DBus.Error.InvalidArgs",
            ErrorKind::Timeout => "org.freedesktop.DBus.Error.Timeout",
            ErrorKind::Disconnected => "org.freedesktop.DBus.Error.NoReply",
            _ => "org.freedesktop.DBus.Error.Failed",
        }
    }
}
