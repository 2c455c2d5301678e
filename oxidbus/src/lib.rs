//! An asynchronous D-Bus client and service library built on Tokio.
//!
//! This crate implements the D-Bus wire protocol directly: signatures,
//! marshalling, message framing, the SASL handshake, and a `Connection` that
//! multiplexes method calls, replies, and signals over a single socket. On
//! top of that it offers a declarative surface for exporting objects
//! ([`InterfaceModel`]) and a proxy runtime that builds client-side views of
//! remote objects from introspection XML.

#![deny(missing_docs)]

#[doc(inline)]
pub use self::error::{Error, ErrorKind, Result};
mod error;

#[doc(inline)]
pub use self::proto::{Endianness, Flags, HeaderField, MessageType};
mod proto;

#[doc(inline)]
pub use self::value::{BasicValue, Value};
mod value;

mod codec;

#[doc(inline)]
pub use self::object_path::{ObjectPath, ObjectPathBuf, ObjectPathError};
mod object_path;

#[doc(inline)]
pub use self::message::{Message, Serial};
mod message;

mod transport;

mod sasl;

#[doc(inline)]
pub use self::connection::{Connection, ConnectOptions};
mod connection;

#[doc(inline)]
pub use self::namebus::{ReleaseNameReply, RequestNameFlags, RequestNameReply};
mod namebus;

#[doc(inline)]
pub use self::interface::{EmitsChanged, InterfaceModel, Method, Property, PropertyAccess, Signal};
mod interface;

#[doc(inline)]
pub use self::router::{MatchRule, ServiceRouter};
mod router;

#[doc(inline)]
pub use self::proxy::{ProxyFactory, ProxyObject};
mod proxy;

#[doc(inline)]
pub use oxidbus_core::signature::{Signature, SignatureBuf, SignatureError};
