//! Low-level wire constants shared by the codec, message, and connection
//! layers.

use bitflags::bitflags;

oxidbus_core::raw_enum! {
    /// The endianness tag carried in byte 0 of every message.
    #[repr(u8)]
    pub enum Endianness {
        /// Little-endian, ASCII `l`.
        LITTLE = b'l',
        /// Big-endian, ASCII `B`.
        BIG = b'B',
    }
}

impl Endianness {
    /// The endianness native to this platform.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endianness = Endianness::LITTLE;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endianness = Endianness::BIG;
}

oxidbus_core::raw_enum! {
    /// The message type carried in byte 1 of every message.
    #[repr(u8)]
    pub enum MessageType {
        /// A method call.
        METHOD_CALL = 1,
        /// A method reply with returned data.
        METHOD_RETURN = 2,
        /// An error reply.
        ERROR = 3,
        /// A signal emission.
        SIGNAL = 4,
    }
}

oxidbus_core::raw_enum! {
    /// A header field code, per the D-Bus specification table.
    #[repr(u8)]
    pub enum HeaderField {
        /// The object to invoke the method on, or that emitted a signal.
        PATH = 1,
        /// The interface containing the member.
        INTERFACE = 2,
        /// The name of the method or signal.
        MEMBER = 3,
        /// The name of the error, for `ERROR` messages.
        ERROR_NAME = 4,
        /// The serial this message is a reply to.
        REPLY_SERIAL = 5,
        /// The unique or well-known name this message should be routed to.
        DESTINATION = 6,
        /// The unique name of the sending connection, filled in by the bus.
        SENDER = 7,
        /// The signature of the message body.
        SIGNATURE = 8,
        /// The number of file descriptors accompanying the message.
        UNIX_FDS = 9,
    }
}

bitflags! {
    /// Message flags, per the D-Bus specification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// The sender does not want a reply.
        const NO_REPLY_EXPECTED = 0x1;
        /// The bus must not auto-start a service to handle this message.
        const NO_AUTO_START = 0x2;
        /// Allow an interactive authorization prompt while handling this call.
        const ALLOW_INTERACTIVE_AUTHORIZATION = 0x4;
    }
}

/// Protocol version implemented by this crate.
pub const PROTOCOL_VERSION: u8 = 1;
