//! The D-Bus [`Message`]: header plus body, and the framing between them.

pub use self::message::Message;
mod message;

pub use self::serial::Serial;
pub(crate) use self::serial::SerialAllocator;
mod serial;

#[cfg(test)]
mod tests;
