use std::os::fd::RawFd;

use oxidbus_core::signature::{Signature, SignatureBuf};

use crate::codec::{self, Marshaller, Unmarshaller, MAX_BODY_LENGTH};
use crate::error::{Error, ErrorKind, Result};
use crate::message::Serial;
use crate::proto::{Endianness, Flags, HeaderField, MessageType, PROTOCOL_VERSION};
use crate::ObjectPathBuf;
use crate::value::Value;

/// The number of bytes in the fixed portion of a message header: endian tag,
/// message type, flags, protocol version, body length, and serial.
pub const FIXED_HEADER_LEN: usize = 12;

/// A single D-Bus message: one method call, method return, error, or signal.
#[derive(Debug, Clone)]
pub struct Message {
    /// Whether this is a call, return, error, or signal.
    pub message_type: MessageType,
    /// Message flags.
    pub flags: Flags,
    /// This message's serial. A placeholder until the message is sent, at
    /// which point the connection stamps in the allocated value.
    pub serial: Serial,
    /// The object the message concerns.
    pub path: Option<ObjectPathBuf>,
    /// The interface containing `member`.
    pub interface: Option<String>,
    /// The method or signal name.
    pub member: Option<String>,
    /// The error name, for `ERROR` messages.
    pub error_name: Option<String>,
    /// The serial this message replies to.
    pub reply_serial: Option<Serial>,
    /// The unique or well-known name this message is routed to.
    pub destination: Option<String>,
    /// The unique name of the connection that sent this message.
    pub sender: Option<String>,
    /// The body, as a sequence of top-level values.
    pub body: Vec<Value>,
    /// File descriptors carried alongside the body.
    pub fds: Vec<RawFd>,
}

impl Message {
    fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            flags: Flags::empty(),
            serial: Serial::PLACEHOLDER,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            reply_serial: None,
            destination: None,
            sender: None,
            body: Vec::new(),
            fds: Vec::new(),
        }
    }

    /// Construct a minimal method call.
    pub fn method_call(path: ObjectPathBuf, member: impl Into<String>) -> Self {
        Self::new(MessageType::METHOD_CALL)
            .with_path(path)
            .with_member(member)
    }

    /// Construct a minimal signal emission.
    pub fn signal(path: ObjectPathBuf, interface: impl Into<String>, member: impl Into<String>) -> Self {
        Self::new(MessageType::SIGNAL)
            .with_path(path)
            .with_interface(interface)
            .with_member(member)
    }

    /// Set the object path.
    pub fn with_path(mut self, path: ObjectPathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Set the member name.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    /// Set the destination bus name.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: Vec<Value>) -> Self {
        self.body = body;
        self
    }

    /// Set the `NO_REPLY_EXPECTED` flag.
    pub fn with_no_reply_expected(mut self) -> Self {
        self.flags |= Flags::NO_REPLY_EXPECTED;
        self
    }

    /// The signature of this message's body.
    pub fn signature(&self) -> SignatureBuf {
        let mut out = String::new();

        for value in &self.body {
            out.push_str(value.signature().as_str());
        }

        SignatureBuf::new(out).expect("concatenation of valid signatures is valid")
    }

    /// Build a `METHOD_RETURN` reply to this message.
    pub fn method_return(&self, body: Vec<Value>) -> Message {
        let mut reply = Message::new(MessageType::METHOD_RETURN);
        reply.reply_serial = Some(self.serial);
        reply.destination = self.sender.clone();
        reply.body = body;
        reply
    }

    /// Build an `ERROR` reply to this message.
    pub fn error_return(&self, name: impl Into<String>, message: impl Into<String>) -> Message {
        let mut reply = Message::new(MessageType::ERROR);
        reply.reply_serial = Some(self.serial);
        reply.destination = self.sender.clone();
        reply.error_name = Some(name.into());
        reply.body = vec![Value::from(message.into())];
        reply
    }

    /// Encode this message, stamping `serial` into the header and using
    /// `endianness` as the wire byte order.
    pub(crate) fn encode(
        &self,
        serial: Serial,
        endianness: Endianness,
    ) -> Result<(Vec<u8>, Vec<RawFd>)> {
        let signature = self.signature();

        let mut marshaller = Marshaller::new(endianness);
        marshaller.put_u8(endianness.into_inner());
        marshaller.put_u8(self.message_type.into_inner());
        marshaller.put_u8(self.flags.bits());
        marshaller.put_u8(PROTOCOL_VERSION);
        let body_length_at = marshaller.len();
        marshaller.put_u32(0);
        marshaller.put_u32(serial.get());

        let mut fields = Vec::new();

        if let Some(path) = &self.path {
            fields.push(header_field(HeaderField::PATH, Value::ObjectPath(path.clone())));
        }

        if let Some(interface) = &self.interface {
            fields.push(header_field(
                HeaderField::INTERFACE,
                Value::from(interface.as_str()),
            ));
        }

        if let Some(member) = &self.member {
            fields.push(header_field(HeaderField::MEMBER, Value::from(member.as_str())));
        }

        if let Some(error_name) = &self.error_name {
            fields.push(header_field(
                HeaderField::ERROR_NAME,
                Value::from(error_name.as_str()),
            ));
        }

        if let Some(reply_serial) = self.reply_serial {
            fields.push(header_field(
                HeaderField::REPLY_SERIAL,
                Value::UInt32(reply_serial.get()),
            ));
        }

        if let Some(destination) = &self.destination {
            fields.push(header_field(
                HeaderField::DESTINATION,
                Value::from(destination.as_str()),
            ));
        }

        if let Some(sender) = &self.sender {
            fields.push(header_field(HeaderField::SENDER, Value::from(sender.as_str())));
        }

        if !signature.is_empty() {
            fields.push(header_field(
                HeaderField::SIGNATURE,
                Value::Signature(signature.clone()),
            ));
        }

        if !self.fds.is_empty() {
            let count: u32 = self
                .fds
                .len()
                .try_into()
                .map_err(|_| Error::new(ErrorKind::ArrayTooLong(u32::MAX)))?;
            fields.push(header_field(HeaderField::UNIX_FDS, Value::UInt32(count)));
        }

        let fields_value = Value::Array {
            element_signature: SignatureBuf::new("(yv)").expect("valid signature"),
            values: fields,
        };
        marshaller.marshal(Signature::new_const(b"a(yv)"), &fields_value)?;
        marshaller.pad_to(8);

        let body_start = marshaller.len();

        for (field_sig, value) in codec::split_types(&signature).into_iter().zip(&self.body) {
            marshaller.marshal(field_sig, value)?;
        }

        let body_len: u32 = (marshaller.len() - body_start)
            .try_into()
            .map_err(|_| Error::new(ErrorKind::BodyTooLong(u32::MAX)))?;

        if body_len > MAX_BODY_LENGTH {
            return Err(Error::new(ErrorKind::BodyTooLong(body_len)));
        }

        marshaller.patch_u32(body_length_at, body_len);

        let (buf, mut fds) = marshaller.into_parts();
        fds.extend_from_slice(&self.fds);
        Ok((buf, fds))
    }

    /// Determine the total length in bytes of the message starting at
    /// `prefix`, which must contain at least `FIXED_HEADER_LEN + 4` bytes.
    pub(crate) fn required_len(prefix: &[u8]) -> Result<usize> {
        if prefix.len() < FIXED_HEADER_LEN + 4 {
            return Err(Error::new(ErrorKind::Truncated));
        }

        let endianness = Endianness::new(prefix[0]);
        let read_u32 = |bytes: &[u8]| -> u32 {
            let array: [u8; 4] = bytes.try_into().unwrap();

            if endianness == Endianness::LITTLE {
                u32::from_le_bytes(array)
            } else {
                u32::from_be_bytes(array)
            }
        };

        let body_length = read_u32(&prefix[4..8]) as usize;
        let fields_length = read_u32(&prefix[12..16]) as usize;
        let header_end = FIXED_HEADER_LEN + 4 + fields_length;
        let body_start = header_end.div_ceil(8) * 8;
        Ok(body_start + body_length)
    }

    /// Peek the `UNIX_FDS` header field's declared count without decoding
    /// the body, so a transport can size the batch of file descriptors
    /// belonging to this frame before calling [`Message::decode`].
    pub(crate) fn peek_unix_fd_count(data: &[u8]) -> Result<u32> {
        if data.len() < FIXED_HEADER_LEN + 4 {
            return Err(Error::new(ErrorKind::Truncated));
        }

        let endianness = Endianness::new(data[0]);
        let mut unmarshaller = Unmarshaller::new(endianness, data, &[]);
        unmarshaller.skip(FIXED_HEADER_LEN)?;
        unmarshaller.get_u32()?;
        unmarshaller.get_u32()?;

        let fields_value = unmarshaller.unmarshal(Signature::new_const(b"a(yv)"))?;
        let Value::Array { values: fields, .. } = fields_value else {
            unreachable!("a(yv) always unmarshals to Value::Array");
        };

        for field in fields {
            let Value::Struct(parts) = field else { continue };
            let mut parts = parts.into_iter();

            if let (Some(Value::Byte(code)), Some(Value::Variant(value, _))) = (parts.next(), parts.next()) {
                if HeaderField::new(code) == HeaderField::UNIX_FDS {
                    if let Value::UInt32(count) = *value {
                        return Ok(count);
                    }
                }
            }
        }

        Ok(0)
    }

    /// Decode one full message out of `data`, which must contain exactly one
    /// complete frame as sized by [`Message::required_len`].
    pub(crate) fn decode(data: &[u8], fds: &[RawFd]) -> Result<Message> {
        if data.len() < FIXED_HEADER_LEN + 4 {
            return Err(Error::new(ErrorKind::Truncated));
        }

        let endianness = Endianness::new(data[0]);
        let message_type = MessageType::new(data[1]);
        let flags = Flags::from_bits_truncate(data[2]);

        let mut unmarshaller = Unmarshaller::new(endianness, data, fds);
        unmarshaller.skip(FIXED_HEADER_LEN)?;
        let body_length = unmarshaller.get_u32()?;
        let serial = Serial::from_wire(unmarshaller.get_u32()?)?;

        let fields_value = unmarshaller.unmarshal(Signature::new_const(b"a(yv)"))?;
        let Value::Array { values: fields, .. } = fields_value else {
            unreachable!("a(yv) always unmarshals to Value::Array");
        };

        let mut message = Message::new(message_type);
        message.flags = flags;
        message.serial = serial;
        let mut body_signature = SignatureBuf::empty();

        for field in fields {
            let Value::Struct(parts) = field else {
                return Err(Error::new(ErrorKind::SignatureMismatch));
            };

            let mut parts = parts.into_iter();
            let (Some(Value::Byte(code)), Some(Value::Variant(value, _)), None) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::new(ErrorKind::SignatureMismatch));
            };

            apply_header_field(&mut message, &mut body_signature, HeaderField::new(code), *value)?;
        }

        unmarshaller.align_to(8)?;
        let body_start = unmarshaller.offset();
        let body_end = body_start + body_length as usize;

        if body_end > data.len() {
            return Err(Error::new(ErrorKind::Truncated));
        }

        message.body = codec::unmarshal_body(
            endianness,
            body_signature.as_signature(),
            &data[body_start..body_end],
            fds,
        )?;

        Ok(message)
    }
}

fn header_field(code: HeaderField, value: Value) -> Value {
    let signature = value.signature();
    Value::Struct(vec![
        Value::Byte(code.into_inner()),
        Value::Variant(Box::new(value), signature),
    ])
}

fn apply_header_field(
    message: &mut Message,
    body_signature: &mut SignatureBuf,
    code: HeaderField,
    value: Value,
) -> Result<()> {
    match (code, value) {
        (HeaderField::PATH, Value::ObjectPath(v)) => message.path = Some(v),
        (HeaderField::INTERFACE, Value::String(v)) => message.interface = Some(v),
        (HeaderField::MEMBER, Value::String(v)) => message.member = Some(v),
        (HeaderField::ERROR_NAME, Value::String(v)) => message.error_name = Some(v),
        (HeaderField::REPLY_SERIAL, Value::UInt32(v)) => {
            message.reply_serial = Some(Serial::from_wire(v)?);
        }
        (HeaderField::DESTINATION, Value::String(v)) => message.destination = Some(v),
        (HeaderField::SENDER, Value::String(v)) => message.sender = Some(v),
        (HeaderField::SIGNATURE, Value::Signature(v)) => *body_signature = v,
        (HeaderField::UNIX_FDS, Value::UInt32(_)) => {}
        _ => return Err(Error::new(ErrorKind::SignatureMismatch)),
    }

    Ok(())
}
