use super::Message;
use crate::message::Serial;
use crate::proto::Endianness;
use crate::value::Value;
use crate::ObjectPathBuf;

use std::num::NonZeroU32;

fn serial(n: u32) -> Serial {
    Serial::new(NonZeroU32::new(n).unwrap())
}

#[test]
fn method_call_round_trips() {
    let message = Message::method_call(ObjectPathBuf::new("/org/test/Object").unwrap(), "Echo")
        .with_interface("org.test.iface")
        .with_destination("org.test.Service")
        .with_body(vec![Value::from("hello")]);

    let (bytes, fds) = message.encode(serial(7), Endianness::NATIVE).unwrap();
    assert!(fds.is_empty());

    let decoded = Message::decode(&bytes, &[]).unwrap();
    assert_eq!(decoded.serial, serial(7));
    assert_eq!(decoded.path.unwrap().as_str(), "/org/test/Object");
    assert_eq!(decoded.interface.as_deref(), Some("org.test.iface"));
    assert_eq!(decoded.member.as_deref(), Some("Echo"));
    assert_eq!(decoded.destination.as_deref(), Some("org.test.Service"));
    assert_eq!(decoded.body, vec![Value::from("hello")]);
}

#[test]
fn method_return_carries_reply_serial() {
    let call = Message::method_call(ObjectPathBuf::root(), "Ping");
    let reply = call.method_return(vec![Value::UInt32(42)]);

    let (bytes, _) = reply.encode(serial(9), Endianness::NATIVE).unwrap();
    let decoded = Message::decode(&bytes, &[]).unwrap();

    assert_eq!(decoded.reply_serial, Some(call.serial));
    assert_eq!(decoded.body, vec![Value::UInt32(42)]);
}

#[test]
fn required_len_matches_encoded_length() {
    let message = Message::signal(ObjectPathBuf::root(), "org.test.iface", "Changed")
        .with_body(vec![Value::from("a"), Value::UInt32(1)]);

    let (bytes, _) = message.encode(serial(1), Endianness::NATIVE).unwrap();
    assert_eq!(Message::required_len(&bytes[..16]).unwrap(), bytes.len());
}
