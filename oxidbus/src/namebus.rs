//! Bus-level operations against the daemon's own `org.freedesktop.DBus`
//! interface: `Hello`, `RequestName`, `ReleaseName`, and name queries.

use bitflags::bitflags;

use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result};
use crate::object_path::ObjectPathBuf;
use crate::value::Value;

/// Well-known destination, interface, and path of the bus daemon itself.
pub(crate) const DESTINATION: &str = "org.freedesktop.DBus";
pub(crate) const INTERFACE: &str = "org.freedesktop.DBus";

fn path() -> ObjectPathBuf {
    ObjectPathBuf::new("/org/freedesktop/DBus").expect("well-known path is valid")
}

bitflags! {
    /// Flags accepted by [`Connection::request_name`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RequestNameFlags: u32 {
        /// Allow another caller specifying `REPLACE_EXISTING` to take over
        /// ownership from us.
        const ALLOW_REPLACEMENT = 0x1;
        /// Replace the current owner, if it allowed replacement.
        const REPLACE_EXISTING = 0x2;
        /// Fail instead of queueing if the name already has an owner.
        const DO_NOT_QUEUE = 0x4;
    }
}

oxidbus_core::raw_enum! {
    /// The reply to a `RequestName` call.
    #[repr(u32)]
    pub enum RequestNameReply {
        /// The caller is now the primary owner of the name.
        PRIMARY_OWNER = 1,
        /// The name had an owner and the caller was queued.
        IN_QUEUE = 2,
        /// The name had an owner and `DO_NOT_QUEUE` was set.
        EXISTS = 3,
        /// The caller already owned the name.
        ALREADY_OWNER = 4,
    }
}

oxidbus_core::raw_enum! {
    /// The reply to a `ReleaseName` call.
    #[repr(u32)]
    pub enum ReleaseNameReply {
        /// The name was released.
        RELEASED = 1,
        /// The name had no owner.
        NON_EXISTENT = 2,
        /// The caller was not the owner.
        NOT_OWNER = 3,
    }
}

impl Connection {
    /// Call the daemon's `Hello` method, returning the unique name assigned
    /// to this connection. Must be the first call made after authenticating.
    pub(crate) async fn hello(&self) -> Result<String> {
        let message = crate::message::Message::method_call(path(), "Hello")
            .with_interface(INTERFACE)
            .with_destination(DESTINATION);
        let reply = self.call(message).await?;

        match reply.body.first() {
            Some(Value::String(name)) => Ok(name.clone()),
            _ => Err(Error::new(ErrorKind::InvalidArgs(
                "Hello reply did not carry a unique name".to_owned(),
            ))),
        }
    }

    /// Request ownership of a well-known bus name.
    pub async fn request_name(&self, name: impl Into<String>, flags: RequestNameFlags) -> Result<RequestNameReply> {
        let name = name.into();
        let message = crate::message::Message::method_call(path(), "RequestName")
            .with_interface(INTERFACE)
            .with_destination(DESTINATION)
            .with_body(vec![Value::from(name.clone()), Value::UInt32(flags.bits())]);
        let reply = self.call(message).await?;

        match reply.body.first() {
            Some(Value::UInt32(code)) => {
                let reply = RequestNameReply::new(*code);

                if reply == RequestNameReply::PRIMARY_OWNER || reply == RequestNameReply::ALREADY_OWNER {
                    self.owned_names.lock().unwrap().insert(name);
                }

                Ok(reply)
            }
            _ => Err(Error::new(ErrorKind::InvalidArgs(
                "RequestName reply did not carry a status code".to_owned(),
            ))),
        }
    }

    /// Release a previously requested well-known bus name.
    pub async fn release_name(&self, name: impl Into<String>) -> Result<ReleaseNameReply> {
        let name = name.into();
        let message = crate::message::Message::method_call(path(), "ReleaseName")
            .with_interface(INTERFACE)
            .with_destination(DESTINATION)
            .with_body(vec![Value::from(name.clone())]);
        let reply = self.call(message).await?;

        match reply.body.first() {
            Some(Value::UInt32(code)) => {
                let reply = ReleaseNameReply::new(*code);

                if reply == ReleaseNameReply::RELEASED {
                    self.owned_names.lock().unwrap().remove(&name);
                }

                Ok(reply)
            }
            _ => Err(Error::new(ErrorKind::InvalidArgs(
                "ReleaseName reply did not carry a status code".to_owned(),
            ))),
        }
    }

    /// The daemon's own unique identifier, constant for the lifetime of the
    /// bus (not to be confused with the machine id).
    pub async fn bus_id(&self) -> Result<String> {
        let message = crate::message::Message::method_call(path(), "GetId")
            .with_interface(INTERFACE)
            .with_destination(DESTINATION);
        let reply = self.call(message).await?;

        match reply.body.first() {
            Some(Value::String(id)) => Ok(id.clone()),
            _ => Err(Error::new(ErrorKind::InvalidArgs(
                "GetId reply did not carry an id".to_owned(),
            ))),
        }
    }

    /// List every name currently registered on the bus.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        let message = crate::message::Message::method_call(path(), "ListNames")
            .with_interface(INTERFACE)
            .with_destination(DESTINATION);
        let reply = self.call(message).await?;
        extract_names(&reply.body)
    }

    /// Whether `name` currently has an owner.
    pub async fn name_has_owner(&self, name: impl Into<String>) -> Result<bool> {
        let message = crate::message::Message::method_call(path(), "NameHasOwner")
            .with_interface(INTERFACE)
            .with_destination(DESTINATION)
            .with_body(vec![Value::from(name.into())]);
        let reply = self.call(message).await?;

        match reply.body.first() {
            Some(Value::Bool(has_owner)) => Ok(*has_owner),
            _ => Err(Error::new(ErrorKind::InvalidArgs(
                "NameHasOwner reply did not carry a boolean".to_owned(),
            ))),
        }
    }
}

fn extract_names(body: &[Value]) -> Result<Vec<String>> {
    match body.first() {
        Some(Value::Array { values, .. }) => values
            .iter()
            .map(|value| match value {
                Value::String(name) => Ok(name.clone()),
                _ => Err(Error::new(ErrorKind::InvalidArgs(
                    "ListNames reply carried a non-string entry".to_owned(),
                ))),
            })
            .collect(),
        _ => Err(Error::new(ErrorKind::InvalidArgs(
            "ListNames reply did not carry an array".to_owned(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidbus_core::signature::SignatureBuf;

    #[test]
    fn extract_names_collects_string_entries() {
        let body = vec![Value::Array {
            element_signature: SignatureBuf::new("s").unwrap(),
            values: vec![Value::from("org.a"), Value::from("org.b")],
        }];
        assert_eq!(extract_names(&body).unwrap(), vec!["org.a", "org.b"]);
    }

    #[test]
    fn extract_names_rejects_non_string_entries() {
        let body = vec![Value::Array {
            element_signature: SignatureBuf::new("u").unwrap(),
            values: vec![Value::from(1u32)],
        }];
        assert!(extract_names(&body).is_err());
    }

    #[test]
    fn extract_names_rejects_missing_array() {
        let body = vec![Value::from("not an array")];
        assert!(extract_names(&body).is_err());
    }

    #[test]
    fn request_name_flags_combine_as_bits() {
        let flags = RequestNameFlags::DO_NOT_QUEUE | RequestNameFlags::ALLOW_REPLACEMENT;
        assert_eq!(flags.bits(), 0x1 | 0x4);
    }

    #[test]
    fn request_name_reply_round_trips_wire_codes() {
        assert_eq!(RequestNameReply::new(1), RequestNameReply::PRIMARY_OWNER);
        assert_eq!(RequestNameReply::new(3), RequestNameReply::EXISTS);
    }
}
