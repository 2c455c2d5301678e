//! Client-side proxies synthesised from a remote object's introspection XML.

use std::collections::BTreeMap;

use oxidbus_xml::Node;
use tokio::sync::mpsc;

use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result};
use crate::message::Message;
use crate::object_path::ObjectPathBuf;
use crate::router::MatchRule;
use crate::value::Value;

const INTROSPECTABLE: &str = "org.freedesktop.DBus.Introspectable";
const PROPERTIES: &str = "org.freedesktop.DBus.Properties";

/// Fetches introspection XML from remote objects and builds [`ProxyObject`]s
/// from it.
pub struct ProxyFactory {
    connection: Connection,
}

impl ProxyFactory {
    /// Build a factory bound to an existing connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Fetch `path`'s introspection XML from `destination` and construct a
    /// [`ProxyObject`] for it.
    pub async fn get_proxy_object(
        &self,
        destination: impl Into<String>,
        path: ObjectPathBuf,
    ) -> Result<ProxyObject> {
        let destination = destination.into();

        let call = Message::method_call(path.clone(), "Introspect")
            .with_interface(INTROSPECTABLE)
            .with_destination(destination.clone());
        let reply = self.connection.call(call).await?;

        let xml = match reply.body.first() {
            Some(Value::String(xml)) => xml.clone(),
            _ => {
                return Err(Error::new(ErrorKind::InvalidArgs(
                    "Introspect reply did not carry an XML string".to_owned(),
                )))
            }
        };

        let node = oxidbus_xml::parse_node(&xml)
            .map_err(|error| Error::new(ErrorKind::InvalidArgs(format!("invalid introspection xml: {error}"))))?;

        Ok(ProxyObject {
            connection: self.connection.clone(),
            destination,
            path,
            node,
        })
    }
}

/// A client-side view of a remote object, built from introspection XML.
pub struct ProxyObject {
    connection: Connection,
    destination: String,
    path: ObjectPathBuf,
    node: Node,
}

impl ProxyObject {
    /// The destination bus name this proxy talks to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// The remote object path.
    pub fn path(&self) -> &ObjectPathBuf {
        &self.path
    }

    /// The parsed introspection node backing this proxy.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn find_method(&self, interface: &str, method: &str) -> Result<&oxidbus_xml::Method> {
        self.node
            .interfaces
            .iter()
            .find(|iface| iface.name == interface)
            .and_then(|iface| iface.methods.iter().find(|m| m.name == method))
            .ok_or_else(|| Error::new(ErrorKind::UnknownMethod(method.to_owned())))
    }

    /// Call a method declared on `interface`, marshalling `args` per the
    /// method's declared `in` arguments and unmarshalling the reply per its
    /// declared `out` arguments.
    pub async fn call(&self, interface: &str, method: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let declared = self.find_method(interface, method)?;
        check_signature(&args, declared.in_signature().as_str())?;

        let message = Message::method_call(self.path.clone(), method)
            .with_interface(interface)
            .with_destination(self.destination.clone())
            .with_body(args);

        let reply = self.connection.call(message).await?;
        Ok(reply.body)
    }

    /// Read a property through `org.freedesktop.DBus.Properties.Get`.
    pub async fn get_property(&self, interface: &str, property: &str) -> Result<Value> {
        let message = Message::method_call(self.path.clone(), "Get")
            .with_interface(PROPERTIES)
            .with_destination(self.destination.clone())
            .with_body(vec![Value::from(interface), Value::from(property)]);
        let reply = self.connection.call(message).await?;

        match reply.body.into_iter().next() {
            Some(Value::Variant(value, _)) => Ok(*value),
            _ => Err(Error::new(ErrorKind::InvalidArgs(
                "Get reply did not carry a variant".to_owned(),
            ))),
        }
    }

    /// Write a property through `org.freedesktop.DBus.Properties.Set`.
    pub async fn set_property(&self, interface: &str, property: &str, value: Value) -> Result<()> {
        let signature = value.signature();
        let message = Message::method_call(self.path.clone(), "Set")
            .with_interface(PROPERTIES)
            .with_destination(self.destination.clone())
            .with_body(vec![
                Value::from(interface),
                Value::from(property),
                Value::Variant(Box::new(value), signature),
            ]);
        self.connection.call(message).await?;
        Ok(())
    }

    /// Read every property on `interface` through
    /// `org.freedesktop.DBus.Properties.GetAll`.
    pub async fn get_all_properties(&self, interface: &str) -> Result<BTreeMap<String, Value>> {
        let message = Message::method_call(self.path.clone(), "GetAll")
            .with_interface(PROPERTIES)
            .with_destination(self.destination.clone())
            .with_body(vec![Value::from(interface)]);
        let reply = self.connection.call(message).await?;

        let Some(Value::Dict { entries, .. }) = reply.body.into_iter().next() else {
            return Err(Error::new(ErrorKind::InvalidArgs(
                "GetAll reply did not carry a dict".to_owned(),
            )));
        };

        let mut out = BTreeMap::new();

        for (key, value) in entries {
            let crate::value::BasicValue::String(name) = key else {
                continue;
            };

            let value = match value {
                Value::Variant(value, _) => *value,
                other => other,
            };

            out.insert(name, value);
        }

        Ok(out)
    }

    /// Subscribe to `member` on `interface`, as emitted by this specific
    /// object. Installs a `MatchRule` for (sender, path, interface) and
    /// filters by member name locally, since match rules do not index on
    /// member alone reliably across all daemons.
    pub async fn receive_signal(&self, interface: &str, member: &str) -> Result<mpsc::UnboundedReceiver<Message>> {
        let rule = MatchRule::signals()
            .with_sender(self.destination.clone())
            .with_path(self.path.clone())
            .with_interface(interface.to_owned());

        let mut raw = self.connection.add_match(rule).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let member = member.to_owned();

        tokio::spawn(async move {
            while let Some(message) = raw.recv().await {
                if message.member.as_deref() == Some(member.as_str()) && tx.send(message).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

/// Check that the concatenated signatures of `args` match `expected`,
/// catching argument mismatches locally instead of only learning about them
/// from an `InvalidArgs` reply from the remote object.
fn check_signature(args: &[Value], expected: &str) -> Result<()> {
    let mut actual = String::new();

    for value in args {
        actual.push_str(value.signature().as_str());
    }

    if actual != expected {
        return Err(Error::new(ErrorKind::InvalidArgs(format!(
            "expected signature {expected:?}, got {actual:?}"
        ))));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_signature_accepts_matching_args() {
        let args = vec![Value::from(1u32), Value::from("x")];
        assert!(check_signature(&args, "us").is_ok());
    }

    #[test]
    fn check_signature_rejects_mismatched_args() {
        let args = vec![Value::from(1u32)];
        let error = check_signature(&args, "us").unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::InvalidArgs(_)));
    }

    #[test]
    fn check_signature_accepts_empty_args_for_empty_signature() {
        assert!(check_signature(&[], "").is_ok());
    }
}
