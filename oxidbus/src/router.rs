//! Routes inbound method calls to exported objects and implements the
//! standard `org.freedesktop.DBus.{Peer,Introspectable,Properties,
//! ObjectManager}` interfaces.

use std::collections::BTreeMap;

use oxidbus_core::signature::SignatureBuf;
use oxidbus_xml::{self, Access, Annotation, Arg, Direction, Interface, Node};

use crate::error::{Error, ErrorKind, Result};
use crate::interface::{EmitsChanged, InterfaceModel, PropertyAccess};
use crate::message::Message;
use crate::object_path::{ObjectPath, ObjectPathBuf};
use crate::proto::MessageType;
use crate::value::{BasicValue, Value};

const PEER: &str = "org.freedesktop.DBus.Peer";
const INTROSPECTABLE: &str = "org.freedesktop.DBus.Introspectable";
const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
const OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";

/// A predicate registered with the bus so matching signals are delivered
/// locally. Every `Some` field must match for the rule to match a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRule {
    /// Restrict to a message type.
    pub message_type: Option<MessageType>,
    /// Restrict to a sending unique or well-known name.
    pub sender: Option<String>,
    /// Restrict to an interface.
    pub interface: Option<String>,
    /// Restrict to a member name.
    pub member: Option<String>,
    /// Restrict to an exact object path.
    pub path: Option<ObjectPathBuf>,
    /// Restrict to a path or any of its descendants.
    pub path_namespace: Option<ObjectPathBuf>,
    /// Restrict to a destination.
    pub destination: Option<String>,
    /// Restrict individual string body arguments by index (`arg0`..`arg63`).
    pub args: BTreeMap<u8, String>,
    /// Restrict the first body argument to this value or a dot-separated
    /// namespace under it (`arg0namespace`).
    pub arg0namespace: Option<String>,
}

impl MatchRule {
    /// An empty rule, matching every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to signals.
    pub fn signals() -> Self {
        Self {
            message_type: Some(MessageType::SIGNAL),
            ..Self::default()
        }
    }

    /// Restrict to this sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Restrict to this interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Restrict to this member.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    /// Restrict to this exact path.
    pub fn with_path(mut self, path: ObjectPathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Restrict the first body argument to this value or a dot-separated
    /// namespace under it.
    pub fn with_arg0_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.arg0namespace = Some(namespace.into());
        self
    }

    /// Whether `message` satisfies every field set on this rule.
    pub(crate) fn matches(&self, message: &Message) -> bool {
        if let Some(message_type) = self.message_type {
            if message.message_type != message_type {
                return false;
            }
        }

        if let Some(sender) = &self.sender {
            if message.sender.as_deref() != Some(sender.as_str()) {
                return false;
            }
        }

        if let Some(interface) = &self.interface {
            if message.interface.as_deref() != Some(interface.as_str()) {
                return false;
            }
        }

        if let Some(member) = &self.member {
            if message.member.as_deref() != Some(member.as_str()) {
                return false;
            }
        }

        if let Some(path) = &self.path {
            if message.path.as_deref() != Some(path.as_ref()) {
                return false;
            }
        }

        if let Some(namespace) = &self.path_namespace {
            match &message.path {
                Some(path) if path.as_ref() == namespace.as_ref() || namespace.is_strict_prefix_of(path) => {}
                _ => return false,
            }
        }

        if let Some(destination) = &self.destination {
            if message.destination.as_deref() != Some(destination.as_str()) {
                return false;
            }
        }

        for (&index, expected) in &self.args {
            match message.body.get(index as usize) {
                Some(Value::String(actual)) if actual == expected => {}
                _ => return false,
            }
        }

        if let Some(namespace) = &self.arg0namespace {
            match message.body.first() {
                Some(Value::String(actual)) if arg0_in_namespace(actual, namespace) => {}
                _ => return false,
            }
        }

        true
    }
}

/// The export table plus the standard-interface implementations layered
/// over it.
#[derive(Default)]
pub struct ServiceRouter {
    objects: BTreeMap<ObjectPathBuf, BTreeMap<String, InterfaceModel>>,
}

/// The result of routing one inbound `METHOD_CALL`.
pub(crate) struct Dispatched {
    /// The reply to send back, if the caller wants one.
    pub(crate) reply: Message,
    /// Any additional signals raised as a side effect (e.g.
    /// `PropertiesChanged`).
    pub(crate) signals: Vec<Message>,
}

impl ServiceRouter {
    /// An empty router with no exported objects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `interface` on `path`, replacing any existing interface of
    /// the same name at that path.
    pub fn export(&mut self, path: ObjectPathBuf, interface: InterfaceModel) {
        self.objects.entry(path).or_default().insert(interface.name.clone(), interface);
    }

    /// Unexport `interface_name` at `path`, or every interface at `path`
    /// when `interface_name` is `None`. Returns the names of the
    /// interfaces actually removed, for `InterfacesRemoved`.
    pub fn unexport(&mut self, path: &ObjectPath, interface_name: Option<&str>) -> Vec<String> {
        let Some(interfaces) = self.objects.get_mut(path) else {
            return Vec::new();
        };

        let removed = match interface_name {
            Some(name) => interfaces.remove(name).map(|interface| vec![interface.name]).unwrap_or_default(),
            None => {
                let names = interfaces.values().map(|interface| interface.name.clone()).collect();
                interfaces.clear();
                names
            }
        };

        if interfaces.is_empty() {
            self.objects.remove(path);
        }

        removed
    }

    fn resolve_interface(&self, path: &ObjectPath, member: &str) -> std::result::Result<String, ErrorKind> {
        let mut candidates = Vec::new();

        if member == "Ping" || member == "GetMachineId" {
            candidates.push(PEER.to_owned());
        }

        if member == "Introspect" {
            candidates.push(INTROSPECTABLE.to_owned());
        }

        if member == "Get" || member == "Set" || member == "GetAll" {
            candidates.push(PROPERTIES.to_owned());
        }

        if member == "GetManagedObjects" {
            candidates.push(OBJECT_MANAGER.to_owned());
        }

        if let Some(interfaces) = self.objects.get(path) {
            for interface in interfaces.values() {
                if interface.has_member(member) {
                    candidates.push(interface.name.clone());
                }
            }
        }

        candidates.dedup();

        match candidates.len() {
            0 => Err(ErrorKind::UnknownMethod(member.to_owned())),
            1 => Ok(candidates.remove(0)),
            _ => Err(ErrorKind::InvalidArgs(format!(
                "ambiguous method {member:?}: matches {} interfaces",
                candidates.len()
            ))),
        }
    }

    /// Route one inbound method call, producing the reply to send and any
    /// signals raised as a side effect.
    pub(crate) async fn dispatch(&self, call: &Message) -> Dispatched {
        let Some(path) = &call.path else {
            return Dispatched {
                reply: call.error_return(
                    "org.freedesktop.DBus.Error.InvalidArgs",
                    "method call carries no path",
                ),
                signals: Vec::new(),
            };
        };

        let member = call.member.as_deref().unwrap_or_default();

        let interface_name = match &call.interface {
            Some(interface) => interface.clone(),
            None => match self.resolve_interface(path, member) {
                Ok(name) => name,
                Err(kind) => {
                    return Dispatched {
                        reply: call.error_return(kind.dbus_name(), kind.to_string()),
                        signals: Vec::new(),
                    }
                }
            },
        };

        let result = match interface_name.as_str() {
            PEER => self.dispatch_peer(call, member),
            INTROSPECTABLE if member == "Introspect" => Ok((self.introspect(path), Vec::new())),
            PROPERTIES => self.dispatch_properties(call, path).await,
            OBJECT_MANAGER if member == "GetManagedObjects" => {
                Ok((self.get_managed_objects(path).await, Vec::new()))
            }
            _ => self.dispatch_user(call, path, &interface_name, member).await,
        };

        match result {
            Ok((body, signals)) => Dispatched {
                reply: call.method_return(body),
                signals,
            },
            Err(error) => Dispatched {
                reply: call.error_return(error.kind().dbus_name(), error.to_string()),
                signals: Vec::new(),
            },
        }
    }

    fn dispatch_peer(&self, _call: &Message, member: &str) -> Result<(Vec<Value>, Vec<Message>)> {
        match member {
            "Ping" => Ok((Vec::new(), Vec::new())),
            "GetMachineId" => {
                let id = std::fs::read_to_string("/etc/machine-id")
                    .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
                    .unwrap_or_default();
                Ok((vec![Value::from(id.trim())], Vec::new()))
            }
            _ => Err(Error::new(ErrorKind::UnknownMethod(member.to_owned()))),
        }
    }

    async fn dispatch_properties(&self, call: &Message, path: &ObjectPath) -> Result<(Vec<Value>, Vec<Message>)> {
        let member = call.member.as_deref().unwrap_or_default();

        match member {
            "Get" => {
                let (interface_name, property_name) = get_args(&call.body)?;
                let property = self.lookup_property(path, &interface_name, &property_name)?;

                if !property.access.readable() {
                    return Err(Error::new(ErrorKind::PropertyWriteOnly(property_name)));
                }

                let getter = property.getter.as_ref().expect("readable property has a getter");
                let value = getter().await?;
                let signature = value.signature();
                Ok((vec![Value::Variant(Box::new(value), signature)], Vec::new()))
            }
            "Set" => {
                let (interface_name, property_name, variant) = set_args(&call.body)?;
                let interfaces = self
                    .objects
                    .get(path)
                    .ok_or_else(|| Error::new(ErrorKind::UnknownObject(path.as_str().to_owned())))?;
                let interface = interfaces
                    .get(&interface_name)
                    .ok_or_else(|| Error::new(ErrorKind::UnknownInterface(interface_name.clone())))?;
                let property = interface
                    .property(&property_name)
                    .ok_or_else(|| Error::new(ErrorKind::InvalidArgs(property_name.clone())))?;

                if !property.access.writable() || property.emits_changed == EmitsChanged::Const {
                    return Err(Error::new(ErrorKind::PropertyReadOnly(property_name)));
                }

                let setter = property.setter.as_ref().expect("writable property has a setter");
                setter(variant.clone()).await?;

                let mut signals = Vec::new();

                if property.emits_changed != EmitsChanged::False {
                    let mut changed = BTreeMap::new();
                    let mut invalidated = Vec::new();

                    if property.emits_changed == EmitsChanged::Invalidates {
                        invalidated.push(Value::from(property_name.clone()));
                    } else {
                        let signature = variant.signature();
                        changed.insert(
                            BasicValue::String(property_name.clone()),
                            Value::Variant(Box::new(variant), signature),
                        );
                    }

                    let body = vec![
                        Value::from(interface_name.clone()),
                        Value::Dict {
                            key_signature: SignatureBuf::new("s").unwrap(),
                            value_signature: SignatureBuf::new("v").unwrap(),
                            entries: changed,
                        },
                        Value::Array {
                            element_signature: SignatureBuf::new("s").unwrap(),
                            values: invalidated,
                        },
                    ];

                    signals.push(
                        Message::signal(path.to_owned(), PROPERTIES, "PropertiesChanged").with_body(body),
                    );
                }

                Ok((Vec::new(), signals))
            }
            "GetAll" => {
                let interface_name = match call.body.first() {
                    Some(Value::String(name)) => name.clone(),
                    _ => return Err(Error::new(ErrorKind::InvalidArgs("GetAll expects (s)".to_owned()))),
                };
                let interfaces = self
                    .objects
                    .get(path)
                    .ok_or_else(|| Error::new(ErrorKind::UnknownObject(path.as_str().to_owned())))?;
                let interface = interfaces
                    .get(&interface_name)
                    .ok_or_else(|| Error::new(ErrorKind::UnknownInterface(interface_name.clone())))?;

                let mut entries = BTreeMap::new();

                for property in &interface.properties {
                    if property.disabled || !property.access.readable() {
                        continue;
                    }

                    let getter = property.getter.as_ref().expect("readable property has a getter");
                    let value = getter().await?;
                    let signature = value.signature();
                    entries.insert(
                        BasicValue::String(property.name.clone()),
                        Value::Variant(Box::new(value), signature),
                    );
                }

                Ok((
                    vec![Value::Dict {
                        key_signature: SignatureBuf::new("s").unwrap(),
                        value_signature: SignatureBuf::new("v").unwrap(),
                        entries,
                    }],
                    Vec::new(),
                ))
            }
            _ => Err(Error::new(ErrorKind::UnknownMethod(member.to_owned()))),
        }
    }

    fn lookup_property<'a>(
        &'a self,
        path: &ObjectPath,
        interface_name: &str,
        property_name: &str,
    ) -> Result<&'a crate::interface::Property> {
        let interfaces = self
            .objects
            .get(path)
            .ok_or_else(|| Error::new(ErrorKind::UnknownObject(path.as_str().to_owned())))?;
        let interface = interfaces
            .get(interface_name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownInterface(interface_name.to_owned())))?;
        interface
            .property(property_name)
            .ok_or_else(|| Error::new(ErrorKind::InvalidArgs(property_name.to_owned())))
    }

    async fn dispatch_user(
        &self,
        call: &Message,
        path: &ObjectPath,
        interface_name: &str,
        member: &str,
    ) -> Result<(Vec<Value>, Vec<Message>)> {
        let interfaces = self
            .objects
            .get(path)
            .ok_or_else(|| Error::new(ErrorKind::UnknownObject(path.as_str().to_owned())))?;
        let interface = interfaces
            .get(interface_name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownInterface(interface_name.to_owned())))?;
        let method = interface
            .method(member)
            .ok_or_else(|| Error::new(ErrorKind::UnknownMethod(member.to_owned())))?;

        let actual_signature = call.signature();

        if actual_signature.as_str() != method.in_signature.as_str() {
            return Err(Error::new(ErrorKind::InvalidArgs(format!(
                "expected signature {:?}, got {:?}",
                method.in_signature.as_str(),
                actual_signature.as_str()
            ))));
        }

        let body = (method.handler)(call.body.clone()).await?;
        Ok((body, Vec::new()))
    }

    fn introspect(&self, path: &ObjectPath) -> Vec<Value> {
        let mut node = Node {
            name: None,
            interfaces: Vec::new(),
            children: Vec::new(),
        };

        if let Some(interfaces) = self.objects.get(path) {
            for interface in interfaces.values() {
                node.interfaces.push(to_xml_interface(interface));
            }
        }

        node.interfaces.push(standard_interface(PEER));
        node.interfaces.push(standard_interface(INTROSPECTABLE));
        node.interfaces.push(standard_interface(PROPERTIES));
        node.interfaces.push(standard_interface(OBJECT_MANAGER));

        let mut seen_children = std::collections::BTreeSet::new();

        for candidate in self.objects.keys() {
            if let Some(child) = path.immediate_child(candidate) {
                if seen_children.insert(child.to_owned()) {
                    node.children.push(oxidbus_xml::Node {
                        name: Some(child.to_owned()),
                        interfaces: Vec::new(),
                        children: Vec::new(),
                    });
                }
            }
        }

        vec![Value::from(oxidbus_xml::write_node(&node))]
    }

    async fn get_managed_objects(&self, root: &ObjectPath) -> Vec<Value> {
        let mut objects = BTreeMap::new();

        for (path, interfaces) in &self.objects {
            if path.as_ref() != root && !root.is_strict_prefix_of(path) {
                continue;
            }

            let mut by_interface = BTreeMap::new();

            for interface in interfaces.values() {
                by_interface.insert(
                    BasicValue::String(interface.name.clone()),
                    interface_properties(interface).await,
                );
            }

            objects.insert(
                BasicValue::ObjectPath(path.clone()),
                Value::Dict {
                    key_signature: SignatureBuf::new("s").unwrap(),
                    value_signature: SignatureBuf::new("a{sv}").unwrap(),
                    entries: by_interface,
                },
            );
        }

        vec![Value::Dict {
            key_signature: SignatureBuf::new("o").unwrap(),
            value_signature: SignatureBuf::new("a{sa{sv}}").unwrap(),
            entries: objects,
        }]
    }
}

/// Whether `actual` equals `namespace` or is a dot-separated child of it
/// (`arg0namespace` semantics: `com.example.Backend` matches itself and
/// `com.example.Backend.Foo`, not `com.example.Backend2`).
fn arg0_in_namespace(actual: &str, namespace: &str) -> bool {
    actual == namespace
        || (actual.starts_with(namespace) && actual.as_bytes().get(namespace.len()) == Some(&b'.'))
}

/// Build the `a{sv}` properties snapshot for one interface, shared between
/// `GetManagedObjects` and the `InterfacesAdded` signal body.
async fn interface_properties(interface: &InterfaceModel) -> Value {
    let mut props = BTreeMap::new();

    for property in &interface.properties {
        if property.disabled || !property.access.readable() {
            continue;
        }

        let getter = property.getter.as_ref().expect("readable property has a getter");
        let value = match getter().await {
            Ok(value) => value,
            Err(_) => continue,
        };
        let signature = value.signature();
        props.insert(
            BasicValue::String(property.name.clone()),
            Value::Variant(Box::new(value), signature),
        );
    }

    Value::Dict {
        key_signature: SignatureBuf::new("s").unwrap(),
        value_signature: SignatureBuf::new("v").unwrap(),
        entries: props,
    }
}

/// Build `org.freedesktop.DBus.ObjectManager.InterfacesAdded` for one
/// newly-exported interface at `path`.
pub(crate) async fn interfaces_added_message(path: &ObjectPath, interface: &InterfaceModel) -> Message {
    let mut entries = BTreeMap::new();
    entries.insert(BasicValue::String(interface.name.clone()), interface_properties(interface).await);

    let body = vec![
        Value::ObjectPath(path.to_owned()),
        Value::Dict {
            key_signature: SignatureBuf::new("s").unwrap(),
            value_signature: SignatureBuf::new("a{sv}").unwrap(),
            entries,
        },
    ];

    Message::signal(path.to_owned(), OBJECT_MANAGER, "InterfacesAdded").with_body(body)
}

/// Build `org.freedesktop.DBus.ObjectManager.InterfacesRemoved` for the
/// given interface names no longer exported at `path`.
pub(crate) fn interfaces_removed_message(path: &ObjectPath, interface_names: Vec<String>) -> Message {
    let body = vec![
        Value::ObjectPath(path.to_owned()),
        Value::Array {
            element_signature: SignatureBuf::new("s").unwrap(),
            values: interface_names.into_iter().map(Value::from).collect(),
        },
    ];

    Message::signal(path.to_owned(), OBJECT_MANAGER, "InterfacesRemoved").with_body(body)
}

fn get_args(body: &[Value]) -> Result<(String, String)> {
    match (body.first(), body.get(1)) {
        (Some(Value::String(interface)), Some(Value::String(property))) => {
            Ok((interface.clone(), property.clone()))
        }
        _ => Err(Error::new(ErrorKind::InvalidArgs("Get expects (ss)".to_owned()))),
    }
}

fn set_args(body: &[Value]) -> Result<(String, String, Value)> {
    match (body.first(), body.get(1), body.get(2)) {
        (Some(Value::String(interface)), Some(Value::String(property)), Some(Value::Variant(value, _))) => {
            Ok((interface.clone(), property.clone(), (**value).clone()))
        }
        _ => Err(Error::new(ErrorKind::InvalidArgs("Set expects (ssv)".to_owned()))),
    }
}

fn to_xml_interface(interface: &InterfaceModel) -> Interface {
    let mut methods = Vec::new();
    let mut properties = Vec::new();
    let mut signals = Vec::new();

    for method in &interface.methods {
        if method.disabled {
            continue;
        }

        let mut args = Vec::new();

        for sig in crate::codec::split_types(&method.in_signature) {
            args.push(Arg {
                name: None,
                ty: sig.to_owned(),
                direction: Direction::In,
            });
        }

        for sig in crate::codec::split_types(&method.out_signature) {
            args.push(Arg {
                name: None,
                ty: sig.to_owned(),
                direction: Direction::Out,
            });
        }

        methods.push(oxidbus_xml::Method {
            name: method.name.clone(),
            args,
            annotations: Vec::new(),
        });
    }

    for property in &interface.properties {
        if property.disabled {
            continue;
        }

        properties.push(oxidbus_xml::Property {
            name: property.name.clone(),
            ty: property.signature.clone(),
            access: match property.access {
                PropertyAccess::Read => Access::Read,
                PropertyAccess::Write => Access::Write,
                PropertyAccess::ReadWrite => Access::ReadWrite,
            },
            annotations: vec![Annotation {
                name: "org.freedesktop.DBus.Property.EmitsChangedSignal".to_owned(),
                value: match property.emits_changed {
                    EmitsChanged::True => "true".to_owned(),
                    EmitsChanged::Invalidates => "invalidates".to_owned(),
                    EmitsChanged::Const => "const".to_owned(),
                    EmitsChanged::False => "false".to_owned(),
                },
            }],
        });
    }

    for signal in &interface.signals {
        if signal.disabled {
            continue;
        }

        let args = crate::codec::split_types(&signal.signature)
            .into_iter()
            .map(|sig| Arg {
                name: None,
                ty: sig.to_owned(),
                direction: Direction::Out,
            })
            .collect();

        signals.push(oxidbus_xml::Signal {
            name: signal.name.clone(),
            args,
            annotations: Vec::new(),
        });
    }

    Interface {
        name: interface.name.clone(),
        methods,
        properties,
        signals,
        annotations: Vec::new(),
    }
}

fn standard_interface(name: &str) -> Interface {
    Interface {
        name: name.to_owned(),
        methods: Vec::new(),
        properties: Vec::new(),
        signals: Vec::new(),
        annotations: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{Method, Property};
    use crate::message::Message;

    fn test_path() -> ObjectPathBuf {
        ObjectPathBuf::new("/org/test/Object").unwrap()
    }

    #[test]
    fn arg0_namespace_matches_self_and_children_not_siblings() {
        assert!(arg0_in_namespace("com.example.Backend", "com.example.Backend"));
        assert!(arg0_in_namespace("com.example.Backend.Foo", "com.example.Backend"));
        assert!(!arg0_in_namespace("com.example.Backend2", "com.example.Backend"));
        assert!(!arg0_in_namespace("com.example", "com.example.Backend"));
    }

    #[test]
    fn match_rule_arg0_namespace_restricts_first_body_argument() {
        let rule = MatchRule::new().with_arg0_namespace("com.example.Backend");

        let matching = Message::signal(test_path(), "org.test.iface", "Changed")
            .with_body(vec![Value::from("com.example.Backend.Leaf")]);
        assert!(rule.matches(&matching));

        let sibling = Message::signal(test_path(), "org.test.iface", "Changed")
            .with_body(vec![Value::from("com.example.Backend2")]);
        assert!(!rule.matches(&sibling));

        let no_args = Message::signal(test_path(), "org.test.iface", "Changed");
        assert!(!rule.matches(&no_args));
    }

    fn echo_interface() -> InterfaceModel {
        InterfaceModel::new("org.test.iface").with_method(Method::new(
            "Echo",
            SignatureBuf::new("s").unwrap(),
            SignatureBuf::new("s").unwrap(),
            Box::new(|args| Box::pin(async move { Ok(args) })),
        ))
    }

    #[tokio::test]
    async fn echo_round_trips() {
        let mut router = ServiceRouter::new();
        router.export(test_path(), echo_interface());

        let call = Message::method_call(test_path(), "Echo")
            .with_interface("org.test.iface")
            .with_body(vec![Value::from("hello")]);

        let dispatched = router.dispatch(&call).await;
        assert_eq!(dispatched.reply.body, vec![Value::from("hello")]);
        assert!(dispatched.signals.is_empty());
    }

    #[tokio::test]
    async fn renamed_and_disabled_properties_round_trip_through_get_all() {
        let mut router = ServiceRouter::new();

        let interface = InterfaceModel::new("org.test.iface")
            .with_property(Property::read(
                "SomeProperty",
                SignatureBuf::new("s").unwrap(),
                Box::new(|| Box::pin(async { Ok(Value::from("SomeProperty")) })),
            ))
            .with_property(
                Property::read(
                    "DisabledProperty",
                    SignatureBuf::new("s").unwrap(),
                    Box::new(|| Box::pin(async { Ok(Value::from("unused")) })),
                )
                .disabled(),
            );
        router.export(test_path(), interface);

        let get_all = Message::method_call(test_path(), "GetAll")
            .with_interface(PROPERTIES)
            .with_body(vec![Value::from("org.test.iface")]);
        let dispatched = router.dispatch(&get_all).await;

        let Some(Value::Dict { entries, .. }) = dispatched.reply.body.into_iter().next() else {
            panic!("expected a dict reply");
        };
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key(&BasicValue::String("SomeProperty".to_owned())));

        let get_disabled = Message::method_call(test_path(), "Get")
            .with_interface(PROPERTIES)
            .with_body(vec![Value::from("org.test.iface"), Value::from("DisabledProperty")]);
        let dispatched = router.dispatch(&get_disabled).await;
        assert_eq!(
            dispatched.reply.error_name.as_deref(),
            Some("org.freedesktop.DBus.Error.InvalidArgs")
        );
    }

    #[tokio::test]
    async fn ambiguous_dispatch_with_empty_interface_fails() {
        let mut router = ServiceRouter::new();
        router.export(test_path(), echo_interface());
        router.export(
            test_path(),
            InterfaceModel::new("org.test.other").with_method(Method::new(
                "Echo",
                SignatureBuf::new("s").unwrap(),
                SignatureBuf::new("s").unwrap(),
                Box::new(|args| Box::pin(async move { Ok(args) })),
            )),
        );

        let call = Message::method_call(test_path(), "Echo").with_body(vec![Value::from("hi")]);
        let dispatched = router.dispatch(&call).await;
        assert_eq!(
            dispatched.reply.error_name.as_deref(),
            Some("org.freedesktop.DBus.Error.InvalidArgs")
        );
    }

    #[tokio::test]
    async fn unexport_reports_only_interfaces_actually_removed() {
        let mut router = ServiceRouter::new();
        router.export(test_path(), echo_interface());

        let removed = router.unexport(&test_path(), Some("org.test.other"));
        assert!(removed.is_empty());

        let removed = router.unexport(&test_path(), Some("org.test.iface"));
        assert_eq!(removed, vec!["org.test.iface".to_owned()]);
    }

    #[tokio::test]
    async fn interfaces_added_message_carries_path_and_properties() {
        let interface = InterfaceModel::new("org.test.iface").with_property(Property::read(
            "Value",
            SignatureBuf::new("s").unwrap(),
            Box::new(|| Box::pin(async { Ok(Value::from("hi")) })),
        ));

        let signal = interfaces_added_message(&test_path(), &interface).await;
        assert_eq!(signal.interface.as_deref(), Some(OBJECT_MANAGER));
        assert_eq!(signal.member.as_deref(), Some("InterfacesAdded"));

        let Some(Value::ObjectPath(path)) = signal.body.first() else {
            panic!("expected an object path as the first argument");
        };
        assert_eq!(path.as_str(), test_path().as_str());

        let Some(Value::Dict { entries, .. }) = signal.body.get(1) else {
            panic!("expected a dict as the second argument");
        };
        assert!(entries.contains_key(&BasicValue::String("org.test.iface".to_owned())));
    }

    #[test]
    fn interfaces_removed_message_carries_path_and_names() {
        let signal = interfaces_removed_message(&test_path(), vec!["org.test.iface".to_owned()]);
        assert_eq!(signal.interface.as_deref(), Some(OBJECT_MANAGER));
        assert_eq!(signal.member.as_deref(), Some("InterfacesRemoved"));

        let Some(Value::Array { values, .. }) = signal.body.get(1) else {
            panic!("expected an array as the second argument");
        };
        assert_eq!(values, &vec![Value::from("org.test.iface")]);
    }

    #[test]
    fn introspect_includes_standard_interfaces_but_not_disabled_methods() {
        let mut router = ServiceRouter::new();
        let interface = InterfaceModel::new("org.test.iface")
            .with_method(Method::new(
                "Visible",
                SignatureBuf::empty(),
                SignatureBuf::empty(),
                Box::new(|args| Box::pin(async move { Ok(args) })),
            ))
            .with_method(
                Method::new(
                    "Hidden",
                    SignatureBuf::empty(),
                    SignatureBuf::empty(),
                    Box::new(|args| Box::pin(async move { Ok(args) })),
                )
                .disabled(),
            );
        router.export(test_path(), interface);

        let Some(Value::String(xml)) = router.introspect(&test_path()).into_iter().next() else {
            panic!("expected introspection xml");
        };
        assert!(xml.contains("Visible"));
        assert!(!xml.contains("Hidden"));
        assert!(xml.contains(PEER));
        assert!(xml.contains(OBJECT_MANAGER));
    }
}
