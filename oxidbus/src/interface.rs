//! The declarative surface for exporting methods, properties, and signals
//! on an object path.

use std::future::Future;
use std::pin::Pin;

use oxidbus_core::signature::SignatureBuf;

use crate::error::{Error, Result};
use crate::value::Value;

/// A boxed, `Send + Sync` async method handler.
pub type MethodHandler =
    Box<dyn Fn(Vec<Value>) -> Pin<Box<dyn Future<Output = Result<Vec<Value>>> + Send>> + Send + Sync>;

/// A boxed, `Send + Sync` async property getter.
pub type PropertyGetter = Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// A boxed, `Send + Sync` async property setter.
pub type PropertySetter =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// One exported method.
pub struct Method {
    pub(crate) name: String,
    pub(crate) in_signature: SignatureBuf,
    pub(crate) out_signature: SignatureBuf,
    pub(crate) handler: MethodHandler,
    pub(crate) disabled: bool,
}

impl Method {
    /// Declare a method with the given wire `name`, argument signature, and
    /// return signature.
    pub fn new(
        name: impl Into<String>,
        in_signature: SignatureBuf,
        out_signature: SignatureBuf,
        handler: MethodHandler,
    ) -> Self {
        Self {
            name: name.into(),
            in_signature,
            out_signature,
            handler,
            disabled: false,
        }
    }

    /// Mark this method disabled: absent from introspection, rejected on
    /// invocation as if it never existed.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Read/write access for an exported property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    /// Readable only.
    Read,
    /// Writable only.
    Write,
    /// Readable and writable.
    ReadWrite,
}

impl PropertyAccess {
    pub(crate) fn readable(self) -> bool {
        matches!(self, PropertyAccess::Read | PropertyAccess::ReadWrite)
    }

    pub(crate) fn writable(self) -> bool {
        matches!(self, PropertyAccess::Write | PropertyAccess::ReadWrite)
    }
}

/// Whether a property emits `PropertiesChanged` when set through
/// `org.freedesktop.DBus.Properties.Set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitsChanged {
    /// The new value is included in the signal (the default).
    True,
    /// The signal is sent but carries no value, only an invalidation.
    Invalidates,
    /// The property never changes after the object is created.
    Const,
    /// No signal is ever emitted for this property.
    False,
}

/// One exported property.
pub struct Property {
    pub(crate) name: String,
    pub(crate) signature: SignatureBuf,
    pub(crate) access: PropertyAccess,
    pub(crate) getter: Option<PropertyGetter>,
    pub(crate) setter: Option<PropertySetter>,
    pub(crate) emits_changed: EmitsChanged,
    pub(crate) disabled: bool,
}

impl Property {
    /// Declare a read-only property.
    pub fn read(name: impl Into<String>, signature: SignatureBuf, getter: PropertyGetter) -> Self {
        Self {
            name: name.into(),
            signature,
            access: PropertyAccess::Read,
            getter: Some(getter),
            setter: None,
            emits_changed: EmitsChanged::True,
            disabled: false,
        }
    }

    /// Declare a read-write property.
    pub fn read_write(
        name: impl Into<String>,
        signature: SignatureBuf,
        getter: PropertyGetter,
        setter: PropertySetter,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            access: PropertyAccess::ReadWrite,
            getter: Some(getter),
            setter: Some(setter),
            emits_changed: EmitsChanged::True,
            disabled: false,
        }
    }

    /// Declare a write-only property.
    pub fn write(name: impl Into<String>, signature: SignatureBuf, setter: PropertySetter) -> Self {
        Self {
            name: name.into(),
            signature,
            access: PropertyAccess::Write,
            getter: None,
            setter: Some(setter),
            emits_changed: EmitsChanged::True,
            disabled: false,
        }
    }

    /// Override the `EmitsChangedSignal` annotation (defaults to `true`).
    pub fn emits_changed(mut self, emits_changed: EmitsChanged) -> Self {
        self.emits_changed = emits_changed;
        self
    }

    /// Mark this property disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// One exported signal.
pub struct Signal {
    pub(crate) name: String,
    pub(crate) signature: SignatureBuf,
    pub(crate) disabled: bool,
}

impl Signal {
    /// Declare a signal with the given wire name and argument signature.
    pub fn new(name: impl Into<String>, signature: SignatureBuf) -> Self {
        Self {
            name: name.into(),
            signature,
            disabled: false,
        }
    }

    /// Mark this signal disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// A declarative description of an interface's methods, properties, and
/// signals, bound to implementation identifiers but exposed on the wire
/// under their own (possibly renamed) names.
pub struct InterfaceModel {
    pub(crate) name: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) properties: Vec<Property>,
    pub(crate) signals: Vec<Signal>,
}

impl InterfaceModel {
    /// Declare a new, empty interface under the given interface name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            properties: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind a method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Bind a property.
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Bind a signal.
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    pub(crate) fn method(&self, name: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name && !method.disabled)
    }

    pub(crate) fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|property| property.name == name && !property.disabled)
    }

    pub(crate) fn has_member(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name && !m.disabled)
    }
}

/// Validate a D-Bus interface name: dot-separated alphanumeric/underscore
/// elements, at least two elements, no element starting with a digit.
pub(crate) fn validate_interface_name(name: &str) -> Result<()> {
    let elements: Vec<&str> = name.split('.').collect();

    if elements.len() < 2 || name.len() > 255 {
        return Err(invalid_interface(name));
    }

    for element in elements {
        if element.is_empty() {
            return Err(invalid_interface(name));
        }

        let mut chars = element.chars();
        let first = chars.next().unwrap();

        if first.is_ascii_digit() || !(first.is_ascii_alphanumeric() || first == '_') {
            return Err(invalid_interface(name));
        }

        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid_interface(name));
        }
    }

    Ok(())
}

fn invalid_interface(name: &str) -> Error {
    Error::new(crate::error::ErrorKind::InvalidInterfaceName(name.to_owned()))
}
