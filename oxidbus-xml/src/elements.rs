use oxidbus_core::signature::SignatureBuf;

/// A parsed `<node>` element: the root of an introspection document, or one
/// of its child node stubs.
#[derive(Debug, Default, Clone)]
pub struct Node {
    /// The node's own name, relative to its parent. Absent for the root.
    pub name: Option<String>,
    /// Interfaces declared directly on this node.
    pub interfaces: Vec<Interface>,
    /// Child node stubs. The daemon and most peers only advertise the name
    /// of children, with an empty interface list, to avoid recursive
    /// introspection.
    pub children: Vec<Node>,
}

/// A single interface within a node.
#[derive(Debug, Clone)]
pub struct Interface {
    /// The interface name, e.g. `org.freedesktop.DBus.Properties`.
    pub name: String,
    /// Methods declared on this interface.
    pub methods: Vec<Method>,
    /// Properties declared on this interface.
    pub properties: Vec<Property>,
    /// Signals declared on this interface.
    pub signals: Vec<Signal>,
    /// Annotations attached directly to the interface element.
    pub annotations: Vec<Annotation>,
}

/// The direction of a method argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// An input (`in`) argument.
    In,
    /// An output (`out`) argument.
    Out,
}

/// A method or signal argument.
#[derive(Debug, Clone)]
pub struct Arg {
    /// The argument's name, if given. Unnamed arguments are common.
    pub name: Option<String>,
    /// The argument's single complete type.
    pub ty: SignatureBuf,
    /// The argument's direction. Signal arguments are always implicitly
    /// `out` and the attribute may be omitted.
    pub direction: Direction,
}

/// A method declaration.
#[derive(Debug, Clone)]
pub struct Method {
    /// The method's wire name.
    pub name: String,
    /// Arguments, in declaration order.
    pub args: Vec<Arg>,
    /// Annotations attached to the method element.
    pub annotations: Vec<Annotation>,
}

impl Method {
    /// The concatenated signature of this method's `in` arguments.
    pub fn in_signature(&self) -> SignatureBuf {
        concat_signature(self.args.iter().filter(|a| a.direction == Direction::In))
    }

    /// The concatenated signature of this method's `out` arguments.
    pub fn out_signature(&self) -> SignatureBuf {
        concat_signature(self.args.iter().filter(|a| a.direction == Direction::Out))
    }
}

/// A signal declaration.
#[derive(Debug, Clone)]
pub struct Signal {
    /// The signal's wire name.
    pub name: String,
    /// Arguments, always conceptually `out`.
    pub args: Vec<Arg>,
    /// Annotations attached to the signal element.
    pub annotations: Vec<Annotation>,
}

impl Signal {
    /// The concatenated signature of this signal's arguments.
    pub fn signature(&self) -> SignatureBuf {
        concat_signature(self.args.iter())
    }
}

/// Read/write access for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable only.
    Read,
    /// Writable only.
    Write,
    /// Readable and writable.
    ReadWrite,
}

/// A property declaration.
#[derive(Debug, Clone)]
pub struct Property {
    /// The property's wire name.
    pub name: String,
    /// The property's single complete type.
    pub ty: SignatureBuf,
    /// The declared access mode.
    pub access: Access,
    /// Annotations attached to the property element, notably
    /// `org.freedesktop.DBus.Property.EmitsChangedSignal`.
    pub annotations: Vec<Annotation>,
}

/// A free-form `<annotation name="..." value="..."/>` element.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// The annotation name.
    pub name: String,
    /// The annotation's string value.
    pub value: String,
}

fn concat_signature<'a>(args: impl Iterator<Item = &'a Arg>) -> SignatureBuf {
    let mut out = String::new();

    for arg in args {
        out.push_str(arg.ty.as_str());
    }

    // Concatenations of individually-valid single complete types are
    // themselves always a valid (possibly multi-type) signature.
    SignatureBuf::new(out).expect("concatenation of valid single complete types")
}
