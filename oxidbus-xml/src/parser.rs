use oxidbus_core::signature::SignatureBuf;
use xmlparser::{ElementEnd, Token};

use crate::elements::{Access, Annotation, Arg, Direction, Interface, Method, Node, Property, Signal};
use crate::error::ErrorKind;
use crate::{Error, Result};

/// Parse an introspection document per the D-Bus Introspectable DTD.
///
/// Supports `node`, `interface`, `method`, `signal`, `property`, `arg`, and
/// `annotation` elements (`doc`/`summary`/`description` documentation
/// elements, if present, are skipped rather than rejected).
pub fn parse_node(xml: &str) -> Result<Node> {
    let tokenizer = xmlparser::Tokenizer::from(xml);

    let mut stack: Vec<State> = Vec::new();
    let mut path = String::new();
    let mut root = NodeBuilder::default();
    let mut skip_depth: Option<usize> = None;

    macro_rules! expect_end {
        ($end:expr, $expected:literal) => {
            if let Some(end) = $end {
                if end != $expected {
                    return Err(Error::new(
                        path.clone(),
                        ErrorKind::MismatchingEnd {
                            expected: $expected.into(),
                            actual: end.into(),
                        },
                    ));
                }
            }
        };
    }

    for token in tokenizer {
        let token = token.map_err(|e| Error::new(path.clone(), e))?;

        if let Some(depth) = skip_depth {
            match &token {
                Token::ElementStart { .. } => skip_depth = Some(depth + 1),
                Token::ElementEnd {
                    end: ElementEnd::Close(..),
                    ..
                } => {
                    if depth == 0 {
                        skip_depth = None;
                    } else {
                        skip_depth = Some(depth - 1);
                    }
                }
                Token::ElementEnd {
                    end: ElementEnd::Empty,
                    ..
                } => {
                    if depth == 0 {
                        skip_depth = None;
                    }
                }
                _ => {}
            }
            continue;
        }

        match token {
            Token::ElementStart { local, .. } => {
                match (stack.last(), local.as_str()) {
                    (None, "node") => stack.push(State::Node(NodeBuilder::default())),
                    (Some(State::Node(..)), "interface") => {
                        stack.push(State::Interface(InterfaceBuilder::default()))
                    }
                    (Some(State::Node(..)), "node") => {
                        stack.push(State::Node(NodeBuilder::default()))
                    }
                    (Some(State::Interface(..)), "method") => {
                        stack.push(State::Method(MethodBuilder::default()))
                    }
                    (Some(State::Interface(..)), "signal") => {
                        stack.push(State::Signal(SignalBuilder::default()))
                    }
                    (Some(State::Interface(..)), "property") => {
                        stack.push(State::Property(PropertyBuilder::default()))
                    }
                    (Some(State::Method(..) | State::Signal(..)), "arg") => {
                        stack.push(State::Arg(ArgBuilder::default()))
                    }
                    (
                        Some(
                            State::Interface(..)
                            | State::Method(..)
                            | State::Signal(..)
                            | State::Property(..),
                        ),
                        "annotation",
                    ) => stack.push(State::Annotation(AnnotationBuilder::default())),
                    (_, "doc" | "summary" | "description" | "para") => {
                        skip_depth = Some(0);
                        continue;
                    }
                    (_, element) => {
                        return Err(Error::new(
                            path,
                            ErrorKind::UnsupportedElementStart(element.into()),
                        ));
                    }
                }

                if !path.is_empty() {
                    path.push('/');
                }
                path.push_str(local.as_str());
            }
            Token::ElementEnd { end, .. } => {
                let name = match end {
                    ElementEnd::Open => continue,
                    ElementEnd::Close(_, name) => Some(name.as_str()),
                    ElementEnd::Empty => None,
                };

                let Some(top) = stack.pop() else {
                    return Err(Error::new(path, ErrorKind::UnsupportedElementEnd));
                };

                match (stack.last_mut(), top) {
                    (None, State::Node(builder)) => {
                        expect_end!(name, "node");
                        root = builder;
                    }
                    (Some(State::Node(parent)), State::Interface(builder)) => {
                        expect_end!(name, "interface");
                        parent
                            .interfaces
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Node(parent)), State::Node(builder)) => {
                        expect_end!(name, "node");
                        parent.children.push(builder.build());
                    }
                    (Some(State::Interface(parent)), State::Method(builder)) => {
                        expect_end!(name, "method");
                        parent
                            .methods
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Interface(parent)), State::Signal(builder)) => {
                        expect_end!(name, "signal");
                        parent
                            .signals
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Interface(parent)), State::Property(builder)) => {
                        expect_end!(name, "property");
                        parent
                            .properties
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Interface(parent)), State::Annotation(builder)) => {
                        expect_end!(name, "annotation");
                        parent
                            .annotations
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Method(parent)), State::Arg(builder)) => {
                        expect_end!(name, "arg");
                        parent
                            .args
                            .push(builder.build(Direction::In).map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Signal(parent)), State::Arg(builder)) => {
                        expect_end!(name, "arg");
                        parent
                            .args
                            .push(builder.build(Direction::Out).map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Method(parent)), State::Annotation(builder)) => {
                        expect_end!(name, "annotation");
                        parent
                            .annotations
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Signal(parent)), State::Annotation(builder)) => {
                        expect_end!(name, "annotation");
                        parent
                            .annotations
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    (Some(State::Property(parent)), State::Annotation(builder)) => {
                        expect_end!(name, "annotation");
                        parent
                            .annotations
                            .push(builder.build().map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    _ => return Err(Error::new(path, ErrorKind::UnsupportedElementEnd)),
                }

                if let Some(index) = path.rfind('/') {
                    path.truncate(index);
                } else {
                    path.clear();
                }
            }
            Token::Attribute { local, value, .. } => {
                let name = local.as_str();
                let value = value.as_str();

                match stack.last_mut() {
                    Some(State::Node(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Interface(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Method(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Signal(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Property(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Property(builder)) if name == "type" => {
                        builder.ty =
                            Some(SignatureBuf::new(value).map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    Some(State::Property(builder)) if name == "access" => {
                        builder.access = Some(match value {
                            "read" => Access::Read,
                            "write" => Access::Write,
                            "readwrite" => Access::ReadWrite,
                            other => {
                                return Err(Error::new(
                                    path,
                                    ErrorKind::UnsupportedPropertyAccess(other.into()),
                                ));
                            }
                        });
                    }
                    Some(State::Arg(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Arg(builder)) if name == "type" => {
                        builder.ty =
                            Some(SignatureBuf::new(value).map_err(|k| Error::new(path.as_str(), k))?);
                    }
                    Some(State::Arg(builder)) if name == "direction" => {
                        builder.direction = Some(match value {
                            "in" => Direction::In,
                            "out" => Direction::Out,
                            other => {
                                return Err(Error::new(
                                    path,
                                    ErrorKind::UnsupportedArgumentDirection(other.into()),
                                ));
                            }
                        });
                    }
                    Some(State::Annotation(builder)) if name == "name" => {
                        builder.name = Some(value.to_owned());
                    }
                    Some(State::Annotation(builder)) if name == "value" => {
                        builder.value = Some(value.to_owned());
                    }
                    // xmlns and similar namespace declarations are harmless noise.
                    _ if name == "xmlns" || name.starts_with("xmlns:") => {}
                    _ => {
                        return Err(Error::new(
                            path,
                            ErrorKind::UnsupportedAttribute(name.into()),
                        ));
                    }
                }
            }
            Token::Text { text } => {
                if !text.as_str().trim().is_empty() {
                    return Err(Error::new(path, ErrorKind::UnsupportedText));
                }
            }
            _ => {}
        }
    }

    Ok(root.build())
}

#[derive(Debug, Default)]
struct NodeBuilder {
    name: Option<String>,
    interfaces: Vec<Interface>,
    children: Vec<Node>,
}

impl NodeBuilder {
    fn build(self) -> Node {
        Node {
            name: self.name,
            interfaces: self.interfaces,
            children: self.children,
        }
    }
}

enum State {
    Node(NodeBuilder),
    Interface(InterfaceBuilder),
    Method(MethodBuilder),
    Signal(SignalBuilder),
    Property(PropertyBuilder),
    Arg(ArgBuilder),
    Annotation(AnnotationBuilder),
}

#[derive(Debug, Default)]
struct InterfaceBuilder {
    name: Option<String>,
    methods: Vec<Method>,
    properties: Vec<Property>,
    signals: Vec<Signal>,
    annotations: Vec<Annotation>,
}

impl InterfaceBuilder {
    fn build(self) -> Result<Interface, ErrorKind> {
        Ok(Interface {
            name: self.name.ok_or(ErrorKind::MissingInterfaceName)?,
            methods: self.methods,
            properties: self.properties,
            signals: self.signals,
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct MethodBuilder {
    name: Option<String>,
    args: Vec<Arg>,
    annotations: Vec<Annotation>,
}

impl MethodBuilder {
    fn build(self) -> Result<Method, ErrorKind> {
        Ok(Method {
            name: self.name.ok_or(ErrorKind::MissingMethodName)?,
            args: self.args,
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct SignalBuilder {
    name: Option<String>,
    args: Vec<Arg>,
    annotations: Vec<Annotation>,
}

impl SignalBuilder {
    fn build(self) -> Result<Signal, ErrorKind> {
        Ok(Signal {
            name: self.name.ok_or(ErrorKind::MissingSignalName)?,
            args: self.args,
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct PropertyBuilder {
    name: Option<String>,
    ty: Option<SignatureBuf>,
    access: Option<Access>,
    annotations: Vec<Annotation>,
}

impl PropertyBuilder {
    fn build(self) -> Result<Property, ErrorKind> {
        Ok(Property {
            name: self.name.ok_or(ErrorKind::MissingPropertyName)?,
            ty: self.ty.ok_or(ErrorKind::MissingPropertyType)?,
            access: self.access.ok_or(ErrorKind::MissingPropertyAccess)?,
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct ArgBuilder {
    name: Option<String>,
    ty: Option<SignatureBuf>,
    direction: Option<Direction>,
}

impl ArgBuilder {
    fn build(self, default_direction: Direction) -> Result<Arg, ErrorKind> {
        Ok(Arg {
            name: self.name,
            ty: self.ty.ok_or(ErrorKind::MissingArgumentType)?,
            direction: self.direction.unwrap_or(default_direction),
        })
    }
}

#[derive(Debug, Default)]
struct AnnotationBuilder {
    name: Option<String>,
    value: Option<String>,
}

impl AnnotationBuilder {
    fn build(self) -> Result<Annotation, ErrorKind> {
        Ok(Annotation {
            name: self.name.ok_or(ErrorKind::MissingAnnotationName)?,
            value: self.value.ok_or(ErrorKind::MissingAnnotationValue)?,
        })
    }
}
