use std::fmt::Write as _;

use crate::elements::{Access, Annotation, Arg, Direction, Interface, Method, Node, Property, Signal};

/// The `doctype` the D-Bus specification prescribes for introspection
/// documents.
pub const DOCTYPE: &str =
    "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n";

/// Render a [`Node`] as an introspection XML document, including the
/// standard doctype header.
pub fn write_node(node: &Node) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(DOCTYPE);
    write_node_element(&mut out, node, 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_node_element(out: &mut String, node: &Node, depth: usize) {
    indent(out, depth);
    match &node.name {
        Some(name) => {
            let _ = write!(out, "<node name=\"{}\">\n", escape(name));
        }
        None => out.push_str("<node>\n"),
    }

    for interface in &node.interfaces {
        write_interface(out, interface, depth + 1);
    }

    for child in &node.children {
        write_node_element(out, child, depth + 1);
    }

    indent(out, depth);
    out.push_str("</node>\n");
}

fn write_interface(out: &mut String, interface: &Interface, depth: usize) {
    indent(out, depth);
    let _ = write!(out, "<interface name=\"{}\">\n", escape(&interface.name));

    for method in &interface.methods {
        write_method(out, method, depth + 1);
    }

    for signal in &interface.signals {
        write_signal(out, signal, depth + 1);
    }

    for property in &interface.properties {
        write_property(out, property, depth + 1);
    }

    for annotation in &interface.annotations {
        write_annotation(out, annotation, depth + 1);
    }

    indent(out, depth);
    out.push_str("</interface>\n");
}

fn write_method(out: &mut String, method: &Method, depth: usize) {
    indent(out, depth);

    if method.args.is_empty() && method.annotations.is_empty() {
        let _ = write!(out, "<method name=\"{}\"/>\n", escape(&method.name));
        return;
    }

    let _ = write!(out, "<method name=\"{}\">\n", escape(&method.name));

    for arg in &method.args {
        write_arg(out, arg, depth + 1, true);
    }

    for annotation in &method.annotations {
        write_annotation(out, annotation, depth + 1);
    }

    indent(out, depth);
    out.push_str("</method>\n");
}

fn write_signal(out: &mut String, signal: &Signal, depth: usize) {
    indent(out, depth);

    if signal.args.is_empty() && signal.annotations.is_empty() {
        let _ = write!(out, "<signal name=\"{}\"/>\n", escape(&signal.name));
        return;
    }

    let _ = write!(out, "<signal name=\"{}\">\n", escape(&signal.name));

    for arg in &signal.args {
        write_arg(out, arg, depth + 1, false);
    }

    for annotation in &signal.annotations {
        write_annotation(out, annotation, depth + 1);
    }

    indent(out, depth);
    out.push_str("</signal>\n");
}

fn write_arg(out: &mut String, arg: &Arg, depth: usize, include_direction: bool) {
    indent(out, depth);
    out.push_str("<arg");

    if let Some(name) = &arg.name {
        let _ = write!(out, " name=\"{}\"", escape(name));
    }

    let _ = write!(out, " type=\"{}\"", escape(arg.ty.as_str()));

    if include_direction {
        let direction = match arg.direction {
            Direction::In => "in",
            Direction::Out => "out",
        };
        let _ = write!(out, " direction=\"{direction}\"");
    }

    out.push_str("/>\n");
}

fn write_property(out: &mut String, property: &Property, depth: usize) {
    indent(out, depth);
    let access = match property.access {
        Access::Read => "read",
        Access::Write => "write",
        Access::ReadWrite => "readwrite",
    };

    if property.annotations.is_empty() {
        let _ = write!(
            out,
            "<property name=\"{}\" type=\"{}\" access=\"{access}\"/>\n",
            escape(&property.name),
            escape(property.ty.as_str()),
        );
        return;
    }

    let _ = write!(
        out,
        "<property name=\"{}\" type=\"{}\" access=\"{access}\">\n",
        escape(&property.name),
        escape(property.ty.as_str()),
    );

    for annotation in &property.annotations {
        write_annotation(out, annotation, depth + 1);
    }

    indent(out, depth);
    out.push_str("</property>\n");
}

fn write_annotation(out: &mut String, annotation: &Annotation, depth: usize) {
    indent(out, depth);
    let _ = write!(
        out,
        "<annotation name=\"{}\" value=\"{}\"/>\n",
        escape(&annotation.name),
        escape(&annotation.value),
    );
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }

    out
}
