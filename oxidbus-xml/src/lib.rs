//! Introspection XML parsing and generation.
//!
//! D-Bus objects describe their interfaces through an XML document matching
//! the grammar in the `org.freedesktop.DBus.Introspectable` interface
//! documentation. This crate parses that grammar into an owned object model
//! ([`Node`] and friends) and can render the model back to XML.

mod elements;
mod error;
mod parser;
mod writer;

pub use elements::{Access, Annotation, Arg, Direction, Interface, Method, Node, Property, Signal};
pub use error::{Error, Result};
pub use parser::parse_node;
pub use writer::write_node;

#[cfg(test)]
mod tests;
