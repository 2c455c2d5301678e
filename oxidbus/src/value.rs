//! The polymorphic wire value.
//!
//! D-Bus messages carry a tagged union parameterised by a signature tree.
//! This module exposes that union directly as [`Value`], rather than a
//! family of marker traits per type: callers match on it the same way the
//! wire format itself is self-describing.

use std::collections::BTreeMap;
use std::os::fd::RawFd;

use oxidbus_core::signature::{Signature, SignatureBuf};

use crate::ObjectPathBuf;

/// A single D-Bus value, tagged by the signature that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `y`
    Byte(u8),
    /// `b`
    Bool(bool),
    /// `n`
    Int16(i16),
    /// `q`
    UInt16(u16),
    /// `i`
    Int32(i32),
    /// `u`
    UInt32(u32),
    /// `x`
    Int64(i64),
    /// `t`
    UInt64(u64),
    /// `d`
    Double(f64),
    /// `s`
    String(String),
    /// `o`
    ObjectPath(ObjectPathBuf),
    /// `g`
    Signature(SignatureBuf),
    /// `h`: a raw file descriptor. The core hands these out exactly once
    /// and never duplicates or closes them; whoever receives a `Value`
    /// carrying one owns it and is responsible for closing it.
    UnixFd(RawFd),
    /// `a…`: a homogeneous array of values, all matching `element_signature`.
    Array {
        /// The signature of each element.
        element_signature: SignatureBuf,
        /// The elements.
        values: Vec<Value>,
    },
    /// `(…)`: a heterogeneous, fixed-arity sequence.
    Struct(Vec<Value>),
    /// `a{…}`: an array of two-field dict entries. Represented as an
    /// ordered map so that `GetAll`-style replies have deterministic
    /// iteration order.
    Dict {
        /// The signature of the key type (always basic).
        key_signature: SignatureBuf,
        /// The signature of the value type.
        value_signature: SignatureBuf,
        /// The entries.
        entries: BTreeMap<BasicValue, Value>,
    },
    /// `v`: a self-describing signature paired with the value it describes.
    Variant(Box<Value>, SignatureBuf),
}

impl Value {
    /// The signature that describes this value's shape.
    pub fn signature(&self) -> SignatureBuf {
        match self {
            Value::Byte(..) => Signature::BYTE.to_owned(),
            Value::Bool(..) => Signature::BOOLEAN.to_owned(),
            Value::Int16(..) => Signature::INT16.to_owned(),
            Value::UInt16(..) => Signature::UINT16.to_owned(),
            Value::Int32(..) => Signature::INT32.to_owned(),
            Value::UInt32(..) => Signature::UINT32.to_owned(),
            Value::Int64(..) => Signature::INT64.to_owned(),
            Value::UInt64(..) => Signature::UINT64.to_owned(),
            Value::Double(..) => Signature::DOUBLE.to_owned(),
            Value::String(..) => Signature::STRING.to_owned(),
            Value::ObjectPath(..) => Signature::OBJECT_PATH.to_owned(),
            Value::Signature(..) => Signature::SIGNATURE.to_owned(),
            Value::UnixFd(..) => Signature::UNIX_FD.to_owned(),
            Value::Array {
                element_signature, ..
            } => {
                let mut out = String::from("a");
                out.push_str(element_signature.as_str());
                SignatureBuf::new(out).expect("array signature stays valid")
            }
            Value::Struct(fields) => {
                let mut out = String::from("(");
                for field in fields {
                    out.push_str(field.signature().as_str());
                }
                out.push(')');
                SignatureBuf::new(out).expect("struct signature stays valid")
            }
            Value::Dict {
                key_signature,
                value_signature,
                ..
            } => {
                let mut out = String::from("a{");
                out.push_str(key_signature.as_str());
                out.push_str(value_signature.as_str());
                out.push('}');
                SignatureBuf::new(out).expect("dict signature stays valid")
            }
            Value::Variant(..) => Signature::VARIANT.to_owned(),
        }
    }

    /// Borrow this as a [`BasicValue`], if it is one.
    ///
    /// Used when a dict key arrives off the wire and must be re-keyed into
    /// the ordered map that backs [`Value::Dict`].
    pub fn as_basic(&self) -> Option<BasicValue> {
        Some(match self {
            Value::Byte(v) => BasicValue::Byte(*v),
            Value::Bool(v) => BasicValue::Bool(*v),
            Value::Int16(v) => BasicValue::Int16(*v),
            Value::UInt16(v) => BasicValue::UInt16(*v),
            Value::Int32(v) => BasicValue::Int32(*v),
            Value::UInt32(v) => BasicValue::UInt32(*v),
            Value::Int64(v) => BasicValue::Int64(*v),
            Value::UInt64(v) => BasicValue::UInt64(*v),
            Value::String(v) => BasicValue::String(v.clone()),
            Value::ObjectPath(v) => BasicValue::ObjectPath(v.clone()),
            Value::Signature(v) => BasicValue::Signature(v.clone()),
            _ => return None,
        })
    }
}

/// A value restricted to the basic (non-container, non-variant) types that
/// the D-Bus specification permits as dict keys.
///
/// `f64` is deliberately absent: floats have no total order and cannot back
/// an ordered map key, and the specification does not admit `d` as a dict
/// key signature in practice-relevant bus implementations either.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum BasicValue {
    /// `y`
    Byte(u8),
    /// `b`
    Bool(bool),
    /// `n`
    Int16(i16),
    /// `q`
    UInt16(u16),
    /// `i`
    Int32(i32),
    /// `u`
    UInt32(u32),
    /// `x`
    Int64(i64),
    /// `t`
    UInt64(u64),
    /// `s`
    String(String),
    /// `o`
    ObjectPath(ObjectPathBuf),
    /// `g`
    Signature(SignatureBuf),
}

impl From<BasicValue> for Value {
    fn from(value: BasicValue) -> Self {
        match value {
            BasicValue::Byte(v) => Value::Byte(v),
            BasicValue::Bool(v) => Value::Bool(v),
            BasicValue::Int16(v) => Value::Int16(v),
            BasicValue::UInt16(v) => Value::UInt16(v),
            BasicValue::Int32(v) => Value::Int32(v),
            BasicValue::UInt32(v) => Value::UInt32(v),
            BasicValue::Int64(v) => Value::Int64(v),
            BasicValue::UInt64(v) => Value::UInt64(v),
            BasicValue::String(v) => Value::String(v),
            BasicValue::ObjectPath(v) => Value::ObjectPath(v),
            BasicValue::Signature(v) => Value::Signature(v),
        }
    }
}

macro_rules! from_basic {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            #[inline]
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

from_basic!(u8, Byte);
from_basic!(bool, Bool);
from_basic!(i16, Int16);
from_basic!(u16, UInt16);
from_basic!(i32, Int32);
from_basic!(u32, UInt32);
from_basic!(i64, Int64);
from_basic!(u64, UInt64);
from_basic!(f64, Double);
from_basic!(String, String);
from_basic!(ObjectPathBuf, ObjectPath);
from_basic!(SignatureBuf, Signature);

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_reflects_container_shape() {
        let array = Value::Array {
            element_signature: SignatureBuf::new("u").unwrap(),
            values: vec![Value::from(1u32), Value::from(2u32)],
        };
        assert_eq!(array.signature().as_str(), "au");

        let strukt = Value::Struct(vec![Value::from(1u8), Value::from("x")]);
        assert_eq!(strukt.signature().as_str(), "(ys)");

        let dict = Value::Dict {
            key_signature: SignatureBuf::new("s").unwrap(),
            value_signature: SignatureBuf::new("i").unwrap(),
            entries: BTreeMap::new(),
        };
        assert_eq!(dict.signature().as_str(), "a{si}");

        let variant = Value::Variant(Box::new(Value::from(true)), SignatureBuf::new("b").unwrap());
        assert_eq!(variant.signature().as_str(), "v");
    }

    #[test]
    fn as_basic_succeeds_for_basic_types_and_fails_for_containers() {
        assert_eq!(Value::from(7i32).as_basic(), Some(BasicValue::Int32(7)));
        assert_eq!(
            Value::from("hi").as_basic(),
            Some(BasicValue::String("hi".to_owned()))
        );

        let array = Value::Array {
            element_signature: SignatureBuf::new("y").unwrap(),
            values: Vec::new(),
        };
        assert_eq!(array.as_basic(), None);

        let variant = Value::Variant(Box::new(Value::from(1u8)), SignatureBuf::new("y").unwrap());
        assert_eq!(variant.as_basic(), None);
    }

    #[test]
    fn basic_value_round_trips_through_value() {
        let basic = BasicValue::UInt64(42);
        assert_eq!(Value::from(basic.clone()), Value::UInt64(42));
        assert_eq!(Value::from(basic).as_basic(), Some(BasicValue::UInt64(42)));
    }

    #[test]
    fn basic_value_orders_by_variant_then_payload() {
        let mut keys = vec![
            BasicValue::String("b".to_owned()),
            BasicValue::Int32(5),
            BasicValue::String("a".to_owned()),
            BasicValue::Int32(1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                BasicValue::Int32(1),
                BasicValue::Int32(5),
                BasicValue::String("a".to_owned()),
                BasicValue::String("b".to_owned()),
            ]
        );
    }
}
