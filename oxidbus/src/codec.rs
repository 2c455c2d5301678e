//! The marshaller and unmarshaller: encode and decode [`Value`]s to and
//! from an aligned byte buffer, per the D-Bus wire format.

use std::collections::BTreeMap;
use std::os::fd::RawFd;

use oxidbus_core::signature::{Signature, SignatureBuf, Type as SigType};

use crate::error::{Error, ErrorKind, Result};
use crate::proto::Endianness;
use crate::value::Value;
use crate::ObjectPathBuf;

/// The maximum length of an array body in bytes (64 MiB).
pub(crate) const MAX_ARRAY_LENGTH: u32 = 1 << 26;

/// The maximum length of a message body in bytes (128 MiB).
pub(crate) const MAX_BODY_LENGTH: u32 = 1 << 27;

/// Split a signature into the complete-type sub-signatures it is made of,
/// e.g. `"sii"` into `["s", "i", "i"]`.
pub(crate) fn split_types(sig: &Signature) -> Vec<&Signature> {
    let mut out = Vec::new();
    let mut remaining = sig;

    while !remaining.is_empty() {
        let Some(ty) = remaining.iter().next() else {
            break;
        };

        let len = single_type_len(remaining, &ty);
        let bytes = remaining.as_bytes();
        let head = Signature::new(&bytes[..len]).expect("prefix of a valid signature is valid");
        remaining =
            Signature::new(&bytes[len..]).expect("suffix of a valid signature is valid");
        out.push(head);
    }

    out
}

/// The byte length of the single complete type at the front of `signature`,
/// given the already-parsed first [`SigType`].
fn single_type_len(signature: &Signature, ty: &SigType<'_>) -> usize {
    match ty {
        SigType::Basic(s) => s.len(),
        SigType::Array(element) => 1 + element.len(),
        SigType::Struct(_) | SigType::Dict(..) => {
            let bytes = signature.as_bytes();
            let (open, close) = if bytes[0] == b'(' {
                (b'(', b')')
            } else {
                (b'{', b'}')
            };

            let mut depth = 0usize;

            for (i, &b) in bytes.iter().enumerate() {
                if b == open {
                    depth += 1;
                } else if b == close {
                    depth -= 1;

                    if depth == 0 {
                        return i + 1;
                    }
                }
            }

            bytes.len()
        }
        SigType::Variant => 1,
    }
}

/// An accumulating output buffer for marshalled bytes and the file
/// descriptors collected alongside them.
#[derive(Debug)]
pub(crate) struct Marshaller {
    endianness: Endianness,
    buf: Vec<u8>,
    fds: Vec<RawFd>,
}

impl Marshaller {
    pub(crate) fn new(endianness: Endianness) -> Self {
        Self {
            endianness,
            buf: Vec::new(),
            fds: Vec::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, Vec<RawFd>) {
        (self.buf, self.fds)
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// Overwrite 4 bytes at `at` with `value`, in this marshaller's
    /// endianness. Used to backpatch length and serial fields.
    pub(crate) fn patch_u32(&mut self, at: usize, value: u32) {
        let bytes = if self.endianness == Endianness::LITTLE {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    pub(crate) fn pad_to(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn put_u16(&mut self, v: u16) {
        self.pad_to(2);
        let bytes = if self.endianness == Endianness::LITTLE {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        self.pad_to(4);
        let bytes = if self.endianness == Endianness::LITTLE {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    fn put_u64(&mut self, v: u64) {
        self.pad_to(8);
        let bytes = if self.endianness == Endianness::LITTLE {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    fn put_string(&mut self, s: &str) -> Result<()> {
        let len: u32 = s
            .len()
            .try_into()
            .map_err(|_| Error::new(ErrorKind::ArrayTooLong(u32::MAX)))?;
        self.put_u32(len);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn put_signature(&mut self, s: &Signature) {
        self.buf.push(s.len() as u8);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Marshal a single value whose shape must match `signature`, which must
    /// describe exactly one complete type.
    pub(crate) fn marshal(&mut self, signature: &Signature, value: &Value) -> Result<()> {
        let ty = signature
            .iter()
            .next()
            .ok_or_else(|| Error::new(ErrorKind::SignatureMismatch))?;

        match (ty, value) {
            (SigType::Basic(s), Value::Byte(v)) if s == Signature::BYTE => self.put_u8(*v),
            (SigType::Basic(s), Value::Bool(v)) if s == Signature::BOOLEAN => {
                self.put_u32(if *v { 1 } else { 0 });
            }
            (SigType::Basic(s), Value::Int16(v)) if s == Signature::INT16 => {
                self.put_u16(*v as u16);
            }
            (SigType::Basic(s), Value::UInt16(v)) if s == Signature::UINT16 => self.put_u16(*v),
            (SigType::Basic(s), Value::Int32(v)) if s == Signature::INT32 => {
                self.put_u32(*v as u32);
            }
            (SigType::Basic(s), Value::UInt32(v)) if s == Signature::UINT32 => self.put_u32(*v),
            (SigType::Basic(s), Value::Int64(v)) if s == Signature::INT64 => {
                self.put_u64(*v as u64);
            }
            (SigType::Basic(s), Value::UInt64(v)) if s == Signature::UINT64 => self.put_u64(*v),
            (SigType::Basic(s), Value::Double(v)) if s == Signature::DOUBLE => {
                self.put_u64(v.to_bits());
            }
            (SigType::Basic(s), Value::String(v)) if s == Signature::STRING => {
                self.put_string(v)?;
            }
            (SigType::Basic(s), Value::ObjectPath(v)) if s == Signature::OBJECT_PATH => {
                self.put_string(v.as_str())?;
            }
            (SigType::Basic(s), Value::Signature(v)) if s == Signature::SIGNATURE => {
                self.put_signature(v);
            }
            (SigType::Basic(s), Value::UnixFd(fd)) if s == Signature::UNIX_FD => {
                let index: u32 = self
                    .fds
                    .len()
                    .try_into()
                    .map_err(|_| Error::new(ErrorKind::ArrayTooLong(u32::MAX)))?;
                self.fds.push(*fd);
                self.put_u32(index);
            }
            (
                SigType::Array(element),
                Value::Array {
                    element_signature,
                    values,
                },
            ) if element == element_signature.as_signature() => {
                self.marshal_array(element, values)?;
            }
            (
                SigType::Array(element),
                Value::Dict {
                    key_signature,
                    value_signature,
                    entries,
                },
            ) => match element.iter().next() {
                Some(SigType::Dict(key_sig, value_sig))
                    if key_sig == key_signature.as_signature()
                        && value_sig == value_signature.as_signature() =>
                {
                    self.marshal_dict(key_sig, value_sig, entries)?;
                }
                _ => return Err(Error::new(ErrorKind::SignatureMismatch)),
            },
            (SigType::Struct(fields), Value::Struct(values)) => {
                self.pad_to(8);
                let field_sigs = split_types(fields);

                if field_sigs.len() != values.len() {
                    return Err(Error::new(ErrorKind::SignatureMismatch));
                }

                for (field_sig, value) in field_sigs.iter().zip(values) {
                    self.marshal(field_sig, value)?;
                }
            }
            (SigType::Variant, Value::Variant(inner, inner_signature)) => {
                self.put_signature(inner_signature);
                self.marshal(inner_signature, inner)?;
            }
            _ => return Err(Error::new(ErrorKind::SignatureMismatch)),
        }

        Ok(())
    }

    fn marshal_array(&mut self, element: &Signature, values: &[Value]) -> Result<()> {
        self.pad_to(4);
        let length_at = self.buf.len();
        self.put_u32(0);

        // Arrays of structs are 8-byte aligned even when empty.
        if matches!(element.iter().next(), Some(SigType::Struct(..))) {
            self.pad_to(8);
        }

        let body_start = self.buf.len();

        for value in values {
            self.marshal(element, value)?;
        }

        self.patch_array_length(length_at, body_start)
    }

    fn marshal_dict(
        &mut self,
        key_sig: &Signature,
        value_sig: &Signature,
        entries: &BTreeMap<crate::value::BasicValue, Value>,
    ) -> Result<()> {
        self.pad_to(4);
        let length_at = self.buf.len();
        self.put_u32(0);
        self.pad_to(8);
        let body_start = self.buf.len();

        for (key, value) in entries {
            self.pad_to(8);
            self.marshal(key_sig, &Value::from(key.clone()))?;
            self.marshal(value_sig, value)?;
        }

        self.patch_array_length(length_at, body_start)
    }

    fn patch_array_length(&mut self, length_at: usize, body_start: usize) -> Result<()> {
        let body_len: u32 = (self.buf.len() - body_start)
            .try_into()
            .map_err(|_| Error::new(ErrorKind::ArrayTooLong(u32::MAX)))?;

        if body_len > MAX_ARRAY_LENGTH {
            return Err(Error::new(ErrorKind::ArrayTooLong(body_len)));
        }

        self.patch_u32(length_at, body_len);
        Ok(())
    }
}

/// A cursor for unmarshalling values out of a byte slice.
pub(crate) struct Unmarshaller<'a> {
    endianness: Endianness,
    data: &'a [u8],
    offset: usize,
    fds: &'a [RawFd],
}

impl<'a> Unmarshaller<'a> {
    pub(crate) fn new(endianness: Endianness, data: &'a [u8], fds: &'a [RawFd]) -> Self {
        Self {
            endianness,
            data,
            offset: 0,
            fds,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn align_to(&mut self, align: usize) -> Result<()> {
        let padding = (align - (self.offset % align)) % align;

        if self.offset + padding > self.data.len() {
            return Err(Error::new(ErrorKind::Truncated));
        }

        self.offset += padding;
        Ok(())
    }

    /// Advance the cursor by `n` bytes without interpreting them.
    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n)?;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.offset + n > self.data.len() {
            return Err(Error::new(ErrorKind::Truncated));
        }

        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn get_u16(&mut self) -> Result<u16> {
        self.align_to(2)?;
        let bytes: [u8; 2] = self.take(2)?.try_into().unwrap();
        Ok(if self.endianness == Endianness::LITTLE {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32> {
        self.align_to(4)?;
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(if self.endianness == Endianness::LITTLE {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn get_u64(&mut self) -> Result<u64> {
        self.align_to(8)?;
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(if self.endianness == Endianness::LITTLE {
            u64::from_le_bytes(bytes)
        } else {
            u64::from_be_bytes(bytes)
        })
    }

    fn get_string(&mut self) -> Result<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        let nul = self.get_u8()?;

        if nul != 0 {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        if bytes.contains(&0) {
            return Err(Error::new(ErrorKind::EmbeddedNul));
        }

        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::new(ErrorKind::BadUtf8(e.utf8_error())))
    }

    fn get_signature(&mut self) -> Result<SignatureBuf> {
        let len = self.get_u8()? as usize;
        let bytes = self.take(len)?;
        let nul = self.get_u8()?;

        if nul != 0 {
            return Err(Error::new(ErrorKind::NotNullTerminated));
        }

        Ok(SignatureBuf::new(bytes)?)
    }

    /// Unmarshal a single value, where `signature` describes exactly one
    /// complete type.
    pub(crate) fn unmarshal(&mut self, signature: &Signature) -> Result<Value> {
        let Some(ty) = signature.iter().next() else {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        };

        Ok(match ty {
            SigType::Basic(s) if s == Signature::BYTE => Value::Byte(self.get_u8()?),
            SigType::Basic(s) if s == Signature::BOOLEAN => match self.get_u32()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return Err(Error::new(ErrorKind::BadBoolean)),
            },
            SigType::Basic(s) if s == Signature::INT16 => Value::Int16(self.get_u16()? as i16),
            SigType::Basic(s) if s == Signature::UINT16 => Value::UInt16(self.get_u16()?),
            SigType::Basic(s) if s == Signature::INT32 => Value::Int32(self.get_u32()? as i32),
            SigType::Basic(s) if s == Signature::UINT32 => Value::UInt32(self.get_u32()?),
            SigType::Basic(s) if s == Signature::INT64 => Value::Int64(self.get_u64()? as i64),
            SigType::Basic(s) if s == Signature::UINT64 => Value::UInt64(self.get_u64()?),
            SigType::Basic(s) if s == Signature::DOUBLE => {
                Value::Double(f64::from_bits(self.get_u64()?))
            }
            SigType::Basic(s) if s == Signature::STRING => Value::String(self.get_string()?),
            SigType::Basic(s) if s == Signature::OBJECT_PATH => {
                let raw = self.get_string()?;
                Value::ObjectPath(ObjectPathBuf::new(raw)?)
            }
            SigType::Basic(s) if s == Signature::SIGNATURE => Value::Signature(self.get_signature()?),
            SigType::Basic(s) if s == Signature::UNIX_FD => {
                let index = self.get_u32()? as usize;
                let fd = *self
                    .fds
                    .get(index)
                    .ok_or_else(|| Error::new(ErrorKind::Truncated))?;
                Value::UnixFd(fd)
            }
            SigType::Basic(_) => return Err(Error::new(ErrorKind::SignatureMismatch)),
            SigType::Array(element) => match element.iter().next() {
                Some(SigType::Dict(key_sig, value_sig)) => {
                    self.unmarshal_dict(key_sig, value_sig)?
                }
                _ => self.unmarshal_array(element)?,
            },
            SigType::Dict(..) => return Err(Error::new(ErrorKind::SignatureMismatch)),
            SigType::Struct(fields) => {
                self.align_to(8)?;
                let mut values = Vec::new();

                for field_sig in split_types(fields) {
                    values.push(self.unmarshal(field_sig)?);
                }

                Value::Struct(values)
            }
            SigType::Variant => {
                let inner_signature = self.get_signature()?;
                let inner = self.unmarshal(&inner_signature)?;
                Value::Variant(Box::new(inner), inner_signature)
            }
        })
    }

    fn unmarshal_array(&mut self, element: &Signature) -> Result<Value> {
        let byte_len = self.get_u32()?;

        if byte_len > MAX_ARRAY_LENGTH {
            return Err(Error::new(ErrorKind::ArrayTooLong(byte_len)));
        }

        if matches!(element.iter().next(), Some(SigType::Struct(..))) {
            self.align_to(8)?;
        }

        let end = self.offset + byte_len as usize;

        if end > self.data.len() {
            return Err(Error::new(ErrorKind::Truncated));
        }

        let mut values = Vec::new();

        while self.offset < end {
            values.push(self.unmarshal(element)?);
        }

        Ok(Value::Array {
            element_signature: element.to_owned(),
            values,
        })
    }

    fn unmarshal_dict(&mut self, key_sig: &Signature, value_sig: &Signature) -> Result<Value> {
        let byte_len = self.get_u32()?;

        if byte_len > MAX_ARRAY_LENGTH {
            return Err(Error::new(ErrorKind::ArrayTooLong(byte_len)));
        }

        self.align_to(8)?;
        let end = self.offset + byte_len as usize;

        if end > self.data.len() {
            return Err(Error::new(ErrorKind::Truncated));
        }

        let mut entries = BTreeMap::new();

        while self.offset < end {
            self.align_to(8)?;
            let key = self.unmarshal(key_sig)?;
            let value = self.unmarshal(value_sig)?;

            let Some(key) = key.as_basic() else {
                return Err(Error::new(ErrorKind::SignatureMismatch));
            };

            entries.insert(key, value);
        }

        Ok(Value::Dict {
            key_signature: key_sig.to_owned(),
            value_signature: value_sig.to_owned(),
            entries,
        })
    }
}

/// Marshal a sequence of values whose concatenated signature is `signature`,
/// returning the body bytes and the fds collected along the way.
pub(crate) fn marshal_body(
    endianness: Endianness,
    signature: &Signature,
    values: &[Value],
) -> Result<(Vec<u8>, Vec<RawFd>)> {
    let field_sigs = split_types(signature);

    if field_sigs.len() != values.len() {
        return Err(Error::new(ErrorKind::SignatureMismatch));
    }

    let mut marshaller = Marshaller::new(endianness);

    for (field_sig, value) in field_sigs.iter().zip(values) {
        marshaller.marshal(field_sig, value)?;
    }

    let (buf, fds) = marshaller.into_parts();

    if buf.len() as u64 > MAX_BODY_LENGTH as u64 {
        return Err(Error::new(ErrorKind::ArrayTooLong(MAX_BODY_LENGTH)));
    }

    Ok((buf, fds))
}

/// Unmarshal a sequence of complete types out of `signature`.
pub(crate) fn unmarshal_body(
    endianness: Endianness,
    signature: &Signature,
    data: &[u8],
    fds: &[RawFd],
) -> Result<Vec<Value>> {
    let mut unmarshaller = Unmarshaller::new(endianness, data, fds);
    let mut values = Vec::new();

    for field_sig in split_types(signature) {
        values.push(unmarshaller.unmarshal(field_sig)?);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BasicValue;

    fn roundtrip(sig: &str, value: Value) -> Value {
        let signature = Signature::new(sig.as_bytes()).unwrap();
        let mut marshaller = Marshaller::new(Endianness::LITTLE);
        marshaller.marshal(signature, &value).unwrap();
        let (buf, fds) = marshaller.into_parts();
        let mut unmarshaller = Unmarshaller::new(Endianness::LITTLE, &buf, &fds);
        unmarshaller.unmarshal(signature).unwrap()
    }

    #[test]
    fn struct_round_trips_with_8_byte_alignment() {
        let value = Value::Struct(vec![Value::Byte(1), Value::UInt64(u64::MAX)]);
        assert_eq!(roundtrip("(yt)", value.clone()), value);
    }

    #[test]
    fn dict_round_trips_and_preserves_entries() {
        let mut entries = BTreeMap::new();
        entries.insert(BasicValue::String("a".to_owned()), Value::Int32(1));
        entries.insert(BasicValue::String("b".to_owned()), Value::Int32(2));
        let value = Value::Dict {
            key_signature: SignatureBuf::new("s").unwrap(),
            value_signature: SignatureBuf::new("i").unwrap(),
            entries,
        };
        assert_eq!(roundtrip("a{si}", value.clone()), value);
    }

    #[test]
    fn variant_round_trips_its_inner_signature() {
        let value = Value::Variant(Box::new(Value::String("hi".to_owned())), SignatureBuf::new("s").unwrap());
        assert_eq!(roundtrip("v", value.clone()), value);
    }

    #[test]
    fn large_array_round_trips_element_wise() {
        let values: Vec<Value> = (0..100_000u32)
            .map(|i| Value::Struct(vec![Value::UInt32(i), Value::from(i.to_string())]))
            .collect();
        let value = Value::Array {
            element_signature: SignatureBuf::new("(us)").unwrap(),
            values: values.clone(),
        };

        let decoded = roundtrip("a(us)", value);
        let Value::Array { values: decoded, .. } = decoded else {
            panic!("expected an array");
        };
        assert_eq!(decoded, values);
    }

    #[test]
    fn boolean_rejects_values_other_than_zero_or_one() {
        let mut marshaller = Marshaller::new(Endianness::LITTLE);
        marshaller.put_u32(2);
        let (buf, _) = marshaller.into_parts();
        let mut unmarshaller = Unmarshaller::new(Endianness::LITTLE, &buf, &[]);
        let error = unmarshaller.unmarshal(Signature::new(b"b").unwrap()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::BadBoolean));
    }

    #[test]
    fn truncated_buffer_fails_instead_of_panicking() {
        let mut unmarshaller = Unmarshaller::new(Endianness::LITTLE, &[1, 0, 0], &[]);
        let error = unmarshaller.unmarshal(Signature::new(b"u").unwrap()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Truncated));
    }
}
