//! The encoding traversal engine.
//!
//! [`ValueEncoder`] is the single-value container: a `serde::Serializer`
//! rooted at one path. Scalars land in `path.ext`; composites turn `path`
//! into a directory and hand out a [`KeyedEncoder`] or [`SequenceEncoder`],
//! which encode each child with a fresh `ValueEncoder` one level down.

use bytes::Bytes;
use serde::ser::{self, Impossible, Serialize};

use crate::context::Context;
use crate::error::{CodingPath, Error};
use crate::path::is_valid_component;
use crate::scalar::{RawValue, Scalar};

/// Encode `value` as the child at `ctx`, claiming stray errors for it.
fn encode_child<T: ?Sized + Serialize>(ctx: Context<'_>, value: &T) -> Result<(), Error> {
    let path = ctx.coding_path.clone();
    value.serialize(ValueEncoder::new(ctx)).map_err(|e| e.at(&path))
}

/// The single-value container used while writing.
pub(crate) struct ValueEncoder<'a> {
    ctx: Context<'a>,
}

impl<'a> ValueEncoder<'a> {
    pub(crate) fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    fn write_scalar(self, scalar: Scalar) -> Result<(), Error> {
        self.write_leaf(scalar.to_bytes())
    }

    fn write_leaf(self, data: Bytes) -> Result<(), Error> {
        let file = self.ctx.leaf_file();
        self.ctx
            .backend
            .write_atomic(&file, data)
            .map_err(|e| Error::write(file, e))
    }

    fn open_branch(ctx: &Context<'_>) -> Result<(), Error> {
        ctx.backend
            .create_dir_all(&ctx.base)
            .map_err(|e| Error::write(ctx.base.clone(), e))
    }

    /// Turn this path into a directory holding one child named `variant`,
    /// and return the child's context.
    fn open_variant(self, variant: &str) -> Result<Context<'a>, Error> {
        Self::open_branch(&self.ctx)?;
        let child = self.ctx.field(variant);
        Ok(child)
    }
}

impl<'a> ser::Serializer for ValueEncoder<'a> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = SequenceEncoder<'a>;
    type SerializeTuple = SequenceEncoder<'a>;
    type SerializeTupleStruct = SequenceEncoder<'a>;
    type SerializeTupleVariant = SequenceEncoder<'a>;
    type SerializeMap = KeyedEncoder<'a>;
    type SerializeStruct = KeyedEncoder<'a>;
    type SerializeStructVariant = KeyedEncoder<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), Error> {
        self.write_scalar(Scalar::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<(), Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<(), Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<(), Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<(), Error> {
        self.write_scalar(Scalar::Integer(v))
    }

    fn serialize_i128(self, v: i128) -> Result<(), Error> {
        self.write_leaf(Bytes::from(v.to_string()))
    }

    fn serialize_u8(self, v: u8) -> Result<(), Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u16(self, v: u16) -> Result<(), Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u32(self, v: u32) -> Result<(), Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<(), Error> {
        // Same decimal rendering as Integer, without the i64 range limit.
        self.write_leaf(Bytes::from(v.to_string()))
    }

    fn serialize_u128(self, v: u128) -> Result<(), Error> {
        self.write_leaf(Bytes::from(v.to_string()))
    }

    fn serialize_f32(self, v: f32) -> Result<(), Error> {
        self.write_scalar(Scalar::Float32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Error> {
        self.write_scalar(Scalar::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<(), Error> {
        self.write_scalar(Scalar::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<(), Error> {
        self.write_scalar(Scalar::Text(v.to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), Error> {
        Err(Error::unsupported(
            &self.ctx.coding_path,
            "raw byte buffers have no leaf representation",
        ))
    }

    fn serialize_none(self) -> Result<(), Error> {
        // Absence is the absence of an entry.
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Error> {
        // Unit is nil, like `None`.
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Error> {
        // A record with no fields: an empty branch, so the field stays
        // present for the decoder.
        Self::open_branch(&self.ctx)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), Error> {
        self.write_scalar(Scalar::Constant(RawValue::Text(variant.to_string())))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        // Same path, no extra segment.
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        let child = self.open_variant(variant)?;
        encode_child(child, value)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SequenceEncoder<'a>, Error> {
        Self::open_branch(&self.ctx)?;
        Ok(SequenceEncoder::new(self.ctx))
    }

    fn serialize_tuple(self, len: usize) -> Result<SequenceEncoder<'a>, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SequenceEncoder<'a>, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SequenceEncoder<'a>, Error> {
        let child = self.open_variant(variant)?;
        Self::open_branch(&child)?;
        Ok(SequenceEncoder::new(child))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<KeyedEncoder<'a>, Error> {
        Self::open_branch(&self.ctx)?;
        Ok(KeyedEncoder::new(self.ctx))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<KeyedEncoder<'a>, Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<KeyedEncoder<'a>, Error> {
        let child = self.open_variant(variant)?;
        Self::open_branch(&child)?;
        Ok(KeyedEncoder::new(child))
    }
}

/// The sequence container used while writing.
///
/// The n-th element encoded, counting from zero, is stored under the name
/// `n`. Absent elements write nothing but still take their index.
pub(crate) struct SequenceEncoder<'a> {
    ctx: Context<'a>,
    count: usize,
}

impl<'a> SequenceEncoder<'a> {
    fn new(ctx: Context<'a>) -> Self {
        Self { ctx, count: 0 }
    }

    fn encode<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let child = self.ctx.element(self.count, &self.count.to_string());
        encode_child(child, value)?;
        self.count += 1;
        Ok(())
    }
}

impl ser::SerializeSeq for SequenceEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.encode(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeTuple for SequenceEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.encode(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for SequenceEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.encode(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for SequenceEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.encode(value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// The keyed container used while writing.
///
/// Each field or map entry is stored under its name. Names must be usable
/// as a single path component.
pub(crate) struct KeyedEncoder<'a> {
    ctx: Context<'a>,
    pending_key: Option<String>,
}

impl<'a> KeyedEncoder<'a> {
    fn new(ctx: Context<'a>) -> Self {
        Self {
            ctx,
            pending_key: None,
        }
    }

    fn encode<T: ?Sized + Serialize>(&mut self, name: &str, value: &T) -> Result<(), Error> {
        if !is_valid_component(name) {
            return Err(Error::encoding(
                &self.ctx.coding_path,
                format!("key {:?} can't be stored as a path component", name),
            ));
        }
        encode_child(self.ctx.field(name), value)
    }
}

impl ser::SerializeStruct for KeyedEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.encode(key, value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for KeyedEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.encode(key, value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

impl ser::SerializeMap for KeyedEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Error> {
        let key = key.serialize(KeyEncoder {
            path: &self.ctx.coding_path,
        })?;
        self.pending_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let key = self.pending_key.take().ok_or_else(|| {
            Error::encoding(&self.ctx.coding_path, "map value serialized before its key")
        })?;
        self.encode(&key, value)
    }

    fn end(self) -> Result<(), Error> {
        Ok(())
    }
}

/// Renders a map key as the name of a tree entry.
///
/// Only scalar keys have a name; anything else is unsupported.
struct KeyEncoder<'p> {
    path: &'p CodingPath,
}

impl KeyEncoder<'_> {
    fn unsupported(&self, what: &str) -> Error {
        Error::unsupported(self.path, format!("{} can't be used as a map key", what))
    }
}

impl ser::Serializer for KeyEncoder<'_> {
    type Ok = String;
    type Error = Error;

    type SerializeSeq = Impossible<String, Error>;
    type SerializeTuple = Impossible<String, Error>;
    type SerializeTupleStruct = Impossible<String, Error>;
    type SerializeTupleVariant = Impossible<String, Error>;
    type SerializeMap = Impossible<String, Error>;
    type SerializeStruct = Impossible<String, Error>;
    type SerializeStructVariant = Impossible<String, Error>;

    fn serialize_bool(self, v: bool) -> Result<String, Error> {
        Ok(Scalar::Bool(v).render())
    }

    fn serialize_i8(self, v: i8) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<String, Error> {
        Ok(Scalar::Float32(v).render())
    }

    fn serialize_f64(self, v: f64) -> Result<String, Error> {
        Ok(Scalar::Float(v).render())
    }

    fn serialize_char(self, v: char) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, Error> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, Error> {
        Err(self.unsupported("a byte buffer"))
    }

    fn serialize_none(self) -> Result<String, Error> {
        Err(self.unsupported("an absent value"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<String, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, Error> {
        Err(self.unsupported("a unit value"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, Error> {
        Err(self.unsupported(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, Error> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, Error> {
        Err(self.unsupported(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
        Err(self.unsupported("a sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Error> {
        Err(self.unsupported("a tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Error> {
        Err(self.unsupported(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        Err(self.unsupported(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
        Err(self.unsupported("a map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Error> {
        Err(self.unsupported(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        Err(self.unsupported(name))
    }
}
