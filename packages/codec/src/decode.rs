//! The decoding traversal engine.
//!
//! [`ValueDecoder`] is the `serde::Deserializer` for one path. It never
//! caches: every presence check and listing goes back to the backend, so
//! the tree is the only source of truth during a call.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::Bytes;
use serde::de::value::{StringDeserializer, U32Deserializer};
use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde::forward_to_deserialize_any;

use crate::context::Context;
use crate::error::{CodingPath, Error};
use crate::path::parse_index;
use crate::scalar::{parse, RawValue, Scalar, ScalarKind};

/// A child entry found by listing a directory.
struct Listed {
    /// The file to read if the child is a leaf stored under a name other
    /// than `key + extension`.
    leaf: Option<PathBuf>,
    rank: u8,
}

/// List the children of `ctx.base` by logical key.
///
/// A missing directory lists as empty. When two entries share a key, a
/// directory wins over a leaf, and a leaf with the configured extension
/// wins over any other.
fn list_children(ctx: &Context<'_>) -> Result<BTreeMap<String, Listed>, Error> {
    let entries = match ctx.backend.list_dir(&ctx.base) {
        Ok(entries) => entries,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(Error::read(ctx.base.clone(), e)),
    };
    tracing::trace!(path = %ctx.base.display(), entries = entries.len(), "listed directory");

    let mut children: BTreeMap<String, Listed> = BTreeMap::new();
    for entry in &entries {
        let key = ctx.resolver.entry_key(entry);
        let canonical = format!("{}{}", key, ctx.resolver.extension());
        let listed = if entry.is_dir {
            Listed { leaf: None, rank: 2 }
        } else if entry.name == canonical {
            Listed { leaf: None, rank: 1 }
        } else {
            Listed {
                leaf: Some(ctx.base.join(&entry.name)),
                rank: 0,
            }
        };
        let outranked = children
            .get(key)
            .is_some_and(|existing| existing.rank >= listed.rank);
        if !outranked {
            children.insert(key.to_string(), listed);
        }
    }
    Ok(children)
}

/// Parse a decoded text with `FromStr`, tied to `path` on failure.
fn parse_at<T>(path: &CodingPath, kind: ScalarKind, text: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse(kind, text).map_err(|e| Error::scalar(path, e))
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident($ty:ty, $kind:expr);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                let value = self.parse::<$ty>($kind)?;
                visitor.$visit(value)
            }
        )*
    };
}

macro_rules! deserialize_integer {
    ($($method:ident => $visit:ident($ty:ty);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                let value = self.integer::<$ty>()?;
                visitor.$visit(value)
            }
        )*
    };
}

/// The single-value container used while reading.
pub(crate) struct ValueDecoder<'a> {
    ctx: Context<'a>,
    leaf: Option<PathBuf>,
}

impl<'a> ValueDecoder<'a> {
    pub(crate) fn new(ctx: Context<'a>) -> Self {
        Self { ctx, leaf: None }
    }

    fn with_leaf(ctx: Context<'a>, leaf: Option<PathBuf>) -> Self {
        Self { ctx, leaf }
    }

    /// The leaf file holding this value, if it is stored as a leaf.
    fn stored_leaf(&self) -> Option<PathBuf> {
        if let Some(leaf) = &self.leaf {
            return Some(leaf.clone());
        }
        let file = self.ctx.leaf_file();
        (self.ctx.backend.exists(&file) && !self.ctx.backend.is_dir(&file)).then_some(file)
    }

    fn is_present(&self) -> bool {
        self.leaf.is_some() || self.ctx.has_value()
    }

    fn read_leaf(&self) -> Result<Bytes, Error> {
        let file = self.leaf.clone().unwrap_or_else(|| self.ctx.leaf_file());
        self.ctx
            .backend
            .read(&file)
            .map_err(|e| Error::read(file, e))
    }

    /// Read the leaf and decode it as `kind` with the scalar codec.
    fn read_scalar(&self, kind: ScalarKind) -> Result<Scalar, Error> {
        let data = self.read_leaf()?;
        Scalar::from_bytes(kind, &data).map_err(|e| Error::scalar(&self.ctx.coding_path, e))
    }

    fn read_text(&self) -> Result<String, Error> {
        match self.read_scalar(ScalarKind::Text)? {
            Scalar::Text(text) => Ok(text),
            other => Err(self.mismatch(ScalarKind::Text, &other)),
        }
    }

    fn integer<T>(&self) -> Result<T, Error>
    where
        T: TryFrom<i64>,
        T::Error: fmt::Display,
    {
        match self.read_scalar(ScalarKind::Integer)? {
            Scalar::Integer(i) => T::try_from(i).map_err(|e| {
                Error::decoding(&self.ctx.coding_path, format!("integer {} {}", i, e))
            }),
            other => Err(self.mismatch(ScalarKind::Integer, &other)),
        }
    }

    /// Integers wider than a stored `Integer` scalar, parsed from text.
    fn parse<T>(&self, kind: ScalarKind) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let text = self.read_text()?;
        parse_at(&self.ctx.coding_path, kind, &text)
    }

    fn mismatch(&self, expected: ScalarKind, found: &Scalar) -> Error {
        Error::decoding(
            &self.ctx.coding_path,
            format!("expected a {} leaf, decoded {}", expected, found.kind()),
        )
    }

    fn unsupported(&self, message: &str) -> Error {
        Error::unsupported(&self.ctx.coding_path, message)
    }
}

impl<'de> de::Deserializer<'de> for ValueDecoder<'_> {
    type Error = Error;

    /// Decode whatever is stored: a directory of numeric entries is a
    /// sequence, any other directory a map. A leaf holding a canonical
    /// number is that number, any other leaf is text.
    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if let Some(file) = self.stored_leaf() {
            let data = self
                .ctx
                .backend
                .read(&file)
                .map_err(|e| Error::read(file, e))?;
            let text = match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(e) => return visitor.visit_byte_buf(e.into_bytes()),
            };
            return match Scalar::infer(&text) {
                Scalar::Integer(i) => visitor.visit_i64(i),
                Scalar::Float(f) => visitor.visit_f64(f),
                _ => visitor.visit_string(text),
            };
        }
        if !self.ctx.backend.is_dir(&self.ctx.base) {
            return visitor.visit_unit();
        }
        let children = list_children(&self.ctx)?;
        if children.keys().all(|key| parse_index(key).is_some()) {
            visitor.visit_seq(SequenceDecoder::from_listing(self.ctx, children, None))
        } else {
            visitor.visit_map(KeyedDecoder::from_listing(self.ctx, children))
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.read_scalar(ScalarKind::Bool)? {
            Scalar::Bool(b) => visitor.visit_bool(b),
            other => Err(self.mismatch(ScalarKind::Bool, &other)),
        }
    }

    deserialize_integer! {
        deserialize_i8 => visit_i8(i8);
        deserialize_i16 => visit_i16(i16);
        deserialize_i32 => visit_i32(i32);
        deserialize_i64 => visit_i64(i64);
        deserialize_u8 => visit_u8(u8);
        deserialize_u16 => visit_u16(u16);
        deserialize_u32 => visit_u32(u32);
    }

    deserialize_parsed! {
        deserialize_i128 => visit_i128(i128, ScalarKind::Integer);
        deserialize_u64 => visit_u64(u64, ScalarKind::Integer);
        deserialize_u128 => visit_u128(u128, ScalarKind::Integer);
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.read_scalar(ScalarKind::Float32)? {
            Scalar::Float32(f) => visitor.visit_f32(f),
            other => Err(self.mismatch(ScalarKind::Float32, &other)),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.read_scalar(ScalarKind::Float)? {
            Scalar::Float(f) => visitor.visit_f64(f),
            other => Err(self.mismatch(ScalarKind::Float, &other)),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let text = self.read_text()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(Error::decoding(
                &self.ctx.coding_path,
                format!("expected a single character, found {:?}", text),
            )),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.read_text()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Error> {
        Err(self.unsupported("raw byte buffers have no leaf representation"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if self.is_present() {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let seq = SequenceDecoder::open(self.ctx, None)?;
        visitor.visit_seq(seq)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Error> {
        let seq = SequenceDecoder::open(self.ctx, Some(len))?;
        visitor.visit_seq(seq)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let children = list_children(&self.ctx)?;
        visitor.visit_map(KeyedDecoder::from_listing(self.ctx, children))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_map(KeyedDecoder::for_fields(self.ctx, fields))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        // A unit variant is a named-constant leaf: its name, or its index
        // among the variants.
        if self.stored_leaf().is_some() {
            return match self.read_scalar(ScalarKind::Constant)? {
                Scalar::Constant(RawValue::Text(text)) => {
                    let constant: StringDeserializer<Error> = text.into_deserializer();
                    visitor.visit_enum(constant)
                }
                Scalar::Constant(RawValue::Integer(i)) => {
                    let index = u32::try_from(i).map_err(|_| {
                        Error::decoding(
                            &self.ctx.coding_path,
                            format!("{} is not a variant index of {}", i, name),
                        )
                    })?;
                    let constant: U32Deserializer<Error> = index.into_deserializer();
                    visitor.visit_enum(constant)
                }
                other => Err(self.mismatch(ScalarKind::Constant, &other)),
            };
        }

        let children = list_children(&self.ctx)?;
        let mut stored = children
            .into_iter()
            .filter(|(key, _)| variants.contains(&key.as_str()));
        match (stored.next(), stored.next()) {
            (Some((variant, listed)), None) => {
                let payload = ValueDecoder::with_leaf(self.ctx.field(&variant), listed.leaf);
                visitor.visit_enum(VariantDecoder { variant, payload })
            }
            (None, _) => Err(Error::decoding(
                &self.ctx.coding_path,
                format!("no variant of {} is stored", name),
            )),
            _ => Err(Error::decoding(
                &self.ctx.coding_path,
                format!("more than one variant of {} is stored", name),
            )),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }
}

/// The keyed container used while reading.
///
/// Offers one key per stored child: for records, the declared fields that
/// are present; for maps, every listed key.
pub(crate) struct KeyedDecoder<'a> {
    ctx: Context<'a>,
    keys: std::vec::IntoIter<(String, Option<PathBuf>)>,
    current: Option<(String, Option<PathBuf>)>,
}

impl<'a> KeyedDecoder<'a> {
    fn for_fields(ctx: Context<'a>, fields: &'static [&'static str]) -> Self {
        let keys: Vec<_> = fields
            .iter()
            .filter(|field| ctx.field(field).has_value())
            .map(|field| (field.to_string(), None))
            .collect();
        Self::new(ctx, keys)
    }

    fn from_listing(ctx: Context<'a>, children: BTreeMap<String, Listed>) -> Self {
        let keys = children
            .into_iter()
            .map(|(key, listed)| (key, listed.leaf))
            .collect();
        Self::new(ctx, keys)
    }

    fn new(ctx: Context<'a>, keys: Vec<(String, Option<PathBuf>)>) -> Self {
        Self {
            ctx,
            keys: keys.into_iter(),
            current: None,
        }
    }
}

impl<'de> MapAccess<'de> for KeyedDecoder<'_> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Error> {
        let Some((key, leaf)) = self.keys.next() else {
            return Ok(None);
        };
        let child_path = self.ctx.field(&key).coding_path;
        let decoded = seed
            .deserialize(KeyDecoder {
                key: key.clone(),
                path: child_path.clone(),
            })
            .map_err(|e| e.at(&child_path))?;
        self.current = Some((key, leaf));
        Ok(Some(decoded))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let (key, leaf) = self.current.take().ok_or_else(|| {
            Error::decoding(&self.ctx.coding_path, "value requested before its key")
        })?;
        let child = self.ctx.field(&key);
        let path = child.coding_path.clone();
        seed.deserialize(ValueDecoder::with_leaf(child, leaf))
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.keys.len())
    }
}

/// The sequence container used while reading.
///
/// Elements are the listed entries whose key is a decimal index, in
/// ascending numeric order. The element count is fixed when the container
/// opens. A fixed-arity target (a tuple) that asks for more elements than
/// are stored gets nil for each missing one.
pub(crate) struct SequenceDecoder<'a> {
    ctx: Context<'a>,
    elements: Vec<(usize, Option<PathBuf>)>,
    cursor: usize,
    arity: Option<usize>,
}

impl<'a> SequenceDecoder<'a> {
    fn open(ctx: Context<'a>, arity: Option<usize>) -> Result<Self, Error> {
        let children = list_children(&ctx)?;
        Ok(Self::from_listing(ctx, children, arity))
    }

    fn from_listing(
        ctx: Context<'a>,
        children: BTreeMap<String, Listed>,
        arity: Option<usize>,
    ) -> Self {
        let mut elements: Vec<_> = children
            .into_iter()
            .filter_map(|(key, listed)| Some((parse_index(&key)?, listed.leaf)))
            .collect();
        elements.sort_by_key(|(index, _)| *index);
        Self {
            ctx,
            elements,
            cursor: 0,
            arity,
        }
    }

    /// How many stored elements the container found.
    pub(crate) fn count(&self) -> usize {
        self.elements.len()
    }
}

impl<'de> SeqAccess<'de> for SequenceDecoder<'_> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Error> {
        let position = self.cursor;
        let decoder = match self.elements.get(position) {
            Some((index, leaf)) => {
                let child = self.ctx.element(position, &index.to_string());
                ValueDecoder::with_leaf(child, leaf.clone())
            }
            None if self.arity.is_some_and(|n| position < n) => {
                // Past the end: an element nobody stored reads as nil.
                let name = position.to_string();
                ValueDecoder::new(self.ctx.element(position, &name))
            }
            None => return Ok(None),
        };
        self.cursor += 1;
        let path = decoder.ctx.coding_path.clone();
        seed.deserialize(decoder)
            .map(Some)
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.count().saturating_sub(self.cursor))
    }
}

/// Decodes a listed key into whatever key type the target map has.
struct KeyDecoder {
    key: String,
    path: CodingPath,
}

impl KeyDecoder {
    fn parse<T>(&self, kind: ScalarKind) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        parse_at(&self.path, kind, &self.key)
    }
}

impl<'de> de::Deserializer<'de> for KeyDecoder {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.key)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_bool(self.key == "1")
    }

    deserialize_parsed! {
        deserialize_i8 => visit_i8(i8, ScalarKind::Integer);
        deserialize_i16 => visit_i16(i16, ScalarKind::Integer);
        deserialize_i32 => visit_i32(i32, ScalarKind::Integer);
        deserialize_i64 => visit_i64(i64, ScalarKind::Integer);
        deserialize_i128 => visit_i128(i128, ScalarKind::Integer);
        deserialize_u8 => visit_u8(u8, ScalarKind::Integer);
        deserialize_u16 => visit_u16(u16, ScalarKind::Integer);
        deserialize_u32 => visit_u32(u32, ScalarKind::Integer);
        deserialize_u64 => visit_u64(u64, ScalarKind::Integer);
        deserialize_u128 => visit_u128(u128, ScalarKind::Integer);
        deserialize_f32 => visit_f32(f32, ScalarKind::Float32);
        deserialize_f64 => visit_f64(f64, ScalarKind::Float);
        deserialize_char => visit_char(char, ScalarKind::Text);
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let constant: StringDeserializer<Error> = self.key.into_deserializer();
        visitor.visit_enum(constant)
    }

    forward_to_deserialize_any! {
        str string bytes byte_buf unit unit_struct seq tuple tuple_struct map
        struct identifier ignored_any
    }
}

/// An enum stored as a directory holding one child named by its variant.
struct VariantDecoder<'a> {
    variant: String,
    payload: ValueDecoder<'a>,
}

impl<'de, 'a> EnumAccess<'de> for VariantDecoder<'a> {
    type Error = Error;
    type Variant = ValueDecoder<'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, ValueDecoder<'a>), Error> {
        let name: StringDeserializer<Error> = self.variant.into_deserializer();
        let value = seed.deserialize(name)?;
        Ok((value, self.payload))
    }
}

impl<'de> VariantAccess<'de> for ValueDecoder<'_> {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, Error> {
        let path = self.ctx.coding_path.clone();
        seed.deserialize(self).map_err(|e| e.at(&path))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Error> {
        let path = self.ctx.coding_path.clone();
        de::Deserializer::deserialize_tuple(self, len, visitor).map_err(|e| e.at(&path))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let path = self.ctx.coding_path.clone();
        de::Deserializer::deserialize_struct(self, "", fields, visitor).map_err(|e| e.at(&path))
    }
}
