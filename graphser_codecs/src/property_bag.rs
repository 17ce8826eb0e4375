use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use graphser_core::{Codec, Encodable, Error, ReadContext, Result, WriteContext};

/// Value of one property.
///
/// Properties read from a file are always `Text`; the other variants carry
/// values a build stores programmatically and only ever reads back opaquely.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The inner value, for dispatch on its own codec.
    pub fn as_encodable(&self) -> &dyn Encodable {
        match self {
            Self::Text(v) => v,
            Self::Bool(v) => v,
            Self::Int(v) => v,
            Self::UInt(v) => v,
            Self::Float(v) => v,
            Self::Bytes(v) => v,
        }
    }

    /// Convert a decoded tagged value. 32-bit integers widen to their 64-bit
    /// variant.
    pub fn from_any(value: Box<dyn Any>) -> Result<Self> {
        macro_rules! try_variant {
            ($value:ident, $ty:ty, $variant:expr) => {
                let $value = match $value.downcast::<$ty>() {
                    Ok(v) => return Ok($variant(*v)),
                    Err(other) => other,
                };
            };
        }
        try_variant!(value, String, Self::Text);
        try_variant!(value, bool, Self::Bool);
        try_variant!(value, i64, Self::Int);
        try_variant!(value, u64, Self::UInt);
        try_variant!(value, f64, Self::Float);
        try_variant!(value, Vec<u8>, Self::Bytes);
        try_variant!(value, i32, |v: i32| Self::Int(v.into()));
        try_variant!(value, u32, |v: u32| Self::UInt(v.into()));
        drop(value);
        Err(Error::TypeMismatch {
            expected: "property value",
            found: "non-scalar value",
        })
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bytes(v) => v.iter().try_for_each(|b| write!(f, "{b:02x}")),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A flat set of properties, as loaded from a properties file.
///
/// Entries are kept in key order, so two equal bags always encode to the
/// same bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    properties: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.properties.insert(name.into(), value.into())
    }

    /// Text value of `name`. Absent and non-text properties both yield `None`.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_str)
    }

    /// Value of `name` whatever its kind.
    pub fn find_unsafe(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Every property whose name starts with `prefix`.
    pub fn properties_with_prefix(&self, prefix: &str) -> BTreeMap<String, PropertyValue> {
        self.properties
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Parse properties-file text.
    ///
    /// Lines starting with `#` or `!` are comments. A key ends at the first
    /// unescaped `=`, `:` or whitespace; a trailing backslash continues the
    /// logical line. `\t`, `\n`, `\r`, `\f` and `\uXXXX` escapes are decoded,
    /// any other escaped character stands for itself. Later keys win.
    pub fn parse(text: &str) -> Self {
        let mut bag = Self::new();
        let mut lines = text.lines();
        while let Some(line) = lines.next() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let mut logical = String::from(line);
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }
            let (key, value) = split_entry(&logical);
            bag.insert(unescape(key), unescape(value));
        }
        bag
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyBag
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (name, value) in iter {
            bag.insert(name, value);
        }
        bag
    }
}

fn ends_with_continuation(line: &str) -> bool {
    let slashes = line.bytes().rev().take_while(|&b| b == b'\\').count();
    slashes % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..i], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Codec for shared property bags.
///
/// The bag is written once per pass behind a shared-identity marker; every
/// further handle to the same `Arc` becomes a back-reference. Each value goes
/// through the tagged path on its own type.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyBagCodec;

impl Codec for PropertyBagCodec {
    type Value = Arc<PropertyBag>;

    fn encode(&self, ctx: &mut WriteContext<'_>, value: &Arc<PropertyBag>) -> Result<()> {
        ctx.encode_preserving_shared_identity(value, |ctx, bag| {
            ctx.write_map_entries(
                bag.properties
                    .iter()
                    .map(|(name, value)| (name as &dyn Encodable, value.as_encodable())),
            )
        })
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<PropertyBag>> {
        ctx.decode_preserving_shared_identity(|ctx| {
            let properties: BTreeMap<String, PropertyValue> =
                ctx.read_map_with(BTreeMap::new, |ctx| PropertyValue::from_any(ctx.read_value()?))?;
            Ok(PropertyBag { properties })
        })
    }
}
