//! The scalar codec: leaf values to and from byte buffers.
//!
//! The set of scalar kinds is closed. Everything a leaf file can hold is a
//! [`Scalar`], and every leaf is rendered as text:
//!
//! | kind         | stored as                                   |
//! |--------------|---------------------------------------------|
//! | `Text`       | the UTF-8 text itself                       |
//! | `Integer`    | decimal, e.g. `-38`                         |
//! | `Float`      | shortest round-tripping decimal, e.g. `2.5` |
//! | `Float32`    | same, at single precision                   |
//! | `Bool`       | `1` or `0`                                  |
//! | `Timestamp`  | RFC 3339, e.g. `2024-05-01T12:00:00Z`       |
//! | `Locator`    | the URL's canonical serialization           |
//! | `Identifier` | hyphenated lowercase UUID                   |
//! | `Constant`   | the raw text or integer value               |

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;
use uuid::Uuid;

/// The kinds a leaf can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Integer,
    Float,
    Bool,
    Float32,
    Timestamp,
    Locator,
    Identifier,
    Constant,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Text => "text",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Float32 => "float32",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Locator => "locator",
            ScalarKind::Identifier => "identifier",
            ScalarKind::Constant => "constant",
        };
        f.write_str(name)
    }
}

/// The raw stored form of a named constant (an enumeration-like value).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Integer(i64),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// One leaf value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Float32(f32),
    Timestamp(DateTime<Utc>),
    Locator(Url),
    Identifier(Uuid),
    Constant(RawValue),
}

/// Failure to turn stored bytes back into a scalar.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot decode {kind} from {content:?}: {message}")]
pub struct ScalarError {
    pub kind: ScalarKind,
    pub content: String,
    pub message: String,
}

impl ScalarError {
    fn new(kind: ScalarKind, content: &[u8], message: impl fmt::Display) -> Self {
        Self {
            kind,
            content: String::from_utf8_lossy(content).into_owned(),
            message: message.to_string(),
        }
    }
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Text(_) => ScalarKind::Text,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Float32(_) => ScalarKind::Float32,
            Scalar::Timestamp(_) => ScalarKind::Timestamp,
            Scalar::Locator(_) => ScalarKind::Locator,
            Scalar::Identifier(_) => ScalarKind::Identifier,
            Scalar::Constant(_) => ScalarKind::Constant,
        }
    }

    /// The text a leaf file holds for this scalar.
    pub fn render(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Scalar::Float32(f) => f.to_string(),
            Scalar::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Scalar::Locator(u) => u.as_str().to_string(),
            Scalar::Identifier(id) => id.hyphenated().to_string(),
            Scalar::Constant(raw) => raw.to_string(),
        }
    }

    /// Guess the scalar an untyped leaf holds.
    ///
    /// Only canonical renderings count: text that an `Integer` or a finite
    /// `Float` would render to exactly comes back as that number, anything
    /// else (`007`, `1e3`, `inf`) stays text. Bools render as integers and
    /// so come back as `Integer`.
    pub fn infer(text: &str) -> Scalar {
        if let Ok(i) = text.parse::<i64>() {
            if i.to_string() == text {
                return Scalar::Integer(i);
            }
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() && f.to_string() == text => Scalar::Float(f),
            _ => Scalar::Text(text.to_string()),
        }
    }

    /// Encode to the bytes of a leaf file.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.render())
    }

    /// Decode the bytes of a leaf file as `kind`.
    ///
    /// `Bool` accepts anything: exactly `1` is true, everything else is
    /// false. A `Constant` whose content is a decimal integer decodes to an
    /// integer raw value, otherwise to text.
    pub fn from_bytes(kind: ScalarKind, data: &[u8]) -> Result<Scalar, ScalarError> {
        let text = std::str::from_utf8(data).map_err(|e| ScalarError::new(kind, data, e))?;

        let scalar = match kind {
            ScalarKind::Text => Scalar::Text(text.to_string()),
            ScalarKind::Integer => Scalar::Integer(parse(kind, text)?),
            ScalarKind::Float => Scalar::Float(parse(kind, text)?),
            ScalarKind::Bool => Scalar::Bool(text == "1"),
            ScalarKind::Float32 => Scalar::Float32(parse(kind, text)?),
            ScalarKind::Timestamp => {
                let t = DateTime::parse_from_rfc3339(text)
                    .map_err(|e| ScalarError::new(kind, data, e))?;
                Scalar::Timestamp(t.with_timezone(&Utc))
            }
            ScalarKind::Locator => Scalar::Locator(parse(kind, text)?),
            ScalarKind::Identifier => Scalar::Identifier(parse(kind, text)?),
            ScalarKind::Constant => match text.parse::<i64>() {
                Ok(i) => Scalar::Constant(RawValue::Integer(i)),
                Err(_) => Scalar::Constant(RawValue::Text(text.to_string())),
            },
        };
        Ok(scalar)
    }
}

/// Parse leaf text with `FromStr`, reporting failures against `kind`.
pub(crate) fn parse<T>(kind: ScalarKind, text: &str) -> Result<T, ScalarError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| ScalarError::new(kind, text.as_bytes(), e))
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float32(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::Timestamp(v)
    }
}

impl From<Url> for Scalar {
    fn from(v: Url) -> Self {
        Scalar::Locator(v)
    }
}

impl From<Uuid> for Scalar {
    fn from(v: Uuid) -> Self {
        Scalar::Identifier(v)
    }
}

impl From<RawValue> for Scalar {
    fn from(v: RawValue) -> Self {
        Scalar::Constant(v)
    }
}
