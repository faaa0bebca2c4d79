//! Typed values bound to and read from slots.
//!
//! [`Value`] is the closed set of logical types the binding layer supports.
//! Every Rust type accepted by `set_value` converts into it, and every type
//! readable from a row converts out of it through [`FromValue`].

use super::wire_time::{WIRE_TIME_LEN, WireTime};
use super::{BufferShape, CalendarTime, TypeTag};
use crate::error::ValueError;

/// A value bound to or decoded from a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(CalendarTime),
}

/// Native bytes of a value, ready to copy into a slot.
#[derive(Debug)]
pub enum Encoded<'a> {
    Scalar([u8; 8], usize),
    Time([u8; WIRE_TIME_LEN]),
    Borrowed(&'a [u8]),
}

impl Encoded<'_> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Encoded::Scalar(buf, width) => &buf[..*width],
            Encoded::Time(buf) => buf,
            Encoded::Borrowed(bytes) => bytes,
        }
    }
}

fn scalar<const N: usize>(bytes: [u8; N]) -> Encoded<'static> {
    let mut buf = [0u8; 8];
    buf[..N].copy_from_slice(&bytes);
    Encoded::Scalar(buf, N)
}

impl Value {
    /// Tag inferred from the value's own type.
    pub fn natural_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Unresolved,
            Value::Int8(_) => TypeTag::Int8,
            Value::UInt8(_) => TypeTag::UInt8,
            Value::Int16(_) => TypeTag::Int16,
            Value::UInt16(_) => TypeTag::UInt16,
            Value::Int32(_) => TypeTag::Int32,
            Value::UInt32(_) => TypeTag::UInt32,
            Value::Int64(_) => TypeTag::Int64,
            Value::UInt64(_) => TypeTag::UInt64,
            Value::Float(_) => TypeTag::Float,
            Value::Double(_) => TypeTag::Double,
            Value::Text(_) => TypeTag::VarString,
            Value::Bytes(_) => TypeTag::LongBlob,
            Value::DateTime(_) => TypeTag::DateTime,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "string",
            Value::Bytes(_) => "blob",
            other => other.natural_tag().name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value can be written into a slot of this tag without
    /// changing the slot's tag.
    pub fn fits(&self, tag: TypeTag) -> bool {
        match self {
            Value::Null => true,
            Value::Text(_) | Value::Bytes(_) => tag.is_variable(),
            Value::DateTime(_) => tag == TypeTag::DateTime,
            Value::Float(_) | Value::Double(_) => tag.is_float(),
            _ => tag.is_integer() || tag.is_float(),
        }
    }

    /// Integer content widened to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::Int8(v) => v as i128,
            Value::UInt8(v) => v as i128,
            Value::Int16(v) => v as i128,
            Value::UInt16(v) => v as i128,
            Value::Int32(v) => v as i128,
            Value::UInt32(v) => v as i128,
            Value::Int64(v) => v as i128,
            Value::UInt64(v) => v as i128,
            _ => return None,
        })
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<CalendarTime> {
        match self {
            Value::DateTime(t) => Some(*t),
            _ => None,
        }
    }

    /// Native representation for a slot of type `tag`.
    ///
    /// Integers are written at the tag's declared width; calendar values
    /// are expanded into the fixed temporal struct.
    pub fn encode(&self, tag: TypeTag) -> Result<Encoded<'_>, ValueError> {
        let mismatch = || ValueError::Mismatch {
            expected: tag.name(),
            found: self.kind_name(),
        };
        match self {
            Value::Text(s) if tag.is_variable() => Ok(Encoded::Borrowed(s.as_bytes())),
            Value::Bytes(b) if tag.is_variable() => Ok(Encoded::Borrowed(b)),
            Value::DateTime(t) if tag == TypeTag::DateTime => {
                if t.is_unknown() {
                    return Err(ValueError::InvalidDate(t.to_string()));
                }
                Ok(Encoded::Time(WireTime::from_calendar(t).to_bytes()))
            }
            Value::Float(_) | Value::Double(_) if tag.is_float() => {
                let v = self.as_f64().ok_or_else(mismatch)?;
                Ok(encode_float(v, tag))
            }
            _ => {
                let wide = self.as_i128().ok_or_else(mismatch)?;
                if tag.is_float() {
                    return Ok(encode_float(wide as f64, tag));
                }
                encode_int(wide, tag).ok_or_else(|| {
                    if tag.is_integer() {
                        ValueError::Overflow { target: tag.name() }
                    } else {
                        mismatch()
                    }
                })
            }
        }
    }

    /// Decode native bytes of a slot of type `tag`.
    ///
    /// `data` is the full buffer for fixed and temporal tags and the
    /// length-bounded content for strings and blobs.
    pub fn decode(tag: TypeTag, data: &[u8]) -> Result<Value, ValueError> {
        let short = || ValueError::Mismatch {
            expected: tag.name(),
            found: "short buffer",
        };
        match tag.shape() {
            None => Err(ValueError::Mismatch {
                expected: "resolved type",
                found: "unresolved",
            }),
            Some(BufferShape::Temporal) => {
                let wire = WireTime::from_bytes(data).ok_or_else(short)?;
                wire.to_calendar()
                    .map(Value::DateTime)
                    .map_err(|e| ValueError::InvalidDate(e.to_string()))
            }
            Some(BufferShape::Variable { .. }) => {
                if matches!(tag, TypeTag::Varchar | TypeTag::VarString | TypeTag::String) {
                    if let Ok(s) = std::str::from_utf8(data) {
                        return Ok(Value::Text(s.to_owned()));
                    }
                }
                Ok(Value::Bytes(data.to_vec()))
            }
            Some(BufferShape::Fixed(width)) => {
                let bytes = data.get(..width).ok_or_else(short)?;
                let mut buf = [0u8; 8];
                buf[..width].copy_from_slice(bytes);
                Ok(decode_fixed(tag, buf))
            }
        }
    }
}

fn encode_float(v: f64, tag: TypeTag) -> Encoded<'static> {
    if tag == TypeTag::Float {
        scalar((v as f32).to_ne_bytes())
    } else {
        scalar(v.to_ne_bytes())
    }
}

fn encode_int(v: i128, tag: TypeTag) -> Option<Encoded<'static>> {
    Some(match tag {
        TypeTag::Int8 => scalar(i8::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::UInt8 => scalar(u8::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::Int16 => scalar(i16::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::UInt16 => scalar(u16::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::Int32 => scalar(i32::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::UInt32 => scalar(u32::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::Int64 => scalar(i64::try_from(v).ok()?.to_ne_bytes()),
        TypeTag::UInt64 => scalar(u64::try_from(v).ok()?.to_ne_bytes()),
        _ => return None,
    })
}

fn decode_fixed(tag: TypeTag, b: [u8; 8]) -> Value {
    let b2 = [b[0], b[1]];
    let b4 = [b[0], b[1], b[2], b[3]];
    match tag {
        TypeTag::Int8 => Value::Int8(i8::from_ne_bytes([b[0]])),
        TypeTag::UInt8 => Value::UInt8(b[0]),
        TypeTag::Int16 => Value::Int16(i16::from_ne_bytes(b2)),
        TypeTag::UInt16 => Value::UInt16(u16::from_ne_bytes(b2)),
        TypeTag::Int32 => Value::Int32(i32::from_ne_bytes(b4)),
        TypeTag::UInt32 => Value::UInt32(u32::from_ne_bytes(b4)),
        TypeTag::Float => Value::Float(f32::from_ne_bytes(b4)),
        TypeTag::Int64 => Value::Int64(i64::from_ne_bytes(b)),
        TypeTag::UInt64 => Value::UInt64(u64::from_ne_bytes(b)),
        _ => Value::Double(f64::from_ne_bytes(b)),
    }
}

// ==================== Into Value ====================

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    CalendarTime => DateTime,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int8(v as i8)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(v: &[u8; N]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ==================== From Value ====================

/// Conversion from a decoded value into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

macro_rules! int_from_value {
    ($($t:ty => $name:literal),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let wide = value.as_i128().ok_or(ValueError::Mismatch {
                        expected: $name,
                        found: value.kind_name(),
                    })?;
                    <$t>::try_from(wide).map_err(|_| ValueError::Overflow { target: $name })
                }
            }
        )*
    };
}

int_from_value! {
    i8 => "int8",
    u8 => "uint8",
    i16 => "int16",
    u16 => "uint16",
    i32 => "int32",
    u32 => "uint32",
    i64 => "int64",
    u64 => "uint64",
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        value.as_i128().map(|v| v != 0).ok_or(ValueError::Mismatch {
            expected: "bool",
            found: value.kind_name(),
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        value.as_f64().ok_or(ValueError::Mismatch {
            expected: "double",
            found: value.kind_name(),
        })
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Double(v) => Ok(v as f32),
            other => Err(ValueError::Mismatch {
                expected: "float",
                found: other.kind_name(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b).map_err(|e| ValueError::Utf8(e.to_string())),
            other => Err(ValueError::Mismatch {
                expected: "string",
                found: other.kind_name(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::Mismatch {
                expected: "blob",
                found: other.kind_name(),
            }),
        }
    }
}

impl FromValue for CalendarTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        value.as_datetime().ok_or(ValueError::Mismatch {
            expected: "datetime",
            found: value.kind_name(),
        })
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Build a positional value list for the variadic bind/execute forms.
///
/// ```
/// use mybind::{params, Value};
///
/// let values = params!["Bob", 33, 88.4, None::<i32>];
/// assert_eq!(values[1], Value::Int32(33));
/// assert!(values[3].is_null());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_natural_tags() {
        assert_eq!(Value::from(1u16).natural_tag(), TypeTag::UInt16);
        assert_eq!(Value::from("x").natural_tag(), TypeTag::VarString);
        assert_eq!(Value::from(vec![1u8]).natural_tag(), TypeTag::LongBlob);
        assert_eq!(Value::from(true), Value::Int8(1));
        assert_eq!(
            Value::from(CalendarTime::EPOCH).natural_tag(),
            TypeTag::DateTime
        );
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_encode_at_declared_width() {
        let v = Value::from(7i32);
        let enc = v.encode(TypeTag::Int64).unwrap();
        assert_eq!(enc.as_bytes(), &7i64.to_ne_bytes());

        let enc = v.encode(TypeTag::UInt8).unwrap();
        assert_eq!(enc.as_bytes(), &[7u8]);

        let enc = v.encode(TypeTag::Double).unwrap();
        assert_eq!(enc.as_bytes(), &7f64.to_ne_bytes());
    }

    #[test]
    fn test_encode_overflow_and_mismatch() {
        assert_eq!(
            Value::from(300i32).encode(TypeTag::Int8).unwrap_err(),
            ValueError::Overflow { target: "int8" }
        );
        assert_eq!(
            Value::from(-1i32).encode(TypeTag::UInt32).unwrap_err(),
            ValueError::Overflow { target: "uint32" }
        );
        assert!(matches!(
            Value::from(1.5f64).encode(TypeTag::Int32),
            Err(ValueError::Mismatch { .. })
        ));
        assert!(matches!(
            Value::from("abc").encode(TypeTag::Int32),
            Err(ValueError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_decode_fixed_by_width() {
        let mut buf = [0xffu8; 8];
        buf[..2].copy_from_slice(&(-2i16).to_ne_bytes());
        assert_eq!(Value::decode(TypeTag::Int16, &buf).unwrap(), Value::Int16(-2));
        assert!(Value::decode(TypeTag::Int64, &buf[..4]).is_err());
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(
            Value::decode(TypeTag::VarString, b"hello").unwrap(),
            Value::Text("hello".into())
        );
        assert_eq!(
            Value::decode(TypeTag::VarString, &[0xff, 0xfe]).unwrap(),
            Value::Bytes(vec![0xff, 0xfe])
        );
        assert_eq!(
            Value::decode(TypeTag::Blob, b"hi").unwrap(),
            Value::Bytes(b"hi".to_vec())
        );
    }

    #[test]
    fn test_from_value_conversions() {
        assert_eq!(i64::from_value(Value::Int32(-5)).unwrap(), -5);
        assert_eq!(u8::from_value(Value::Int64(255)).unwrap(), 255);
        assert_eq!(
            i8::from_value(Value::Int64(128)).unwrap_err(),
            ValueError::Overflow { target: "int8" }
        );
        assert_eq!(f64::from_value(Value::Float(0.5)).unwrap(), 0.5);
        assert!(bool::from_value(Value::UInt8(2)).unwrap());
        assert_eq!(String::from_value(Value::Bytes(b"ok".to_vec())).unwrap(), "ok");
        assert!(matches!(
            String::from_value(Value::Bytes(vec![0xff])),
            Err(ValueError::Utf8(_))
        ));
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert!(matches!(
            i32::from_value(Value::Text("1".into())),
            Err(ValueError::Mismatch { expected: "int32", found: "string" })
        ));
    }
}
