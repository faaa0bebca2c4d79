//! Type tags and their mapping onto native wire buffers.
//!
//! A [`TypeTag`] packs a logical scalar kind (the low byte, identical to the
//! driver's native [`FieldType`] code) together with an unsigned flag
//! (`0x200`). The driver only ever sees the two halves separately.

pub mod temporal;
pub mod value;
pub mod wire_time;

pub use temporal::{CalendarTime, Civil, CivilFields};
pub use value::{Encoded, FromValue, Value};
pub use wire_time::{TimestampKind, WIRE_TIME_LEN, WireTime};

/// Bit marking an unsigned integer tag.
pub const UNSIGNED_FLAG: i32 = 0x200;

/// Largest buffer a single result column may claim (2^24 - 1 bytes).
pub const MAX_COLUMN_BUFFER: usize = 0x00ff_ffff;

/// Native column/buffer type codes as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0,
    Tiny = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Null = 6,
    Timestamp = 7,
    LongLong = 8,
    Int24 = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    NewDate = 14,
    Varchar = 15,
    Bit = 16,
    Json = 245,
    NewDecimal = 246,
    Enum = 247,
    Set = 248,
    TinyBlob = 249,
    MediumBlob = 250,
    LongBlob = 251,
    Blob = 252,
    VarString = 253,
    String = 254,
    Geometry = 255,
}

impl FieldType {
    /// Decode a native type code.
    pub fn from_code(code: u8) -> Option<Self> {
        use FieldType::*;
        Some(match code {
            0 => Decimal,
            1 => Tiny,
            2 => Short,
            3 => Long,
            4 => Float,
            5 => Double,
            6 => Null,
            7 => Timestamp,
            8 => LongLong,
            9 => Int24,
            10 => Date,
            11 => Time,
            12 => DateTime,
            13 => Year,
            14 => NewDate,
            15 => Varchar,
            16 => Bit,
            245 => Json,
            246 => NewDecimal,
            247 => Enum,
            248 => Set,
            249 => TinyBlob,
            250 => MediumBlob,
            251 => LongBlob,
            252 => Blob,
            253 => VarString,
            254 => String,
            255 => Geometry,
            _ => return None,
        })
    }

    /// Native type code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Temporal columns are fetched into a [`WireTime`] struct.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FieldType::Timestamp
                | FieldType::Date
                | FieldType::Time
                | FieldType::DateTime
                | FieldType::NewDate
        )
    }

    /// Columns whose wire representation is a length-prefixed byte string.
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            FieldType::Decimal
                | FieldType::NewDecimal
                | FieldType::Varchar
                | FieldType::Bit
                | FieldType::Json
                | FieldType::Enum
                | FieldType::Set
                | FieldType::TinyBlob
                | FieldType::MediumBlob
                | FieldType::LongBlob
                | FieldType::Blob
                | FieldType::VarString
                | FieldType::String
                | FieldType::Geometry
        )
    }
}

/// Shape of the native buffer behind a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferShape {
    /// Fixed-width scalar of the given byte width.
    Fixed(usize),
    /// Length-delimited bytes; `max_len` is the size class ceiling.
    Variable { max_len: u64 },
    /// The fixed temporal struct.
    Temporal,
}

/// Logical type of a bound slot.
///
/// The discriminant is the packed tag: native type code in the low byte,
/// [`UNSIGNED_FLAG`] for unsigned integers, `-1` while unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum TypeTag {
    #[default]
    Unresolved = -1,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Float = 4,
    Double = 5,
    Int64 = 8,
    DateTime = 12,
    /// Variable-length string, up to 65535 characters.
    Varchar = 15,
    /// Binary, max length 2^8 - 1.
    TinyBlob = 249,
    /// Binary, max length 2^24 - 1.
    MediumBlob = 250,
    /// Binary, max length 2^32 - 1.
    LongBlob = 251,
    /// Binary, max length 2^16 - 1.
    Blob = 252,
    /// Variable-length string, up to 255 bytes.
    VarString = 253,
    /// Fixed-length string.
    String = 254,
    UInt8 = 1 | UNSIGNED_FLAG,
    UInt16 = 2 | UNSIGNED_FLAG,
    UInt32 = 3 | UNSIGNED_FLAG,
    UInt64 = 8 | UNSIGNED_FLAG,
}

impl TypeTag {
    /// The packed integral tag.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Rebuild a tag from its packed form.
    pub fn from_code(code: i32) -> Option<Self> {
        use TypeTag::*;
        let tag = match code {
            -1 => Unresolved,
            1 => Int8,
            2 => Int16,
            3 => Int32,
            4 => Float,
            5 => Double,
            8 => Int64,
            12 => DateTime,
            15 => Varchar,
            249 => TinyBlob,
            250 => MediumBlob,
            251 => LongBlob,
            252 => Blob,
            253 => VarString,
            254 => String,
            0x201 => UInt8,
            0x202 => UInt16,
            0x203 => UInt32,
            0x208 => UInt64,
            _ => return None,
        };
        Some(tag)
    }

    /// Native type half of the tag; `None` while unresolved.
    pub fn field_type(self) -> Option<FieldType> {
        if self == TypeTag::Unresolved {
            return None;
        }
        FieldType::from_code((self.code() & 0xff) as u8)
    }

    /// Unsigned half of the tag. Always false for non-integer kinds.
    pub fn is_unsigned(self) -> bool {
        self != TypeTag::Unresolved && self.code() & UNSIGNED_FLAG != 0
    }

    pub fn is_resolved(self) -> bool {
        self != TypeTag::Unresolved
    }

    pub fn is_integer(self) -> bool {
        matches!(self.shape(), Some(BufferShape::Fixed(_)))
            && !matches!(self, TypeTag::Float | TypeTag::Double)
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeTag::Float | TypeTag::Double)
    }

    /// String and blob tags.
    pub fn is_variable(self) -> bool {
        matches!(self.shape(), Some(BufferShape::Variable { .. }))
    }

    /// Native buffer shape; `None` while unresolved.
    pub fn shape(self) -> Option<BufferShape> {
        use TypeTag::*;
        let shape = match self {
            Unresolved => return None,
            Int8 | UInt8 => BufferShape::Fixed(1),
            Int16 | UInt16 => BufferShape::Fixed(2),
            Int32 | UInt32 | Float => BufferShape::Fixed(4),
            Int64 | UInt64 | Double => BufferShape::Fixed(8),
            DateTime => BufferShape::Temporal,
            TinyBlob | VarString => BufferShape::Variable { max_len: 0xff },
            Blob | Varchar => BufferShape::Variable { max_len: 0xffff },
            MediumBlob => BufferShape::Variable {
                max_len: MAX_COLUMN_BUFFER as u64,
            },
            LongBlob => BufferShape::Variable {
                max_len: 0xffff_ffff,
            },
            String => BufferShape::Variable { max_len: 0xff },
        };
        Some(shape)
    }

    /// Tag a result column is fetched as.
    pub fn for_column(field_type: FieldType, unsigned: bool) -> Self {
        use FieldType as F;
        let tag = match field_type {
            F::Tiny => TypeTag::Int8,
            F::Short | F::Year => TypeTag::Int16,
            F::Long | F::Int24 => TypeTag::Int32,
            F::LongLong | F::Null => TypeTag::Int64,
            F::Float => return TypeTag::Float,
            F::Double => return TypeTag::Double,
            F::Timestamp | F::Date | F::Time | F::DateTime | F::NewDate => {
                return TypeTag::DateTime;
            }
            F::TinyBlob => return TypeTag::TinyBlob,
            F::Blob | F::Bit | F::Geometry => return TypeTag::Blob,
            F::MediumBlob => return TypeTag::MediumBlob,
            F::LongBlob => return TypeTag::LongBlob,
            F::Varchar => return TypeTag::Varchar,
            F::String => return TypeTag::String,
            F::VarString | F::Decimal | F::NewDecimal | F::Json | F::Enum | F::Set => {
                return TypeTag::VarString;
            }
        };
        if unsigned { tag.to_unsigned() } else { tag }
    }

    fn to_unsigned(self) -> Self {
        match self {
            TypeTag::Int8 => TypeTag::UInt8,
            TypeTag::Int16 => TypeTag::UInt16,
            TypeTag::Int32 => TypeTag::UInt32,
            TypeTag::Int64 => TypeTag::UInt64,
            other => other,
        }
    }

    /// Short human-readable name used in error messages.
    pub fn name(self) -> &'static str {
        use TypeTag::*;
        match self {
            Unresolved => "unresolved",
            Int8 => "int8",
            UInt8 => "uint8",
            Int16 => "int16",
            UInt16 => "uint16",
            Int32 => "int32",
            UInt32 => "uint32",
            Int64 => "int64",
            UInt64 => "uint64",
            Float => "float",
            Double => "double",
            DateTime => "datetime",
            Varchar | VarString | String => "string",
            TinyBlob | Blob | MediumBlob | LongBlob => "blob",
        }
    }
}
