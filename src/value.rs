//! Dynamic typed values.
//!
//! [`DynamicValue`] is the closed set of value types that cross the registry and Automation
//! boundaries. Each variant has exactly one payload layout, identified by its [`ValueType`]
//! whose numeric value is the COM `VARTYPE` of the variant.

use alloc::{
    string::String,
    vec::Vec,
};
use core::{ffi::c_void, mem::size_of};

use crate::{constants::*, errors::*, object::ForeignObject, util::*};

const VT_BINARY: VARTYPE = VT_ARRAY | VT_UI1;
const VT_MULTI_STRING: VARTYPE = VT_ARRAY | VT_BSTR;

/// Discriminant of a [`DynamicValue`].
#[repr(u16)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ValueType {
    Empty       = VT_EMPTY,
    Bool        = VT_BOOL,
    I8          = VT_I1,
    U8          = VT_UI1,
    I16         = VT_I2,
    U16         = VT_UI2,
    I32         = VT_I4,
    U32         = VT_UI4,
    I64         = VT_I8,
    U64         = VT_UI8,
    F32         = VT_R4,
    F64         = VT_R8,
    Date        = VT_DATE,
    String      = VT_BSTR,
    MultiString = VT_MULTI_STRING,
    Binary      = VT_BINARY,
    Object      = VT_UNKNOWN,
}
impl ValueType {
    /// Returns the `VARTYPE` of this type.
    pub const fn vartype(self) -> VARTYPE { self as VARTYPE }

    /// Returns the payload size in bytes for fixed-width types.
    pub const fn payload_size(self) -> Option<usize> {
        match self {
            ValueType::Empty => Some(0),
            ValueType::I8 | ValueType::U8 => Some(1),
            ValueType::Bool | ValueType::I16 | ValueType::U16 => Some(2),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(4),
            ValueType::I64 | ValueType::U64 | ValueType::F64 | ValueType::Date => Some(8),
            ValueType::Object => Some(size_of::<usize>()),
            ValueType::String | ValueType::MultiString | ValueType::Binary => None,
        }
    }
}
impl TryFrom<VARTYPE> for ValueType {
    type Error = MarshalError;

    fn try_from(vt: VARTYPE) -> Result<Self, Self::Error> {
        Ok(match vt {
            VT_EMPTY => ValueType::Empty,
            VT_BOOL => ValueType::Bool,
            VT_I1 => ValueType::I8,
            VT_UI1 => ValueType::U8,
            VT_I2 => ValueType::I16,
            VT_UI2 => ValueType::U16,
            VT_I4 => ValueType::I32,
            VT_UI4 => ValueType::U32,
            VT_I8 => ValueType::I64,
            VT_UI8 => ValueType::U64,
            VT_R4 => ValueType::F32,
            VT_R8 => ValueType::F64,
            VT_DATE => ValueType::Date,
            VT_BSTR => ValueType::String,
            VT_MULTI_STRING => ValueType::MultiString,
            VT_BINARY => ValueType::Binary,
            VT_UNKNOWN => ValueType::Object,
            _ => return Err(MarshalError::UnsupportedType(vt as u32)),
        })
    }
}

// days between 1899-12-30 and 1970-01-01
const OLE_UNIX_EPOCH_DAYS: f64 = 25569.0;
const SECONDS_PER_DAY: f64 = 86400.0;
// 100ns intervals between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

/// OLE Automation date: days since 1899-12-30, the fraction being the time of day.
///
/// Dates before the epoch keep the time of day as a positive fraction,
/// so `-1.25` is 1899-12-29 06:00.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct OleDate(pub f64);
impl OleDate {
    pub fn from_unix_seconds(seconds: f64) -> Self {
        let linear = seconds / SECONDS_PER_DAY + OLE_UNIX_EPOCH_DAYS;
        if linear >= 0.0 {
            return Self(linear);
        }
        let mut day = linear as i64 as f64;
        if day > linear {
            day -= 1.0;
        }
        let time = linear - day;
        if time == 0.0 {
            Self(day)
        } else {
            Self(day - time)
        }
    }

    pub fn to_unix_seconds(self) -> f64 {
        let day = self.0 as i64 as f64;
        let time = self.0 - day;
        let linear = day + if time < 0.0 { -time } else { time };
        (linear - OLE_UNIX_EPOCH_DAYS) * SECONDS_PER_DAY
    }

    /// Convert from `FILETIME` ticks (100ns intervals since 1601-01-01).
    pub fn from_filetime(ticks: u64) -> Self {
        Self::from_unix_seconds((ticks as f64 - FILETIME_UNIX_EPOCH as f64) / 10_000_000.0)
    }

    /// Convert to `FILETIME` ticks. Dates before 1601 saturate to 0.
    pub fn to_filetime(self) -> u64 {
        let ticks = self.to_unix_seconds() * 10_000_000.0 + FILETIME_UNIX_EPOCH as f64;
        (ticks + 0.5) as u64
    }

    pub fn days(self) -> f64 { self.0 }
}

/// Dynamic typed value.
///
/// Values of different types are never equal, even when numerically equal:
/// `DynamicValue::U32(1) != DynamicValue::I32(1)`. No ordering is defined.
/// Floating point values and dates compare by their bits, so `NaN` equals itself and
/// `0.0` differs from `-0.0`, matching their payloads.
///
/// Cloning deep-copies strings and blobs and acquires a new reference for objects.
#[derive(Debug, Clone, Default)]
pub enum DynamicValue {
    #[default]
    Empty,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Date(OleDate),
    /// UTF-16 code units without a terminator.
    String(Vec<u16>),
    MultiString(Vec<Vec<u16>>),
    Binary(Vec<u8>),
    Object(ForeignObject),
}

impl PartialEq for DynamicValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DynamicValue::Empty, DynamicValue::Empty) => true,
            (DynamicValue::Bool(a), DynamicValue::Bool(b)) => a == b,
            (DynamicValue::I8(a), DynamicValue::I8(b)) => a == b,
            (DynamicValue::U8(a), DynamicValue::U8(b)) => a == b,
            (DynamicValue::I16(a), DynamicValue::I16(b)) => a == b,
            (DynamicValue::U16(a), DynamicValue::U16(b)) => a == b,
            (DynamicValue::I32(a), DynamicValue::I32(b)) => a == b,
            (DynamicValue::U32(a), DynamicValue::U32(b)) => a == b,
            (DynamicValue::I64(a), DynamicValue::I64(b)) => a == b,
            (DynamicValue::U64(a), DynamicValue::U64(b)) => a == b,
            (DynamicValue::F32(a), DynamicValue::F32(b)) => a.to_bits() == b.to_bits(),
            (DynamicValue::F64(a), DynamicValue::F64(b)) => a.to_bits() == b.to_bits(),
            (DynamicValue::Date(a), DynamicValue::Date(b)) => a.0.to_bits() == b.0.to_bits(),
            (DynamicValue::String(a), DynamicValue::String(b)) => a == b,
            (DynamicValue::MultiString(a), DynamicValue::MultiString(b)) => a == b,
            (DynamicValue::Binary(a), DynamicValue::Binary(b)) => a == b,
            (DynamicValue::Object(a), DynamicValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! scalar_access {
    ($($variant:ident($type:ty) => $accessor:ident),* $(,)?) => {
        impl DynamicValue {
            $(
                #[doc = concat!("Returns the value if this is a `", stringify!($variant), "`.")]
                pub fn $accessor(&self) -> Option<$type> {
                    match self {
                        DynamicValue::$variant(value) => Some(*value),
                        _ => None,
                    }
                }
            )*
        }
        $(
            impl From<$type> for DynamicValue {
                fn from(value: $type) -> Self { DynamicValue::$variant(value) }
            }
        )*
    };
}

scalar_access! {
    Bool(bool) => as_bool,
    I8(i8) => as_i8,
    U8(u8) => as_u8,
    I16(i16) => as_i16,
    U16(u16) => as_u16,
    I32(i32) => as_i32,
    U32(u32) => as_u32,
    I64(i64) => as_i64,
    U64(u64) => as_u64,
    F32(f32) => as_f32,
    F64(f64) => as_f64,
    Date(OleDate) => as_date,
}

impl DynamicValue {
    /// Create a string value from UTF-8.
    pub fn string<S: AsRef<str>>(string: S) -> Self { DynamicValue::String(string_to_u16(string)) }

    /// Create a string value from UTF-16 code units, which should not include a terminator.
    pub fn from_wide<W: Into<Vec<u16>>>(units: W) -> Self { DynamicValue::String(units.into()) }

    /// Create a multi-string value. Strings must not contain nulls to survive encoding.
    pub fn multi_string<I: IntoIterator<Item = S>, S: AsRef<str>>(strings: I) -> Self {
        DynamicValue::MultiString(strings.into_iter().map(string_to_u16).collect())
    }

    /// Returns the discriminant of the value.
    pub fn value_type(&self) -> ValueType {
        match self {
            DynamicValue::Empty => ValueType::Empty,
            DynamicValue::Bool(_) => ValueType::Bool,
            DynamicValue::I8(_) => ValueType::I8,
            DynamicValue::U8(_) => ValueType::U8,
            DynamicValue::I16(_) => ValueType::I16,
            DynamicValue::U16(_) => ValueType::U16,
            DynamicValue::I32(_) => ValueType::I32,
            DynamicValue::U32(_) => ValueType::U32,
            DynamicValue::I64(_) => ValueType::I64,
            DynamicValue::U64(_) => ValueType::U64,
            DynamicValue::F32(_) => ValueType::F32,
            DynamicValue::F64(_) => ValueType::F64,
            DynamicValue::Date(_) => ValueType::Date,
            DynamicValue::String(_) => ValueType::String,
            DynamicValue::MultiString(_) => ValueType::MultiString,
            DynamicValue::Binary(_) => ValueType::Binary,
            DynamicValue::Object(_) => ValueType::Object,
        }
    }

    pub fn is_empty(&self) -> bool { matches!(self, DynamicValue::Empty) }

    /// Free owned data (strings, blobs, object references) and reset the value to `Empty`.
    pub fn release(&mut self) { *self = DynamicValue::Empty; }

    /// Returns the UTF-16 code units if this is a `String`.
    pub fn as_wide(&self) -> Option<&[u16]> {
        match self {
            DynamicValue::String(units) => Some(units),
            _ => None,
        }
    }

    /// Returns the string if this is a `String`. Unpaired surrogates are replaced.
    pub fn as_string(&self) -> Option<String> { self.as_wide().map(String::from_utf16_lossy) }

    /// Returns the strings if this is a `MultiString`. Unpaired surrogates are replaced.
    pub fn as_multi_string(&self) -> Option<Vec<String>> {
        match self {
            DynamicValue::MultiString(strings) => {
                Some(strings.iter().map(|units| String::from_utf16_lossy(units)).collect())
            }
            _ => None,
        }
    }

    /// Returns the bytes if this is a `Binary`.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            DynamicValue::Binary(data) => Some(data),
            _ => None,
        }
    }

    /// Returns a new reference to the object if this is an `Object`.
    pub fn as_object(&self) -> Option<ForeignObject> {
        match self {
            DynamicValue::Object(object) => Some(object.clone()),
            _ => None,
        }
    }

    /// Encode the payload in its fixed little-endian layout.
    ///
    /// Objects encode their interface address; the address is only valid while this value
    /// (or another reference to the object) is alive.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            DynamicValue::Empty => Vec::new(),
            DynamicValue::Bool(value) => {
                (if *value { VARIANT_TRUE } else { VARIANT_FALSE }).to_le_bytes().to_vec()
            }
            DynamicValue::I8(value) => value.to_le_bytes().to_vec(),
            DynamicValue::U8(value) => value.to_le_bytes().to_vec(),
            DynamicValue::I16(value) => value.to_le_bytes().to_vec(),
            DynamicValue::U16(value) => value.to_le_bytes().to_vec(),
            DynamicValue::I32(value) => value.to_le_bytes().to_vec(),
            DynamicValue::U32(value) => value.to_le_bytes().to_vec(),
            DynamicValue::I64(value) => value.to_le_bytes().to_vec(),
            DynamicValue::U64(value) => value.to_le_bytes().to_vec(),
            DynamicValue::F32(value) => value.to_le_bytes().to_vec(),
            DynamicValue::F64(value) => value.to_le_bytes().to_vec(),
            DynamicValue::Date(date) => date.0.to_le_bytes().to_vec(),
            DynamicValue::String(units) => u16_to_bytes(units),
            DynamicValue::MultiString(strings) => u16_to_bytes(&join_multi_string(strings)),
            DynamicValue::Binary(data) => data.clone(),
            DynamicValue::Object(object) => le_usize(object.as_raw() as usize).to_vec(),
        }
    }

    /// Decode a payload of the given `VARTYPE`.
    ///
    /// # Returns
    /// Returns [`MarshalError::UnsupportedType`] for unknown types and for object payloads,
    /// which need [`decode_with_objects`](Self::decode_with_objects), and
    /// [`MarshalError::InvalidData`] if the payload does not match the layout of its type.
    pub fn decode(vt: VARTYPE, data: &[u8]) -> Result<Self, MarshalError> {
        // SAFETY: object payloads are rejected without being dereferenced.
        unsafe { Self::decode_payload(ValueType::try_from(vt)?, data, false) }
    }

    /// Decode a payload of the given `VARTYPE`, resolving object payloads to a new reference.
    ///
    /// # Safety
    /// An object payload has to hold the address of a live object as required by
    /// [`ForeignObject::from_raw_borrowed`].
    pub unsafe fn decode_with_objects(vt: VARTYPE, data: &[u8]) -> Result<Self, MarshalError> {
        unsafe { Self::decode_payload(ValueType::try_from(vt)?, data, true) }
    }

    unsafe fn decode_payload(
        value_type: ValueType, data: &[u8], objects: bool,
    ) -> Result<Self, MarshalError> {
        if let Some(size) = value_type.payload_size() {
            if data.len() != size {
                return Err(MarshalError::invalid_data(format_args!(
                    "{:?} payload has {} bytes, expected {}",
                    value_type,
                    data.len(),
                    size
                )));
            }
        }
        Ok(match value_type {
            ValueType::Empty => DynamicValue::Empty,
            ValueType::Bool => DynamicValue::Bool(i16::from_le_bytes(read_le(data)?) != 0),
            ValueType::I8 => DynamicValue::I8(i8::from_le_bytes(read_le(data)?)),
            ValueType::U8 => DynamicValue::U8(u8::from_le_bytes(read_le(data)?)),
            ValueType::I16 => DynamicValue::I16(i16::from_le_bytes(read_le(data)?)),
            ValueType::U16 => DynamicValue::U16(u16::from_le_bytes(read_le(data)?)),
            ValueType::I32 => DynamicValue::I32(i32::from_le_bytes(read_le(data)?)),
            ValueType::U32 => DynamicValue::U32(u32::from_le_bytes(read_le(data)?)),
            ValueType::I64 => DynamicValue::I64(i64::from_le_bytes(read_le(data)?)),
            ValueType::U64 => DynamicValue::U64(u64::from_le_bytes(read_le(data)?)),
            ValueType::F32 => DynamicValue::F32(f32::from_le_bytes(read_le(data)?)),
            ValueType::F64 => DynamicValue::F64(f64::from_le_bytes(read_le(data)?)),
            ValueType::Date => DynamicValue::Date(OleDate(f64::from_le_bytes(read_le(data)?))),
            ValueType::String => DynamicValue::String(bytes_to_u16(data)?),
            ValueType::MultiString => {
                DynamicValue::MultiString(split_multi_string(&bytes_to_u16(data)?))
            }
            ValueType::Binary => DynamicValue::Binary(data.to_vec()),
            ValueType::Object => {
                if !objects {
                    return Err(MarshalError::UnsupportedType(VT_UNKNOWN as u32));
                }
                let pointer = usize::from_le_bytes(read_le(data)?);
                // SAFETY: guaranteed by the caller of `decode_with_objects`.
                let object = unsafe { ForeignObject::from_raw_borrowed(pointer as *mut c_void) }
                    .ok_or_else(|| MarshalError::invalid_data("null object reference"))?;
                DynamicValue::Object(object)
            }
        })
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self { DynamicValue::string(value) }
}
impl From<String> for DynamicValue {
    fn from(value: String) -> Self { DynamicValue::string(value) }
}
impl From<&[u8]> for DynamicValue {
    fn from(value: &[u8]) -> Self { DynamicValue::Binary(value.to_vec()) }
}
impl From<Vec<u8>> for DynamicValue {
    fn from(value: Vec<u8>) -> Self { DynamicValue::Binary(value) }
}
impl From<ForeignObject> for DynamicValue {
    fn from(value: ForeignObject) -> Self { DynamicValue::Object(value) }
}
