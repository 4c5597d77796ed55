//! Conversion between [`DynamicValue`] and raw registry data.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/sysinfo/registry-value-types> for the
//! layout of each registry type.

use alloc::vec::Vec;

use log::trace;

use crate::{constants::*, errors::*, util::*, value::*};

fn fixed<const N: usize>(name: &str, data: &[u8]) -> Result<[u8; N], MarshalError> {
    read_le(data).map_err(|_| {
        MarshalError::invalid_data(format_args!(
            "{} has {} bytes, expected {}",
            name,
            data.len(),
            N
        ))
    })
}

// a null would end the string early on the reading side
fn without_nul(units: &[u16]) -> Result<(), MarshalError> {
    match units.iter().position(|&c| c == 0) {
        Some(index) => Err(MarshalError::invalid_data(format_args!(
            "string contains a null at unit {}",
            index
        ))),
        None => Ok(()),
    }
}

impl DynamicValue {
    /// Decode a value as returned by `RegQueryValueEx`.
    ///
    /// `REG_DWORD_BIG_ENDIAN` decodes to the same `U32` as `REG_DWORD`, and `REG_EXPAND_SZ` to the
    /// same `String` as `REG_SZ`; strings end at their first null.
    ///
    /// # Returns
    /// Returns [`MarshalError::InvalidData`] if integer data does not have exactly the size of its
    /// type or string data has an odd length, and [`MarshalError::UnsupportedType`] for registry
    /// types that have no corresponding value type.
    pub fn from_registry(reg_type: DWORD, data: &[u8]) -> Result<Self, MarshalError> {
        trace!("decoding registry type {} with {} bytes", reg_type, data.len());
        Ok(match reg_type {
            REG_NONE if data.is_empty() => DynamicValue::Empty,
            REG_NONE | REG_BINARY => DynamicValue::Binary(data.to_vec()),
            REG_DWORD => DynamicValue::U32(u32::from_le_bytes(fixed("REG_DWORD", data)?)),
            REG_DWORD_BIG_ENDIAN => {
                DynamicValue::U32(u32::from_be_bytes(fixed("REG_DWORD_BIG_ENDIAN", data)?))
            }
            REG_QWORD => DynamicValue::U64(u64::from_le_bytes(fixed("REG_QWORD", data)?)),
            REG_SZ | REG_EXPAND_SZ => {
                DynamicValue::String(until_nul(&bytes_to_u16(data)?).to_vec())
            }
            REG_MULTI_SZ => DynamicValue::MultiString(split_multi_string(&bytes_to_u16(data)?)),
            _ => return Err(MarshalError::UnsupportedType(reg_type)),
        })
    }

    /// Encode the value for `RegSetValueEx` using its natural registry type.
    ///
    /// # Returns
    /// The registry type and data, or [`MarshalError::UnsupportedType`] if the value has no
    /// registry representation.
    pub fn to_registry(&self) -> Result<(DWORD, Vec<u8>), MarshalError> {
        let reg_type = match self {
            DynamicValue::Empty => REG_NONE,
            DynamicValue::U32(_) => REG_DWORD,
            DynamicValue::U64(_) => REG_QWORD,
            DynamicValue::String(_) => REG_SZ,
            DynamicValue::MultiString(_) => REG_MULTI_SZ,
            DynamicValue::Binary(_) => REG_BINARY,
            _ => return Err(MarshalError::UnsupportedType(self.value_type().vartype() as u32)),
        };
        self.to_registry_as(reg_type)
    }

    /// Encode the value for `RegSetValueEx` as the given registry type.
    ///
    /// Besides the natural types, strings can be written as `REG_EXPAND_SZ` and `U32` values as
    /// `REG_DWORD_BIG_ENDIAN`.
    ///
    /// # Returns
    /// Returns [`MarshalError::InvalidData`] if a string contains a null, and
    /// [`MarshalError::UnsupportedType`] if the value cannot be written as `reg_type`.
    pub fn to_registry_as(&self, reg_type: DWORD) -> Result<(DWORD, Vec<u8>), MarshalError> {
        let data = match (reg_type, self) {
            (REG_NONE, DynamicValue::Empty) => Vec::new(),
            (REG_NONE | REG_BINARY, DynamicValue::Binary(data)) => data.clone(),
            (REG_DWORD, DynamicValue::U32(value)) => value.to_le_bytes().to_vec(),
            (REG_DWORD_BIG_ENDIAN, DynamicValue::U32(value)) => value.to_be_bytes().to_vec(),
            (REG_QWORD, DynamicValue::U64(value)) => value.to_le_bytes().to_vec(),
            (REG_SZ | REG_EXPAND_SZ, DynamicValue::String(units)) => {
                without_nul(units)?;
                let mut units = units.clone();
                units.push(0);
                u16_to_bytes(&units)
            }
            (REG_MULTI_SZ, DynamicValue::MultiString(strings)) => {
                for units in strings {
                    without_nul(units)?;
                }
                u16_to_bytes(&join_multi_string(strings))
            }
            _ => return Err(MarshalError::UnsupportedType(reg_type)),
        };
        trace!("encoded {:?} as registry type {} ({} bytes)", self.value_type(), reg_type, data.len());
        Ok((reg_type, data))
    }
}
