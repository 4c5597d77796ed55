use alloc::{string::ToString, vec::Vec};
use core::{any::type_name, mem::size_of};

use zerocopy::FromBytes;

use crate::{MarshalError, ReadError};

pub fn read<T: FromBytes + Copy>(data: &[u8]) -> Result<T, ReadError> {
    T::read_from_prefix(data)
        .map_err(|_| ReadError(type_name::<T>().to_string()))
        .map(|(value, _)| value)
}

/// Copy the bytes of a fixed-width little-endian value, which has to span exactly the given bytes.
pub fn read_le<const N: usize>(data: &[u8]) -> Result<[u8; N], MarshalError> {
    data.try_into().map_err(|_| {
        MarshalError::invalid_data(format_args!("expected {} bytes, got {}", N, data.len()))
    })
}

pub fn bytes_to_u16(data: &[u8]) -> Result<Vec<u16>, MarshalError> {
    if data.len() % 2 != 0 {
        return Err(MarshalError::invalid_data(format_args!(
            "utf-16 data has odd length {}",
            data.len()
        )));
    }
    Ok(data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
}

pub fn u16_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(units.len() * 2);
    data.extend(units.iter().flat_map(|c| c.to_le_bytes()));
    data
}

/// Truncates the units at the first null terminator.
pub fn until_nul(units: &[u16]) -> &[u16] {
    &units[..units.iter().position(|&c| c == 0).unwrap_or(units.len())]
}

pub fn string_to_u16<S: AsRef<str>>(string: S) -> Vec<u16> { string.as_ref().encode_utf16().collect() }

/// Encode a string as null-terminated UTF-16, rejecting interior nulls that would
/// silently truncate the string on the foreign side.
pub fn string_to_u16_nul<S: AsRef<str>>(string: S) -> Result<Vec<u16>, MarshalError> {
    let string = string.as_ref();
    if string.contains('\0') {
        return Err(MarshalError::invalid_configuration(format_args!(
            "string {:?} contains an interior null",
            string
        )));
    }
    let mut data = Vec::with_capacity(string.len() + 1);
    data.extend(string.encode_utf16());
    data.push(0);
    Ok(data)
}

/// Split a `REG_MULTI_SZ` style sequence into its strings.
/// The final terminator is optional, an unterminated last string is kept.
pub fn split_multi_string(units: &[u16]) -> Vec<Vec<u16>> {
    let units = match units.split_last() {
        Some((0, rest)) => rest,
        _ => units,
    };
    if units.is_empty() {
        return Vec::new();
    }
    let mut strings = units.split(|&c| c == 0).map(|s| s.to_vec()).collect::<Vec<_>>();
    if units.last() == Some(&0) {
        strings.pop();
    }
    strings
}

/// Join strings into a `REG_MULTI_SZ` style sequence.
pub fn join_multi_string<S: AsRef<[u16]>>(strings: &[S]) -> Vec<u16> {
    let mut units = Vec::new();
    for string in strings {
        units.extend_from_slice(string.as_ref());
        units.push(0);
    }
    units.push(0);
    units
}

pub fn le_usize(value: usize) -> [u8; size_of::<usize>()] { value.to_le_bytes() }
