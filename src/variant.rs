//! Conversion between [`DynamicValue`] and the Automation `VARIANT`.
//!
//! Encoding produces a [`SerializedRecord`] whose header is a [`RawVariant`]. Strings, arrays and
//! object references the variant points to are pinned in the record, so the variant stays valid
//! until the record is released. The memory is not allocated with `SysAllocString` or
//! `SafeArrayCreate`, so the variant must only be passed as an `[in]` argument.

use alloc::vec::Vec;
use core::{mem::size_of, ptr, slice};

use crate::{constants::*, errors::*, record::*, types::*, util::*, value::*};

impl PackedRecord for DynamicValue {
    type Layout = RawVariant;

    fn pack(&self, builder: &mut PackedRecordBuilder) -> Result<RawVariant, MarshalError> {
        let vt = self.value_type().vartype();
        Ok(match self {
            DynamicValue::String(units) => RawVariant::new(vt, &le_usize(builder.pin_bstr(units)?)),
            DynamicValue::Binary(data) => {
                let array = safe_array(
                    FADF_STATIC | FADF_FIXEDSIZE,
                    1,
                    data.len(),
                    builder.pin_bytes(data)?,
                )?;
                RawVariant::new(vt, &le_usize(builder.pin_layout(&array)?))
            }
            DynamicValue::MultiString(strings) => {
                let mut pointers = Vec::with_capacity(strings.len() * size_of::<usize>());
                for string in strings {
                    pointers.extend_from_slice(&le_usize(builder.pin_bstr(string)?));
                }
                let array = safe_array(
                    FADF_STATIC | FADF_FIXEDSIZE | FADF_BSTR,
                    size_of::<usize>() as u32,
                    strings.len(),
                    builder.pin_bytes(&pointers)?,
                )?;
                RawVariant::new(vt, &le_usize(builder.pin_layout(&array)?))
            }
            DynamicValue::Object(object) => RawVariant::new(vt, &le_usize(builder.pin_object(object)?)),
            _ => RawVariant::new(vt, &self.payload()),
        })
    }
}

fn safe_array(
    features: u16, element_size: u32, elements: usize, data: usize,
) -> Result<SafeArray, MarshalError> {
    let elements = u32::try_from(elements).map_err(|_| {
        MarshalError::invalid_configuration(format_args!("array of {} elements too long", elements))
    })?;
    Ok(SafeArray {
        dims: 1,
        features,
        element_size,
        data,
        bound: SafeArrayBound {
            elements,
            lower_bound: 0,
        },
        ..Default::default()
    })
}

/// Read a `BSTR`. A null `BSTR` is the empty string.
unsafe fn read_bstr(pointer: usize) -> Result<Vec<u16>, MarshalError> {
    if pointer == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: a `BSTR` is preceded by its 32-bit byte length.
    let length = unsafe { ptr::read_unaligned((pointer - 4) as *const u32) } as usize;
    if length % 2 != 0 {
        return Err(MarshalError::invalid_data(format_args!("BSTR has odd length {}", length)));
    }
    // SAFETY: the length prefix covers the code units following it.
    Ok(unsafe { slice::from_raw_parts(pointer as *const u16, length / 2) }.to_vec())
}

/// Read a one-dimensional `SAFEARRAY` with elements of the given size.
unsafe fn read_safe_array(pointer: usize, element_size: usize) -> Result<SafeArray, MarshalError> {
    if pointer == 0 {
        return Err(MarshalError::invalid_data("null SAFEARRAY"));
    }
    // SAFETY: every `SAFEARRAY` starts with its dimension count.
    let dims = unsafe { ptr::read_unaligned(pointer as *const u16) };
    if dims != 1 {
        return Err(MarshalError::invalid_data(format_args!("SAFEARRAY has {} dimensions", dims)));
    }
    // SAFETY: a one-dimensional `SAFEARRAY` has exactly one bound.
    let array = unsafe { ptr::read_unaligned(pointer as *const SafeArray) };
    if array.element_size as usize != element_size {
        return Err(MarshalError::invalid_data(format_args!(
            "SAFEARRAY elements have {} bytes, expected {}",
            array.element_size, element_size
        )));
    }
    if array.data == 0 && array.bound.elements > 0 {
        return Err(MarshalError::invalid_data("SAFEARRAY without data"));
    }
    Ok(array)
}

impl DynamicValue {
    /// Encode the value as a `VARIANT`.
    ///
    /// # Returns
    /// A record whose header is a [`RawVariant`] and which keeps every string, array and object
    /// referenced by the variant alive until it is released.
    pub fn to_variant(&self) -> Result<SerializedRecord, MarshalError> { PackedRecordBuilder::build(self) }

    /// Decode a `VARIANT`.
    ///
    /// `VT_INT` and `VT_UINT` decode as `I32` and `U32`, `VT_DISPATCH` as `Object`.
    /// Object references are acquired, the variant keeps its own reference.
    ///
    /// # Returns
    /// Returns [`MarshalError::UnsupportedType`] for `VT_BYREF` and types without a value type,
    /// and [`MarshalError::InvalidData`] for null arrays and objects or arrays of the wrong shape.
    ///
    /// # Safety
    /// Every pointer in the variant has to be valid for its type.
    pub unsafe fn from_variant(variant: &RawVariant) -> Result<Self, MarshalError> {
        if variant.vt & VT_BYREF != 0 {
            return Err(MarshalError::UnsupportedType(variant.vt as u32));
        }
        let vt = match variant.vt {
            VT_INT => VT_I4,
            VT_UINT => VT_UI4,
            VT_DISPATCH => VT_UNKNOWN,
            vt => vt,
        };
        let value_type = ValueType::try_from(vt)?;
        Ok(match value_type {
            ValueType::String => DynamicValue::String(unsafe { read_bstr(variant.pointer()) }?),
            ValueType::Binary => {
                let array = unsafe { read_safe_array(variant.pointer(), 1) }?;
                let elements = array.bound.elements as usize;
                if elements == 0 {
                    DynamicValue::Binary(Vec::new())
                } else {
                    // SAFETY: checked by `read_safe_array`.
                    let data = unsafe { slice::from_raw_parts(array.data as *const u8, elements) };
                    DynamicValue::Binary(data.to_vec())
                }
            }
            ValueType::MultiString => {
                let array = unsafe { read_safe_array(variant.pointer(), size_of::<usize>()) }?;
                let mut strings = Vec::with_capacity(array.bound.elements as usize);
                for index in 0..array.bound.elements as usize {
                    // SAFETY: checked by `read_safe_array`.
                    let pointer =
                        unsafe { ptr::read_unaligned((array.data as *const usize).add(index)) };
                    strings.push(unsafe { read_bstr(pointer) }?);
                }
                DynamicValue::MultiString(strings)
            }
            ValueType::Object => unsafe {
                DynamicValue::decode_with_objects(VT_UNKNOWN, &variant.payload()[..size_of::<usize>()])
            }?,
            _ => {
                let size = value_type.payload_size().unwrap_or_default();
                DynamicValue::decode(vt, &variant.payload()[..size])?
            }
        })
    }
}
