//! Packed record serialization.
//!
//! A logical record is flattened into a byte-exact foreign layout. Variable-length parts
//! (strings, arrays of sub-records, names, object references) are allocated as independent
//! pinned blocks first, and their addresses are written into the fixed header afterwards.
//! The resulting [`SerializedRecord`] owns every pinned block until it is released.

use alloc::{string::String, vec::Vec};
use core::mem::size_of;

use log::{debug, trace, warn};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::{buffer::ManualBuffer, errors::*, object::ForeignObject, util::*};

/// A record that can be laid out in a foreign, byte-exact format.
pub trait PackedRecord {
    /// The fixed-size foreign layout of the record.
    type Layout: IntoBytes + Immutable;

    /// Lay out the record, pinning every variable-length part through the builder.
    fn pack(&self, builder: &mut PackedRecordBuilder) -> Result<Self::Layout, MarshalError>;
}

/// Union of "load a resource by name or id" and "use an existing handle",
/// as used for icons and similar resource fields.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ResourceRef {
    /// An existing handle, e.g. an `HICON`.
    Handle(usize),
    /// An integer resource id, passed as `MAKEINTRESOURCE(id)`.
    Id(u16),
    /// A resource name, passed as a pointer to a null-terminated string.
    Name(String),
}
impl ResourceRef {
    pub fn is_handle(&self) -> bool { matches!(self, ResourceRef::Handle(_)) }
}

/// Independently allocated block referenced by address from a serialized record.
#[derive(Debug)]
pub enum PinnedBlock {
    Wide(ManualBuffer<u16>),
    Bytes(ManualBuffer<u8>),
    /// 8-byte aligned block for layouts with pointer fields.
    Words(ManualBuffer<u64>),
    /// A reference held on an object whose address was written into the record.
    Object(ForeignObject),
}
impl PinnedBlock {
    /// Returns the address referenced from the record.
    pub fn address(&self) -> usize {
        match self {
            PinnedBlock::Wide(buffer) => buffer.raw_pointer() as usize,
            PinnedBlock::Bytes(buffer) => buffer.raw_pointer() as usize,
            PinnedBlock::Words(buffer) => buffer.raw_pointer() as usize,
            PinnedBlock::Object(object) => object.as_raw() as usize,
        }
    }

    /// Returns the size of the block in bytes, padded to whole words for `Words`.
    /// Objects have no size.
    pub fn size(&self) -> usize {
        match self {
            PinnedBlock::Wide(buffer) => buffer.len() * 2,
            PinnedBlock::Bytes(buffer) => buffer.len(),
            PinnedBlock::Words(buffer) => buffer.len() * 8,
            PinnedBlock::Object(_) => 0,
        }
    }

    /// Returns the contents of the block. Objects have no contents.
    pub fn bytes(&self) -> &[u8] {
        match self {
            PinnedBlock::Wide(buffer) => buffer.as_bytes(),
            PinnedBlock::Bytes(buffer) => buffer.as_slice(),
            PinnedBlock::Words(buffer) => buffer.as_bytes(),
            PinnedBlock::Object(_) => &[],
        }
    }
}

/// Builder that pins the variable-length parts of a record.
///
/// Every block pinned through the builder is released again if the builder is dropped without
/// producing a [`SerializedRecord`], so a failed build never leaks.
#[derive(Debug, Default)]
pub struct PackedRecordBuilder {
    pinned: Vec<PinnedBlock>,
}
impl PackedRecordBuilder {
    pub fn new() -> Self { Self::default() }

    /// Serialize a record into its foreign layout.
    ///
    /// # Returns
    /// The serialized record owning all pinned blocks, or the first error encountered while
    /// packing. On error every block pinned so far has already been released.
    pub fn build<R: PackedRecord>(record: &R) -> Result<SerializedRecord, MarshalError> {
        let mut builder = Self::new();
        let layout = record.pack(&mut builder)?;
        builder.finish(layout.as_bytes())
    }

    /// Returns the number of blocks pinned so far.
    pub fn pinned_count(&self) -> usize { self.pinned.len() }

    /// Returns the blocks pinned so far, in allocation order.
    pub fn pinned(&self) -> &[PinnedBlock] { &self.pinned }

    fn pin(&mut self, block: PinnedBlock) -> Result<usize, MarshalError> {
        self.pinned
            .try_reserve(1)
            .map_err(|_| MarshalError::OutOfMemory(size_of::<PinnedBlock>()))?;
        let address = block.address();
        trace!("pinned block {} at {:#x} ({} bytes)", self.pinned.len(), address, block.size());
        self.pinned.push(block);
        Ok(address)
    }

    /// Pin a null-terminated UTF-16 copy of the text.
    ///
    /// # Returns
    /// The address of the text, or [`MarshalError::InvalidConfiguration`] if the text contains
    /// a null character.
    pub fn pin_text<S: AsRef<str>>(&mut self, text: S) -> Result<usize, MarshalError> {
        let units = string_to_u16_nul(text)?;
        self.pin(PinnedBlock::Wide(ManualBuffer::from_slice(&units)?))
    }

    /// Pin the text if present.
    ///
    /// # Returns
    /// The address of the text, or 0 if absent.
    pub fn pin_optional_text<S: AsRef<str>>(&mut self, text: Option<S>) -> Result<usize, MarshalError> {
        match text {
            Some(text) => self.pin_text(text),
            None => Ok(0),
        }
    }

    /// Pin a string in `BSTR` layout: a 32-bit byte length, the code units and a null.
    ///
    /// # Returns
    /// The `BSTR` pointer, which points to the first code unit after the length prefix.
    pub fn pin_bstr(&mut self, units: &[u16]) -> Result<usize, MarshalError> {
        let length = u32::try_from(units.len() * 2).map_err(|_| {
            MarshalError::invalid_configuration(format_args!("string of {} units too long", units.len()))
        })?;
        let mut buffer = ManualBuffer::with_capacity(units.len() + 3)?;
        buffer.append(&[length as u16, (length >> 16) as u16])?;
        buffer.append(units)?;
        buffer.push(0)?;
        Ok(self.pin(PinnedBlock::Wide(buffer))? + 4)
    }

    /// Pin a copy of the bytes.
    ///
    /// # Returns
    /// The address of the copy, or 0 if the bytes are empty.
    pub fn pin_bytes(&mut self, bytes: &[u8]) -> Result<usize, MarshalError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        self.pin(PinnedBlock::Bytes(ManualBuffer::from_slice(bytes)?))
    }

    /// Pin an 8-byte aligned copy of the layout.
    ///
    /// # Returns
    /// The address of the copy.
    pub fn pin_layout<L: IntoBytes + Immutable>(&mut self, layout: &L) -> Result<usize, MarshalError> {
        let bytes = layout.as_bytes();
        let mut buffer = ManualBuffer::<u64>::new();
        buffer.resize(bytes.len().div_ceil(8).max(1), 0)?;
        buffer.as_mut_slice().as_mut_bytes()[..bytes.len()].copy_from_slice(bytes);
        self.pin(PinnedBlock::Words(buffer))
    }

    /// Pack the sub-records and pin them as one contiguous, 8-byte aligned array.
    ///
    /// # Returns
    /// The element count and the address of the array, or `(0, 0)` if there are no records.
    pub fn pin_records<'r, R: PackedRecord + 'r, I: IntoIterator<Item = &'r R>>(
        &mut self, records: I,
    ) -> Result<(u32, usize), MarshalError> {
        let mut data = ManualBuffer::<u64>::new();
        let mut size = 0usize;
        let mut count = 0u32;
        for record in records {
            let layout = record.pack(self)?;
            let bytes = layout.as_bytes();
            let end = size.checked_add(bytes.len()).ok_or(MarshalError::OutOfMemory(usize::MAX))?;
            data.resize(end.div_ceil(8), 0)?;
            data.as_mut_slice().as_mut_bytes()[size..end].copy_from_slice(bytes);
            size = end;
            count = count.checked_add(1).ok_or_else(|| {
                MarshalError::invalid_configuration("more than u32::MAX records")
            })?;
        }
        if count == 0 {
            return Ok((0, 0));
        }
        let address = self.pin(PinnedBlock::Words(data))?;
        Ok((count, address))
    }

    /// Resolve a resource reference into the pointer-sized value stored in the record.
    ///
    /// # Returns
    /// The handle, the `MAKEINTRESOURCE` value or the address of the pinned name.
    /// Null handles and id 0 are indistinguishable from an absent resource and fail with
    /// [`MarshalError::InvalidConfiguration`].
    pub fn pin_resource(&mut self, resource: &ResourceRef) -> Result<usize, MarshalError> {
        match resource {
            ResourceRef::Handle(0) => Err(MarshalError::invalid_configuration("null resource handle")),
            ResourceRef::Handle(handle) => Ok(*handle),
            ResourceRef::Id(0) => Err(MarshalError::invalid_configuration("resource id 0")),
            ResourceRef::Id(id) => Ok(*id as usize),
            ResourceRef::Name(name) => self.pin_text(name),
        }
    }

    /// Hold a reference on the object for the lifetime of the record.
    ///
    /// # Returns
    /// The interface address of the object.
    pub fn pin_object(&mut self, object: &ForeignObject) -> Result<usize, MarshalError> {
        self.pin(PinnedBlock::Object(object.clone()))
    }

    /// Finish the record with the given header bytes.
    pub fn finish(mut self, header: &[u8]) -> Result<SerializedRecord, MarshalError> {
        let mut bytes = ManualBuffer::<u64>::new();
        bytes.resize(header.len().div_ceil(8), 0)?;
        bytes.as_mut_slice().as_mut_bytes()[..header.len()].copy_from_slice(header);
        let pinned = core::mem::take(&mut self.pinned);
        debug!(
            "serialized {} byte record at {:#x?} with {} pinned blocks",
            header.len(),
            bytes.raw_pointer(),
            pinned.len()
        );
        Ok(SerializedRecord {
            bytes,
            len: header.len(),
            pinned,
        })
    }

    fn release(&mut self) {
        while let Some(block) = self.pinned.pop() {
            trace!("releasing pinned block at {:#x}", block.address());
            drop(block);
        }
    }
}

impl Drop for PackedRecordBuilder {
    fn drop(&mut self) {
        if !self.pinned.is_empty() {
            warn!("record not finished, releasing {} pinned blocks", self.pinned.len());
            self.release();
        }
    }
}

/// Record laid out in its foreign format, together with the blocks it references.
///
/// The header bytes are 8-byte aligned. All addresses stored in them stay valid until the record
/// is released, either explicitly with [`SerializedRecord::release`] or when it is dropped.
/// Pinned blocks are released in reverse allocation order.
#[derive(Debug)]
pub struct SerializedRecord {
    bytes:  ManualBuffer<u64>,
    len:    usize,
    pinned: Vec<PinnedBlock>,
}
impl SerializedRecord {
    /// Returns the address of the header, to be passed to the foreign call.
    pub fn as_ptr(&self) -> *const u8 {
        if self.len == 0 {
            core::ptr::null()
        } else {
            self.bytes.raw_pointer().cast::<u8>().cast_const()
        }
    }

    /// Returns the header bytes.
    pub fn bytes(&self) -> &[u8] { &self.bytes.as_bytes()[..self.len] }

    /// Returns the size of the header in bytes.
    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the pinned blocks in allocation order.
    pub fn pinned(&self) -> &[PinnedBlock] { &self.pinned }

    /// Read a value from the header at the given byte offset.
    pub fn read<T: FromBytes + Copy>(&self, offset: usize) -> Result<T, ReadError> {
        read::<T>(self.bytes().get(offset..).unwrap_or_default())
    }

    /// Read the whole header as its layout type.
    pub fn layout<L: FromBytes + Copy>(&self) -> Result<L, ReadError> { self.read::<L>(0) }

    /// Release the header and every pinned block.
    pub fn release(mut self) { self.release_blocks(); }

    fn release_blocks(&mut self) {
        if self.pinned.is_empty() && self.bytes.capacity() == 0 {
            return;
        }
        trace!("releasing record at {:#x?} with {} pinned blocks", self.as_ptr(), self.pinned.len());
        while let Some(block) = self.pinned.pop() {
            drop(block);
        }
        self.bytes.release();
        self.len = 0;
    }
}

impl Drop for SerializedRecord {
    fn drop(&mut self) { self.release_blocks(); }
}

