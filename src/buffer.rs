//! Growable buffer with a stable address, allocated directly from the process heap.
//!
//! Foreign calls often need an array whose address does not move for the duration of
//! the call. [`ManualBuffer`] owns exactly one heap allocation and never moves it unless
//! its capacity grows, so a pointer obtained from [`ManualBuffer::raw_pointer`] stays valid
//! until the next call that reserves more capacity.

use alloc::alloc::{alloc, dealloc, realloc, Layout};
use core::{
    fmt,
    mem::size_of,
    ptr::{self, NonNull},
    slice,
};

use log::trace;
use zerocopy::{Immutable, IntoBytes};

use crate::errors::*;

/// Growable, pointer-stable array of plain values.
///
/// The allocation is released by [`ManualBuffer::release`], which also runs when the buffer
/// goes out of scope. Releasing is idempotent.
pub struct ManualBuffer<T: Copy> {
    ptr:      NonNull<T>,
    len:      usize,
    capacity: usize,
}

// SAFETY: the buffer exclusively owns its allocation and only hands out access through
// borrows of itself.
unsafe impl<T: Copy + Send> Send for ManualBuffer<T> {}
// SAFETY: shared access only reads.
unsafe impl<T: Copy + Sync> Sync for ManualBuffer<T> {}

impl<T: Copy> ManualBuffer<T> {
    /// Create an empty buffer without allocating.
    pub const fn new() -> Self {
        Self {
            ptr:      NonNull::dangling(),
            len:      0,
            capacity: 0,
        }
    }

    /// Create an empty buffer with room for at least `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Result<Self, MarshalError> {
        let mut buffer = Self::new();
        buffer.reserve(capacity)?;
        Ok(buffer)
    }

    /// Create a buffer holding a copy of the given values.
    pub fn from_slice(values: &[T]) -> Result<Self, MarshalError> {
        let mut buffer = Self::with_capacity(values.len())?;
        buffer.append(values)?;
        Ok(buffer)
    }

    /// Returns the number of elements in use.
    pub fn len(&self) -> usize { self.len }

    /// Returns `true` if no elements are in use.
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the number of elements the current allocation can hold.
    pub fn capacity(&self) -> usize { self.capacity }

    /// Returns the base address of the allocation, or null if nothing is allocated.
    ///
    /// The address is invalidated by every call that grows the capacity
    /// ([`reserve`](Self::reserve), [`append`](Self::append), [`push`](Self::push),
    /// [`resize`](Self::resize)) and by [`release`](Self::release).
    pub fn raw_pointer(&self) -> *mut T {
        if self.capacity == 0 {
            ptr::null_mut()
        } else {
            self.ptr.as_ptr()
        }
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` elements are initialized and `ptr` is valid or dangling for `len == 0`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: see `as_slice`, the buffer is borrowed mutably.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Ensure the buffer can hold at least `capacity` elements.
    /// Never shrinks the allocation.
    ///
    /// # Returns
    /// Returns [`MarshalError::OutOfMemory`] if the heap cannot satisfy the request.
    /// The buffer is left unchanged in that case.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), MarshalError> {
        if capacity <= self.capacity {
            return Ok(());
        }
        let layout = Layout::array::<T>(capacity)
            .map_err(|_| MarshalError::OutOfMemory(capacity.saturating_mul(size_of::<T>())))?;
        if layout.size() == 0 {
            self.capacity = capacity;
            return Ok(());
        }

        let ptr = if self.capacity == 0 {
            // SAFETY: the layout has a non-zero size.
            unsafe { alloc(layout) }
        } else {
            let old_layout = Layout::array::<T>(self.capacity)
                .map_err(|_| MarshalError::OutOfMemory(layout.size()))?;
            // SAFETY: `ptr` was allocated with `old_layout`, the new size is non-zero and fits `isize`.
            unsafe { realloc(self.ptr.as_ptr().cast(), old_layout, layout.size()) }
        };
        let ptr = NonNull::new(ptr.cast::<T>()).ok_or(MarshalError::OutOfMemory(layout.size()))?;
        trace!(
            "buffer {:#x?} -> {:#x?}: capacity {} -> {} ({} bytes)",
            self.raw_pointer(),
            ptr,
            self.capacity,
            capacity,
            layout.size()
        );
        self.ptr = ptr;
        self.capacity = capacity;
        Ok(())
    }

    fn grow_for(&mut self, additional: usize) -> Result<usize, MarshalError> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(MarshalError::OutOfMemory(usize::MAX))?;
        if needed > self.capacity {
            let doubled = needed.max(self.capacity.saturating_mul(2));
            if doubled > needed && self.reserve(doubled).is_ok() {
                return Ok(needed);
            }
            self.reserve(needed)?;
        }
        Ok(needed)
    }

    /// Append the values to the end of the buffer.
    pub fn append(&mut self, values: &[T]) -> Result<(), MarshalError> {
        let len = self.grow_for(values.len())?;
        // SAFETY: capacity covers `len` elements and `values` cannot alias the exclusively borrowed buffer.
        unsafe {
            ptr::copy_nonoverlapping(values.as_ptr(), self.ptr.as_ptr().add(self.len), values.len());
        }
        self.len = len;
        Ok(())
    }

    /// Append a single value to the end of the buffer.
    pub fn push(&mut self, value: T) -> Result<(), MarshalError> {
        self.append(slice::from_ref(&value))
    }

    /// Resize the buffer to `len` elements.
    /// New elements are set to `fill`; elements removed by shrinking are zeroed first so
    /// no stale data stays visible to the foreign side.
    pub fn resize(&mut self, len: usize, fill: T) -> Result<(), MarshalError> {
        if len > self.len {
            self.grow_for(len - self.len)?;
            for index in self.len..len {
                // SAFETY: `index` is below the capacity.
                unsafe { self.ptr.as_ptr().add(index).write(fill) };
            }
        } else {
            self.zero(len, self.len - len);
        }
        self.len = len;
        Ok(())
    }

    /// Zero every element in use and set the length to 0. The capacity is unchanged.
    pub fn clear(&mut self) {
        self.zero(0, self.len);
        self.len = 0;
    }

    fn zero(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        // SAFETY: `start + count` is at most `len`, which is within the allocation.
        unsafe { ptr::write_bytes(self.ptr.as_ptr().add(start), 0, count) };
    }

    /// Free the allocation. Calling this more than once has no effect.
    /// Afterwards the capacity and length are 0 and [`raw_pointer`](Self::raw_pointer) is null.
    pub fn release(&mut self) {
        if self.capacity > 0 && size_of::<T>() > 0 {
            trace!("releasing buffer {:#x?} ({} elements)", self.ptr, self.capacity);
            if let Ok(layout) = Layout::array::<T>(self.capacity) {
                // SAFETY: `ptr` was allocated with this layout and is not used afterwards.
                unsafe { dealloc(self.ptr.as_ptr().cast(), layout) };
            }
        }
        self.ptr = NonNull::dangling();
        self.len = 0;
        self.capacity = 0;
    }
}

impl<T: Copy + IntoBytes + Immutable> ManualBuffer<T> {
    /// Returns the elements in use as raw bytes.
    pub fn as_bytes(&self) -> &[u8] { self.as_slice().as_bytes() }
}

impl<T: Copy> Drop for ManualBuffer<T> {
    fn drop(&mut self) { self.release(); }
}

impl<T: Copy> Default for ManualBuffer<T> {
    fn default() -> Self { Self::new() }
}

impl<T: Copy> fmt::Debug for ManualBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualBuffer")
            .field("ptr", &self.raw_pointer())
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}
