//! Reference-counted handles to foreign COM-style objects.

use core::{ffi::c_void, fmt, mem::ManuallyDrop, ptr::NonNull};

use log::trace;

use crate::{constants::HRESULT, types::Guid};

/// Leading entries of every COM interface vtable.
#[repr(C)]
pub struct UnknownVtbl {
    pub query_interface:
        unsafe extern "system" fn(this: *mut c_void, iid: *const Guid, object: *mut *mut c_void) -> HRESULT,
    pub add_ref: unsafe extern "system" fn(this: *mut c_void) -> u32,
    pub release: unsafe extern "system" fn(this: *mut c_void) -> u32,
}

/// Owned reference to a foreign object implementing `IUnknown`.
///
/// Cloning calls `AddRef`, dropping calls `Release`. Two handles are equal if they point to the
/// same interface. The handle is neither `Send` nor `Sync`: whether the object may be used from
/// another thread depends on its own threading model.
pub struct ForeignObject(NonNull<c_void>);

impl ForeignObject {
    /// Take ownership of one existing reference.
    ///
    /// # Safety
    /// `pointer` has to be null or point to a live object whose first field is a pointer to an
    /// [`UnknownVtbl`]-compatible vtable, and the caller has to own the reference being transferred.
    pub unsafe fn from_raw(pointer: *mut c_void) -> Option<Self> { NonNull::new(pointer).map(Self) }

    /// Acquire a new reference to an object the caller does not own a reference to.
    ///
    /// # Safety
    /// Same as [`from_raw`](Self::from_raw), except that no reference is transferred.
    pub unsafe fn from_raw_borrowed(pointer: *mut c_void) -> Option<Self> {
        let object = ManuallyDrop::new(unsafe { Self::from_raw(pointer) }?);
        Some(ForeignObject::clone(&object))
    }

    /// Returns the interface pointer without affecting the reference count.
    pub fn as_raw(&self) -> *mut c_void { self.0.as_ptr() }

    /// Returns the interface pointer and transfers the owned reference to the caller.
    pub fn into_raw(self) -> *mut c_void { ManuallyDrop::new(self).as_raw() }

    fn vtable(&self) -> &UnknownVtbl {
        // SAFETY: guaranteed by the constructors, the object starts with its vtable pointer.
        unsafe { &**self.0.as_ptr().cast::<*const UnknownVtbl>() }
    }

    /// Query the object for another interface.
    ///
    /// # Returns
    /// The new interface, or the failing `HRESULT`.
    pub fn query_interface(&self, iid: &Guid) -> Result<ForeignObject, HRESULT> {
        let mut object = core::ptr::null_mut();
        // SAFETY: the vtable belongs to this object and `object` is a valid out pointer.
        let result = unsafe { (self.vtable().query_interface)(self.as_raw(), iid, &mut object) };
        if result < 0 {
            return Err(result);
        }
        // SAFETY: a successful `QueryInterface` returns an owned reference.
        unsafe { Self::from_raw(object) }.ok_or(crate::constants::E_POINTER)
    }
}

impl Clone for ForeignObject {
    fn clone(&self) -> Self {
        // SAFETY: the vtable belongs to this object.
        let count = unsafe { (self.vtable().add_ref)(self.as_raw()) };
        trace!("add_ref {:#x?} -> {}", self.0, count);
        Self(self.0)
    }
}

impl Drop for ForeignObject {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference which is given up here.
        let count = unsafe { (self.vtable().release)(self.as_raw()) };
        trace!("release {:#x?} -> {}", self.0, count);
    }
}

impl PartialEq for ForeignObject {
    fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}
impl Eq for ForeignObject {}

impl fmt::Debug for ForeignObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ForeignObject").field(&self.0).finish()
    }
}
