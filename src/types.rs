//! Foreign data types.
//!
//! These types are a one-to-one mapping of the Windows structures they are named after.
//! Pointer-sized fields are `usize`, so the layouts follow the pointer width of the build target.

use core::mem::size_of;

use zerocopy::{FromBytes, Immutable, IntoBytes};

/// `TASKDIALOGCONFIG`, declared under `#pragma pack(1)` in `commctrl.h`.
///
/// | field                     | 64-bit | 32-bit |
/// |---------------------------|--------|--------|
/// | `size`                    | 0      | 0      |
/// | `hwnd_parent`             | 4      | 4      |
/// | `instance`                | 12     | 8      |
/// | `flags`                   | 20     | 12     |
/// | `common_buttons`          | 24     | 16     |
/// | `window_title`            | 28     | 20     |
/// | `main_icon`               | 36     | 24     |
/// | `main_instruction`        | 44     | 28     |
/// | `content`                 | 52     | 32     |
/// | `buttons_count`           | 60     | 36     |
/// | `buttons`                 | 64     | 40     |
/// | `default_button`          | 72     | 44     |
/// | `radio_buttons_count`     | 76     | 48     |
/// | `radio_buttons`           | 80     | 52     |
/// | `default_radio_button`    | 88     | 56     |
/// | `verification_text`       | 92     | 60     |
/// | `expanded_information`    | 100    | 64     |
/// | `expanded_control_text`   | 108    | 68     |
/// | `collapsed_control_text`  | 116    | 72     |
/// | `footer_icon`             | 124    | 76     |
/// | `footer`                  | 132    | 80     |
/// | `callback`                | 140    | 84     |
/// | `callback_data`           | 148    | 88     |
/// | `width`                   | 156    | 92     |
/// | size                      | 160    | 96     |
#[repr(C, packed(1))]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromBytes, IntoBytes, Immutable, Default)]
pub struct TaskDialogConfig {
    pub size:                   u32,
    pub hwnd_parent:            usize,
    pub instance:               usize,
    pub flags:                  u32,
    pub common_buttons:         u32,
    pub window_title:           usize,
    pub main_icon:              usize,
    pub main_instruction:       usize,
    pub content:                usize,
    pub buttons_count:          u32,
    pub buttons:                usize,
    pub default_button:         i32,
    pub radio_buttons_count:    u32,
    pub radio_buttons:          usize,
    pub default_radio_button:   i32,
    pub verification_text:      usize,
    pub expanded_information:   usize,
    pub expanded_control_text:  usize,
    pub collapsed_control_text: usize,
    pub footer_icon:            usize,
    pub footer:                 usize,
    pub callback:               usize,
    pub callback_data:          isize,
    pub width:                  u32,
}

/// `TASKDIALOG_BUTTON`, declared under `#pragma pack(1)` in `commctrl.h`.
#[repr(C, packed(1))]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromBytes, IntoBytes, Immutable, Default)]
pub struct TaskDialogButton {
    pub button_id:   i32,
    pub button_text: usize,
}

#[repr(C)]
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, FromBytes, IntoBytes, Immutable,
    Default,
)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// Number of 8 byte words in the `VARIANT` data union.
/// The union is as large as two pointers (`BRECORD`), but at least 8 bytes.
pub const VARIANT_DATA_WORDS: usize = 2 * size_of::<usize>() / 8;

/// `VARIANT` without the `DECIMAL` overlay.
///
/// The data union starts at offset 8. Scalars occupy its first bytes, pointers
/// (`BSTR`, `SAFEARRAY*`, `IUnknown*`) its first pointer-sized word.
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromBytes, IntoBytes, Immutable, Default)]
pub struct RawVariant {
    pub vt:        u16,
    pub reserved1: u16,
    pub reserved2: u16,
    pub reserved3: u16,
    pub data:      [u64; VARIANT_DATA_WORDS],
}
impl RawVariant {
    /// Create a variant of the given type with the payload at the start of the data union.
    /// Payloads longer than the union are truncated.
    pub fn new(vt: u16, payload: &[u8]) -> Self {
        let mut variant = Self { vt, ..Default::default() };
        let data = variant.data.as_mut_bytes();
        let len = payload.len().min(data.len());
        data[..len].copy_from_slice(&payload[..len]);
        variant
    }

    /// Returns the raw bytes of the data union.
    pub fn payload(&self) -> &[u8] { self.data.as_bytes() }

    /// Returns the pointer stored at the start of the data union.
    pub fn pointer(&self) -> usize {
        let mut pointer = [0u8; size_of::<usize>()];
        pointer.copy_from_slice(&self.payload()[..size_of::<usize>()]);
        usize::from_le_bytes(pointer)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromBytes, IntoBytes, Immutable, Default)]
pub struct SafeArrayBound {
    pub elements:    u32,
    pub lower_bound: i32,
}

/// Padding between `locks` and `data` in `SAFEARRAY`.
pub const SAFEARRAY_PADDING: usize = size_of::<usize>() - 4;

/// One-dimensional `SAFEARRAY`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromBytes, IntoBytes, Immutable, Default)]
pub struct SafeArray {
    pub dims:         u16,
    pub features:     u16,
    pub element_size: u32,
    pub locks:        u32,
    pub padding:      [u8; SAFEARRAY_PADDING],
    pub data:         usize,
    pub bound:        SafeArrayBound,
}
