//! **Win**dows foreign ABI **marshal**ing primitives.
//!
//! Supports:
//! * Pointer-stable, manually released heap buffers
//! * Dynamic typed values with registry and Automation (`VARIANT`) encodings
//! * Serialization of variable-shaped records into packed foreign layouts
//!
//! See [`ManualBuffer`], [`DynamicValue`] and [`PackedRecordBuilder`] for the main entry points.
//!
//! # Examples
//!
//! ### Registry values
//! ```
//! use winmarshal::{constants::*, DynamicValue};
//!
//! // decode the raw data returned by RegQueryValueExW
//! let value = DynamicValue::from_registry(REG_DWORD, &data)?;
//! let flags = value.as_u32().unwrap_or_default();
//!
//! // encode a value for RegSetValueExW
//! let (reg_type, data) = DynamicValue::string("C:\\Tools").to_registry_as(REG_EXPAND_SZ)?;
//! ```
//!
//! ### Task dialog
//! ```
//! use winmarshal::{constants::*, PackedRecordBuilder, ResourceRef, TaskDialog};
//!
//! let mut dialog = TaskDialog::new();
//! dialog.window_title = Some("Setup".into());
//! dialog.content = Some("Replace the existing installation?".into());
//! dialog.main_icon = Some(ResourceRef::Id(TD_WARNING_ICON));
//! dialog.add_button(100, "Replace").add_button(101, "Keep");
//!
//! // serialize the configuration and every string and button it references
//! let record = PackedRecordBuilder::build(&dialog)?;
//!
//! // the record stays valid until it is released
//! TaskDialogIndirect(record.as_ptr().cast(), &mut button, null_mut(), null_mut());
//! record.release();
//! ```
//!
//! ### Automation values
//! ```
//! use winmarshal::DynamicValue;
//!
//! let value = DynamicValue::string("hello");
//! let variant = value.to_variant()?;
//! dispatch.Invoke(..., variant.as_ptr().cast(), ...);
//! variant.release();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(doc)))]

extern crate alloc;

pub(crate) mod buffer;
pub(crate) mod errors;
pub(crate) mod object;
pub(crate) mod record;
pub(crate) mod registry;
pub(crate) mod task_dialog;
pub(crate) mod util;
pub(crate) mod value;
pub(crate) mod variant;

pub mod constants;
pub mod types;

pub use crate::{buffer::*, errors::*, object::*, record::*, task_dialog::*, value::*};
