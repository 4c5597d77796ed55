//! Windows API and binary constants.

#![allow(non_upper_case_globals)]

pub type DWORD = u32;
pub type UINT = u32;
pub type WORD = u16;
pub type VARTYPE = u16;
pub type HRESULT = i32;


// https://learn.microsoft.com/en-us/windows/win32/sysinfo/registry-value-types

pub const REG_NONE: DWORD = 0;
pub const REG_SZ: DWORD = 1;
pub const REG_EXPAND_SZ: DWORD = 2;
pub const REG_BINARY: DWORD = 3;
pub const REG_DWORD: DWORD = 4;
pub const REG_DWORD_LITTLE_ENDIAN: DWORD = 4;
pub const REG_DWORD_BIG_ENDIAN: DWORD = 5;
pub const REG_LINK: DWORD = 6;
pub const REG_MULTI_SZ: DWORD = 7;
pub const REG_RESOURCE_LIST: DWORD = 8;
pub const REG_FULL_RESOURCE_DESCRIPTOR: DWORD = 9;
pub const REG_RESOURCE_REQUIREMENTS_LIST: DWORD = 10;
pub const REG_QWORD: DWORD = 11;
pub const REG_QWORD_LITTLE_ENDIAN: DWORD = 11;


// https://learn.microsoft.com/en-us/windows/win32/api/wtypes/ne-wtypes-varenum

pub const VT_EMPTY: VARTYPE = 0;
pub const VT_NULL: VARTYPE = 1;
pub const VT_I2: VARTYPE = 2;
pub const VT_I4: VARTYPE = 3;
pub const VT_R4: VARTYPE = 4;
pub const VT_R8: VARTYPE = 5;
pub const VT_CY: VARTYPE = 6;
pub const VT_DATE: VARTYPE = 7;
pub const VT_BSTR: VARTYPE = 8;
pub const VT_DISPATCH: VARTYPE = 9;
pub const VT_ERROR: VARTYPE = 10;
pub const VT_BOOL: VARTYPE = 11;
pub const VT_VARIANT: VARTYPE = 12;
pub const VT_UNKNOWN: VARTYPE = 13;
pub const VT_DECIMAL: VARTYPE = 14;
pub const VT_I1: VARTYPE = 16;
pub const VT_UI1: VARTYPE = 17;
pub const VT_UI2: VARTYPE = 18;
pub const VT_UI4: VARTYPE = 19;
pub const VT_I8: VARTYPE = 20;
pub const VT_UI8: VARTYPE = 21;
pub const VT_INT: VARTYPE = 22;
pub const VT_UINT: VARTYPE = 23;
pub const VT_ARRAY: VARTYPE = 0x2000;
pub const VT_BYREF: VARTYPE = 0x4000;
pub const VT_TYPEMASK: VARTYPE = 0x0fff;

pub const VARIANT_TRUE: i16 = -1;
pub const VARIANT_FALSE: i16 = 0;


// https://learn.microsoft.com/en-us/windows/win32/api/oaidl/ns-oaidl-safearray

pub const FADF_AUTO: WORD = 0x0001;
pub const FADF_STATIC: WORD = 0x0002;
pub const FADF_EMBEDDED: WORD = 0x0004;
pub const FADF_FIXEDSIZE: WORD = 0x0010;
pub const FADF_RECORD: WORD = 0x0020;
pub const FADF_HAVEIID: WORD = 0x0040;
pub const FADF_HAVEVARTYPE: WORD = 0x0080;
pub const FADF_BSTR: WORD = 0x0100;
pub const FADF_UNKNOWN: WORD = 0x0200;
pub const FADF_DISPATCH: WORD = 0x0400;
pub const FADF_VARIANT: WORD = 0x0800;


// https://learn.microsoft.com/en-us/windows/win32/api/commctrl/ns-commctrl-taskdialogconfig

pub const TDF_ENABLE_HYPERLINKS: DWORD = 0x0001;
pub const TDF_USE_HICON_MAIN: DWORD = 0x0002;
pub const TDF_USE_HICON_FOOTER: DWORD = 0x0004;
pub const TDF_ALLOW_DIALOG_CANCELLATION: DWORD = 0x0008;
pub const TDF_USE_COMMAND_LINKS: DWORD = 0x0010;
pub const TDF_USE_COMMAND_LINKS_NO_ICON: DWORD = 0x0020;
pub const TDF_EXPAND_FOOTER_AREA: DWORD = 0x0040;
pub const TDF_EXPANDED_BY_DEFAULT: DWORD = 0x0080;
pub const TDF_VERIFICATION_FLAG_CHECKED: DWORD = 0x0100;
pub const TDF_SHOW_PROGRESS_BAR: DWORD = 0x0200;
pub const TDF_SHOW_MARQUEE_PROGRESS_BAR: DWORD = 0x0400;
pub const TDF_CALLBACK_TIMER: DWORD = 0x0800;
pub const TDF_POSITION_RELATIVE_TO_WINDOW: DWORD = 0x1000;
pub const TDF_RTL_LAYOUT: DWORD = 0x2000;
pub const TDF_NO_DEFAULT_RADIO_BUTTON: DWORD = 0x4000;
pub const TDF_CAN_BE_MINIMIZED: DWORD = 0x8000;
pub const TDF_NO_SET_FOREGROUND: DWORD = 0x00010000;
pub const TDF_SIZE_TO_CONTENT: DWORD = 0x01000000;

pub const TDCBF_OK_BUTTON: DWORD = 0x0001;
pub const TDCBF_YES_BUTTON: DWORD = 0x0002;
pub const TDCBF_NO_BUTTON: DWORD = 0x0004;
pub const TDCBF_CANCEL_BUTTON: DWORD = 0x0008;
pub const TDCBF_RETRY_BUTTON: DWORD = 0x0010;
pub const TDCBF_CLOSE_BUTTON: DWORD = 0x0020;

// MAKEINTRESOURCEW(-1) through MAKEINTRESOURCEW(-4)
pub const TD_WARNING_ICON: WORD = 0xFFFF;
pub const TD_ERROR_ICON: WORD = 0xFFFE;
pub const TD_INFORMATION_ICON: WORD = 0xFFFD;
pub const TD_SHIELD_ICON: WORD = 0xFFFC;


// https://learn.microsoft.com/en-us/windows/win32/seccrypto/common-hresult-values

pub const S_OK: HRESULT = 0;
pub const E_NOINTERFACE: HRESULT = 0x80004002_u32 as HRESULT;
pub const E_POINTER: HRESULT = 0x80004003_u32 as HRESULT;
