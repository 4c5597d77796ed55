use core::{
    ffi::c_void,
    mem::{offset_of, size_of},
    ptr,
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Once,
};

use winmarshal::{constants::*, types::*, *};

static INIT_LOGGER: Once = Once::new();
fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::builder()
            .is_test(false)
            .filter_level(log::LevelFilter::Info)
            .format_timestamp(None)
            .format_module_path(false)
            .format_level(true)
            .format_target(false)
            .write_style(env_logger::WriteStyle::Auto)
            .init();
    });
}

#[repr(C)]
struct FakeObject {
    vtable:     *const UnknownVtbl,
    references: AtomicU32,
}

unsafe extern "system" fn fake_query_interface(
    _this: *mut c_void, _iid: *const Guid, object: *mut *mut c_void,
) -> HRESULT {
    unsafe { *object = ptr::null_mut() };
    E_NOINTERFACE
}

unsafe extern "system" fn fake_add_ref(this: *mut c_void) -> u32 {
    unsafe { &*(this as *const FakeObject) }.references.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn fake_release(this: *mut c_void) -> u32 {
    unsafe { &*(this as *const FakeObject) }.references.fetch_sub(1, Ordering::SeqCst) - 1
}

static FAKE_VTABLE: UnknownVtbl = UnknownVtbl {
    query_interface: fake_query_interface,
    add_ref:         fake_add_ref,
    release:         fake_release,
};

impl FakeObject {
    fn new() -> Box<Self> {
        Box::new(Self {
            vtable:     &FAKE_VTABLE,
            references: AtomicU32::new(1),
        })
    }

    fn pointer(&self) -> *mut c_void { self as *const Self as *mut c_void }

    fn references(&self) -> u32 { self.references.load(Ordering::SeqCst) }

    fn borrow(&self) -> ForeignObject { unsafe { ForeignObject::from_raw_borrowed(self.pointer()) }.unwrap() }
}

unsafe fn wide_at(address: usize) -> String {
    let mut units = Vec::new();
    let mut pointer = address as *const u16;
    loop {
        let unit = unsafe { ptr::read_unaligned(pointer) };
        if unit == 0 {
            break;
        }
        units.push(unit);
        pointer = unsafe { pointer.add(1) };
    }
    String::from_utf16(&units).unwrap()
}

// buffer

#[test]
fn buffer_append_grows_length() {
    init_logger();

    let mut buffer = ManualBuffer::<u32>::new();
    assert!(buffer.raw_pointer().is_null(), "empty buffer has no address");

    let mut last_len = 0;
    for i in 0..100u32 {
        buffer.append(&[i, i + 1]).unwrap();
        assert!(buffer.len() > last_len, "length grows monotonically");
        assert!(buffer.len() <= buffer.capacity(), "length within capacity");
        last_len = buffer.len();
    }
    assert_eq!(buffer.len(), 200);
    assert_eq!(&buffer.as_slice()[..4], &[0, 1, 1, 2]);
    assert!(!buffer.raw_pointer().is_null());
}

#[test]
fn buffer_resize_zeroes_vacated_slots() {
    init_logger();

    let mut buffer = ManualBuffer::from_slice(&[0xAAAA_AAAAu32; 8]).unwrap();
    let capacity = buffer.capacity();

    buffer.resize(3, 0).unwrap();
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.capacity(), capacity, "shrinking keeps the allocation");
    for index in 3..8 {
        let stale = unsafe { *buffer.raw_pointer().add(index) };
        assert_eq!(stale, 0, "vacated slot {} is zeroed", index);
    }

    buffer.resize(6, 7).unwrap();
    assert_eq!(buffer.as_slice(), &[0xAAAA_AAAA, 0xAAAA_AAAA, 0xAAAA_AAAA, 7, 7, 7]);
}

#[test]
fn buffer_clear_and_reserve() {
    init_logger();

    let mut buffer = ManualBuffer::<u16>::with_capacity(16).unwrap();
    assert_eq!(buffer.capacity(), 16);
    buffer.append(&[1, 2, 3]).unwrap();
    let pointer = buffer.raw_pointer();

    buffer.reserve(4).unwrap();
    assert_eq!(buffer.capacity(), 16, "reserve never shrinks");
    assert_eq!(buffer.raw_pointer(), pointer, "no reallocation without growth");

    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.capacity(), 16);
    assert_eq!(unsafe { *buffer.raw_pointer() }, 0, "cleared slots are zeroed");

    buffer.push(9).unwrap();
    assert_eq!(buffer.as_slice(), &[9]);
    assert_eq!(buffer.as_bytes(), &[9, 0]);
}

#[test]
fn buffer_release_is_idempotent() {
    init_logger();

    let mut buffer = ManualBuffer::from_slice(b"foreign").unwrap();
    buffer.release();
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.capacity(), 0);
    assert!(buffer.raw_pointer().is_null());

    buffer.release();
    assert_eq!(buffer.capacity(), 0, "second release is a no-op");

    buffer.append(b"again").unwrap();
    assert_eq!(buffer.as_slice(), b"again", "released buffer can be reused");
}

#[test]
fn buffer_growth_doubles_capacity() {
    init_logger();

    let mut buffer = ManualBuffer::<u8>::with_capacity(5).unwrap();
    buffer.append(&[1; 6]).unwrap();
    assert_eq!(buffer.capacity(), 10, "capacity doubles");

    buffer.append(&[2; 30]).unwrap();
    assert_eq!(buffer.capacity(), 36, "large appends reserve exactly what is needed");
    assert_eq!(buffer.len(), 36);
    assert_eq!(&buffer.as_slice()[4..8], &[1, 1, 2, 2]);

    buffer.resize(37, 3).unwrap();
    assert_eq!(buffer.capacity(), 72, "capacity doubles again");
}

#[test]
fn buffer_out_of_memory() {
    init_logger();

    let mut buffer = ManualBuffer::<u64>::new();
    let result = buffer.reserve(usize::MAX);
    assert!(matches!(result, Err(MarshalError::OutOfMemory(_))), "{:?}", result);
    assert_eq!(buffer.capacity(), 0, "failed reserve leaves the buffer unchanged");
}

// values

fn inline_values() -> Vec<DynamicValue> {
    vec![
        DynamicValue::Empty,
        DynamicValue::Bool(true),
        DynamicValue::Bool(false),
        DynamicValue::I8(-5),
        DynamicValue::U8(250),
        DynamicValue::I16(-30000),
        DynamicValue::U16(60000),
        DynamicValue::I32(-2_000_000_000),
        DynamicValue::U32(4_000_000_000),
        DynamicValue::I64(i64::MIN),
        DynamicValue::U64(u64::MAX),
        DynamicValue::F32(1.5),
        DynamicValue::F64(-2.25e100),
        DynamicValue::Date(OleDate(45000.5)),
        DynamicValue::string("Grüße, 世界"),
        DynamicValue::string(""),
        DynamicValue::multi_string(["one", "", "three"]),
        DynamicValue::multi_string(Vec::<&str>::new()),
        DynamicValue::Binary(vec![0, 1, 2, 255]),
        DynamicValue::Binary(vec![]),
    ]
}

#[test]
fn value_payload_round_trip() {
    init_logger();

    for value in inline_values() {
        let vt = value.value_type().vartype();
        let payload = value.payload();
        if let Some(size) = value.value_type().payload_size() {
            assert_eq!(payload.len(), size, "{:?} payload size", value);
        }
        let decoded = DynamicValue::decode(vt, &payload).unwrap();
        assert_eq!(decoded, value, "decoded value equals original");
        assert_eq!(decoded.value_type(), value.value_type());
    }
}

#[test]
fn value_u32_end_to_end() {
    init_logger();

    let value = DynamicValue::from(0x8000_1001u32);
    let payload = value.payload();
    assert_eq!(payload, vec![0x01, 0x10, 0x00, 0x80], "little-endian payload");

    let decoded = DynamicValue::decode(value.value_type().vartype(), &payload).unwrap();
    assert_eq!(decoded.value_type(), ValueType::U32);
    assert_eq!(decoded.as_u32(), Some(0x8000_1001));
}

#[test]
fn value_rejects_truncated_payload() {
    init_logger();

    let result = DynamicValue::decode(VT_UI4, &[0x01, 0x10, 0x00]);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "{:?}", result);

    let result = DynamicValue::decode(VT_I8, &[0; 9]);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "{:?}", result);

    let result = DynamicValue::decode(VT_BSTR, &[0x41, 0x00, 0x42]);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "odd utf-16 length");
}

#[test]
fn value_rejects_unknown_type() {
    init_logger();

    assert_eq!(DynamicValue::decode(VT_CY, &[0; 8]), Err(MarshalError::UnsupportedType(VT_CY as u32)));
    assert_eq!(DynamicValue::decode(0x7fff, &[]), Err(MarshalError::UnsupportedType(0x7fff)));
    assert_eq!(ValueType::try_from(VT_NULL), Err(MarshalError::UnsupportedType(VT_NULL as u32)));
    assert_eq!(DynamicValue::decode(VT_EMPTY, &[]), Ok(DynamicValue::Empty), "empty is legal");
}

#[test]
fn value_wrong_accessors() {
    init_logger();

    let value = DynamicValue::U32(7);
    let before = value.clone();

    assert_eq!(value.as_bool(), None);
    assert_eq!(value.as_i8(), None);
    assert_eq!(value.as_u8(), None);
    assert_eq!(value.as_i16(), None);
    assert_eq!(value.as_u16(), None);
    assert_eq!(value.as_i32(), None);
    assert_eq!(value.as_i64(), None);
    assert_eq!(value.as_u64(), None);
    assert_eq!(value.as_f32(), None);
    assert_eq!(value.as_f64(), None);
    assert_eq!(value.as_date(), None);
    assert_eq!(value.as_wide(), None);
    assert_eq!(value.as_string(), None);
    assert_eq!(value.as_multi_string(), None);
    assert_eq!(value.as_binary(), None);
    assert!(value.as_object().is_none());
    assert_eq!(value.as_i32().unwrap_or_default(), 0, "default for mismatched type");
    assert_eq!(value.as_u32(), Some(7));
    assert_eq!(value, before, "accessors do not mutate");

    let string = DynamicValue::string("text");
    assert_eq!(string.as_string().as_deref(), Some("text"));
    assert_eq!(string.as_u32(), None);
}

#[test]
fn value_types_are_not_interchangeable() {
    init_logger();

    assert_ne!(DynamicValue::U32(1), DynamicValue::I32(1));
    assert_ne!(DynamicValue::U64(0), DynamicValue::Empty);
    assert_ne!(DynamicValue::F64(1.0), DynamicValue::Date(OleDate(1.0)));
    assert_eq!(DynamicValue::I16(3), DynamicValue::I16(3));
}

#[test]
fn value_floats_compare_by_bits() {
    init_logger();

    for value in [
        DynamicValue::F64(f64::NAN),
        DynamicValue::F32(f32::NAN),
        DynamicValue::Date(OleDate(f64::NAN)),
    ] {
        let decoded = DynamicValue::decode(value.value_type().vartype(), &value.payload()).unwrap();
        assert_eq!(decoded, value, "NaN survives the round trip");
    }
    assert_ne!(DynamicValue::F64(0.0), DynamicValue::F64(-0.0), "payloads differ");
    assert_eq!(DynamicValue::F32(2.5), DynamicValue::F32(2.5));
}

#[test]
fn value_bool_uses_variant_bool() {
    init_logger();

    assert_eq!(DynamicValue::Bool(true).payload(), vec![0xff, 0xff]);
    assert_eq!(DynamicValue::Bool(false).payload(), vec![0, 0]);
    assert_eq!(DynamicValue::decode(VT_BOOL, &[1, 0]), Ok(DynamicValue::Bool(true)));
    assert!(DynamicValue::decode(VT_BOOL, &[1]).is_err());
}

#[test]
fn value_string_layouts() {
    init_logger();

    let value = DynamicValue::string("ab");
    assert_eq!(value.payload(), vec![0x61, 0, 0x62, 0], "no stored terminator");

    let value = DynamicValue::multi_string(["a", "b"]);
    assert_eq!(value.payload(), vec![0x61, 0, 0, 0, 0x62, 0, 0, 0, 0, 0]);
    assert_eq!(value.as_multi_string(), Some(vec!["a".to_string(), "b".to_string()]));

    let unterminated = DynamicValue::decode(VT_ARRAY | VT_BSTR, &[0x61, 0, 0, 0, 0x62, 0]).unwrap();
    assert_eq!(unterminated, DynamicValue::multi_string(["a", "b"]));
}

#[test]
fn value_release_resets_to_empty() {
    init_logger();

    let mut value = DynamicValue::Binary(vec![1, 2, 3]);
    value.release();
    assert!(value.is_empty());
    assert_eq!(value.value_type(), ValueType::Empty);
}

#[test]
fn value_object_reference_counting() {
    init_logger();

    let fake = FakeObject::new();
    {
        let object = fake.borrow();
        assert_eq!(fake.references(), 2, "borrowing acquires a reference");

        let value = DynamicValue::from(object);
        let clone = value.clone();
        assert_eq!(fake.references(), 3, "cloning acquires a reference");

        let read = value.as_object().unwrap();
        assert_eq!(fake.references(), 4, "reading returns a new reference");
        assert_eq!(read.as_raw(), fake.pointer());
        assert_eq!(value, clone, "objects compare by identity");
        drop(read);
        drop(clone);
        assert_eq!(fake.references(), 2);
    }
    assert_eq!(fake.references(), 1, "dropping releases the reference");

    let object = fake.borrow();
    assert_eq!(object.query_interface(&Guid::default()), Err(E_NOINTERFACE));
}

#[test]
fn value_object_payload() {
    init_logger();

    let fake = FakeObject::new();
    let value = DynamicValue::Object(fake.borrow());
    let payload = value.payload();
    assert_eq!(payload.len(), size_of::<usize>());

    assert_eq!(
        DynamicValue::decode(VT_UNKNOWN, &payload),
        Err(MarshalError::UnsupportedType(VT_UNKNOWN as u32)),
        "detached object payloads are not decoded"
    );

    let decoded = unsafe { DynamicValue::decode_with_objects(VT_UNKNOWN, &payload) }.unwrap();
    assert_eq!(decoded, value, "decoded object resolves to the same handle");
    assert_eq!(fake.references(), 3);

    let null = unsafe { DynamicValue::decode_with_objects(VT_UNKNOWN, &[0; size_of::<usize>()]) };
    assert!(matches!(null, Err(MarshalError::InvalidData(_))));

    drop(decoded);
    drop(value);
    assert_eq!(fake.references(), 1);
}

#[test]
fn ole_date_conversions() {
    init_logger();

    assert_eq!(OleDate::from_unix_seconds(0.0), OleDate(25569.0));
    assert_eq!(OleDate(25569.5).to_unix_seconds(), 43200.0);

    // 1899-12-29 06:00
    let before_epoch = OleDate::from_unix_seconds(-25569.75 * 86400.0);
    assert_eq!(before_epoch, OleDate(-1.25));
    assert_eq!(before_epoch.to_unix_seconds(), -25569.75 * 86400.0);

    // 1601-01-01
    assert_eq!(OleDate::from_filetime(0).to_filetime(), 0);
    let ticks = 133_000_000_000_000_000u64;
    let converted = OleDate::from_filetime(ticks).to_filetime();
    assert!(converted.abs_diff(ticks) < 10_000, "within a millisecond: {}", converted);
}

// registry

#[test]
fn registry_decode() {
    init_logger();

    assert_eq!(
        DynamicValue::from_registry(REG_DWORD, &[0x01, 0x10, 0x00, 0x80]),
        Ok(DynamicValue::U32(0x8000_1001))
    );
    assert_eq!(
        DynamicValue::from_registry(REG_DWORD_BIG_ENDIAN, &[0x80, 0x00, 0x10, 0x01]),
        Ok(DynamicValue::U32(0x8000_1001))
    );
    assert_eq!(
        DynamicValue::from_registry(REG_QWORD, &1u64.to_le_bytes()),
        Ok(DynamicValue::U64(1))
    );
    assert_eq!(
        DynamicValue::from_registry(REG_SZ, &[0x68, 0, 0x69, 0, 0, 0]),
        Ok(DynamicValue::string("hi"))
    );
    assert_eq!(
        DynamicValue::from_registry(REG_EXPAND_SZ, &[0x68, 0, 0, 0, 0x69, 0]),
        Ok(DynamicValue::string("h")),
        "strings end at the first null"
    );
    assert_eq!(
        DynamicValue::from_registry(REG_MULTI_SZ, &[0x61, 0, 0, 0, 0x62, 0, 0, 0, 0, 0]),
        Ok(DynamicValue::multi_string(["a", "b"]))
    );
    assert_eq!(DynamicValue::from_registry(REG_MULTI_SZ, &[]), Ok(DynamicValue::MultiString(vec![])));
    assert_eq!(
        DynamicValue::from_registry(REG_BINARY, &[1, 2]),
        Ok(DynamicValue::Binary(vec![1, 2]))
    );
    assert_eq!(DynamicValue::from_registry(REG_NONE, &[]), Ok(DynamicValue::Empty));
    assert_eq!(
        DynamicValue::from_registry(REG_NONE, &[3]),
        Ok(DynamicValue::Binary(vec![3]))
    );
}

#[test]
fn registry_rejects_invalid_data() {
    init_logger();

    let result = DynamicValue::from_registry(REG_DWORD, &[0x01, 0x10, 0x00]);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "{:?}", result);

    let result = DynamicValue::from_registry(REG_QWORD, &[0; 4]);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "{:?}", result);

    let result = DynamicValue::from_registry(REG_SZ, &[0x61]);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "{:?}", result);

    assert_eq!(
        DynamicValue::from_registry(REG_LINK, &[]),
        Err(MarshalError::UnsupportedType(REG_LINK))
    );
    assert_eq!(
        DynamicValue::from_registry(REG_RESOURCE_LIST, &[0; 8]),
        Err(MarshalError::UnsupportedType(REG_RESOURCE_LIST))
    );
}

#[test]
fn registry_encode() {
    init_logger();

    assert_eq!(DynamicValue::U32(5).to_registry(), Ok((REG_DWORD, vec![5, 0, 0, 0])));
    assert_eq!(
        DynamicValue::U32(5).to_registry_as(REG_DWORD_BIG_ENDIAN),
        Ok((REG_DWORD_BIG_ENDIAN, vec![0, 0, 0, 5]))
    );
    assert_eq!(
        DynamicValue::string("x").to_registry(),
        Ok((REG_SZ, vec![0x78, 0, 0, 0])),
        "strings are written with a terminator"
    );
    assert_eq!(
        DynamicValue::string("x").to_registry_as(REG_EXPAND_SZ),
        Ok((REG_EXPAND_SZ, vec![0x78, 0, 0, 0]))
    );
    assert_eq!(DynamicValue::Empty.to_registry(), Ok((REG_NONE, vec![])));
    assert_eq!(
        DynamicValue::I32(5).to_registry(),
        Err(MarshalError::UnsupportedType(VT_I4 as u32))
    );
    assert_eq!(
        DynamicValue::U64(5).to_registry_as(REG_DWORD),
        Err(MarshalError::UnsupportedType(REG_DWORD))
    );

    let result = DynamicValue::string("a\0b").to_registry();
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "interior null: {:?}", result);
    let result = DynamicValue::string("a\0b").to_registry_as(REG_EXPAND_SZ);
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "interior null: {:?}", result);
    let result = DynamicValue::MultiString(vec![vec![0x61, 0, 0x62]]).to_registry();
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "interior null: {:?}", result);

    for value in [
        DynamicValue::U32(0x8000_1001),
        DynamicValue::U64(0x1234_5678_9abc_def0),
        DynamicValue::string("value"),
        DynamicValue::multi_string(["x", "yz"]),
        DynamicValue::Binary(vec![9, 8, 7]),
        DynamicValue::Empty,
    ] {
        let (reg_type, data) = value.to_registry().unwrap();
        assert_eq!(DynamicValue::from_registry(reg_type, &data), Ok(value));
    }
}

// variants

#[test]
fn variant_layout() {
    init_logger();

    #[cfg(target_pointer_width = "64")]
    assert_eq!(size_of::<RawVariant>(), 24);
    #[cfg(target_pointer_width = "32")]
    assert_eq!(size_of::<RawVariant>(), 16);
    assert_eq!(offset_of!(RawVariant, data), 8);

    #[cfg(target_pointer_width = "64")]
    assert_eq!(size_of::<SafeArray>(), 32);
    #[cfg(target_pointer_width = "32")]
    assert_eq!(size_of::<SafeArray>(), 24);
    assert_eq!(offset_of!(SafeArray, data), size_of::<SafeArray>() - 8 - size_of::<usize>());
}

#[test]
fn variant_scalar_round_trip() {
    init_logger();

    for value in inline_values() {
        let record = value.to_variant().unwrap();
        let variant = record.layout::<RawVariant>().unwrap();
        assert_eq!(variant.vt, value.value_type().vartype());
        assert_eq!(record.bytes().len(), size_of::<RawVariant>());
        assert_eq!(record.as_ptr() as usize % 8, 0, "variant is 8-byte aligned");

        let decoded = unsafe { DynamicValue::from_variant(&variant) }.unwrap();
        assert_eq!(decoded, value, "variant round trip");
        record.release();
    }

    let record = DynamicValue::U32(0x8000_1001).to_variant().unwrap();
    assert_eq!(record.read::<u16>(0).unwrap(), VT_UI4);
    assert_eq!(record.read::<u32>(8).unwrap(), 0x8000_1001);
    assert!(record.pinned().is_empty(), "scalars pin nothing");

    let record = DynamicValue::Bool(true).to_variant().unwrap();
    assert_eq!(record.read::<i16>(8).unwrap(), VARIANT_TRUE);
}

#[test]
fn variant_bstr_layout() {
    init_logger();

    let record = DynamicValue::string("Body").to_variant().unwrap();
    assert_eq!(record.pinned().len(), 1);

    let variant = record.layout::<RawVariant>().unwrap();
    let bstr = variant.pointer();
    assert_eq!(bstr, record.pinned()[0].address() + 4, "BSTR points past the length prefix");
    assert_eq!(unsafe { ptr::read_unaligned((bstr - 4) as *const u32) }, 8);
    assert_eq!(unsafe { wide_at(bstr) }, "Body");
}

#[test]
fn variant_arrays() {
    init_logger();

    let binary = DynamicValue::Binary(vec![5, 6, 7]);
    let record = binary.to_variant().unwrap();
    let variant = record.layout::<RawVariant>().unwrap();
    let array = unsafe { ptr::read_unaligned(variant.pointer() as *const SafeArray) };
    assert_eq!(array.dims, 1);
    assert_eq!(array.element_size, 1);
    assert_eq!(array.features, FADF_STATIC | FADF_FIXEDSIZE);
    assert_eq!({ array.bound }.elements, 3);
    assert_eq!(variant.pointer() % 8, 0, "SAFEARRAY is 8-byte aligned");
    assert_eq!(unsafe { DynamicValue::from_variant(&variant) }, Ok(binary));

    let strings = DynamicValue::multi_string(["first", "second"]);
    let record = strings.to_variant().unwrap();
    // two strings, the pointer array and the descriptor
    assert_eq!(record.pinned().len(), 4);
    let variant = record.layout::<RawVariant>().unwrap();
    let array = unsafe { ptr::read_unaligned(variant.pointer() as *const SafeArray) };
    assert_eq!(array.features & FADF_BSTR, FADF_BSTR);
    assert_eq!(array.element_size as usize, size_of::<usize>());
    assert_eq!(unsafe { DynamicValue::from_variant(&variant) }, Ok(strings));
}

#[test]
fn variant_holds_object_reference() {
    init_logger();

    let fake = FakeObject::new();
    let value = DynamicValue::Object(fake.borrow());
    assert_eq!(fake.references(), 2);

    let record = value.to_variant().unwrap();
    assert_eq!(fake.references(), 3, "record holds a reference");
    let variant = record.layout::<RawVariant>().unwrap();
    assert_eq!(variant.vt, VT_UNKNOWN);
    assert_eq!(variant.pointer(), fake.pointer() as usize);

    let decoded = unsafe { DynamicValue::from_variant(&variant) }.unwrap();
    assert_eq!(decoded, value);
    assert_eq!(fake.references(), 4);

    drop(decoded);
    record.release();
    assert_eq!(fake.references(), 2, "release gives up the record reference");
    drop(value);
    assert_eq!(fake.references(), 1);
}

#[test]
fn variant_decode_edge_cases() {
    init_logger();

    let variant = RawVariant::new(VT_INT, &(-7i32).to_le_bytes());
    assert_eq!(unsafe { DynamicValue::from_variant(&variant) }, Ok(DynamicValue::I32(-7)));

    let variant = RawVariant::new(VT_UINT, &7u32.to_le_bytes());
    assert_eq!(unsafe { DynamicValue::from_variant(&variant) }, Ok(DynamicValue::U32(7)));

    let variant = RawVariant::new(VT_BSTR, &[]);
    assert_eq!(
        unsafe { DynamicValue::from_variant(&variant) },
        Ok(DynamicValue::string("")),
        "null BSTR is the empty string"
    );

    let variant = RawVariant::new(VT_I4 | VT_BYREF, &[]);
    assert_eq!(
        unsafe { DynamicValue::from_variant(&variant) },
        Err(MarshalError::UnsupportedType((VT_I4 | VT_BYREF) as u32))
    );

    let variant = RawVariant::new(VT_ARRAY | VT_UI1, &[]);
    let result = unsafe { DynamicValue::from_variant(&variant) };
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "null SAFEARRAY");

    let variant = RawVariant::new(VT_UNKNOWN, &[]);
    let result = unsafe { DynamicValue::from_variant(&variant) };
    assert!(matches!(result, Err(MarshalError::InvalidData(_))), "null object");

    let variant = RawVariant::new(VT_DECIMAL, &[]);
    assert_eq!(
        unsafe { DynamicValue::from_variant(&variant) },
        Err(MarshalError::UnsupportedType(VT_DECIMAL as u32))
    );
}

// records

#[test]
fn task_dialog_layout() {
    init_logger();

    #[cfg(target_pointer_width = "64")]
    {
        assert_eq!(size_of::<TaskDialogConfig>(), 160);
        assert_eq!(size_of::<TaskDialogButton>(), 12);
        assert_eq!(offset_of!(TaskDialogConfig, window_title), 28);
        assert_eq!(offset_of!(TaskDialogConfig, main_icon), 36);
        assert_eq!(offset_of!(TaskDialogConfig, content), 52);
        assert_eq!(offset_of!(TaskDialogConfig, buttons_count), 60);
        assert_eq!(offset_of!(TaskDialogConfig, buttons), 64);
        assert_eq!(offset_of!(TaskDialogConfig, radio_buttons_count), 76);
        assert_eq!(offset_of!(TaskDialogConfig, footer_icon), 124);
        assert_eq!(offset_of!(TaskDialogConfig, callback), 140);
        assert_eq!(offset_of!(TaskDialogConfig, width), 156);
    }
    #[cfg(target_pointer_width = "32")]
    {
        assert_eq!(size_of::<TaskDialogConfig>(), 96);
        assert_eq!(size_of::<TaskDialogButton>(), 8);
        assert_eq!(offset_of!(TaskDialogConfig, window_title), 20);
        assert_eq!(offset_of!(TaskDialogConfig, buttons_count), 36);
        assert_eq!(offset_of!(TaskDialogConfig, buttons), 40);
        assert_eq!(offset_of!(TaskDialogConfig, width), 92);
    }
}

#[test]
fn task_dialog_without_optional_fields() {
    init_logger();

    let dialog = TaskDialog::new();
    let record = PackedRecordBuilder::build(&dialog).unwrap();

    assert!(record.pinned().is_empty(), "nothing pinned");
    assert_eq!(record.len(), size_of::<TaskDialogConfig>());
    assert_eq!(record.read::<u32>(0).unwrap() as usize, size_of::<TaskDialogConfig>());

    let config = record.layout::<TaskDialogConfig>().unwrap();
    let expected = TaskDialogConfig {
        size: size_of::<TaskDialogConfig>() as u32,
        ..Default::default()
    };
    assert_eq!(config, expected, "every optional slot is zero");
}

#[test]
fn task_dialog_buttons() {
    init_logger();

    let mut dialog = TaskDialog::new();
    dialog.add_button(100, "Save").add_button(101, "Don't save").add_button(102, "Cancel");
    dialog.default_button = 101;

    let record = PackedRecordBuilder::build(&dialog).unwrap();
    let count = record.read::<u32>(offset_of!(TaskDialogConfig, buttons_count)).unwrap();
    assert_eq!(count, 3);

    // three texts and the button array
    assert_eq!(record.pinned().len(), 4);
    let array = record.read::<usize>(offset_of!(TaskDialogConfig, buttons)).unwrap();
    assert_eq!(array, record.pinned()[3].address());
    assert_eq!(array % 8, 0, "button array is 8-byte aligned");
    assert!(record.pinned()[3].size() >= 3 * size_of::<TaskDialogButton>());

    let expected = [(100, "Save"), (101, "Don't save"), (102, "Cancel")];
    for (index, (id, text)) in expected.iter().enumerate() {
        let button = unsafe { ptr::read_unaligned((array as *const TaskDialogButton).add(index)) };
        assert_eq!({ button.button_id }, *id);
        assert_eq!(unsafe { wide_at(button.button_text) }, *text);
    }

    let config = record.layout::<TaskDialogConfig>().unwrap();
    assert_eq!({ config.default_button }, 101);
    assert_eq!({ config.radio_buttons_count }, 0);
    assert_eq!({ config.radio_buttons }, 0);
}

#[test]
fn task_dialog_texts() {
    init_logger();

    let mut dialog = TaskDialog::new();
    dialog.window_title = Some("Title".into());
    dialog.content = Some("Body".into());

    let record = PackedRecordBuilder::build(&dialog).unwrap();
    assert_eq!(record.pinned().len(), 2);

    let title = record.read::<usize>(offset_of!(TaskDialogConfig, window_title)).unwrap();
    let content = record.read::<usize>(offset_of!(TaskDialogConfig, content)).unwrap();
    assert_ne!(title, 0);
    assert_ne!(content, 0);
    assert_ne!(title, content);
    assert_eq!(unsafe { wide_at(title) }, "Title");
    assert_eq!(unsafe { wide_at(content) }, "Body");

    let instruction =
        record.read::<usize>(offset_of!(TaskDialogConfig, main_instruction)).unwrap();
    assert_eq!(instruction, 0, "absent text stays zero");
}

#[test]
fn task_dialog_icons() {
    init_logger();

    let mut dialog = TaskDialog::new();
    dialog.main_icon = Some(ResourceRef::Handle(0x1234));
    dialog.footer_icon = Some(ResourceRef::Id(TD_INFORMATION_ICON));
    let config = PackedRecordBuilder::build(&dialog).unwrap().layout::<TaskDialogConfig>().unwrap();
    assert_eq!({ config.main_icon }, 0x1234);
    assert_eq!({ config.footer_icon }, TD_INFORMATION_ICON as usize);
    assert_eq!({ config.flags } & TDF_USE_HICON_MAIN, TDF_USE_HICON_MAIN, "handle sets the flag");
    assert_eq!({ config.flags } & TDF_USE_HICON_FOOTER, 0);

    let mut dialog = TaskDialog::new();
    dialog.main_icon = Some(ResourceRef::Name("APPICON".into()));
    let record = PackedRecordBuilder::build(&dialog).unwrap();
    assert_eq!(record.pinned().len(), 1);
    let icon = record.read::<usize>(offset_of!(TaskDialogConfig, main_icon)).unwrap();
    assert_eq!(unsafe { wide_at(icon) }, "APPICON");
}

#[test]
fn task_dialog_invalid_configuration() {
    init_logger();

    let mut dialog = TaskDialog::new();
    dialog.flags = TDF_USE_HICON_MAIN;
    dialog.main_icon = Some(ResourceRef::Id(TD_ERROR_ICON));
    let result = PackedRecordBuilder::build(&dialog);
    assert!(matches!(result, Err(MarshalError::InvalidConfiguration(_))), "{:?}", result);

    let mut dialog = TaskDialog::new();
    dialog.flags = TDF_USE_HICON_FOOTER;
    let result = PackedRecordBuilder::build(&dialog);
    assert!(matches!(result, Err(MarshalError::InvalidConfiguration(_))), "{:?}", result);

    let mut dialog = TaskDialog::new();
    dialog.main_icon = Some(ResourceRef::Handle(0));
    let result = PackedRecordBuilder::build(&dialog);
    assert!(matches!(result, Err(MarshalError::InvalidConfiguration(_))), "{:?}", result);

    let mut dialog = TaskDialog::new();
    dialog.footer = Some("split\0text".into());
    let result = PackedRecordBuilder::build(&dialog);
    assert!(matches!(result, Err(MarshalError::InvalidConfiguration(_))), "{:?}", result);
}

#[test]
fn task_dialog_duplicate_button_replaces() {
    init_logger();

    let mut dialog = TaskDialog::new();
    dialog.add_radio_button(1, "One").add_radio_button(2, "Two").add_radio_button(1, "Uno");
    let record = PackedRecordBuilder::build(&dialog).unwrap();
    let config = record.layout::<TaskDialogConfig>().unwrap();
    assert_eq!({ config.radio_buttons_count }, 2);

    let button = unsafe { ptr::read_unaligned(config.radio_buttons as *const TaskDialogButton) };
    assert_eq!({ button.button_id }, 1);
    assert_eq!(unsafe { wide_at(button.button_text) }, "Uno", "replaced in place");
}

struct FailingRecord<'a> {
    object: &'a ForeignObject,
}
impl PackedRecord for FailingRecord<'_> {
    type Layout = u32;

    fn pack(&self, builder: &mut PackedRecordBuilder) -> Result<u32, MarshalError> {
        builder.pin_object(self.object)?;
        builder.pin_text("pinned before the failure")?;
        builder.pin_resource(&ResourceRef::Id(0))?;
        Ok(0)
    }
}

#[test]
fn failed_build_releases_pinned_blocks() {
    init_logger();

    let fake = FakeObject::new();
    let object = fake.borrow();
    assert_eq!(fake.references(), 2);

    let result = PackedRecordBuilder::build(&FailingRecord { object: &object });
    assert!(matches!(result, Err(MarshalError::InvalidConfiguration(_))), "{:?}", result);
    assert_eq!(fake.references(), 2, "pinned reference released after failure");
}

#[test]
fn builder_pins_in_allocation_order() {
    init_logger();

    let mut builder = PackedRecordBuilder::new();
    let first = builder.pin_text("first").unwrap();
    let empty = builder.pin_bytes(&[]).unwrap();
    let second = builder.pin_bytes(&[1, 2, 3]).unwrap();
    let none = builder.pin_optional_text(None::<&str>).unwrap();
    let (count, records) = builder.pin_records(&Vec::<DynamicValue>::new()).unwrap();
    assert_eq!((empty, none, count, records), (0, 0, 0, 0), "empty parts pin nothing");
    assert_eq!(builder.pinned_count(), 2);
    assert_eq!(builder.pinned()[0].address(), first);
    assert_eq!(builder.pinned()[1].address(), second);
    assert_eq!(builder.pinned()[1].bytes(), &[1, 2, 3]);

    let record = builder.finish(&[0xab; 3]).unwrap();
    assert_eq!(record.bytes(), &[0xab; 3]);
    assert_eq!(record.pinned().len(), 2);
    record.release();
}

#[test]
fn builder_packs_values_as_sub_records() {
    init_logger();

    let values = vec![DynamicValue::I32(1), DynamicValue::string("two")];
    let mut builder = PackedRecordBuilder::new();
    let (count, address) = builder.pin_records(&values).unwrap();
    assert_eq!(count, 2);
    assert_eq!(address % 8, 0, "variant array is 8-byte aligned");
    // the BSTR and the variant array
    assert_eq!(builder.pinned_count(), 2);

    let second = unsafe { ptr::read_unaligned((address as *const RawVariant).add(1)) };
    assert_eq!(unsafe { DynamicValue::from_variant(&second) }, Ok(DynamicValue::string("two")));
}
