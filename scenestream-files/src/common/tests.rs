use std::io::Cursor;

use crate::common::reader::{align, Endianness, ParseContext, Parseable};
use crate::common::types::{ClassId, PPtr, StreamingInfo, Vector3f};
use crate::common::version::UnityVersion;
use crate::fixtures::{context, ObjectWriter};

#[test]
fn aligned_strings_and_arrays() -> Result<(), anyhow::Error> {
    let ctx = context("2019.4.40f1");
    let mut w = ObjectWriter::little();
    w.string("abcde").i32(3).u8(1).u8(2).u8(3).align().u32(0xDEADBEEF);

    let mut rdr = Cursor::new(w.buf.as_slice());
    assert_eq!(String::parse(&mut rdr, &ctx)?, "abcde");
    assert_eq!(rdr.position(), 12);
    assert_eq!(Vec::<u8>::parse(&mut rdr, &ctx)?, vec![1, 2, 3]);
    assert_eq!(u32::parse(&mut rdr, &ctx)?, 0xDEADBEEF);
    Ok(())
}

#[test]
fn big_endian_objects() -> Result<(), anyhow::Error> {
    let ctx = ParseContext::new(Endianness::Big, UnityVersion::new(2018, 4, 0), 17);
    let mut w = ObjectWriter::new(Endianness::Big);
    w.f32(1.0).f32(-2.0).f32(0.5).i32(-7);

    let mut rdr = Cursor::new(w.buf.as_slice());
    assert_eq!(Vector3f::parse(&mut rdr, &ctx)?, Vector3f { x: 1.0, y: -2.0, z: 0.5 });
    assert_eq!(i32::parse(&mut rdr, &ctx)?, -7);
    Ok(())
}

#[test]
fn map_entries_parse_as_pairs() -> Result<(), anyhow::Error> {
    let ctx = context("2019.4.40f1");
    let mut w = ObjectWriter::little();
    w.i32(2).string("_Glossiness").f32(0.5).string("_Metallic").f32(0.25);

    let map = Vec::<(String, f32)>::parse(&mut Cursor::new(w.buf.as_slice()), &ctx)?;
    assert_eq!(map, vec![("_Glossiness".to_string(), 0.5), ("_Metallic".to_string(), 0.25)]);
    Ok(())
}

#[test]
fn pptr_width_depends_on_format_version() -> Result<(), anyhow::Error> {
    let mut w = ObjectWriter::little();
    w.i32(1).i64(-42);
    let modern = context("2019.4.40f1");
    assert_eq!(PPtr::parse(&mut Cursor::new(w.buf.as_slice()), &modern)?, PPtr::new(1, -42));

    let mut w = ObjectWriter::little();
    w.i32(0).i32(9);
    let legacy = ParseContext::new(Endianness::Little, UnityVersion::new(4, 7, 0), 9);
    let pptr = PPtr::parse(&mut Cursor::new(w.buf.as_slice()), &legacy)?;
    assert!(pptr.is_local());
    assert_eq!(pptr.path_id, 9);
    assert!(PPtr::default().is_null());
    Ok(())
}

#[test]
fn streaming_info_offset_widens_in_2020() -> Result<(), anyhow::Error> {
    let mut w = ObjectWriter::little();
    w.u64(1 << 33).u32(128).string("archive:/CAB-1/CAB-1.resS");
    let info = StreamingInfo::parse(&mut Cursor::new(w.buf.as_slice()), &context("2020.3.1f1"))?;
    assert_eq!(info.offset, 1 << 33);
    assert_eq!(info.size, 128);
    assert!(!info.is_empty());

    let mut w = ObjectWriter::little();
    w.u32(16).u32(0).string("");
    let info = StreamingInfo::parse(&mut Cursor::new(w.buf.as_slice()), &context("2019.4.1f1"))?;
    assert_eq!(info.offset, 16);
    assert!(info.is_empty());
    Ok(())
}

#[test]
fn align_is_relative_to_stream_start() -> Result<(), anyhow::Error> {
    let data = [0u8; 16];
    let mut rdr = Cursor::new(&data[..]);
    rdr.set_position(5);
    align(&mut rdr)?;
    assert_eq!(rdr.position(), 8);
    align(&mut rdr)?;
    assert_eq!(rdr.position(), 8);
    Ok(())
}

#[test]
fn class_ids() {
    assert_eq!(ClassId::try_from(43).ok(), Some(ClassId::Mesh));
    assert_eq!(i32::from(ClassId::Texture2D), 28);
    assert!(ClassId::try_from(12345).is_err());
}
