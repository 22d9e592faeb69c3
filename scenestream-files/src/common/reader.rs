use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::version::UnityVersion;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Everything a decoder needs to know about the file an object came from. Constructed once
/// per serialized file and handed down to every `parse` call.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub endianness: Endianness,
    pub version: UnityVersion,
    /// Version of the serialized file format (not the engine).
    pub format_version: u32,
}

impl ParseContext {
    pub fn new(endianness: Endianness, version: UnityVersion, format_version: u32) -> Self {
        ParseContext {
            endianness,
            version,
            format_version,
        }
    }

    /// Shorthand for version gated fields.
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        self.version.at_least(major, minor)
    }

    pub fn at_least_build(&self, major: u32, minor: u32, build: u32) -> bool {
        self.version >= UnityVersion::new(major, minor, build)
    }
}

pub trait Parseable<T> {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<T, ParserError>;

    /// Parses `count` consecutive elements. Overridden where a bulk read is possible.
    fn parse_many<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext, count: usize) -> Result<Vec<T>, ParserError> {
        (0..count).map(|_| Self::parse(rdr, ctx)).collect()
    }
}

macro_rules! impl_endian_parseable {
    ($ty:ty, $read:ident) => {
        impl Parseable<$ty> for $ty {
            fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<$ty, ParserError> {
                Ok(match ctx.endianness {
                    Endianness::Little => rdr.$read::<LittleEndian>()?,
                    Endianness::Big => rdr.$read::<BigEndian>()?,
                })
            }
        }
    };
}

impl_endian_parseable!(u16, read_u16);
impl_endian_parseable!(i16, read_i16);
impl_endian_parseable!(u32, read_u32);
impl_endian_parseable!(i32, read_i32);
impl_endian_parseable!(u64, read_u64);
impl_endian_parseable!(i64, read_i64);
impl_endian_parseable!(f32, read_f32);

impl Parseable<u8> for u8 {
    fn parse<R: Read + Seek>(rdr: &mut R, _ctx: &ParseContext) -> Result<u8, ParserError> {
        Ok(rdr.read_u8()?)
    }

    fn parse_many<R: Read + Seek>(rdr: &mut R, _ctx: &ParseContext, count: usize) -> Result<Vec<u8>, ParserError> {
        let mut buf = vec![0u8; count];
        rdr.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Parseable<i8> for i8 {
    fn parse<R: Read + Seek>(rdr: &mut R, _ctx: &ParseContext) -> Result<i8, ParserError> {
        Ok(rdr.read_i8()?)
    }
}

/// Booleans are single bytes. Sequences of them are followed by an explicit [`align`].
impl Parseable<bool> for bool {
    fn parse<R: Read + Seek>(rdr: &mut R, _ctx: &ParseContext) -> Result<bool, ParserError> {
        Ok(rdr.read_u8()? != 0)
    }
}

/// Length prefixed, 4-byte aligned string.
impl Parseable<String> for String {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<String, ParserError> {
        let len = read_length(rdr, ctx)?;
        let bytes = u8::parse_many(rdr, ctx, len)?;
        align(rdr)?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Length prefixed array, 4-byte aligned afterwards.
impl<T: Parseable<T>> Parseable<Vec<T>> for Vec<T> {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<Vec<T>, ParserError> {
        let len = read_length(rdr, ctx)?;
        let list = T::parse_many(rdr, ctx, len)?;
        align(rdr)?;
        Ok(list)
    }
}

/// Map entries are serialized as plain key/value pairs inside an array.
impl<K: Parseable<K>, V: Parseable<V>> Parseable<(K, V)> for (K, V) {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<(K, V), ParserError> {
        Ok((K::parse(rdr, ctx)?, V::parse(rdr, ctx)?))
    }
}

impl<const N: usize> Parseable<[f32; N]> for [f32; N] {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<[f32; N], ParserError> {
        let mut values = [0.0f32; N];
        for value in values.iter_mut() {
            *value = f32::parse(rdr, ctx)?;
        }
        Ok(values)
    }
}

pub(crate) fn read_length<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<usize, ParserError> {
    let len = i32::parse(rdr, ctx)?;
    if len < 0 {
        return Err(ParserError::FormatError {
            reason: "negative array length",
        });
    }
    Ok(len as usize)
}

/// Aligns the stream position to the next multiple of 4.
pub fn align<R: Seek>(rdr: &mut R) -> Result<(), ParserError> {
    align_to(rdr, 4)
}

pub fn align_to<R: Seek>(rdr: &mut R, alignment: u64) -> Result<(), ParserError> {
    let pos = rdr.stream_position()?;
    let padding = (alignment - pos % alignment) % alignment;
    if padding > 0 {
        rdr.seek(SeekFrom::Current(padding as i64))?;
    }
    Ok(())
}

pub(crate) fn read_cstring<R: Read>(rdr: &mut R) -> Result<String, ParserError> {
    let mut buf = Vec::new();
    loop {
        let c = rdr.read_u8()?;
        if c == 0 {
            return Ok(String::from_utf8(buf)?);
        }
        buf.push(c);
    }
}

pub(crate) fn read_bytes<R: Read, const N: usize>(rdr: &mut R) -> Result<[u8; N], ParserError> {
    let mut buf = [0u8; N];
    rdr.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads a length prefixed byte array, then aligns.
pub(crate) fn read_byte_array<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<Vec<u8>, ParserError> {
    Vec::<u8>::parse(rdr, ctx)
}

/// Decodes one object from its serialized bytes. The bytes are only borrowed for the
/// duration of the call, the result owns all of its data.
pub fn parse_object<T: Parseable<T>>(data: &[u8], ctx: &ParseContext) -> Result<T, ParserError> {
    if data.is_empty() {
        return Err(ParserError::EmptySource);
    }
    T::parse(&mut std::io::Cursor::new(data), ctx)
}
