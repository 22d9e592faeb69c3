use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::reader::{align, read_bytes, read_cstring, read_length, Endianness, ParseContext, Parseable};
use crate::common::types::ClassId;
use crate::common::version::UnityVersion;
use crate::serialized::types::{
    FileIdentifier, ObjectInfo, ScriptType, SerializedFile, SerializedFileHeader, SerializedType,
};

pub struct SerializedFileReader {}

impl SerializedFileReader {
    pub const MIN_SUPPORTED_VERSION: u32 = 17;
    pub const MAX_SUPPORTED_VERSION: u32 = 22;

    /// Enough bytes to always contain the header, regardless of the format version.
    pub const HEADER_PROBE_SIZE: usize = 48;

    /// Parses only the fixed header. This tells how many bytes the metadata spans, so partial
    /// loaders know how much of the file to fetch before the object table can be read.
    pub fn parse_header<R: Read>(rdr: &mut R) -> Result<SerializedFileHeader, ParserError> {
        let metadata_size = rdr.read_u32::<BigEndian>()?;
        let file_size = rdr.read_u32::<BigEndian>()? as u64;
        let version = rdr.read_u32::<BigEndian>()?;
        let data_offset = rdr.read_u32::<BigEndian>()? as u64;

        if !(Self::MIN_SUPPORTED_VERSION..=Self::MAX_SUPPORTED_VERSION).contains(&version) {
            return Err(ParserError::UnsupportedFileVersion { version });
        }

        let endianness = match rdr.read_u8()? {
            0 => Endianness::Little,
            _ => Endianness::Big,
        };
        let _reserved: [u8; 3] = read_bytes(rdr)?;

        if version >= 22 {
            let metadata_size = rdr.read_u32::<BigEndian>()?;
            let file_size = rdr.read_i64::<BigEndian>()? as u64;
            let data_offset = rdr.read_i64::<BigEndian>()? as u64;
            let _unknown = rdr.read_i64::<BigEndian>()?;
            return Ok(SerializedFileHeader {
                metadata_size,
                file_size,
                version,
                data_offset,
                endianness,
            });
        }

        Ok(SerializedFileHeader {
            metadata_size,
            file_size,
            version,
            data_offset,
            endianness,
        })
    }

    /// Parses header and metadata. `buf` has to contain at least the first
    /// [`SerializedFileHeader::metadata_end`] bytes of the file.
    pub fn parse(buf: &[u8]) -> Result<SerializedFile, ParserError> {
        let mut rdr = Cursor::new(buf);
        let header = Self::parse_header(&mut rdr)?;
        if (buf.len() as u64) < header.metadata_end() {
            return Err(ParserError::FormatError {
                reason: "buffer does not contain the complete metadata",
            });
        }
        rdr.seek(SeekFrom::Start(header.header_size()))?;
        Self::parse_metadata(&mut rdr, header)
    }

    fn parse_metadata<R: Read + Seek>(rdr: &mut R, header: SerializedFileHeader) -> Result<SerializedFile, ParserError> {
        let format_version = header.version;
        let unity_version = read_cstring(rdr)?;
        // Stripped player builds write an empty or zeroed version, those still parse.
        let version = UnityVersion::parse(&unity_version).unwrap_or_default();
        let ctx = ParseContext::new(header.endianness, version, format_version);

        let target_platform = u32::parse(rdr, &ctx)?;
        let enable_type_tree = bool::parse(rdr, &ctx)?;

        let type_count = read_length(rdr, &ctx)?;
        let types = (0..type_count)
            .map(|_| Self::parse_type(rdr, &ctx, enable_type_tree, false))
            .collect::<Result<Vec<_>, _>>()?;

        let object_count = read_length(rdr, &ctx)?;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            align(rdr)?;
            let path_id = i64::parse(rdr, &ctx)?;
            let relative_start = if format_version >= 22 {
                i64::parse(rdr, &ctx)? as u64
            } else {
                u32::parse(rdr, &ctx)? as u64
            };
            let byte_start = relative_start + header.data_offset;
            let byte_size = u32::parse(rdr, &ctx)?;
            let type_id = i32::parse(rdr, &ctx)?;
            let class_id = types
                .get(type_id as usize)
                .ok_or(ParserError::MissingType { type_id })?
                .class_id;

            let object = ObjectInfo {
                path_id,
                byte_start,
                byte_size,
                type_id,
                class_id,
            };
            if object.byte_end() > header.file_size {
                return Err(ParserError::ObjectOutOfBounds { path_id });
            }
            objects.push(object);
        }

        let script_count = read_length(rdr, &ctx)?;
        let mut script_types = Vec::with_capacity(script_count);
        for _ in 0..script_count {
            let file_index = i32::parse(rdr, &ctx)?;
            align(rdr)?;
            let identifier = i64::parse(rdr, &ctx)?;
            script_types.push(ScriptType { file_index, identifier });
        }

        let external_count = read_length(rdr, &ctx)?;
        let mut externals = Vec::with_capacity(external_count);
        for _ in 0..external_count {
            let _empty = read_cstring(rdr)?;
            let guid = read_bytes(rdr)?;
            let file_type = i32::parse(rdr, &ctx)?;
            let path = read_cstring(rdr)?;
            externals.push(FileIdentifier { guid, file_type, path });
        }

        let mut ref_types = Vec::new();
        if format_version >= 20 {
            let ref_count = read_length(rdr, &ctx)?;
            for _ in 0..ref_count {
                ref_types.push(Self::parse_type(rdr, &ctx, enable_type_tree, true)?);
            }
        }

        let user_information = read_cstring(rdr)?;

        let object_index: HashMap<i64, usize> = objects
            .iter()
            .enumerate()
            .map(|(index, object)| (object.path_id, index))
            .collect();

        Ok(SerializedFile {
            header,
            unity_version,
            context: ctx,
            target_platform,
            enable_type_tree,
            types,
            objects,
            script_types,
            externals,
            ref_types,
            user_information,
            object_index,
        })
    }

    fn parse_type<R: Read + Seek>(
        rdr: &mut R,
        ctx: &ParseContext,
        enable_type_tree: bool,
        is_ref_type: bool,
    ) -> Result<SerializedType, ParserError> {
        let class_id = i32::parse(rdr, ctx)?;
        let is_stripped = bool::parse(rdr, ctx)?;
        let script_type_index = i16::parse(rdr, ctx)?;

        let has_script_id = (is_ref_type && script_type_index >= 0)
            || class_id < 0
            || class_id == i32::from(ClassId::MonoBehaviour);
        let script_id = if has_script_id { Some(read_bytes(rdr)?) } else { None };
        let old_type_hash = read_bytes(rdr)?;

        let mut type_dependencies = Vec::new();
        if enable_type_tree {
            Self::skip_type_tree(rdr, ctx)?;
            if ctx.format_version >= 21 {
                if is_ref_type {
                    let _class_name = read_cstring(rdr)?;
                    let _namespace = read_cstring(rdr)?;
                    let _assembly_name = read_cstring(rdr)?;
                } else {
                    let count = read_length(rdr, ctx)?;
                    type_dependencies = u32::parse_many(rdr, ctx, count)?;
                }
            }
        }

        Ok(SerializedType {
            class_id,
            is_stripped,
            script_type_index,
            script_id,
            old_type_hash,
            type_dependencies,
        })
    }

    // Decoders only support the layouts they know, so the type tree blob is skipped entirely.
    fn skip_type_tree<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<(), ParserError> {
        let node_count = read_length(rdr, ctx)? as i64;
        let string_buffer_size = read_length(rdr, ctx)? as i64;
        let node_size = if ctx.format_version >= 19 { 32 } else { 24 };
        rdr.seek(SeekFrom::Current(node_count * node_size + string_buffer_size))?;
        Ok(())
    }
}
