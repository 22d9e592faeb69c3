use std::io::{Read, Seek};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use scenestream_files_derive_parseable::Parse;

use crate::ParserError;
use crate::common::reader::{ParseContext, Parseable};

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct Vector2f {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct Vector3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct Vector4f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct Quaternionf {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct ColorRGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Column major, as written by the engine.
#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct Matrix4x4f {
    pub e: [f32; 16],
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct AABB {
    pub center: Vector3f,
    pub extent: Vector3f,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct MinMaxAABB {
    pub min: Vector3f,
    pub max: Vector3f,
}

/// A reference to an object, either inside the same file (`file_id == 0`) or inside the
/// external file `file_id - 1` of the referencing file's external table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PPtr {
    pub file_id: i32,
    pub path_id: i64,
}

impl PPtr {
    pub fn new(file_id: i32, path_id: i64) -> Self {
        PPtr { file_id, path_id }
    }

    pub fn is_null(&self) -> bool {
        self.path_id == 0
    }

    pub fn is_local(&self) -> bool {
        self.file_id == 0
    }
}

impl Parseable<PPtr> for PPtr {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<PPtr, ParserError> {
        let file_id = i32::parse(rdr, ctx)?;
        let path_id = if ctx.format_version >= 14 {
            i64::parse(rdr, ctx)?
        } else {
            i32::parse(rdr, ctx)? as i64
        };
        Ok(PPtr { file_id, path_id })
    }
}

/// Points at payload bytes stored outside of the object, usually in a `.resS` companion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingInfo {
    pub offset: u64,
    pub size: u32,
    pub path: String,
}

impl StreamingInfo {
    pub fn is_empty(&self) -> bool {
        self.size == 0 || self.path.is_empty()
    }
}

impl Parseable<StreamingInfo> for StreamingInfo {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<StreamingInfo, ParserError> {
        let offset = if ctx.at_least(2020, 1) {
            u64::parse(rdr, ctx)?
        } else {
            u32::parse(rdr, ctx)? as u64
        };
        Ok(StreamingInfo {
            offset,
            size: u32::parse(rdr, ctx)?,
            path: String::parse(rdr, ctx)?,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum ClassId {
    GameObject = 1,
    Transform = 4,
    Material = 21,
    MeshRenderer = 23,
    Texture2D = 28,
    MeshFilter = 33,
    Mesh = 43,
    Shader = 48,
    MonoBehaviour = 114,
    RectTransform = 224,
}
