use std::collections::HashMap;

use crate::common::reader::{Endianness, ParseContext};
use crate::common::types::ClassId;

/// The fixed size header at the very start of every serialized file.
#[derive(Debug, Clone)]
pub struct SerializedFileHeader {
    pub metadata_size: u32,
    pub file_size: u64,
    pub version: u32,
    pub data_offset: u64,
    pub endianness: Endianness,
}

impl SerializedFileHeader {
    pub fn header_size(&self) -> u64 {
        if self.version >= 22 { 48 } else { 20 }
    }

    /// Number of bytes from the start of the file that contain header and metadata.
    pub fn metadata_end(&self) -> u64 {
        self.header_size() + self.metadata_size as u64
    }
}

#[derive(Debug, Clone)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped: bool,
    pub script_type_index: i16,
    pub script_id: Option<[u8; 16]>,
    pub old_type_hash: [u8; 16],
    pub type_dependencies: Vec<u32>,
}

/// One entry of the object table. `byte_start` is absolute within the file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub path_id: i64,
    pub byte_start: u64,
    pub byte_size: u32,
    pub type_id: i32,
    pub class_id: i32,
}

impl ObjectInfo {
    pub fn class(&self) -> Option<ClassId> {
        ClassId::try_from(self.class_id).ok()
    }

    pub fn byte_end(&self) -> u64 {
        self.byte_start + self.byte_size as u64
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ScriptType {
    pub file_index: i32,
    pub identifier: i64,
}

/// Entry of the external file table, referenced by `PPtr::file_id - 1`.
#[derive(Debug, Clone)]
pub struct FileIdentifier {
    pub guid: [u8; 16],
    pub file_type: i32,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct SerializedFile {
    pub header: SerializedFileHeader,
    pub unity_version: String,
    pub context: ParseContext,
    pub target_platform: u32,
    pub enable_type_tree: bool,
    pub types: Vec<SerializedType>,
    pub objects: Vec<ObjectInfo>,
    pub script_types: Vec<ScriptType>,
    pub externals: Vec<FileIdentifier>,
    pub ref_types: Vec<SerializedType>,
    pub user_information: String,
    pub(crate) object_index: HashMap<i64, usize>,
}

impl SerializedFile {
    pub fn object(&self, path_id: i64) -> Option<&ObjectInfo> {
        self.object_index.get(&path_id).map(|index| &self.objects[*index])
    }

    pub fn objects_of_class(&self, class: ClassId) -> impl Iterator<Item = &ObjectInfo> {
        let class_id = i32::from(class);
        self.objects.iter().filter(move |object| object.class_id == class_id)
    }

    /// Resolves a `PPtr::file_id` against the external table.
    pub fn external(&self, file_id: i32) -> Option<&FileIdentifier> {
        if file_id <= 0 {
            return None;
        }
        self.externals.get(file_id as usize - 1)
    }
}
