use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use crate::rendering::gpu::{GpuDevice, ProgramDescriptor, ProgramHandle};

#[derive(Debug)]
pub struct Program {
    pub handle: ProgramHandle,
    pub source_hash: u64,
    pub label: String,
}

/// Compiled programs by the hash of their generated source. Materials with equal options share one.
#[derive(Default)]
pub struct ProgramCache {
    programs: DashMap<u64, Arc<Program>>,
}

pub fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

impl ProgramCache {
    pub fn new() -> Self {
        ProgramCache::default()
    }

    pub fn get_or_create(&self, device: &dyn GpuDevice, label: &str, source: String) -> Arc<Program> {
        let hash = source_hash(&source);
        self.programs
            .entry(hash)
            .or_insert_with(|| {
                debug!("compiling program {} ({:016x})", label, hash);
                let handle = device.create_program(&ProgramDescriptor {
                    label: label.to_string(),
                    source,
                });
                Arc::new(Program {
                    handle,
                    source_hash: hash,
                    label: label.to_string(),
                })
            })
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn destroy(&self, device: &dyn GpuDevice) {
        for entry in self.programs.iter() {
            device.destroy_program(entry.value().handle);
        }
        self.programs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::gpu::headless::HeadlessDevice;

    #[test]
    fn equal_sources_share_a_program() {
        let device = HeadlessDevice::new();
        let cache = ProgramCache::new();
        let a = cache.get_or_create(&device, "a", "fn main() {}".to_string());
        let b = cache.get_or_create(&device, "b", "fn main() {}".to_string());
        let c = cache.get_or_create(&device, "c", "fn other() {}".to_string());

        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.handle, c.handle);
        assert_eq!(cache.len(), 2);
        assert_eq!(device.stats().programs_created, 2);

        cache.destroy(&device);
        assert!(cache.is_empty());
        assert!(device.stats().live_objects.is_empty());
    }
}
