use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use log::trace;

use crate::rendering::common::types::VertexLayout;
use crate::rendering::gpu::{
    BufferHandle, BufferUsage, GpuDevice, InputLayoutHandle, ProgramDescriptor, ProgramHandle, SamplerDescriptor,
    SamplerHandle, TextureDescriptor, TextureHandle,
};

/// What a [`HeadlessDevice`] has seen so far.
#[derive(Debug, Clone, Default)]
pub struct DeviceStats {
    pub live_objects: HashSet<u64>,
    pub buffers_created: usize,
    pub textures_created: usize,
    pub layouts_created: usize,
    pub samplers_created: usize,
    pub programs_created: usize,
    pub destroyed: usize,
    /// Initial contents of every buffer.
    pub buffer_uploads: Vec<(BufferHandle, Vec<u8>)>,
    /// `(texture, level, bytes)` of every upload.
    pub texture_uploads: Vec<(TextureHandle, u32, Vec<u8>)>,
    pub program_sources: Vec<String>,
}

/// A device without a GPU. It hands out unique handles and records every call, which is all the
/// CLI and the tests need.
#[derive(Default)]
pub struct HeadlessDevice {
    next_handle: AtomicU64,
    stats: Mutex<DeviceStats>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        HeadlessDevice::default()
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// What `handle` was created with.
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats
            .buffer_uploads
            .iter()
            .find(|(buffer, _)| *buffer == handle)
            .map(|(_, contents)| contents.clone())
    }

    /// The last upload to `level` of `handle`.
    pub fn texture_level(&self, handle: TextureHandle, level: u32) -> Option<Vec<u8>> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats
            .texture_uploads
            .iter()
            .rev()
            .find(|(texture, uploaded, _)| *texture == handle && *uploaded == level)
            .map(|(_, _, data)| data.clone())
    }

    fn allocate(&self, record: impl FnOnce(&mut DeviceStats, u64)) -> u64 {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.live_objects.insert(id);
        record(&mut stats, id);
        id
    }

    fn release(&self, id: u64) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if stats.live_objects.remove(&id) {
            stats.destroyed += 1;
        }
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> BufferHandle {
        trace!("create_buffer {} {:?} ({} bytes)", label, usage, contents.len());
        BufferHandle(self.allocate(|stats, id| {
            stats.buffers_created += 1;
            stats.buffer_uploads.push((BufferHandle(id), contents.to_vec()));
        }))
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        self.release(handle.0);
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> TextureHandle {
        trace!("create_texture {:?}", descriptor);
        TextureHandle(self.allocate(|stats, _| stats.textures_created += 1))
    }

    fn upload_texture_level(&self, handle: TextureHandle, level: u32, data: &[u8]) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .texture_uploads
            .push((handle, level, data.to_vec()));
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        self.release(handle.0);
    }

    fn create_input_layout(&self, layout: &VertexLayout) -> InputLayoutHandle {
        trace!("create_input_layout with {} streams", layout.streams.len());
        InputLayoutHandle(self.allocate(|stats, _| stats.layouts_created += 1))
    }

    fn destroy_input_layout(&self, handle: InputLayoutHandle) {
        self.release(handle.0);
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> SamplerHandle {
        SamplerHandle(self.allocate(|stats, _| stats.samplers_created += 1))
    }

    fn destroy_sampler(&self, handle: SamplerHandle) {
        self.release(handle.0);
    }

    fn create_program(&self, descriptor: &ProgramDescriptor) -> ProgramHandle {
        trace!("create_program {}", descriptor.label);
        ProgramHandle(self.allocate(|stats, _| {
            stats.programs_created += 1;
            stats.program_sources.push(descriptor.source.clone());
        }))
    }

    fn destroy_program(&self, handle: ProgramHandle) {
        self.release(handle.0);
    }
}
