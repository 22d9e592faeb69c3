//! Turns decoded materials into something drawable: a generated program, a uniform buffer, texture
//! bindings and fixed function state.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, trace};

use crate::assets::error::AssetError;
use crate::rendering::common::attributes::VertexSemantic;
use crate::rendering::common::types::{MaterialResource, TextureResource};
use crate::rendering::gpu::{BufferHandle, BufferUsage, GpuDevice};
use crate::rendering::material::program_cache::{Program, ProgramCache};
use crate::rendering::material::render_state::RenderState;
use crate::rendering::material::standard::{
    SamplerSlot, ShaderOptions, StandardMaterialUniforms, STANDARD_SAMPLERS, STANDARD_VERTEX_INPUTS,
};

pub mod program_cache;
pub mod render_state;
pub mod shader_gen;
pub mod standard;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShadingModel {
    Standard,
}

impl ShadingModel {
    pub fn from_shader_name(name: &str) -> Result<Self, AssetError> {
        match name {
            "Standard" => Ok(ShadingModel::Standard),
            other => Err(AssetError::Unsupported(format!("shader {:?}", other))),
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            ShadingModel::Standard => "standard.wgsl",
        }
    }

    pub fn vertex_inputs(&self) -> &'static [VertexSemantic] {
        match self {
            ShadingModel::Standard => &STANDARD_VERTEX_INPUTS,
        }
    }

    pub fn sampler_slots(&self) -> &'static [SamplerSlot] {
        match self {
            ShadingModel::Standard => &STANDARD_SAMPLERS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundTexture {
    pub slot: SamplerSlot,
    /// `None` leaves the slot to the backend's fallback texture.
    pub texture: Option<Arc<TextureResource>>,
}

#[derive(Debug)]
pub struct MaterialInstance {
    pub name: String,
    pub model: ShadingModel,
    pub options: ShaderOptions,
    pub uniforms: StandardMaterialUniforms,
    pub uniform_buffer: BufferHandle,
    pub textures: Vec<BoundTexture>,
    pub render_state: RenderState,
    pub program: Arc<Program>,
    pub material: Arc<MaterialResource>,
}

impl MaterialInstance {
    /// Only the uniform buffer belongs to the instance. Programs belong to the cache and textures to
    /// the container they were loaded from.
    pub fn release(&self, device: &dyn GpuDevice) {
        device.destroy_buffer(self.uniform_buffer);
    }
}

pub struct MaterialEngine {
    device: Arc<dyn GpuDevice>,
    programs: ProgramCache,
    /// One instance per decoded material, keyed by its address. The instance keeps the material
    /// alive, so the address cannot be reused while the entry exists.
    instances: DashMap<usize, Arc<MaterialInstance>>,
}

impl MaterialEngine {
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        MaterialEngine {
            device,
            programs: ProgramCache::new(),
            instances: DashMap::new(),
        }
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// The instance for `material`, built on first use. Materials of shaders other than the
    /// supported shading models fail with [`AssetError::Unsupported`].
    pub fn instantiate(&self, material: &Arc<MaterialResource>) -> Result<Arc<MaterialInstance>, AssetError> {
        let key = Arc::as_ptr(material) as usize;
        if let Some(instance) = self.instances.get(&key) {
            return Ok(instance.value().clone());
        }

        // racing callers block on the shard until the first build is inserted
        match self.instances.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let instance = Arc::new(self.build(material)?);
                Ok(entry.insert(instance).value().clone())
            }
        }
    }

    fn build(&self, material: &Arc<MaterialResource>) -> Result<MaterialInstance, AssetError> {
        profiling::scope!("MaterialEngine::build");
        let shader_name = material
            .shader_name
            .as_deref()
            .ok_or_else(|| AssetError::Unsupported(format!("{}: material without a shader", material.name)))?;
        let model = ShadingModel::from_shader_name(shader_name)?;
        let render_state = RenderState::from_material(material)?;

        let options = standard::shader_options(material);
        let source = shader_gen::generate(model, &options)?;
        let program = self
            .programs
            .get_or_create(self.device.as_ref(), &format!("{:?}", model), source);

        let uniforms = StandardMaterialUniforms::from_material(material);
        let uniform_buffer = self.device.create_buffer(
            &format!("{} uniforms", material.name),
            BufferUsage::Uniform,
            &uniforms.uniform_bytes()?,
        );

        let textures = model
            .sampler_slots()
            .iter()
            .map(|slot| BoundTexture {
                slot: *slot,
                texture: material
                    .texture(slot.property)
                    .and_then(|texture| texture.texture.clone()),
            })
            .collect_vec();
        trace!(
            "{}: {} of {} texture slots bound",
            material.name,
            textures.iter().filter(|bound| bound.texture.is_some()).count(),
            textures.len()
        );
        debug!("{}: {:?} instance, {:?}", material.name, model, render_state.bucket);

        Ok(MaterialInstance {
            name: material.name.clone(),
            model,
            options,
            uniforms,
            uniform_buffer,
            textures,
            render_state,
            program,
            material: material.clone(),
        })
    }

    pub fn destroy(&self) {
        for entry in self.instances.iter() {
            entry.value().release(self.device.as_ref());
        }
        self.instances.clear();
        self.programs.destroy(self.device.as_ref());
    }
}
