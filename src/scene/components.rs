use std::sync::Weak;

use glam::{Mat4, Quat, Vec3};
use hecs::Entity;

use crate::rendering::common::types::MeshResource;
use crate::rendering::material::MaterialInstance;

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Path id of the GameObject within its container.
    pub path_id: i64,
    pub layer: u32,
    pub active: bool,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Parent(pub Entity);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WorldTransform(pub Mat4);

/// A drawable GameObject. The resources belong to their containers, a failed upgrade means the
/// container has been torn down.
#[derive(Debug, Clone)]
pub struct Renderable {
    pub mesh: Weak<MeshResource>,
    /// One entry per renderer material slot. Slots whose material could not be instantiated hold
    /// an empty `Weak`.
    pub materials: Vec<Weak<MaterialInstance>>,
    pub enabled: bool,
}
