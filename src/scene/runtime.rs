use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use glam::{Mat4, Quat, Vec3};
use hecs::{Entity, World};
use itertools::Itertools;
use log::{debug, info, warn};
use scenestream_files::common::reader::{parse_object, ParseContext, Parseable};
use scenestream_files::common::types::{ClassId, PPtr};
use scenestream_files::scene::types::{UnityGameObject, UnityMeshFilter, UnityMeshRenderer, UnityTransform};

use crate::assets::{AssetError, AssetFile, AssetManager, ResourceKind};
use crate::rendering::common::types::{MaterialResource, MeshResource};
use crate::rendering::material::MaterialEngine;
use crate::scene::components::{LocalTransform, Parent, Renderable, SceneNode, WorldTransform};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LevelSummary {
    pub game_objects: usize,
    pub renderables: usize,
    /// Distinct meshes referenced by the level.
    pub meshes: usize,
    /// Material instances and programs alive in the runtime after the load.
    pub materials: usize,
    pub programs: usize,
}

struct PendingRenderable {
    entity: Entity,
    mesh: PPtr,
    materials: Vec<PPtr>,
    enabled: bool,
}

type ResolvedRenderable = Option<(Arc<MeshResource>, Vec<Option<Arc<MaterialResource>>>)>;

/// Owns the entity arena of every level loaded so far.
pub struct SceneRuntime {
    manager: Arc<AssetManager>,
    engine: MaterialEngine,
    world: World,
    /// GameObjects by container path and path id.
    registry: HashMap<(String, i64), Entity>,
    levels: Vec<Arc<AssetFile>>,
}

impl SceneRuntime {
    pub fn new(manager: Arc<AssetManager>) -> Self {
        SceneRuntime {
            engine: MaterialEngine::new(manager.shared_device()),
            manager,
            world: World::new(),
            registry: HashMap::new(),
            levels: Vec::new(),
        }
    }

    pub fn manager(&self) -> &Arc<AssetManager> {
        &self.manager
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn materials(&self) -> &MaterialEngine {
        &self.engine
    }

    pub fn entity(&self, container: &str, path_id: i64) -> Option<Entity> {
        self.registry.get(&(container.to_string(), path_id)).copied()
    }

    /// Loads the level at `path` through the manager's fetcher.
    pub async fn load_level(&mut self, path: &str) -> Result<LevelSummary, AssetError> {
        info!("Loading level {}", path);
        let file = self.manager.open(path, self.manager.settings().external_load_mode);
        self.build(file).await
    }

    /// Loads a level the host already holds in memory.
    pub async fn load_buffer(&mut self, name: &str, data: Bytes) -> Result<LevelSummary, AssetError> {
        info!("Loading level {} from a {} byte buffer", name, data.len());
        let file = self.manager.register_buffer(name, data);
        self.build(file).await
    }

    async fn build(&mut self, file: Arc<AssetFile>) -> Result<LevelSummary, AssetError> {
        let (game_objects, pending) = self.construct(&file).await?;
        let (renderables, meshes) = self.spawn(&file, pending).await?;
        self.finalize_transforms()?;
        self.levels.push(file.clone());

        let summary = LevelSummary {
            game_objects,
            renderables,
            meshes,
            materials: self.engine.instance_count(),
            programs: self.engine.programs().len(),
        };
        info!("{}: {:?}", file.path(), summary);
        Ok(summary)
    }

    /// Decodes the scene records and spawns one entity per GameObject. Renderers are only
    /// collected, their resources are resolved once every entity is registered.
    async fn construct(&mut self, file: &Arc<AssetFile>) -> Result<(usize, Vec<PendingRenderable>), AssetError> {
        let ctx = file.wait_for_header().await?.context.clone();
        let (game_objects, transforms, rect_transforms, filters, renderers) = futures::try_join!(
            decode_class::<UnityGameObject>(file, &ctx, ClassId::GameObject),
            decode_class::<UnityTransform>(file, &ctx, ClassId::Transform),
            // only the Transform part of a RectTransform is read
            decode_class::<UnityTransform>(file, &ctx, ClassId::RectTransform),
            decode_class::<UnityMeshFilter>(file, &ctx, ClassId::MeshFilter),
            decode_class::<UnityMeshRenderer>(file, &ctx, ClassId::MeshRenderer),
        )?;

        let container = file.path().to_string();
        let mut local = HashMap::with_capacity(game_objects.len());
        for (path_id, game_object) in game_objects {
            let entity = self.world.spawn((SceneNode {
                name: game_object.name,
                path_id,
                layer: game_object.layer,
                active: game_object.is_active,
            },));
            self.registry.insert((container.clone(), path_id), entity);
            local.insert(path_id, entity);
        }
        let owner = |pptr: &PPtr| {
            if pptr.is_null() || !pptr.is_local() {
                None
            } else {
                local.get(&pptr.path_id).copied()
            }
        };

        let transforms = transforms.into_iter().chain(rect_transforms).collect_vec();
        let mut transform_owners = HashMap::with_capacity(transforms.len());
        for (path_id, transform) in &transforms {
            let Some(entity) = owner(&transform.game_object) else {
                warn!("{}: transform {} has no GameObject", container, path_id);
                continue;
            };
            transform_owners.insert(*path_id, entity);
            let (p, r, s) = (
                &transform.local_position,
                &transform.local_rotation,
                &transform.local_scale,
            );
            self.world
                .insert_one(
                    entity,
                    LocalTransform {
                        translation: Vec3::new(p.x, p.y, p.z),
                        rotation: Quat::from_xyzw(r.x, r.y, r.z, r.w),
                        scale: Vec3::new(s.x, s.y, s.z),
                    },
                )
                .map_err(|e| AssetError::InvariantViolation(e.to_string()))?;
        }
        for (_, transform) in &transforms {
            let Some(child) = owner(&transform.game_object) else {
                continue;
            };
            if transform.father.is_null() {
                continue;
            }
            if let Some(parent) = transform_owners.get(&transform.father.path_id) {
                self.world
                    .insert_one(child, Parent(*parent))
                    .map_err(|e| AssetError::InvariantViolation(e.to_string()))?;
            }
        }

        let meshes = filters
            .iter()
            .filter_map(|(_, filter)| owner(&filter.game_object).map(|entity| (entity, filter.mesh)))
            .collect::<HashMap<_, _>>();
        let mut pending = Vec::new();
        for (path_id, renderer) in renderers {
            let Some(entity) = owner(&renderer.game_object) else {
                warn!("{}: renderer {} has no GameObject", container, path_id);
                continue;
            };
            let Some(mesh) = meshes.get(&entity) else {
                debug!("{}: renderer {} has no MeshFilter", container, path_id);
                continue;
            };
            pending.push(PendingRenderable {
                entity,
                mesh: *mesh,
                materials: renderer.materials,
                enabled: renderer.enabled,
            });
        }

        debug!(
            "{}: {} GameObjects, {} transforms, {} renderers",
            container,
            local.len(),
            transforms.len(),
            pending.len()
        );
        Ok((local.len(), pending))
    }

    /// Resolves the renderers' meshes and materials and attaches the renderable components.
    async fn spawn(&mut self, file: &Arc<AssetFile>, pending: Vec<PendingRenderable>) -> Result<(usize, usize), AssetError> {
        let resolved = try_join_all(pending.iter().map(|renderable| self.resolve_renderable(file, renderable))).await?;

        let mut meshes = HashSet::new();
        let mut renderables = 0;
        for (renderable, resolved) in pending.iter().zip(resolved) {
            let Some((mesh, materials)) = resolved else {
                continue;
            };
            meshes.insert(Arc::as_ptr(&mesh) as usize);

            let mut instances = Vec::with_capacity(materials.len());
            for material in materials {
                let Some(material) = material else {
                    instances.push(Weak::new());
                    continue;
                };
                match self.engine.instantiate(&material) {
                    Ok(instance) => instances.push(Arc::downgrade(&instance)),
                    Err(e) if e.is_unsupported() => {
                        warn!("{}: material {} is skipped: {}", file.path(), material.name, e);
                        instances.push(Weak::new());
                    }
                    Err(e) => return Err(e),
                }
            }

            self.world
                .insert_one(
                    renderable.entity,
                    Renderable {
                        mesh: Arc::downgrade(&mesh),
                        materials: instances,
                        enabled: renderable.enabled,
                    },
                )
                .map_err(|e| AssetError::InvariantViolation(e.to_string()))?;
            renderables += 1;
        }
        Ok((renderables, meshes.len()))
    }

    async fn resolve_renderable(
        &self,
        file: &Arc<AssetFile>,
        renderable: &PendingRenderable,
    ) -> Result<ResolvedRenderable, AssetError> {
        let mesh = self.manager.fetch_resource(ResourceKind::Mesh, file, renderable.mesh);
        let materials = join_all(
            renderable
                .materials
                .iter()
                .map(|material| self.manager.fetch_resource(ResourceKind::Material, file, *material)),
        );
        let (mesh, materials) = futures::join!(mesh, materials);

        let mesh = match mesh {
            Ok(resource) => resource.and_then(|resource| resource.as_mesh().cloned()),
            Err(e) if e.is_unsupported() => {
                warn!("{}: mesh {:?} is skipped: {}", file.path(), renderable.mesh, e);
                None
            }
            Err(e) => return Err(e),
        };
        let Some(mesh) = mesh else {
            return Ok(None);
        };

        let mut slots = Vec::with_capacity(materials.len());
        for material in materials {
            match material {
                Ok(resource) => slots.push(resource.and_then(|resource| resource.as_material().cloned())),
                Err(e) if e.is_unsupported() => {
                    warn!("{}: material is skipped: {}", file.path(), e);
                    slots.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Some((mesh, slots)))
    }

    /// Computes the world matrix of every transformed entity from its parent chain.
    fn finalize_transforms(&mut self) -> Result<(), AssetError> {
        let locals = self
            .world
            .query::<(&LocalTransform, Option<&Parent>)>()
            .iter()
            .map(|(entity, (local, parent))| (entity, (local.matrix(), parent.map(|parent| parent.0))))
            .collect::<HashMap<_, _>>();

        let mut resolved = HashMap::with_capacity(locals.len());
        for entity in locals.keys() {
            world_matrix(*entity, &locals, &mut resolved, 0);
        }
        for (entity, matrix) in resolved {
            self.world
                .insert_one(entity, WorldTransform(matrix))
                .map_err(|e| AssetError::InvariantViolation(e.to_string()))?;
        }
        Ok(())
    }

    /// Drops every entity and releases the material instances, programs and containers.
    pub fn destroy(&mut self) {
        self.world.clear();
        self.registry.clear();
        self.levels.clear();
        self.engine.destroy();
        self.manager.destroy();
    }
}

fn world_matrix(
    entity: Entity,
    locals: &HashMap<Entity, (Mat4, Option<Entity>)>,
    resolved: &mut HashMap<Entity, Mat4>,
    depth: usize,
) -> Mat4 {
    if let Some(matrix) = resolved.get(&entity) {
        return *matrix;
    }
    let Some((local, parent)) = locals.get(&entity) else {
        return Mat4::IDENTITY;
    };
    // the depth bound stops parent cycles
    let matrix = match parent {
        Some(parent) if depth < locals.len() => world_matrix(*parent, locals, resolved, depth + 1) * *local,
        _ => *local,
    };
    resolved.insert(entity, matrix);
    matrix
}

async fn decode_class<T: Parseable<T>>(
    file: &AssetFile,
    ctx: &ParseContext,
    class: ClassId,
) -> Result<Vec<(i64, T)>, AssetError> {
    let path_ids = file
        .wait_for_header()
        .await?
        .objects_of_class(class)
        .map(|info| info.path_id)
        .collect_vec();
    let objects = try_join_all(path_ids.iter().map(|path_id| file.fetch_object(*path_id))).await?;

    profiling::scope!("decode_class");
    let mut decoded = Vec::with_capacity(objects.len());
    for (info, data) in objects.into_iter().flatten() {
        decoded.push((info.path_id, parse_object::<T>(&data, ctx)?));
    }
    Ok(decoded)
}
