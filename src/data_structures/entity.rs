//! Entities: a uid plus at most one component of each kind.

use std::sync::Arc;

use super::{
    components::{MeshInstance, Transform, View},
    uid::{Registry, Uid},
};
use crate::{
    context::GpuHandle,
    render::RenderError,
    resources::{ResourceError, mesh::MeshRecord},
    shader::ShaderDescriptor,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    MeshInstance,
    View,
}

#[derive(Debug)]
pub enum Component {
    Transform(Transform),
    MeshInstance(MeshInstance),
    View(View),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Transform(_) => ComponentKind::Transform,
            Component::MeshInstance(_) => ComponentKind::MeshInstance,
            Component::View(_) => ComponentKind::View,
        }
    }
}

#[derive(Debug, Default)]
pub struct Entity {
    uid: Uid,
    transform: Option<Transform>,
    mesh_instance: Option<MeshInstance>,
    view: Option<View>,
}

impl Entity {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Put `component` in its slot, returning whatever was there.
    pub fn insert(&mut self, component: Component) -> Option<Component> {
        match component {
            Component::Transform(c) => self.transform.replace(c).map(Component::Transform),
            Component::MeshInstance(c) => {
                self.mesh_instance.replace(c).map(Component::MeshInstance)
            }
            Component::View(c) => self.view.replace(c).map(Component::View),
        }
    }

    pub fn remove(&mut self, kind: ComponentKind) -> Option<Component> {
        match kind {
            ComponentKind::Transform => self.transform.take().map(Component::Transform),
            ComponentKind::MeshInstance => self.mesh_instance.take().map(Component::MeshInstance),
            ComponentKind::View => self.view.take().map(Component::View),
        }
    }

    pub fn has(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transform.is_some(),
            ComponentKind::MeshInstance => self.mesh_instance.is_some(),
            ComponentKind::View => self.view.is_some(),
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.transform.as_mut()
    }

    pub fn mesh_instance(&self) -> Option<&MeshInstance> {
        self.mesh_instance.as_ref()
    }

    pub fn mesh_instance_mut(&mut self) -> Option<&mut MeshInstance> {
        self.mesh_instance.as_mut()
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut View> {
        self.view.as_mut()
    }
}

/// All entities of a sketch, keyed by uid.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Registry<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> Uid {
        self.entities.insert_with(Entity::new)
    }

    pub fn despawn(&mut self, uid: Uid) -> Option<Entity> {
        self.entities.remove(uid)
    }

    pub fn get(&self, uid: Uid) -> Option<&Entity> {
        self.entities.get(uid)
    }

    pub fn get_mut(&mut self, uid: Uid) -> Option<&mut Entity> {
        self.entities.get_mut(uid)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Uid, &Entity)> {
        self.entities.iter()
    }

    /// Entities that have a component of `kind`.
    pub fn with(&self, kind: ComponentKind) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .map(|(_, entity)| entity)
            .filter(move |entity| entity.has(kind))
    }

    /// Give `uid` a mesh instance drawing `mesh` with `shader`, wired to the
    /// entity's transform. A default transform is added if there is none.
    /// The instance still needs its textures set and a
    /// [`bake`](MeshInstance::bake).
    pub fn attach_renderable(
        &mut self,
        gpu: GpuHandle<'_>,
        uid: Uid,
        mesh: Uid,
        shader: Arc<ShaderDescriptor>,
        format: wgpu::TextureFormat,
    ) -> Result<&mut MeshInstance, RenderError> {
        let entity = self
            .entities
            .get_mut(uid)
            .ok_or(ResourceError::UnknownUid(uid))?;
        let transform = entity.transform.get_or_insert_with(Transform::default);
        transform.bind(&gpu);

        let mut instance = MeshInstance::attach(gpu.device, mesh, shader, format);
        instance.set_frame(transform.frame())?;
        Ok(entity.mesh_instance.insert(instance))
    }

    /// The mesh instance of `uid`, for setting textures and baking after
    /// [`attach_renderable`](Self::attach_renderable).
    pub fn instance_mut(&mut self, uid: Uid) -> Result<&mut MeshInstance, RenderError> {
        self.entities
            .get_mut(uid)
            .ok_or(ResourceError::UnknownUid(uid))?
            .mesh_instance
            .as_mut()
            .ok_or(RenderError::MissingComponent {
                entity: uid,
                kind: ComponentKind::MeshInstance,
            })
    }

    /// Bake and upload every changed transform and view.
    pub fn update(&mut self, gpu: GpuHandle<'_>) {
        for (_, entity) in self.entities.iter_mut() {
            if let Some(transform) = &mut entity.transform {
                transform.bind(&gpu);
            }
            if let Some(view) = &mut entity.view {
                view.bind(&gpu);
            }
        }
    }

    /// Draw every entity with a mesh instance. Stops at the first entity that
    /// cannot be drawn.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        meshes: &Registry<MeshRecord>,
        view: &wgpu::BindGroup,
    ) -> Result<usize, RenderError> {
        let mut drawn = 0;
        for entity in self.with(ComponentKind::MeshInstance) {
            if let Some(instance) = entity.mesh_instance() {
                instance.draw(pass, meshes, view)?;
                drawn += 1;
            }
        }
        Ok(drawn)
    }
}
