//! A mesh drawn with a shader, and the per-object resources that shader wants.
//!
//! On [`attach`](MeshInstance::attach) the shader is asked which of the
//! [`Tag::OBJECT`] roles it declares. Each one found becomes a [`TagSlot`];
//! [`set`](MeshInstance::set) fills a slot by tag, [`bake`](MeshInstance::bake)
//! turns the filled object group into a bind group, and only then can the
//! instance be drawn.

use std::{collections::HashMap, sync::Arc};

use crate::{
    data_structures::{dual::DualFrame, uid::{Registry, Uid}},
    render::RenderError,
    resources::{ResourceError, mesh::MeshRecord, registry::SceneContext},
    shader::{
        AttributeSlot, BindingShape, GpuResource, OBJECT_GROUP, ResourceMap, ShaderDescriptor,
        ShaderError, ShaderSource, Tag,
    },
};

/// Where a tagged entry lives in the shader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSlot {
    pub group: u32,
    pub slot: u32,
    pub name: String,
}

/// Resolve each of `tags` to the first entry carrying it.
pub fn tag_slots(source: &ShaderSource, tags: &[Tag]) -> HashMap<Tag, TagSlot> {
    tags.iter()
        .filter_map(|&tag| {
            let hits = source.query_tag(tag.as_str());
            if hits.len() > 1 {
                log::warn!(
                    "Tag {tag} is declared {} times in {}, using {}.",
                    hits.len(),
                    source.name,
                    hits[0].entry.name
                );
            }
            hits.first().map(|hit| {
                (
                    tag,
                    TagSlot {
                        group: hit.group,
                        slot: hit.slot,
                        name: hit.entry.name.clone(),
                    },
                )
            })
        })
        .collect()
}

/// Group index of the per-object group: the shader's `OBJECT_INDEX`, else the
/// group of its first object tag, else 1.
pub fn object_group(source: &ShaderSource, slots: &HashMap<Tag, TagSlot>) -> u32 {
    source.group_index(OBJECT_GROUP).unwrap_or_else(|| {
        Tag::OBJECT
            .iter()
            .find_map(|tag| slots.get(tag))
            .map_or(1, |slot| slot.group)
    })
}

/// Pair each shader attribute with the mesh buffer feeding it. The vertex
/// buffer slot is the attribute's position in the shader's attribute list.
/// Attributes the mesh lacks are skipped.
pub fn vertex_bindings<'m, B>(
    attributes: &[AttributeSlot],
    mesh: &'m MeshRecord<B>,
) -> Vec<(u32, &'m B)> {
    attributes
        .iter()
        .enumerate()
        .filter_map(|(slot, attribute)| {
            let buffer = mesh.vertex_buffer(&attribute.semantic);
            if buffer.is_none() {
                log::debug!(
                    "Mesh {} has no {} buffer, skipping.",
                    mesh.name,
                    attribute.semantic
                );
            }
            buffer.map(|buffer| (slot as u32, buffer))
        })
        .collect()
}

#[derive(Debug)]
pub struct MeshInstance {
    mesh: Uid,
    shader: Arc<ShaderDescriptor>,
    pipeline: wgpu::RenderPipeline,
    slots: HashMap<Tag, TagSlot>,
    object_group: u32,
    view_group: u32,
    resources: ResourceMap,
    bind_group: Option<wgpu::BindGroup>,
}

impl MeshInstance {
    /// Build the basic pipeline for `shader` and record which object tags it
    /// declares.
    pub fn attach(
        device: &wgpu::Device,
        mesh: Uid,
        shader: Arc<ShaderDescriptor>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let pipeline = shader.build_basic_pipeline(device, format);
        Self::with_pipeline(mesh, shader, pipeline)
    }

    pub fn with_pipeline(
        mesh: Uid,
        shader: Arc<ShaderDescriptor>,
        pipeline: wgpu::RenderPipeline,
    ) -> Self {
        let slots = tag_slots(shader.source(), &Tag::OBJECT);
        let object_group = object_group(shader.source(), &slots);
        for (tag, slot) in &slots {
            if slot.group != object_group {
                log::warn!(
                    "Tag {tag} of {} is in group {}, not the object group {object_group}; it will not be bound.",
                    shader.name(),
                    slot.group
                );
            }
        }
        let view_group = super::view::view_group(shader.source());
        Self {
            mesh,
            shader,
            pipeline,
            slots,
            object_group,
            view_group,
            resources: ResourceMap::new(),
            bind_group: None,
        }
    }

    pub fn mesh(&self) -> Uid {
        self.mesh
    }

    pub fn shader(&self) -> &ShaderDescriptor {
        &self.shader
    }

    pub fn accepts(&self, tag: Tag) -> bool {
        self.slots.contains_key(&tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.slots.keys().copied()
    }

    /// Fill the entry tagged `tag`. Returns `Ok(false)` if the shader does not
    /// declare it. Invalidates a previous bake.
    pub fn set(&mut self, tag: Tag, resource: GpuResource) -> Result<bool, RenderError> {
        let Some(slot) = self.slots.get(&tag) else {
            return Ok(false);
        };
        if resource.kind() != tag.kind() {
            return Err(ShaderError::ResourceMismatch {
                group: format!("{}_bind_group_{}", self.shader.name(), slot.group),
                name: slot.name.clone(),
                expected: tag.kind(),
                found: resource.kind(),
            }
            .into());
        }
        self.resources.insert(slot.name.clone(), resource);
        self.bind_group = None;
        Ok(true)
    }

    /// Point the three matrix tags at the frame's buffers. The frame must have
    /// been bound at least once.
    pub fn set_frame(&mut self, frame: &DualFrame) -> Result<(), RenderError> {
        let not_ready = || ResourceError::NotReady {
            what: "transform frame buffers".to_string(),
        };
        let buffers = [
            (Tag::LocalToWorld, frame.world_buffer()),
            (Tag::InverseLocalToWorld, frame.inverse_buffer()),
            (Tag::InverseTransposeLocalToWorld, frame.inverse_transpose_buffer()),
        ];
        for (tag, buffer) in buffers {
            if self.accepts(tag) {
                let buffer = buffer.ok_or_else(not_ready)?;
                self.set(tag, GpuResource::Buffer(buffer.clone()))?;
            }
        }
        Ok(())
    }

    /// Bind the albedo texture and sampler of glTF texture `texture`.
    pub fn set_albedo(&mut self, scene: &SceneContext, texture: usize) -> Result<(), RenderError> {
        if self.accepts(Tag::AlbedoTexture) {
            let view = scene.texture_view(texture)?;
            self.set(Tag::AlbedoTexture, GpuResource::TextureView(view.clone()))?;
        }
        if self.accepts(Tag::AlbedoSampler) {
            let sampler = scene.sampler(texture)?;
            self.set(Tag::AlbedoSampler, GpuResource::Sampler(sampler.clone()))?;
        }
        Ok(())
    }

    /// Create the object bind group from the resources set so far.
    pub fn bake(&mut self, device: &wgpu::Device) -> Result<(), RenderError> {
        let group = self
            .shader
            .group(self.object_group)
            .ok_or_else(|| ShaderError::UnknownGroup {
                shader: self.shader.name().to_string(),
                index: self.object_group,
            })?;
        self.bind_group = Some(
            self.shader
                .bind_native_group(device, group, &self.resources)?,
        );
        Ok(())
    }

    pub fn is_baked(&self) -> bool {
        self.bind_group.is_some()
    }

    /// Record the draw: pipeline, view group, object group, vertex buffers,
    /// 16-bit index buffer, indexed draw.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        meshes: &Registry<MeshRecord>,
        view: &wgpu::BindGroup,
    ) -> Result<(), RenderError> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or(RenderError::NotBaked { mesh: self.mesh })?;
        let mesh = meshes
            .get(self.mesh)
            .ok_or(ResourceError::UnknownUid(self.mesh))?;
        let index_buffer = mesh.index_buffer().ok_or_else(|| ResourceError::NotReady {
            what: format!("index buffer of mesh {}", mesh.name),
        })?;

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(self.view_group, view, &[]);
        pass.set_bind_group(self.object_group, bind_group, &[]);
        for (slot, buffer) in vertex_bindings(self.shader.attributes(), mesh) {
            pass.set_vertex_buffer(slot, buffer.slice(..));
        }
        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..mesh.index_count(), 0, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::testing::RecordingGpu,
        resources::{SceneData, fixtures::triangle_glb},
    };

    const SHADER: &str = r#"{
        "name": "lit",
        "vertex": { "entry": "vmain", "code": "
            @tag(perspective_projection_matrix) @group(0) @binding(0) var<uniform> prj_m: mat4x4f;
            @tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;
            @tag(inverse_transpose_local_to_world_matrix) @group(1) @binding(1) var<uniform> itm_m: mat4x4f;
            struct a2v {
                @location(0) @attribute=POSITION pos: vec3<f32>,
                @location(1) @attribute=NORMAL nor: vec3<f32>,
            };
            fn vmain(i: a2v) { let p = prj_m * mdl_m * itm_m; }
        " },
        "fragment": { "entry": "fmain", "code": "
            @tag(albedo_texture) @group(1) @binding(2) var t_albedo: texture_2d<f32>;
            fn fmain() { let c = t_albedo; }
        " },
        "bind_groups": { "VIEW_INDEX": 0, "OBJECT_INDEX": 1 }
    }"#;

    #[test]
    fn object_tags_resolve_to_slots() {
        let source = ShaderSource::parse(SHADER).unwrap();
        let slots = tag_slots(&source, &Tag::OBJECT);
        assert_eq!(slots.len(), 3);
        assert_eq!(
            slots[&Tag::LocalToWorld],
            TagSlot {
                group: 1,
                slot: 0,
                name: "mdl_m".to_string()
            }
        );
        assert_eq!(slots[&Tag::AlbedoTexture].slot, 2);
        assert!(!slots.contains_key(&Tag::AlbedoSampler));
        assert!(!slots.contains_key(&Tag::PerspectiveProjection));
        assert_eq!(object_group(&source, &slots), 1);
    }

    #[test]
    fn object_group_falls_back_to_tagged_group() {
        let text = SHADER
            .replace(r#""bind_groups": { "VIEW_INDEX": 0, "OBJECT_INDEX": 1 }"#, r#""requires": []"#)
            .replace("@group(1)", "@group(2)");
        let source = ShaderSource::parse(&text).unwrap();
        let slots = tag_slots(&source, &Tag::OBJECT);
        assert_eq!(object_group(&source, &slots), 2);
    }

    #[test]
    fn vertex_buffers_skip_missing_attributes() {
        let source = ShaderSource::parse(SHADER).unwrap();
        let scene = SceneData::from_glb(&triangle_glb()).unwrap();
        let mut mesh: MeshRecord<usize> = MeshRecord::from_document(&scene, 0).unwrap();
        assert!(vertex_bindings(&source.attributes, &mesh).is_empty());

        mesh.store(&RecordingGpu::default());
        let bindings = vertex_bindings(&source.attributes, &mesh);
        assert_eq!(bindings, vec![(0, &0)]);
    }
}
