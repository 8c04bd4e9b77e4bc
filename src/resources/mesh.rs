//! Mesh records: vertex attributes and indices of a glTF mesh, uploaded once.

use std::collections::BTreeMap;

use gltf::json::accessor::{ComponentType, Type};

use super::{
    ResourceError,
    document::{ByteRange, SceneData, semantic_name},
};
use crate::{context::GpuBuffers, data_structures::uid::Uid};

/// Bytes per index. Meshes are drawn with 16-bit indices.
pub const INDEX_SIZE: usize = 2;

#[derive(Clone, Debug)]
pub struct VertexAttribute<B = wgpu::Buffer> {
    pub semantic: String,
    pub count: usize,
    pub component_type: ComponentType,
    pub type_: Type,
    pub data: ByteRange,
    buffer: Option<B>,
}

impl<B> VertexAttribute<B> {
    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }
}

#[derive(Clone, Debug)]
pub struct IndexData<B = wgpu::Buffer> {
    pub data: ByteRange,
    buffer: Option<B>,
}

impl<B> IndexData<B> {
    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }
}

/// The first primitive of a glTF mesh.
#[derive(Clone, Debug)]
pub struct MeshRecord<B = wgpu::Buffer> {
    pub uid: Uid,
    pub name: String,
    pub attributes: BTreeMap<String, VertexAttribute<B>>,
    pub indices: Option<IndexData<B>>,
    /// glTF texture index of the material's base colour, if any.
    pub albedo: Option<usize>,
    loaded: bool,
}

impl<B> MeshRecord<B> {
    /// Read mesh `index` out of the document. Nothing is uploaded yet.
    pub fn from_document(scene: &SceneData, index: usize) -> Result<Self, ResourceError> {
        let mesh = scene
            .document
            .meshes
            .get(index)
            .ok_or_else(|| ResourceError::NoPrimitives(format!("#{index}")))?;
        let name = mesh.name.clone().unwrap_or_else(|| format!("mesh_{index}"));
        let primitive = mesh
            .primitives
            .first()
            .ok_or_else(|| ResourceError::NoPrimitives(name.clone()))?;
        if mesh.primitives.len() > 1 {
            log::warn!(
                "Mesh {name} has {} primitives, only the first is loaded.",
                mesh.primitives.len()
            );
        }

        let mut attributes = BTreeMap::new();
        for (semantic, accessor) in &primitive.attributes {
            let gltf::json::validation::Checked::Valid(semantic) = semantic else {
                continue;
            };
            let Some(semantic) = semantic_name(semantic) else {
                continue;
            };
            let accessor = scene.accessor(accessor.value())?;
            attributes.insert(
                semantic.clone(),
                VertexAttribute {
                    semantic,
                    count: accessor.count,
                    component_type: accessor.component_type,
                    type_: accessor.type_,
                    data: accessor.data,
                    buffer: None,
                },
            );
        }

        let indices = match primitive.indices {
            Some(accessor) => {
                let accessor = scene.accessor(accessor.value())?;
                if accessor.component_type != ComponentType::U16 {
                    log::warn!(
                        "Mesh {name} has {:?} indices, they will be read as 16-bit.",
                        accessor.component_type
                    );
                }
                let mut data = accessor.data;
                data.len = accessor.count * super::document::component_size(accessor.component_type);
                if data.len % 4 != 0 {
                    log::warn!(
                        "Index buffer of mesh {name} is {} bytes, truncating to a multiple of 4.",
                        data.len
                    );
                    data.truncate_to(4);
                }
                Some(IndexData { data, buffer: None })
            }
            None => None,
        };

        let albedo = primitive
            .material
            .and_then(|m| scene.document.materials.get(m.value()))
            .and_then(|m| m.pbr_metallic_roughness.base_color_texture.as_ref())
            .map(|info| info.index.value());

        Ok(Self {
            uid: 0,
            name,
            attributes,
            indices,
            albedo,
            loaded: false,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn vertex_buffer(&self, semantic: &str) -> Option<&B> {
        self.attributes.get(semantic)?.buffer()
    }

    pub fn index_buffer(&self) -> Option<&B> {
        self.indices.as_ref()?.buffer()
    }

    /// Number of 16-bit indices to draw.
    pub fn index_count(&self) -> u32 {
        self.indices
            .as_ref()
            .map_or(0, |indices| (indices.data.len / INDEX_SIZE) as u32)
    }

    /// Upload every attribute and the index buffer. Only the first call does
    /// anything; returns whether this call uploaded.
    pub fn store<G>(&mut self, gpu: &G) -> bool
    where
        G: GpuBuffers<Buffer = B>,
    {
        if self.loaded {
            return false;
        }
        for (semantic, attribute) in &mut self.attributes {
            attribute.buffer = Some(gpu.create_buffer(
                &format!("{}_{semantic}", self.name),
                wgpu::BufferUsages::VERTEX,
                attribute.data.bytes(),
            ));
        }
        if let Some(indices) = &mut self.indices {
            indices.buffer = Some(gpu.create_buffer(
                &format!("{}_indices", self.name),
                wgpu::BufferUsages::INDEX,
                indices.data.bytes(),
            ));
        }
        self.loaded = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::testing::RecordingGpu,
        resources::{
            fixtures::{TRIANGLE_JSON, triangle_bin, triangle_glb},
            glb::encode_glb,
        },
    };

    fn triangle() -> MeshRecord<usize> {
        let scene = SceneData::from_glb(&triangle_glb()).unwrap();
        MeshRecord::from_document(&scene, 0).unwrap()
    }

    #[test]
    fn reads_first_primitive() {
        let mesh = triangle();
        assert_eq!(mesh.name, "triangle");
        assert_eq!(mesh.attributes.len(), 1);
        let position = &mesh.attributes["POSITION"];
        assert_eq!(position.count, 3);
        assert_eq!(position.type_, Type::Vec3);
        assert_eq!(position.data.len, 36);
        assert_eq!(mesh.albedo, None);
        assert!(!mesh.is_loaded());
    }

    #[test]
    fn misaligned_indices_are_truncated() {
        let mesh = triangle();
        let indices = mesh.indices.as_ref().unwrap();
        assert_eq!(indices.data.len, 4);
        assert_eq!(mesh.index_count(), 2);
    }

    #[test]
    fn store_is_idempotent() {
        let gpu = RecordingGpu::default();
        let mut mesh = triangle();
        assert_eq!(mesh.vertex_buffer("POSITION"), None);

        assert!(mesh.store(&gpu));
        let position = mesh.vertex_buffer("POSITION").copied();
        let index = mesh.index_buffer().copied();
        assert_eq!(gpu.creates(), 2);

        assert!(!mesh.store(&gpu));
        assert_eq!(gpu.creates(), 2);
        assert_eq!(mesh.vertex_buffer("POSITION").copied(), position);
        assert_eq!(mesh.index_buffer().copied(), index);

        let created = gpu.created.borrow();
        assert_eq!(created[0].1, wgpu::BufferUsages::VERTEX);
        assert_eq!(created[0].2, triangle_bin()[..36].to_vec());
        assert_eq!(created[1].1, wgpu::BufferUsages::INDEX);
        assert_eq!(created[1].2.len(), 4);
    }

    #[test]
    fn material_albedo_is_remembered() {
        let json = TRIANGLE_JSON
            .replace(r#""indices": 1 }"#, r#""indices": 1, "material": 0 }"#)
            .replace(
                r#""buffers""#,
                r#""materials": [{ "pbrMetallicRoughness": { "baseColorTexture": { "index": 4 } } }],
                "buffers""#,
            );
        let scene = SceneData::from_glb(&encode_glb(&json, &[&triangle_bin()])).unwrap();
        let mesh: MeshRecord<usize> = MeshRecord::from_document(&scene, 0).unwrap();
        assert_eq!(mesh.albedo, Some(4));
    }

    #[test]
    fn meshes_without_primitives_fail() {
        let json = TRIANGLE_JSON.replace(
            r#""primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]"#,
            r#""primitives": []"#,
        );
        let scene = SceneData::from_glb(&encode_glb(&json, &[&triangle_bin()])).unwrap();
        assert!(matches!(
            MeshRecord::<usize>::from_document(&scene, 0),
            Err(ResourceError::NoPrimitives(name)) if name == "triangle"
        ));
    }
}
