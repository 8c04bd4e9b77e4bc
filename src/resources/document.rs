//! The decoded scene: typed JSON document plus its binary chunks.

use std::sync::Arc;

use gltf::json::{
    self,
    accessor::{ComponentType, Type},
    mesh::Semantic,
    texture::{MagFilter, MinFilter, WrappingMode},
    validation::Checked,
};

use super::{
    ResourceError,
    glb::{DecodeError, decode_glb},
};
use crate::data_structures::{
    scene_graph::{self, GraphError, Node, VisitedNode},
    texture::SamplerConfig,
};

/// A byte range inside a shared binary chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub chunk: Arc<[u8]>,
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub fn bytes(&self) -> &[u8] {
        &self.chunk[self.offset..self.offset + self.len]
    }

    /// Drop trailing bytes so the length is a multiple of `alignment`.
    pub fn truncate_to(&mut self, alignment: usize) {
        self.len -= self.len % alignment;
    }
}

/// An accessor resolved against its buffer view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessorData {
    pub count: usize,
    pub component_type: ComponentType,
    pub type_: Type,
    pub data: ByteRange,
}

pub fn component_size(component_type: ComponentType) -> usize {
    match component_type {
        ComponentType::I8 | ComponentType::U8 => 1,
        ComponentType::I16 | ComponentType::U16 => 2,
        ComponentType::U32 | ComponentType::F32 => 4,
    }
}

pub fn arity(type_: Type) -> usize {
    match type_ {
        Type::Scalar => 1,
        Type::Vec2 => 2,
        Type::Vec3 => 3,
        Type::Vec4 | Type::Mat2 => 4,
        Type::Mat3 => 9,
        Type::Mat4 => 16,
    }
}

/// Attribute name as written in glTF (`POSITION`, `TEXCOORD_0`, ...).
pub fn semantic_name(semantic: &Semantic) -> Option<String> {
    Some(match semantic {
        Semantic::Positions => "POSITION".to_string(),
        Semantic::Normals => "NORMAL".to_string(),
        Semantic::Tangents => "TANGENT".to_string(),
        Semantic::Colors(n) => format!("COLOR_{n}"),
        Semantic::TexCoords(n) => format!("TEXCOORD_{n}"),
        Semantic::Joints(n) => format!("JOINTS_{n}"),
        Semantic::Weights(n) => format!("WEIGHTS_{n}"),
        #[allow(unreachable_patterns)]
        _ => return None,
    })
}

fn address_mode(mode: &Checked<WrappingMode>) -> wgpu::AddressMode {
    match mode {
        Checked::Valid(WrappingMode::ClampToEdge) => wgpu::AddressMode::ClampToEdge,
        Checked::Valid(WrappingMode::MirroredRepeat) => wgpu::AddressMode::MirrorRepeat,
        _ => wgpu::AddressMode::Repeat,
    }
}

/// Translate a glTF sampler. Unset filters stay linear.
pub fn sampler_config(sampler: &json::texture::Sampler) -> SamplerConfig {
    let mut config = SamplerConfig {
        address_mode_u: address_mode(&sampler.wrap_s),
        address_mode_v: address_mode(&sampler.wrap_t),
        ..SamplerConfig::default()
    };
    if let Some(Checked::Valid(MagFilter::Nearest)) = sampler.mag_filter {
        config.mag_filter = wgpu::FilterMode::Nearest;
    }
    if let Some(Checked::Valid(min)) = sampler.min_filter {
        let (filter, mipmap) = match min {
            MinFilter::Nearest => (wgpu::FilterMode::Nearest, config.mipmap_filter),
            MinFilter::Linear => (wgpu::FilterMode::Linear, config.mipmap_filter),
            MinFilter::NearestMipmapNearest => {
                (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Nearest)
            }
            MinFilter::LinearMipmapNearest => {
                (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest)
            }
            MinFilter::NearestMipmapLinear => {
                (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Linear)
            }
            MinFilter::LinearMipmapLinear => {
                (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Linear)
            }
        };
        config.min_filter = filter;
        config.mipmap_filter = mipmap;
    }
    config
}

/// A decoded binary glTF file.
#[derive(Clone, Debug)]
pub struct SceneData {
    pub document: json::Root,
    pub bins: Vec<Arc<[u8]>>,
}

impl SceneData {
    pub fn from_glb(bytes: &[u8]) -> Result<Self, DecodeError> {
        let glb = decode_glb(bytes)?;
        let document =
            serde_json::from_slice(&glb.json).map_err(|e| DecodeError::Json(e.to_string()))?;
        Ok(Self {
            document,
            bins: glb.bins,
        })
    }

    /// The flat node list in the form the scene graph walks.
    pub fn nodes(&self) -> Vec<Node> {
        self.document
            .nodes
            .iter()
            .map(|node| Node {
                name: node.name.clone(),
                translation: node.translation,
                rotation: node.rotation.map(|q| q.0),
                scale: node.scale,
                matrix: node.matrix,
                mesh: node.mesh.map(|m| m.value()),
                children: node
                    .children
                    .iter()
                    .flatten()
                    .map(|child| child.value())
                    .collect(),
            })
            .collect()
    }

    /// Top-level nodes of `scene`, or of the default scene when `None`.
    ///
    /// A document without scenes treats every node that is nobody's child as a
    /// root.
    pub fn roots(&self, scene: Option<usize>) -> Vec<usize> {
        let scene = scene
            .or(self.document.scene.map(|s| s.value()))
            .unwrap_or(0);
        if let Some(scene) = self.document.scenes.get(scene) {
            return scene.nodes.iter().map(|n| n.value()).collect();
        }
        let nodes = self.nodes();
        let mut is_child = vec![false; nodes.len()];
        for child in nodes.iter().flat_map(|n| n.children.iter()) {
            if let Some(flag) = is_child.get_mut(*child) {
                *flag = true;
            }
        }
        (0..nodes.len()).filter(|&i| !is_child[i]).collect()
    }

    /// Walk `scene` breadth first, handing each node's world matrix and mesh
    /// index to `visit`.
    pub fn traverse<F>(&self, scene: Option<usize>, visit: F) -> Result<(), GraphError>
    where
        F: FnMut(&VisitedNode, Option<usize>),
    {
        let nodes = self.nodes();
        let roots = self.roots(scene);
        scene_graph::validate(&nodes, &roots, Some(self.document.meshes.len()))?;
        scene_graph::traverse(&nodes, &roots, visit)
    }

    pub fn view_bytes(&self, index: usize) -> Result<ByteRange, ResourceError> {
        let view = self
            .document
            .buffer_views
            .get(index)
            .ok_or(ResourceError::MissingView(index))?;
        let buffer = view.buffer.value();
        let chunk = self
            .bins
            .get(buffer)
            .ok_or(ResourceError::MissingChunk(buffer))?;
        let offset = view.byte_offset.map_or(0, |o| o.0 as usize);
        let len = view.byte_length.0 as usize;
        if offset + len > chunk.len() {
            return Err(ResourceError::OutOfBounds {
                view: index,
                end: offset + len,
                chunk: chunk.len(),
            });
        }
        Ok(ByteRange {
            chunk: chunk.clone(),
            offset,
            len,
        })
    }

    /// Resolve an accessor to the bytes of its elements.
    pub fn accessor(&self, index: usize) -> Result<AccessorData, ResourceError> {
        let accessor = self
            .document
            .accessors
            .get(index)
            .ok_or(ResourceError::MissingAccessor(index))?;
        let view = accessor
            .buffer_view
            .ok_or(ResourceError::SparseAccessor(index))?
            .value();
        let (component_type, type_) = match (&accessor.component_type, &accessor.type_) {
            (Checked::Valid(component), Checked::Valid(type_)) => (component.0, *type_),
            _ => return Err(ResourceError::InvalidAccessor(index)),
        };

        let element = component_size(component_type) * arity(type_);
        let stride = self
            .document
            .buffer_views
            .get(view)
            .and_then(|v| v.byte_stride)
            .map(|s| s.0);
        if let Some(stride) = stride.filter(|&stride| stride != element) {
            return Err(ResourceError::Interleaved {
                accessor: index,
                stride,
                element,
            });
        }

        let mut data = self.view_bytes(view)?;
        let skip = accessor.byte_offset.map_or(0, |o| o.0 as usize);
        let count = accessor.count.0 as usize;
        let len = count * element;
        if skip + len > data.len {
            return Err(ResourceError::OutOfBounds {
                view,
                end: data.offset + skip + len,
                chunk: data.offset + data.len,
            });
        }
        data.offset += skip;
        data.len = len;
        Ok(AccessorData {
            count,
            component_type,
            type_,
            data,
        })
    }
}
