//! Shader compiler.
//!
//! [`ShaderDescriptor::compile`] turns an annotated shader file (see [`parse`])
//! into GPU objects: one bind group layout per declared group index, a pipeline
//! layout ordered by group index, one vertex buffer layout per `@attribute`, and
//! the two stage modules. Entries carrying a `@tag(..)` are what the component
//! layer resolves resources by, see [`Tag`].

use std::{collections::HashMap, fmt, str::FromStr};

use thiserror::Error;

pub mod parse;
pub mod pipeline;

pub use parse::{AttributeSlot, GroupEntry, NativeGroup, QueriedEntry, ShaderSource, StageSource};
pub use pipeline::PipelineProps;

/// Logical name of the per-object group in a shader's `bind_groups` table.
pub const OBJECT_GROUP: &str = "OBJECT_INDEX";
/// Logical name of the per-camera group.
pub const VIEW_GROUP: &str = "VIEW_INDEX";

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader document is not valid JSON after preprocessing: {0}")]
    Json(#[from] serde_json::Error),
    #[error("shader `{shader}` has no {stage} stage")]
    MissingStage { shader: String, stage: &'static str },
    #[error("shader `{shader}` is missing required tags: {}", tags.join(", "))]
    MissingTags { shader: String, tags: Vec<String> },
    #[error("binding `{name}` has unsupported type `{datatype}`")]
    UnsupportedBinding { name: String, datatype: String },
    #[error("attribute {semantic} has unsupported type `{datatype}`")]
    UnsupportedAttribute { semantic: String, datatype: String },
    #[error("group {group} binding {binding} is declared as both `{first}` and `{second}`")]
    ConflictingBinding {
        group: u32,
        binding: u32,
        first: String,
        second: String,
    },
    #[error("shader `{shader}` uses group {index} but the device allows {limit} bind groups")]
    TooManyGroups { shader: String, index: u32, limit: u32 },
    #[error("shader `{shader}` was rejected by the device: {message}")]
    Rejected { shader: String, message: String },
    #[error("shader `{shader}` has no group {index}")]
    UnknownGroup { shader: String, index: u32 },
    #[error("no resource named `{name}` for `{group}`")]
    MissingResource { group: String, name: String },
    #[error("resource `{name}` for `{group}` is a {found}, expected a {expected}")]
    ResourceMismatch {
        group: String,
        name: String,
        expected: BindingKind,
        found: BindingKind,
    },
}

/// What shape of resource a group entry binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Uniform,
    Texture,
    Sampler,
}

impl BindingKind {
    /// Classify a declaration by its qualifier and WGSL type.
    pub fn classify(qualifier: &str, datatype: &str) -> Option<Self> {
        if datatype.starts_with("texture_2d") {
            Some(Self::Texture)
        } else if datatype == "sampler" {
            Some(Self::Sampler)
        } else if qualifier == "var<uniform>" || datatype.starts_with("mat4x4") {
            Some(Self::Uniform)
        } else {
            None
        }
    }

    fn layout_type(self) -> wgpu::BindingType {
        match self {
            Self::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Self::Texture => wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            Self::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uniform => "uniform buffer",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
        })
    }
}

/// Resource roles the engine knows how to fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    LocalToWorld,
    InverseTransposeLocalToWorld,
    InverseLocalToWorld,
    AlbedoTexture,
    AlbedoSampler,
    PerspectiveProjection,
    View,
    InverseView,
}

impl Tag {
    /// Tags a mesh instance resolves in its object group.
    pub const OBJECT: [Tag; 5] = [
        Tag::LocalToWorld,
        Tag::InverseTransposeLocalToWorld,
        Tag::InverseLocalToWorld,
        Tag::AlbedoTexture,
        Tag::AlbedoSampler,
    ];

    /// Tags a view fills in the camera group.
    pub const VIEW: [Tag; 3] = [Tag::PerspectiveProjection, Tag::View, Tag::InverseView];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::LocalToWorld => "local_to_world_matrix",
            Tag::InverseTransposeLocalToWorld => "inverse_transpose_local_to_world_matrix",
            Tag::InverseLocalToWorld => "inverse_local_to_world_matrix",
            Tag::AlbedoTexture => "albedo_texture",
            Tag::AlbedoSampler => "albedo_sampler",
            Tag::PerspectiveProjection => "perspective_projection_matrix",
            Tag::View => "view_matrix",
            Tag::InverseView => "inverse_view_matrix",
        }
    }

    pub fn kind(self) -> BindingKind {
        match self {
            Tag::AlbedoTexture => BindingKind::Texture,
            Tag::AlbedoSampler => BindingKind::Sampler,
            _ => BindingKind::Uniform,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown tag `{0}`")]
pub struct UnknownTag(pub String);

impl FromStr for Tag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::OBJECT
            .into_iter()
            .chain(Tag::VIEW)
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// A concrete GPU resource to bind to a group entry.
#[derive(Clone, Debug)]
pub enum GpuResource {
    Buffer(wgpu::Buffer),
    TextureView(wgpu::TextureView),
    Sampler(wgpu::Sampler),
}

/// Resources for a group, keyed by the entries' variable names.
pub type ResourceMap = HashMap<String, GpuResource>;

/// Anything that can report which [`BindingKind`] it satisfies.
pub trait BindingShape {
    fn kind(&self) -> BindingKind;
}

impl BindingShape for GpuResource {
    fn kind(&self) -> BindingKind {
        match self {
            GpuResource::Buffer(_) => BindingKind::Uniform,
            GpuResource::TextureView(_) => BindingKind::Texture,
            GpuResource::Sampler(_) => BindingKind::Sampler,
        }
    }
}

impl BindingShape for BindingKind {
    fn kind(&self) -> BindingKind {
        *self
    }
}

/// Zip a group's entries with resources by name, checking each resource has the
/// shape the entry declares. Returns `(slot, resource)` pairs in slot order.
pub fn resolve_group<'r, R: BindingShape>(
    group: &NativeGroup,
    resources: &'r HashMap<String, R>,
) -> Result<Vec<(u32, &'r R)>, ShaderError> {
    group
        .entries
        .iter()
        .enumerate()
        .map(|(slot, entry)| {
            let resource =
                resources
                    .get(&entry.name)
                    .ok_or_else(|| ShaderError::MissingResource {
                        group: group.label.clone(),
                        name: entry.name.clone(),
                    })?;
            if resource.kind() != entry.kind {
                return Err(ShaderError::ResourceMismatch {
                    group: group.label.clone(),
                    name: entry.name.clone(),
                    expected: entry.kind,
                    found: resource.kind(),
                });
            }
            Ok((slot as u32, resource))
        })
        .collect()
}

/// A compiled shader: parsed metadata plus its GPU layouts and modules.
#[derive(Debug)]
pub struct ShaderDescriptor {
    source: ShaderSource,
    /// Indexed by group index; indices no group declares hold empty layouts.
    layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
}

impl ShaderDescriptor {
    pub fn compile(device: &wgpu::Device, text: &str) -> Result<Self, ShaderError> {
        let source = ShaderSource::parse(text)?;
        log::info!("Compiling shader {}", source.name);

        let group_count = source.groups.iter().map(|g| g.index + 1).max().unwrap_or(0);
        let limit = device.limits().max_bind_groups;
        if group_count > limit {
            return Err(ShaderError::TooManyGroups {
                shader: source.name.clone(),
                index: group_count - 1,
                limit,
            });
        }

        // validation errors of everything created until `scope.pop()`
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let layouts: Vec<wgpu::BindGroupLayout> = (0..group_count)
            .map(|index| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = source
                    .group(index)
                    .map(|group| {
                        group
                            .entries
                            .iter()
                            .enumerate()
                            .map(|(slot, entry)| wgpu::BindGroupLayoutEntry {
                                binding: slot as u32,
                                visibility: entry.visibility,
                                ty: entry.kind.layout_type(),
                                count: None,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}_layout_{index}", source.name)),
                    entries: &entries,
                })
            })
            .collect();

        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> = layouts.iter().map(Some).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_pipeline_layout", source.name)),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}_vertex", source.name)),
            source: wgpu::ShaderSource::Wgsl(source.vertex.code.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}_fragment", source.name)),
            source: wgpu::ShaderSource::Wgsl(source.fragment.code.as_str().into()),
        });
        if let Some(error) = futures::executor::block_on(scope.pop()) {
            return Err(ShaderError::Rejected {
                shader: source.name.clone(),
                message: error.to_string(),
            });
        }

        Ok(Self {
            source,
            layouts,
            pipeline_layout,
            vertex,
            fragment,
        })
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn source(&self) -> &ShaderSource {
        &self.source
    }

    pub fn groups(&self) -> &[NativeGroup] {
        &self.source.groups
    }

    pub fn attributes(&self) -> &[AttributeSlot] {
        &self.source.attributes
    }

    pub fn query(&self, predicate: impl Fn(&GroupEntry) -> bool) -> Vec<QueriedEntry<'_>> {
        self.source.query(predicate)
    }

    pub fn query_tag(&self, tag: Tag) -> Vec<QueriedEntry<'_>> {
        self.source.query_tag(tag.as_str())
    }

    pub fn group_index(&self, name: &str) -> Option<u32> {
        self.source.group_index(name)
    }

    pub fn group(&self, index: u32) -> Option<&NativeGroup> {
        self.source.group(index)
    }

    pub fn layout(&self, index: u32) -> Option<&wgpu::BindGroupLayout> {
        self.layouts.get(index as usize)
    }

    pub fn pipeline_layout(&self) -> &wgpu::PipelineLayout {
        &self.pipeline_layout
    }

    pub fn build_pipeline(&self, device: &wgpu::Device, props: &PipelineProps) -> wgpu::RenderPipeline {
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = self
            .source
            .attributes
            .iter()
            .map(|a| {
                [wgpu::VertexAttribute {
                    format: a.format,
                    offset: 0,
                    shader_location: a.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = self
            .source
            .attributes
            .iter()
            .zip(&attributes)
            .map(|(a, attribute)| wgpu::VertexBufferLayout {
                array_stride: a.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let mut props = props.clone();
        if props.label.is_none() {
            props.label = Some(format!("{}_pipeline", self.source.name));
        }
        pipeline::mk_render_pipeline(
            device,
            &self.pipeline_layout,
            pipeline::Stages {
                vertex: &self.vertex,
                vertex_entry: &self.source.vertex.entry,
                fragment: &self.fragment,
                fragment_entry: &self.source.fragment.entry,
            },
            &buffers,
            &props,
        )
    }

    pub fn build_basic_pipeline(
        &self,
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        self.build_pipeline(device, &PipelineProps::basic(color_format))
    }

    /// Create a bind group for `group`, taking each entry's resource from
    /// `resources` by variable name.
    pub fn bind_native_group(
        &self,
        device: &wgpu::Device,
        group: &NativeGroup,
        resources: &ResourceMap,
    ) -> Result<wgpu::BindGroup, ShaderError> {
        let layout = self.layout(group.index).ok_or_else(|| ShaderError::UnknownGroup {
            shader: self.source.name.clone(),
            index: group.index,
        })?;
        let entries: Vec<wgpu::BindGroupEntry> = resolve_group(group, resources)?
            .into_iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding,
                resource: match resource {
                    GpuResource::Buffer(buffer) => buffer.as_entire_binding(),
                    GpuResource::TextureView(view) => wgpu::BindingResource::TextureView(view),
                    GpuResource::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&group.label),
            layout,
            entries: &entries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(entries: &[(&str, BindingKind)]) -> NativeGroup {
        NativeGroup {
            label: "object".to_string(),
            index: 1,
            entries: entries
                .iter()
                .map(|(name, kind)| GroupEntry {
                    name: name.to_string(),
                    qualifier: "var".to_string(),
                    datatype: String::new(),
                    tag: None,
                    kind: *kind,
                    visibility: wgpu::ShaderStages::VERTEX,
                })
                .collect(),
        }
    }

    #[test]
    fn classify_declarations() {
        assert_eq!(BindingKind::classify("var<uniform>", "mat4x4f"), Some(BindingKind::Uniform));
        assert_eq!(BindingKind::classify("var", "mat4x4<f32>"), Some(BindingKind::Uniform));
        assert_eq!(BindingKind::classify("var<uniform>", "vec4f"), Some(BindingKind::Uniform));
        assert_eq!(BindingKind::classify("var", "texture_2d<f32>"), Some(BindingKind::Texture));
        assert_eq!(BindingKind::classify("var", "sampler"), Some(BindingKind::Sampler));
        assert_eq!(BindingKind::classify("var", "sampler_comparison"), None);
        assert_eq!(BindingKind::classify("var<storage>", "array<f32>"), None);
    }

    #[test]
    fn tags_round_trip_through_strings() {
        for tag in Tag::OBJECT.into_iter().chain(Tag::VIEW) {
            assert_eq!(tag.as_str().parse::<Tag>(), Ok(tag));
        }
        assert_eq!(
            "diffuse".parse::<Tag>(),
            Err(UnknownTag("diffuse".to_string()))
        );
        assert_eq!(Tag::AlbedoSampler.kind(), BindingKind::Sampler);
        assert_eq!(Tag::InverseView.kind(), BindingKind::Uniform);
    }

    #[test]
    fn resolve_orders_by_slot() {
        let group = group(&[("mdl", BindingKind::Uniform), ("t", BindingKind::Texture)]);
        let resources = HashMap::from([
            ("t".to_string(), BindingKind::Texture),
            ("mdl".to_string(), BindingKind::Uniform),
        ]);
        let resolved = resolve_group(&group, &resources).unwrap();
        assert_eq!(
            resolved,
            vec![(0, &BindingKind::Uniform), (1, &BindingKind::Texture)]
        );
    }

    #[test]
    fn resolve_reports_missing_and_mismatched() {
        let group = group(&[("mdl", BindingKind::Uniform), ("s", BindingKind::Sampler)]);

        let resources = HashMap::from([("mdl".to_string(), BindingKind::Uniform)]);
        assert!(matches!(
            resolve_group(&group, &resources),
            Err(ShaderError::MissingResource { name, .. }) if name == "s"
        ));

        let resources = HashMap::from([
            ("mdl".to_string(), BindingKind::Uniform),
            ("s".to_string(), BindingKind::Texture),
        ]);
        assert!(matches!(
            resolve_group(&group, &resources),
            Err(ShaderError::ResourceMismatch {
                expected: BindingKind::Sampler,
                found: BindingKind::Texture,
                ..
            })
        ));
    }
}
