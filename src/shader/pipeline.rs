//! Render pipeline construction from a compiled shader.

use crate::data_structures::texture::Texture;

/// Caller-supplied pipeline state for [`ShaderDescriptor::build_pipeline`](super::ShaderDescriptor::build_pipeline).
#[derive(Clone, Debug)]
pub struct PipelineProps {
    pub label: Option<String>,
    pub topology: wgpu::PrimitiveTopology,
    pub front_face: wgpu::FrontFace,
    pub cull_mode: Option<wgpu::Face>,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub color_format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

impl PipelineProps {
    /// Triangle list, back-face culling, depth write with `Less` on a 24-bit
    /// depth target.
    pub fn basic(color_format: wgpu::TextureFormat) -> Self {
        Self {
            label: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: Texture::DEPTH_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Less),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            color_format,
            blend: Some(wgpu::BlendState::REPLACE),
        }
    }
}

pub(crate) struct Stages<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment: &'a wgpu::ShaderModule,
    pub fragment_entry: &'a str,
}

pub(crate) fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    stages: Stages<'_>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    props: &PipelineProps,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: props.label.as_deref(),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: stages.vertex,
            entry_point: Some(stages.vertex_entry),
            buffers: vertex_layouts,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: stages.fragment,
            entry_point: Some(stages.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: props.color_format,
                blend: props.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: props.topology,
            strip_index_format: None,
            front_face: props.front_face,
            cull_mode: props.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: props.depth_stencil.clone(),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
        cache: None,
    })
}
