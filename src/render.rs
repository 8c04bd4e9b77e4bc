//! Frame targets and draw-time errors.
//!
//! The [`Swapchain`] renders into its own colour and depth textures and copies
//! the finished colour target into the surface texture on
//! [`flush`](Swapchain::flush). A frame on the host loop is
//! `refresh → clear(draw) → flush → submit → present`.

use thiserror::Error;

use crate::{
    data_structures::{entity::ComponentKind, texture::Texture, uid::Uid},
    resources::ResourceError,
    shader::ShaderError,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("mesh instance of mesh {mesh} was drawn before it was baked")]
    NotBaked { mesh: Uid },
    #[error("entity {entity} has no {kind:?} component")]
    MissingComponent { entity: Uid, kind: ComponentKind },
    #[error("no surface texture was acquired for this frame")]
    NoFrame,
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// Off-screen colour and depth targets plus the surface texture being drawn.
#[derive(Debug)]
pub struct Swapchain {
    colour: Texture,
    depth: Texture,
    format: wgpu::TextureFormat,
    size: [u32; 2],
    frame: Option<wgpu::SurfaceTexture>,
}

impl Swapchain {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, size: [u32; 2]) -> Self {
        let (colour, depth) = Self::targets(device, format, size);
        Self {
            colour,
            depth,
            format,
            size,
            frame: None,
        }
    }

    fn targets(device: &wgpu::Device, format: wgpu::TextureFormat, size: [u32; 2]) -> (Texture, Texture) {
        let colour = Texture::create_target(
            device,
            size,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            "swapchain_colour",
        );
        let depth = Texture::create_depth_texture(device, size, "swapchain_depth");
        (colour, depth)
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: [u32; 2]) {
        if size == self.size {
            return;
        }
        (self.colour, self.depth) = Self::targets(device, self.format, size);
        self.size = size;
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Hold the surface texture the next flush copies into. A texture still
    /// held from an unflushed frame is dropped.
    pub fn refresh(&mut self, frame: wgpu::SurfaceTexture) {
        if self.frame.replace(frame).is_some() {
            log::warn!("Previous frame was never flushed, dropping it.");
        }
    }

    /// Open one render pass clearing colour to `colour` and depth to 1, and let
    /// `draw` record into it.
    pub fn clear<R>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        colour: wgpu::Color,
        draw: impl FnOnce(&mut wgpu::RenderPass<'_>) -> R,
    ) -> R {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("swapchain_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.colour.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        draw(&mut pass)
    }

    /// Copy the colour target into the held surface texture and hand it back
    /// for presenting once the encoder has been submitted.
    pub fn flush(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<wgpu::SurfaceTexture, RenderError> {
        let frame = self.frame.take().ok_or(RenderError::NoFrame)?;
        let target = frame.texture.size();
        let extent = wgpu::Extent3d {
            width: self.size[0].min(target.width),
            height: self.size[1].min(target.height),
            depth_or_array_layers: 1,
        };
        encoder.copy_texture_to_texture(
            self.colour.texture.as_image_copy(),
            frame.texture.as_image_copy(),
            extent,
        );
        Ok(frame)
    }
}
