//! GPU context and the buffer façade the engine uploads through.
//!
//! [`Context`] owns the window surface, device and queue. Most engine code
//! never touches it directly: uploads go through [`GpuHandle`], a borrowed
//! device/queue pair implementing [`GpuBuffers`], so that allocation and
//! rewrite discipline can be exercised without a GPU.

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::render::Swapchain;

/// Buffer allocation and rewrite: the subset of the GPU that transform caches
/// and mesh uploads depend on.
pub trait GpuBuffers {
    type Buffer: Clone;

    /// Allocate a buffer initialised with `contents`. `COPY_DST` is always added
    /// to `usage` so the buffer can be rewritten in place later.
    fn create_buffer(&self, label: &str, usage: wgpu::BufferUsages, contents: &[u8])
    -> Self::Buffer;

    /// Overwrite the buffer's contents starting at offset zero.
    fn write_buffer(&self, buffer: &Self::Buffer, contents: &[u8]);
}

/// Borrowed device and queue.
#[derive(Clone, Copy, Debug)]
pub struct GpuHandle<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl<'a> GpuHandle<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl GpuBuffers for GpuHandle<'_> {
    type Buffer = wgpu::Buffer;

    fn create_buffer(
        &self,
        label: &str,
        usage: wgpu::BufferUsages,
        contents: &[u8],
    ) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: usage | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, contents: &[u8]) {
        self.queue.write_buffer(buffer, 0, contents);
    }
}


/// Runtime configuration for the host loop and the render target.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Logical pulse rate in Hz.
    pub pulse_rate: u32,
    pub clear_colour: wgpu::Color,
    /// How long the load barrier may stay closed before start-up fails.
    pub load_timeout: instant::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "scene-ngin".to_string(),
            width: 512,
            height: 384,
            pulse_rate: 60,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.3,
                a: 1.0,
            },
            load_timeout: instant::Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub swapchain: Swapchain,
    pub clear_colour: wgpu::Color,
    pub(crate) pulse_rate: u32,
}

impl Context {
    pub async fn new(window: Arc<Window>, engine: &EngineConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no supported formats"))?;
        let config = wgpu::SurfaceConfiguration {
            // the swapchain copies its finished frame into the surface texture
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let swapchain = Swapchain::new(&device, config.format, [config.width, config.height]);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            swapchain,
            clear_colour: engine.clear_colour,
            pulse_rate: engine.pulse_rate.max(1),
        })
    }

    pub fn gpu(&self) -> GpuHandle<'_> {
        GpuHandle::new(&self.device, &self.queue)
    }

    /// Colour format of the render target pipelines must write to.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Change the logical pulse rate (Hz). Takes effect on the next pulse.
    pub fn set_frame_rate(&mut self, hz: u32) {
        self.pulse_rate = hz.max(1);
    }

    pub fn frame_rate(&self) -> u32 {
        self.pulse_rate
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.swapchain.resize(&self.device, [width, height]);
    }
}
