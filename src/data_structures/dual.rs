//! Dual frames: matrices paired with the GPU buffers that mirror them.
//!
//! A [`DualFrame`] caches an object's world matrix together with its inverse
//! and inverse-transpose; a [`DualView`] does the same for a camera's
//! projection, view and inverse view. Both upload lazily: [`bind`](DualFrame::bind)
//! does nothing unless a setter observed a change, allocates the three uniform
//! buffers the first time, and rewrites them in place afterwards.

use cgmath::{Matrix, Matrix4, SquareMatrix};

use crate::context::GpuBuffers;

/// Largest per-element difference treated as "unchanged".
pub const EPSILON: f32 = 1e-4;

/// True if any element of `a` and `b` differs by more than [`EPSILON`].
pub fn differs(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
    let a: &[f32; 16] = a.as_ref();
    let b: &[f32; 16] = b.as_ref();
    a.iter().zip(b.iter()).any(|(x, y)| (x - y).abs() > EPSILON)
}

pub(crate) fn raw(m: &Matrix4<f32>) -> [[f32; 4]; 4] {
    (*m).into()
}

fn upload<G: GpuBuffers>(
    gpu: &G,
    buffers: &mut Option<[G::Buffer; 3]>,
    labels: [&str; 3],
    matrices: [&Matrix4<f32>; 3],
) {
    match buffers {
        Some(existing) => {
            for (buffer, m) in existing.iter().zip(matrices) {
                gpu.write_buffer(buffer, bytemuck::cast_slice(&raw(m)));
            }
        }
        None => {
            *buffers = Some([0, 1, 2].map(|i| {
                gpu.create_buffer(
                    labels[i],
                    wgpu::BufferUsages::UNIFORM,
                    bytemuck::cast_slice(&raw(matrices[i])),
                )
            }));
        }
    }
}

/// World matrix, inverse and inverse-transpose of one object.
#[derive(Debug, Clone)]
pub struct DualFrame<B = wgpu::Buffer> {
    world: Matrix4<f32>,
    inverse: Matrix4<f32>,
    inverse_transpose: Matrix4<f32>,
    buffers: Option<[B; 3]>,
    dirty: bool,
}

impl<B> Default for DualFrame<B> {
    fn default() -> Self {
        Self::new(Matrix4::identity())
    }
}

impl<B> DualFrame<B> {
    pub fn new(world: Matrix4<f32>) -> Self {
        let mut frame = Self {
            world,
            inverse: Matrix4::identity(),
            inverse_transpose: Matrix4::identity(),
            buffers: None,
            dirty: true,
        };
        frame.derive();
        frame
    }

    fn derive(&mut self) {
        match self.world.invert() {
            Some(inverse) => {
                self.inverse = inverse;
                self.inverse_transpose = inverse.transpose();
            }
            None => log::warn!("World matrix is singular, keeping the previous inverse."),
        }
    }

    /// Replace the world matrix. Marks the frame dirty only if some element
    /// moved by more than [`EPSILON`].
    pub fn set(&mut self, world: Matrix4<f32>) {
        if !differs(&world, &self.world) {
            return;
        }
        self.dirty = true;
        self.world = world;
        self.derive();
    }

    pub fn world(&self) -> &Matrix4<f32> {
        &self.world
    }

    pub fn inverse(&self) -> &Matrix4<f32> {
        &self.inverse
    }

    pub fn inverse_transpose(&self) -> &Matrix4<f32> {
        &self.inverse_transpose
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `None` until the first [`bind`](Self::bind).
    pub fn world_buffer(&self) -> Option<&B> {
        self.buffers.as_ref().map(|[world, _, _]| world)
    }

    pub fn inverse_buffer(&self) -> Option<&B> {
        self.buffers.as_ref().map(|[_, inverse, _]| inverse)
    }

    pub fn inverse_transpose_buffer(&self) -> Option<&B> {
        self.buffers.as_ref().map(|[_, _, it]| it)
    }

    /// Upload the three matrices if dirty. Returns whether anything was sent.
    pub fn bind<G>(&mut self, gpu: &G) -> bool
    where
        G: GpuBuffers<Buffer = B>,
    {
        if !self.dirty {
            return false;
        }
        upload(
            gpu,
            &mut self.buffers,
            ["l2w_bf", "l2w_iv_bf", "l2w_ivt_bf"],
            [&self.world, &self.inverse, &self.inverse_transpose],
        );
        self.dirty = false;
        true
    }
}

/// Projection, view and inverse view of one camera.
#[derive(Debug, Clone)]
pub struct DualView<B = wgpu::Buffer> {
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
    inverse_view: Matrix4<f32>,
    buffers: Option<[B; 3]>,
    dirty: bool,
}

impl<B> Default for DualView<B> {
    fn default() -> Self {
        Self::new(Matrix4::identity(), Matrix4::identity())
    }
}

impl<B> DualView<B> {
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>) -> Self {
        Self {
            projection,
            view,
            inverse_view: view.invert().unwrap_or_else(Matrix4::identity),
            buffers: None,
            dirty: true,
        }
    }

    pub fn set_projection(&mut self, projection: Matrix4<f32>) {
        if differs(&projection, &self.projection) {
            self.dirty = true;
            self.projection = projection;
        }
    }

    /// `view` is the camera's local-to-world matrix; its inverse is what the
    /// vertex stage usually wants.
    pub fn set_view(&mut self, view: Matrix4<f32>) {
        if !differs(&view, &self.view) {
            return;
        }
        self.dirty = true;
        self.view = view;
        match view.invert() {
            Some(inverse) => self.inverse_view = inverse,
            None => log::warn!("View matrix is singular, keeping the previous inverse."),
        }
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn view(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn inverse_view(&self) -> &Matrix4<f32> {
        &self.inverse_view
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn projection_buffer(&self) -> Option<&B> {
        self.buffers.as_ref().map(|[p, _, _]| p)
    }

    pub fn view_buffer(&self) -> Option<&B> {
        self.buffers.as_ref().map(|[_, v, _]| v)
    }

    pub fn inverse_view_buffer(&self) -> Option<&B> {
        self.buffers.as_ref().map(|[_, _, iv]| iv)
    }

    pub fn bind<G>(&mut self, gpu: &G) -> bool
    where
        G: GpuBuffers<Buffer = B>,
    {
        if !self.dirty {
            return false;
        }
        upload(
            gpu,
            &mut self.buffers,
            ["prj_bf", "view_bf", "iview_bf"],
            [&self.projection, &self.view, &self.inverse_view],
        );
        self.dirty = false;
        true
    }
}
