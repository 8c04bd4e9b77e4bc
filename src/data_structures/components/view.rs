use cgmath::{Matrix4, Rad};

use super::mesh_instance::tag_slots;
use crate::{
    context::GpuBuffers,
    data_structures::dual::DualView,
    render::RenderError,
    resources::ResourceError,
    shader::{GpuResource, ResourceMap, ShaderDescriptor, ShaderError, ShaderSource, Tag, VIEW_GROUP},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Vertical field of view.
    Perspective { fov: Rad<f32> },
    /// Spans `[-aspect, aspect]` horizontally and `[-1, 1]` vertically.
    Orthographic,
}

/// Right-handed perspective projection with a `[0, 1]` depth range.
pub fn perspective(fov: Rad<f32>, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let f = 1.0 / (fov.0 / 2.0).tan();
    let nf = 1.0 / (near - far);
    #[rustfmt::skip]
    let m = Matrix4::new(
        f / aspect, 0.0, 0.0,              0.0,
        0.0,        f,   0.0,              0.0,
        0.0,        0.0, far * nf,        -1.0,
        0.0,        0.0, near * far * nf,  0.0,
    );
    m
}

/// Right-handed orthographic projection with a `[0, 1]` depth range.
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4<f32> {
    let rml = right - left;
    let tmb = top - bottom;
    let fmn = far - near;
    #[rustfmt::skip]
    let m = Matrix4::new(
        2.0 / rml,              0.0,                    0.0,          0.0,
        0.0,                    2.0 / tmb,              0.0,          0.0,
        0.0,                    0.0,                   -1.0 / fmn,    0.0,
        -(right + left) / rml, -(top + bottom) / tmb,  -near / fmn,   1.0,
    );
    m
}

/// Group index of the per-camera group: the shader's `VIEW_INDEX`, else the
/// group of its first view tag, else 0.
pub fn view_group(source: &ShaderSource) -> u32 {
    source.group_index(VIEW_GROUP).unwrap_or_else(|| {
        Tag::VIEW
            .iter()
            .find_map(|tag| source.query_tag(tag.as_str()).first().map(|hit| hit.group))
            .unwrap_or(0)
    })
}

/// A camera: projection parameters plus the [`DualView`] feeding the view
/// group.
#[derive(Debug, Clone)]
pub struct View<B = wgpu::Buffer> {
    projection: Projection,
    aspect: f32,
    near: f32,
    far: f32,
    stale: bool,
    dual: DualView<B>,
}

impl<B> Default for View<B> {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective {
                fov: Rad(std::f32::consts::FRAC_PI_2),
            },
            aspect: 1.77,
            near: 0.1,
            far: 1000.0,
            stale: true,
            dual: DualView::default(),
        }
    }
}

impl<B> View<B> {
    pub fn perspective(fov: Rad<f32>, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov },
            aspect,
            near,
            far,
            ..Self::default()
        }
    }

    pub fn orthographic(aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic,
            aspect,
            near,
            far,
            ..Self::default()
        }
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_projection(&mut self, projection: Projection) {
        if projection != self.projection {
            self.projection = projection;
            self.stale = true;
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect != self.aspect {
            self.aspect = aspect;
            self.stale = true;
        }
    }

    pub fn set_clip(&mut self, near: f32, far: f32) {
        if near != self.near || far != self.far {
            self.near = near;
            self.far = far;
            self.stale = true;
        }
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match self.projection {
            Projection::Perspective { fov } => perspective(fov, self.aspect, self.near, self.far),
            Projection::Orthographic => orthographic(
                -self.aspect,
                self.aspect,
                -1.0,
                1.0,
                self.near,
                self.far,
            ),
        }
    }

    /// Place the camera. `camera_to_world` is the camera's own world matrix.
    pub fn set_camera(&mut self, camera_to_world: Matrix4<f32>) {
        self.dual.set_view(camera_to_world);
    }

    /// Recompute the projection if a parameter changed since the last bake.
    pub fn bake(&mut self) -> &DualView<B> {
        if self.stale {
            self.stale = false;
            let projection = self.projection_matrix();
            self.dual.set_projection(projection);
        }
        &self.dual
    }

    pub fn dual(&self) -> &DualView<B> {
        &self.dual
    }

    pub fn bind<G>(&mut self, gpu: &G) -> bool
    where
        G: GpuBuffers<Buffer = B>,
    {
        self.bake();
        self.dual.bind(gpu)
    }
}

impl View<wgpu::Buffer> {
    /// Bind the view matrices to `shader`'s view group. Call after
    /// [`bind`](Self::bind); buffers are rewritten in place afterwards so the
    /// group stays valid.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        shader: &ShaderDescriptor,
    ) -> Result<wgpu::BindGroup, RenderError> {
        let index = view_group(shader.source());
        let group = shader.group(index).ok_or_else(|| ShaderError::UnknownGroup {
            shader: shader.name().to_string(),
            index,
        })?;
        let slots = tag_slots(shader.source(), &Tag::VIEW);
        let buffers = [
            (Tag::PerspectiveProjection, self.dual.projection_buffer()),
            (Tag::View, self.dual.view_buffer()),
            (Tag::InverseView, self.dual.inverse_view_buffer()),
        ];
        let mut resources = ResourceMap::new();
        for (tag, buffer) in buffers {
            if let Some(slot) = slots.get(&tag) {
                let buffer = buffer.ok_or_else(|| ResourceError::NotReady {
                    what: "view buffers".to_string(),
                })?;
                resources.insert(slot.name.clone(), GpuResource::Buffer(buffer.clone()));
            }
        }
        Ok(shader.bind_native_group(device, group, &resources)?)
    }
}
