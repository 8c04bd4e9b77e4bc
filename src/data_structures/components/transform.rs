use cgmath::{Matrix4, One, Quaternion, Vector3};

use crate::{context::GpuBuffers, data_structures::dual::DualFrame};

/// Shift, twist and scale of an entity, baked into a [`DualFrame`] on demand.
#[derive(Debug, Clone)]
pub struct Transform<B = wgpu::Buffer> {
    shift: Vector3<f32>,
    twist: Quaternion<f32>,
    scale: Vector3<f32>,
    stale: bool,
    frame: DualFrame<B>,
}

impl<B> Default for Transform<B> {
    fn default() -> Self {
        Self {
            shift: Vector3::new(0.0, 0.0, 0.0),
            twist: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            stale: false,
            frame: DualFrame::default(),
        }
    }
}

impl<B> Transform<B> {
    pub fn new(shift: Vector3<f32>, twist: Quaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            shift,
            twist,
            scale,
            stale: true,
            frame: DualFrame::default(),
        }
    }

    /// A transform whose frame holds `matrix` as is, e.g. a world matrix from
    /// scene traversal. Shift/twist/scale stay identity until set.
    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        Self {
            frame: DualFrame::new(matrix),
            ..Self::default()
        }
    }

    pub fn shift(&self) -> Vector3<f32> {
        self.shift
    }

    pub fn twist(&self) -> Quaternion<f32> {
        self.twist
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_shift(&mut self, shift: Vector3<f32>) {
        self.shift = shift;
        self.stale = true;
    }

    pub fn set_twist(&mut self, twist: Quaternion<f32>) {
        self.twist = twist;
        self.stale = true;
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.stale = true;
    }

    /// Replace the frame's matrix directly, bypassing shift/twist/scale.
    pub fn set_matrix(&mut self, matrix: Matrix4<f32>) {
        self.stale = false;
        self.frame.set(matrix);
    }

    /// `Shift × Twist × Scale`.
    pub fn local_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.shift)
            * Matrix4::from(self.twist)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Push pending shift/twist/scale changes into the frame.
    pub fn bake(&mut self) -> &DualFrame<B> {
        if self.stale {
            self.stale = false;
            let matrix = self.local_matrix();
            self.frame.set(matrix);
        }
        &self.frame
    }

    pub fn frame(&self) -> &DualFrame<B> {
        &self.frame
    }

    /// Bake, then upload the frame if it changed.
    pub fn bind<G>(&mut self, gpu: &G) -> bool
    where
        G: GpuBuffers<Buffer = B>,
    {
        self.bake();
        self.frame.bind(gpu)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3, SquareMatrix};

    use super::*;
    use crate::{context::testing::RecordingGpu, data_structures::dual::differs};

    #[test]
    fn default_is_identity() {
        let mut t: Transform<usize> = Transform::default();
        assert_eq!(*t.bake().world(), Matrix4::identity());
    }

    #[test]
    fn bake_is_lazy() {
        let gpu = RecordingGpu::default();
        let mut t = Transform::default();
        t.bind(&gpu);
        assert_eq!(gpu.creates(), 3);

        t.set_shift(Vector3::new(0.0, 0.0, -5.0));
        assert_eq!(*t.frame().world(), Matrix4::identity());
        assert!(t.bind(&gpu));
        assert_eq!(gpu.write_count(), 3);
        assert!(!differs(
            t.frame().world(),
            &Matrix4::from_translation(Vector3::new(0.0, 0.0, -5.0))
        ));

        assert!(!t.bind(&gpu));
        assert_eq!(gpu.write_count(), 3);
    }

    #[test]
    fn composes_shift_twist_scale() {
        let twist = Quaternion::from_angle_y(Deg(90.0));
        let mut t: Transform<usize> = Transform::new(
            Vector3::new(1.0, 0.0, 0.0),
            twist,
            Vector3::new(2.0, 2.0, 2.0),
        );
        let expected = Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0))
            * Matrix4::from(twist)
            * Matrix4::from_scale(2.0);
        assert!(!differs(t.bake().world(), &expected));
    }

    #[test]
    fn matrix_overrides_pending_trs() {
        let mut t: Transform<usize> = Transform::default();
        t.set_scale(Vector3::new(3.0, 3.0, 3.0));
        let m = Matrix4::from_translation(Vector3::new(4.0, 0.0, 0.0));
        t.set_matrix(m);
        assert_eq!(*t.bake().world(), m);
    }
}
