use glam::{Mat4, Vec3};

use crate::{
    types::{Camera, CameraProjection, Handedness},
    util::frustum::Frustum,
};

/// The viewer's camera, with the derived matrices shadow scheduling asks about.
#[derive(Debug, Clone)]
pub struct ViewCamera {
    handedness: Handedness,
    proj: Mat4,
    inv_view: Mat4,
    frustum: Frustum,
    data: Camera,
    aspect_ratio: f32,
}

impl ViewCamera {
    /// Builds a new camera, using the given aspect ratio. If no aspect ratio is
    /// given it is assumed that no aspect ratio scaling should be done.
    pub fn new(data: Camera, handedness: Handedness, aspect_ratio: Option<f32>) -> Self {
        profiling::scope!("ViewCamera::new");

        let aspect_ratio = aspect_ratio.unwrap_or(1.0);
        let proj = compute_projection_matrix(data, handedness, aspect_ratio);

        Self {
            handedness,
            proj,
            inv_view: data.view.inverse(),
            frustum: Frustum::from_matrix(proj * data.view),
            data,
            aspect_ratio,
        }
    }

    pub fn set_data(&mut self, data: Camera) {
        self.set_aspect_data(data, self.aspect_ratio)
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: Option<f32>) {
        self.set_aspect_data(self.data, aspect_ratio.unwrap_or(1.0));
    }

    pub fn set_aspect_data(&mut self, data: Camera, aspect_ratio: f32) {
        *self = Self::new(data, self.handedness, Some(aspect_ratio));
    }

    pub fn get_data(&self) -> Camera {
        self.data
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn view(&self) -> Mat4 {
        self.data.view
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.data.view
    }

    pub fn proj(&self) -> Mat4 {
        self.proj
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn camera_to_world(&self) -> Mat4 {
        self.inv_view
    }

    pub fn location(&self) -> Vec3 {
        self.inv_view.w_axis.truncate()
    }

    /// Unit vector the camera looks along, in world space.
    pub fn direction(&self) -> Vec3 {
        let z = self.inv_view.z_axis.truncate().normalize_or_zero();
        match self.handedness {
            Handedness::Left => z,
            Handedness::Right => -z,
        }
    }
}

fn compute_projection_matrix(data: Camera, handedness: Handedness, aspect_ratio: f32) -> Mat4 {
    let left = handedness == Handedness::Left;
    match data.projection {
        CameraProjection::Orthographic { size } => {
            let ortho: fn(f32, f32, f32, f32, f32, f32) -> Mat4 = if left {
                Mat4::orthographic_lh
            } else {
                Mat4::orthographic_rh
            };
            let half = size * 0.5;
            ortho(-half.x, half.x, -half.y, half.y, half.z, -half.z)
        }
        CameraProjection::Perspective { vfov, near } => {
            let perspective: fn(f32, f32, f32) -> Mat4 = if left {
                Mat4::perspective_infinite_reverse_lh
            } else {
                Mat4::perspective_infinite_reverse_rh
            };
            perspective(vfov.to_radians(), aspect_ratio, near)
        }
        CameraProjection::Raw(proj) => proj,
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3, Vec3A};

    use super::ViewCamera;
    use crate::types::{Bounds3Ext, Camera, CameraProjection, Handedness};

    #[test]
    fn location_and_direction() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        for (handedness, look_at) in [
            (Handedness::Left, Mat4::look_at_lh as fn(Vec3, Vec3, Vec3) -> Mat4),
            (Handedness::Right, Mat4::look_at_rh),
        ] {
            let camera = ViewCamera::new(
                Camera {
                    view: look_at(eye, eye + Vec3::X, Vec3::Y),
                    ..Default::default()
                },
                handedness,
                None,
            );
            assert!((camera.location() - eye).length() < 1e-5);
            assert!((camera.direction() - Vec3::X).length() < 1e-5);
        }
    }

    #[test]
    fn frustum_follows_data() {
        let mut camera = ViewCamera::new(
            Camera {
                view: Mat4::look_at_lh(Vec3::ZERO, Vec3::Z, Vec3::Y),
                ..Default::default()
            },
            Handedness::Left,
            None,
        );
        let ahead = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 20.0), Vec3::ONE);
        assert!(camera.frustum().intersects(&ahead));

        camera.set_data(Camera {
            view: Mat4::look_at_lh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
            ..Default::default()
        });
        assert!(!camera.frustum().intersects(&ahead));
    }

    #[test]
    fn orthographic_frustum_is_a_box() {
        let camera = ViewCamera::new(
            Camera {
                projection: CameraProjection::Orthographic {
                    size: Vec3A::splat(20.0),
                },
                view: Mat4::look_at_lh(Vec3::ZERO, Vec3::Z, Vec3::Y),
            },
            Handedness::Left,
            None,
        );
        let cube = |x| Bounds3Ext::from_center_half_extent(Vec3::new(x, 0.0, 5.0), Vec3::splat(0.5));
        assert!(camera.frustum().intersects(&cube(0.0)));
        assert!(camera.frustum().intersects(&cube(9.0)));
        assert!(!camera.frustum().intersects(&cube(15.0)));
    }
}
