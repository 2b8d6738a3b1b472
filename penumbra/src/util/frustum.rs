//! Frustums and intersection volumes.
//!
//! Clip planes are sums and differences of the rows of a world to clip matrix, as in
//! <https://www.gamedevs.org/uploads/fast-extraction-viewing-frustum-planes-from-world-view-projection-matrix.pdf>.

use arrayvec::ArrayVec;
use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::types::Bounds3Ext;

/// Represents a plane as a vec3 + f32. Points with positive distance are inside.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub abc: Vec3,
    pub d: f32,
}

impl Plane {
    fn from_vec4(v: Vec4) -> Self {
        Self { abc: v.xyz(), d: v.w }
    }

    pub fn normalize(mut self) -> Self {
        let mag = self.abc.length();
        if mag > 0.0 {
            self.abc /= mag;
            self.d /= mag;
        }

        self
    }

    pub fn distance(self, point: Vec3) -> f32 {
        self.abc.dot(point) + self.d
    }

    /// Classifies `bounds` against this plane alone.
    fn classify(self, bounds: &Bounds3Ext) -> VolumeCull {
        let depth = bounds.test_plane(self.abc);
        if depth.y + self.d < 0.0 {
            VolumeCull::Culled
        } else if depth.x + self.d < 0.0 {
            VolumeCull::Clipped
        } else {
            VolumeCull::Unculled
        }
    }
}

/// Result of testing bounds against a volume.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VolumeCull {
    /// Entirely outside.
    Culled,
    /// Straddles the boundary.
    Clipped,
    /// Entirely inside.
    Unculled,
}

/// The view frustum of a camera using an infinite, reverse z projection.
///
/// Reverse z puts the near plane at ndc z = 1 and the infinite far plane at 0, so only the
/// four sides and the near plane bound it.
#[derive(Debug, Copy, Clone)]
pub struct Frustum {
    planes: [Plane; 5],
}

impl Frustum {
    pub fn from_matrix(view_proj: Mat4) -> Self {
        let [x, y, z, w] = clip_rows(&view_proj);
        Self {
            planes: [w + x, w - x, w + y, w - y, w - z].map(|p| Plane::from_vec4(p).normalize()),
        }
    }

    /// Determines if the bounds are at all inside the frustum.
    pub fn intersects(&self, bounds: &Bounds3Ext) -> bool {
        !bounds.is_empty()
            && self
                .planes
                .iter()
                .all(|plane| plane.classify(bounds) != VolumeCull::Culled)
    }
}

fn clip_rows(matrix: &Mat4) -> [Vec4; 4] {
    [0, 1, 2, 3].map(|i| matrix.row(i))
}

/// Convex volume a shadow is applied within, used to cull shadow receivers.
///
/// Storage is inline, so resetting a volume that lives in a pooled slave never allocates.
#[derive(Debug, Clone, Default)]
pub struct VolumeIsect {
    planes: ArrayVec<Plane, 6>,
}

impl VolumeIsect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Resets to the box `[light_min, light_max]` in the space `world_to_light` maps into.
    pub fn set_parallel(&mut self, world_to_light: &Mat4, light_min: Vec3, light_max: Vec3) {
        self.planes.clear();
        for axis in 0..3 {
            let row = world_to_light.row(axis);
            let (min, max) = (light_min[axis], light_max[axis]);
            self.planes.push(Plane::from_vec4(row - Vec4::W * min).normalize());
            self.planes.push(Plane::from_vec4(Vec4::W * max - row).normalize());
        }
    }

    /// Resets to the clip volume of `world_to_ndc`, with ndc z in `[0, 1]`.
    pub fn set_projection(&mut self, world_to_ndc: &Mat4) {
        self.planes.clear();
        let [x, y, z, w] = clip_rows(world_to_ndc);
        for plane in [w + x, w - x, w + y, w - y, z, w - z] {
            self.planes.push(Plane::from_vec4(plane).normalize());
        }
    }

    pub fn test(&self, bounds: &Bounds3Ext) -> VolumeCull {
        if bounds.is_empty() {
            return VolumeCull::Culled;
        }
        let mut result = VolumeCull::Unculled;
        for plane in &self.planes {
            match plane.classify(bounds) {
                VolumeCull::Culled => return VolumeCull::Culled,
                VolumeCull::Clipped => result = VolumeCull::Clipped,
                VolumeCull::Unculled => {}
            }
        }
        result
    }
}
