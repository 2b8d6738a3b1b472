//! Perspective shadows cast from a position in the world.

use glam::{Mat4, Vec3};

use super::{pick_up, MIN_DEPTH_RANGE};
use crate::{
    managers::ShadowSlave,
    pipeline::ShadowPipeline,
    types::Bounds3Ext,
    util::math::mat4_from_rows,
};

/// Closest a light may sit to the caster's center; nearer lights are pushed back.
pub const MIN_LIGHT_DIST: f32 = 3.0;
/// Smallest near plane of a point light's frustum.
pub const MIN_NEAR_Z: f32 = 1.0;

/// Frustum of a point light framed around its caster, in light space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LightFrustum {
    near: f32,
    far: f32,
    cot_x: f32,
    cot_y: f32,
}

impl LightFrustum {
    fn from_slave(slave: &ShadowSlave) -> Self {
        let bnd = slave.caster_world_bounds.transformed(&slave.world_to_light);
        let (min, max) = (bnd.min(), bnd.max());

        let near = f32::max(min.z, MIN_NEAR_Z);
        let far = f32::max(bnd.center().z + slave.atten_dist, near + MIN_DEPTH_RANGE);

        // Frame the wider side of the caster around the view axis.
        let extent_x = f32::max(-min.x, max.x).max(f32::EPSILON);
        let extent_y = f32::max(-min.y, max.y).max(f32::EPSILON);

        Self {
            near,
            far,
            cot_x: near / extent_x,
            cot_y: near / extent_y,
        }
    }
}

/// Looks from the light at the caster's center, never from closer than [`MIN_LIGHT_DIST`].
pub(super) fn compute_world_to_light(
    position: Vec3,
    fallback_dir: Vec3,
    caster_bounds: &Bounds3Ext,
) -> (Mat4, Mat4) {
    let at = caster_bounds.center();
    let to_at = at - position;
    let dist = to_at.length();
    let dir = if dist > f32::EPSILON {
        to_at / dist
    } else {
        fallback_dir.try_normalize().unwrap_or(Vec3::NEG_Z)
    };

    let from = if dist < MIN_LIGHT_DIST {
        at - dir * MIN_LIGHT_DIST
    } else {
        position
    };

    let world_to_light = Mat4::look_at_lh(from, at, pick_up(dir));
    (world_to_light, world_to_light.inverse())
}

/// The light's frustum out to the attenuation distance, in world space.
pub(super) fn compute_bounds(slave: &ShadowSlave) -> Bounds3Ext {
    let frustum = LightFrustum::from_slave(slave);
    let half_x = frustum.far / frustum.cot_x;
    let half_y = frustum.far / frustum.cot_y;
    Bounds3Ext::from_min_max(
        Vec3::new(-half_x, -half_y, frustum.near),
        Vec3::new(half_x, half_y, frustum.far),
    )
    .transformed(&slave.light_to_world)
}

/// Radial distance from the eye to the caster's surface.
pub(super) fn resolution_distance(slave: &ShadowSlave, pipeline: &dyn ShadowPipeline) -> f32 {
    let bnd = &slave.caster_world_bounds;
    let dist = bnd.center().distance(pipeline.view_position_world()) - bnd.radius();
    f32::max(dist, 0.0)
}

pub(super) fn compute_projections(slave: &mut ShadowSlave, camera_to_world: Mat4) {
    let LightFrustum {
        near,
        far,
        cot_x,
        cot_y,
    } = LightFrustum::from_slave(slave);
    let (width, height) = (slave.width as f32, slave.height as f32);

    // Remapped into [0.5, width - 0.5] texels. The divide is by the third output, so the
    // third row carries w instead of z.
    slave.light_to_texture = mat4_from_rows([
        [cot_x * 0.5, 0.0, 0.5 * (1.0 + 1.0 / width), 0.0],
        [0.0, -cot_y * 0.5, 0.5 * (1.0 + 1.0 / height), 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ]);
    slave.camera_to_texture = slave.light_to_texture * slave.world_to_light * camera_to_world;

    // Bring the viewport in by a texel to keep a constant border.
    let cot_x = cot_x - cot_x / (width * 0.5);
    let cot_y = cot_y - cot_y / (height * 0.5);
    let depth_scale = far / (far - near);
    slave.light_to_ndc = mat4_from_rows([
        [cot_x, 0.0, 0.0, 0.0],
        [0.0, cot_y, 0.0, 0.0],
        [0.0, 0.0, depth_scale, -near * depth_scale],
        [0.0, 0.0, 1.0, 0.0],
    ]);
}

pub(super) fn compute_isect(slave: &mut ShadowSlave) {
    let world_to_ndc = slave.light_to_ndc * slave.world_to_light;
    slave.isect.set_projection(&world_to_ndc);
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::util::frustum::VolumeCull;

    fn slave_for(light: Vec3, caster: Bounds3Ext, atten_dist: f32) -> ShadowSlave {
        let (world_to_light, light_to_world) = compute_world_to_light(light, Vec3::NEG_Z, &caster);
        ShadowSlave {
            world_to_light,
            light_to_world,
            caster_world_bounds: caster,
            atten_dist,
            width: 128,
            height: 128,
            ..Default::default()
        }
    }

    #[test]
    fn too_close_light_is_pushed_back() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 1.0, 0.0), Vec3::splat(0.5));
        let (world_to_light, light_to_world) = compute_world_to_light(Vec3::ZERO, Vec3::NEG_Z, &caster);

        let eye = light_to_world.transform_point3(Vec3::ZERO);
        assert_abs_diff_eq!(eye.distance(caster.center()), MIN_LIGHT_DIST, epsilon = 1e-4);
        assert_abs_diff_eq!(eye.y, -2.0, epsilon = 1e-4);

        let center = world_to_light.transform_point3(caster.center());
        assert_abs_diff_eq!(center.z, MIN_LIGHT_DIST, epsilon = 1e-4);
    }

    #[test]
    fn light_directly_above_uses_fallback_up() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        let (world_to_light, _) = compute_world_to_light(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z, &caster);
        assert!(world_to_light.is_finite());
    }

    #[test]
    fn ndc_depth_spans_near_to_far() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let mut slave = slave_for(Vec3::ZERO, caster, 5.0);
        compute_projections(&mut slave, Mat4::IDENTITY);

        let frustum = LightFrustum::from_slave(&slave);
        assert_abs_diff_eq!(frustum.near, 9.0, epsilon = 1e-4);
        assert_abs_diff_eq!(frustum.far, 15.0, epsilon = 1e-4);

        let project = |z: f32| {
            let clip = slave.light_to_ndc * Vec4::new(0.0, 0.0, z, 1.0);
            clip.z / clip.w
        };
        assert_abs_diff_eq!(project(frustum.near), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(project(frustum.far), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn texture_projection_centers_view_axis() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let mut slave = slave_for(Vec3::ZERO, caster, 0.0);
        compute_projections(&mut slave, Mat4::IDENTITY);

        let tex = slave.light_to_texture * Vec4::new(0.0, 0.0, 10.0, 1.0);
        assert_abs_diff_eq!(tex.x / tex.z, 0.5 * (1.0 + 1.0 / 128.0), epsilon = 1e-5);
        assert_abs_diff_eq!(tex.y / tex.z, 0.5 * (1.0 + 1.0 / 128.0), epsilon = 1e-5);
    }

    #[test]
    fn isect_contains_caster_and_rejects_behind_light() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let mut slave = slave_for(Vec3::ZERO, caster, 20.0);
        compute_projections(&mut slave, Mat4::IDENTITY);
        compute_isect(&mut slave);

        let inside = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 12.0), Vec3::splat(0.1));
        let behind = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE);
        assert_ne!(slave.isect.test(&inside), VolumeCull::Culled);
        assert_eq!(slave.isect.test(&behind), VolumeCull::Culled);
    }

    #[test]
    fn bounds_cover_the_frustum() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let slave = slave_for(Vec3::ZERO, caster, 10.0);
        let bounds = compute_bounds(&slave);
        assert_abs_diff_eq!(bounds.max().z, 20.0, epsilon = 1e-3);
        assert_abs_diff_eq!(bounds.min().z, 9.0, epsilon = 1e-3);
        // Far plane is wider than the caster.
        assert!(bounds.max().x > 1.0);
    }
}
