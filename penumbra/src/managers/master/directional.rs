//! Orthographic shadows from lights infinitely far away.

use glam::{Mat4, Vec3};

use super::{light_space_box, pick_up, MIN_DEPTH_RANGE};
use crate::{
    managers::ShadowSlave,
    pipeline::ShadowPipeline,
    types::Bounds3Ext,
    util::math::mat4_from_rows,
};

/// Light space looks down `direction` with x and y centered on the caster and z = 0 at the
/// caster's nearest point.
pub(super) fn compute_world_to_light(direction: Vec3, caster_bounds: &Bounds3Ext) -> (Mat4, Mat4) {
    let dir = direction.try_normalize().unwrap_or(Vec3::NEG_Z);

    // Left handed keeps +z pointing away from the light.
    let origin_view = Mat4::look_at_lh(Vec3::ZERO, dir, pick_up(dir));
    let light_bounds = caster_bounds.transformed(&origin_view);
    let center = light_bounds.center();
    let nearest = light_bounds.min().z;

    let world_to_light = Mat4::from_translation(Vec3::new(-center.x, -center.y, -nearest)) * origin_view;
    (world_to_light, world_to_light.inverse())
}

pub(super) fn compute_bounds(slave: &ShadowSlave) -> Bounds3Ext {
    let (min, max) = light_space_box(slave);
    Bounds3Ext::from_min_max(min, max).transformed(&slave.light_to_world)
}

/// Distance from the eye to the nearest point of the shadow along the view direction.
pub(super) fn resolution_distance(slave: &ShadowSlave, pipeline: &dyn ShadowPipeline) -> f32 {
    let view_dir = pipeline.view_dir_world();
    let depth = slave.world_bounds.test_plane(view_dir);
    let eye_dist = view_dir.dot(pipeline.view_position_world());
    f32::max(depth.x - eye_dist, 0.0)
}

pub(super) fn compute_projections(slave: &mut ShadowSlave, camera_to_world: Mat4) {
    let (min, max) = light_space_box(slave);
    let half_x = f32::max(max.x.abs().max(min.x.abs()), f32::EPSILON);
    let half_y = f32::max(max.y.abs().max(min.y.abs()), f32::EPSILON);
    let far = f32::max(max.z, MIN_DEPTH_RANGE);

    let (width, height) = (slave.width as f32, slave.height as f32);

    slave.light_to_texture = mat4_from_rows([
        [0.5 / half_x, 0.0, 0.0, 0.5 * (1.0 + 1.0 / width)],
        [0.0, -0.5 / half_y, 0.0, 0.5 * (1.0 + 1.0 / height)],
        [0.0, 0.0, 1.0 / far, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
    slave.camera_to_texture = slave.light_to_texture * slave.world_to_light * camera_to_world;

    // Pull the viewport in by a texel so the border stays clear and clamping the projected
    // texture does not smear the edges.
    let scale_x = (1.0 / half_x) * (1.0 - 2.0 / width);
    let scale_y = (1.0 / half_y) * (1.0 - 2.0 / height);
    slave.light_to_ndc = mat4_from_rows([
        [scale_x, 0.0, 0.0, 0.0],
        [0.0, scale_y, 0.0, 0.0],
        [0.0, 0.0, 1.0 / far, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
}

pub(super) fn compute_isect(slave: &mut ShadowSlave) {
    let (min, max) = light_space_box(slave);
    let world_to_light = slave.world_to_light;
    slave.isect.set_parallel(&world_to_light, min, max);
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use glam::Vec3;

    use super::*;

    #[test]
    fn caster_lands_centered_at_zero_depth() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(4.0, 10.0, -2.0), Vec3::splat(1.0));
        let (world_to_light, light_to_world) = compute_world_to_light(Vec3::new(0.0, -1.0, 0.0), &caster);

        let light = caster.transformed(&world_to_light);
        assert_abs_diff_eq!(light.min().z, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(light.center().x, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(light.center().y, 0.0, epsilon = 1e-4);

        // Depth increases along the light direction.
        let below = world_to_light.transform_point3(Vec3::new(4.0, 0.0, -2.0));
        assert!(below.z > light.max().z);

        let back = light_to_world.transform_point3(world_to_light.transform_point3(Vec3::ONE));
        assert_abs_diff_eq!(back.x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn straight_down_light_uses_fallback_up() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        let (world_to_light, _) = compute_world_to_light(Vec3::NEG_Z, &caster);
        assert!(world_to_light.is_finite());
        let light = caster.transformed(&world_to_light);
        assert_abs_diff_eq!(light.max().z - light.min().z, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn bounds_extend_past_caster_by_atten_dist() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::new(0.0, 0.0, 5.0), Vec3::ONE);
        let (world_to_light, light_to_world) = compute_world_to_light(Vec3::NEG_Z, &caster);
        let slave = ShadowSlave {
            world_to_light,
            light_to_world,
            caster_world_bounds: caster,
            atten_dist: 10.0,
            ..Default::default()
        };
        let bounds = compute_bounds(&slave);
        assert_abs_diff_eq!(bounds.max().z, 6.0, epsilon = 1e-3);
        assert_abs_diff_eq!(bounds.min().z, -6.0, epsilon = 1e-3);
    }

    #[test]
    fn texture_projection_maps_caster_into_unit_square() {
        let caster = Bounds3Ext::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        let (world_to_light, light_to_world) = compute_world_to_light(Vec3::NEG_Z, &caster);
        let mut slave = ShadowSlave {
            world_to_light,
            light_to_world,
            caster_world_bounds: caster,
            width: 256,
            height: 256,
            ..Default::default()
        };
        compute_projections(&mut slave, Mat4::IDENTITY);

        let uv = slave.light_to_texture.transform_point3(Vec3::ZERO);
        assert_abs_diff_eq!(uv.x, 0.5 * (1.0 + 1.0 / 256.0), epsilon = 1e-5);
        assert_abs_diff_eq!(uv.y, 0.5 * (1.0 + 1.0 / 256.0), epsilon = 1e-5);

        let ndc = slave.light_to_ndc.transform_point3(Vec3::new(1.0, 1.0, 2.0));
        assert!(ndc.x < 1.0 && ndc.y < 1.0);
        assert_abs_diff_eq!(ndc.z, 1.0, epsilon = 1e-5);
    }
}
