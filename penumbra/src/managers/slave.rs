use glam::Mat4;

use crate::{
    types::{Bounds3Ext, RawLightHandle, RawShadowCasterHandle, SlaveFlags, SLAVE_INDEX_UNSET},
    util::frustum::VolumeIsect,
};

/// One shadow cast request, one per (light, caster) pair per frame.
///
/// Slaves live in their master's [`SlavePool`](super::SlavePool) and are reused frame to frame.
/// [`ShadowSlave::init`] only resets the flags; every other field is written by the master's
/// pipeline before the slave is handed to the renderer.
#[derive(Debug, Clone)]
pub struct ShadowSlave {
    /// Assigned by the pipeline on submission, [`SLAVE_INDEX_UNSET`] until then.
    pub index: u32,
    pub caster: Option<RawShadowCasterHandle>,
    pub light: Option<RawLightHandle>,

    pub world_to_light: Mat4,
    pub light_to_world: Mat4,
    pub light_to_ndc: Mat4,
    pub light_to_texture: Mat4,
    pub camera_to_texture: Mat4,
    pub cast_lut: Mat4,
    pub rcv_lut: Mat4,

    pub caster_world_bounds: Bounds3Ext,
    /// Caster bounds stretched by the attenuation distance, in world space.
    pub world_bounds: Bounds3Ext,
    /// Receivers outside this volume are not shadowed.
    pub isect: VolumeIsect,

    pub width: u32,
    pub height: u32,
    pub power: f32,
    pub blur_scale: f32,
    pub atten_dist: f32,
    /// Distance from the eye; lower renders first.
    pub priority: f32,

    pub flags: SlaveFlags,
}

impl Default for ShadowSlave {
    fn default() -> Self {
        Self {
            index: SLAVE_INDEX_UNSET,
            caster: None,
            light: None,
            world_to_light: Mat4::IDENTITY,
            light_to_world: Mat4::IDENTITY,
            light_to_ndc: Mat4::IDENTITY,
            light_to_texture: Mat4::IDENTITY,
            camera_to_texture: Mat4::IDENTITY,
            cast_lut: Mat4::ZERO,
            rcv_lut: Mat4::ZERO,
            caster_world_bounds: Bounds3Ext::empty(),
            world_bounds: Bounds3Ext::empty(),
            isect: VolumeIsect::new(),
            width: 0,
            height: 0,
            power: 0.0,
            blur_scale: 0.0,
            atten_dist: 0.0,
            priority: 0.0,
            flags: SlaveFlags::empty(),
        }
    }
}

impl ShadowSlave {
    pub fn init(&mut self) {
        self.flags = SlaveFlags::empty();
    }

    pub fn set_flag(&mut self, flag: SlaveFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn has_flag(&self, flag: SlaveFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn self_shadow(&self) -> bool {
        self.has_flag(SlaveFlags::SELF_SHADOW)
    }

    pub fn cast_in_camera_space(&self) -> bool {
        self.has_flag(SlaveFlags::CAST_IN_CAMERA_SPACE)
    }

    pub fn obeys_light_groups(&self) -> bool {
        self.has_flag(SlaveFlags::OBEYS_LIGHT_GROUPS)
    }

    pub fn includes_chars(&self) -> bool {
        self.has_flag(SlaveFlags::INCLUDES_CHARS)
    }

    pub fn is_submitted(&self) -> bool {
        self.index != SLAVE_INDEX_UNSET
    }
}
