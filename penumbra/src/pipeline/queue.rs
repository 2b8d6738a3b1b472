use glam::{Mat4, Vec3};

use super::{allocate_shadow_atlas, ShadowAtlas, ShadowPipeline};
use crate::{
    managers::{CasterManager, LightManager, ShadowLight, ShadowSlave, ViewCamera},
    scene::{Drawable, Material, Scene, Span},
    types::{
        Bounds3Ext, RawLightHandle, RawShadowCasterHandle, SlaveFlags, SpanProps, SLAVE_INDEX_UNSET,
    },
    util::frustum::{VolumeCull, VolumeIsect},
};

/// A slave accepted for this frame, with everything needed to render and apply it.
#[derive(Debug, Clone)]
pub struct QueuedShadow {
    pub index: u32,
    pub priority: f32,
    pub light: Option<RawLightHandle>,
    pub caster: Option<RawShadowCasterHandle>,
    pub width: u32,
    pub height: u32,
    pub power: f32,
    pub flags: SlaveFlags,
    pub world_to_light: Mat4,
    pub light_to_ndc: Mat4,
    pub camera_to_texture: Mat4,
    pub cast_lut: Mat4,
    pub rcv_lut: Mat4,
    pub world_bounds: Bounds3Ext,
    pub isect: VolumeIsect,
}

impl QueuedShadow {
    fn from_slave(slave: &ShadowSlave) -> Self {
        Self {
            index: slave.index,
            priority: slave.priority,
            light: slave.light,
            caster: slave.caster,
            width: slave.width,
            height: slave.height,
            power: slave.power,
            flags: slave.flags,
            world_to_light: slave.world_to_light,
            light_to_ndc: slave.light_to_ndc,
            camera_to_texture: slave.camera_to_texture,
            cast_lut: slave.cast_lut,
            rcv_lut: slave.rcv_lut,
            world_bounds: slave.world_bounds,
            isect: slave.isect.clone(),
        }
    }
}

/// Frame queue of accepted shadows, ordered by priority.
///
/// Indices are handed out in submission order, so a shadow's index is stable for the
/// frame even though the queue itself stays sorted by priority.
#[derive(Debug, Clone)]
pub struct ShadowQueue {
    camera: ViewCamera,
    shadows: Vec<QueuedShadow>,
    max_shadows: Option<usize>,
    max_layers_at_once: u32,
}

impl ShadowQueue {
    pub fn new(camera: ViewCamera) -> Self {
        Self {
            camera,
            shadows: Vec::new(),
            max_shadows: None,
            max_layers_at_once: 8,
        }
    }

    /// Refuses every submission past `max_shadows` for the rest of the frame.
    pub fn with_max_shadows(mut self, max_shadows: usize) -> Self {
        self.max_shadows = Some(max_shadows);
        self
    }

    /// Texture layers the device can blend in one pass.
    pub fn with_max_layers_at_once(mut self, max_layers_at_once: u32) -> Self {
        self.max_layers_at_once = max_layers_at_once;
        self
    }

    pub fn camera(&self) -> &ViewCamera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: ViewCamera) {
        self.camera = camera;
    }

    /// Forgets every queued shadow. Call before the next frame's casters run.
    pub fn clear(&mut self) {
        self.shadows.clear();
    }

    /// Queued shadows, lowest priority first.
    pub fn shadows(&self) -> &[QueuedShadow] {
        &self.shadows
    }

    pub fn shadow(&self, index: u32) -> Option<&QueuedShadow> {
        self.shadows.iter().find(|s| s.index == index)
    }

    /// Whether `span` may have shadows projected onto it at all.
    pub fn receives_shadows(&self, span: &Span, material: &Material) -> bool {
        if span.props.contains(SpanProps::NO_SHADOW) {
            return false;
        }
        if span.props.contains(SpanProps::FORCE_SHADOW) {
            return true;
        }
        if span.props.intersects(SpanProps::SKIP_PROJECTION | SpanProps::PROJ_AS_VTX) {
            return false;
        }
        // Not enough layers to multiply a shadow under a blended texture.
        !(self.max_layers_at_once < 3 && material.base_textured && material.base_alpha_blended)
    }

    /// Whether `shadow` may land on `span`, given which shadows the span itself cast.
    pub fn accepts_shadow(&self, span: &Span, shadow: &QueuedShadow) -> bool {
        shadow.flags.contains(SlaveFlags::SELF_SHADOW) || !span.shadow_bits.is_bit_set(shadow.index)
    }

    /// Attaches every queued shadow that reaches `span`, skipping shadows restricted to their
    /// light's group. Returns how many were attached.
    pub fn attach_to_span(&self, span: &mut Span, material: &Material, is_char: bool) -> usize {
        if !self.receives_shadows(span, material) {
            return 0;
        }
        let mut attached = 0;
        for shadow in &self.shadows {
            if shadow.flags.contains(SlaveFlags::OBEYS_LIGHT_GROUPS)
                && !(shadow.flags.contains(SlaveFlags::INCLUDES_CHARS) && is_char)
            {
                continue;
            }
            if shadow.isect.test(&span.world_bounds) == VolumeCull::Culled {
                continue;
            }
            if self.accepts_shadow(span, shadow) {
                span.shadow_slaves.set_bit(shadow.index);
                attached += 1;
            }
        }
        attached
    }

    /// Attaches the shadows `light` cast this frame to a span lit through its light group.
    pub fn attach_from_group(&self, span: &mut Span, material: &Material, light: &dyn ShadowLight) -> usize {
        if !self.receives_shadows(span, material) {
            return 0;
        }
        let mut attached = 0;
        for index in light.slave_bits().iter_set() {
            let shadow = match self.shadow(index) {
                Some(shadow) => shadow,
                None => continue,
            };
            if shadow.isect.test(&span.world_bounds) == VolumeCull::Culled {
                continue;
            }
            if self.accepts_shadow(span, shadow) {
                span.shadow_slaves.set_bit(index);
                attached += 1;
            }
        }
        attached
    }

    /// Attaches shadows to every loaded span in `scene`, clearing last frame's receiver bits.
    /// Drawables in a light group also pick up that light's shadows from `lights`.
    pub fn attach_receivers(&self, scene: &mut Scene, lights: &LightManager) -> usize {
        profiling::scope!("ShadowQueue::attach_receivers");

        let mut attached = 0;
        for (_, drawable) in scene.drawables_mut() {
            let Drawable {
                spans,
                materials,
                character,
                group_lights,
                ..
            } = drawable;
            for span in spans.iter_mut() {
                span.shadow_slaves.clear();
                let material = match materials.get(span.material) {
                    Some(material) => material,
                    None => continue,
                };
                attached += self.attach_to_span(span, material, *character);
                for light in group_lights.iter().filter_map(|&handle| lights.get(handle)) {
                    attached += self.attach_from_group(span, material, light);
                }
            }
        }
        attached
    }

    /// Records on each caster span which shadows it is rendered into.
    pub fn mark_caster_spans(&self, scene: &mut Scene, casters: &CasterManager) {
        for shadow in &self.shadows {
            let caster = match shadow.caster.and_then(|handle| casters.get(handle)) {
                Some(caster) => caster,
                None => continue,
            };
            for ds in caster.spans() {
                if let Some(span) = scene.span_mut(ds.drawable, ds.index) {
                    span.shadow_bits.set_bit(shadow.index);
                }
            }
        }
    }

    /// Packs this frame's shadow maps into a single atlas.
    pub fn atlas(&self, max_dimension: u32) -> Option<ShadowAtlas> {
        let maps = self
            .shadows
            .iter()
            .map(|s| (s.index, s.width.max(s.height)))
            .collect();
        allocate_shadow_atlas(maps, max_dimension)
    }
}

impl ShadowPipeline for ShadowQueue {
    fn submit_shadow_slave(&mut self, slave: &mut ShadowSlave) {
        if self.max_shadows.map_or(false, |max| self.shadows.len() >= max) {
            log::trace!("Shadow queue full, refusing slave with priority {}", slave.priority);
            slave.index = SLAVE_INDEX_UNSET;
            return;
        }

        slave.index = self.shadows.len() as u32;
        let position = self.shadows.partition_point(|s| s.priority <= slave.priority);
        self.shadows.insert(position, QueuedShadow::from_slave(slave));
    }

    fn test_visible_world(&self, bounds: &Bounds3Ext) -> bool {
        self.camera.frustum().intersects(bounds)
    }

    fn view_position_world(&self) -> Vec3 {
        self.camera.location()
    }

    fn view_dir_world(&self) -> Vec3 {
        self.camera.direction()
    }

    fn camera_to_world(&self) -> Mat4 {
        self.camera.camera_to_world()
    }
}
