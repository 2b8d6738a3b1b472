//! Per-light shadow masters.
//!
//! A master reacts to every cast request broadcast by a shadow caster. Each request walks
//! through a fixed pipeline: gate, bounds and power, borrow a slave, compute the slave's
//! geometry, a last chance to bail, and finally submission to the renderer. Every rejection
//! after the borrow recycles the slave, so a master's pool only ever holds accepted slaves.

use std::io::{Read, Write};

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::{
    config::{ShadowQualityConfig, MIN_SHADOW_SIZE},
    managers::{LightManager, ShadowCaster, ShadowLight, ShadowSlave, SlavePool},
    pipeline::{CastBroadcast, CastRequest, ShadowPipeline},
    types::{
        Bounds3Ext, LightProperties, MasterProperties, QualityMask, RawLightHandle, RawResourceHandle,
        RawShadowMasterHandle, RecordError, ShadowMasterSettings, ShadowMasterSettingsChange, SlaveFlags,
        SLAVE_INDEX_UNSET,
    },
    util::math::mat4_from_rows,
};

mod directional;
mod point;

pub use point::{MIN_LIGHT_DIST, MIN_NEAR_Z};

/// Shadows fade in from this power.
pub const VIS_SHADOW_POWER: f32 = 0.1;
/// Casts weaker than this are dropped.
pub const MIN_SHADOW_POWER: f32 = 0.2;
/// Powers between the minimum and the knee are remapped onto `[VIS_SHADOW_POWER, KNEE_SHADOW_POWER]`.
pub const KNEE_SHADOW_POWER: f32 = 0.3;

/// Eye distance per halving of shadow resolution.
pub const RES_SHIFT_DIST: f32 = 50.0;
/// Added to the caster lookup offset against self shadowing acne.
pub const LUT_BIAS: f32 = 2.0 / 256.0;

const MIN_UP_MAG: f32 = 0.01;
const MIN_DEPTH_RANGE: f32 = 1.0e-3;

// Fraction of the max distance kept at the lowest quality.
const MIN_DIST_FRAC: f32 = 0.6;
// Fraction of the max distance where fading starts, at the lowest and highest quality.
const LOW_QUALITY_FADE_FRAC: f32 = 0.9;
const HIGH_QUALITY_FADE_FRAC: f32 = 0.75;

/// Why a master refused a cast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CastRejection {
    #[error("light is not loaded")]
    NoLight,
    #[error("light is outside the current visibility regions")]
    NotInVisSet,
    #[error("master is not loaded at this quality")]
    QualityMismatch,
    #[error("caster has no spans")]
    NoSpans,
    #[error("shadow power is below the minimum")]
    PowerTooLow,
    #[error("shadow is not visible")]
    NotVisible,
    #[error("shadow is faded out by distance")]
    FadedOut,
    #[error("pipeline refused the shadow")]
    PipelineRefused,
}

/// How a master's light projects shadows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    /// Orthographic, along the light's direction.
    Directional,
    /// Perspective, from the light's position.
    Point,
}

impl ProjectionKind {
    fn slave_flags(self) -> SlaveFlags {
        match self {
            ProjectionKind::Directional => SlaveFlags::empty(),
            ProjectionKind::Point => SlaveFlags::POSITIONAL | SlaveFlags::CAST_IN_CAMERA_SPACE,
        }
    }

    fn compute_world_to_light(self, light: &dyn ShadowLight, caster_bounds: &Bounds3Ext) -> (Mat4, Mat4) {
        match self {
            ProjectionKind::Directional => directional::compute_world_to_light(light.world_direction(), caster_bounds),
            ProjectionKind::Point => {
                point::compute_world_to_light(light.world_position(), light.world_direction(), caster_bounds)
            }
        }
    }

    fn compute_bounds(self, slave: &ShadowSlave) -> Bounds3Ext {
        match self {
            ProjectionKind::Directional => directional::compute_bounds(slave),
            ProjectionKind::Point => point::compute_bounds(slave),
        }
    }

    fn resolution_distance(self, slave: &ShadowSlave, pipeline: &dyn ShadowPipeline) -> f32 {
        match self {
            ProjectionKind::Directional => directional::resolution_distance(slave, pipeline),
            ProjectionKind::Point => point::resolution_distance(slave, pipeline),
        }
    }

    fn compute_projections(self, slave: &mut ShadowSlave, camera_to_world: Mat4) {
        match self {
            ProjectionKind::Directional => directional::compute_projections(slave, camera_to_world),
            ProjectionKind::Point => point::compute_projections(slave, camera_to_world),
        }
    }

    fn compute_isect(self, slave: &mut ShadowSlave) {
        match self {
            ProjectionKind::Directional => directional::compute_isect(slave),
            ProjectionKind::Point => point::compute_isect(slave),
        }
    }
}

/// Up vector for a light camera looking along `dir`.
fn pick_up(dir: Vec3) -> Vec3 {
    if Vec3::Z.cross(dir).length_squared() < MIN_UP_MAG {
        Vec3::Y
    } else {
        Vec3::Z
    }
}

/// Caster bounds in light space, stretched past the caster by the attenuation distance.
fn light_space_box(slave: &ShadowSlave) -> (Vec3, Vec3) {
    let bnd = slave.caster_world_bounds.transformed(&slave.world_to_light);
    let mut max = bnd.max();
    max.z += slave.atten_dist;
    (bnd.min(), max)
}

/// Applies the fade-in knee to a raw shadow power. `None` means too weak to cast.
pub fn apply_power_knee(power: f32) -> Option<f32> {
    if power < MIN_SHADOW_POWER {
        return None;
    }
    if power < KNEE_SHADOW_POWER {
        let t = (power - MIN_SHADOW_POWER) / (KNEE_SHADOW_POWER - MIN_SHADOW_POWER);
        return Some(VIS_SHADOW_POWER + t * (KNEE_SHADOW_POWER - VIS_SHADOW_POWER));
    }
    Some(power)
}

/// Square shadow map edge for a caster `dist` away from the eye.
pub fn compute_shadow_size(max_size: u32, limit_res: bool, dist: f32, config: &ShadowQualityConfig) -> u32 {
    let mut size = max_size;
    if config.quality <= 0.5 {
        size >>= 1;
    }
    if limit_res {
        size >>= 1;
    }
    let shift = (dist / RES_SHIFT_DIST) as u32;
    size = size.checked_shr(shift).unwrap_or(0);

    size.min(config.max_size).max(MIN_SHADOW_SIZE)
}

/// Distance beyond which shadows are gone, or zero when unlimited.
///
/// A master without a max distance never fades. A global max distance of zero or less
/// leaves the master's own limit in place.
pub fn effective_max_dist(master_max_dist: f32, config: &ShadowQualityConfig) -> f32 {
    if master_max_dist <= 0.0 {
        return 0.0;
    }
    let max_dist = if config.max_dist > 0.0 {
        master_max_dist.min(config.max_dist)
    } else {
        master_max_dist
    };
    max_dist * (MIN_DIST_FRAC + config.quality * (1.0 - MIN_DIST_FRAC))
}

/// Power multiplier for a shadow whose far side is `dist` from the eye. `None` once the
/// shadow has faded out completely.
pub fn distance_fade(dist: f32, max_dist: f32, quality: f32) -> Option<f32> {
    if max_dist <= 0.0 {
        return Some(1.0);
    }
    let fade_frac = LOW_QUALITY_FADE_FRAC + quality * (HIGH_QUALITY_FADE_FRAC - LOW_QUALITY_FADE_FRAC);
    let min_dist = max_dist * fade_frac;

    let past = dist - min_dist;
    if past < 0.0 {
        return Some(1.0);
    }
    let fade = 1.0 - past / (max_dist - min_dist);
    if fade <= 0.0 {
        None
    } else {
        Some(fade)
    }
}

/// Fills the receiver and caster lookup matrices mapping light depth onto `[0, 1]` between
/// the caster's nearest point and the end of its attenuation.
pub fn compute_lut(slave: &mut ShadowSlave) {
    let bnd = slave.caster_world_bounds.transformed(&slave.world_to_light);
    let farthest = bnd.center().z + slave.atten_dist;
    let closest = bnd.min().z;
    let range = f32::max(farthest - closest, MIN_DEPTH_RANGE);

    // TODO: the bias is always added, even for casters that do not shadow themselves.
    // Check whether other casters want a small negative bias instead.
    let mut light_to_lut = mat4_from_rows([
        [0.0, 0.0, 1.0 / range, -closest / range],
        [0.0; 4],
        [0.0; 4],
        [0.0; 4],
    ]);
    slave.rcv_lut = light_to_lut * slave.world_to_light;

    light_to_lut.w_axis.x += LUT_BIAS;
    slave.cast_lut = if slave.cast_in_camera_space() {
        light_to_lut * slave.world_to_light
    } else {
        light_to_lut
    };
}

/// Owns the shadow pipeline for one light.
#[derive(Debug)]
pub struct ShadowMaster {
    pub settings: ShadowMasterSettings,
    pub properties: MasterProperties,
    pub kind: ProjectionKind,
    pub load_mask: QualityMask,
    light: RawLightHandle,
    light_resolved: bool,
    active: bool,
    pool: SlavePool<ShadowSlave>,
}

impl ShadowMaster {
    /// Creates an inactive master for `light`. The light may be registered later.
    pub fn new(kind: ProjectionKind, light: RawLightHandle, settings: ShadowMasterSettings) -> Self {
        Self {
            settings,
            properties: MasterProperties::empty(),
            kind,
            load_mask: QualityMask::ALL,
            light,
            light_resolved: false,
            active: false,
            pool: SlavePool::new(),
        }
    }

    /// Reads the persisted settings. A master read from a record is active.
    pub fn read_from(
        reader: &mut impl Read,
        kind: ProjectionKind,
        light: RawLightHandle,
    ) -> Result<Self, RecordError> {
        let mut master = Self::new(kind, light, ShadowMasterSettings::read_from(reader)?);
        master.activate();
        Ok(master)
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), RecordError> {
        self.settings.write_to(writer)
    }

    /// Starts receiving cast requests.
    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn light(&self) -> RawLightHandle {
        self.light
    }

    pub fn set_max_dist(&mut self, max_dist: f32) {
        self.settings.set_max_dist(max_dist);
    }

    pub fn self_shadow(&self) -> bool {
        self.properties.contains(MasterProperties::SELF_SHADOW)
    }

    /// Slaves accepted so far this frame.
    pub fn slaves(&self) -> &[ShadowSlave] {
        self.pool.active()
    }

    pub fn pool(&self) -> &SlavePool<ShadowSlave> {
        &self.pool
    }

    /// Frame start: empties the pool and, if the light is loaded, clears its slave bits.
    pub fn begin_render(&mut self, lights: &mut LightManager) {
        profiling::scope!("ShadowMaster::begin_render");

        self.pool.clear();
        match lights.get_mut(self.light) {
            Some(light) => {
                light.clear_slave_bits();
                self.light_resolved = true;
            }
            None => self.light_resolved = false,
        }
    }

    /// Handles one cast request, returning whether a shadow was submitted.
    pub fn on_cast_msg(&mut self, request: &mut CastRequest<'_>, lights: &mut LightManager) -> bool {
        profiling::scope!("ShadowMaster::on_cast_msg");

        match self.try_cast(request, lights) {
            Ok(index) => {
                log::trace!("Caster {:?} submitted as shadow {}", request.caster_handle, index);
                true
            }
            Err(reason) => {
                log::trace!("Caster {:?} rejected: {}", request.caster_handle, reason);
                false
            }
        }
    }

    fn try_cast(&mut self, request: &mut CastRequest<'_>, lights: &mut LightManager) -> Result<u32, CastRejection> {
        if !self.light_resolved {
            return Err(CastRejection::NoLight);
        }
        let light = lights.get_mut(self.light).ok_or(CastRejection::NoLight)?;

        if !light.in_vis_set(&request.vis.vis_set) || light.in_vis_not(&request.vis.vis_not) {
            return Err(CastRejection::NotInVisSet);
        }
        if !self.load_mask.matches_quality(request.config.quality_tier()) {
            return Err(CastRejection::QualityMismatch);
        }

        let caster = request.caster;
        if caster.spans().is_empty() {
            return Err(CastRejection::NoSpans);
        }

        let caster_bounds = caster.world_bounds(request.scene);
        let power = self.compute_power(caster, &*light, &caster_bounds);
        let power = apply_power_knee(power).ok_or(CastRejection::PowerTooLow)?;

        let token = self.pool.next(ShadowSlave::default);
        let slave = &mut self.pool[&token];
        slave.init();
        slave.power = power;
        slave.caster = Some(request.caster_handle);
        slave.light = Some(self.light);
        slave.caster_world_bounds = caster_bounds;
        slave.atten_dist = self.settings.atten_dist * caster.atten_scale();
        slave.blur_scale = caster.blur_scale();
        slave.flags |= self.kind.slave_flags();
        slave.set_flag(
            SlaveFlags::SELF_SHADOW,
            self.properties.contains(MasterProperties::SELF_SHADOW) || caster.self_shadow(),
        );

        // Each step reads what the previous ones wrote.
        let (world_to_light, light_to_world) = self.kind.compute_world_to_light(&*light, &caster_bounds);
        slave.world_to_light = world_to_light;
        slave.light_to_world = light_to_world;
        slave.world_bounds = self.kind.compute_bounds(slave);

        let dist = self.kind.resolution_distance(slave, &*request.pipeline);
        let size = compute_shadow_size(self.settings.max_size, caster.limit_res(), dist, request.config);
        slave.width = size;
        slave.height = size;
        slave.priority = dist;

        self.kind.compute_projections(slave, request.pipeline.camera_to_world());
        compute_lut(slave);
        self.kind.compute_isect(slave);

        if let Err(reason) = last_chance_to_bail(slave, self.settings.max_dist, request) {
            self.pool.recycle(token);
            return Err(reason);
        }

        slave.set_flag(
            SlaveFlags::OBEYS_LIGHT_GROUPS,
            light.property(LightProperties::SHADOW_LIGHT_GROUP) && light.property(LightProperties::HAS_INCLUDES),
        );
        slave.set_flag(SlaveFlags::INCLUDES_CHARS, light.property(LightProperties::INCLUDES_CHARS));

        slave.index = SLAVE_INDEX_UNSET;
        request.pipeline.submit_shadow_slave(slave);
        if !slave.is_submitted() {
            self.pool.recycle(token);
            return Err(CastRejection::PipelineRefused);
        }

        let index = slave.index;
        light.set_slave_bit(index);
        Ok(index)
    }

    fn compute_power(&self, caster: &ShadowCaster, light: &dyn ShadowLight, caster_bounds: &Bounds3Ext) -> f32 {
        let lit = if light.is_idle() {
            0.0
        } else {
            let (strength, _scale) = light.strength_and_scale(caster_bounds);
            caster.max_opacity() * strength
        };
        lit * self.settings.power * caster.boost()
    }
}

/// Drops shadows that can't be seen and fades out distant ones.
fn last_chance_to_bail(
    slave: &mut ShadowSlave,
    master_max_dist: f32,
    request: &CastRequest<'_>,
) -> Result<(), CastRejection> {
    let pipeline = &*request.pipeline;
    if !pipeline.test_visible_world(&slave.world_bounds) {
        return Err(CastRejection::NotVisible);
    }

    let max_dist = effective_max_dist(master_max_dist, request.config);
    if max_dist <= 0.0 {
        return Ok(());
    }

    // Measured along eye to shadow center rather than the view direction, so turning the
    // camera does not change the fade.
    let eye = pipeline.view_position_world();
    let dir = match (slave.world_bounds.center() - eye).try_normalize() {
        Some(dir) => dir,
        None => return Ok(()),
    };
    let depth = slave.world_bounds.test_plane(dir);
    let dist = depth.y - dir.dot(eye);

    let fade = distance_fade(dist, max_dist, request.config.quality).ok_or(CastRejection::FadedOut)?;
    slave.power *= fade;
    Ok(())
}

/// Owns every shadow master and the lights they attach to, and delivers cast requests to
/// the active ones.
#[derive(Default)]
pub struct MasterManager {
    data: Vec<Option<ShadowMaster>>,
    lights: LightManager,
}

impl MasterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, master: ShadowMaster) -> RawShadowMasterHandle {
        self.data.push(Some(master));
        RawResourceHandle::new(self.data.len() - 1)
    }

    pub fn update(&mut self, handle: RawShadowMasterHandle, change: ShadowMasterSettingsChange) {
        if let Some(master) = self.get_mut(handle) {
            master.settings.update_from_changes(change);
        }
    }

    pub fn remove(&mut self, handle: RawShadowMasterHandle) -> Option<ShadowMaster> {
        self.data.get_mut(handle.idx).and_then(Option::take)
    }

    pub fn get(&self, handle: RawShadowMasterHandle) -> Option<&ShadowMaster> {
        self.data.get(handle.idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: RawShadowMasterHandle) -> Option<&mut ShadowMaster> {
        self.data.get_mut(handle.idx).and_then(Option::as_mut)
    }

    pub fn lights(&self) -> &LightManager {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightManager {
        &mut self.lights
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShadowMaster> {
        self.data.iter().flatten()
    }

    /// Frame start for every master, active or not.
    pub fn begin_render(&mut self) {
        profiling::scope!("MasterManager::begin_render");
        for master in self.data.iter_mut().flatten() {
            master.begin_render(&mut self.lights);
        }
    }

    /// Slaves accepted this frame across all masters.
    pub fn slaves_in_use(&self) -> usize {
        self.iter().map(|m| m.pool().in_use()).sum()
    }
}

impl CastBroadcast for MasterManager {
    fn broadcast(&mut self, request: &mut CastRequest<'_>) -> usize {
        let mut accepted = 0;
        for master in self.data.iter_mut().flatten().filter(|m| m.is_active()) {
            if master.on_cast_msg(request, &mut self.lights) {
                accepted += 1;
            }
        }
        accepted
    }
}
