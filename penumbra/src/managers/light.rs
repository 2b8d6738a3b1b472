use glam::Vec3;

use crate::types::{BitVector, Bounds3Ext, LightProperties, RawLightHandle, RawResourceHandle};

/// What a shadow master needs from the light it is attached to.
pub trait ShadowLight {
    fn world_position(&self) -> Vec3;
    /// Direction the light shines along, in world space.
    fn world_direction(&self) -> Vec3;

    /// Whether the light belongs to any of the regions in `vis_set`.
    fn in_vis_set(&self, vis_set: &BitVector) -> bool;
    /// Whether the light is excluded by any of the regions in `vis_not`.
    fn in_vis_not(&self, vis_not: &BitVector) -> bool;

    /// Strength of the light over `bounds`, and the scale applied to it.
    fn strength_and_scale(&self, bounds: &Bounds3Ext) -> (f32, f32);
    fn is_idle(&self) -> bool;

    fn set_slave_bit(&mut self, index: u32);
    fn clear_slave_bits(&mut self);
    fn slave_bits(&self) -> &BitVector;

    fn property(&self, property: LightProperties) -> bool;
}

/// The renderer's current visibility regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisSets {
    pub vis_set: BitVector,
    pub vis_not: BitVector,
}

/// Region every light and view is in unless told otherwise.
pub const NORMAL_VIS_REGION: u32 = 0;

impl Default for VisSets {
    fn default() -> Self {
        Self {
            vis_set: BitVector::from_bits([NORMAL_VIS_REGION]),
            vis_not: BitVector::new(),
        }
    }
}

/// Spherical region the light's strength fades out over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftRegion {
    pub center: Vec3,
    /// Full strength inside this radius.
    pub inner_radius: f32,
    /// Zero strength outside this radius.
    pub outer_radius: f32,
}

impl SoftRegion {
    fn strength(&self, point: Vec3) -> f32 {
        let dist = point.distance(self.center);
        if dist <= self.inner_radius {
            1.0
        } else if dist >= self.outer_radius {
            0.0
        } else {
            1.0 - (dist - self.inner_radius) / (self.outer_radius - self.inner_radius)
        }
    }
}

/// A plain light: position, direction, visibility regions and the per-frame slave bits.
#[derive(Debug, Clone)]
pub struct LightInfo {
    pub position: Vec3,
    pub direction: Vec3,
    pub intensity: f32,
    pub soft_region: Option<SoftRegion>,
    pub idle: bool,
    pub properties: LightProperties,
    pub vis_regions: BitVector,
    pub vis_not_regions: BitVector,
    slave_bits: BitVector,
}

impl Default for LightInfo {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            intensity: 1.0,
            soft_region: None,
            idle: false,
            properties: LightProperties::empty(),
            vis_regions: BitVector::from_bits([NORMAL_VIS_REGION]),
            vis_not_regions: BitVector::new(),
            slave_bits: BitVector::new(),
        }
    }
}

impl LightInfo {
    pub fn directional(direction: Vec3) -> Self {
        Self {
            direction,
            ..Default::default()
        }
    }

    pub fn point(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

impl ShadowLight for LightInfo {
    fn world_position(&self) -> Vec3 {
        self.position
    }

    fn world_direction(&self) -> Vec3 {
        self.direction
    }

    fn in_vis_set(&self, vis_set: &BitVector) -> bool {
        self.vis_regions.overlaps(vis_set)
    }

    fn in_vis_not(&self, vis_not: &BitVector) -> bool {
        self.vis_not_regions.overlaps(vis_not)
    }

    fn strength_and_scale(&self, bounds: &Bounds3Ext) -> (f32, f32) {
        let strength = match self.soft_region {
            Some(region) => region.strength(bounds.center()),
            None => 1.0,
        };
        (strength * self.intensity, 1.0)
    }

    fn is_idle(&self) -> bool {
        self.idle
    }

    fn set_slave_bit(&mut self, index: u32) {
        self.slave_bits.set_bit(index);
    }

    fn clear_slave_bits(&mut self) {
        self.slave_bits.clear();
    }

    fn slave_bits(&self) -> &BitVector {
        &self.slave_bits
    }

    fn property(&self, property: LightProperties) -> bool {
        self.properties.contains(property)
    }
}

/// Manages the lights shadow masters attach to.
///
/// Lights may be registered after the masters that reference them; a master simply finds
/// nothing until the light arrives.
#[derive(Default)]
pub struct LightManager {
    data: Vec<Option<Box<dyn ShadowLight>>>,
}

impl LightManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a handle for a light that will be added later.
    pub fn reserve(&mut self) -> RawLightHandle {
        self.data.push(None);
        RawResourceHandle::new(self.data.len() - 1)
    }

    pub fn add(&mut self, light: impl ShadowLight + 'static) -> RawLightHandle {
        let handle = self.reserve();
        self.insert(handle, light);
        handle
    }

    pub fn insert(&mut self, handle: RawLightHandle, light: impl ShadowLight + 'static) {
        if handle.idx >= self.data.len() {
            self.data.resize_with(handle.idx + 1, || None);
        }
        self.data[handle.idx] = Some(Box::new(light));
    }

    pub fn remove(&mut self, handle: RawLightHandle) -> Option<Box<dyn ShadowLight>> {
        self.data.get_mut(handle.idx).and_then(Option::take)
    }

    pub fn get(&self, handle: RawLightHandle) -> Option<&dyn ShadowLight> {
        self.data.get(handle.idx).and_then(|l| l.as_deref())
    }

    pub fn get_mut(&mut self, handle: RawLightHandle) -> Option<&mut (dyn ShadowLight + 'static)> {
        self.data.get_mut(handle.idx).and_then(|l| l.as_deref_mut())
    }
}
