#![warn(unsafe_op_in_unsafe_fn)]

//! Type declarations for the penumbra shadow scheduler.
//!
//! This is reexported in the penumbra crate proper and includes all the "surface"
//! api arguments: handles, bounds, flag sets and the persisted settings records.

use std::{fmt::Debug, hash::Hash, marker::PhantomData};

/// Reexport of the glam version penumbra is using.
pub use glam;
use glam::{Mat4, Vec3A};

mod bits;
mod bounds;
mod record;

pub use bits::*;
pub use bounds::*;
pub use record::*;

/// Non-owning resource handle.
///
/// Indexes into one of penumbra's manager tables. The handle does not keep the
/// resource alive; looking up a removed handle yields `None`.
pub struct RawResourceHandle<T> {
    /// Underlying value of the handle.
    pub idx: usize,
    _phantom: PhantomData<T>,
}

impl<T> RawResourceHandle<T> {
    /// Creates a new handle with the given value
    pub const fn new(idx: usize) -> Self {
        Self {
            idx,
            _phantom: PhantomData,
        }
    }
}

// Need Debug/Copy/Clone impls that don't require T: Trait.
impl<T> Debug for RawResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResourceHandle").field("idx", &self.idx).finish()
    }
}

impl<T> Copy for RawResourceHandle<T> {}

impl<T> Clone for RawResourceHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for RawResourceHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl<T> Eq for RawResourceHandle<T> {}

impl<T> Hash for RawResourceHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}

/// Tag type for differentiating drawables on the type level.
#[doc(hidden)]
pub struct DrawableTag;
/// Tag type for differentiating scene objects on the type level.
#[doc(hidden)]
pub struct SceneObjectTag;
/// Tag type for differentiating lights on the type level.
#[doc(hidden)]
pub struct LightTag;
/// Tag type for differentiating shadow casters on the type level.
#[doc(hidden)]
pub struct ShadowCasterTag;
/// Tag type for differentiating shadow masters on the type level.
#[doc(hidden)]
pub struct ShadowMasterTag;

/// Internal non-owning handle to a drawable (a bundle of spans and materials).
pub type RawDrawableHandle = RawResourceHandle<DrawableTag>;
/// Internal non-owning handle to a scene object.
pub type RawSceneObjectHandle = RawResourceHandle<SceneObjectTag>;
/// Internal non-owning handle to a light.
pub type RawLightHandle = RawResourceHandle<LightTag>;
/// Internal non-owning handle to a shadow caster.
pub type RawShadowCasterHandle = RawResourceHandle<ShadowCasterTag>;
/// Internal non-owning handle to a shadow master.
pub type RawShadowMasterHandle = RawResourceHandle<ShadowMasterTag>;

macro_rules! changeable_struct {
    ($(#[$outer:meta])* pub struct $name:ident <- $name_change:ident { $($(#[$inner:meta])* $field_vis:vis $field_name:ident : $field_type:ty),* $(,)? } ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            $(
                $(#[$inner])* $field_vis $field_name : $field_type
            ),*
        }
        impl $name {
            pub fn update_from_changes(&mut self, change: $name_change) {
                $(
                    if let Some(inner) = change.$field_name {
                        self.$field_name = inner;
                    }
                );*
            }
        }
        #[doc = concat!("Describes a modification to a ", stringify!($name), ".")]
        #[derive(Debug, Default, Clone)]
        pub struct $name_change {
            $(
                $field_vis $field_name : Option<$field_type>
            ),*
        }
    };
}

/// Sentinel index of a shadow slave the pipeline has not (yet) accepted.
pub const SLAVE_INDEX_UNSET: u32 = u32::MAX;

bitflags::bitflags! {
    /// Persisted per-caster flags.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct CasterFlags: u8 {
        /// The caster's shadow may fall on the caster itself.
        const SELF_SHADOW = 0x1;
        /// Render this caster's shadow map at half resolution.
        const LIMIT_RES = 0x4;
    }
}

bitflags::bitflags! {
    /// Flags carried by a shadow slave for the rest of the frame.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct SlaveFlags: u16 {
        /// Only applied to receivers in the light's group, see [`LightProperties::SHADOW_LIGHT_GROUP`].
        const OBEYS_LIGHT_GROUPS = 1 << 0;
        /// Applied to characters even when obeying light groups.
        const INCLUDES_CHARS = 1 << 1;
        const SELF_SHADOW = 1 << 2;
        /// The cast LUT is applied to camera space z rather than light space z.
        const CAST_IN_CAMERA_SPACE = 1 << 3;
        const REVERSE_Z = 1 << 4;
        const TWO_SIDED = 1 << 5;
        const REVERSE_CULL = 1 << 6;
        /// Perspective slave cast from a point in space.
        const POSITIONAL = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Properties of a shadow master.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MasterProperties: u8 {
        const SELF_SHADOW = 0x1;
    }
}

bitflags::bitflags! {
    /// Light properties the scheduler cares about.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct LightProperties: u8 {
        const SHADOW_LIGHT_GROUP = 0x1;
        const HAS_INCLUDES = 0x2;
        const INCLUDES_CHARS = 0x4;
    }
}

bitflags::bitflags! {
    /// Per-span render properties relevant to shadow receiving.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct SpanProps: u16 {
        const NO_SHADOW = 1 << 0;
        const FORCE_SHADOW = 1 << 1;
        const SKIP_PROJECTION = 1 << 2;
        const PROJ_AS_VTX = 1 << 3;
        const NO_SHADOW_CAST = 1 << 4;
    }
}

/// Which discrete quality tiers an object is active in.
///
/// Bit `t` set means the object participates at quality tier `t`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct QualityMask(pub u8);

impl QualityMask {
    pub const ALL: Self = Self(0xff);
    pub const NONE: Self = Self(0);

    /// Mask active from `tier` upwards.
    pub const fn at_least(tier: u8) -> Self {
        if tier >= 8 {
            Self::NONE
        } else {
            Self(0xff << tier)
        }
    }

    pub const fn matches_quality(self, tier: u8) -> bool {
        tier < 8 && self.0 & (1 << tier) != 0
    }
}

impl Default for QualityMask {
    fn default() -> Self {
        Self::ALL
    }
}

changeable_struct! {
    /// Persisted settings of a shadow caster.
    pub struct ShadowCasterSettings <- ShadowCasterSettingsChange {
        pub cast_flags: CasterFlags,
        /// Multiplier on the computed shadow power.
        pub boost: f32,
        /// Multiplier on the master's attenuation distance.
        pub atten_scale: f32,
        pub blur_scale: f32,
    }
}

impl Default for ShadowCasterSettings {
    fn default() -> Self {
        Self {
            cast_flags: CasterFlags::empty(),
            boost: 1.0,
            atten_scale: 1.0,
            blur_scale: 0.0,
        }
    }
}

impl ShadowCasterSettings {
    pub fn self_shadow(&self) -> bool {
        self.cast_flags.contains(CasterFlags::SELF_SHADOW)
    }

    pub fn limit_res(&self) -> bool {
        self.cast_flags.contains(CasterFlags::LIMIT_RES)
    }
}

changeable_struct! {
    /// Persisted settings of a shadow master.
    pub struct ShadowMasterSettings <- ShadowMasterSettingsChange {
        /// Distance past the caster's near edge over which the shadow fades out.
        pub atten_dist: f32,
        /// Distance from the eye beyond which this master's shadows are dropped. Zero disables.
        pub max_dist: f32,
        pub min_dist: f32,
        pub max_size: u32,
        pub min_size: u32,
        pub power: f32,
    }
}

impl Default for ShadowMasterSettings {
    fn default() -> Self {
        Self {
            atten_dist: 0.0,
            max_dist: 0.0,
            min_dist: 0.0,
            max_size: 256,
            min_size: 256,
            power: 1.0,
        }
    }
}

impl ShadowMasterSettings {
    /// Sets the max distance, deriving the min distance as three quarters of it.
    pub fn set_max_dist(&mut self, max_dist: f32) {
        self.max_dist = max_dist;
        self.min_dist = max_dist * 0.75;
    }
}

/// Describes how the viewing camera looks at the scene.
#[derive(Debug, Default, Copy, Clone)]
pub struct Camera {
    pub projection: CameraProjection,
    /// View matrix
    pub view: Mat4,
}

/// Describes how the world should be projected into the camera.
#[derive(Debug, Copy, Clone)]
pub enum CameraProjection {
    Orthographic {
        /// Size assumes the location is at the center of the camera area.
        size: Vec3A,
    },
    Perspective {
        /// Vertical field of view in degrees.
        vfov: f32,
        /// Near plane distance. All projection uses a infinite far plane.
        near: f32,
    },
    Raw(Mat4),
}

impl Default for CameraProjection {
    fn default() -> Self {
        Self::Perspective { vfov: 60.0, near: 0.1 }
    }
}

/// Describes the "Handedness" of a given coordinate system. Affects math done
/// in the space.
///
/// +X right, +Y up, +Z _into_ the screen is left handed.
/// +X right, +Y up, +Z _out of_ the screen is right handed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Handedness {
    #[default]
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_mask_tiers() {
        assert!(QualityMask::ALL.matches_quality(0));
        assert!(QualityMask::ALL.matches_quality(3));
        assert!(!QualityMask::NONE.matches_quality(0));

        let high = QualityMask::at_least(2);
        assert!(!high.matches_quality(0));
        assert!(!high.matches_quality(1));
        assert!(high.matches_quality(2));
        assert!(high.matches_quality(3));
        assert!(!high.matches_quality(9));
    }

    #[test]
    fn set_max_dist_derives_min() {
        let mut settings = ShadowMasterSettings::default();
        settings.set_max_dist(100.0);
        assert_eq!(settings.max_dist, 100.0);
        assert_eq!(settings.min_dist, 75.0);
    }

    #[test]
    fn settings_change_only_touches_given_fields() {
        let mut settings = ShadowMasterSettings::default();
        settings.update_from_changes(ShadowMasterSettingsChange {
            power: Some(0.5),
            ..Default::default()
        });
        assert_eq!(settings.power, 0.5);
        assert_eq!(settings.max_size, 256);
    }
}
