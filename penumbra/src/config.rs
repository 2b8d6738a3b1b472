//! Global shadow quality dials.

use serde::{Deserialize, Serialize};

use crate::util::math::round_down_pot;

/// Largest shadow map edge the global size setting accepts.
pub const MAX_GLOBAL_MAX_SIZE: u32 = 512;
/// Smallest shadow map edge anything is ever rendered at.
pub const MIN_SHADOW_SIZE: u32 = 32;

/// Quality settings shared by every shadow master and caster.
///
/// Passed explicitly into every per-frame operation rather than living in process-wide
/// statics, so several schedulers (and tests) can run side by side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowQualityConfig {
    /// Upper bound on any shadow map edge, a power of two in `[32, 512]`.
    pub max_size: u32,
    /// Caps the max distance of every master that has one. Zero or less removes the cap.
    pub max_dist: f32,
    /// Continuous quality dial in `[0, 1]`.
    pub quality: f32,
    /// Master switch for shadow casting.
    pub cast_enabled: bool,
}

impl Default for ShadowQualityConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_GLOBAL_MAX_SIZE,
            max_dist: 160.0,
            quality: 1.0,
            cast_enabled: true,
        }
    }
}

impl ShadowQualityConfig {
    /// Discrete quality tier in `0..=3` used to match load masks.
    pub fn quality_tier(&self) -> u8 {
        (self.quality * 3.9) as u8
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.quality = quality.clamp(0.0, 1.0);
    }

    /// Sets the maximum shadow map size, rounded down to a power of two and clamped into
    /// `[32, 512]`.
    pub fn set_max_size(&mut self, size: u32) {
        let clamped = round_down_pot(size).clamp(MIN_SHADOW_SIZE, MAX_GLOBAL_MAX_SIZE);
        if clamped != size {
            log::debug!("Shadow max size {} adjusted to {}", size, clamped);
        }
        self.max_size = clamped;
    }

    pub fn set_max_dist(&mut self, dist: f32) {
        self.max_dist = dist;
    }

    pub fn enable_cast(&mut self) {
        self.cast_enabled = true;
    }

    pub fn disable_cast(&mut self) {
        self.cast_enabled = false;
    }

    pub fn toggle_cast(&mut self) {
        self.cast_enabled = !self.cast_enabled;
    }

    /// Brings values loaded from outside (e.g. a settings file) back into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.set_quality(self.quality);
        self.set_max_size(self.max_size);
        self
    }
}
