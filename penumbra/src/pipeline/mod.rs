//! The renderer side of shadow scheduling.
//!
//! Masters talk to the renderer through [`ShadowPipeline`]. [`ShadowQueue`] is a complete
//! implementation on top of a [`ViewCamera`](crate::managers::ViewCamera) that keeps the
//! accepted shadows for the rest of the frame.

use glam::{Mat4, Vec3};

use crate::{
    config::ShadowQualityConfig,
    managers::{ShadowCaster, ShadowSlave, VisSets},
    scene::Scene,
    types::{Bounds3Ext, RawShadowCasterHandle},
};

mod queue;
mod shadow_alloc;

pub use queue::{QueuedShadow, ShadowQueue};
pub use shadow_alloc::{allocate_shadow_atlas, AtlasCoordinate, ShadowAtlas};

/// Renderer interface used while scheduling shadows.
pub trait ShadowPipeline {
    /// Offers a fully computed slave. Accepting it means writing a unique `slave.index`;
    /// leaving [`SLAVE_INDEX_UNSET`](crate::types::SLAVE_INDEX_UNSET) refuses it.
    ///
    /// Indices become bits in the light's and spans' [`BitVector`](crate::types::BitVector)s,
    /// so they should be dense from 0 and stay below
    /// [`BitVector::MAX_BIT`](crate::types::BitVector::MAX_BIT).
    fn submit_shadow_slave(&mut self, slave: &mut ShadowSlave);

    /// Whether any part of `bounds` can be seen by the current view.
    fn test_visible_world(&self, bounds: &Bounds3Ext) -> bool;

    fn view_position_world(&self) -> Vec3;
    fn view_dir_world(&self) -> Vec3;
    fn camera_to_world(&self) -> Mat4;
}

/// Everything a caster's render message works with.
pub struct RenderContext<'a> {
    pub scene: &'a mut Scene,
    pub pipeline: &'a mut dyn ShadowPipeline,
    pub config: &'a ShadowQualityConfig,
    pub vis: &'a VisSets,
}

/// Message a caster broadcasts to every subscribed master, once per frame.
pub struct CastRequest<'a> {
    pub caster_handle: RawShadowCasterHandle,
    pub caster: &'a ShadowCaster,
    pub scene: &'a Scene,
    pub pipeline: &'a mut dyn ShadowPipeline,
    pub config: &'a ShadowQualityConfig,
    pub vis: &'a VisSets,
}

/// Synchronous delivery of cast requests to everyone listening.
pub trait CastBroadcast {
    /// Delivers `request` to every subscriber, returning how many accepted it.
    fn broadcast(&mut self, request: &mut CastRequest<'_>) -> usize;
}
