//! Per-frame shadow scheduling.
//!
//! Every frame, each [`ShadowCaster`](managers::ShadowCaster) gathers the geometry of its
//! scene objects and broadcasts a cast request. Every active
//! [`ShadowMaster`](managers::ShadowMaster) answers by deciding whether its light should cast
//! a shadow of that geometry, sizing the shadow map, computing the light transforms and
//! handing the result to a [`ShadowPipeline`](pipeline::ShadowPipeline).
//!
//! [`ShadowScheduler`] drives a whole frame. [`ShadowQueue`](pipeline::ShadowQueue) is a
//! ready-made pipeline that keeps the accepted shadows and attaches them to receivers.

pub mod config;
pub mod managers;
pub mod pipeline;
pub mod scene;
mod scheduler;
pub mod util;

pub use config::ShadowQualityConfig;
pub use scheduler::{FrameStats, ShadowScheduler};

/// Reexport of [`penumbra_types`] with all the surface types.
pub use penumbra_types as types;
