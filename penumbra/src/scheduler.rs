use crate::{
    config::ShadowQualityConfig,
    managers::{CasterManager, MasterManager, VisSets},
    pipeline::{CastBroadcast, CastRequest, RenderContext, ShadowPipeline, ShadowQueue},
    scene::Scene,
};

/// What happened during one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Casters that got a render message.
    pub casters: usize,
    /// Cast requests broadcast to the masters.
    pub requests: usize,
    /// Shadows accepted by the pipeline.
    pub shadows: usize,
    /// Receiver spans attached to a shadow, when run through a [`ShadowQueue`].
    pub receivers: usize,
}

struct CountingBroadcast<'a> {
    masters: &'a mut MasterManager,
    requests: usize,
}

impl CastBroadcast for CountingBroadcast<'_> {
    fn broadcast(&mut self, request: &mut CastRequest<'_>) -> usize {
        self.requests += 1;
        self.masters.broadcast(request)
    }
}

/// Runs the casters and masters of one scene, once per frame, in order.
pub struct ShadowScheduler {
    pub config: ShadowQualityConfig,
    pub scene: Scene,
    pub casters: CasterManager,
    pub masters: MasterManager,
}

impl ShadowScheduler {
    pub fn new(config: ShadowQualityConfig) -> Self {
        Self {
            config: config.sanitized(),
            scene: Scene::new(),
            casters: CasterManager::new(),
            masters: MasterManager::new(),
        }
    }

    /// Resets every master, then lets every caster broadcast to them.
    pub fn render_frame(&mut self, pipeline: &mut dyn ShadowPipeline, vis: &VisSets) -> FrameStats {
        profiling::scope!("ShadowScheduler::render_frame");

        self.masters.begin_render();

        let mut stats = FrameStats::default();
        let mut broadcast = CountingBroadcast {
            masters: &mut self.masters,
            requests: 0,
        };
        let mut ctx = RenderContext {
            scene: &mut self.scene,
            pipeline,
            config: &self.config,
            vis,
        };
        for (handle, caster) in self.casters.iter_mut() {
            stats.casters += 1;
            caster.on_render_msg(handle, &mut ctx, &mut broadcast);
        }
        stats.requests = broadcast.requests;
        stats.shadows = self.masters.slaves_in_use();

        log::debug!(
            "Shadow frame: {} casters, {} requests, {} shadows",
            stats.casters,
            stats.requests,
            stats.shadows
        );
        stats
    }

    /// A whole frame through `queue`: clears it, schedules, then marks casters and attaches
    /// the accepted shadows to their receivers.
    pub fn render_frame_to_queue(&mut self, queue: &mut ShadowQueue, vis: &VisSets) -> FrameStats {
        queue.clear();
        let mut stats = self.render_frame(&mut *queue, vis);

        queue.mark_caster_spans(&mut self.scene, &self.casters);
        stats.receivers = queue.attach_receivers(&mut self.scene, self.masters.lights());
        stats
    }
}
