use std::io::{Read, Write};

use crate::{
    pipeline::{CastBroadcast, CastRequest, RenderContext},
    scene::Scene,
    types::{
        Bounds3Ext, QualityMask, RawDrawableHandle, RawResourceHandle, RawSceneObjectHandle, RawShadowCasterHandle,
        RecordError, ShadowCasterSettings, ShadowCasterSettingsChange, SpanProps,
    },
};

/// A span collected from one of the caster's targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSpan {
    pub drawable: RawDrawableHandle,
    /// Index of the span within the drawable.
    pub index: u32,
}

/// Gathers the geometry of a set of scene objects and asks every shadow master to cast
/// a shadow from it, once per frame.
#[derive(Debug, Clone, Default)]
pub struct ShadowCaster {
    pub settings: ShadowCasterSettings,
    pub load_mask: QualityMask,
    targets: Vec<RawSceneObjectHandle>,
    // Rebuilt every render message.
    spans: Vec<DrawSpan>,
    max_opacity: f32,
}

impl ShadowCaster {
    pub fn new(settings: ShadowCasterSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn read_from(reader: &mut impl Read) -> Result<Self, RecordError> {
        Ok(Self::new(ShadowCasterSettings::read_from(reader)?))
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), RecordError> {
        self.settings.write_to(writer)
    }

    pub fn add_target(&mut self, target: RawSceneObjectHandle) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub fn remove_target(&mut self, target: RawSceneObjectHandle) {
        self.targets.retain(|&t| t != target);
    }

    pub fn targets(&self) -> &[RawSceneObjectHandle] {
        &self.targets
    }

    pub fn spans(&self) -> &[DrawSpan] {
        &self.spans
    }

    /// Largest base layer opacity over this frame's spans.
    pub fn max_opacity(&self) -> f32 {
        self.max_opacity
    }

    pub fn boost(&self) -> f32 {
        self.settings.boost
    }

    pub fn atten_scale(&self) -> f32 {
        self.settings.atten_scale
    }

    pub fn blur_scale(&self) -> f32 {
        self.settings.blur_scale
    }

    pub fn self_shadow(&self) -> bool {
        self.settings.self_shadow()
    }

    pub fn limit_res(&self) -> bool {
        self.settings.limit_res()
    }

    /// Union of the world bounds of every collected span.
    pub fn world_bounds(&self, scene: &Scene) -> Bounds3Ext {
        let mut bounds = Bounds3Ext::empty();
        for ds in &self.spans {
            if let Some(span) = scene.span(ds.drawable, ds.index) {
                bounds.union(&span.world_bounds);
            }
        }
        bounds
    }

    /// Per-frame entry point: collects spans and, if anything is visible, broadcasts a cast
    /// request to `masters`.
    ///
    /// Disabled casting, a quality mismatch or unloaded geometry are all normal and still
    /// return `true`.
    pub fn on_render_msg(
        &mut self,
        handle: RawShadowCasterHandle,
        ctx: &mut RenderContext<'_>,
        masters: &mut dyn CastBroadcast,
    ) -> bool {
        profiling::scope!("ShadowCaster::on_render_msg");

        if !ctx.config.cast_enabled {
            return true;
        }
        if !self.load_mask.matches_quality(ctx.config.quality_tier()) {
            return true;
        }

        self.collect_spans(ctx.scene);
        self.max_opacity = self.compute_max_opacity(ctx.scene);
        self.clear_span_shadow_bits(ctx.scene);

        if self.max_opacity > 0.0 {
            let mut request = CastRequest {
                caster_handle: handle,
                caster: self,
                scene: &*ctx.scene,
                pipeline: &mut *ctx.pipeline,
                config: ctx.config,
                vis: ctx.vis,
            };
            let accepted = masters.broadcast(&mut request);
            log::trace!("Caster {:?} accepted by {} shadow masters", handle, accepted);
        }

        true
    }

    // The set of spans is volatile (avatar customization can swap geometry at any time)
    // but small, so it is rebuilt from scratch every frame.
    fn collect_spans(&mut self, scene: &Scene) {
        self.spans.clear();
        for &target in &self.targets {
            let di = match scene.object(target).and_then(|so| so.draw.as_ref()) {
                Some(di) if !di.disabled => di,
                _ => continue,
            };
            for dr_ref in &di.drawables {
                // Not loaded yet.
                let drawable = match scene.drawable(dr_ref.drawable) {
                    Some(d) => d,
                    None => continue,
                };
                let di_index = match drawable.di_spans.get(dr_ref.di_index) {
                    Some(idx) if !idx.matrix_only => idx,
                    _ => continue,
                };
                for &index in &di_index.indices {
                    let casts = drawable
                        .span(index)
                        .map_or(false, |span| !span.props.contains(SpanProps::NO_SHADOW_CAST));
                    if casts {
                        self.spans.push(DrawSpan {
                            drawable: dr_ref.drawable,
                            index,
                        });
                    }
                }
            }
        }
    }

    fn compute_max_opacity(&self, scene: &Scene) -> f32 {
        self.spans
            .iter()
            .filter_map(|ds| {
                let drawable = scene.drawable(ds.drawable)?;
                drawable.material(drawable.span(ds.index)?)
            })
            .fold(0.0, |max, material| f32::max(max, material.base_opacity))
    }

    fn clear_span_shadow_bits(&self, scene: &mut Scene) {
        for ds in &self.spans {
            if let Some(span) = scene.span_mut(ds.drawable, ds.index) {
                span.clear_shadow_bits();
            }
        }
    }
}

/// Owns every shadow caster.
#[derive(Debug, Default)]
pub struct CasterManager {
    data: Vec<Option<ShadowCaster>>,
}

impl CasterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, caster: ShadowCaster) -> RawShadowCasterHandle {
        self.data.push(Some(caster));
        RawResourceHandle::new(self.data.len() - 1)
    }

    pub fn update(&mut self, handle: RawShadowCasterHandle, change: ShadowCasterSettingsChange) {
        if let Some(caster) = self.get_mut(handle) {
            caster.settings.update_from_changes(change);
        }
    }

    pub fn remove(&mut self, handle: RawShadowCasterHandle) -> Option<ShadowCaster> {
        self.data.get_mut(handle.idx).and_then(Option::take)
    }

    pub fn get(&self, handle: RawShadowCasterHandle) -> Option<&ShadowCaster> {
        self.data.get(handle.idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: RawShadowCasterHandle) -> Option<&mut ShadowCaster> {
        self.data.get_mut(handle.idx).and_then(Option::as_mut)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RawShadowCasterHandle, &mut ShadowCaster)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, c)| c.as_mut().map(|c| (RawResourceHandle::new(idx), c)))
    }
}
