//! The slice of the scene graph shadow scheduling reads: scene objects, their draw interfaces,
//! drawables, spans and materials.

use crate::types::{
    BitVector, Bounds3Ext, RawDrawableHandle, RawLightHandle, RawResourceHandle, RawSceneObjectHandle, SpanProps,
};

/// The parts of a material the scheduler looks at, all taken from its base layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub base_opacity: f32,
    /// Base layer is alpha blended.
    pub base_alpha_blended: bool,
    /// Base layer carries a texture.
    pub base_textured: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_opacity: 1.0,
            base_alpha_blended: false,
            base_textured: false,
        }
    }
}

/// A contiguous piece of geometry rendered with a single material.
#[derive(Debug, Clone, Default)]
pub struct Span {
    pub world_bounds: Bounds3Ext,
    /// Index into the owning drawable's materials.
    pub material: usize,
    pub props: SpanProps,
    /// Slaves this span was rendered into this frame, as a caster.
    pub shadow_bits: BitVector,
    /// Slaves to apply to this span this frame, as a receiver.
    pub shadow_slaves: BitVector,
}

impl Span {
    pub fn new(world_bounds: Bounds3Ext, material: usize) -> Self {
        Self {
            world_bounds,
            material,
            ..Default::default()
        }
    }

    pub fn clear_shadow_bits(&mut self) {
        self.shadow_bits.clear();
    }
}

/// Group of spans belonging to one draw interface entry.
#[derive(Debug, Clone, Default)]
pub struct DiSpanIndex {
    /// Group only carries transforms, no renderable geometry.
    pub matrix_only: bool,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Drawable {
    pub spans: Vec<Span>,
    pub materials: Vec<Material>,
    pub di_spans: Vec<DiSpanIndex>,
    /// Drawable moves around indeterminately (avatars, physicals).
    pub character: bool,
    /// Lights that reach this drawable through their light group.
    pub group_lights: Vec<RawLightHandle>,
}

impl Drawable {
    pub fn span(&self, index: u32) -> Option<&Span> {
        self.spans.get(index as usize)
    }

    pub fn span_mut(&mut self, index: u32) -> Option<&mut Span> {
        self.spans.get_mut(index as usize)
    }

    pub fn material(&self, span: &Span) -> Option<&Material> {
        self.materials.get(span.material)
    }
}

/// One drawable referenced from a draw interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawableRef {
    pub drawable: RawDrawableHandle,
    /// Which of the drawable's span groups belongs to this interface.
    pub di_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DrawInterface {
    pub disabled: bool,
    pub drawables: Vec<DrawableRef>,
}

#[derive(Debug, Clone, Default)]
pub struct SceneObject {
    pub draw: Option<DrawInterface>,
}

/// Storage for scene objects and drawables.
///
/// Drawables may be reserved before they finish loading; lookups of unloaded drawables
/// return `None`.
#[derive(Debug, Default)]
pub struct Scene {
    drawables: Vec<Option<Drawable>>,
    objects: Vec<Option<SceneObject>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a handle for a drawable that has not been loaded yet.
    pub fn reserve_drawable(&mut self) -> RawDrawableHandle {
        self.drawables.push(None);
        RawResourceHandle::new(self.drawables.len() - 1)
    }

    pub fn load_drawable(&mut self, handle: RawDrawableHandle, drawable: Drawable) {
        if handle.idx >= self.drawables.len() {
            self.drawables.resize_with(handle.idx + 1, || None);
        }
        self.drawables[handle.idx] = Some(drawable);
    }

    pub fn add_drawable(&mut self, drawable: Drawable) -> RawDrawableHandle {
        let handle = self.reserve_drawable();
        self.load_drawable(handle, drawable);
        handle
    }

    pub fn unload_drawable(&mut self, handle: RawDrawableHandle) -> Option<Drawable> {
        self.drawables.get_mut(handle.idx).and_then(Option::take)
    }

    pub fn drawable(&self, handle: RawDrawableHandle) -> Option<&Drawable> {
        self.drawables.get(handle.idx).and_then(Option::as_ref)
    }

    pub fn drawable_mut(&mut self, handle: RawDrawableHandle) -> Option<&mut Drawable> {
        self.drawables.get_mut(handle.idx).and_then(Option::as_mut)
    }

    pub fn add_object(&mut self, object: SceneObject) -> RawSceneObjectHandle {
        self.objects.push(Some(object));
        RawResourceHandle::new(self.objects.len() - 1)
    }

    pub fn remove_object(&mut self, handle: RawSceneObjectHandle) -> Option<SceneObject> {
        self.objects.get_mut(handle.idx).and_then(Option::take)
    }

    pub fn object(&self, handle: RawSceneObjectHandle) -> Option<&SceneObject> {
        self.objects.get(handle.idx).and_then(Option::as_ref)
    }

    pub fn object_mut(&mut self, handle: RawSceneObjectHandle) -> Option<&mut SceneObject> {
        self.objects.get_mut(handle.idx).and_then(Option::as_mut)
    }

    pub fn span(&self, drawable: RawDrawableHandle, index: u32) -> Option<&Span> {
        self.drawable(drawable)?.span(index)
    }

    pub fn span_mut(&mut self, drawable: RawDrawableHandle, index: u32) -> Option<&mut Span> {
        self.drawable_mut(drawable)?.span_mut(index)
    }

    /// Iterates every loaded drawable.
    pub fn drawables_mut(&mut self) -> impl Iterator<Item = (RawDrawableHandle, &mut Drawable)> {
        self.drawables
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, d)| d.as_mut().map(|d| (RawResourceHandle::new(idx), d)))
    }
}
