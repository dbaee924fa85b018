//! Controller für 3D-Tilesets.

use super::leaf::LeafResource;
use crate::app::controller::{LayerError, LayerKind, SyncContext, SyncFailure};
use crate::app::load::{Completion, FinishedLoad, PendingLoad};
use crate::core::{Layer, Tiles3dDetail, WatchPass};
use crate::render::{Placement, ResourceId, ResourceRequest, StackTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tiles3dReaction {
    Opacity,
    Visibility,
}

#[derive(Debug, Clone)]
pub struct Tiles3dKind {
    leaf: LeafResource,
}

impl Default for Tiles3dKind {
    fn default() -> Self {
        Self {
            leaf: LeafResource::new(StackTarget::Primitives),
        }
    }
}

impl Tiles3dKind {
    pub fn resource(&self) -> Option<ResourceId> {
        self.leaf.resource()
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.leaf.set_placement(placement);
    }
}

impl LayerKind for Tiles3dKind {
    type Detail = Tiles3dDetail;
    type Reaction = Tiles3dReaction;

    fn register(layer: &Layer<Tiles3dDetail>, pass: &mut WatchPass<'_, Tiles3dReaction>) {
        pass.watch("source", &layer.detail.source);
        pass.watch(
            "partially_transparent",
            layer.detail.is_partially_transparent,
        );
        pass.react("opacity", layer.opacity, Tiles3dReaction::Opacity);
        pass.react("visible", layer.is_visible, Tiles3dReaction::Visibility);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<Tiles3dDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let request = ResourceRequest::Tileset {
            locator: layer.detail.source.resolve(),
            max_screen_space_error: ctx.options.tileset_max_screen_space_error,
            partially_transparent: layer.detail.is_partially_transparent,
        };
        Ok(vec![self.leaf.start(&layer.id, request, ctx)])
    }

    fn complete(
        &mut self,
        layer: &Layer<Tiles3dDetail>,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        let Some((resource, index)) = self.leaf.accept(&layer.id, path, load, ctx)? else {
            return Ok(Completion::discarded());
        };
        ctx.viewer.set_alpha(resource, layer.opacity);
        ctx.viewer.set_show(resource, layer.is_visible);
        Ok(Completion::attached(resource, index))
    }

    fn react(
        &mut self,
        layer: &Layer<Tiles3dDetail>,
        reaction: Tiles3dReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        if let Some(id) = self.leaf.resource() {
            match reaction {
                Tiles3dReaction::Opacity => ctx.viewer.set_alpha(id, layer.opacity),
                Tiles3dReaction::Visibility => ctx.viewer.set_show(id, layer.is_visible),
            }
        }
        Ok(Vec::new())
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.leaf.release(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<Tiles3dDetail>, ctx: &mut SyncContext<'_>) {
        self.leaf.fly_to(ctx);
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        self.leaf.raise_to_top(ctx);
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.leaf.resources()
    }
}
