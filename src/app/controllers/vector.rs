//! Controller für KML- und GeoJSON-Overlays.

use super::leaf::LeafResource;
use crate::app::controller::{LayerError, LayerKind, SyncContext, SyncFailure};
use crate::app::load::{Completion, FinishedLoad, PendingLoad};
use crate::core::{Layer, VectorDetail, WatchPass};
use crate::render::{ResourceId, ResourceRequest, StackTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorReaction {
    Opacity,
    Visibility,
}

#[derive(Debug, Clone)]
pub struct VectorKind {
    leaf: LeafResource,
}

impl Default for VectorKind {
    fn default() -> Self {
        Self {
            leaf: LeafResource::new(StackTarget::DataSources),
        }
    }
}

impl LayerKind for VectorKind {
    type Detail = VectorDetail;
    type Reaction = VectorReaction;

    fn register(layer: &Layer<VectorDetail>, pass: &mut WatchPass<'_, VectorReaction>) {
        let detail = &layer.detail;
        pass.watch("source", &detail.source);
        pass.watch("format", detail.format.as_str());
        pass.watch("clamp_to_ground", detail.clamp_to_ground);
        pass.react("opacity", layer.opacity, VectorReaction::Opacity);
        pass.react("visible", layer.is_visible, VectorReaction::Visibility);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<VectorDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let request = ResourceRequest::Vector {
            locator: layer.detail.source.resolve(),
            format: layer.detail.format,
            clamp_to_ground: layer.detail.clamp_to_ground,
        };
        Ok(vec![self.leaf.start(&layer.id, request, ctx)])
    }

    fn complete(
        &mut self,
        layer: &Layer<VectorDetail>,
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
        layer: &Layer<VectorDetail>,
        reaction: VectorReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        if let Some(id) = self.leaf.resource() {
            match reaction {
                VectorReaction::Opacity => ctx.viewer.set_alpha(id, layer.opacity),
                VectorReaction::Visibility => ctx.viewer.set_show(id, layer.is_visible),
            }
        }
        Ok(Vec::new())
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.leaf.release(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<VectorDetail>, ctx: &mut SyncContext<'_>) {
        self.leaf.fly_to(ctx);
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        self.leaf.raise_to_top(ctx);
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.leaf.resources()
    }
}
