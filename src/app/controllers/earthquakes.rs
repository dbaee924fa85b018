//! Controller für Erdbeben-Kataloge (zeitgestempelte Punkte).

use super::leaf::LeafResource;
use crate::app::controller::{LayerError, LayerKind, SyncContext, SyncFailure};
use crate::app::load::{Completion, FinishedLoad, PendingLoad};
use crate::core::{EarthquakesDetail, Layer, WatchPass};
use crate::render::{ResourceId, ResourceRequest, StackTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarthquakesReaction {
    Opacity,
    Visibility,
}

#[derive(Debug, Clone)]
pub struct EarthquakesKind {
    leaf: LeafResource,
}

impl Default for EarthquakesKind {
    fn default() -> Self {
        Self {
            leaf: LeafResource::new(StackTarget::DataSources),
        }
    }
}

impl LayerKind for EarthquakesKind {
    type Detail = EarthquakesDetail;
    type Reaction = EarthquakesReaction;

    fn register(layer: &Layer<EarthquakesDetail>, pass: &mut WatchPass<'_, EarthquakesReaction>) {
        pass.watch("source", &layer.detail.source);
        pass.react("opacity", layer.opacity, EarthquakesReaction::Opacity);
        pass.react("visible", layer.is_visible, EarthquakesReaction::Visibility);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<EarthquakesDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let request = ResourceRequest::Events {
            locator: layer.detail.source.resolve(),
            style: ctx.options.earthquakes.clone(),
        };
        Ok(vec![self.leaf.start(&layer.id, request, ctx)])
    }

    fn complete(
        &mut self,
        layer: &Layer<EarthquakesDetail>,
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
        layer: &Layer<EarthquakesDetail>,
        reaction: EarthquakesReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        if let Some(id) = self.leaf.resource() {
            match reaction {
                EarthquakesReaction::Opacity => ctx.viewer.set_alpha(id, layer.opacity),
                EarthquakesReaction::Visibility => ctx.viewer.set_show(id, layer.is_visible),
            }
        }
        Ok(Vec::new())
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.leaf.release(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<EarthquakesDetail>, ctx: &mut SyncContext<'_>) {
        self.leaf.fly_to(ctx);
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        self.leaf.raise_to_top(ctx);
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.leaf.resources()
    }
}
