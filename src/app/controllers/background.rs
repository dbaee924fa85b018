//! Hintergrund-Composite: die Raster-Kinder der aktiven Variante.
//!
//! Deckkraft und Sichtbarkeit wirken zentral über die Transluzenz des
//! Globus. Die Kinder selbst sind immer voll sichtbar.

use indexmap::IndexMap;

use super::wmts::WmtsKind;
use super::ChildMode;
use crate::app::controller::{
    LayerController, LayerError, LayerKind, SyncContext, SyncFailure,
};
use crate::app::load::{nest, Completion, FinishedLoad, PendingLoad};
use crate::core::{BackgroundDetail, Layer, LayerId, WatchPass};
use crate::render::{draw_order, Anchor, FlyTarget, Placement, ResourceId, StackTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundReaction {
    Opacity,
    Visibility,
}

#[derive(Debug)]
pub struct BackgroundKind {
    /// Kinder in Zeichenreihenfolge, unterstes zuerst
    children: IndexMap<LayerId, LayerController<WmtsKind>>,
    /// Wo die Kinder im Imagery-Stack eingefügt werden
    anchor: Anchor,
}

impl Default for BackgroundKind {
    fn default() -> Self {
        Self {
            children: IndexMap::new(),
            anchor: Anchor::Bottom,
        }
    }
}

impl BackgroundKind {
    pub fn children(&self) -> impl Iterator<Item = &LayerController<WmtsKind>> {
        self.children.values()
    }

    pub fn child_ids(&self) -> Vec<LayerId> {
        self.children.keys().cloned().collect()
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    fn remove_children(&mut self, ctx: &mut SyncContext<'_>) {
        for child in self.children.values_mut() {
            child.remove(ctx);
        }
        self.children.clear();
    }

    fn apply_translucency(layer: &Layer<BackgroundDetail>, ctx: &mut SyncContext<'_>) {
        let alpha = layer.effective_opacity();
        ctx.viewer.set_globe_translucency(alpha != 1.0, alpha);
    }
}

impl LayerKind for BackgroundKind {
    type Detail = BackgroundDetail;
    type Reaction = BackgroundReaction;

    fn register(layer: &Layer<BackgroundDetail>, pass: &mut WatchPass<'_, BackgroundReaction>) {
        let children = layer.detail.active_children().map(|children| {
            children
                .iter()
                .map(LayerId::as_str)
                .collect::<Vec<_>>()
        });
        pass.watch("active_variant", layer.detail.active_variant.as_str());
        pass.watch("children", children);
        pass.react("opacity", layer.opacity, BackgroundReaction::Opacity);
        pass.react("visible", layer.is_visible, BackgroundReaction::Visibility);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<BackgroundDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let child_ids =
            layer
                .detail
                .active_children()
                .ok_or_else(|| LayerError::UnknownVariant {
                    layer: layer.id.clone(),
                    variant: layer.detail.active_variant.clone(),
                })?;
        if child_ids.is_empty() {
            return Err(LayerError::EmptyComposite {
                layer: layer.id.clone(),
            });
        }

        // Alle Kinder auflösen, bevor die bisherigen entfernt werden.
        let mut child_layers = Vec::with_capacity(child_ids.len());
        for child_id in child_ids {
            let base = ctx
                .catalog
                .raster_layer(child_id)
                .ok_or_else(|| LayerError::UnknownChild {
                    layer: layer.id.clone(),
                    child: child_id.clone(),
                })?;
            child_layers.push(ChildMode::Embedded.adjust(layer, base));
        }

        let current = self.resources();
        if let Some(anchor) = ctx
            .viewer
            .stack(StackTarget::Imagery)
            .and_then(|stack| draw_order::anchor_below(stack, &current))
        {
            self.anchor = anchor;
        }
        self.remove_children(ctx);

        let mut loads = Vec::new();
        for child_layer in child_layers {
            let child_id = child_layer.id.clone();
            if self.children.contains_key(&child_id) {
                log::warn!(
                    "Hintergrund '{}': Kind '{}' mehrfach in Variante, ignoriert",
                    layer.id,
                    child_id
                );
                continue;
            }
            let mut child = LayerController::<WmtsKind>::new(child_layer)?;
            loads.extend(nest(child.add(ctx)?, &layer.id, child_id.as_str()));
            self.children.insert(child_id, child);
        }

        Self::apply_translucency(layer, ctx);
        log::info!(
            "Hintergrund '{}': Variante '{}' mit {} Kindern",
            layer.id,
            layer.detail.active_variant,
            self.children.len()
        );
        Ok(loads)
    }

    fn complete(
        &mut self,
        layer: &Layer<BackgroundDetail>,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        let Some((key, rest)) = path.split_first() else {
            ctx.discard(load);
            return Err(LayerError::UnknownPath {
                layer: layer.id.clone(),
                path: path.to_vec(),
            });
        };
        let Some(position) = self.children.get_index_of(&LayerId::from(key.as_str())) else {
            log::debug!("Hintergrund '{}': Kind '{}' nicht mehr aktiv", layer.id, key);
            ctx.discard(load);
            return Ok(Completion::discarded());
        };

        // Bereits eingehängte Geschwister darunter bestimmen den Rang.
        let rank = self
            .children
            .values()
            .take(position)
            .filter(|child| child.kind().resource().is_some())
            .count();
        let anchor = self.anchor;
        let Some((_, child)) = self.children.get_index_mut(position) else {
            ctx.discard(load);
            return Ok(Completion::discarded());
        };
        child
            .kind_mut()
            .set_placement(Placement::Anchored { anchor, rank });
        child.complete(rest, load, ctx)
    }

    fn react(
        &mut self,
        layer: &Layer<BackgroundDetail>,
        _reaction: BackgroundReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        Self::apply_translucency(layer, ctx);
        Ok(Vec::new())
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.remove_children(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<BackgroundDetail>, ctx: &mut SyncContext<'_>) {
        ctx.viewer.fly_to(FlyTarget::View(ctx.options.default_view));
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        for child in self.children.values() {
            child.move_to_top(ctx);
        }
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.children
            .values()
            .flat_map(|child| child.resources())
            .collect()
    }
}
