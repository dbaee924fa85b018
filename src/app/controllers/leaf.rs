//! Gemeinsame Buchführung aller Controller mit genau einer Ressource.

use crate::app::controller::{LayerError, SyncContext};
use crate::app::load::{FinishedLoad, PendingLoad, Ticket};
use crate::core::LayerId;
use crate::render::{DrawSlot, FlyTarget, Placement, ResourceId, ResourceRequest, StackTarget};

/// Eine Ressource in einem Stack plus das Ticket des jüngsten Ladevorgangs.
#[derive(Debug, Clone)]
pub struct LeafResource {
    slot: DrawSlot,
    pending: Option<Ticket>,
}

impl LeafResource {
    pub fn new(target: StackTarget) -> Self {
        Self {
            slot: DrawSlot::new(target),
            pending: None,
        }
    }

    pub fn resource(&self) -> Option<ResourceId> {
        self.slot.resource()
    }

    pub fn target(&self) -> StackTarget {
        self.slot.target()
    }

    /// `true`, solange ein Ladevorgang aussteht.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.slot.set_placement(placement);
    }

    /// Startet einen Ladevorgang; ältere Tickets werden damit ungültig.
    pub fn start(
        &mut self,
        layer: &LayerId,
        request: ResourceRequest,
        ctx: &mut SyncContext<'_>,
    ) -> PendingLoad {
        let ticket = ctx.tickets.issue();
        if let Some(previous) = self.pending.replace(ticket) {
            log::debug!("Layer '{}': {} ersetzt {}", layer, ticket, previous);
        }
        PendingLoad::new(layer.clone(), ticket, request)
    }

    /// Hängt ein Ladeergebnis ein.
    ///
    /// Liefert `None`, wenn das Ergebnis veraltet war und verworfen wurde.
    /// Bei einem Ladefehler bleibt die bisherige Ressource eingehängt.
    pub fn accept(
        &mut self,
        layer: &LayerId,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Option<(ResourceId, usize)>, LayerError> {
        if !path.is_empty() {
            ctx.discard(load);
            return Err(LayerError::UnknownPath {
                layer: layer.clone(),
                path: path.to_vec(),
            });
        }
        if self.pending != Some(load.ticket) {
            log::debug!("Layer '{}': veraltetes Ergebnis {} verworfen", layer, load.ticket);
            ctx.discard(load);
            return Ok(None);
        }
        self.pending = None;

        let loaded = load.result.map_err(|source| LayerError::Load {
            layer: layer.clone(),
            source,
        })?;
        let id = ctx.viewer.instantiate(loaded);
        match self.slot.attach(&mut *ctx.viewer, id) {
            Ok(index) => {
                log::info!(
                    "Layer '{}': {} an Position {} in {}",
                    layer,
                    id,
                    index,
                    self.slot.target()
                );
                Ok(Some((id, index)))
            }
            Err(source) => {
                ctx.viewer.destroy(id);
                Err(LayerError::DrawOrder {
                    layer: layer.clone(),
                    source,
                })
            }
        }
    }

    /// Gibt die Ressource frei; laufende Ladevorgänge werden damit veraltet.
    pub fn release(&mut self, ctx: &mut SyncContext<'_>) {
        self.pending = None;
        self.slot.release(&mut *ctx.viewer);
    }

    pub fn fly_to(&self, ctx: &mut SyncContext<'_>) {
        if let Some(id) = self.slot.resource() {
            ctx.viewer.fly_to(FlyTarget::Resource(id));
        }
    }

    pub fn raise_to_top(&self, ctx: &mut SyncContext<'_>) {
        self.slot.raise_to_top(&mut *ctx.viewer);
    }

    pub fn resources(&self) -> Vec<ResourceId> {
        self.slot.resource().into_iter().collect()
    }
}
