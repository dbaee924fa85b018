//! Layer-Service: verwaltet Definitionen, aktive Layer und ihre Controller.
//!
//! Die Liste der aktiven Layer ist oberster zuerst geordnet. Ladevorgänge
//! der Controller werden gesammelt und erst in [`LayerService::settle`]
//! über die Resource-Factory abgeschlossen.

use std::collections::VecDeque;

use anyhow::{bail, Context};
use indexmap::IndexMap;

use super::controller::{LayerError, SyncContext};
use super::controllers::AnyController;
use super::load::{FinishedLoad, LoadOutcome, PendingLoad, TicketCounter};
use super::{CommandLog, LayerCommand};
use crate::core::{AnyLayer, Catalog, LayerId, LayerUpdate, StaticCatalog};
use crate::render::{LoadError, LoadedResource, ResourceFactory, Viewer};
use crate::shared::SyncOptions;

/// Baut den Kontext aus disjunkten Feldern, damit `layers` frei bleibt.
macro_rules! sync_context {
    ($service:expr) => {
        SyncContext {
            viewer: &mut $service.viewer,
            catalog: &$service.catalog,
            options: &$service.options,
            tickets: &mut $service.tickets,
        }
    };
}

/// Registrierter Layer.
#[derive(Debug)]
struct LayerEntry {
    /// Ursprüngliche Definition
    definition: AnyLayer,
    /// Aktueller Zustand inkl. Updates
    state: AnyLayer,
    /// Nur für aktive Layer vorhanden
    controller: Option<AnyController>,
}

/// Ergebnis von [`LayerService::settle`].
#[derive(Debug, Default)]
pub struct SettleReport {
    pub attached: usize,
    pub discarded: usize,
    pub failures: Vec<(LayerId, LayerError)>,
}

impl SettleReport {
    /// `true`, wenn kein Ladevorgang fehlschlug.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Orchestriert Layer-Controller gegenüber einer Render-Engine.
pub struct LayerService<V: Viewer, F: ResourceFactory, C: Catalog = StaticCatalog> {
    viewer: V,
    factory: F,
    catalog: C,
    options: SyncOptions,
    tickets: TicketCounter,
    layers: IndexMap<LayerId, LayerEntry>,
    /// Aktive Layer, oberster zuerst
    active: Vec<LayerId>,
    pending: VecDeque<PendingLoad>,
    command_log: CommandLog,
}

impl<V: Viewer, F: ResourceFactory, C: Catalog> LayerService<V, F, C> {
    pub fn new(viewer: V, factory: F, catalog: C, options: SyncOptions) -> Self {
        let command_log = CommandLog::with_capacity(options.command_log_capacity);
        Self {
            viewer,
            factory,
            catalog,
            options,
            tickets: TicketCounter::new(),
            layers: IndexMap::new(),
            active: Vec::new(),
            pending: VecDeque::new(),
            command_log,
        }
    }

    // ── Zugriff ─────────────────────────────────────────────────────

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut V {
        &mut self.viewer
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn command_log(&self) -> &CommandLog {
        &self.command_log
    }

    /// Aktueller Zustand eines registrierten Layers.
    pub fn layer(&self, id: &LayerId) -> Option<&AnyLayer> {
        self.layers.get(id).map(|entry| &entry.state)
    }

    pub fn definition(&self, id: &LayerId) -> Option<&AnyLayer> {
        self.layers.get(id).map(|entry| &entry.definition)
    }

    pub fn controller(&self, id: &LayerId) -> Option<&AnyController> {
        self.layers
            .get(id)
            .and_then(|entry| entry.controller.as_ref())
    }

    /// Aktive Layer, oberster zuerst.
    pub fn active_layer_ids(&self) -> &[LayerId] {
        &self.active
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Führt einen Command aus und protokolliert ihn.
    pub fn handle_command(&mut self, command: LayerCommand) -> anyhow::Result<()> {
        self.command_log.record(&command);

        match command {
            LayerCommand::Register { layer } => self.register(layer),
            LayerCommand::Activate { id } => self.activate(&id),
            LayerCommand::Deactivate { id } => self.deactivate(&id),
            LayerCommand::Update { id, patch } => self.update(&id, &patch),
            LayerCommand::Move { id, difference } => self.move_layer(&id, difference),
            LayerCommand::ZoomIntoView { id } => self.zoom_into_view(&id),
            LayerCommand::MoveToTop { id } => self.move_to_top(&id),
        }
    }

    /// Registriert eine Layer-Definition.
    pub fn register(&mut self, layer: AnyLayer) -> anyhow::Result<()> {
        let id = layer.id.clone();
        if let Some(entry) = self.layers.get(&id) {
            if entry.controller.is_some() {
                bail!("Layer '{}' ist aktiv und kann nicht neu registriert werden", id);
            }
        }
        log::debug!("Layer '{}' registriert ({})", id, layer.kind());
        self.layers.insert(
            id,
            LayerEntry {
                definition: layer.clone(),
                state: layer,
                controller: None,
            },
        );
        Ok(())
    }

    /// Zeigt einen registrierten Layer an und reiht ihn zuoberst ein.
    pub fn activate(&mut self, id: &LayerId) -> anyhow::Result<()> {
        let mut ctx = sync_context!(self);
        let entry = self
            .layers
            .get_mut(id)
            .with_context(|| format!("Unbekannter Layer '{}'", id))?;
        if entry.controller.is_some() {
            log::debug!("Layer '{}' ist bereits aktiv", id);
            return Ok(());
        }

        let visible = entry
            .state
            .apply_update(&entry.definition, &LayerUpdate::visibility(true))?;
        let mut controller = AnyController::new(&visible)
            .with_context(|| format!("Layer '{}' konnte nicht erstellt werden", id))?;
        let loads = match controller.add(&mut ctx) {
            Ok(loads) => loads,
            Err(e) => {
                controller.remove(&mut ctx);
                return Err(e).with_context(|| format!("Layer '{}' konnte nicht aktiviert werden", id));
            }
        };

        entry.state = visible;
        entry.controller = Some(controller);
        self.active.insert(0, id.clone());
        self.pending.extend(loads);
        log::info!("Layer '{}' aktiviert", id);
        Ok(())
    }

    /// Entfernt den Controller und setzt den Layer auf seine Definition zurück.
    pub fn deactivate(&mut self, id: &LayerId) -> anyhow::Result<()> {
        let mut ctx = sync_context!(self);
        let entry = self
            .layers
            .get_mut(id)
            .with_context(|| format!("Unbekannter Layer '{}'", id))?;
        let Some(mut controller) = entry.controller.take() else {
            log::debug!("Layer '{}' ist nicht aktiv", id);
            return Ok(());
        };

        controller.remove(&mut ctx);
        entry.state = entry.definition.clone();
        self.active.retain(|active| active != id);
        log::info!("Layer '{}' deaktiviert", id);
        Ok(())
    }

    /// Wendet eine Teil-Aktualisierung an; aktive Controller werden synchronisiert.
    pub fn update(&mut self, id: &LayerId, patch: &LayerUpdate) -> anyhow::Result<()> {
        let mut ctx = sync_context!(self);
        let entry = self
            .layers
            .get_mut(id)
            .with_context(|| format!("Unbekannter Layer '{}'", id))?;

        let next = entry
            .state
            .apply_update(&entry.definition, patch)
            .with_context(|| format!("Update für Layer '{}' ungültig", id))?;
        entry.state = next;

        if let Some(controller) = entry.controller.as_mut() {
            match controller.update(&entry.state, &mut ctx) {
                Ok(loads) => self.pending.extend(loads),
                Err(failure) => {
                    // Gestartete Ladevorgänge gehören trotzdem in die Warteschlange.
                    self.pending.extend(failure.loads);
                    return Err(failure.error)
                        .with_context(|| format!("Layer '{}' konnte nicht synchronisiert werden", id));
                }
            }
        }
        Ok(())
    }

    /// Verschiebt einen aktiven Layer um `difference` Plätze (positiv = nach unten).
    ///
    /// Danach werden alle Controller von unten nach oben neu angehoben.
    pub fn move_layer(&mut self, id: &LayerId, difference: i64) -> anyhow::Result<()> {
        let index = self
            .active
            .iter()
            .position(|active| active == id)
            .with_context(|| format!("Layer '{}' ist nicht aktiv", id))?;

        let item = self.active.remove(index);
        let target = (index as i64)
            .saturating_add(difference)
            .clamp(0, self.active.len() as i64) as usize;
        self.active.insert(target, item);

        self.restack();
        Ok(())
    }

    pub fn zoom_into_view(&mut self, id: &LayerId) -> anyhow::Result<()> {
        let mut ctx = sync_context!(self);
        let controller = self
            .layers
            .get(id)
            .and_then(|entry| entry.controller.as_ref())
            .with_context(|| format!("Layer '{}' ist nicht aktiv", id))?;
        controller.zoom_into_view(&mut ctx);
        Ok(())
    }

    /// Zeichnet einen aktiven Layer zuoberst.
    pub fn move_to_top(&mut self, id: &LayerId) -> anyhow::Result<()> {
        let index = self
            .active
            .iter()
            .position(|active| active == id)
            .with_context(|| format!("Layer '{}' ist nicht aktiv", id))?;
        let item = self.active.remove(index);
        self.active.insert(0, item);

        let mut ctx = sync_context!(self);
        if let Some(controller) = self.layers.get(id).and_then(|entry| entry.controller.as_ref()) {
            controller.move_to_top(&mut ctx);
        }
        Ok(())
    }

    fn restack(&mut self) {
        let mut ctx = sync_context!(self);
        for id in self.active.iter().rev() {
            if let Some(controller) = self.layers.get(id).and_then(|entry| entry.controller.as_ref()) {
                controller.move_to_top(&mut ctx);
            }
        }
    }

    // ── Laden ───────────────────────────────────────────────────────

    /// Entnimmt alle ausstehenden Ladevorgänge (für eigene Scheduler).
    pub fn drain_pending(&mut self) -> Vec<PendingLoad> {
        self.pending.drain(..).collect()
    }

    /// Reicht ein Ladeergebnis an den zuständigen Controller.
    ///
    /// Folge-Ladevorgänge werden eingereiht.
    pub fn finish(
        &mut self,
        load: PendingLoad,
        result: Result<LoadedResource, LoadError>,
    ) -> Result<LoadOutcome, LayerError> {
        let PendingLoad {
            layer, path, ticket, ..
        } = load;
        let finished = FinishedLoad { ticket, result };

        let mut ctx = sync_context!(self);
        let Some(controller) = self
            .layers
            .get_mut(&layer)
            .and_then(|entry| entry.controller.as_mut())
        else {
            log::debug!("Layer '{}' nicht mehr aktiv, verwerfe {}", layer, ticket);
            ctx.discard(finished);
            return Ok(LoadOutcome::Discarded);
        };

        let completion = controller.complete(&path, finished, &mut ctx)?;
        self.pending.extend(completion.follow_up);
        Ok(completion.outcome)
    }

    /// Schließt alle ausstehenden Ladevorgänge nacheinander ab.
    ///
    /// Fehler werden pro Layer gesammelt; andere Layer laden weiter.
    pub async fn settle(&mut self) -> SettleReport {
        let mut report = SettleReport::default();
        while let Some(load) = self.pending.pop_front() {
            let result = self.factory.create(&load.request).await;
            let layer = load.layer.clone();
            match self.finish(load, result) {
                Ok(LoadOutcome::Attached { .. }) => report.attached += 1,
                Ok(LoadOutcome::Discarded) => report.discarded += 1,
                Err(e) => {
                    log::warn!("Layer '{}': {}", layer, e);
                    report.failures.push((layer, e));
                }
            }
        }
        log::debug!(
            "Ladevorgänge abgeschlossen: {} eingehängt, {} verworfen, {} fehlgeschlagen",
            report.attached,
            report.discarded,
            report.failures.len()
        );
        report
    }
}
