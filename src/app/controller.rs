//! Basis-Controller: übersetzt einen Layer in lebende Ressourcen der Render-Engine.
//!
//! Der generische [`LayerController`] kümmert sich um Lebenszyklus und
//! Change-Detection; die Layer-Art liefert über [`LayerKind`] nur die
//! Watch-Registrierung, das Laden und die Reaktionen.

use thiserror::Error;

use super::load::{nest, Completion, FinishedLoad, PendingLoad, TicketCounter};
use crate::core::{
    Catalog, ChangeDetector, KindDetail, Layer, LayerId, LayerType, UpdateError, WatchError,
    WatchPass,
};
use crate::render::{DrawOrderError, LoadError, ResourceId, Viewer};
use crate::shared::SyncOptions;

/// Fehler eines Layer-Controllers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    // ── Konfiguration ───────────────────────────────────────────────
    #[error("Layer '{layer}': Kind-Layer '{child}' nicht im Katalog")]
    UnknownChild { layer: LayerId, child: LayerId },
    #[error("Layer '{layer}': unbekannte Variante '{variant}'")]
    UnknownVariant { layer: LayerId, variant: String },
    #[error("Layer '{layer}': Band {index} ungültig oder ohne Darstellung")]
    InvalidBand { layer: LayerId, index: usize },
    #[error("Layer '{layer}': Mapping-Schlüssel '{key}' mehrfach vorhanden")]
    DuplicateMappingKey { layer: LayerId, key: String },
    #[error("Layer '{layer}': kein Mapping für Datenschlüssel '{key}'")]
    MissingMapping { layer: LayerId, key: String },
    #[error("Layer '{layer}' ist kein {expected}, sondern {found}")]
    KindMismatch {
        layer: LayerId,
        expected: LayerType,
        found: LayerType,
    },
    #[error(transparent)]
    Update(#[from] UpdateError),

    // ── Laden ───────────────────────────────────────────────────────
    #[error("Layer '{layer}': Laden fehlgeschlagen: {source}")]
    Load { layer: LayerId, source: LoadError },

    // ── Invarianten ─────────────────────────────────────────────────
    #[error("Layer '{layer}': Composite ohne Kinder")]
    EmptyComposite { layer: LayerId },
    #[error("Layer '{layer}' wurde bereits entfernt")]
    Removed { layer: LayerId },
    #[error("Layer '{layer}': {source}")]
    Watch { layer: LayerId, source: WatchError },
    #[error("Layer '{layer}': {source}")]
    DrawOrder {
        layer: LayerId,
        source: DrawOrderError,
    },
    #[error("Layer '{layer}': Ladeergebnis für unbekannten Pfad {path:?}")]
    UnknownPath { layer: LayerId, path: Vec<String> },
}

impl LayerError {
    /// `true` für Lade-Fehler, nach denen die vorherige Ressource weiterläuft.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Load { .. })
    }
}

/// Fehlgeschlagene Synchronisation.
///
/// Bereits gestartete Ladevorgänge bleiben gültig und müssen trotzdem
/// abgeschlossen werden, sonst bleiben ihre Tickets offen.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SyncFailure {
    pub error: LayerError,
    pub loads: Vec<PendingLoad>,
}

impl SyncFailure {
    /// Ordnet die gestarteten Ladevorgänge einem Kind zu.
    pub fn nested(self, layer: &LayerId, key: &str) -> Self {
        Self {
            error: self.error,
            loads: nest(self.loads, layer, key),
        }
    }
}

impl From<LayerError> for SyncFailure {
    fn from(error: LayerError) -> Self {
        Self {
            error,
            loads: Vec::new(),
        }
    }
}

/// Alles, was ein Controller während einer Operation braucht.
pub struct SyncContext<'a> {
    pub viewer: &'a mut dyn Viewer,
    pub catalog: &'a dyn Catalog,
    pub options: &'a SyncOptions,
    pub tickets: &'a mut TicketCounter,
}

impl SyncContext<'_> {
    /// Gibt ein nicht mehr benötigtes Ladeergebnis frei.
    pub fn discard(&mut self, load: FinishedLoad) {
        match load.result {
            Ok(loaded) => self.viewer.discard(loaded),
            Err(e) => log::debug!("Veralteter Ladefehler ignoriert ({}): {}", load.ticket, e),
        }
    }
}

/// Art-spezifischer Teil eines Controllers.
///
/// `add_to_viewer` darf beliebig oft aufgerufen werden und ersetzt jedes Mal
/// alle bisherigen Ressourcen. `remove_from_viewer` muss auf einem leeren
/// Controller ein No-Op sein.
pub trait LayerKind {
    type Detail: KindDetail;
    type Reaction: Copy + std::fmt::Debug;

    /// Die geordneten Watch-Deklarationen dieser Art.
    fn register(layer: &Layer<Self::Detail>, pass: &mut WatchPass<'_, Self::Reaction>);

    /// Startet das (Neu-)Laden aller Ressourcen.
    fn add_to_viewer(
        &mut self,
        layer: &Layer<Self::Detail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError>;

    /// Übernimmt ein Ladeergebnis; `path` adressiert Kind-Controller.
    fn complete(
        &mut self,
        layer: &Layer<Self::Detail>,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError>;

    /// Wendet eine Reaktion auf die lebende Ressource an.
    fn react(
        &mut self,
        layer: &Layer<Self::Detail>,
        reaction: Self::Reaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure>;

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>);

    fn zoom_into_view(&self, layer: &Layer<Self::Detail>, ctx: &mut SyncContext<'_>);

    fn move_to_top(&self, ctx: &mut SyncContext<'_>);

    /// Alle eingehängten Ressourcen, unterste zuerst.
    fn resources(&self) -> Vec<ResourceId>;
}

/// Lebenszyklus eines Controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Konstruiert, aber noch nicht hinzugefügt
    Detached,
    Live,
    /// Endzustand
    Removed,
}

/// Zähler für Reloads und Reaktionen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Aufrufe von `add_to_viewer`
    pub reloads: usize,
    pub reactions: usize,
    /// Aufrufe von `remove_from_viewer`
    pub removals: usize,
}

/// Generischer Layer-Controller.
#[derive(Debug)]
pub struct LayerController<K: LayerKind> {
    layer: Layer<K::Detail>,
    kind: K,
    detector: ChangeDetector,
    state: ControllerState,
    stats: ControllerStats,
    /// Letzter Reload schlug vor dem Laden fehl
    reload_failed: bool,
}

impl<K: LayerKind + Default> LayerController<K> {
    /// Erstellt einen Controller; die Watch-Slots werden dabei registriert.
    pub fn new(layer: Layer<K::Detail>) -> Result<Self, LayerError> {
        Self::with_kind(layer, K::default())
    }
}

impl<K: LayerKind> LayerController<K> {
    pub fn with_kind(layer: Layer<K::Detail>, kind: K) -> Result<Self, LayerError> {
        let mut detector = ChangeDetector::new();
        detector
            .run(|pass| K::register(&layer, pass))
            .map_err(|source| LayerError::Watch {
                layer: layer.id.clone(),
                source,
            })?;

        Ok(Self {
            layer,
            kind,
            detector,
            state: ControllerState::Detached,
            stats: ControllerStats::default(),
            reload_failed: false,
        })
    }

    /// Aktueller Layer.
    pub fn layer(&self) -> &Layer<K::Detail> {
        &self.layer
    }

    pub fn id(&self) -> &LayerId {
        &self.layer.id
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut K {
        &mut self.kind
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn resources(&self) -> Vec<ResourceId> {
        self.kind.resources()
    }

    /// Fügt den Layer der Render-Engine hinzu (höchstens einmal).
    pub fn add(&mut self, ctx: &mut SyncContext<'_>) -> Result<Vec<PendingLoad>, LayerError> {
        match self.state {
            ControllerState::Live => {
                log::debug!("Layer '{}' ist bereits hinzugefügt", self.layer.id);
                Ok(Vec::new())
            }
            ControllerState::Removed => Err(self.removed_error()),
            ControllerState::Detached => {
                let loads = self.reload(ctx)?;
                self.state = ControllerState::Live;
                Ok(loads)
            }
        }
    }

    /// Übernimmt einen neuen Layer und synchronisiert die Render-Engine.
    ///
    /// Vor `add` werden die Werte nur vermerkt. Scheitert der Reload, laufen
    /// die Reaktionen trotzdem auf den noch eingehängten Ressourcen.
    pub fn update(
        &mut self,
        layer: Layer<K::Detail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        if self.state == ControllerState::Removed {
            return Err(self.removed_error().into());
        }

        self.layer = layer;
        let current = &self.layer;
        let outcome = self
            .detector
            .run(|pass| K::register(current, pass))
            .map_err(|source| LayerError::Watch {
                layer: current.id.clone(),
                source,
            })?;

        if self.state == ControllerState::Detached {
            return Ok(Vec::new());
        }
        if outcome.is_unchanged() && !self.reload_failed {
            return Ok(Vec::new());
        }

        log::debug!(
            "Layer '{}': geändert {:?}, Reload: {}",
            self.layer.id,
            outcome.changed,
            outcome.needs_reload || self.reload_failed
        );

        let mut loads = Vec::new();
        let mut failure = None;
        if outcome.needs_reload || self.reload_failed {
            match self.reload(ctx) {
                Ok(started) => loads.extend(started),
                Err(e) => {
                    log::warn!("Layer '{}': Reload fehlgeschlagen: {}", self.layer.id, e);
                    failure = Some(e);
                }
            }
        }
        for reaction in outcome.reactions {
            self.stats.reactions += 1;
            match self.kind.react(&self.layer, reaction, ctx) {
                Ok(started) => loads.extend(started),
                Err(e) => {
                    loads.extend(e.loads);
                    failure.get_or_insert(e.error);
                }
            }
        }

        match failure {
            None => Ok(loads),
            Some(error) => Err(SyncFailure { error, loads }),
        }
    }

    /// Übernimmt ein Ladeergebnis; nach `remove` wird es verworfen.
    pub fn complete(
        &mut self,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        if self.state == ControllerState::Removed {
            log::debug!(
                "Layer '{}' bereits entfernt, verwerfe {}",
                self.layer.id,
                load.ticket
            );
            ctx.discard(load);
            return Ok(Completion::discarded());
        }
        self.kind.complete(&self.layer, path, load, ctx)
    }

    /// Gibt alle Ressourcen frei. Mehrfache Aufrufe sind erlaubt.
    pub fn remove(&mut self, ctx: &mut SyncContext<'_>) {
        if self.state == ControllerState::Removed {
            log::debug!("Layer '{}' wurde bereits entfernt", self.layer.id);
            return;
        }
        self.kind.remove_from_viewer(ctx);
        self.stats.removals += 1;
        self.state = ControllerState::Removed;
    }

    pub fn zoom_into_view(&self, ctx: &mut SyncContext<'_>) {
        if self.state == ControllerState::Live {
            self.kind.zoom_into_view(&self.layer, ctx);
        }
    }

    pub fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        if self.state == ControllerState::Live {
            self.kind.move_to_top(ctx);
        }
    }

    fn reload(&mut self, ctx: &mut SyncContext<'_>) -> Result<Vec<PendingLoad>, LayerError> {
        self.stats.reloads += 1;
        match self.kind.add_to_viewer(&self.layer, ctx) {
            Ok(loads) => {
                self.reload_failed = false;
                Ok(loads)
            }
            Err(e) => {
                self.reload_failed = true;
                Err(e)
            }
        }
    }

    fn removed_error(&self) -> LayerError {
        LayerError::Removed {
            layer: self.layer.id.clone(),
        }
    }
}
