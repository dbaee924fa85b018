//! Lade-Tickets: Buchführung über laufende `addToViewer`-Ladevorgänge.
//!
//! Controller warten nie selbst. Jeder Ladevorgang wird als [`PendingLoad`]
//! mit einem im ganzen Controller-Baum eindeutigen [`Ticket`] an den
//! Orchestrator gegeben, der das Ergebnis per `complete` zurückreicht.

use crate::core::LayerId;
use crate::render::{LoadError, LoadedResource, ResourceId, ResourceRequest};

/// Generation eines Ladevorgangs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monoton steigender Ticket-Zähler.
#[derive(Debug, Default)]
pub struct TicketCounter {
    last: u64,
}

impl TicketCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> Ticket {
        self.last += 1;
        Ticket(self.last)
    }
}

/// Ein gestarteter, noch nicht abgeschlossener Ladevorgang.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    /// Layer, dessen Controller-Baum den Vorgang gestartet hat
    pub layer: LayerId,
    /// Schlüssel der Kind-Controller, von außen nach innen
    pub path: Vec<String>,
    pub ticket: Ticket,
    pub request: ResourceRequest,
}

impl PendingLoad {
    pub fn new(layer: LayerId, ticket: Ticket, request: ResourceRequest) -> Self {
        Self {
            layer,
            path: Vec::new(),
            ticket,
            request,
        }
    }

    /// Ordnet den Vorgang einem Kind-Controller unter `key` zu.
    pub fn nested(mut self, layer: &LayerId, key: &str) -> Self {
        self.layer = layer.clone();
        self.path.insert(0, key.to_string());
        self
    }
}

/// Ordnet eine Liste von Ladevorgängen einem Kind zu.
pub fn nest(loads: Vec<PendingLoad>, layer: &LayerId, key: &str) -> Vec<PendingLoad> {
    loads
        .into_iter()
        .map(|load| load.nested(layer, key))
        .collect()
}

/// Ergebnis eines Ladevorgangs auf dem Weg zurück zum Controller.
#[derive(Debug)]
pub struct FinishedLoad {
    pub ticket: Ticket,
    pub result: Result<LoadedResource, LoadError>,
}

/// Was mit einem Ladeergebnis geschehen ist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Eingehängt an `index` im Ziel-Stack
    Attached { resource: ResourceId, index: usize },
    /// Veraltet oder Controller entfernt; Ergebnis freigegeben
    Discarded,
}

/// Rückgabe von `complete`.
#[derive(Debug)]
pub struct Completion {
    pub outcome: LoadOutcome,
    /// Folge-Ladevorgänge (z.B. Band nach Terrain)
    pub follow_up: Vec<PendingLoad>,
}

impl Completion {
    pub fn discarded() -> Self {
        Self {
            outcome: LoadOutcome::Discarded,
            follow_up: Vec::new(),
        }
    }

    pub fn attached(resource: ResourceId, index: usize) -> Self {
        Self {
            outcome: LoadOutcome::Attached { resource, index },
            follow_up: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ImageryProvider;

    #[test]
    fn tickets_are_unique_and_increasing() {
        let mut counter = TicketCounter::new();
        let a = counter.issue();
        let b = counter.issue();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn nesting_prefixes_path_and_rebinds_layer() {
        let mut counter = TicketCounter::new();
        let load = PendingLoad::new(
            LayerId::from("child"),
            counter.issue(),
            ResourceRequest::Imagery {
                provider: ImageryProvider::UrlTemplate { url: "u".into() },
                max_level: None,
                credit: String::new(),
            },
        );
        let nested = nest(vec![load], &LayerId::from("tiff"), "band");
        let nested = nest(nested, &LayerId::from("root"), "outer");
        assert_eq!(nested[0].layer, LayerId::from("root"));
        assert_eq!(nested[0].path, vec!["outer".to_string(), "band".to_string()]);
    }
}
