//! Draw-Order-Manager: zentrale Buchführung über die geteilten Stacks.
//!
//! Alle Controller verändern die Draw-Order-Container ausschließlich über
//! dieses Modul. Die Funktionen arbeiten auf `&mut dyn DrawStack` und sind
//! damit ohne Render-Engine testbar.

use thiserror::Error;

use super::types::{ResourceId, StackTarget};
use super::viewer::{DrawStack, Viewer};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawOrderError {
    #[error("Draw-Order-Container {0} existiert nicht")]
    MissingStack(StackTarget),
    #[error("{id} liegt bereits im Stack {target}")]
    AlreadyPlaced { id: ResourceId, target: StackTarget },
}

/// Bezugspunkt für das Wiedereinfügen einer Gruppe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Ganz unten
    Bottom,
    /// Direkt über der Ressource `id`.
    ///
    /// Verschwindet `id` (z.B. weil ein fremder Layer neu lädt), gilt der
    /// beim Erfassen gültige Index `fallback`.
    Above { id: ResourceId, fallback: usize },
}

/// Wo eine neue Ressource eingefügt wird.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Top,
    /// Über dem Anker, plus `rank` bereits eingehängte Geschwister
    Anchored { anchor: Anchor, rank: usize },
}

impl Placement {
    /// Verankerte Erst-Einfügung, ohne Anker zuoberst.
    pub fn anchored_or_top(anchor: Option<Anchor>) -> Self {
        match anchor {
            Some(anchor) => Self::Anchored { anchor, rank: 0 },
            None => Self::Top,
        }
    }
}

/// Ermittelt den Einfüge-Index für eine Platzierung.
pub fn resolve_index(stack: &dyn DrawStack, placement: Placement) -> usize {
    match placement {
        Placement::Top => stack.len(),
        Placement::Anchored { anchor, rank } => {
            let base = match anchor {
                Anchor::Bottom => 0,
                Anchor::Above { id, fallback } => match stack.index_of(id) {
                    Some(index) => index + 1,
                    None => {
                        log::debug!("Anker {} nicht mehr im Stack, nutze Index {}", id, fallback);
                        fallback
                    }
                },
            };
            base.saturating_add(rank).min(stack.len())
        }
    }
}

/// Anker direkt unter der untersten der gegebenen Ressourcen.
///
/// `None`, wenn keine davon im Stack liegt.
pub fn anchor_below(stack: &dyn DrawStack, group: &[ResourceId]) -> Option<Anchor> {
    let lowest = group.iter().filter_map(|&id| stack.index_of(id)).min()?;
    Some(match lowest.checked_sub(1).and_then(|i| stack.get(i)) {
        Some(below) => Anchor::Above {
            id: below,
            fallback: lowest,
        },
        None => Anchor::Bottom,
    })
}

/// Fügt eine neue Ressource ein und liefert ihren Index.
pub fn insert(
    stack: &mut dyn DrawStack,
    target: StackTarget,
    id: ResourceId,
    placement: Placement,
) -> Result<usize, DrawOrderError> {
    if stack.index_of(id).is_some() {
        return Err(DrawOrderError::AlreadyPlaced { id, target });
    }
    let index = resolve_index(stack, placement);
    if index >= stack.len() {
        stack.add_top(id);
    } else {
        stack.add_at(id, index);
    }
    Ok(index)
}

/// Ersetzt `old` durch `new` am selben Index.
///
/// Fehlt `old` (z.B. extern entfernt), wird `new` gemäß `fallback` eingefügt.
pub fn replace(
    stack: &mut dyn DrawStack,
    target: StackTarget,
    old: ResourceId,
    new: ResourceId,
    fallback: Placement,
) -> Result<usize, DrawOrderError> {
    match stack.index_of(old) {
        Some(index) => {
            stack.remove(old);
            stack.add_at(new, index);
            Ok(index)
        }
        None => insert(stack, target, new, fallback),
    }
}

/// Hebt die Ressourcen in der gegebenen Reihenfolge (unterste zuerst) nach oben.
pub fn raise_group(stack: &mut dyn DrawStack, group: &[ResourceId]) {
    for &id in group {
        stack.raise_to_top(id);
    }
}

/// Position einer Controller-Ressource in einem Stack.
///
/// Hält die aktuell eingehängte Ressource und die Platzierung für die
/// nächste Erst-Einfügung. Eine Ersetzung behält immer den Index.
#[derive(Debug, Clone)]
pub struct DrawSlot {
    target: StackTarget,
    placement: Placement,
    resource: Option<ResourceId>,
}

impl DrawSlot {
    pub fn new(target: StackTarget) -> Self {
        Self {
            target,
            placement: Placement::Top,
            resource: None,
        }
    }

    pub fn target(&self) -> StackTarget {
        self.target
    }

    pub fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    /// Aktueller Index im Stack.
    pub fn index(&self, viewer: &dyn Viewer) -> Option<usize> {
        let id = self.resource?;
        viewer.stack(self.target)?.index_of(id)
    }

    /// Hängt `id` ein; eine vorherige Ressource wird am selben Index ersetzt
    /// und freigegeben.
    pub fn attach(&mut self, viewer: &mut dyn Viewer, id: ResourceId) -> Result<usize, DrawOrderError> {
        let target = self.target;
        let stack = viewer
            .stack_mut(target)
            .ok_or(DrawOrderError::MissingStack(target))?;
        let index = match self.resource {
            Some(old) => replace(stack, target, old, id, self.placement)?,
            None => insert(stack, target, id, self.placement)?,
        };
        if let Some(old) = self.resource.replace(id) {
            viewer.destroy(old);
        }
        Ok(index)
    }

    /// Entfernt die Ressource aus dem Stack und gibt sie frei.
    ///
    /// Auf einem leeren Slot ein No-Op.
    pub fn release(&mut self, viewer: &mut dyn Viewer) -> Option<ResourceId> {
        let id = self.resource.take()?;
        match viewer.stack_mut(self.target) {
            Some(stack) => {
                if !stack.remove(id) {
                    log::debug!("{} war nicht mehr in {}", id, self.target);
                }
            }
            None => log::debug!("Stack {} bereits verschwunden", self.target),
        }
        viewer.destroy(id);
        Some(id)
    }

    pub fn raise_to_top(&self, viewer: &mut dyn Viewer) {
        if let (Some(id), Some(stack)) = (self.resource, viewer.stack_mut(self.target)) {
            stack.raise_to_top(id);
        }
    }
}
