//! LayerCommand-Enum für den Datenfluss vom UI zum Layer-Service.

use serde::{Deserialize, Serialize};

use crate::core::{AnyLayer, LayerId, LayerUpdate};

/// Mutierende Commands auf dem Layer-Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum LayerCommand {
    /// Layer-Definition registrieren (noch nicht angezeigt)
    Register { layer: AnyLayer },
    /// Layer anzeigen und zuoberst einreihen
    Activate { id: LayerId },
    /// Layer entfernen und auf die Definition zurücksetzen
    Deactivate { id: LayerId },
    /// Teil-Aktualisierung eines Layers
    Update { id: LayerId, patch: LayerUpdate },
    /// Layer in der aktiven Liste verschieben (positiv = nach unten)
    Move { id: LayerId, difference: i64 },
    /// Kamera auf den Layer ausrichten
    ZoomIntoView { id: LayerId },
    /// Layer zuoberst zeichnen
    MoveToTop { id: LayerId },
}

impl LayerCommand {
    /// Betroffener Layer.
    pub fn layer_id(&self) -> &LayerId {
        match self {
            Self::Register { layer } => &layer.id,
            Self::Activate { id }
            | Self::Deactivate { id }
            | Self::Update { id, .. }
            | Self::Move { id, .. }
            | Self::ZoomIntoView { id }
            | Self::MoveToTop { id } => id,
        }
    }
}
