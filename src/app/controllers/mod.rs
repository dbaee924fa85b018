//! Controller je Layer-Art.
//!
//! - Blatt-Controller (`wmts`, `tiles3d`, `voxel`, `earthquakes`, `vector`)
//!   besitzen genau eine Ressource über [`leaf::LeafResource`].
//! - Composites (`background`, `tiff`) besitzen Kind-Controller.

pub mod background;
pub mod earthquakes;
pub mod leaf;
pub mod tiff;
pub mod tiles3d;
pub mod vector;
pub mod voxel;
pub mod wmts;

pub use background::BackgroundKind;
pub use earthquakes::EarthquakesKind;
pub use tiff::TiffKind;
pub use tiles3d::Tiles3dKind;
pub use vector::VectorKind;
pub use voxel::VoxelKind;
pub use wmts::WmtsKind;

use super::controller::{
    ControllerState, ControllerStats, LayerController, LayerError, SyncContext, SyncFailure,
};
use super::load::{Completion, FinishedLoad, PendingLoad};
use crate::core::{AnyLayer, KindDetail, Layer, LayerId, LayerType};
use crate::render::ResourceId;

/// Wie ein Kind-Layer Deckkraft und Sichtbarkeit bezieht.
///
/// Wird einmal beim Erstellen des Kindes festgelegt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMode {
    /// Übernimmt Deckkraft und Sichtbarkeit des Elternteils
    Standalone,
    /// Immer voll sichtbar; das Elternteil regelt die Darstellung zentral
    Embedded,
}

impl ChildMode {
    /// Setzt die gemeinsamen Darstellungsfelder eines Kind-Layers.
    pub fn adjust<P, D>(self, parent: &Layer<P>, mut child: Layer<D>) -> Layer<D> {
        match self {
            Self::Standalone => {
                child.opacity = parent.opacity;
                child.is_visible = parent.is_visible;
                child.can_update_opacity = parent.can_update_opacity;
            }
            Self::Embedded => {
                child.opacity = 1.0;
                child.is_visible = true;
                child.can_update_opacity = false;
            }
        }
        child
    }
}

fn typed<D: KindDetail>(layer: &AnyLayer) -> Result<Layer<D>, LayerError> {
    layer
        .downcast::<D>()
        .ok_or_else(|| LayerError::KindMismatch {
            layer: layer.id.clone(),
            expected: D::KIND,
            found: layer.kind(),
        })
}

/// Controller beliebiger Layer-Art.
#[derive(Debug)]
pub enum AnyController {
    Wmts(LayerController<WmtsKind>),
    Tiles3d(LayerController<Tiles3dKind>),
    Voxel(LayerController<VoxelKind>),
    Earthquakes(LayerController<EarthquakesKind>),
    Vector(LayerController<VectorKind>),
    Background(LayerController<BackgroundKind>),
    Tiff(LayerController<TiffKind>),
}

macro_rules! dispatch {
    ($value:expr, $controller:ident => $body:expr) => {
        match $value {
            AnyController::Wmts($controller) => $body,
            AnyController::Tiles3d($controller) => $body,
            AnyController::Voxel($controller) => $body,
            AnyController::Earthquakes($controller) => $body,
            AnyController::Vector($controller) => $body,
            AnyController::Background($controller) => $body,
            AnyController::Tiff($controller) => $body,
        }
    };
}

impl AnyController {
    /// Erstellt den passenden Controller für die Layer-Art.
    pub fn new(layer: &AnyLayer) -> Result<Self, LayerError> {
        Ok(match layer.kind() {
            LayerType::Wmts => Self::Wmts(LayerController::new(typed(layer)?)?),
            LayerType::Tiles3d => Self::Tiles3d(LayerController::new(typed(layer)?)?),
            LayerType::Voxel => Self::Voxel(LayerController::new(typed(layer)?)?),
            LayerType::Earthquakes => Self::Earthquakes(LayerController::new(typed(layer)?)?),
            LayerType::Vector => Self::Vector(LayerController::new(typed(layer)?)?),
            LayerType::Background => Self::Background(LayerController::new(typed(layer)?)?),
            LayerType::Tiff => Self::Tiff(LayerController::new(typed(layer)?)?),
        })
    }

    pub fn id(&self) -> &LayerId {
        dispatch!(self, controller => controller.id())
    }

    /// Aktueller Layer in getaggter Form.
    pub fn layer(&self) -> AnyLayer {
        dispatch!(self, controller => controller.layer().clone().upcast())
    }

    pub fn state(&self) -> ControllerState {
        dispatch!(self, controller => controller.state())
    }

    pub fn stats(&self) -> ControllerStats {
        dispatch!(self, controller => controller.stats())
    }

    /// Eingehängte Ressourcen, unterste zuerst.
    pub fn resources(&self) -> Vec<ResourceId> {
        dispatch!(self, controller => controller.resources())
    }

    pub fn add(&mut self, ctx: &mut SyncContext<'_>) -> Result<Vec<PendingLoad>, LayerError> {
        dispatch!(self, controller => controller.add(ctx))
    }

    /// Übernimmt einen neuen Layer; die Art muss gleich bleiben.
    pub fn update(
        &mut self,
        layer: &AnyLayer,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        dispatch!(self, controller => controller.update(typed(layer)?, ctx))
    }

    pub fn complete(
        &mut self,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        dispatch!(self, controller => controller.complete(path, load, ctx))
    }

    pub fn remove(&mut self, ctx: &mut SyncContext<'_>) {
        dispatch!(self, controller => controller.remove(ctx))
    }

    pub fn zoom_into_view(&self, ctx: &mut SyncContext<'_>) {
        dispatch!(self, controller => controller.zoom_into_view(ctx))
    }

    pub fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        dispatch!(self, controller => controller.move_to_top(ctx))
    }

    pub fn as_background(&self) -> Option<&LayerController<BackgroundKind>> {
        match self {
            Self::Background(controller) => Some(controller),
            _ => None,
        }
    }

    pub fn as_tiff(&self) -> Option<&LayerController<TiffKind>> {
        match self {
            Self::Tiff(controller) => Some(controller),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LayerSource, Tiles3dDetail, WmtsDetail, WmtsProvider};

    #[test]
    fn standalone_child_copies_parent_display() {
        let mut parent = Layer::new("tiff", ());
        parent.opacity = 0.4;
        parent.is_visible = false;
        let child = ChildMode::Standalone.adjust(&parent, Layer::new("child", 1u8));
        assert_eq!(child.opacity, 0.4);
        assert!(!child.is_visible);
    }

    #[test]
    fn embedded_child_is_fully_visible_and_fixed() {
        let mut parent = Layer::new("background", ());
        parent.opacity = 0.0;
        parent.is_visible = false;
        let child = ChildMode::Embedded.adjust(&parent, Layer::new("child", 1u8));
        assert_eq!(child.opacity, 1.0);
        assert!(child.is_visible);
        assert!(!child.can_update_opacity);
    }

    #[test]
    fn update_with_other_kind_is_rejected() {
        let wmts = Layer::new(
            "a",
            WmtsDetail {
                provider: WmtsProvider::Wmts,
                max_level: None,
                times: None,
                format: "image/png".into(),
                credit: String::new(),
            },
        )
        .upcast();
        let tiles = Layer::new(
            "a",
            Tiles3dDetail {
                source: LayerSource::url("t"),
                is_partially_transparent: false,
                order_of_properties: Vec::new(),
            },
        )
        .upcast();

        let controller = AnyController::new(&wmts).expect("Controller erstellt");
        assert_eq!(controller.layer(), wmts);
        let err = typed::<WmtsDetail>(&tiles).expect_err("falsche Art");
        assert!(matches!(
            err,
            LayerError::KindMismatch {
                expected: LayerType::Wmts,
                found: LayerType::Tiles3d,
                ..
            }
        ));
    }
}
