//! Core-Domänentypen: Layer-Modell, Quellen, Katalog, Change-Detector.

pub mod catalog;
pub mod earthquake;
/// Layer-Modell
///
/// Dieses Modul definiert die unveränderlichen Layer-Beschreibungen:
/// - Layer: gemeinsame Felder plus art-spezifisches Detail
/// - LayerDetail: getaggte Vereinigung aller Layer-Arten
/// - LayerUpdate: Teil-Aktualisierung mit Deckkraft-/Sichtbarkeitsregeln
pub mod layer;
pub mod source;
pub mod watch;

pub use catalog::{Catalog, StaticCatalog};
pub use earthquake::{parse_catalog, Earthquake, EarthquakeParseError, EarthquakeStyle};
pub use layer::{
    AnyLayer, BackgroundDetail, BackgroundVariant, CogBandProvider, DetailChange,
    EarthquakesDetail, FilterOperator, KindDetail, Layer, LayerDetail, LayerId, LayerMetadata,
    LayerType, LayerUpdate, Legend, TiffBand, TiffBandDisplay, TiffDetail, Tiles3dDetail,
    UpdateError, VectorDetail, VectorFormat, VoxelDetail, VoxelItem, VoxelMapping, VoxelValues,
    WmtsDetail, WmtsProvider, WmtsTimes,
};
pub use source::{LayerSource, ResourceLocator};
pub use watch::{ChangeDetector, PassOutcome, WatchError, WatchPass, WatchValue, Watchable};
