//! Layer-Synchronisation für 3D-Kartenviewer.
//! Übersetzt deklarative Layer-Beschreibungen in Ressourcen einer Render-Engine.

pub mod app;
pub mod core;
pub mod render;
pub mod shared;

pub use app::{
    AnyController, LayerCommand, LayerController, LayerError, LayerService, SettleReport,
    SyncContext, SyncFailure,
};
pub use core::{
    AnyLayer, Catalog, ChangeDetector, Layer, LayerDetail, LayerId, LayerSource, LayerType,
    LayerUpdate, StaticCatalog,
};
pub use render::{MemoryFactory, MemoryViewer, ResourceFactory, StackTarget, Viewer};
pub use shared::SyncOptions;
