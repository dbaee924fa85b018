//! Grenze zur Host-Render-Engine.
//!
//! Die Controller sprechen die Engine ausschließlich über die Traits
//! [`Viewer`] und [`ResourceFactory`] an. Stack-Manipulationen laufen über
//! den Draw-Order-Manager in [`draw_order`].

pub mod draw_order;
mod memory;
mod types;
mod viewer;

pub use draw_order::{Anchor, DrawOrderError, DrawSlot, Placement};
pub use memory::{
    GlobeTranslucency, MemoryFactory, MemoryResource, MemoryStack, MemoryViewer, ViewerStats,
};
pub use types::{
    FlyTarget, ImageryProvider, LoadError, LoadFuture, LoadedResource, ResourceId,
    ResourceRequest, StackTarget, UniformValue, VoxelShader,
};
pub use viewer::{DrawStack, ResourceFactory, Viewer};
