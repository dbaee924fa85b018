//! Ressourcen-Typen an der Grenze zur Host-Render-Engine.

use std::future::Future;
use std::pin::Pin;

use indexmap::IndexMap;
use thiserror::Error;

use crate::core::{EarthquakeStyle, ResourceLocator, VectorFormat};
use crate::shared::CameraView;

/// Handle einer lebenden Ressource in der Render-Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Draw-Order-Container der Render-Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackTarget {
    /// Globale Imagery-Liste
    Imagery,
    /// 3D-Primitive (Tilesets, Voxel)
    Primitives,
    /// Vektor-Datenquellen
    DataSources,
    /// Imagery-Liste, die auf ein Tileset drapiert wird
    Draped(ResourceId),
}

impl std::fmt::Display for StackTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imagery => f.write_str("imagery"),
            Self::Primitives => f.write_str("primitives"),
            Self::DataSources => f.write_str("data-sources"),
            Self::Draped(id) => write!(f, "draped({})", id),
        }
    }
}

/// Kachelprovider einer Imagery.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageryProvider {
    /// URL-Template mit `{z}/{x}/{y}`
    UrlTemplate { url: String },
    /// WMS mit Subdomains
    Wms {
        url: String,
        layers: String,
        format: String,
        subdomains: String,
    },
}

/// Wert einer Shader-Uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f64),
    Int(i32),
    Bool(bool),
    Flags(Vec<bool>),
}

/// Shader-Beschreibung eines Voxel-Primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelShader {
    /// Sortierte Mapping-Schlüssel; der Index ist die Shader-ID
    pub known_keys: Vec<String>,
    pub no_data: f64,
    pub undefined: f64,
    pub uniforms: IndexMap<String, UniformValue>,
}

/// Auftrag an die Resource-Factory.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceRequest {
    Imagery {
        provider: ImageryProvider,
        max_level: Option<u32>,
        credit: String,
    },
    Tileset {
        locator: ResourceLocator,
        max_screen_space_error: f64,
        partially_transparent: bool,
    },
    Voxel {
        locator: ResourceLocator,
        shader: VoxelShader,
    },
    Events {
        locator: ResourceLocator,
        style: EarthquakeStyle,
    },
    Vector {
        locator: ResourceLocator,
        format: VectorFormat,
        clamp_to_ground: bool,
    },
}

impl ResourceRequest {
    /// Adresse, unter der die Factory die Daten bezieht.
    pub fn location(&self) -> String {
        match self {
            Self::Imagery {
                provider: ImageryProvider::UrlTemplate { url },
                ..
            } => url.clone(),
            Self::Imagery {
                provider: ImageryProvider::Wms { url, layers, .. },
                ..
            } => format!("{}#{}", url, layers),
            Self::Tileset { locator, .. }
            | Self::Voxel { locator, .. }
            | Self::Events { locator, .. }
            | Self::Vector { locator, .. } => locator.to_string(),
        }
    }
}

/// Fertig geladene, noch nicht eingehängte Ressource.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedResource {
    pub request: ResourceRequest,
    /// Anzahl geladener Entities (Events, Features)
    pub entity_count: usize,
}

impl LoadedResource {
    pub fn new(request: ResourceRequest) -> Self {
        Self {
            request,
            entity_count: 0,
        }
    }
}

/// Fehler beim Erzeugen einer Ressource.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("Netzwerkfehler bei {location}: {message}")]
    Network { location: String, message: String },
    #[error("Ungültige Daten bei {location}: {message}")]
    Parse { location: String, message: String },
    #[error("Nicht gefunden: {location}")]
    NotFound { location: String },
}

/// Asynchrones Ergebnis der Resource-Factory.
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<LoadedResource, LoadError>>>>;

/// Kameraziel.
#[derive(Debug, Clone, PartialEq)]
pub enum FlyTarget {
    /// Bounding-Volumen einer Ressource
    Resource(ResourceId),
    /// Feste Ansicht
    View(CameraView),
}
