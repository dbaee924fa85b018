//! Capability-Katalog: verfügbare Raster-Layer der Kartendienste.

use indexmap::IndexMap;

use super::layer::{Layer, LayerId, WmtsDetail};

/// Nachschlagen von Raster-Layern nach ID.
///
/// Hintergrund-Composites beziehen ihre Kinder ausschließlich hierüber.
pub trait Catalog {
    fn raster_layer(&self, id: &LayerId) -> Option<Layer<WmtsDetail>>;
}

/// Katalog mit fester Layer-Liste, z.B. aus einer JSON-Datei.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    layers: IndexMap<LayerId, Layer<WmtsDetail>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baut den Katalog aus einem JSON-Array von Raster-Layern.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let layers: Vec<Layer<WmtsDetail>> = serde_json::from_str(text)?;
        Ok(layers.into_iter().collect())
    }

    /// Fügt einen Layer hinzu; eine vorhandene ID wird ersetzt.
    pub fn insert(&mut self, layer: Layer<WmtsDetail>) {
        self.layers.insert(layer.id.clone(), layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &LayerId> {
        self.layers.keys()
    }
}

impl FromIterator<Layer<WmtsDetail>> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = Layer<WmtsDetail>>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for layer in iter {
            catalog.insert(layer);
        }
        catalog
    }
}

impl Catalog for StaticCatalog {
    fn raster_layer(&self, id: &LayerId) -> Option<Layer<WmtsDetail>> {
        self.layers.get(id).cloned()
    }
}
