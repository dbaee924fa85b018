//! Layer-Modell: unveränderliche, nach Art getaggte Layer-Beschreibung.
//!
//! Ein [`Layer`] wird nie in-place verändert. Jede Änderung erzeugt über
//! [`Layer::apply_update`] einen neuen Wert, den der Controller mit dem
//! vorherigen vergleicht.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::source::LayerSource;
use super::watch::{WatchValue, Watchable};

/// Stabile, eindeutige Layer-ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    /// Erstellt eine neue ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Art eines Layers (Diskriminante von [`LayerDetail`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    Wmts,
    Tiles3d,
    Voxel,
    Earthquakes,
    Vector,
    Background,
    Tiff,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wmts => "Wmts",
            Self::Tiles3d => "Tiles3d",
            Self::Voxel => "Voxel",
            Self::Earthquakes => "Earthquakes",
            Self::Vector => "Vector",
            Self::Background => "Background",
            Self::Tiff => "Tiff",
        };
        f.write_str(name)
    }
}

/// Verweis auf die Legende eines Layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Legend {
    /// HTML-Legende, abrufbar über die Layer-ID
    Html,
    /// PNG-Legende unter einer eigenen ID
    Image { id: String },
}

/// Optionale Metadaten eines Layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerMetadata {
    /// ID auf geocat.ch
    pub geocat_id: Option<String>,
    /// Download-Link einer Repräsentation des Layers
    pub download_url: Option<String>,
    pub legend: Option<Legend>,
    /// Quellenangabe (Credit)
    pub attribution: Option<String>,
}

/// Gemeinsame Felder aller Layer plus art-spezifisches Detail `D`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer<D> {
    pub id: LayerId,
    /// Fester Anzeigename (z.B. bei importierten Layern)
    #[serde(default)]
    pub label: Option<String>,
    /// Deckkraft 0..=1
    pub opacity: f32,
    /// Ob die Deckkraft geändert werden kann (sonst nur 0 oder 1)
    #[serde(default = "default_true")]
    pub can_update_opacity: bool,
    /// Sichtbarkeit; immer `false` bei Deckkraft 0
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub metadata: LayerMetadata,
    #[serde(flatten)]
    pub detail: D,
}

fn default_true() -> bool {
    true
}

impl<D> Layer<D> {
    /// Erstellt einen sichtbaren Layer mit voller Deckkraft.
    pub fn new(id: impl Into<LayerId>, detail: D) -> Self {
        Self {
            id: id.into(),
            label: None,
            opacity: 1.0,
            can_update_opacity: true,
            is_visible: true,
            metadata: LayerMetadata::default(),
            detail,
        }
    }

    /// Übernimmt die gemeinsamen Felder mit einem anderen Detail.
    pub fn with_detail<E>(&self, detail: E) -> Layer<E> {
        Layer {
            id: self.id.clone(),
            label: self.label.clone(),
            opacity: self.opacity,
            can_update_opacity: self.can_update_opacity,
            is_visible: self.is_visible,
            metadata: self.metadata.clone(),
            detail,
        }
    }

    /// Deckkraft, mit der der Layer tatsächlich gezeichnet wird.
    pub fn effective_opacity(&self) -> f32 {
        if self.is_visible {
            self.opacity
        } else {
            0.0
        }
    }
}

// ── Art-spezifische Details ─────────────────────────────────────────

/// Dienst, über den ein Raster-Layer seine Kacheln bezieht.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WmtsProvider {
    Wms,
    Wmts,
    /// Einzelnes Band eines Cloud-Optimized-GeoTIFF, gekachelt über TiTiler
    CogBand(CogBandProvider),
}

impl Watchable for WmtsProvider {
    fn watch_value(&self) -> WatchValue {
        match self {
            Self::Wms => "Wms".watch_value(),
            Self::Wmts => "Wmts".watch_value(),
            Self::CogBand(cog) => WatchValue::Seq(vec![
                "CogBand".watch_value(),
                cog.url.watch_value(),
                cog.band_index.watch_value(),
                cog.color_map.watch_value(),
                cog.rescale.watch_value(),
                cog.no_data.watch_value(),
            ]),
        }
    }
}

/// Parameter eines COG-Band-Kachelproviders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CogBandProvider {
    pub url: String,
    pub band_index: u32,
    pub color_map: String,
    /// Werte-Reskalierung (entfällt bei diskreten Bändern)
    pub rescale: Option<(f64, f64)>,
    pub no_data: Option<f64>,
}

/// Verfügbare Zeitschritte eines Raster-Layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmtsTimes {
    /// Aktuell gewählter Zeitschritt
    pub current: String,
    pub all: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmtsDetail {
    pub provider: WmtsProvider,
    /// Zoomstufe, ab der keine höher aufgelösten Kacheln mehr geladen werden
    #[serde(default)]
    pub max_level: Option<u32>,
    #[serde(default)]
    pub times: Option<WmtsTimes>,
    /// MIME-Type, meist `image/png`
    pub format: String,
    #[serde(default)]
    pub credit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tiles3dDetail {
    pub source: LayerSource,
    /// Teiltransparenz, um nicht überdeckte Teile auszublenden
    #[serde(default)]
    pub is_partially_transparent: bool,
    #[serde(default)]
    pub order_of_properties: Vec<String>,
}

/// Verknüpfung der Voxel-Mappings beim Filtern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Alle Mappings müssen passen
    #[default]
    And,
    /// Mindestens ein Mapping muss passen
    Or,
    /// Genau ein Mapping muss passen
    Xor,
}

impl FilterOperator {
    /// Index, unter dem der Shader den Operator kennt.
    pub fn shader_index(self) -> i32 {
        match self {
            Self::And => 0,
            Self::Or => 1,
            Self::Xor => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoxelValues {
    pub no_data: f64,
    pub undefined: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoxelItem {
    pub label: String,
    pub value: f64,
    pub color: String,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoxelMapping {
    /// Diskrete Werte mit einzeln schaltbaren Einträgen
    #[serde(rename_all = "camelCase")]
    Item { key: String, items: Vec<VoxelItem> },
    /// Kontinuierlicher Wertebereich
    #[serde(rename_all = "camelCase")]
    Range {
        key: String,
        range: (f64, f64),
        colors: Vec<String>,
        enabled_range: (f64, f64),
        is_undefined_always_enabled: bool,
    },
}

impl VoxelMapping {
    /// Schlüssel der Datenpunkt-Eigenschaft.
    pub fn key(&self) -> &str {
        match self {
            Self::Item { key, .. } | Self::Range { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoxelDetail {
    pub source: LayerSource,
    /// Schlüssel des angezeigten Mappings
    pub data_key: String,
    pub values: VoxelValues,
    pub mappings: Vec<VoxelMapping>,
    #[serde(default)]
    pub filter_operator: FilterOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakesDetail {
    pub source: LayerSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorFormat {
    Kml,
    GeoJson,
}

impl VectorFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kml => "Kml",
            Self::GeoJson => "GeoJson",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDetail {
    pub source: LayerSource,
    pub format: VectorFormat,
    /// Daten beim Laden auf das Terrain klemmen
    #[serde(default)]
    pub clamp_to_ground: bool,
}

/// Eine Variante des Hintergrunds mit ihren Raster-Kindern (unterstes zuerst).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundVariant {
    pub children: Vec<LayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundDetail {
    /// Lokales Basisbild
    pub image_path: String,
    #[serde(default)]
    pub has_alpha_channel: bool,
    pub variants: IndexMap<String, BackgroundVariant>,
    pub active_variant: String,
}

impl BackgroundDetail {
    /// Kinder der aktiven Variante.
    pub fn active_children(&self) -> Option<&[LayerId]> {
        self.variants
            .get(&self.active_variant)
            .map(|variant| variant.children.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiffUnit {
    Meters,
    MetersAboveSeaLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiffBandStep {
    pub value: f64,
    pub label: String,
}

/// Darstellung eines Bandes; ohne sie ist das Band nicht einzeln anzeigbar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiffBandDisplay {
    /// Untere und obere Grenze der angezeigten Werte
    pub bounds: (f64, f64),
    #[serde(default)]
    pub no_data: Option<f64>,
    #[serde(default)]
    pub steps: Vec<TiffBandStep>,
    pub color_map: String,
    #[serde(default)]
    pub is_discrete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiffBand {
    /// Index des Bandes im TIFF
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub unit: Option<TiffUnit>,
    #[serde(default)]
    pub display: Option<TiffBandDisplay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiffDetail {
    pub url: String,
    /// Zellgröße in Metern
    pub cell_size: f64,
    pub bands: Vec<TiffBand>,
    /// Position des aktiven Bandes in `bands`
    #[serde(default)]
    pub band_index: usize,
    /// Eigenes Terrain, auf das das Band drapiert wird
    #[serde(default)]
    pub terrain: Option<LayerSource>,
}

impl TiffDetail {
    /// Aktives Band, falls der Index gültig ist.
    pub fn active_band(&self) -> Option<&TiffBand> {
        self.bands.get(self.band_index)
    }
}

/// Getaggte Vereinigung aller Layer-Details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerDetail {
    Wmts(WmtsDetail),
    Tiles3d(Tiles3dDetail),
    Voxel(VoxelDetail),
    Earthquakes(EarthquakesDetail),
    Vector(VectorDetail),
    Background(BackgroundDetail),
    Tiff(TiffDetail),
}

impl LayerDetail {
    pub fn kind(&self) -> LayerType {
        match self {
            Self::Wmts(_) => LayerType::Wmts,
            Self::Tiles3d(_) => LayerType::Tiles3d,
            Self::Voxel(_) => LayerType::Voxel,
            Self::Earthquakes(_) => LayerType::Earthquakes,
            Self::Vector(_) => LayerType::Vector,
            Self::Background(_) => LayerType::Background,
            Self::Tiff(_) => LayerType::Tiff,
        }
    }
}

/// Ein Layer beliebiger Art, wie ihn der Layer-Service speichert.
pub type AnyLayer = Layer<LayerDetail>;

/// Umwandlung zwischen [`LayerDetail`] und einem konkreten Detail-Typ.
pub trait KindDetail: Clone + std::fmt::Debug + PartialEq {
    const KIND: LayerType;

    fn from_detail(detail: &LayerDetail) -> Option<&Self>;
    fn into_detail(self) -> LayerDetail;
}

macro_rules! impl_kind_detail {
    ($($variant:ident => $detail:ty),* $(,)?) => {
        $(
            impl KindDetail for $detail {
                const KIND: LayerType = LayerType::$variant;

                fn from_detail(detail: &LayerDetail) -> Option<&Self> {
                    match detail {
                        LayerDetail::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_detail(self) -> LayerDetail {
                    LayerDetail::$variant(self)
                }
            }
        )*
    };
}

impl_kind_detail!(
    Wmts => WmtsDetail,
    Tiles3d => Tiles3dDetail,
    Voxel => VoxelDetail,
    Earthquakes => EarthquakesDetail,
    Vector => VectorDetail,
    Background => BackgroundDetail,
    Tiff => TiffDetail,
);

impl AnyLayer {
    pub fn kind(&self) -> LayerType {
        self.detail.kind()
    }

    /// Liefert den Layer mit konkretem Detail, falls die Art passt.
    pub fn downcast<D: KindDetail>(&self) -> Option<Layer<D>> {
        D::from_detail(&self.detail).map(|detail| self.with_detail(detail.clone()))
    }

    /// Wendet eine Teil-Aktualisierung an und liefert den neuen Layer.
    ///
    /// `definition` ist der ursprünglich registrierte Layer; seine Deckkraft
    /// wird wiederhergestellt, wenn ein Layer mit Deckkraft 0 sichtbar wird.
    pub fn apply_update(
        &self,
        definition: &AnyLayer,
        update: &LayerUpdate,
    ) -> Result<AnyLayer, UpdateError> {
        let mut next = self.clone();

        if let Some(label) = &update.label {
            next.label = label.clone();
        }
        if let Some(change) = &update.detail {
            next.detail = change.apply(&self.id, &self.detail)?;
        }

        if let Some(opacity) = update.opacity {
            next.opacity = if next.can_update_opacity {
                opacity.clamp(0.0, 1.0)
            } else if opacity > 0.0 {
                1.0
            } else {
                0.0
            };
            next.is_visible = next.opacity != 0.0;
        } else if let Some(is_visible) = update.is_visible {
            next.is_visible = is_visible;
            if is_visible && next.opacity == 0.0 {
                next.opacity = definition.opacity;
            }
        }

        Ok(next)
    }
}

impl<D: KindDetail> Layer<D> {
    /// Wandelt in die getaggte Form zurück.
    pub fn upcast(self) -> AnyLayer {
        let detail = self.detail.clone().into_detail();
        self.with_detail(detail)
    }
}

// ── Updates ─────────────────────────────────────────────────────────

/// Fehler beim Anwenden einer [`LayerUpdate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    #[error("Layer '{layer}': Änderung passt nicht zur Layer-Art {kind}")]
    KindMismatch { layer: LayerId, kind: LayerType },
    #[error("Layer '{layer}': unbekannter Zeitschritt '{time}'")]
    UnknownTime { layer: LayerId, time: String },
    #[error("Layer '{layer}': Band-Index {index} außerhalb von {count} Bändern")]
    InvalidBand {
        layer: LayerId,
        index: usize,
        count: usize,
    },
    #[error("Layer '{layer}': unbekannte Hintergrund-Variante '{variant}'")]
    UnknownVariant { layer: LayerId, variant: String },
}

/// Art-spezifische Teiländerung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum DetailChange {
    /// Ersetzt das Detail vollständig (gleiche Art)
    Replace { detail: LayerDetail },
    /// Wählt einen Zeitschritt eines Raster-Layers
    Time { current: String },
    /// Wählt das aktive Band eines TIFF-Layers
    Band { index: usize },
    /// Wählt die aktive Hintergrund-Variante
    Variant { id: String },
    /// Neue Quelle (3D-Tiles, Voxel, Erdbeben, Vektor)
    Source { source: LayerSource },
    FilterOperator { operator: FilterOperator },
    Mappings { mappings: Vec<VoxelMapping> },
}

impl DetailChange {
    fn apply(&self, id: &LayerId, detail: &LayerDetail) -> Result<LayerDetail, UpdateError> {
        let mismatch = || UpdateError::KindMismatch {
            layer: id.clone(),
            kind: detail.kind(),
        };
        if let Self::Replace {
            detail: replacement,
        } = self
        {
            if replacement.kind() != detail.kind() {
                return Err(mismatch());
            }
            return Ok(replacement.clone());
        }

        let mut next = detail.clone();
        match (self, &mut next) {
            (Self::Time { current }, LayerDetail::Wmts(wmts)) => {
                let times = wmts.times.as_mut().ok_or_else(mismatch)?;
                if !times.all.contains(current) {
                    return Err(UpdateError::UnknownTime {
                        layer: id.clone(),
                        time: current.clone(),
                    });
                }
                times.current = current.clone();
            }
            (Self::Band { index }, LayerDetail::Tiff(tiff)) => {
                if *index >= tiff.bands.len() {
                    return Err(UpdateError::InvalidBand {
                        layer: id.clone(),
                        index: *index,
                        count: tiff.bands.len(),
                    });
                }
                tiff.band_index = *index;
            }
            (Self::Variant { id: variant }, LayerDetail::Background(background)) => {
                if !background.variants.contains_key(variant) {
                    return Err(UpdateError::UnknownVariant {
                        layer: id.clone(),
                        variant: variant.clone(),
                    });
                }
                background.active_variant = variant.clone();
            }
            (Self::Source { source }, LayerDetail::Tiles3d(Tiles3dDetail { source: slot, .. }))
            | (Self::Source { source }, LayerDetail::Voxel(VoxelDetail { source: slot, .. }))
            | (Self::Source { source }, LayerDetail::Earthquakes(EarthquakesDetail { source: slot }))
            | (Self::Source { source }, LayerDetail::Vector(VectorDetail { source: slot, .. })) => {
                *slot = source.clone();
            }
            (Self::FilterOperator { operator }, LayerDetail::Voxel(voxel)) => {
                voxel.filter_operator = *operator;
            }
            (Self::Mappings { mappings }, LayerDetail::Voxel(voxel)) => {
                voxel.mappings = mappings.clone();
            }
            _ => return Err(mismatch()),
        }

        Ok(next)
    }
}

/// Teil-Aktualisierung eines Layers; `None` lässt das Feld unverändert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerUpdate {
    pub opacity: Option<f32>,
    pub is_visible: Option<bool>,
    pub label: Option<Option<String>>,
    pub detail: Option<DetailChange>,
}

impl LayerUpdate {
    pub fn opacity(opacity: f32) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    pub fn visibility(is_visible: bool) -> Self {
        Self {
            is_visible: Some(is_visible),
            ..Self::default()
        }
    }

    pub fn detail(change: DetailChange) -> Self {
        Self {
            detail: Some(change),
            ..Self::default()
        }
    }
}
