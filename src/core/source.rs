//! Quell-Deskriptoren: woher ein Layer seine Daten bezieht.

use serde::{Deserialize, Serialize};

use super::watch::{WatchValue, Watchable};

/// Basis-URL des OGC-API-Dienstes für 3D-Tiles-Downloads.
pub const OGC_API_BASE_URL: &str = "https://ogc-api.gst-viewer.swissgeol.ch";

/// Beschreibt die Herkunft eines Layers.
///
/// Die Engine interpretiert den Deskriptor nicht selbst, sondern reicht ihn
/// (als [`ResourceLocator`]) an die Resource-Factory der Host-Engine weiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerSource {
    /// Direkt adressierbare URL
    Url { url: String },
    /// S3-Objekt (Bucket + Key)
    S3 { bucket: String, key: String },
    /// Cesium-Ion-Asset
    CesiumIon {
        #[serde(rename = "assetId")]
        asset_id: u64,
        /// Optionales eigenes Access-Token (sonst das öffentliche Standard-Token)
        #[serde(default, rename = "accessToken")]
        access_token: Option<String>,
    },
    /// OGC-Collection mit optionalem Style
    Ogc {
        id: u64,
        #[serde(default, rename = "styleId")]
        style_id: Option<u64>,
        /// Alternative Quelle, die statt der Collection angezeigt wird
        #[serde(default, rename = "displaySource")]
        display_source: Option<Box<LayerSource>>,
    },
}

/// Aufgelöste, abrufbare Adresse einer [`LayerSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceLocator {
    /// HTTP(S)- oder Datei-URL
    Url(String),
    /// S3-Bucket und -Key
    S3 { bucket: String, key: String },
    /// Cesium-Ion-Asset mit optionalem Token
    Ion {
        asset_id: u64,
        access_token: Option<String>,
    },
}

impl LayerSource {
    /// Kurzform für eine URL-Quelle.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Löst die Quelle in eine abrufbare Adresse auf.
    ///
    /// OGC-Quellen mit `display_source` werden über diese aufgelöst,
    /// sonst über den 3D-Tiles-Download der Collection.
    pub fn resolve(&self) -> ResourceLocator {
        match self {
            Self::Url { url } => ResourceLocator::Url(url.clone()),
            Self::S3 { bucket, key } => ResourceLocator::S3 {
                bucket: bucket.clone(),
                key: key.clone(),
            },
            Self::CesiumIon {
                asset_id,
                access_token,
            } => ResourceLocator::Ion {
                asset_id: *asset_id,
                access_token: access_token.clone(),
            },
            Self::Ogc {
                display_source: Some(display),
                ..
            } => display.resolve(),
            Self::Ogc {
                id,
                style_id: None,
                ..
            } => ResourceLocator::Url(format!(
                "{}/collections/{}/download_format/tiles3d",
                OGC_API_BASE_URL, id
            )),
            Self::Ogc {
                id,
                style_id: Some(style_id),
                ..
            } => ResourceLocator::Url(format!(
                "{}/collections/{}/styles/{}/download_format/tiles3d",
                OGC_API_BASE_URL, id, style_id
            )),
        }
    }
}

impl Watchable for LayerSource {
    fn watch_value(&self) -> WatchValue {
        let fields = match self {
            Self::Url { url } => vec!["Url".watch_value(), url.watch_value()],
            Self::S3 { bucket, key } => {
                vec!["S3".watch_value(), bucket.watch_value(), key.watch_value()]
            }
            Self::CesiumIon {
                asset_id,
                access_token,
            } => vec![
                "CesiumIon".watch_value(),
                asset_id.watch_value(),
                access_token.watch_value(),
            ],
            Self::Ogc {
                id,
                style_id,
                display_source,
            } => vec![
                "Ogc".watch_value(),
                id.watch_value(),
                style_id.watch_value(),
                display_source.as_deref().watch_value(),
            ],
        };
        WatchValue::Seq(fields)
    }
}

impl std::fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Self::Ion { asset_id, .. } => write!(f, "ion://{}", asset_id),
        }
    }
}
