//! Zentrale Konfiguration der Layer-Synchronisation.
//!
//! `SyncOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::core::EarthquakeStyle;

// ── Dienste ─────────────────────────────────────────────────────────

/// URL-Template des WMTS-Dienstes (`{z}/{x}/{y}` füllt die Render-Engine).
pub const WMTS_URL_TEMPLATE: &str =
    "https://wmts.geo.admin.ch/1.0.0/{layer}/default/{timestamp}/3857/{z}/{x}/{y}.{format}";
/// URL des WMS-Dienstes (`{s}` = Subdomain).
pub const WMS_URL_TEMPLATE: &str = "https://wms{s}.geo.admin.ch?version=1.3.0";
/// Subdomains für `{s}` im WMS-Template.
pub const WMS_SUBDOMAINS: &str = "0123";
/// Basis-URL des TiTiler-Dienstes für COG-Bänder.
pub const TITILER_URL: &str = "https://api.swissgeol.ch/titiler";

// ── 3D-Tiles ────────────────────────────────────────────────────────

/// Maximaler Screen-Space-Error für Tilesets.
pub const TILESET_MAX_SCREEN_SPACE_ERROR: f64 = 16.0;

// ── Kamera ──────────────────────────────────────────────────────────

/// Standard-Kameraposition (Längengrad, Breitengrad, Höhe in Metern).
pub const DEFAULT_VIEW_DESTINATION: [f64; 3] = [8.41011994246399, 46.831646400427914, 425641.0];
/// Standard-Neigung in Grad (senkrecht nach unten).
pub const DEFAULT_VIEW_PITCH_DEG: f64 = -90.0;

// ── Command-Log ─────────────────────────────────────────────────────

/// Maximale Anzahl geloggter Commands.
pub const COMMAND_LOG_CAPACITY: usize = 1000;

/// Kameraziel für `fly_to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    /// Längengrad, Breitengrad, Höhe
    pub destination: DVec3,
    /// Blickrichtung in Grad
    pub heading_deg: f64,
    /// Neigung in Grad
    pub pitch_deg: f64,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            destination: DVec3::from_array(DEFAULT_VIEW_DESTINATION),
            heading_deg: 0.0,
            pitch_deg: DEFAULT_VIEW_PITCH_DEG,
        }
    }
}

/// Laufzeit-Optionen der Layer-Synchronisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    // ── Dienste ─────────────────────────────────────────────────────
    pub wmts_url_template: String,
    pub wms_url_template: String,
    pub wms_subdomains: String,
    pub titiler_url: String,

    // ── 3D-Tiles ────────────────────────────────────────────────────
    pub tileset_max_screen_space_error: f64,

    // ── Kamera ──────────────────────────────────────────────────────
    /// Ziel beim Zoomen auf den Hintergrund
    pub default_view: CameraView,

    // ── Erdbeben ────────────────────────────────────────────────────
    pub earthquakes: EarthquakeStyle,

    // ── Command-Log ─────────────────────────────────────────────────
    pub command_log_capacity: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            wmts_url_template: WMTS_URL_TEMPLATE.to_string(),
            wms_url_template: WMS_URL_TEMPLATE.to_string(),
            wms_subdomains: WMS_SUBDOMAINS.to_string(),
            titiler_url: TITILER_URL.to_string(),
            tileset_max_screen_space_error: TILESET_MAX_SCREEN_SPACE_ERROR,
            default_view: CameraView::default(),
            earthquakes: EarthquakeStyle::default(),
            command_log_capacity: COMMAND_LOG_CAPACITY,
        }
    }
}

impl SyncOptions {
    /// Lädt Optionen aus einer TOML-Datei. Fallback auf Defaults bei Fehler.
    pub fn load_from_file(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(opts) => {
                    log::info!("Optionen geladen aus: {}", path.display());
                    opts
                }
                Err(e) => {
                    log::warn!("Optionen-Datei fehlerhaft, verwende Standardwerte: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Keine Optionen-Datei gefunden, verwende Standardwerte");
                Self::default()
            }
        }
    }

    /// Speichert Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        log::info!("Optionen gespeichert nach: {}", path.display());
        Ok(())
    }

    /// Ermittelt den Pfad zur Optionen-Datei neben der Binary.
    pub fn config_path() -> std::path::PathBuf {
        std::env::current_exe()
            .unwrap_or_else(|_| std::path::PathBuf::from("layer-sync-replay"))
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("layer_sync.toml")
    }

    /// Setzt das WMTS-Template für einen Layer ein.
    ///
    /// `{z}`, `{x}` und `{y}` bleiben für die Render-Engine stehen.
    pub fn wmts_url(&self, layer: &str, format: &str, timestamp: Option<&str>) -> String {
        let extension = format.split('/').nth(1).unwrap_or(format);
        self.wmts_url_template
            .replace("{layer}", layer)
            .replace("{format}", extension)
            .replace("{timestamp}", timestamp.unwrap_or("current"))
    }

    /// Kachel-URL eines COG-Bandes über TiTiler.
    pub fn cog_tiles_url(
        &self,
        url: &str,
        band_index: u32,
        color_map: &str,
        rescale: Option<(f64, f64)>,
        no_data: Option<f64>,
    ) -> String {
        let mut tiles = format!(
            "{}/cog/tiles/WebMercatorQuad/{{z}}/{{x}}/{{y}}.png?url={}&bidx={}&colormap_name={}",
            self.titiler_url.trim_end_matches('/'),
            url,
            band_index,
            color_map
        );
        if let Some((min, max)) = rescale {
            tiles.push_str(&format!("&rescale={},{}", min, max));
        }
        if let Some(no_data) = no_data {
            tiles.push_str(&format!("&nodata={}", no_data));
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wmts_url_fills_layer_format_and_timestamp() {
        let options = SyncOptions::default();
        assert_eq!(
            options.wmts_url("ch.swisstopo.swissimage", "image/jpeg", None),
            "https://wmts.geo.admin.ch/1.0.0/ch.swisstopo.swissimage/default/current/3857/{z}/{x}/{y}.jpeg"
        );
        assert!(options
            .wmts_url("ch.bafu.karst", "image/png", Some("20240101"))
            .contains("/default/20240101/"));
    }

    #[test]
    fn cog_tiles_url_omits_unset_parameters() {
        let options = SyncOptions::default();
        let url = options.cog_tiles_url("https://data/x.tif", 2, "viridis", None, Some(-9999.0));
        assert!(url.ends_with("&bidx=2&colormap_name=viridis&nodata=-9999"));
        assert!(!url.contains("rescale"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let options: SyncOptions =
            toml::from_str("tileset_max_screen_space_error = 8.0\n").expect("gültiges TOML");
        assert_eq!(options.tileset_max_screen_space_error, 8.0);
        assert_eq!(options.command_log_capacity, COMMAND_LOG_CAPACITY);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let options = SyncOptions::load_from_file(std::path::Path::new("/nonexistent/layer_sync.toml"));
        assert_eq!(options, SyncOptions::default());
    }
}
