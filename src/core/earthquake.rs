//! Parser für Erdbeben-Kataloge im FDSN-Textformat (`|`-getrennt).
//!
//! Die erste Zeile ist der Header, jede weitere Zeile ein Event.
//! Header-Namen werden auf Wortzeichen reduziert (`Depth/km` → `Depthkm`).

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use glam::DVec3;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Größenfaktor: Kugelradius in Metern pro Magnituden-Einheit.
pub const EARTHQUAKE_SPHERE_SIZE_COEFFICIENT: f64 = 200.0;

const COLOR_RECENT: [u8; 3] = [24, 48, 59];
const COLOR_DAYS: [u8; 3] = [75, 103, 123];
const COLOR_OLDER: [u8; 3] = [130, 165, 179];

#[derive(Debug, Error)]
pub enum EarthquakeParseError {
    #[error("Erdbeben-Katalog ohne Header-Zeile")]
    MissingHeader,
    #[error("Header-Spalte '{0}' fehlt")]
    MissingColumn(&'static str),
    #[error("Ungültiges Header-Pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Darstellungs-Parameter der Erdbeben-Kugeln.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthquakeStyle {
    /// Radius in Metern pro Magnituden-Einheit
    pub size_coefficient: f64,
    /// Events jünger als diese Stundenzahl erhalten die dunkelste Farbe
    pub recent_hours: f64,
    /// Events jünger als diese Stundenzahl erhalten die mittlere Farbe
    pub days_hours: f64,
}

impl Default for EarthquakeStyle {
    fn default() -> Self {
        Self {
            size_coefficient: EARTHQUAKE_SPHERE_SIZE_COEFFICIENT,
            recent_hours: 24.0,
            days_hours: 72.0,
        }
    }
}

/// Ein einzelnes Erdbeben-Event.
#[derive(Debug, Clone, PartialEq)]
pub struct Earthquake {
    /// Zeitpunkt (UTC), falls parsebar
    pub time: Option<DateTime<Utc>>,
    pub magnitude: f64,
    pub depth_km: f64,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Earthquake {
    /// Kugelradius in Metern.
    pub fn radius(&self, style: &EarthquakeStyle) -> f64 {
        self.magnitude * style.size_coefficient
    }

    /// Position als (Längengrad, Breitengrad, Höhe in Metern unter Terrain).
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.longitude, self.latitude, -self.depth_km * 1000.0)
    }

    /// Farbe nach Alter des Events; ohne Zeitstempel gilt es als alt.
    pub fn color(&self, style: &EarthquakeStyle, now: DateTime<Utc>) -> [u8; 3] {
        let Some(time) = self.time else {
            return COLOR_OLDER;
        };
        let age_hours = (now - time).num_seconds() as f64 / 3600.0;
        if age_hours < style.recent_hours {
            COLOR_RECENT
        } else if age_hours < style.days_hours {
            COLOR_DAYS
        } else {
            COLOR_OLDER
        }
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.split('.').next().unwrap_or(value).trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Nicht-Wort-Zeichen in Spaltennamen
static NON_WORD: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"\W"));

/// Parst einen FDSN-Textkatalog.
///
/// Zeilen ohne Koordinaten oder mit ungültiger Tiefe werden verworfen.
pub fn parse_catalog(text: &str) -> Result<Vec<Earthquake>, EarthquakeParseError> {
    let mut lines = text.trim().lines();
    let header = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or(EarthquakeParseError::MissingHeader)?;

    let non_word = NON_WORD.as_ref().map_err(Clone::clone)?;
    let columns: Vec<String> = header
        .split('|')
        .map(|name| non_word.replace_all(name, "").into_owned())
        .collect();
    let column = |name: &'static str| {
        columns
            .iter()
            .position(|c| c == name)
            .ok_or(EarthquakeParseError::MissingColumn(name))
    };

    let latitude_col = column("Latitude")?;
    let longitude_col = column("Longitude")?;
    let depth_col = column("Depthkm")?;
    let time_col = column("Time").ok();
    let magnitude_col = column("Magnitude").ok();
    let location_col = column("EventLocationName").ok();

    let mut events = Vec::new();
    let mut dropped = 0usize;
    for line in lines {
        let values: Vec<&str> = line.split('|').map(str::trim).collect();
        let field = |col: Option<usize>| col.and_then(|i| values.get(i)).copied();

        let latitude = field(Some(latitude_col)).and_then(|v| v.parse::<f64>().ok());
        let longitude = field(Some(longitude_col)).and_then(|v| v.parse::<f64>().ok());
        let depth_km = field(Some(depth_col))
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|d| !d.is_nan());

        let (Some(latitude), Some(longitude), Some(depth_km)) = (latitude, longitude, depth_km)
        else {
            dropped += 1;
            continue;
        };

        events.push(Earthquake {
            time: field(time_col).and_then(parse_time),
            magnitude: field(magnitude_col)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0),
            depth_km,
            location: field(location_col).unwrap_or_default().to_string(),
            latitude,
            longitude,
        });
    }

    if dropped > 0 {
        log::debug!("Erdbeben-Katalog: {} ungültige Zeilen verworfen", dropped);
    }
    Ok(events)
}
