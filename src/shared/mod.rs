//! Geteilte Typen für schichtübergreifende Verträge.
//!
//! Enthält Typen, die zwischen `app` und `render` geteilt werden,
//! um direkte Abhängigkeiten zu vermeiden.

pub mod options;

pub use options::{CameraView, SyncOptions};
