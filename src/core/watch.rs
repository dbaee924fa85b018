//! Change-Detector ("Watch") für Controller-Updates.
//!
//! Ein Controller meldet bei jedem Update-Durchlauf dieselbe geordnete Folge
//! benannter Werte an. Der Detector vergleicht jeden Wert mit seinem Vorgänger
//! und sammelt daraus entweder Reaktionen (günstige In-Place-Anpassungen)
//! oder eine Reload-Anforderung.
//!
//! Die Slots sind benannt und zusätzlich positionsgebunden: Name und
//! Reihenfolge müssen in jedem Durchlauf identisch sein, sonst liefert
//! [`ChangeDetector::run`] einen [`WatchError`].

use indexmap::IndexMap;
use thiserror::Error;

/// Strukturelle Darstellung eines beobachteten Werts.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchValue {
    /// Kein Wert (z.B. `None`)
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Geordnete, indexierbare Sequenz
    Seq(Vec<WatchValue>),
}

/// Prüft ob sich ein Wert gegenüber seiner Vorversion geändert hat.
///
/// - Sequenz gegen Nicht-Sequenz: geändert.
/// - Sequenzen unterschiedlicher Länge: geändert.
/// - Sequenzen gleicher Länge: elementweise, rekursiv verglichen.
/// - Skalare: Gleichheit (zwei `NaN` gelten als unverändert).
pub fn has_changed(previous: &WatchValue, current: &WatchValue) -> bool {
    match (previous, current) {
        (WatchValue::Seq(a), WatchValue::Seq(b)) => {
            a.len() != b.len() || a.iter().zip(b).any(|(x, y)| has_changed(x, y))
        }
        (WatchValue::Seq(_), _) | (_, WatchValue::Seq(_)) => true,
        (WatchValue::Float(a), WatchValue::Float(b)) => a != b && !(a.is_nan() && b.is_nan()),
        (a, b) => a != b,
    }
}

/// Werte, die ein Controller beobachten kann.
pub trait Watchable {
    /// Wandelt den Wert in seine strukturelle Vergleichsform.
    fn watch_value(&self) -> WatchValue;
}

impl Watchable for WatchValue {
    fn watch_value(&self) -> WatchValue {
        self.clone()
    }
}

impl Watchable for bool {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Bool(*self)
    }
}

impl Watchable for f32 {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Float(f64::from(*self))
    }
}

impl Watchable for f64 {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Float(*self)
    }
}

macro_rules! impl_watchable_int {
    ($($ty:ty),*) => {
        $(
            impl Watchable for $ty {
                fn watch_value(&self) -> WatchValue {
                    WatchValue::Int(*self as i64)
                }
            }
        )*
    };
}

impl_watchable_int!(u8, u16, u32, u64, usize, i32, i64);

impl Watchable for str {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Text(self.to_owned())
    }
}

impl Watchable for String {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Text(self.clone())
    }
}

impl<T: Watchable + ?Sized> Watchable for &T {
    fn watch_value(&self) -> WatchValue {
        (**self).watch_value()
    }
}

impl<T: Watchable> Watchable for Option<T> {
    fn watch_value(&self) -> WatchValue {
        match self {
            Some(value) => value.watch_value(),
            None => WatchValue::Absent,
        }
    }
}

impl<T: Watchable> Watchable for [T] {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Seq(self.iter().map(Watchable::watch_value).collect())
    }
}

impl<T: Watchable> Watchable for Vec<T> {
    fn watch_value(&self) -> WatchValue {
        self.as_slice().watch_value()
    }
}

impl<A: Watchable, B: Watchable> Watchable for (A, B) {
    fn watch_value(&self) -> WatchValue {
        WatchValue::Seq(vec![self.0.watch_value(), self.1.watch_value()])
    }
}

/// Verstöße gegen die feste Watch-Reihenfolge (Programmierfehler).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatchError {
    #[error("Watch-Slot '{name}' wurde im ersten Durchlauf doppelt registriert")]
    DuplicateSlot { name: String },
    #[error("Watch-Slot {position}: erwartet '{expected}', erhalten '{found}'")]
    OutOfOrder {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("Unbekannter Watch-Slot '{name}' an Position {position}")]
    UnknownSlot { position: usize, name: String },
    #[error("Unvollständiger Watch-Durchlauf: {found} von {expected} Slots beobachtet")]
    MissingSlots { expected: usize, found: usize },
}

/// Ergebnis eines Watch-Durchlaufs.
#[derive(Debug, Clone, PartialEq)]
pub struct PassOutcome<R> {
    /// Mindestens ein geänderter Slot ohne Reaktion
    pub needs_reload: bool,
    /// Reaktionen in Reihenfolge der `react`-Aufrufe
    pub reactions: Vec<R>,
    /// Namen aller geänderten Slots
    pub changed: Vec<String>,
}

impl<R> Default for PassOutcome<R> {
    fn default() -> Self {
        Self {
            needs_reload: false,
            reactions: Vec::new(),
            changed: Vec::new(),
        }
    }
}

impl<R> PassOutcome<R> {
    /// `true`, wenn sich kein beobachteter Wert geändert hat.
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Ein einzelner Registrierungs-Durchlauf über alle Slots.
///
/// Neue Werte werden nur vorgemerkt; erst ein fehlerfreier Durchlauf
/// übernimmt sie in den Detector.
pub struct WatchPass<'a, R> {
    slots: &'a IndexMap<String, WatchValue>,
    initialized: bool,
    staged: IndexMap<String, WatchValue>,
    outcome: PassOutcome<R>,
    error: Option<WatchError>,
}

impl<R> WatchPass<'_, R> {
    /// Beobachtet einen Wert; eine Änderung erzwingt einen Reload.
    pub fn watch(&mut self, name: &str, value: impl Watchable) {
        self.observe(name, value.watch_value(), None);
    }

    /// Beobachtet einen Wert; eine Änderung reiht `reaction` ein.
    pub fn react(&mut self, name: &str, value: impl Watchable, reaction: R) {
        self.observe(name, value.watch_value(), Some(reaction));
    }

    fn observe(&mut self, name: &str, value: WatchValue, reaction: Option<R>) {
        if self.error.is_some() {
            return;
        }

        if !self.initialized {
            if self.staged.contains_key(name) {
                self.error = Some(WatchError::DuplicateSlot {
                    name: name.to_owned(),
                });
                return;
            }
            self.staged.insert(name.to_owned(), value);
            return;
        }

        let position = self.staged.len();
        match self.slots.get_index(position) {
            Some((slot_name, previous)) if slot_name == name => {
                if has_changed(previous, &value) {
                    self.outcome.changed.push(name.to_owned());
                    match reaction {
                        Some(reaction) => self.outcome.reactions.push(reaction),
                        None => self.outcome.needs_reload = true,
                    }
                }
                self.staged.insert(name.to_owned(), value);
            }
            Some((slot_name, _)) => {
                self.error = Some(WatchError::OutOfOrder {
                    position,
                    expected: slot_name.clone(),
                    found: name.to_owned(),
                });
            }
            None => {
                self.error = Some(WatchError::UnknownSlot {
                    position,
                    name: name.to_owned(),
                });
            }
        }
    }
}

/// Geordnete Slot-Liste eines Controllers.
#[derive(Debug, Default, Clone)]
pub struct ChangeDetector {
    slots: IndexMap<String, WatchValue>,
    initialized: bool,
}

impl ChangeDetector {
    /// Erstellt einen leeren, noch nicht initialisierten Detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` nach dem ersten erfolgreichen Durchlauf.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Anzahl registrierter Slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot-Namen in Registrierungsreihenfolge.
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Zuletzt beobachteter Wert eines Slots.
    pub fn last_value(&self, name: &str) -> Option<&WatchValue> {
        self.slots.get(name)
    }

    /// Verwirft alle Slots; der nächste Durchlauf registriert neu.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.initialized = false;
    }

    /// Führt einen Durchlauf aus.
    ///
    /// Im ersten Durchlauf werden die Werte nur registriert, das Ergebnis ist
    /// leer. Danach liefert jeder Durchlauf Reload-Flag und Reaktionen.
    pub fn run<R>(
        &mut self,
        register: impl FnOnce(&mut WatchPass<'_, R>),
    ) -> Result<PassOutcome<R>, WatchError> {
        let mut pass = WatchPass {
            slots: &self.slots,
            initialized: self.initialized,
            staged: IndexMap::with_capacity(self.slots.len()),
            outcome: PassOutcome::default(),
            error: None,
        };
        register(&mut pass);

        let WatchPass {
            staged,
            outcome,
            error,
            ..
        } = pass;

        if let Some(error) = error {
            return Err(error);
        }
        if self.initialized && staged.len() != self.slots.len() {
            return Err(WatchError::MissingSlots {
                expected: self.slots.len(),
                found: staged.len(),
            });
        }

        self.slots = staged;
        self.initialized = true;
        Ok(outcome)
    }
}
