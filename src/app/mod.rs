//! Application-Layer: Controller, Ladevorgänge, Layer-Service und Commands.

pub mod command_log;
/// Layer-Controller
///
/// Basis-Controller mit Change-Detection und Lebenszyklus; die Arten liegen
/// in [`controllers`].
pub mod controller;
pub mod controllers;
pub mod events;
pub mod load;
pub mod service;

pub use command_log::CommandLog;
pub use controller::{
    ControllerState, ControllerStats, LayerController, LayerError, LayerKind, SyncContext,
    SyncFailure,
};
pub use controllers::{AnyController, ChildMode};
pub use events::LayerCommand;
pub use load::{Completion, FinishedLoad, LoadOutcome, PendingLoad, Ticket, TicketCounter};
pub use service::{LayerService, SettleReport};
