//! Debounced, retrying save coordination for record editors.
//!
//! Editors that persist records in place all need the same small state
//! machine: decide whether a save is warranted, batch rapid edits behind
//! a quiet period, retry failed saves while the editor stays open, flush
//! on close, and never let two persist calls race each other. This crate
//! provides that machine once, parameterized over the record type, the
//! change detector, and the persist operation.
//!
//! [`AutoSaveCoordinator`] is the core: a deterministic state machine
//! driven by the host's clock, suitable for native tick loops and wasm
//! frame callbacks alike. [`AutoSaveDriver`] is the batteries-included
//! embedding that owns a [`Persister`] and awaits the writes itself.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autosave::{AutoSaveConfig, AutoSaveCoordinator};
//! use web_time::Instant;
//!
//! let mut saver = AutoSaveCoordinator::new(AutoSaveConfig::default());
//! saver.initialize(record, Some(record_id));
//!
//! // On every field edit:
//! saver.note_change(current_record, Instant::now());
//!
//! // Each frame (or at saver.next_wake()):
//! if let Some(request) = saver.poll(Instant::now()) {
//!     let outcome = api.update(&request.record_id, &request.record).await;
//!     saver.save_finished(request.ticket, outcome, Instant::now());
//! }
//! ```

mod change;
mod config;
mod coordinator;
mod driver;
mod guard;

pub use change::{ChangeDetector, differs_by};
pub use config::{
    AutoSaveConfig, CONFIG_VERSION, ConfigError, DEFAULT_DEBOUNCE_MS, DEFAULT_RETRY_MS,
};
pub use coordinator::{AutoSaveCoordinator, SaveRequest, SaveState, SaveTicket};
pub use driver::{AutoSaveDriver, Persister};
pub use guard::OneShotGuard;
