//! Save coordination state machine for a record edited in place.
//!
//! `AutoSaveCoordinator` decides, for one editable record, whether a save
//! is needed, when to fire it, and how to recover when a save fails or
//! the editor closes mid-flight. Rapid edits are batched behind a
//! debounce delay, failed saves are retried at a fixed interval for as
//! long as the editor stays open, and at most one persist call is ever
//! outstanding.
//!
//! The coordinator is a pure state machine. Timers are stored deadlines
//! compared against the `Instant` the host passes in, and the persist
//! call itself is performed by the host (or by
//! [`AutoSaveDriver`](crate::AutoSaveDriver)), which reports the outcome
//! back through [`AutoSaveCoordinator::save_finished`]. That keeps every
//! transition deterministic and lets the host integrate the coordinator
//! into whatever loop it already runs, native tick loop or wasm frame
//! callback alike.

use std::fmt;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::change::ChangeDetector;
use crate::config::AutoSaveConfig;

/// Persistence status of the record being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    /// The record matches the last persisted state.
    #[default]
    Saved,
    /// The record has changes that are not yet persisted.
    Unsaved,
    /// A persist call is in flight.
    Saving,
    /// The most recent persist call failed; another attempt is scheduled
    /// while the editor stays open.
    Error,
}

impl SaveState {
    /// Get the display name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            SaveState::Saved => "Saved",
            SaveState::Unsaved => "Unsaved",
            SaveState::Saving => "Saving",
            SaveState::Error => "Error",
        }
    }
}

/// Identifier of one save procedure invocation.
///
/// A completion reported with a ticket that no longer matches the
/// in-flight invocation (superseded by [`AutoSaveCoordinator::initialize`]
/// or [`AutoSaveCoordinator::dispose`]) is silently discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket(u64);

/// A save the coordinator has decided to start.
///
/// The host performs the persist call with the carried snapshot and
/// reports the outcome through [`AutoSaveCoordinator::save_finished`],
/// passing the ticket back.
#[derive(Debug)]
pub struct SaveRequest<R> {
    /// Ticket identifying this invocation.
    pub ticket: SaveTicket,
    /// Server-side identity of the record.
    pub record_id: String,
    /// Snapshot to persist.
    pub record: R,
}

/// Coordinates saves for one record being edited in place.
///
/// A coordinator instance is created when an editor begins editing a
/// record and torn down with [`dispose`](Self::dispose) when the editor
/// unmounts or switches records. The host feeds it a stream of record
/// snapshots via [`note_change`](Self::note_change), drives due work via
/// [`poll`](Self::poll), and renders [`state`](Self::state).
///
/// Records without a server-side identity yet (not created remotely) are
/// kept out of the automatic save loop entirely; callers perform an
/// explicit create, then hand the created record back through
/// [`initialize`](Self::initialize).
pub struct AutoSaveCoordinator<R: 'static> {
    config: AutoSaveConfig,
    detector: ChangeDetector<R>,

    /// Last snapshot known to match persisted server state.
    baseline: Option<R>,

    /// Most recent snapshot received from the editor.
    live: Option<R>,

    /// Server-side identity; `None` disables automatic persistence.
    record_id: Option<String>,

    state: SaveState,

    /// When the debounce quiet period ends, if an edit armed it.
    debounce_due: Option<Instant>,

    /// When the next retry fires, if a save failed.
    retry_due: Option<Instant>,

    /// Ticket of the persist call currently in flight.
    in_flight: Option<SaveTicket>,

    /// Snapshot handed to the in-flight persist call; becomes the new
    /// baseline when that call succeeds.
    in_flight_record: Option<R>,

    /// A save trigger fired while a persist call was in flight.
    pending: bool,

    next_ticket: u64,

    /// Time of the most recent successful persist for this record.
    last_saved_at: Option<Instant>,

    /// Failure text of the most recent persist error, for display.
    last_error: Option<String>,

    /// Whether automatic saving is enabled.
    enabled: bool,

    /// Set once by `dispose`; everything afterwards is a no-op.
    disposed: bool,
}

impl<R: Clone + PartialEq + 'static> AutoSaveCoordinator<R> {
    /// Create a coordinator that detects changes with structural
    /// equality over the whole record.
    pub fn new(config: AutoSaveConfig) -> Self {
        Self::with_change_detector(config, |current: &R, baseline: &R| current != baseline)
    }
}

impl<R: Clone + 'static> AutoSaveCoordinator<R> {
    /// Create a coordinator with a caller-supplied change detector,
    /// e.g. one built with [`differs_by`](crate::differs_by) to compare
    /// only the persisted fields.
    pub fn with_change_detector(
        config: AutoSaveConfig,
        detector: impl Fn(&R, &R) -> bool + 'static,
    ) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            detector: Box::new(detector),
            baseline: None,
            live: None,
            record_id: None,
            state: SaveState::Saved,
            debounce_due: None,
            retry_due: None,
            in_flight: None,
            in_flight_record: None,
            pending: false,
            next_ticket: 0,
            last_saved_at: None,
            last_error: None,
            enabled,
            disposed: false,
        }
    }

    /// Begin editing a record.
    ///
    /// The record becomes the baseline, the state resets to `Saved`, all
    /// timers are cancelled and any in-flight persist result will be
    /// discarded on arrival. `record_id` is `None` for records that do
    /// not exist server-side yet; automatic persistence stays disabled
    /// until an identity is supplied.
    pub fn initialize(&mut self, record: R, record_id: Option<String>) {
        if self.disposed {
            return;
        }

        self.live = Some(record.clone());
        self.baseline = Some(record);
        self.record_id = record_id;
        self.state = SaveState::Saved;
        self.debounce_due = None;
        self.retry_due = None;
        self.in_flight = None;
        self.in_flight_record = None;
        self.pending = false;
        self.last_saved_at = None;
        self.last_error = None;

        log::debug!(
            "Auto-save: initialized (identity: {})",
            self.record_id.as_deref().unwrap_or("none")
        );
    }

    /// Record the current editor snapshot after a field edit.
    ///
    /// Safe to call on every keystroke. If the detector reports no
    /// difference from the baseline this is a complete no-op: an already
    /// running debounce timer keeps its deadline and an `Error` state is
    /// not cleared. If the snapshot differs, the machine enters `Unsaved`
    /// (unless a save is in flight, which is never cancelled) and the
    /// debounce deadline is (re)armed at `now` plus the configured delay.
    pub fn note_change(&mut self, record: R, now: Instant) {
        if self.disposed {
            return;
        }

        let differs = match (&self.record_id, &self.baseline) {
            (Some(_), Some(baseline)) => (self.detector)(&record, baseline),
            _ => false,
        };
        let tracked = self.record_id.is_some();

        // The live snapshot is refreshed unconditionally so the eventual
        // save persists the latest state, including edits that happen to
        // revert back to the baseline.
        self.live = Some(record);

        if !tracked {
            log::trace!("Auto-save: change ignored, record has no identity yet");
            return;
        }
        if !differs {
            return;
        }

        match self.state {
            SaveState::Saving => {
                // The in-flight save keeps running; the accumulated
                // change is picked up once it settles. The debounce is
                // still (re)armed so a quiet period gates the follow-up.
                if self.enabled {
                    self.debounce_due = Some(now + self.config.debounce_delay());
                }
            }
            _ => {
                if self.state == SaveState::Error {
                    // The edit supersedes the scheduled retry; the next
                    // attempt follows the debounce quiet period instead.
                    self.retry_due = None;
                }
                self.state = SaveState::Unsaved;
                if self.enabled {
                    self.debounce_due = Some(now + self.config.debounce_delay());
                }
                log::trace!("Auto-save: marked dirty");
            }
        }
    }

    /// Fire any deadline that has come due.
    ///
    /// Hosts call this from their tick loop (or a wakeup scheduled via
    /// [`next_wake`](Self::next_wake)). Returns the save to execute, if
    /// one is now due. A debounce deadline that comes due while a save
    /// is in flight is coalesced into the pending flag rather than
    /// starting a second persist call.
    pub fn poll(&mut self, now: Instant) -> Option<SaveRequest<R>> {
        if self.disposed {
            return None;
        }

        if self.in_flight.is_some() {
            if self.debounce_due.is_some_and(|due| now >= due) {
                self.debounce_due = None;
                self.pending = true;
                log::trace!("Auto-save: debounce elapsed during save, deferred");
            }
            return None;
        }

        if self.retry_due.is_some_and(|due| now >= due) {
            self.retry_due = None;
            log::debug!("Auto-save: retrying failed save");
            return self.begin_save(now);
        }

        if self.debounce_due.is_some_and(|due| now >= due) {
            self.debounce_due = None;
            return self.begin_save(now);
        }

        None
    }

    /// Save immediately, bypassing the debounce window.
    ///
    /// Used for an explicit save action (save button, Ctrl+S). Returns
    /// the save to execute, or `None` when there is nothing to persist,
    /// the record has no identity, or a save is already in flight (in
    /// which case a follow-up is queued behind it).
    pub fn save_now(&mut self, now: Instant) -> Option<SaveRequest<R>> {
        if self.disposed {
            return None;
        }
        self.debounce_due = None;
        self.begin_save(now)
    }

    /// Flush pending changes because the editor is closing.
    ///
    /// Only acts when the state is `Unsaved`: the pending debounce is
    /// dropped and one immediate save attempt starts. A save already in
    /// flight is left to finish, a clean record needs nothing, and an
    /// `Error` is not silently retried at close time; retries continue
    /// only while the editor remains open.
    pub fn flush_on_close(&mut self, now: Instant) -> Option<SaveRequest<R>> {
        if self.disposed || self.state != SaveState::Unsaved {
            return None;
        }
        self.debounce_due = None;
        log::debug!("Auto-save: flushing on close");
        self.begin_save(now)
    }

    /// Report the outcome of a persist call.
    ///
    /// Stale tickets (superseded by `initialize` or `dispose`) are
    /// silently discarded. On success the snapshot that was sent becomes
    /// the new baseline; if edits accumulated during the flight the
    /// machine re-enters `Unsaved`, and if a trigger was deferred behind
    /// the single-flight gate the follow-up save starts immediately and
    /// is returned. On failure the machine enters `Error` and the retry
    /// deadline is armed at `now` plus the configured interval.
    pub fn save_finished<E: fmt::Display>(
        &mut self,
        ticket: SaveTicket,
        result: Result<(), E>,
        now: Instant,
    ) -> Option<SaveRequest<R>> {
        if self.disposed || self.in_flight != Some(ticket) {
            log::trace!("Auto-save: discarding stale save result");
            return None;
        }
        self.in_flight = None;

        match result {
            Ok(()) => {
                self.baseline = self.in_flight_record.take();
                self.last_saved_at = Some(now);
                self.last_error = None;
                self.retry_due = None;

                let deferred = std::mem::take(&mut self.pending);
                let dirty = match (&self.live, &self.baseline) {
                    (Some(live), Some(baseline)) => (self.detector)(live, baseline),
                    _ => false,
                };

                if dirty {
                    // Edits arrived while the save was in flight. The
                    // stale baseline comparison catches them: either a
                    // deferred trigger re-runs the save right away, or
                    // the debounce armed by those edits fires later.
                    self.state = SaveState::Unsaved;
                    if deferred {
                        return self.begin_save(now);
                    }
                } else {
                    self.state = SaveState::Saved;
                    self.debounce_due = None;
                }
                log::trace!("Auto-save: marked saved");
                None
            }
            Err(e) => {
                self.in_flight_record = None;
                self.pending = false;
                self.state = SaveState::Error;
                self.last_error = Some(e.to_string());
                if self.enabled {
                    self.retry_due = Some(now + self.config.retry_delay());
                }
                log::error!("Auto-save failed: {}", e);
                None
            }
        }
    }

    /// Tear the coordinator down, cancelling all timers.
    ///
    /// Call when the editor unmounts. Afterwards every method is a
    /// silent no-op, including deadline fires and persist completions
    /// that were already on their way.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.debounce_due = None;
        self.retry_due = None;
        self.in_flight = None;
        self.in_flight_record = None;
        self.pending = false;
        log::trace!("Auto-save: disposed");
    }

    /// Set whether automatic saving is enabled.
    ///
    /// Disabling cancels the scheduled deadlines; explicit
    /// [`save_now`](Self::save_now) and
    /// [`flush_on_close`](Self::flush_on_close) keep working.
    /// Re-enabling takes effect from the next edit.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.debounce_due = None;
            self.retry_due = None;
        }
        log::debug!("Auto-save: enabled = {}", enabled);
    }

    /// Check if automatic saving is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current persistence status.
    pub fn state(&self) -> SaveState {
        self.state
    }

    /// Check if the record has changes not confirmed persisted.
    pub fn is_dirty(&self) -> bool {
        self.state != SaveState::Saved
    }

    /// Time of the most recent successful persist, if any.
    pub fn last_saved_at(&self) -> Option<Instant> {
        self.last_saved_at
    }

    /// Get time since last successful persist (if any).
    pub fn time_since_last_save(&self) -> Option<std::time::Duration> {
        self.last_saved_at.map(|t| t.elapsed())
    }

    /// Failure text of the most recent persist error, if the machine is
    /// or was in `Error`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Server-side identity of the record being edited, if any.
    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    /// Earliest armed deadline, for hosts that schedule wakeups instead
    /// of polling every frame.
    pub fn next_wake(&self) -> Option<Instant> {
        match (self.debounce_due, self.retry_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Single entry point for every save trigger.
    ///
    /// Identity gate, then detector short-circuit (reaching here with a
    /// clean record settles the machine back to `Saved`), then the
    /// single-flight gate, then the transition to `Saving`.
    fn begin_save(&mut self, now: Instant) -> Option<SaveRequest<R>> {
        let record_id = self.record_id.clone()?;
        let (Some(live), Some(baseline)) = (&self.live, &self.baseline) else {
            return None;
        };

        if !(self.detector)(live, baseline) {
            self.state = SaveState::Saved;
            self.debounce_due = None;
            self.retry_due = None;
            return None;
        }

        if self.in_flight.is_some() {
            self.pending = true;
            return None;
        }

        let record = live.clone();
        let ticket = SaveTicket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        self.in_flight_record = Some(record.clone());
        self.state = SaveState::Saving;
        self.debounce_due = None;
        self.retry_due = None;

        log::debug!("Auto-save: saving record {}", record_id);
        Some(SaveRequest {
            ticket,
            record_id,
            record,
        })
    }

    #[cfg(test)]
    fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
