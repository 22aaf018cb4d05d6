//! Asynchronous embedding of the save coordinator.
//!
//! [`AutoSaveDriver`] owns the persist operation alongside an
//! [`AutoSaveCoordinator`] and pumps the two against each other: poll for
//! due work, await the persist call, report the outcome back, and run any
//! follow-up save the completion produces. Hosts that manage their own
//! async plumbing (spawning futures and routing completion messages
//! through their update loop) can use the coordinator directly instead.

use std::fmt;

use web_time::Instant;

use crate::coordinator::{AutoSaveCoordinator, SaveRequest, SaveState};

/// Asynchronous persistence operation for a record.
///
/// Implementations perform the actual write (REST call, file write,
/// browser storage) and report failure through `Error`. A persist call
/// may be repeated with the same record after a transient failure, so it
/// must be safe to call again.
///
/// Futures are not required to be `Send`; the driver targets
/// single-threaded hosts.
pub trait Persister<R> {
    /// Error reported when the write fails.
    type Error: fmt::Display;

    /// Persist one record snapshot under its server-side identity.
    #[allow(async_fn_in_trait)]
    async fn persist(&mut self, record_id: &str, record: &R) -> Result<(), Self::Error>;
}

/// Drives an [`AutoSaveCoordinator`] against a [`Persister`].
///
/// Hosts call [`tick`](Self::tick) from their update loop and the
/// explicit [`save_now`](Self::save_now) /
/// [`flush_on_close`](Self::flush_on_close) entry points from their
/// keyboard and close handlers. Persist calls are awaited to completion
/// before the next one is issued, so they are strictly sequential.
pub struct AutoSaveDriver<R: 'static, P> {
    coordinator: AutoSaveCoordinator<R>,
    persister: P,
}

impl<R: Clone + 'static, P: Persister<R>> AutoSaveDriver<R, P> {
    /// Create a driver from a coordinator and a persist implementation.
    pub fn new(coordinator: AutoSaveCoordinator<R>, persister: P) -> Self {
        Self {
            coordinator,
            persister,
        }
    }

    /// Begin editing a record. See [`AutoSaveCoordinator::initialize`].
    pub fn initialize(&mut self, record: R, record_id: Option<String>) {
        self.coordinator.initialize(record, record_id);
    }

    /// Record the current editor snapshot after a field edit.
    pub fn note_change(&mut self, record: R) {
        self.coordinator.note_change(record, Instant::now());
    }

    /// Fire any deadline that has come due, performing the persist call
    /// if one starts. Returns true if a save ran.
    pub async fn tick(&mut self) -> bool {
        match self.coordinator.poll(Instant::now()) {
            Some(request) => {
                self.run(request).await;
                true
            }
            None => false,
        }
    }

    /// Save immediately, bypassing the debounce window. Returns true if
    /// a save ran.
    pub async fn save_now(&mut self) -> bool {
        match self.coordinator.save_now(Instant::now()) {
            Some(request) => {
                self.run(request).await;
                true
            }
            None => false,
        }
    }

    /// Flush pending changes because the editor is closing. Returns true
    /// if a save ran.
    pub async fn flush_on_close(&mut self) -> bool {
        match self.coordinator.flush_on_close(Instant::now()) {
            Some(request) => {
                self.run(request).await;
                true
            }
            None => false,
        }
    }

    /// Tear down, cancelling all scheduled work.
    pub fn dispose(&mut self) {
        self.coordinator.dispose();
    }

    /// Current persistence status.
    pub fn state(&self) -> SaveState {
        self.coordinator.state()
    }

    /// The coordinator, for the rest of its observable state.
    pub fn coordinator(&self) -> &AutoSaveCoordinator<R> {
        &self.coordinator
    }

    /// Mutable coordinator access, e.g. for
    /// [`set_enabled`](AutoSaveCoordinator::set_enabled).
    pub fn coordinator_mut(&mut self) -> &mut AutoSaveCoordinator<R> {
        &mut self.coordinator
    }

    /// The persist implementation.
    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// Execute one save and every follow-up its completion produces, so
    /// edits that accumulated during a persist call are written out
    /// without waiting for another external trigger.
    async fn run(&mut self, request: SaveRequest<R>) {
        let mut next = Some(request);
        while let Some(request) = next.take() {
            let outcome = self
                .persister
                .persist(&request.record_id, &request.record)
                .await;
            next = self
                .coordinator
                .save_finished(request.ticket, outcome, Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use pollster::block_on;

    use super::*;
    use crate::config::AutoSaveConfig;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        title: String,
    }

    fn note(title: &str) -> Note {
        Note {
            title: title.to_string(),
        }
    }

    /// In-memory persister that can fail a configured number of times
    /// before accepting writes.
    struct MemoryPersister {
        saved: Vec<(String, Note)>,
        failures_left: u32,
    }

    impl MemoryPersister {
        fn new() -> Self {
            Self {
                saved: Vec::new(),
                failures_left: 0,
            }
        }

        fn failing(times: u32) -> Self {
            Self {
                saved: Vec::new(),
                failures_left: times,
            }
        }
    }

    impl Persister<Note> for MemoryPersister {
        type Error = String;

        async fn persist(&mut self, record_id: &str, record: &Note) -> Result<(), String> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err("storage temporarily unavailable".to_string());
            }
            self.saved.push((record_id.to_string(), record.clone()));
            Ok(())
        }
    }

    fn driver(config: AutoSaveConfig, persister: MemoryPersister) -> AutoSaveDriver<Note, MemoryPersister> {
        AutoSaveDriver::new(AutoSaveCoordinator::new(config), persister)
    }

    #[test]
    fn test_save_now_persists_latest_snapshot() {
        let mut d = driver(AutoSaveConfig::default(), MemoryPersister::new());
        d.initialize(note("A"), Some("id1".into()));
        d.note_change(note("B"));

        assert!(block_on(d.save_now()));
        assert_eq!(d.state(), SaveState::Saved);
        assert_eq!(d.persister().saved, vec![("id1".to_string(), note("B"))]);
    }

    #[test]
    fn test_clean_record_saves_nothing() {
        let mut d = driver(AutoSaveConfig::default(), MemoryPersister::new());
        d.initialize(note("A"), Some("id1".into()));

        assert!(!block_on(d.save_now()));
        assert!(!block_on(d.tick()));
        assert!(d.persister().saved.is_empty());
    }

    #[test]
    fn test_tick_fires_elapsed_debounce() {
        // Zero debounce so the deadline is already due on the next tick.
        let config = AutoSaveConfig::new().with_debounce_ms(0);
        let mut d = driver(config, MemoryPersister::new());
        d.initialize(note("A"), Some("id1".into()));
        d.note_change(note("B"));

        assert!(block_on(d.tick()));
        assert_eq!(d.state(), SaveState::Saved);
        assert_eq!(d.persister().saved.len(), 1);

        // Nothing left to do.
        assert!(!block_on(d.tick()));
    }

    #[test]
    fn test_failure_then_retry_recovers() {
        let config = AutoSaveConfig::new().with_debounce_ms(0).with_retry_ms(0);
        let mut d = driver(config, MemoryPersister::failing(1));
        d.initialize(note("A"), Some("id1".into()));
        d.note_change(note("B"));

        assert!(block_on(d.tick()));
        assert_eq!(d.state(), SaveState::Error);
        assert!(d.coordinator().last_error().is_some());
        assert!(d.persister().saved.is_empty());

        assert!(block_on(d.tick()));
        assert_eq!(d.state(), SaveState::Saved);
        assert_eq!(d.persister().saved, vec![("id1".to_string(), note("B"))]);
    }

    #[test]
    fn test_flush_on_close_writes_pending_changes() {
        let mut d = driver(AutoSaveConfig::default(), MemoryPersister::new());
        d.initialize(note("A"), Some("id1".into()));
        d.note_change(note("B"));

        assert!(block_on(d.flush_on_close()));
        assert_eq!(d.persister().saved, vec![("id1".to_string(), note("B"))]);

        d.dispose();
        assert!(!block_on(d.tick()));
    }

    #[test]
    fn test_record_without_identity_never_persists() {
        let config = AutoSaveConfig::new().with_debounce_ms(0);
        let mut d = driver(config, MemoryPersister::new());
        d.initialize(note("draft"), None);
        d.note_change(note("draft 2"));

        assert!(!block_on(d.tick()));
        assert!(!block_on(d.save_now()));
        assert!(d.persister().saved.is_empty());
    }
}
