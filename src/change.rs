//! Change detection for deciding whether a save is warranted.
//!
//! The coordinator never inspects record contents itself; it asks a
//! detector whether the current snapshot differs from the baseline. The
//! default detector is structural equality over the whole record. Editors
//! that only persist a subset of their state (e.g. title and body, but
//! not cursor position) supply a projection via [`differs_by`] or a
//! custom closure.

/// Decides whether `current` differs from `baseline` enough to warrant a
/// save.
///
/// Detectors must be pure and deterministic: same inputs, same answer,
/// no side effects. Returns `true` when the snapshots differ.
pub type ChangeDetector<R> = Box<dyn Fn(&R, &R) -> bool>;

/// Build a detector that compares a projection of the record.
///
/// The projection extracts the fields that actually get persisted;
/// anything outside it (selection state, scroll offsets, derived caches)
/// never triggers a save.
pub fn differs_by<R, K, F>(project: F) -> impl Fn(&R, &R) -> bool
where
    K: PartialEq,
    F: Fn(&R) -> K,
{
    move |current, baseline| project(current) != project(baseline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        title: String,
        body: String,
        cursor: usize,
    }

    fn note(title: &str, body: &str, cursor: usize) -> Note {
        Note {
            title: title.to_string(),
            body: body.to_string(),
            cursor,
        }
    }

    #[test]
    fn test_projection_ignores_unlisted_fields() {
        let detector = differs_by(|n: &Note| (n.title.clone(), n.body.clone()));

        let baseline = note("a", "b", 0);
        let moved_cursor = note("a", "b", 42);
        let edited = note("a", "c", 42);

        assert!(!detector(&moved_cursor, &baseline));
        assert!(detector(&edited, &baseline));
    }

    #[test]
    fn test_structural_equality_sees_every_field() {
        let detector: ChangeDetector<Note> = Box::new(|c, b| c != b);

        let baseline = note("a", "b", 0);
        let moved_cursor = note("a", "b", 42);

        assert!(detector(&moved_cursor, &baseline));
    }
}
