//! Timeline repair.

use std::collections::HashSet;

use super::event::{CueClass, TimelineEvent, sorted_indices};

/// Returns a repaired copy of `events`. The input is never modified.
///
/// Events are stably sorted by `at`; an exit is kept only if an entry of the
/// same class and id was kept before it. Overlaps and masking are left as is.
/// Applying this twice gives the same result as applying it once.
pub fn autofix_timeline(events: &[TimelineEvent]) -> Vec<TimelineEvent> {
    let mut opened: HashSet<(CueClass, &str)> = HashSet::new();
    let mut fixed = Vec::with_capacity(events.len());

    for idx in sorted_indices(events) {
        let ev = &events[idx];
        let key = (ev.kind.class(), ev.cue_id.as_str());
        if ev.kind.is_entry() {
            opened.insert(key);
        } else if !opened.contains(&key) {
            #[cfg(feature = "tracing")]
            tracing::debug!(kind = %ev.kind, cue = %ev.cue_id, at = ev.at, "dropping orphan exit");
            continue;
        }
        fixed.push(ev.clone());
    }
    fixed
}
