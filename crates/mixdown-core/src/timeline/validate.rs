//! Timeline consistency checks.
//!
//! Events are processed in ascending `at` order (stable on ties), tracked per
//! cue class. Each `*_in` opens a span `{start, end = +∞}`; the matching
//! `*_out` closes it. Findings accumulate; data problems never panic or return
//! early.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::event::{CueClass, TimelineEvent, sorted_indices};
use crate::validation::{IssueCode, ValidationResult};

/// Tunable margins for the timeline checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineRules {
    /// Minimum music duck magnitude under dialogue, in dB.
    pub min_music_duck_db: f64,
    /// Maximum ambience gain under dialogue, in dB.
    pub max_ambience_gain_db: f64,
    /// Fade-out window assumed when an exit declares none, in seconds.
    pub default_fade_sec: f64,
}

impl Default for TimelineRules {
    fn default() -> Self {
        Self {
            min_music_duck_db: 6.0,
            max_ambience_gain_db: -18.0,
            default_fade_sec: 2.0,
        }
    }
}

/// A cue's lifetime on the timeline.
#[derive(Debug, Clone, Copy)]
struct Span<'a> {
    class: CueClass,
    entry: &'a TimelineEvent,
    end: f64,
    fade_window: f64,
}

impl Span<'_> {
    fn id(&self) -> &str {
        &self.entry.cue_id
    }

    fn start(&self) -> f64 {
        self.entry.at
    }

    fn describe_end(&self) -> String {
        if self.end.is_infinite() {
            "never closes".to_string()
        } else {
            format!("ends at {:.3}s with {:.3}s fade", self.end, self.fade_window)
        }
    }
}

/// Spans built from sorted events, plus which sorted event opens/closes which span.
struct Pairing<'a> {
    spans: Vec<Span<'a>>,
    opens: HashMap<usize, usize>,
    closes: HashMap<usize, usize>,
}

fn pair_spans<'a>(events: &'a [TimelineEvent], order: &[usize], rules: &TimelineRules) -> Pairing<'a> {
    let mut spans: Vec<Span<'a>> = Vec::new();
    let mut opens = HashMap::new();
    let mut closes = HashMap::new();
    let mut open: HashMap<(CueClass, &str), usize> = HashMap::new();

    for &idx in order {
        let ev = &events[idx];
        let key = (ev.kind.class(), ev.cue_id.as_str());
        if ev.kind.is_entry() {
            spans.push(Span {
                class: ev.kind.class(),
                entry: ev,
                end: f64::INFINITY,
                fade_window: rules.default_fade_sec,
            });
            open.insert(key, spans.len() - 1);
            opens.insert(idx, spans.len() - 1);
        } else if let Some(span_idx) = open.remove(&key) {
            let span = &mut spans[span_idx];
            span.end = ev.at;
            span.fade_window = ev.fade_sec.unwrap_or(rules.default_fade_sec);
            closes.insert(idx, span_idx);
        }
    }

    Pairing {
        spans,
        opens,
        closes,
    }
}

/// Validate a timeline without modifying it.
///
/// - **time**: negative or non-finite `at` → error
/// - **ordering**: `at` decreasing anywhere in input order → error per regression
/// - **overlap**: a new entry while another cue of the same class is still
///   playing outside its fade-out window → error for music, warning for
///   ambience; an open-ended cue overlaps every later entry
/// - **masking**: music under dialogue with duck magnitude below
///   `min_music_duck_db`, ambience with gain above `max_ambience_gain_db` → warning
/// - **orphan**: an exit with no entry of the same class and id anywhere → error
pub fn validate_timeline(events: &[TimelineEvent], rules: &TimelineRules) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_times(events, &mut result);
    check_ordering(events, &mut result);

    let order = sorted_indices(events);
    let pairing = pair_spans(events, &order, rules);
    check_overlaps(&order, &pairing, &mut result);
    check_masking(&pairing.spans, rules, &mut result);
    check_orphans(events, &mut result);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        events = events.len(),
        spans = pairing.spans.len(),
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "timeline_validate"
    );
    result
}

fn check_times(events: &[TimelineEvent], result: &mut ValidationResult) {
    for (i, ev) in events.iter().enumerate() {
        if !ev.at.is_finite() || ev.at < 0.0 {
            result.error(
                IssueCode::InvalidTime,
                format!("event #{i} ({} '{}') has invalid time {}", ev.kind, ev.cue_id, ev.at),
            );
        }
    }
}

fn check_ordering(events: &[TimelineEvent], result: &mut ValidationResult) {
    for (i, pair) in events.windows(2).enumerate() {
        let (prev, ev) = (&pair[0], &pair[1]);
        if ev.at < prev.at {
            result.error(
                IssueCode::Ordering,
                format!(
                    "event #{} ({} '{}') at {:.3}s comes after event #{i} at {:.3}s",
                    i + 1,
                    ev.kind,
                    ev.cue_id,
                    ev.at,
                    prev.at
                ),
            );
        }
    }
}

fn check_overlaps(order: &[usize], pairing: &Pairing<'_>, result: &mut ValidationResult) {
    let mut active: Vec<usize> = Vec::new();

    for idx in order {
        if let Some(&closed) = pairing.closes.get(idx) {
            active.retain(|&s| s != closed);
            continue;
        }
        let Some(&opened) = pairing.opens.get(idx) else {
            continue;
        };
        let new = &pairing.spans[opened];
        let t = new.start();

        if new.class != CueClass::Dialogue {
            for &other_idx in &active {
                let other = &pairing.spans[other_idx];
                if other.class != new.class || other.id() == new.id() || other.end <= t {
                    continue;
                }
                let overlapping = other.end.is_infinite() || t < other.end - other.fade_window;
                if !overlapping {
                    continue;
                }
                let message = format!(
                    "{} cue '{}' enters at {t:.3}s while '{}' is still playing ({})",
                    new.class,
                    new.id(),
                    other.id(),
                    other.describe_end()
                );
                if new.class == CueClass::Music {
                    result.error(IssueCode::Overlap, message);
                } else {
                    result.warn(IssueCode::Overlap, message);
                }
            }
        }
        active.push(opened);
    }
}

fn check_masking(spans: &[Span<'_>], rules: &TimelineRules, result: &mut ValidationResult) {
    for line in spans.iter().filter(|s| s.class == CueClass::Dialogue) {
        for cue in spans.iter().filter(|s| s.class != CueClass::Dialogue) {
            if !(cue.start() < line.end && cue.end > line.start()) {
                continue;
            }
            match cue.class {
                CueClass::Music => {
                    let duck = cue.entry.duck_db.unwrap_or(0.0);
                    if duck.abs() < rules.min_music_duck_db {
                        result.warn(
                            IssueCode::Masking,
                            format!(
                                "dialogue line '{}' is under music '{}' ducked only {:.1}dB; duck at least {}dB",
                                line.id(),
                                cue.id(),
                                duck.abs(),
                                rules.min_music_duck_db
                            ),
                        );
                    }
                }
                CueClass::Ambience => {
                    let gain = cue.entry.gain_db.unwrap_or(0.0);
                    if gain > rules.max_ambience_gain_db {
                        result.warn(
                            IssueCode::Masking,
                            format!(
                                "dialogue line '{}' is under ambience '{}' at {gain:.1}dB; keep ambience at or below {}dB",
                                line.id(),
                                cue.id(),
                                rules.max_ambience_gain_db
                            ),
                        );
                    }
                }
                CueClass::Dialogue => {}
            }
        }
    }
}

fn check_orphans(events: &[TimelineEvent], result: &mut ValidationResult) {
    let entered: HashSet<(CueClass, &str)> = events
        .iter()
        .filter(|e| e.kind.is_entry())
        .map(|e| (e.kind.class(), e.cue_id.as_str()))
        .collect();

    for (i, ev) in events.iter().enumerate() {
        if ev.kind.is_exit() && !entered.contains(&(ev.kind.class(), ev.cue_id.as_str())) {
            result.error(
                IssueCode::Orphan,
                format!(
                    "event #{i} ({} '{}') at {:.3}s has no matching {}_in",
                    ev.kind,
                    ev.cue_id,
                    ev.at,
                    ev.kind.class()
                ),
            );
        }
    }
}
