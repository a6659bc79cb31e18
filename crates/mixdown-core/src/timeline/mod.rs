//! Cue timeline validation and repair.
//!
//! A timeline is a flat list of `*_in` / `*_out` events for three cue classes
//! (music, ambience, dialogue). [`validate_timeline`] reports overlaps,
//! masking, ordering regressions and orphan exits without touching the input;
//! [`autofix_timeline`] returns a sorted copy with orphan exits removed.
//!
//! ```
//! use mixdown_core::timeline::{EventKind, TimelineEvent, TimelineRules, autofix_timeline, validate_timeline};
//!
//! let events = vec![
//!     TimelineEvent::new(EventKind::MusicOut, "A", 3.0),
//!     TimelineEvent::new(EventKind::MusicIn, "A", 0.0),
//! ];
//! let report = validate_timeline(&events, &TimelineRules::default());
//! assert!(!report.valid);
//!
//! let fixed = autofix_timeline(&events);
//! assert!(validate_timeline(&fixed, &TimelineRules::default()).valid);
//! ```

pub mod autofix;
pub mod event;
pub mod validate;

pub use autofix::autofix_timeline;
pub use event::{CueClass, EventKind, TimelineEvent};
pub use validate::{TimelineRules, validate_timeline};
