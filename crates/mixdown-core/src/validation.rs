//! Accumulating validation results shared by the graph and timeline checkers.
//!
//! Checks never stop at the first problem. Each finding is an [`Issue`] with a
//! stable [`IssueCode`] and a human-readable message; hard findings land in
//! `errors`, soft findings in `warnings`.

use serde::{Deserialize, Serialize};

/// Stable, machine-readable identifier for a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// An input references a label that no earlier definition produced.
    UndefinedInputLabel,
    /// The same output label is produced more than once.
    DuplicateOutputLabel,
    /// A label is reachable from itself.
    Cycle,
    /// A label uses characters outside `[A-Za-z0-9_]`.
    UnusualLabel,
    /// A definition has no inputs or no outputs once empty labels are dropped.
    EmptyDefinition,
    /// A raw stream never reaches the designated output.
    UnreachableInput,
    /// The designated output label is never produced.
    UndefinedOutput,
    /// Two cues of the same class play over each other.
    Overlap,
    /// A background cue is not attenuated enough under dialogue.
    Masking,
    /// Event times go backwards in input order.
    Ordering,
    /// An exit event has no matching entry event.
    Orphan,
    /// An event time is negative or not finite.
    InvalidTime,
}

impl IssueCode {
    /// Returns the snake_case name used in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UndefinedInputLabel => "undefined_input_label",
            Self::DuplicateOutputLabel => "duplicate_output_label",
            Self::Cycle => "cycle",
            Self::UnusualLabel => "unusual_label",
            Self::EmptyDefinition => "empty_definition",
            Self::UnreachableInput => "unreachable_input",
            Self::UndefinedOutput => "undefined_output",
            Self::Overlap => "overlap",
            Self::Masking => "masking",
            Self::Ordering => "ordering",
            Self::Orphan => "orphan",
            Self::InvalidTime => "invalid_time",
        }
    }
}

impl core::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Machine-readable kind.
    pub code: IssueCode,
    /// Human-readable description.
    pub message: String,
}

impl Issue {
    /// Creates an issue.
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for Issue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome of a validation pass.
///
/// `valid` is `true` exactly when `errors` is empty. Warnings never affect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` when no hard errors were found.
    pub valid: bool,
    /// Hard findings. Any entry blocks the operation.
    pub errors: Vec<Issue>,
    /// Soft findings for the caller to act on.
    pub warnings: Vec<Issue>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    /// Creates an empty, valid result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hard error and marks the result invalid.
    pub fn error(&mut self, code: IssueCode, message: impl Into<String>) {
        self.errors.push(Issue::new(code, message));
        self.valid = false;
    }

    /// Records a soft warning.
    pub fn warn(&mut self, code: IssueCode, message: impl Into<String>) {
        self.warnings.push(Issue::new(code, message));
    }

    /// Number of errors carrying `code`.
    pub fn error_count(&self, code: IssueCode) -> usize {
        self.errors.iter().filter(|i| i.code == code).count()
    }

    /// Number of warnings carrying `code`.
    pub fn warning_count(&self, code: IssueCode) -> usize {
        self.warnings.iter().filter(|i| i.code == code).count()
    }

    /// Joins all error messages with `"; "`.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
