//! Filter-script parser and serializer.
//!
//! The engine consumes a mix graph as a textual filter script:
//!
//! ```text
//! [1:a]volume=-12dB[music_gain];[0:a][music_gain]amix=inputs=2:duration=longest:dropout_transition=0[out]
//! ```
//!
//! ## Grammar
//!
//! ```text
//! script     ::= definition ( ';' definition )*
//! definition ::= label* filter label*
//! label      ::= '[' text ']'
//! filter     ::= name ( '=' args )?
//! args       ::= ( quoted | [^;\[] )*
//! quoted     ::= '\'' [^']* '\''
//! ```
//!
//! Two-phase design: parse → [`GraphDescription`], then validate with
//! [`validate_description`](super::validate_description). Parsing only rejects
//! text that has no structure at all; reference problems are validation findings.

use serde::{Deserialize, Serialize};

/// Errors from filter-script parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// The script contains no definitions.
    #[error("empty filter script")]
    Empty,
    /// A `[` without a closing `]`.
    #[error("unclosed label at position {pos} (expected ']')")]
    UnclosedLabel {
        /// Byte position of the opening bracket.
        pos: usize,
    },
    /// A `'` without a closing quote inside filter arguments.
    #[error("unclosed quote at position {pos}")]
    UnclosedQuote {
        /// Byte position of the opening quote.
        pos: usize,
    },
    /// A definition has labels but no filter name.
    #[error("missing filter name at position {pos}")]
    MissingFilterName {
        /// Byte position where the name was expected.
        pos: usize,
    },
    /// Trailing text after a definition's output labels.
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar {
        /// Byte position in the input string.
        pos: usize,
        /// The unexpected character.
        ch: char,
    },
}

/// One filter invocation: labelled inputs, a filter with arguments, labelled outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Filter name (e.g. `"volume"`).
    pub filter: String,
    /// Raw argument text after `=`, without surrounding whitespace.
    #[serde(default)]
    pub args: String,
    /// Input labels in order. Raw stream specifiers included.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output labels in order.
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl FilterDefinition {
    /// Creates a definition with no labels.
    pub fn new(filter: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            args: args.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends an input label.
    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    /// Appends an output label.
    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }
}

impl core::fmt::Display for FilterDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for label in &self.inputs {
            write!(f, "[{label}]")?;
        }
        f.write_str(&self.filter)?;
        if !self.args.is_empty() {
            write!(f, "={}", self.args)?;
        }
        for label in &self.outputs {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}

/// An untyped graph: ordered definitions plus an optional designated output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    /// Definitions in script order.
    pub definitions: Vec<FilterDefinition>,
    /// Label the engine should map as the final result, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl GraphDescription {
    /// Creates a description from definitions with no designated output.
    pub fn new(definitions: Vec<FilterDefinition>) -> Self {
        Self {
            definitions,
            output: None,
        }
    }

    /// Designates the final output label.
    pub fn with_output(mut self, label: impl Into<String>) -> Self {
        self.output = Some(label.into());
        self
    }

    /// Serialized filter script.
    pub fn to_script(&self) -> String {
        self.to_string()
    }
}

impl core::fmt::Display for GraphDescription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, def) in self.definitions.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{def}")?;
        }
        Ok(())
    }
}

/// Returns `true` for raw stream specifiers: `N`, `N:a`, `N:a:M` (also `v`, `s`).
pub fn is_raw_specifier(label: &str) -> bool {
    let mut parts = label.split(':');
    let Some(index) = parts.next() else {
        return false;
    };
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some("a" | "v" | "s") => match parts.next() {
            None => true,
            Some(sub) => {
                !sub.is_empty() && sub.bytes().all(|b| b.is_ascii_digit()) && parts.next().is_none()
            }
        },
        Some(_) => false,
    }
}

/// Formats a number for filter arguments: at most 6 decimals, no trailing zeros.
pub fn format_number(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Recursive descent parser for filter scripts.
///
/// LL(1), single byte lookahead.
struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Entry: `script ::= definition ( ';' definition )*`
    fn parse_script(&mut self) -> Result<Vec<FilterDefinition>, ScriptError> {
        let mut defs = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b';') => {
                    // Empty statement.
                    self.pos += 1;
                }
                Some(_) => {
                    defs.push(self.parse_definition()?);
                    self.skip_ws();
                    match self.peek() {
                        None => break,
                        Some(b';') => self.pos += 1,
                        Some(b) => {
                            return Err(ScriptError::UnexpectedChar {
                                pos: self.pos,
                                ch: b as char,
                            });
                        }
                    }
                }
            }
        }
        Ok(defs)
    }

    /// `definition ::= label* filter label*`
    fn parse_definition(&mut self) -> Result<FilterDefinition, ScriptError> {
        let inputs = self.parse_labels()?;
        self.skip_ws();
        let name_pos = self.pos;
        let filter = self.parse_name();
        if filter.is_empty() {
            return Err(ScriptError::MissingFilterName { pos: name_pos });
        }
        let args = if self.peek() == Some(b'=') {
            self.pos += 1;
            self.parse_args()?
        } else {
            String::new()
        };
        let outputs = self.parse_labels()?;
        Ok(FilterDefinition {
            filter,
            args,
            inputs,
            outputs,
        })
    }

    /// `label*`. Labels are trimmed and empty labels are dropped.
    fn parse_labels(&mut self) -> Result<Vec<String>, ScriptError> {
        let mut labels = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'[') {
                return Ok(labels);
            }
            let open = self.pos;
            let close = self.input[open + 1..]
                .find(']')
                .ok_or(ScriptError::UnclosedLabel { pos: open })?;
            let text = self.input[open + 1..open + 1 + close].trim();
            if !text.is_empty() {
                labels.push(text.to_string());
            }
            self.pos = open + close + 2;
        }
    }

    /// Filter name: everything up to `=`, `[`, `;`, or end.
    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'=' | b'[' | b';') {
                break;
            }
            self.pos += 1;
        }
        self.input[start..self.pos].trim().to_string()
    }

    /// Arguments: up to an unquoted `[` or `;`.
    fn parse_args(&mut self) -> Result<String, ScriptError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    let open = self.pos;
                    let close = self.input[open + 1..]
                        .find('\'')
                        .ok_or(ScriptError::UnclosedQuote { pos: open })?;
                    self.pos = open + close + 2;
                }
                b'[' | b';' => break,
                _ => self.pos += 1,
            }
        }
        Ok(self.input[start..self.pos].trim().to_string())
    }
}

/// Parse a filter script into a [`GraphDescription`] with no designated output.
///
/// # Errors
///
/// Returns [`ScriptError`] on structural syntax errors (unclosed labels or
/// quotes, missing filter names, empty input).
pub fn parse_filter_script(input: &str) -> Result<GraphDescription, ScriptError> {
    let mut parser = Parser::new(input);
    let definitions = parser.parse_script()?;
    if definitions.is_empty() {
        return Err(ScriptError::Empty);
    }
    Ok(GraphDescription::new(definitions))
}
