//! Static validation of graph descriptions.
//!
//! All checks accumulate into one [`ValidationResult`]; nothing short-circuits
//! except the cycle search, which stops after the first back edge. No repair is
//! attempted. A mix must not reach the engine while any error is present.

use std::collections::{HashMap, HashSet, VecDeque};

use super::script::{GraphDescription, is_raw_specifier};
use crate::validation::{IssueCode, ValidationResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Returns `true` if every character is ASCII alphanumeric or `_`.
fn is_identifier(label: &str) -> bool {
    label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Validate a graph description.
///
/// Checks, in order:
///
/// 1. every non-raw input names an output defined by an *earlier* definition
/// 2. no output label is defined twice
/// 3. no label is reachable from itself (one error for the first cycle found)
/// 4. labels outside `[A-Za-z0-9_]` (warning)
/// 5. definitions with no inputs or no outputs (warning)
/// 6. with a designated output: it is defined, and every used raw stream reaches it
pub fn validate_description(desc: &GraphDescription) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_references(desc, &mut result);
    check_cycles(desc, &mut result);
    if let Some(output) = &desc.output {
        check_reachability(desc, output, &mut result);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        definitions = desc.definitions.len(),
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "graph_validate"
    );
    result
}

/// Rules 1, 2, 4 and 5 in a single pass over the definitions.
fn check_references(desc: &GraphDescription, result: &mut ValidationResult) {
    let mut defined: HashSet<&str> = HashSet::new();
    let mut flagged: HashSet<&str> = HashSet::new();

    for (i, def) in desc.definitions.iter().enumerate() {
        for input in &def.inputs {
            if is_raw_specifier(input) {
                continue;
            }
            if !defined.contains(input.as_str()) {
                result.error(
                    IssueCode::UndefinedInputLabel,
                    format!(
                        "undefined input label '{input}' in definition #{i} ({})",
                        def.filter
                    ),
                );
            }
        }

        for output in &def.outputs {
            if !defined.insert(output.as_str()) {
                result.error(
                    IssueCode::DuplicateOutputLabel,
                    format!(
                        "duplicate output label '{output}' in definition #{i} ({})",
                        def.filter
                    ),
                );
            }
        }

        for label in def.inputs.iter().chain(&def.outputs) {
            if !is_raw_specifier(label) && !is_identifier(label) && flagged.insert(label.as_str())
            {
                result.warn(
                    IssueCode::UnusualLabel,
                    format!("label '{label}' contains characters outside [A-Za-z0-9_]"),
                );
            }
        }

        let missing = match (def.inputs.is_empty(), def.outputs.is_empty()) {
            (true, true) => Some("inputs or outputs"),
            (true, false) => Some("inputs"),
            (false, true) => Some("outputs"),
            (false, false) => None,
        };
        if let Some(missing) = missing {
            result.warn(
                IssueCode::EmptyDefinition,
                format!("definition #{i} ({}) has no {missing}", def.filter),
            );
        }
    }
}

/// Label adjacency: label → outputs of every definition consuming it.
fn label_edges(desc: &GraphDescription) -> HashMap<&str, Vec<&str>> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for def in &desc.definitions {
        for input in &def.inputs {
            edges
                .entry(input.as_str())
                .or_default()
                .extend(def.outputs.iter().map(String::as_str));
        }
    }
    edges
}

/// Rule 3: white/gray/black depth-first search with an explicit stack.
fn check_cycles(desc: &GraphDescription, result: &mut ValidationResult) {
    let edges = label_edges(desc);

    // Defined labels in first-definition order, so the report is deterministic.
    let mut labels: Vec<&str> = Vec::new();
    let mut color: HashMap<&str, Color> = HashMap::new();
    for def in &desc.definitions {
        for output in &def.outputs {
            if color.insert(output.as_str(), Color::White).is_none() {
                labels.push(output.as_str());
            }
        }
    }

    for &root in &labels {
        if color[root] != Color::White {
            continue;
        }
        color.insert(root, Color::Gray);
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some(top) = stack.last_mut() {
            let (label, next) = *top;
            let successors = edges.get(label).map_or(&[][..], Vec::as_slice);
            if next >= successors.len() {
                color.insert(label, Color::Black);
                stack.pop();
                continue;
            }
            top.1 += 1;
            let child = successors[next];
            match color.get(child).copied() {
                Some(Color::Gray) => {
                    let start = stack.iter().position(|&(l, _)| l == child).unwrap_or(0);
                    let mut path: Vec<&str> = stack[start..].iter().map(|&(l, _)| l).collect();
                    path.push(child);
                    result.error(
                        IssueCode::Cycle,
                        format!("cycle detected: {}", path.join(" -> ")),
                    );
                    return;
                }
                Some(Color::White) => {
                    color.insert(child, Color::Gray);
                    stack.push((child, 0));
                }
                Some(Color::Black) | None => {}
            }
        }
    }
}

/// Rule 6: the designated output exists and every used raw stream flows into it.
fn check_reachability(desc: &GraphDescription, output: &str, result: &mut ValidationResult) {
    let produced = desc
        .definitions
        .iter()
        .any(|d| d.outputs.iter().any(|o| o == output));
    if !produced {
        result.error(
            IssueCode::UndefinedOutput,
            format!("designated output '{output}' is never defined"),
        );
        return;
    }

    let edges = label_edges(desc);
    let mut raws: Vec<&str> = Vec::new();
    for def in &desc.definitions {
        for input in &def.inputs {
            if is_raw_specifier(input) && !raws.contains(&input.as_str()) {
                raws.push(input.as_str());
            }
        }
    }

    for raw in raws {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([raw]);
        let mut reached = false;
        while let Some(label) = queue.pop_front() {
            if label == output {
                reached = true;
                break;
            }
            if !seen.insert(label) {
                continue;
            }
            if let Some(next) = edges.get(label) {
                queue.extend(next.iter().copied());
            }
        }
        if !reached {
            result.error(
                IssueCode::UnreachableInput,
                format!("raw stream '{raw}' does not reach output '{output}'"),
            );
        }
    }
}
