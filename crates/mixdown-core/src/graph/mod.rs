//! Per-scene mix graph: construction, serialization and static validation.
//!
//! A scene's mix is an explicit typed graph ([`MixGraph`]) built from named
//! inputs and a ducking curve, then serialized to a filter script that the
//! external engine executes. Validation operates on the untyped
//! [`GraphDescription`], so scripts from any source can be checked the same way.
//!
//! # Lifecycle
//!
//! A graph exists for one scene's mix request only: built, validated, handed
//! to the engine, discarded.
//!
//! # Example
//!
//! ```rust
//! use mixdown_core::graph::{AudioInput, GainDefaults, MixPlan, Role, build_mix_plan, validate_description};
//!
//! let inputs = [
//!     AudioInput::new(Role::Dialogue, "dialogue.wav"),
//!     AudioInput::new(Role::Music, "bed.wav"),
//! ];
//! let plan = build_mix_plan(&inputs, &[], &GainDefaults::default()).unwrap();
//! if let MixPlan::Graph(graph) = &plan {
//!     let result = validate_description(&graph.describe());
//!     assert!(result.valid);
//! }
//! ```

pub mod builder;
pub mod node;
pub mod plan;
pub mod script;
pub mod validate;

pub use builder::{BuildError, GainDefaults, MIX_OUTPUT_LABEL, build_mix_plan};
pub use node::{AudioInput, Node, NodeId, Operation, Role, StreamRef};
pub use plan::{MixGraph, MixPlan};
pub use script::{
    FilterDefinition, GraphDescription, ScriptError, format_number, is_raw_specifier,
    parse_filter_script,
};
pub use validate::validate_description;
