//! Typed mix graph and the per-scene mix plan.
//!
//! [`MixGraph`] is an explicit typed graph: raw inputs, nodes in definition
//! order, and a designated output node. It serializes to a
//! [`GraphDescription`] for validation and for the engine, so validation never
//! depends on the engine.

use serde::{Deserialize, Serialize};

use super::node::{AudioInput, Node, NodeId, Operation, StreamRef};
use super::script::{FilterDefinition, GraphDescription};

/// Directed acyclic mix graph for one scene.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add raw inputs: [`add_input()`](Self::add_input)
/// 3. Add nodes in dependency order: [`add_node()`](Self::add_node)
/// 4. Designate the result: [`set_output()`](Self::set_output)
/// 5. Serialize: [`describe()`](Self::describe)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixGraph {
    inputs: Vec<AudioInput>,
    nodes: Vec<Node>,
    output: Option<NodeId>,
}

impl MixGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw input and returns a reference to its stream.
    pub fn add_input(&mut self, input: AudioInput) -> StreamRef {
        self.inputs.push(input);
        StreamRef::Raw(self.inputs.len() - 1)
    }

    /// Adds a node reading `inputs` and writing `output`. Returns the new node's ID.
    pub fn add_node(
        &mut self,
        operation: Operation,
        inputs: Vec<StreamRef>,
        output: impl Into<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let output = output.into();
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: {} node {id} -> [{output}]", operation.name());
        self.nodes.push(Node {
            id,
            operation,
            inputs,
            output,
        });
        id
    }

    /// Designates the node whose output is the mix result.
    pub fn set_output(&mut self, id: NodeId) {
        self.output = Some(id);
    }

    /// Raw inputs in stream-index order.
    pub fn inputs(&self) -> &[AudioInput] {
        &self.inputs
    }

    /// Nodes in definition order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The designated output node, if set.
    pub fn output(&self) -> Option<NodeId> {
        self.output
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Label of the designated output node.
    pub fn output_label(&self) -> Option<&str> {
        self.output
            .and_then(|id| self.node(id))
            .map(|n| n.output.as_str())
    }

    /// Operation names in definition order.
    pub fn operation_names(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|n| n.operation.name()).collect()
    }

    fn stream_label(&self, stream: StreamRef) -> String {
        match stream {
            StreamRef::Raw(index) => StreamRef::raw_specifier(index),
            // A foreign NodeId serializes to a label no node defines, which
            // validation then reports as undefined.
            StreamRef::Node(id) => self
                .node(id)
                .map_or_else(|| format!("node{}", id.0), |n| n.output.clone()),
        }
    }

    /// Serializes the graph into an untyped description.
    pub fn describe(&self) -> GraphDescription {
        let definitions = self
            .nodes
            .iter()
            .map(|node| FilterDefinition {
                filter: node.operation.filter_name().to_string(),
                args: node.operation.filter_args(node.inputs.len()),
                inputs: node.inputs.iter().map(|&s| self.stream_label(s)).collect(),
                outputs: vec![node.output.clone()],
            })
            .collect();
        GraphDescription {
            definitions,
            output: self.output_label().map(str::to_string),
        }
    }

    /// Serialized filter script.
    pub fn to_filter_script(&self) -> String {
        self.describe().to_script()
    }
}

/// How a scene is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MixPlan {
    /// Dialogue only: copy the source through untouched, then normalize.
    PassThrough {
        /// The dialogue input.
        dialogue: AudioInput,
    },
    /// Full graph render.
    Graph(MixGraph),
}

impl MixPlan {
    /// Raw inputs the plan reads.
    pub fn inputs(&self) -> Vec<&AudioInput> {
        match self {
            Self::PassThrough { dialogue } => vec![dialogue],
            Self::Graph(graph) => graph.inputs().iter().collect(),
        }
    }

    /// Ordered operation names applied by the plan.
    pub fn operation_names(&self) -> Vec<&'static str> {
        match self {
            Self::PassThrough { .. } => vec!["copy"],
            Self::Graph(graph) => graph.operation_names(),
        }
    }

    /// Returns `true` for the dialogue-only short-circuit.
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough { .. })
    }
}
