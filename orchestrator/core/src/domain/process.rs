// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process Domain Model
//!
//! Structural model of a process definition: nodes (events, tasks, gateways,
//! boundary events, subprocesses), directed sequence flows and the boundary
//! event index. Pure data and query layer, no execution semantics.
//!
//! # Architectural Context
//!
//! - **Bounded Context:** Process Navigation Context
//! - **Aggregate Root:** ProcessModel
//!
//! # Design Principles
//!
//! 1. **Immutability:** Models are immutable once loaded
//! 2. **Closed Kinds:** Every element is one `NodeKind` variant, validated at load time
//! 3. **Self-Validating:** `ProcessModel::new` enforces all structural invariants

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

// ============================================================================
// Value Objects: Node Kinds
// ============================================================================

/// Kind of a process element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    StartEvent,
    EndEvent,
    Task,
    ExclusiveGateway,
    ParallelGateway,
    InclusiveGateway,
    BoundaryEvent,
    SubProcess,
}

impl NodeKind {
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            Self::ExclusiveGateway | Self::ParallelGateway | Self::InclusiveGateway
        )
    }

    pub fn is_activity(&self) -> bool {
        matches!(self, Self::Task | Self::SubProcess)
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Self::StartEvent | Self::EndEvent | Self::BoundaryEvent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartEvent => "startEvent",
            Self::EndEvent => "endEvent",
            Self::Task => "task",
            Self::ExclusiveGateway => "exclusiveGateway",
            Self::ParallelGateway => "parallelGateway",
            Self::InclusiveGateway => "inclusiveGateway",
            Self::BoundaryEvent => "boundaryEvent",
            Self::SubProcess => "subProcess",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse. Separators (`_`, `-`, whitespace) are ignored so
/// `startEvent`, `STARTEVENT` and `start_event` all resolve to the same kind.
impl FromStr for NodeKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        Ok(match normalized.as_str() {
            "startevent" => Self::StartEvent,
            "endevent" => Self::EndEvent,
            "task" | "usertask" | "servicetask" | "scripttask" => Self::Task,
            "exclusivegateway" => Self::ExclusiveGateway,
            "parallelgateway" => Self::ParallelGateway,
            "inclusivegateway" => Self::InclusiveGateway,
            "boundaryevent" => Self::BoundaryEvent,
            "subprocess" => Self::SubProcess,
            _ => return Err(ParseError::UnknownElementKind(s.to_string())),
        })
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A single element of a process graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: Option<String>,
    /// Process this node belongs to
    pub process_id: String,
    /// Enclosing subprocess, if the node is nested
    pub parent: Option<String>,
    /// Default outgoing flow (gateways only)
    pub default_flow: Option<String>,
    /// Activity this boundary event is attached to (boundary events only)
    pub attached_to: Option<String>,
    /// Whether triggering the boundary event interrupts its activity
    pub cancel_activity: bool,
    /// Boundary trigger kind (`timer`, `error`, `message`, ...)
    pub event_trigger: Option<String>,
    /// Multi-instance cardinality (tasks only)
    pub loop_cardinality: Option<u32>,
}

impl Node {
    /// Create a plain node with no optional attributes.
    pub fn new(id: impl Into<String>, kind: NodeKind, process_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            process_id: process_id.into(),
            parent: None,
            default_flow: None,
            attached_to: None,
            cancel_activity: true,
            event_trigger: None,
            loop_cardinality: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Directed sequence flow between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub source: String,
    pub target: String,
    pub condition: Option<String>,
    pub process_id: String,
}

/// Metadata of a process definition document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessMetadata {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// A top-level process declared in a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: String,
    pub name: Option<String>,
    pub is_executable: bool,
}

// ============================================================================
// Aggregate Root: ProcessModel
// ============================================================================

/// Addressable graph built from a process definition.
///
/// # Invariants
/// - At least one process
/// - Element ids are unique across the whole definition
/// - Every flow's source and target resolve to a known node in the same scope
/// - Default flows are outgoing flows of their gateway
/// - Boundary events are attached to an activity
/// - Every process and subprocess has a start event
#[derive(Debug, Clone)]
pub struct ProcessModel {
    pub metadata: ProcessMetadata,
    processes: Vec<ProcessDefinition>,
    nodes: HashMap<String, Node>,
    node_order: Vec<String>,
    flows: HashMap<String, Flow>,
    outgoing: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<String>>,
    boundary_index: HashMap<String, Vec<String>>,
}

impl ProcessModel {
    /// Assemble and validate a model from already-typed parts.
    pub fn new(
        metadata: ProcessMetadata,
        processes: Vec<ProcessDefinition>,
        nodes: Vec<Node>,
        flows: Vec<Flow>,
    ) -> Result<Self, ParseError> {
        if processes.is_empty() {
            return Err(ParseError::NoProcesses);
        }

        let mut process_ids = HashSet::new();
        for process in &processes {
            if process.id.is_empty() {
                return Err(ParseError::EmptyId);
            }
            if !process_ids.insert(process.id.clone()) {
                return Err(ParseError::DuplicateId(process.id.clone()));
            }
        }

        let mut node_map = HashMap::with_capacity(nodes.len());
        let mut node_order = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node.id.is_empty() {
                return Err(ParseError::EmptyId);
            }
            if process_ids.contains(&node.id) || node_map.contains_key(&node.id) {
                return Err(ParseError::DuplicateId(node.id));
            }
            node_order.push(node.id.clone());
            node_map.insert(node.id.clone(), node);
        }

        let mut flow_map = HashMap::with_capacity(flows.len());
        let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
        for flow in flows {
            if flow.id.is_empty() {
                return Err(ParseError::EmptyId);
            }
            if node_map.contains_key(&flow.id) || flow_map.contains_key(&flow.id) {
                return Err(ParseError::DuplicateId(flow.id));
            }
            let source = node_map.get(&flow.source).ok_or_else(|| ParseError::DanglingFlow {
                flow: flow.id.clone(),
                node: flow.source.clone(),
            })?;
            let target = node_map.get(&flow.target).ok_or_else(|| ParseError::DanglingFlow {
                flow: flow.id.clone(),
                node: flow.target.clone(),
            })?;
            if source.parent != target.parent || source.process_id != target.process_id {
                return Err(ParseError::CrossScopeFlow(flow.id));
            }
            outgoing
                .entry(flow.source.clone())
                .or_default()
                .push(flow.id.clone());
            incoming
                .entry(flow.target.clone())
                .or_default()
                .push(flow.id.clone());
            flow_map.insert(flow.id.clone(), flow);
        }

        let mut boundary_index: HashMap<String, Vec<String>> = HashMap::new();
        for id in &node_order {
            let node = &node_map[id];
            Self::validate_node(node, &node_map, &flow_map, &outgoing)?;
            if let Some(activity) = &node.attached_to {
                boundary_index
                    .entry(activity.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }

        let model = Self {
            metadata,
            processes,
            nodes: node_map,
            node_order,
            flows: flow_map,
            outgoing,
            incoming,
            boundary_index,
        };

        for process in &model.processes {
            if model.start_events(&process.id).is_empty() {
                return Err(ParseError::NoStartEvent(process.id.clone()));
            }
        }
        for subprocess in model.elements_of_kind(NodeKind::SubProcess) {
            if model.subprocess_start_events(&subprocess.id).is_empty() {
                return Err(ParseError::NoStartEvent(subprocess.id.clone()));
            }
        }

        Ok(model)
    }

    fn validate_node(
        node: &Node,
        nodes: &HashMap<String, Node>,
        flows: &HashMap<String, Flow>,
        outgoing: &HashMap<String, Vec<String>>,
    ) -> Result<(), ParseError> {
        if let Some(default_flow) = &node.default_flow {
            if !node.kind.is_gateway() {
                return Err(ParseError::FieldNotAllowed {
                    id: node.id.clone(),
                    field: "default",
                });
            }
            let owned = flows.contains_key(default_flow)
                && outgoing
                    .get(&node.id)
                    .is_some_and(|ids| ids.contains(default_flow));
            if !owned {
                return Err(ParseError::InvalidDefaultFlow {
                    gateway: node.id.clone(),
                    flow: default_flow.clone(),
                });
            }
        }

        match (&node.kind, &node.attached_to) {
            (NodeKind::BoundaryEvent, None) => {
                return Err(ParseError::MissingAttachment(node.id.clone()));
            }
            (NodeKind::BoundaryEvent, Some(activity)) => {
                let is_activity = nodes
                    .get(activity)
                    .is_some_and(|target| target.kind.is_activity());
                if !is_activity {
                    return Err(ParseError::InvalidAttachment {
                        boundary: node.id.clone(),
                        activity: activity.clone(),
                    });
                }
            }
            (_, Some(_)) => {
                return Err(ParseError::FieldNotAllowed {
                    id: node.id.clone(),
                    field: "attachedTo",
                });
            }
            _ => {}
        }

        if node.loop_cardinality.is_some() && node.kind != NodeKind::Task {
            return Err(ParseError::FieldNotAllowed {
                id: node.id.clone(),
                field: "loopCardinality",
            });
        }

        if let Some(parent) = &node.parent {
            let is_subprocess = nodes
                .get(parent)
                .is_some_and(|p| p.kind == NodeKind::SubProcess);
            if !is_subprocess {
                return Err(ParseError::InvalidParent {
                    id: node.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn processes(&self) -> &[ProcessDefinition] {
        &self.processes
    }

    pub fn process_ids(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(|p| p.id.as_str())
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_flow(&self, id: &str) -> Option<&Flow> {
        self.flows.get(id)
    }

    /// Outgoing flows of a node, in declaration order.
    pub fn outgoing_flows(&self, id: &str) -> Vec<&Flow> {
        self.flows_for(&self.outgoing, id)
    }

    /// Incoming flows of a node, in declaration order.
    pub fn incoming_flows(&self, id: &str) -> Vec<&Flow> {
        self.flows_for(&self.incoming, id)
    }

    fn flows_for(&self, index: &HashMap<String, Vec<String>>, id: &str) -> Vec<&Flow> {
        index
            .get(id)
            .map(|ids| ids.iter().filter_map(|f| self.flows.get(f)).collect())
            .unwrap_or_default()
    }

    /// Boundary event ids attached to an activity, in declaration order.
    pub fn boundary_events(&self, activity_id: &str) -> &[String] {
        self.boundary_index
            .get(activity_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_gateway(&self, id: &str) -> bool {
        self.get_node(id).is_some_and(|n| n.kind.is_gateway())
    }

    pub fn is_activity(&self, id: &str) -> bool {
        self.get_node(id).is_some_and(|n| n.kind.is_activity())
    }

    pub fn is_event(&self, id: &str) -> bool {
        self.get_node(id).is_some_and(|n| n.kind.is_event())
    }

    /// All nodes of a kind, in declaration order.
    pub fn elements_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.kind == kind)
            .collect()
    }

    /// Top-level start events of a process.
    pub fn start_events(&self, process_id: &str) -> Vec<&Node> {
        self.elements_of_kind(NodeKind::StartEvent)
            .into_iter()
            .filter(|n| n.process_id == process_id && n.parent.is_none())
            .collect()
    }

    /// Start events nested directly inside a subprocess.
    pub fn subprocess_start_events(&self, subprocess_id: &str) -> Vec<&Node> {
        self.elements_of_kind(NodeKind::StartEvent)
            .into_iter()
            .filter(|n| n.parent.as_deref() == Some(subprocess_id))
            .collect()
    }

    /// Nodes nested directly inside a subprocess.
    pub fn children_of(&self, subprocess_id: &str) -> Vec<&Node> {
        self.node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.parent.as_deref() == Some(subprocess_id))
            .collect()
    }

    pub fn default_flow(&self, gateway_id: &str) -> Option<&Flow> {
        self.get_node(gateway_id)
            .and_then(|n| n.default_flow.as_deref())
            .and_then(|f| self.flows.get(f))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: String },

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("Definition has no root element")]
    MissingRoot,

    #[error("Definition declares no processes")]
    NoProcesses,

    #[error("Invalid API version: expected '{expected}', got '{got}'")]
    InvalidApiVersion { expected: String, got: String },

    #[error("Invalid kind: expected '{expected}', got '{got}'")]
    InvalidKind { expected: String, got: String },

    #[error("Unknown element kind '{0}'")]
    UnknownElementKind(String),

    #[error("Element id must not be empty")]
    EmptyId,

    #[error("Duplicate element id '{0}'")]
    DuplicateId(String),

    #[error("Flow '{flow}' references unknown node '{node}'")]
    DanglingFlow { flow: String, node: String },

    #[error("Flow '{0}' crosses a process or subprocess boundary")]
    CrossScopeFlow(String),

    #[error("Default flow '{flow}' is not an outgoing flow of gateway '{gateway}'")]
    InvalidDefaultFlow { gateway: String, flow: String },

    #[error("Boundary event '{0}' is not attached to an activity")]
    MissingAttachment(String),

    #[error("Boundary event '{boundary}' is attached to '{activity}', which is not an activity")]
    InvalidAttachment { boundary: String, activity: String },

    #[error("Field '{field}' is not allowed on element '{id}'")]
    FieldNotAllowed { id: String, field: &'static str },

    #[error("Element '{id}' has parent '{parent}', which is not a subprocess")]
    InvalidParent { id: String, parent: String },

    #[error("Scope '{0}' has no start event")]
    NoStartEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(id: &str, source: &str, target: &str) -> Flow {
        Flow {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            condition: None,
            process_id: "p".to_string(),
        }
    }

    fn process() -> Vec<ProcessDefinition> {
        vec![ProcessDefinition {
            id: "p".to_string(),
            name: None,
            is_executable: true,
        }]
    }

    #[test]
    fn test_node_kind_parse_is_case_insensitive() {
        assert_eq!("startEvent".parse::<NodeKind>().unwrap(), NodeKind::StartEvent);
        assert_eq!("STARTEVENT".parse::<NodeKind>().unwrap(), NodeKind::StartEvent);
        assert_eq!("inclusive_gateway".parse::<NodeKind>().unwrap(), NodeKind::InclusiveGateway);
        assert_eq!("SubProcess".parse::<NodeKind>().unwrap(), NodeKind::SubProcess);
        assert!("swimlane".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_model_rejects_zero_processes() {
        let result = ProcessModel::new(ProcessMetadata::default(), vec![], vec![], vec![]);
        assert!(matches!(result, Err(ParseError::NoProcesses)));
    }

    #[test]
    fn test_model_rejects_dangling_flow() {
        let nodes = vec![Node::new("start", NodeKind::StartEvent, "p")];
        let flows = vec![flow("f1", "start", "missing")];
        let result = ProcessModel::new(ProcessMetadata::default(), process(), nodes, flows);
        assert!(matches!(result, Err(ParseError::DanglingFlow { .. })));
    }

    #[test]
    fn test_model_rejects_foreign_default_flow() {
        let mut gateway = Node::new("gw", NodeKind::ExclusiveGateway, "p");
        gateway.default_flow = Some("f1".to_string());
        let nodes = vec![
            Node::new("start", NodeKind::StartEvent, "p"),
            gateway,
            Node::new("end", NodeKind::EndEvent, "p"),
        ];
        let flows = vec![flow("f1", "start", "gw"), flow("f2", "gw", "end")];
        let result = ProcessModel::new(ProcessMetadata::default(), process(), nodes, flows);
        assert!(matches!(result, Err(ParseError::InvalidDefaultFlow { .. })));
    }

    #[test]
    fn test_queries_preserve_declaration_order() {
        let nodes = vec![
            Node::new("start", NodeKind::StartEvent, "p"),
            Node::new("gw", NodeKind::ParallelGateway, "p"),
            Node::new("b", NodeKind::Task, "p"),
            Node::new("a", NodeKind::Task, "p"),
        ];
        let flows = vec![
            flow("f0", "start", "gw"),
            flow("f1", "gw", "b"),
            flow("f2", "gw", "a"),
        ];
        let model = ProcessModel::new(ProcessMetadata::default(), process(), nodes, flows).unwrap();

        let targets: Vec<_> = model.outgoing_flows("gw").iter().map(|f| f.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "a"]);
        let tasks: Vec<_> = model.elements_of_kind(NodeKind::Task).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(tasks, vec!["b", "a"]);
        assert!(model.is_gateway("gw"));
        assert!(model.is_activity("a"));
        assert!(model.is_event("start"));
        assert!(!model.is_gateway("missing"));
    }
}
