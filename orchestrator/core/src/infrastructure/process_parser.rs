// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process Definition Parser
//!
//! This module provides infrastructure for parsing process definition
//! manifests into the [`ProcessModel`] domain aggregate.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML/JSON → Domain objects
//! - **Anti-Corruption:** Translates the manifest schema to the domain model
//!
//! # Manifest Format
//!
//! ```yaml
//! apiVersion: meridian/v1
//! kind: ProcessDefinition
//! metadata:
//!   name: review-flow
//! processes:
//!   - id: review
//!     elements:
//!       - { id: start, type: startEvent }
//!       - { id: split, type: inclusiveGateway, default: f_default }
//!       - { id: taskA, type: task, name: Task A }
//!       - { id: timeoutA, type: boundaryEvent, attachedTo: taskA, trigger: timer }
//!     flows:
//!       - { id: f1, source: start, target: split }
//!       - { id: fA, source: split, target: taskA, condition: conditionA }
//! ```
//!
//! `apiVersion` and `kind` may be omitted. Element `type` is matched
//! case-insensitively. A `subProcess` element nests its own `elements` and
//! `flows`.

use crate::domain::process::{
    Flow, Node, NodeKind, ParseError, ProcessDefinition, ProcessMetadata, ProcessModel,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const PROCESS_API_VERSION: &str = "meridian/v1";
pub const PROCESS_KIND: &str = "ProcessDefinition";

// ============================================================================
// YAML Schema (External Representation)
// ============================================================================

/// External representation of a process definition manifest
///
/// This struct matches the manifest schema exactly. It is then converted
/// to the domain ProcessModel with validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ProcessMetadataYaml,
    #[serde(default)]
    pub processes: Vec<ProcessYaml>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessMetadataYaml {
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessYaml {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_executable")]
    pub is_executable: bool,
    #[serde(default)]
    pub elements: Vec<ElementYaml>,
    #[serde(default)]
    pub flows: Vec<FlowYaml>,
}

fn default_executable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementYaml {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Default outgoing flow id (gateways)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_activity: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_cardinality: Option<u32>,
    /// Nested elements (subProcess only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementYaml>,
    /// Nested flows (subProcess only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<FlowYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowYaml {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

// ============================================================================
// Parser
// ============================================================================

/// Process definition parser (Infrastructure service)
pub struct ProcessParser;

impl ProcessModel {
    /// Parse a definition source (YAML or JSON) into a validated model.
    pub fn load(source: &str) -> Result<Self, ParseError> {
        ProcessParser::parse_yaml(source)
    }
}

impl ProcessParser {
    /// Parse a process definition from a YAML or JSON file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ProcessModel, ParseError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ParseError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse_yaml(&content)
    }

    /// Parse a process definition from a YAML (or JSON) string
    pub fn parse_yaml(yaml: &str) -> Result<ProcessModel, ParseError> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| ParseError::Yaml(e.to_string()))?;

        // An empty document deserializes to null; never treat it as an empty model
        if !document.is_mapping() {
            return Err(ParseError::MissingRoot);
        }

        let manifest: ProcessManifest =
            serde_yaml::from_value(document).map_err(|e| ParseError::Yaml(e.to_string()))?;

        Self::validate_and_convert(manifest)
    }

    /// Validate manifest and convert to domain object
    fn validate_and_convert(manifest: ProcessManifest) -> Result<ProcessModel, ParseError> {
        if let Some(api_version) = manifest.api_version {
            if api_version != PROCESS_API_VERSION {
                return Err(ParseError::InvalidApiVersion {
                    expected: PROCESS_API_VERSION.to_string(),
                    got: api_version,
                });
            }
        }

        if let Some(kind) = manifest.kind {
            if kind != PROCESS_KIND {
                return Err(ParseError::InvalidKind {
                    expected: PROCESS_KIND.to_string(),
                    got: kind,
                });
            }
        }

        if manifest.processes.is_empty() {
            return Err(ParseError::NoProcesses);
        }

        let metadata = ProcessMetadata {
            name: manifest.metadata.name,
            version: manifest.metadata.version,
            description: manifest.metadata.description,
        };

        let mut processes = Vec::with_capacity(manifest.processes.len());
        let mut nodes = Vec::new();
        let mut flows = Vec::new();

        for process in manifest.processes {
            Self::convert_scope(
                &process.id,
                None,
                process.elements,
                process.flows,
                &mut nodes,
                &mut flows,
            )?;
            processes.push(ProcessDefinition {
                id: process.id,
                name: process.name,
                is_executable: process.is_executable,
            });
        }

        ProcessModel::new(metadata, processes, nodes, flows)
    }

    /// Flatten one scope (a process or a subprocess body) into nodes and flows.
    fn convert_scope(
        process_id: &str,
        parent: Option<&str>,
        elements: Vec<ElementYaml>,
        scope_flows: Vec<FlowYaml>,
        nodes: &mut Vec<Node>,
        flows: &mut Vec<Flow>,
    ) -> Result<(), ParseError> {
        for element in elements {
            let kind: NodeKind = element.element_type.parse()?;

            if kind != NodeKind::SubProcess && !(element.elements.is_empty() && element.flows.is_empty()) {
                return Err(ParseError::FieldNotAllowed {
                    id: element.id,
                    field: "elements",
                });
            }

            let mut node = Node::new(&element.id, kind, process_id);
            node.name = element.name;
            node.parent = parent.map(str::to_string);
            node.default_flow = element.default;
            node.attached_to = element.attached_to;
            node.cancel_activity = element.cancel_activity.unwrap_or(true);
            node.event_trigger = element.trigger;
            node.loop_cardinality = element.loop_cardinality;
            nodes.push(node);

            if kind == NodeKind::SubProcess {
                Self::convert_scope(
                    process_id,
                    Some(&element.id),
                    element.elements,
                    element.flows,
                    nodes,
                    flows,
                )?;
            }
        }

        flows.extend(scope_flows.into_iter().map(|f| Flow {
            id: f.id,
            source: f.source,
            target: f.target,
            condition: f.condition.filter(|c| !c.trim().is_empty()),
            process_id: process_id.to_string(),
        }));
        Ok(())
    }
}
