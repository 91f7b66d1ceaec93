//! Workflow domain entity

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use super::mapping::InputMapping;
use crate::domain::skill::InputType;

/// Longest accepted workflow id
pub const MAX_ID_LENGTH: usize = 64;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

/// Identifier a workflow is looked up by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        validate_workflow_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowId {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowId> for String {
    fn from(id: WorkflowId) -> Self {
        id.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ids start with a letter or digit, then letters, digits, `-` or `_`
pub fn validate_workflow_id(id: &str) -> Result<(), WorkflowError> {
    let problem = if id.is_empty() {
        "id is empty".to_string()
    } else if id.len() > MAX_ID_LENGTH {
        format!("id is longer than {} characters", MAX_ID_LENGTH)
    } else if !ID_PATTERN.is_match(id) {
        format!("'{}' may only hold letters, digits, '-' and '_'", id)
    } else {
        return Ok(());
    };

    Err(WorkflowError::validation(format!("Bad workflow id: {}", problem)))
}

/// A user-supplied value shared by every step of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalInput {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl GlobalInput {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();

        Self {
            label: id.clone(),
            id,
            input_type: InputType::default(),
            required: false,
            default: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One stage of a workflow: a skill invocation plus how its inputs are derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    id: String,

    #[serde(default)]
    name: String,

    skill_id: String,

    /// Key under which the accumulated output is stored for later steps
    output_key: String,

    #[serde(default)]
    input_mappings: BTreeMap<String, InputMapping>,
}

impl WorkflowStep {
    pub fn new(
        id: impl Into<String>,
        skill_id: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        let id = id.into();

        Self {
            name: id.clone(),
            id,
            skill_id: skill_id.into(),
            output_key: output_key.into(),
            input_mappings: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mapping(mut self, input_id: impl Into<String>, mapping: InputMapping) -> Self {
        self.input_mappings.insert(input_id.into(), mapping);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skill_id(&self) -> &str {
        &self.skill_id
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    pub fn input_mappings(&self) -> &BTreeMap<String, InputMapping> {
        &self.input_mappings
    }

    pub fn mapping(&self, input_id: &str) -> Option<&InputMapping> {
        self.input_mappings.get(input_id)
    }
}

/// A static workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    id: WorkflowId,

    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default)]
    global_inputs: Vec<GlobalInput>,

    #[serde(default)]
    steps: Vec<WorkflowStep>,

    /// Human-readable summary of what the workflow produces
    #[serde(default)]
    outputs: Vec<String>,
}

impl Workflow {
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            global_inputs: Vec::new(),
            steps: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_global_input(mut self, input: GlobalInput) -> Self {
        self.global_inputs.push(input);
        self
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn global_inputs(&self) -> &[GlobalInput] {
        &self.global_inputs
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn global_input(&self, id: &str) -> Option<&GlobalInput> {
        self.global_inputs.iter().find(|i| i.id == id)
    }

    /// Supplied values with declared defaults filled in for absent or blank entries
    pub fn effective_inputs(&self, supplied: &HashMap<String, String>) -> HashMap<String, String> {
        let mut values = supplied.clone();

        for input in &self.global_inputs {
            let blank = values.get(&input.id).is_none_or(|v| v.trim().is_empty());

            if let (true, Some(default)) = (blank, &input.default) {
                values.insert(input.id.clone(), default.clone());
            }
        }

        values
    }

    /// Required global inputs that are absent or blank in `values`
    pub fn missing_required_inputs(&self, values: &HashMap<String, String>) -> Vec<&GlobalInput> {
        self.global_inputs
            .iter()
            .filter(|input| input.required)
            .filter(|input| values.get(&input.id).is_none_or(|v| v.trim().is_empty()))
            .collect()
    }
}
