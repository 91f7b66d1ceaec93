//! Structural checks for workflow definitions
//!
//! Linting never touches a backend. It catches definitions that would run but
//! silently feed empty strings into prompts: mappings pointing at undeclared
//! global inputs, at steps that come later, or at output keys nobody produces.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::entity::Workflow;
use super::mapping::InputMapping;
use crate::domain::skill::Skill;
use crate::domain::template::extract_placeholders;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One problem found in a workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionIssue {
    pub severity: Severity,
    /// Offending step, when the problem is step-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub message: String,
}

impl DefinitionIssue {
    fn error(step_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            step_id: step_id.map(str::to_string),
            message: message.into(),
        }
    }

    fn warning(step_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            step_id: step_id.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for DefinitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        match &self.step_id {
            Some(step) => write!(f, "{}: step '{}': {}", level, step, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}

/// Check `workflow` against itself and the known `skills`
pub fn lint_workflow(workflow: &Workflow, skills: &[Skill]) -> Vec<DefinitionIssue> {
    let mut issues = Vec::new();

    if workflow.is_empty() {
        issues.push(DefinitionIssue::error(None, "workflow has no steps"));
        return issues;
    }

    let skills: HashMap<&str, &Skill> = skills.iter().map(|s| (s.id.as_str(), s)).collect();
    let globals: HashSet<&str> = workflow
        .global_inputs()
        .iter()
        .map(|i| i.id.as_str())
        .collect();

    let mut seen_steps: HashSet<&str> = HashSet::new();
    let mut produced: HashSet<&str> = HashSet::new();

    for step in workflow.steps() {
        let id = step.id();

        if !seen_steps.insert(id) {
            issues.push(DefinitionIssue::error(Some(id), "duplicate step id"));
        }

        if produced.contains(step.output_key()) {
            issues.push(DefinitionIssue::warning(
                Some(id),
                format!(
                    "output key '{}' overwrites the output of an earlier step",
                    step.output_key()
                ),
            ));
        }

        for (input_id, mapping) in step.input_mappings() {
            match mapping {
                InputMapping::Global { input_id: global } if !globals.contains(global.as_str()) => {
                    issues.push(DefinitionIssue::error(
                        Some(id),
                        format!(
                            "input '{}' maps to undeclared global input '{}'",
                            input_id, global
                        ),
                    ));
                }
                InputMapping::Previous {
                    step_id: producer,
                    output_key,
                } => {
                    if let Some(producer) = producer
                        && !seen_steps.contains(producer.as_str())
                    {
                        issues.push(DefinitionIssue::error(
                            Some(id),
                            format!(
                                "input '{}' references step '{}' which does not run before it",
                                input_id, producer
                            ),
                        ));
                    }

                    if !produced.contains(output_key.as_str()) {
                        issues.push(DefinitionIssue::error(
                            Some(id),
                            format!(
                                "input '{}' reads output key '{}' which no earlier step produces",
                                input_id, output_key
                            ),
                        ));
                    }
                }
                InputMapping::Computed { template } => {
                    for name in extract_placeholders(template) {
                        if !globals.contains(name.as_str()) && !produced.contains(name.as_str()) {
                            issues.push(DefinitionIssue::warning(
                                Some(id),
                                format!(
                                    "input '{}' template placeholder '{}' will render empty",
                                    input_id, name
                                ),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        match skills.get(step.skill_id()) {
            None => issues.push(DefinitionIssue::error(
                Some(id),
                format!("unknown skill '{}'", step.skill_id()),
            )),
            Some(skill) => {
                for input in skill.required_inputs() {
                    if step.mapping(&input.id).is_none() && input.default.is_none() {
                        issues.push(DefinitionIssue::warning(
                            Some(id),
                            format!("required skill input '{}' has no mapping", input.id),
                        ));
                    }
                }
            }
        }

        produced.insert(step.output_key());
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::skill::{Backend, GenerationConfig, SkillInput};
    use crate::domain::workflow::{GlobalInput, WorkflowId, WorkflowStep};

    fn skills() -> Vec<Skill> {
        vec![
            Skill::new("writer", "", "Write about {{topic}}", GenerationConfig::new(Backend::Gemini))
                .with_input(SkillInput::new("topic").required()),
            Skill::new("editor", "", "Edit {{draft}}", GenerationConfig::new(Backend::Claude))
                .with_input(SkillInput::new("draft").required()),
        ]
    }

    fn valid_workflow() -> Workflow {
        Workflow::new(WorkflowId::new("w").unwrap(), "W")
            .with_global_input(GlobalInput::new("topic").required())
            .with_step(
                WorkflowStep::new("one", "writer", "draft")
                    .with_mapping("topic", InputMapping::global("topic")),
            )
            .with_step(
                WorkflowStep::new("two", "editor", "final")
                    .with_mapping("draft", InputMapping::previous_from("one", "draft")),
            )
    }

    #[test]
    fn test_valid_workflow_has_no_issues() {
        assert!(lint_workflow(&valid_workflow(), &skills()).is_empty());
    }

    #[test]
    fn test_empty_workflow() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W");
        let issues = lint_workflow(&workflow, &skills());

        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
    }

    #[test]
    fn test_forward_reference_is_error() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W")
            .with_step(
                WorkflowStep::new("one", "editor", "final")
                    .with_mapping("draft", InputMapping::previous_from("two", "draft")),
            )
            .with_step(WorkflowStep::new("two", "writer", "draft"));

        let issues = lint_workflow(&workflow, &skills());
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.is_error() && i.step_id.as_deref() == Some("one"))
            .collect();

        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_unknown_global_and_skill() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W").with_step(
            WorkflowStep::new("one", "ghost", "out")
                .with_mapping("topic", InputMapping::global("nope")),
        );

        let messages: Vec<String> = lint_workflow(&workflow, &skills())
            .into_iter()
            .map(|i| i.message)
            .collect();

        assert!(messages.iter().any(|m| m.contains("undeclared global input 'nope'")));
        assert!(messages.iter().any(|m| m.contains("unknown skill 'ghost'")));
    }

    #[test]
    fn test_computed_placeholder_warning() {
        let workflow = valid_workflow().with_step(
            WorkflowStep::new("three", "editor", "polished")
                .with_mapping("draft", InputMapping::computed("{{final}} {{mystery}}")),
        );

        let issues = lint_workflow(&workflow, &skills());

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("'mystery'"));
    }

    #[test]
    fn test_unmapped_required_input_warning() {
        let workflow = Workflow::new(WorkflowId::new("w").unwrap(), "W")
            .with_step(WorkflowStep::new("one", "writer", "draft"));

        let issues = lint_workflow(&workflow, &skills());

        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].to_string(),
            "warning: step 'one': required skill input 'topic' has no mapping"
        );
    }
}
