//! Skill and workflow definitions loaded from a JSON document

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{DomainError, InMemorySkillRegistry, Skill, Workflow};

/// A set of skill and workflow definitions
///
/// ```json
/// { "skills": [ ... ], "workflows": [ ... ] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionSet {
    #[serde(default)]
    pub skills: Vec<Skill>,

    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

impl DefinitionSet {
    /// Load definitions from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading definitions");

        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let definitions = Self::from_json(&content)?;
        debug!(
            skills = definitions.skills.len(),
            workflows = definitions.workflows.len(),
            "Definitions loaded"
        );

        Ok(definitions)
    }

    /// Parse definitions from a JSON string
    pub fn from_json(content: &str) -> Result<Self, DomainError> {
        let definitions: DefinitionSet = serde_json::from_str(content)
            .map_err(|e| DomainError::validation(format!("Invalid definitions: {}", e)))?;

        definitions.validate()?;
        Ok(definitions)
    }

    fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        if let Some(skill) = self.skills.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(DomainError::validation(format!(
                "Duplicate skill id: {}",
                skill.id
            )));
        }

        let mut seen = HashSet::new();
        if let Some(workflow) = self
            .workflows
            .iter()
            .find(|w| !seen.insert(w.id().as_str()))
        {
            return Err(DomainError::validation(format!(
                "Duplicate workflow id: {}",
                workflow.id()
            )));
        }

        Ok(())
    }

    pub fn workflow(&self, id: &str) -> Result<&Workflow, DomainError> {
        self.workflows
            .iter()
            .find(|w| w.id().as_str() == id)
            .ok_or_else(|| DomainError::not_found(format!("Workflow '{}' not found", id)))
    }

    /// Registry holding a copy of every skill
    pub fn skill_registry(&self) -> InMemorySkillRegistry {
        InMemorySkillRegistry::new().with_skills(self.skills.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Backend, InputMapping, SkillRegistry};

    const DEFINITIONS: &str = r#"{
        "skills": [
            {
                "id": "writer",
                "name": "Writer",
                "systemPrompt": "You write",
                "userPromptTemplate": "Write about {{topic}}",
                "inputs": [{"id": "topic", "required": true}],
                "config": {"backend": "claude", "maxTokens": 1024, "temperature": 0.5}
            }
        ],
        "workflows": [
            {
                "id": "blog-post",
                "name": "Blog post",
                "globalInputs": [{"id": "topic", "label": "Topic", "required": true}],
                "steps": [
                    {
                        "id": "draft",
                        "skillId": "writer",
                        "outputKey": "draft",
                        "inputMappings": {
                            "topic": {"type": "global", "inputId": "topic"}
                        }
                    },
                    {
                        "id": "summary",
                        "skillId": "writer",
                        "outputKey": "summary",
                        "inputMappings": {
                            "topic": {"type": "computed", "template": "a summary of {{draft}}"}
                        }
                    }
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_parse_definitions() {
        let definitions = DefinitionSet::from_json(DEFINITIONS).unwrap();

        let skill = &definitions.skills[0];
        assert_eq!(skill.config.backend, Backend::Claude);
        assert_eq!(skill.config.max_tokens, 1024);
        assert!(skill.inputs[0].required);

        let workflow = definitions.workflow("blog-post").unwrap();
        assert_eq!(workflow.steps().len(), 2);
        assert_eq!(
            workflow.steps()[1].mapping("topic"),
            Some(&InputMapping::computed("a summary of {{draft}}"))
        );

        let registry = definitions.skill_registry();
        assert!(registry.exists("writer").await.unwrap());
    }

    #[test]
    fn test_unknown_workflow() {
        let definitions = DefinitionSet::from_json(DEFINITIONS).unwrap();

        assert!(matches!(
            definitions.workflow("missing"),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_workflow_id_rejected() {
        let json = r#"{"workflows": [{"id": "not valid!", "name": "x"}]}"#;

        assert!(matches!(
            DefinitionSet::from_json(json),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_duplicate_skill_rejected() {
        let skill = r#"{"id": "a", "systemPrompt": "", "userPromptTemplate": "", "config": {"backend": "gemini"}}"#;
        let json = format!(r#"{{"skills": [{}, {}]}}"#, skill, skill);

        let err = DefinitionSet::from_json(&json).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Duplicate skill id: a");
    }

    #[test]
    fn test_missing_file() {
        let result = DefinitionSet::from_file("/nonexistent/definitions.json");
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
