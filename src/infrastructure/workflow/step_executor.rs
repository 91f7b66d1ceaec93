//! Skill-backed step executor

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::domain::{
    render_template, resolve_input, DomainError, GenerationParams, PromptRequest, Skill,
    SkillRegistry, StepContext, StepExecutor, WorkflowError, WorkflowStep,
};
use crate::infrastructure::llm::AdapterRegistry;

/// Runs a step by rendering its skill's prompt and streaming it through the
/// adapter for the skill's backend
#[derive(Debug, Clone)]
pub struct SkillStepExecutor {
    skills: Arc<dyn SkillRegistry>,
    adapters: AdapterRegistry,
}

impl SkillStepExecutor {
    pub fn new(skills: Arc<dyn SkillRegistry>, adapters: AdapterRegistry) -> Self {
        Self { skills, adapters }
    }

    async fn skill_for(&self, step: &WorkflowStep) -> Result<Skill, WorkflowError> {
        self.skills
            .get(step.skill_id())
            .await
            .map_err(|e| WorkflowError::configuration(e.to_string()))?
            .ok_or_else(|| WorkflowError::unknown_skill(step.id(), step.skill_id()))
    }
}

/// Values for every input the step maps or the skill declares.
///
/// A declared input whose resolved value is empty falls back to its default.
pub fn resolve_skill_inputs(
    skill: &Skill,
    step: &WorkflowStep,
    global_inputs: &HashMap<String, String>,
    outputs: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut values: HashMap<String, String> = step
        .input_mappings()
        .keys()
        .map(|id| (id.clone(), resolve_input(step, id, global_inputs, outputs)))
        .collect();

    for input in &skill.inputs {
        let value = values.entry(input.id.clone()).or_default();

        if let (true, Some(default)) = (value.is_empty(), &input.default) {
            *value = default.clone();
        }
    }

    values
}

fn step_error(step: &WorkflowStep, err: DomainError) -> WorkflowError {
    match err {
        DomainError::Cancelled => WorkflowError::Cancelled,
        other => WorkflowError::step_execution(step.id(), other.to_string()),
    }
}

#[async_trait]
impl StepExecutor for SkillStepExecutor {
    async fn execute_step(
        &self,
        step: &WorkflowStep,
        context: StepContext<'_>,
    ) -> Result<String, WorkflowError> {
        let skill = self.skill_for(step).await?;

        let adapter = self
            .adapters
            .get(skill.config.backend)
            .map_err(|e| WorkflowError::configuration(e.to_string()))?;

        let values = resolve_skill_inputs(&skill, step, context.global_inputs, context.outputs);
        let user_prompt = render_template(&skill.user_prompt_template, &values);
        let params = GenerationParams::from_config(&skill.config, adapter.default_model());

        debug!(
            step_id = %step.id(),
            skill_id = %skill.id,
            backend = %skill.config.backend,
            model = %params.model,
            "Executing step"
        );

        let mut request = PromptRequest::new(skill.system_prompt.clone(), user_prompt, params);
        if let Some(token) = context.cancellation {
            request = request.with_cancellation(token.clone());
        }

        let mut fragments = adapter
            .execute(context.credentials, request)
            .await
            .map_err(|e| step_error(step, e))?;

        let mut output = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(|e| step_error(step, e))?;

            if let Some(observer) = context.on_fragment {
                observer(&fragment);
            }

            output.push_str(&fragment);
        }

        Ok(output)
    }
}
