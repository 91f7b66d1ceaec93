//! Input mappings and their resolution
//!
//! A mapping says where one skill input gets its value at run time:
//! - `global` - a workflow global input, as-is
//! - `previous` - the accumulated output of an earlier step, by output key
//! - `static` - a literal baked into the definition
//! - `computed` - a `{{name}}` template over global inputs and outputs so far

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entity::WorkflowStep;
use crate::domain::template::render_with;

/// Rule deriving one skill input's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum InputMapping {
    Global {
        input_id: String,
    },
    Previous {
        /// Producing step, informational only; resolution goes by output key
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        output_key: String,
    },
    Static {
        value: String,
    },
    Computed {
        template: String,
    },
}

impl InputMapping {
    pub fn global(input_id: impl Into<String>) -> Self {
        Self::Global {
            input_id: input_id.into(),
        }
    }

    pub fn previous(output_key: impl Into<String>) -> Self {
        Self::Previous {
            step_id: None,
            output_key: output_key.into(),
        }
    }

    pub fn previous_from(step_id: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self::Previous {
            step_id: Some(step_id.into()),
            output_key: output_key.into(),
        }
    }

    pub fn fixed(value: impl Into<String>) -> Self {
        Self::Static {
            value: value.into(),
        }
    }

    pub fn computed(template: impl Into<String>) -> Self {
        Self::Computed {
            template: template.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Global { .. } => "global",
            Self::Previous { .. } => "previous",
            Self::Static { .. } => "static",
            Self::Computed { .. } => "computed",
        }
    }
}

/// Resolve the concrete value of `input_id` for `step`.
///
/// Never fails: a missing mapping, an absent global input, or an output that
/// has not been produced yet all resolve to the empty string.
pub fn resolve_input(
    step: &WorkflowStep,
    input_id: &str,
    global_inputs: &HashMap<String, String>,
    outputs: &HashMap<String, String>,
) -> String {
    let Some(mapping) = step.mapping(input_id) else {
        return String::new();
    };

    match mapping {
        InputMapping::Global { input_id } => global_inputs.get(input_id).cloned().unwrap_or_default(),
        InputMapping::Previous { output_key, .. } => outputs.get(output_key).cloned().unwrap_or_default(),
        InputMapping::Static { value } => value.clone(),
        InputMapping::Computed { template } => render_computed(template, global_inputs, outputs),
    }
}

/// Global inputs take precedence over outputs of the same name. One pass, so
/// text substituted from a global value is never expanded again by outputs.
fn render_computed(
    template: &str,
    global_inputs: &HashMap<String, String>,
    outputs: &HashMap<String, String>,
) -> String {
    render_with(template, |name| {
        global_inputs
            .get(name)
            .or_else(|| outputs.get(name))
            .map(String::as_str)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn step() -> WorkflowStep {
        WorkflowStep::new("step-2", "editor", "final")
            .with_mapping("topic", InputMapping::global("topic"))
            .with_mapping("draft", InputMapping::previous_from("step-1", "draft"))
            .with_mapping("tone", InputMapping::fixed("formal"))
            .with_mapping("intro", InputMapping::computed("{{name}} likes {{pet}}"))
    }

    #[test]
    fn test_global_mapping() {
        let globals = values(&[("topic", "cats")]);
        assert_eq!(resolve_input(&step(), "topic", &globals, &HashMap::new()), "cats");
    }

    #[test]
    fn test_global_mapping_absent_value() {
        assert_eq!(resolve_input(&step(), "topic", &HashMap::new(), &HashMap::new()), "");
    }

    #[test]
    fn test_previous_mapping_after_completion() {
        let outputs = values(&[("draft", "Cats are great.")]);
        assert_eq!(
            resolve_input(&step(), "draft", &HashMap::new(), &outputs),
            "Cats are great."
        );
    }

    #[test]
    fn test_previous_mapping_before_producer_ran() {
        assert_eq!(resolve_input(&step(), "draft", &HashMap::new(), &HashMap::new()), "");
    }

    #[test]
    fn test_static_mapping() {
        assert_eq!(resolve_input(&step(), "tone", &HashMap::new(), &HashMap::new()), "formal");
    }

    #[test]
    fn test_computed_mapping_with_unproduced_output() {
        let globals = values(&[("name", "Ana")]);
        assert_eq!(
            resolve_input(&step(), "intro", &globals, &HashMap::new()),
            "Ana likes "
        );
    }

    #[test]
    fn test_computed_mapping_mixes_globals_and_outputs() {
        let globals = values(&[("name", "Ana")]);
        let outputs = values(&[("pet", "her cat")]);
        assert_eq!(
            resolve_input(&step(), "intro", &globals, &outputs),
            "Ana likes her cat"
        );
    }

    #[test]
    fn test_computed_mapping_does_not_expand_global_value() {
        let globals = values(&[("name", "{{pet}}")]);
        let outputs = values(&[("pet", "dog")]);
        assert_eq!(
            resolve_input(&step(), "intro", &globals, &outputs),
            "{{pet}} likes dog"
        );
    }

    #[test]
    fn test_unmapped_input_is_empty() {
        assert_eq!(resolve_input(&step(), "unknown", &HashMap::new(), &HashMap::new()), "");
    }

    #[test]
    fn test_mapping_serialization_shape() {
        let json = serde_json::to_value(InputMapping::previous_from("s1", "draft")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "previous", "stepId": "s1", "outputKey": "draft"})
        );

        let parsed: InputMapping =
            serde_json::from_str(r#"{"type": "computed", "template": "{{a}}"}"#).unwrap();
        assert_eq!(parsed, InputMapping::computed("{{a}}"));
        assert_eq!(parsed.kind(), "computed");
    }
}
