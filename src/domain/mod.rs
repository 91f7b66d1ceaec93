//! Domain layer - Core business logic and entities

pub mod error;
pub mod llm;
pub mod skill;
pub mod template;
pub mod workflow;

pub use error::DomainError;
pub use llm::{
    env_var_name, single_fragment, Credentials, FragmentStream, GenerationParams, PromptRequest,
    ProviderAdapter,
};
pub use skill::{
    Backend, GenerationConfig, InMemorySkillRegistry, InputType, Skill, SkillInput, SkillRegistry,
};
pub use template::{extract_placeholders, render_template, render_with};
pub use workflow::{
    lint_workflow, resolve_input, ChannelSink, DefinitionIssue, EventSink, GlobalInput,
    InputMapping, NoopSink, RunState, RunStatus, Severity, StepContext, StepExecutor, StepOutcome,
    StepStatus, Workflow, WorkflowError, WorkflowEvent, WorkflowId, WorkflowOutcome, WorkflowStep,
};
