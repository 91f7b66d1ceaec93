//! Skill definitions and the registry they are looked up from

mod entity;
mod registry;

pub use entity::{Backend, GenerationConfig, InputType, Skill, SkillInput};
pub use registry::{InMemorySkillRegistry, SkillRegistry};

#[cfg(test)]
pub use registry::MockSkillRegistry;
