//! Infrastructure layer - provider adapters, workflow execution and loading

pub mod definitions;
pub mod llm;
pub mod logging;
pub mod workflow;

pub use definitions::DefinitionSet;
