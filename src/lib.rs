//! Skill Workflow Engine
//!
//! Runs multi-step workflows where every step invokes a prompt "skill" on one
//! of several LLM backends:
//! - `{{name}}` prompt templates
//! - input mappings from global inputs, earlier outputs, literals and templates
//! - streaming adapters for Gemini, Anthropic and OpenAI
//! - a sequential runner that halts on the first failing step
//! - batch execution over CSV rows

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
