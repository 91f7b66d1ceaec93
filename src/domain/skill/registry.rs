//! Skill registry trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::Skill;
use crate::domain::DomainError;

/// Read-only source of skill definitions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SkillRegistry: Send + Sync + std::fmt::Debug {
    /// Get a skill by ID
    async fn get(&self, id: &str) -> Result<Option<Skill>, DomainError>;

    /// Get all skills
    async fn list(&self) -> Result<Vec<Skill>, DomainError>;

    /// Check if a skill exists
    async fn exists(&self, id: &str) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}

pub use in_memory::InMemorySkillRegistry;

/// In-memory implementation of SkillRegistry
pub mod in_memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct InMemorySkillRegistry {
        skills: RwLock<HashMap<String, Skill>>,
    }

    impl InMemorySkillRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_skill(self, skill: Skill) -> Self {
            self.insert(skill);
            self
        }

        pub fn with_skills(self, skills: impl IntoIterator<Item = Skill>) -> Self {
            for skill in skills {
                self.insert(skill);
            }
            self
        }

        pub fn insert(&self, skill: Skill) {
            if let Ok(mut map) = self.skills.write() {
                map.insert(skill.id.clone(), skill);
            }
        }
    }

    #[async_trait]
    impl SkillRegistry for InMemorySkillRegistry {
        async fn get(&self, id: &str) -> Result<Option<Skill>, DomainError> {
            let map = self
                .skills
                .read()
                .map_err(|e| DomainError::internal(format!("Skill registry poisoned: {}", e)))?;

            Ok(map.get(id).cloned())
        }

        async fn list(&self) -> Result<Vec<Skill>, DomainError> {
            let map = self
                .skills
                .read()
                .map_err(|e| DomainError::internal(format!("Skill registry poisoned: {}", e)))?;

            let mut skills: Vec<Skill> = map.values().cloned().collect();
            skills.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(skills)
        }
    }
}
