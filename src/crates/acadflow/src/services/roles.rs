//! Actor relationships to tracked activities
//!
//! Identity and sessions live outside this crate; the approval service only
//! asks a [`RoleResolver`] how an actor relates to an activity.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How an actor relates to an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Advisor,
    CoAdvisor,
    Administrator,
    Student,
    None,
}

impl Relationship {
    /// May approve submissions and override steps
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Advisor | Self::CoAdvisor | Self::Administrator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advisor => "advisor",
            Self::CoAdvisor => "co_advisor",
            Self::Administrator => "administrator",
            Self::Student => "student",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of actor relationships
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn relationship(&self, actor: &str, activity_id: &str) -> Result<Relationship>;
}

/// In-memory relationship table
///
/// Administrators relate to every activity; other relationships are per
/// (actor, activity) pair.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleResolver {
    administrators: HashSet<String>,
    relationships: HashMap<(String, String), Relationship>,
}

impl StaticRoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: Grant administrator rights on every activity
    pub fn with_administrator(mut self, actor: impl Into<String>) -> Self {
        self.administrators.insert(actor.into());
        self
    }

    /// Builder: Relate an actor to one activity
    pub fn with_relationship(
        mut self,
        actor: impl Into<String>,
        activity_id: impl Into<String>,
        relationship: Relationship,
    ) -> Self {
        self.relationships
            .insert((actor.into(), activity_id.into()), relationship);
        self
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn relationship(&self, actor: &str, activity_id: &str) -> Result<Relationship> {
        if self.administrators.contains(actor) {
            return Ok(Relationship::Administrator);
        }
        Ok(self
            .relationships
            .get(&(actor.to_string(), activity_id.to_string()))
            .copied()
            .unwrap_or(Relationship::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticRoleResolver::new()
            .with_administrator("registrar")
            .with_relationship("dr.lee", "a-1", Relationship::Advisor)
            .with_relationship("sam", "a-1", Relationship::Student);

        assert_eq!(
            resolver.relationship("registrar", "anything").await.unwrap(),
            Relationship::Administrator
        );
        assert_eq!(resolver.relationship("dr.lee", "a-1").await.unwrap(), Relationship::Advisor);
        assert_eq!(resolver.relationship("dr.lee", "a-2").await.unwrap(), Relationship::None);
        assert!(!resolver.relationship("sam", "a-1").await.unwrap().is_staff());
    }

    #[test]
    fn test_staff_relationships() {
        assert!(Relationship::CoAdvisor.is_staff());
        assert!(Relationship::Administrator.is_staff());
        assert!(!Relationship::Student.is_staff());
        assert!(!Relationship::None.is_staff());
    }
}
