//! Soul entity records.

use secureyeoman_core::{IntegrationId, KnowledgeId, PersonalityId, SkillId, Timestamp};
use serde::{Deserialize, Serialize};

/// An agent persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    /// Unique identifier.
    pub id: PersonalityId,
    /// Display name.
    pub name: String,
    /// System prompt fragment contributed by this persona.
    pub system_prompt: String,
    /// Preferred TTS voice, if any.
    #[serde(default)]
    pub voice: Option<String>,
    /// Integrations allowed to reach this persona. Empty = all.
    #[serde(default)]
    pub selected_integrations: Vec<IntegrationId>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl Personality {
    /// Create a new personality.
    #[must_use]
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: PersonalityId::new(),
            name: name.into(),
            system_prompt: system_prompt.into(),
            voice: None,
            selected_integrations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the given integration may feed this persona.
    #[must_use]
    pub fn allows_integration(&self, integration_id: IntegrationId) -> bool {
        self.selected_integrations.is_empty()
            || self.selected_integrations.contains(&integration_id)
    }
}

/// Approval state of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    /// Awaiting operator review.
    Pending,
    /// Approved for use.
    Approved,
    /// Rejected; never composed into prompts.
    Rejected,
}

/// A skill record, scoped to a personality or global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Unique identifier.
    pub id: SkillId,
    /// Owning personality; `None` = global.
    #[serde(default)]
    pub personality_id: Option<PersonalityId>,
    /// Display name.
    pub name: String,
    /// What the skill does; composed into the system prompt when enabled.
    pub description: String,
    /// Approval state.
    pub status: SkillStatus,
    /// Whether the skill is currently enabled.
    pub enabled: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl Skill {
    /// Create a pending, disabled skill.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: SkillId::new(),
            personality_id: None,
            name: name.into(),
            description: description.into(),
            status: SkillStatus::Pending,
            enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Scope the skill to a personality.
    #[must_use]
    pub fn for_personality(mut self, personality_id: PersonalityId) -> Self {
        self.personality_id = Some(personality_id);
        self
    }

    /// Whether this skill contributes to prompts for the given personality.
    #[must_use]
    pub fn applies_to(&self, personality_id: PersonalityId) -> bool {
        self.enabled
            && self.status == SkillStatus::Approved
            && self
                .personality_id
                .is_none_or(|owner| owner == personality_id)
    }
}

/// A curated knowledge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    /// Unique identifier.
    pub id: KnowledgeId,
    /// Title.
    pub title: String,
    /// Body content.
    pub content: String,
    /// Where this came from.
    pub source: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl Knowledge {
    /// Create a knowledge record.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: KnowledgeId::new(),
            title: title.into(),
            content: content.into(),
            source: source.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Onboarding progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OnboardingStatus {
    /// Whether onboarding has been completed.
    pub completed: bool,
    /// When it was completed.
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personality_allows_all_when_empty() {
        let p = Personality::new("Assistant", "You are helpful.");
        assert!(p.allows_integration(IntegrationId::new()));
    }

    #[test]
    fn test_personality_gates_selected() {
        let allowed = IntegrationId::new();
        let mut p = Personality::new("Assistant", "You are helpful.");
        p.selected_integrations.push(allowed);

        assert!(p.allows_integration(allowed));
        assert!(!p.allows_integration(IntegrationId::new()));
    }

    #[test]
    fn test_skill_applies_only_when_approved_and_enabled() {
        let personality = PersonalityId::new();
        let mut skill = Skill::new("summarize", "Summarize long text.");
        assert!(!skill.applies_to(personality));

        skill.status = SkillStatus::Approved;
        skill.enabled = true;
        assert!(skill.applies_to(personality));

        let scoped = skill.clone().for_personality(PersonalityId::new());
        assert!(!scoped.applies_to(personality));
    }
}
