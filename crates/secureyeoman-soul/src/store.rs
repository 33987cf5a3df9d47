//! Persistent store for soul entities.

use std::sync::Arc;

use secureyeoman_core::{KnowledgeId, PersonalityId, SkillId, Timestamp};
use secureyeoman_storage::{KvStore, ScopedKvStore};
use tracing::info;

use crate::error::{SoulError, SoulResult};
use crate::types::{Knowledge, OnboardingStatus, Personality, Skill, SkillStatus};

const NS_PERSONALITIES: &str = "soul:personalities";
const NS_SKILLS: &str = "soul:skills";
const NS_KNOWLEDGE: &str = "soul:knowledge";
const NS_META: &str = "soul:meta";

const META_ACTIVE: &str = "active_personality";
const META_ONBOARDING: &str = "onboarding";

/// KV-backed store for personalities, skills, knowledge, and onboarding.
pub struct SoulStore {
    personalities: ScopedKvStore,
    skills: ScopedKvStore,
    knowledge: ScopedKvStore,
    meta: ScopedKvStore,
}

impl SoulStore {
    /// Create a store over the given KV backend.
    ///
    /// # Errors
    ///
    /// Returns an error if namespace binding fails.
    pub fn new(store: Arc<dyn KvStore>) -> SoulResult<Self> {
        let bind = |ns: &str| {
            ScopedKvStore::new(Arc::clone(&store), ns)
                .map_err(|e| SoulError::Storage(e.to_string()))
        };
        Ok(Self {
            personalities: bind(NS_PERSONALITIES)?,
            skills: bind(NS_SKILLS)?,
            knowledge: bind(NS_KNOWLEDGE)?,
            meta: bind(NS_META)?,
        })
    }

    // -- Personalities --

    /// Persist a new personality.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn create_personality(&self, personality: Personality) -> SoulResult<Personality> {
        self.personalities
            .set_json(&personality.id.to_string(), &personality)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(personality)
    }

    /// Fetch a personality.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn personality(&self, id: PersonalityId) -> SoulResult<Personality> {
        self.personalities
            .get_json(&id.to_string())
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?
            .ok_or_else(|| SoulError::NotFound(format!("personality {id}")))
    }

    /// List all personalities, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list_personalities(&self) -> SoulResult<Vec<Personality>> {
        let keys = self
            .personalities
            .list_keys()
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(p) = self
                .personalities
                .get_json::<Personality>(&key)
                .await
                .map_err(|e| SoulError::Storage(e.to_string()))?
            {
                out.push(p);
            }
        }
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    /// Update a personality in place, bumping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn update_personality(
        &self,
        id: PersonalityId,
        update: impl FnOnce(&mut Personality),
    ) -> SoulResult<Personality> {
        let mut personality = self.personality(id).await?;
        update(&mut personality);
        personality.updated_at = Timestamp::now();
        self.personalities
            .set_json(&id.to_string(), &personality)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(personality)
    }

    /// Delete a personality. The active persona cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::InvalidState`] when deleting the active persona.
    pub async fn delete_personality(&self, id: PersonalityId) -> SoulResult<()> {
        if self.active_personality().await?.is_some_and(|p| p.id == id) {
            return Err(SoulError::InvalidState(
                "cannot delete the active personality".into(),
            ));
        }
        let existed = self
            .personalities
            .delete(&id.to_string())
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        if !existed {
            return Err(SoulError::NotFound(format!("personality {id}")));
        }
        Ok(())
    }

    /// Activate a personality.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn activate_personality(&self, id: PersonalityId) -> SoulResult<Personality> {
        let personality = self.personality(id).await?;
        self.meta
            .set_json(META_ACTIVE, &id)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        info!(personality = %personality.name, "Personality activated");
        Ok(personality)
    }

    /// The active personality, if one has been activated.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn active_personality(&self) -> SoulResult<Option<Personality>> {
        let id: Option<PersonalityId> = self
            .meta
            .get_json(META_ACTIVE)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        match id {
            Some(id) => match self.personality(id).await {
                Ok(p) => Ok(Some(p)),
                Err(SoulError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    // -- Skills --

    /// Persist a new skill.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn create_skill(&self, skill: Skill) -> SoulResult<Skill> {
        self.skills
            .set_json(&skill.id.to_string(), &skill)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(skill)
    }

    /// Fetch a skill.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn skill(&self, id: SkillId) -> SoulResult<Skill> {
        self.skills
            .get_json(&id.to_string())
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?
            .ok_or_else(|| SoulError::NotFound(format!("skill {id}")))
    }

    /// List all skills, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list_skills(&self) -> SoulResult<Vec<Skill>> {
        let keys = self
            .skills
            .list_keys()
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(s) = self
                .skills
                .get_json::<Skill>(&key)
                .await
                .map_err(|e| SoulError::Storage(e.to_string()))?
            {
                out.push(s);
            }
        }
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn update_skill(
        &self,
        id: SkillId,
        update: impl FnOnce(&mut Skill) -> SoulResult<()>,
    ) -> SoulResult<Skill> {
        let mut skill = self.skill(id).await?;
        update(&mut skill)?;
        skill.updated_at = Timestamp::now();
        self.skills
            .set_json(&id.to_string(), &skill)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(skill)
    }

    /// Approve a pending skill.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::InvalidState`] unless the skill is pending.
    pub async fn approve_skill(&self, id: SkillId) -> SoulResult<Skill> {
        self.update_skill(id, |skill| {
            if skill.status != SkillStatus::Pending {
                return Err(SoulError::InvalidState(format!(
                    "skill is not pending: {:?}",
                    skill.status
                )));
            }
            skill.status = SkillStatus::Approved;
            Ok(())
        })
        .await
    }

    /// Reject a pending skill.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::InvalidState`] unless the skill is pending.
    pub async fn reject_skill(&self, id: SkillId) -> SoulResult<Skill> {
        self.update_skill(id, |skill| {
            if skill.status != SkillStatus::Pending {
                return Err(SoulError::InvalidState(format!(
                    "skill is not pending: {:?}",
                    skill.status
                )));
            }
            skill.status = SkillStatus::Rejected;
            skill.enabled = false;
            Ok(())
        })
        .await
    }

    /// Enable an approved skill.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::InvalidState`] unless the skill is approved.
    pub async fn enable_skill(&self, id: SkillId) -> SoulResult<Skill> {
        self.update_skill(id, |skill| {
            if skill.status != SkillStatus::Approved {
                return Err(SoulError::InvalidState(
                    "only approved skills can be enabled".into(),
                ));
            }
            skill.enabled = true;
            Ok(())
        })
        .await
    }

    /// Disable a skill.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn disable_skill(&self, id: SkillId) -> SoulResult<Skill> {
        self.update_skill(id, |skill| {
            skill.enabled = false;
            Ok(())
        })
        .await
    }

    /// Delete a skill, returning the deleted record so callers can notify
    /// dependents explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn delete_skill(&self, id: SkillId) -> SoulResult<Skill> {
        let skill = self.skill(id).await?;
        self.skills
            .delete(&id.to_string())
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(skill)
    }

    // -- Knowledge --

    /// Persist a knowledge record.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn create_knowledge(&self, knowledge: Knowledge) -> SoulResult<Knowledge> {
        self.knowledge
            .set_json(&knowledge.id.to_string(), &knowledge)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(knowledge)
    }

    /// List all knowledge records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list_knowledge(&self) -> SoulResult<Vec<Knowledge>> {
        let keys = self
            .knowledge
            .list_keys()
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(k) = self
                .knowledge
                .get_json::<Knowledge>(&key)
                .await
                .map_err(|e| SoulError::Storage(e.to_string()))?
            {
                out.push(k);
            }
        }
        out.sort_by_key(|k| k.id);
        Ok(out)
    }

    /// Delete a knowledge record.
    ///
    /// # Errors
    ///
    /// Returns [`SoulError::NotFound`] if the id is unknown.
    pub async fn delete_knowledge(&self, id: KnowledgeId) -> SoulResult<()> {
        let existed = self
            .knowledge
            .delete(&id.to_string())
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        if !existed {
            return Err(SoulError::NotFound(format!("knowledge {id}")));
        }
        Ok(())
    }

    // -- Prompt composition & onboarding --

    /// Compose the system prompt preview: the active persona's prompt plus
    /// its enabled, approved skills.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn prompt_preview(&self) -> SoulResult<String> {
        let Some(personality) = self.active_personality().await? else {
            return Ok(String::new());
        };

        let mut prompt = personality.system_prompt.clone();
        for skill in self.list_skills().await? {
            if skill.applies_to(personality.id) {
                prompt.push_str("\n\n## Skill: ");
                prompt.push_str(&skill.name);
                prompt.push('\n');
                prompt.push_str(&skill.description);
            }
        }
        Ok(prompt)
    }

    /// Onboarding status.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn onboarding_status(&self) -> SoulResult<OnboardingStatus> {
        Ok(self
            .meta
            .get_json(META_ONBOARDING)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?
            .unwrap_or_default())
    }

    /// Mark onboarding complete.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn complete_onboarding(&self) -> SoulResult<OnboardingStatus> {
        let status = OnboardingStatus {
            completed: true,
            completed_at: Some(Timestamp::now()),
        };
        self.meta
            .set_json(META_ONBOARDING, &status)
            .await
            .map_err(|e| SoulError::Storage(e.to_string()))?;
        Ok(status)
    }
}

impl std::fmt::Debug for SoulStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoulStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_storage::MemoryKvStore;

    fn make_store() -> SoulStore {
        SoulStore::new(Arc::new(MemoryKvStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_personality_crud_and_activation() {
        let store = make_store();
        assert!(store.active_personality().await.unwrap().is_none());

        let p = store
            .create_personality(Personality::new("Friday", "You are Friday."))
            .await
            .unwrap();
        store.activate_personality(p.id).await.unwrap();

        let active = store.active_personality().await.unwrap().unwrap();
        assert_eq!(active.id, p.id);

        // Active persona cannot be deleted.
        assert!(matches!(
            store.delete_personality(p.id).await,
            Err(SoulError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_update_leaves_record_equal() {
        let store = make_store();
        let p = store
            .create_personality(Personality::new("Friday", "You are Friday."))
            .await
            .unwrap();

        let updated = store.update_personality(p.id, |_| {}).await.unwrap();
        assert_eq!(updated.name, p.name);
        assert_eq!(updated.system_prompt, p.system_prompt);
        assert_eq!(updated.voice, p.voice);
        assert_eq!(updated.selected_integrations, p.selected_integrations);
    }

    #[tokio::test]
    async fn test_skill_approval_workflow() {
        let store = make_store();
        let skill = store
            .create_skill(Skill::new("summarize", "Summarize long text."))
            .await
            .unwrap();

        // Cannot enable a pending skill.
        assert!(matches!(
            store.enable_skill(skill.id).await,
            Err(SoulError::InvalidState(_))
        ));

        store.approve_skill(skill.id).await.unwrap();
        let enabled = store.enable_skill(skill.id).await.unwrap();
        assert!(enabled.enabled);

        // Approving twice fails.
        assert!(matches!(
            store.approve_skill(skill.id).await,
            Err(SoulError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_skill_returns_record() {
        let store = make_store();
        let skill = store
            .create_skill(Skill::new("extract", "Extract entities."))
            .await
            .unwrap();
        let deleted = store.delete_skill(skill.id).await.unwrap();
        assert_eq!(deleted.id, skill.id);
        assert!(store.skill(skill.id).await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_preview_composes_enabled_skills() {
        let store = make_store();
        let p = store
            .create_personality(Personality::new("Friday", "You are Friday."))
            .await
            .unwrap();
        store.activate_personality(p.id).await.unwrap();

        let skill = store
            .create_skill(Skill::new("summarize", "Summarize long text."))
            .await
            .unwrap();
        store.approve_skill(skill.id).await.unwrap();
        store.enable_skill(skill.id).await.unwrap();

        // A pending skill must not appear.
        store
            .create_skill(Skill::new("hidden", "Not yet approved."))
            .await
            .unwrap();

        let preview = store.prompt_preview().await.unwrap();
        assert!(preview.starts_with("You are Friday."));
        assert!(preview.contains("summarize"));
        assert!(!preview.contains("hidden"));
    }

    #[tokio::test]
    async fn test_onboarding() {
        let store = make_store();
        assert!(!store.onboarding_status().await.unwrap().completed);
        let done = store.complete_onboarding().await.unwrap();
        assert!(done.completed);
        assert!(store.onboarding_status().await.unwrap().completed);
    }
}
