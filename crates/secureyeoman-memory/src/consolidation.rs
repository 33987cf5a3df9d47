//! Deep consolidation: scheduled merge/replace/update of near-duplicate
//! memory groups.
//!
//! The schedule is a 5-field cron expression checked once per minute. A run
//! snapshots the flagged set, gathers each candidate's neighbours from the
//! vector index, and either asks the configured AI provider for a structured
//! action list or falls back to a pure threshold rule. Runs race a
//! configurable timeout; a timed-out run changes no state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use croner::Cron;
use secureyeoman_ai::{AiGateway, ChatMessage, ChatRequest};
use secureyeoman_core::MemoryId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, warn};

use crate::error::{MemoryError, MemoryResult};
use crate::store::MemoryStore;
use crate::types::MemoryRecord;

/// Consolidation configuration. Runtime-switchable through
/// [`ConsolidationManager::set_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// 5-field cron expression (minute, hour, day-of-month, month,
    /// day-of-week).
    pub schedule: String,
    /// Per-run timeout.
    pub timeout_secs: u64,
    /// Additional recent memories sampled per run.
    pub batch_size: usize,
    /// Neighbour threshold for grouping (matches the quick-check flag
    /// threshold).
    pub flag_threshold: f32,
    /// Fallback-path replace threshold (above the flag threshold).
    pub replace_threshold: f32,
    /// When set, actions are computed but nothing is written.
    pub dry_run: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            schedule: "0 3 * * *".into(),
            timeout_secs: 300,
            batch_size: 20,
            flag_threshold: 0.85,
            replace_threshold: 0.92,
            dry_run: false,
        }
    }
}

/// What the model (or the fallback rule) decided for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsolidationActionKind {
    /// Merge the sources into one memory.
    Merge,
    /// Keep the best source, delete the rest.
    Replace,
    /// The sources are distinct; leave them alone.
    KeepSeparate,
    /// Patch fields on the first source.
    Update,
    /// Not enough signal; do nothing.
    Skip,
}

/// A single consolidation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationAction {
    /// Action kind.
    #[serde(rename = "type")]
    pub kind: ConsolidationActionKind,
    /// Memories the action covers.
    pub source_ids: Vec<MemoryId>,
    /// Merged content for `MERGE`.
    #[serde(default)]
    pub merged_content: Option<String>,
    /// Field patch for `UPDATE` (`content`, `importance`).
    #[serde(default)]
    pub update_data: Option<Value>,
    /// Model-supplied rationale.
    #[serde(default)]
    pub reason: String,
}

/// Counts from a consolidation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    /// Candidate memories examined.
    pub candidates: usize,
    /// Groups merged.
    pub merged: usize,
    /// Memories deleted by replacement.
    pub replaced: usize,
    /// Memories patched.
    pub updated: usize,
    /// Groups kept separate.
    pub kept_separate: usize,
    /// Groups skipped.
    pub skipped: usize,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Parse a model response into actions, defensively.
///
/// Strips code fences, tolerates prose around the JSON array, and drops
/// items that do not conform.
#[must_use]
pub fn parse_actions(response: &str) -> Vec<ConsolidationAction> {
    let cleaned = response.replace("```json", "").replace("```", "");

    let Some(start) = cleaned.find('[') else {
        return Vec::new();
    };
    let Some(end) = cleaned.rfind(']') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let Ok(items) = serde_json::from_str::<Vec<Value>>(&cleaned[start..=end]) else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ConsolidationAction>(item).ok())
        .filter(|action| !action.source_ids.is_empty())
        .collect()
}

/// The consolidation manager.
pub struct ConsolidationManager {
    store: Arc<MemoryStore>,
    gateway: Option<Arc<AiGateway>>,
    config: RwLock<ConsolidationConfig>,
}

impl ConsolidationManager {
    /// Create a manager. `gateway = None` selects the threshold fallback.
    #[must_use]
    pub fn new(
        store: Arc<MemoryStore>,
        gateway: Option<Arc<AiGateway>>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config: RwLock::new(config),
        }
    }

    /// Current configuration.
    pub async fn config(&self) -> ConsolidationConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration (schedule changes take effect on the next
    /// minute tick).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidSchedule`] for unparseable cron
    /// expressions.
    pub async fn set_config(&self, config: ConsolidationConfig) -> MemoryResult<()> {
        Cron::new(&config.schedule)
            .parse()
            .map_err(|e| MemoryError::InvalidSchedule(e.to_string()))?;
        *self.config.write().await = config;
        Ok(())
    }

    /// Run deep consolidation now, racing the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Timeout`] if the run exceeds its budget (no
    /// state is cleared), or [`MemoryError::Consolidation`] on failure.
    pub async fn run_deep_consolidation(&self) -> MemoryResult<ConsolidationSummary> {
        let config = self.config().await;
        let timeout = Duration::from_secs(config.timeout_secs);

        match tokio::time::timeout(timeout, self.run_inner(&config)).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout_secs = config.timeout_secs, "Consolidation timed out");
                Err(MemoryError::Timeout {
                    timeout_secs: config.timeout_secs,
                })
            },
        }
    }

    async fn run_inner(&self, config: &ConsolidationConfig) -> MemoryResult<ConsolidationSummary> {
        // Snapshot the flagged set; ids flagged during the run survive it.
        let snapshot = self.store.flagged_snapshot().await;

        let mut candidates: Vec<MemoryRecord> = Vec::new();
        let mut candidate_ids: HashSet<MemoryId> = HashSet::new();
        for id in &snapshot {
            if let Some(record) = self.store.peek(*id).await?
                && candidate_ids.insert(record.id)
            {
                candidates.push(record);
            }
        }

        // Sample additional recent memories up to batch_size.
        let mut recent = self.store.list().await?;
        recent.reverse();
        for record in recent.into_iter().take(config.batch_size) {
            if candidate_ids.insert(record.id) {
                candidates.push(record);
            }
        }

        let mut summary = ConsolidationSummary {
            candidates: candidates.len(),
            dry_run: config.dry_run,
            ..ConsolidationSummary::default()
        };

        // Gather each candidate's neighbour group.
        let mut groups: Vec<(MemoryRecord, Vec<(MemoryId, f32)>)> = Vec::new();
        for candidate in candidates {
            let neighbours = self
                .store
                .neighbours(candidate.id, config.flag_threshold)
                .await?
                .into_iter()
                .map(|hit| (hit.id, hit.similarity))
                .collect::<Vec<_>>();
            if !neighbours.is_empty() {
                groups.push((candidate, neighbours));
            }
        }

        let actions = match &self.gateway {
            Some(gateway) => self.actions_from_model(gateway, &groups).await,
            None => Self::actions_from_thresholds(&groups, config.replace_threshold),
        };

        for action in actions {
            if config.dry_run {
                Self::tally(&mut summary, action.kind, &action);
                continue;
            }
            if let Err(e) = self.execute(&action, &mut summary).await {
                warn!(error = %e, "Consolidation action failed; continuing");
            }
        }

        // Clear only the snapshot subset; concurrent flags remain.
        if !config.dry_run {
            self.store.clear_flagged(&snapshot).await?;
        }

        info!(
            candidates = summary.candidates,
            merged = summary.merged,
            replaced = summary.replaced,
            updated = summary.updated,
            dry_run = summary.dry_run,
            "Consolidation run complete"
        );
        Ok(summary)
    }

    fn tally(
        summary: &mut ConsolidationSummary,
        kind: ConsolidationActionKind,
        action: &ConsolidationAction,
    ) {
        match kind {
            ConsolidationActionKind::Merge => summary.merged += 1,
            ConsolidationActionKind::Replace => {
                summary.replaced += action.source_ids.len().saturating_sub(1);
            },
            ConsolidationActionKind::Update => summary.updated += 1,
            ConsolidationActionKind::KeepSeparate => summary.kept_separate += 1,
            ConsolidationActionKind::Skip => summary.skipped += 1,
        }
    }

    async fn execute(
        &self,
        action: &ConsolidationAction,
        summary: &mut ConsolidationSummary,
    ) -> MemoryResult<()> {
        match action.kind {
            ConsolidationActionKind::Merge => {
                let Some(merged_content) = &action.merged_content else {
                    summary.skipped += 1;
                    return Ok(());
                };
                let Some((survivor, rest)) = action.source_ids.split_first() else {
                    return Ok(());
                };
                self.store
                    .update(*survivor, |record| {
                        record.content = merged_content.clone();
                    })
                    .await?;
                for id in rest {
                    if self.store.peek(*id).await?.is_some() {
                        self.store.delete(*id).await?;
                    }
                }
                summary.merged += 1;
            },
            ConsolidationActionKind::Replace => {
                // Keep the highest-importance record, delete the rest.
                let mut records = Vec::new();
                for id in &action.source_ids {
                    if let Some(record) = self.store.peek(*id).await? {
                        records.push(record);
                    }
                }
                let Some(keep) = records
                    .iter()
                    .max_by(|a, b| a.importance.total_cmp(&b.importance))
                    .map(|r| r.id)
                else {
                    return Ok(());
                };
                for record in &records {
                    if record.id != keep {
                        self.store.delete(record.id).await?;
                        summary.replaced += 1;
                    }
                }
            },
            ConsolidationActionKind::Update => {
                let Some(target) = action.source_ids.first() else {
                    return Ok(());
                };
                let update_data = action.update_data.clone().unwrap_or(Value::Null);
                self.store
                    .update(*target, |record| {
                        if let Some(content) = update_data.get("content").and_then(Value::as_str) {
                            record.content = content.to_string();
                        }
                        if let Some(importance) =
                            update_data.get("importance").and_then(Value::as_f64)
                        {
                            record.importance = importance.clamp(0.0, 1.0);
                        }
                    })
                    .await?;
                summary.updated += 1;
            },
            ConsolidationActionKind::KeepSeparate => summary.kept_separate += 1,
            ConsolidationActionKind::Skip => summary.skipped += 1,
        }
        Ok(())
    }

    async fn actions_from_model(
        &self,
        gateway: &AiGateway,
        groups: &[(MemoryRecord, Vec<(MemoryId, f32)>)],
    ) -> Vec<ConsolidationAction> {
        if groups.is_empty() {
            return Vec::new();
        }

        let mut prompt = String::from(
            "You are consolidating an agent's long-term memory. For each candidate \
             below, decide one action. Respond with ONLY a JSON array of objects \
             shaped {\"type\": \"MERGE|REPLACE|KEEP_SEPARATE|UPDATE|SKIP\", \
             \"source_ids\": [..], \"merged_content\": \"..\", \"update_data\": {..}, \
             \"reason\": \"..\"}.\n\n",
        );
        for (candidate, neighbours) in groups {
            prompt.push_str(&format!(
                "Candidate {} ({}): {}\n",
                candidate.id, candidate.importance, candidate.content
            ));
            for (id, similarity) in neighbours {
                prompt.push_str(&format!("  neighbour {id} (sim {similarity:.3})\n"));
            }
        }

        match gateway.chat(&ChatRequest::new(vec![ChatMessage::user(prompt)])).await {
            Ok(response) => {
                let actions = parse_actions(&response.content);
                debug!(actions = actions.len(), "Model returned consolidation actions");
                actions
            },
            Err(e) => {
                warn!(error = %e, "Consolidation model call failed; no actions");
                Vec::new()
            },
        }
    }

    /// No-provider fallback: any candidate with a neighbour at or above the
    /// replace threshold becomes a REPLACE group (importance decides the
    /// survivor at execution time).
    fn actions_from_thresholds(
        groups: &[(MemoryRecord, Vec<(MemoryId, f32)>)],
        replace_threshold: f32,
    ) -> Vec<ConsolidationAction> {
        let mut actions = Vec::new();
        let mut consumed: HashSet<MemoryId> = HashSet::new();
        for (candidate, neighbours) in groups {
            if consumed.contains(&candidate.id) {
                continue;
            }
            let close: Vec<MemoryId> = neighbours
                .iter()
                .filter(|(id, sim)| *sim >= replace_threshold && !consumed.contains(id))
                .map(|(id, _)| *id)
                .collect();
            if close.is_empty() {
                continue;
            }
            let mut source_ids = vec![candidate.id];
            source_ids.extend(close);
            for id in &source_ids {
                consumed.insert(*id);
            }
            actions.push(ConsolidationAction {
                kind: ConsolidationActionKind::Replace,
                source_ids,
                merged_content: None,
                update_data: None,
                reason: "near-duplicate above replace threshold".into(),
            });
        }
        actions
    }

    /// Run the minute tick loop until shutdown. Fires a consolidation run
    /// whenever the cron expression matches the current local minute.
    pub async fn run_schedule(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Consolidation scheduler shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let schedule = self.config().await.schedule;
                    let matches = Cron::new(&schedule)
                        .parse()
                        .ok()
                        .and_then(|cron| cron.is_time_matching(&chrono::Local::now()).ok())
                        .unwrap_or(false);
                    if matches {
                        if let Err(e) = self.run_deep_consolidation().await {
                            error!(error = %e, "Scheduled consolidation failed");
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ConsolidationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::{Embedder, HashingEmbedder};
    use crate::index::FlatVectorIndex;
    use crate::store::QuickCheckThresholds;
    use secureyeoman_storage::MemoryKvStore;

    async fn make_store() -> Arc<MemoryStore> {
        let embedder = Arc::new(HashingEmbedder::new());
        let index = Arc::new(FlatVectorIndex::in_memory(embedder.dimension()));
        Arc::new(
            MemoryStore::new(
                Arc::new(MemoryKvStore::new()),
                index,
                embedder,
                QuickCheckThresholds::default(),
            )
            .await
            .unwrap(),
        )
    }

    #[test]
    fn test_parse_actions_strips_fences_and_prose() {
        let id = MemoryId::new();
        let response = format!(
            "Here is my analysis:\n```json\n[{{\"type\": \"REPLACE\", \"source_ids\": \
             [\"{id}\"], \"reason\": \"dup\"}}]\n```\nDone.",
        );
        let actions = parse_actions(&response);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ConsolidationActionKind::Replace);
        assert_eq!(actions[0].source_ids, vec![id]);
    }

    #[test]
    fn test_parse_actions_drops_malformed_items() {
        let id = MemoryId::new();
        let response = format!(
            "[{{\"type\": \"SKIP\", \"source_ids\": [\"{id}\"]}}, \
             {{\"type\": \"NOT_AN_ACTION\", \"source_ids\": [\"{id}\"]}}, \
             {{\"type\": \"MERGE\"}}, 42]",
        );
        let actions = parse_actions(&response);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ConsolidationActionKind::Skip);
    }

    #[test]
    fn test_parse_actions_garbage_is_empty() {
        assert!(parse_actions("no json here").is_empty());
        assert!(parse_actions("{\"not\": \"an array\"}").is_empty());
    }

    #[tokio::test]
    async fn test_fallback_replace_keeps_higher_importance() {
        let store = make_store().await;

        // Two flagged near-duplicates with distinct importance.
        let (keep, _) = store
            .save(
                MemoryRecord::new("User timezone is Europe/Berlin for scheduling.", "chat")
                    .with_importance(0.9),
            )
            .await
            .unwrap();
        let (drop_, outcome) = store
            .save(
                MemoryRecord::new(
                    "User timezone is Europe/Berlin for meetings and scheduling.",
                    "chat",
                )
                .with_importance(0.3),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            crate::store::QuickCheckOutcome::Flagged { .. }
        ));

        let manager = ConsolidationManager::new(
            Arc::clone(&store),
            None,
            ConsolidationConfig {
                replace_threshold: 0.85,
                ..ConsolidationConfig::default()
            },
        );

        let summary = manager.run_deep_consolidation().await.unwrap();
        assert_eq!(summary.replaced, 1);
        assert!(store.peek(keep.id).await.unwrap().is_some());
        assert!(store.peek(drop_.id).await.unwrap().is_none());
        assert!(store.flagged_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let store = make_store().await;
        store
            .save(MemoryRecord::new("User timezone is Europe/Berlin for scheduling.", "chat"))
            .await
            .unwrap();
        let (second, _) = store
            .save(MemoryRecord::new(
                "User timezone is Europe/Berlin for meetings and scheduling.",
                "chat",
            ))
            .await
            .unwrap();

        let manager = ConsolidationManager::new(
            Arc::clone(&store),
            None,
            ConsolidationConfig {
                replace_threshold: 0.85,
                dry_run: true,
                ..ConsolidationConfig::default()
            },
        );

        let flagged_before = store.flagged_snapshot().await;
        let summary = manager.run_deep_consolidation().await.unwrap();
        assert!(summary.dry_run);

        // Stores and the flagged set are untouched.
        assert!(store.peek(second.id).await.unwrap().is_some());
        assert_eq!(store.stats().await.unwrap().total, 2);
        assert_eq!(store.flagged_snapshot().await, flagged_before);
    }

    #[tokio::test]
    async fn test_invalid_schedule_rejected() {
        let store = make_store().await;
        let manager =
            ConsolidationManager::new(store, None, ConsolidationConfig::default());
        let result = manager
            .set_config(ConsolidationConfig {
                schedule: "not a cron".into(),
                ..ConsolidationConfig::default()
            })
            .await;
        assert!(matches!(result, Err(MemoryError::InvalidSchedule(_))));
    }
}
